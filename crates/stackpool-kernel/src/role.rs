// Copyright 2024 PRAGMA
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::cbor;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Capacity in which a participant takes part in the pool. A single address may hold several
/// roles at once (an operator is typically also the liquidity provider backing its pool).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Delegator,
    PoolOperator,
    LiquidityProvider,
}

impl Role {
    fn tag(self) -> u8 {
        match self {
            Role::Delegator => 0,
            Role::PoolOperator => 1,
            Role::LiquidityProvider => 2,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Delegator => "delegator",
            Role::PoolOperator => "pool_operator",
            Role::LiquidityProvider => "liquidity_provider",
        }
        .fmt(f)
    }
}

impl<C> cbor::Encode<C> for Role {
    fn encode<W: cbor::encode::Write>(
        &self,
        e: &mut cbor::Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), cbor::encode::Error<W::Error>> {
        e.u8(self.tag())?;
        Ok(())
    }
}

impl<'b, C> cbor::Decode<'b, C> for Role {
    fn decode(d: &mut cbor::Decoder<'b>, _ctx: &mut C) -> Result<Self, cbor::decode::Error> {
        match d.u8()? {
            0 => Ok(Role::Delegator),
            1 => Ok(Role::PoolOperator),
            2 => Ok(Role::LiquidityProvider),
            t => Err(cbor::decode::Error::message(format!("unknown role tag {t}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Role;
    use test_case::test_case;

    #[test_case(Role::Delegator => "00"; "delegator")]
    #[test_case(Role::PoolOperator => "01"; "pool operator")]
    #[test_case(Role::LiquidityProvider => "02"; "liquidity provider")]
    fn encode_role(role: Role) -> String {
        hex::encode(minicbor::to_vec(role).unwrap())
    }

    #[test]
    fn decode_unknown_role() {
        assert!(minicbor::decode::<Role>(&[0x03]).is_err());
    }
}
