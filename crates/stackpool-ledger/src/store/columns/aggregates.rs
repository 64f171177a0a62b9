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

use serde::Serialize;
use stackpool_kernel::{Address, CycleId, Ustx, cbor};
use std::collections::BTreeMap;

/// A pool, identified by its operator, within a reward cycle.
pub type Key = (CycleId, Address);

/// Stake backing a pool for one cycle. The row is provisional until the cycle freezes, after
/// which it never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Row {
    /// Position of the pool's address entry in the cycle, if one was published.
    pub index: Option<u32>,
    /// Sum of the qualifying delegations.
    pub total_locked: Ustx,
    /// Reserved balance of the operator, captured when the cycle freezes.
    pub operator_stake: Ustx,
    /// Qualifying delegations, by participant.
    pub contributions: BTreeMap<Address, Ustx>,
    pub frozen: bool,
}

impl<C> cbor::encode::Encode<C> for Row {
    fn encode<W: cbor::encode::Write>(
        &self,
        e: &mut cbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), cbor::encode::Error<W::Error>> {
        e.array(5)?;
        e.encode_with(self.index, ctx)?;
        e.encode_with(self.total_locked, ctx)?;
        e.encode_with(self.operator_stake, ctx)?;
        e.encode_with(&self.contributions, ctx)?;
        e.encode_with(self.frozen, ctx)?;
        Ok(())
    }
}

impl<'a, C> cbor::decode::Decode<'a, C> for Row {
    fn decode(d: &mut cbor::Decoder<'a>, ctx: &mut C) -> Result<Self, cbor::decode::Error> {
        d.array()?;
        Ok(Row {
            index: d.decode_with(ctx)?,
            total_locked: d.decode_with(ctx)?,
            operator_stake: d.decode_with(ctx)?,
            contributions: d.decode_with(ctx)?,
            frozen: d.decode_with(ctx)?,
        })
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod tests {
    use super::Row;
    use proptest::{collection, option, prelude::*};
    use stackpool_kernel::{address::tests::any_address, prop_cbor_roundtrip};

    prop_cbor_roundtrip!(Row, any_row());

    prop_compose! {
        pub fn any_row()(
            index in option::of(0u32..16),
            operator_stake in 0u64..100_000_000_000,
            contributions in collection::btree_map(any_address(), 0u64..100_000_000_000_000, 0..8),
            frozen in any::<bool>(),
        ) -> Row {
            Row {
                index,
                total_locked: contributions.values().sum(),
                operator_stake,
                contributions,
                frozen,
            }
        }
    }
}
