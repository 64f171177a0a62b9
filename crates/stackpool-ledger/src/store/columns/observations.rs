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
use stackpool_kernel::{Address, BurnHeight, CycleId, Ustx, cbor};
use std::fmt;

pub type Key = BurnHeight;

/// Progress of the rewards of a burn height. Heights with no row are unobserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    Observed,
    Distributed,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Observed => "observed",
            State::Distributed => "distributed",
        }
        .fmt(f)
    }
}

impl<C> cbor::encode::Encode<C> for State {
    fn encode<W: cbor::encode::Write>(
        &self,
        e: &mut cbor::Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), cbor::encode::Error<W::Error>> {
        e.u8(match self {
            State::Observed => 0,
            State::Distributed => 1,
        })?;
        Ok(())
    }
}

impl<'a, C> cbor::decode::Decode<'a, C> for State {
    fn decode(d: &mut cbor::Decoder<'a>, _ctx: &mut C) -> Result<Self, cbor::decode::Error> {
        match d.u8()? {
            0 => Ok(State::Observed),
            1 => Ok(State::Distributed),
            t => Err(cbor::decode::Error::message(format!(
                "unknown observation state {t}"
            ))),
        }
    }
}

/// Rewards paid out by the consensus mechanism at a given burn height.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Row {
    pub cycle: CycleId,
    /// Reward addresses paid at this height, in order. An address may appear several times when
    /// it won several reward slots.
    pub winners: Vec<Address>,
    pub amount_per_address: Ustx,
    pub state: State,
    pub distributed_by: Option<Address>,
    /// Total reward credited to pools of this ledger. Known once distributed.
    pub pool_reward: Ustx,
    /// Truncation remainder left by the distribution.
    pub dust: Ustx,
}

impl Row {
    pub fn new(cycle: CycleId, winners: Vec<Address>, amount_per_address: Ustx) -> Self {
        Row {
            cycle,
            winners,
            amount_per_address,
            state: State::Observed,
            distributed_by: None,
            pool_reward: 0,
            dust: 0,
        }
    }

    /// Number of reward slots won by the given address at this height.
    pub fn slots_won_by(&self, address: &Address) -> u64 {
        self.winners.iter().filter(|w| *w == address).count() as u64
    }
}

impl<C> cbor::encode::Encode<C> for Row {
    fn encode<W: cbor::encode::Write>(
        &self,
        e: &mut cbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), cbor::encode::Error<W::Error>> {
        e.array(7)?;
        e.encode_with(self.cycle, ctx)?;
        e.encode_with(&self.winners, ctx)?;
        e.encode_with(self.amount_per_address, ctx)?;
        e.encode_with(self.state, ctx)?;
        e.encode_with(self.distributed_by.as_ref(), ctx)?;
        e.encode_with(self.pool_reward, ctx)?;
        e.encode_with(self.dust, ctx)?;
        Ok(())
    }
}

impl<'a, C> cbor::decode::Decode<'a, C> for Row {
    fn decode(d: &mut cbor::Decoder<'a>, ctx: &mut C) -> Result<Self, cbor::decode::Error> {
        d.array()?;
        Ok(Row {
            cycle: d.decode_with(ctx)?,
            winners: d.decode_with(ctx)?,
            amount_per_address: d.decode_with(ctx)?,
            state: d.decode_with(ctx)?,
            distributed_by: d.decode_with(ctx)?,
            pool_reward: d.decode_with(ctx)?,
            dust: d.decode_with(ctx)?,
        })
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod tests {
    use super::{Row, State};
    use proptest::{collection, option, prelude::*};
    use stackpool_kernel::{address::tests::any_address, prop_cbor_roundtrip};

    prop_cbor_roundtrip!(Row, any_row());

    fn any_state() -> impl Strategy<Value = State> {
        prop_oneof![Just(State::Observed), Just(State::Distributed)]
    }

    prop_compose! {
        pub fn any_row()(
            cycle in 0u64..1_000,
            winners in collection::vec(any_address(), 0..4),
            amount_per_address in 0u64..1_000_000_000,
            state in any_state(),
            distributed_by in option::of(any_address()),
            pool_reward in 0u64..1_000_000_000,
            dust in 0u64..1_000,
        ) -> Row {
            Row {
                cycle,
                winners,
                amount_per_address,
                state,
                distributed_by,
                pool_reward,
                dust,
            }
        }
    }
}
