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

use minicbor::{Decode, Decoder, Encode};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Height on the external (burn) chain.
pub type BurnHeight = u64;

/// Identifier of a reward cycle, counted from the protocol activation height.
pub type CycleId = u64;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum CycleClockError {
    #[error("height {height} precedes the activation height {activation_height}")]
    OutOfRangeHeight {
        height: BurnHeight,
        activation_height: BurnHeight,
    },
    #[error("reward cycle length must be strictly positive")]
    EmptyCycle,
    #[error("prepare phase ({prepare}) must be shorter than the reward cycle ({length})")]
    PreparePhaseTooLong { prepare: u64, length: u64 },
    #[error("cycle {0} has no prepare phase")]
    NoPreparePhase(CycleId),
    #[error("cycle {0} lies past the representable height horizon")]
    PastHorizon(CycleId),
}

/// Sub-window of a reward cycle.
///
/// The last `prepare_cycle_length` heights of cycle `c` form the prepare phase of cycle `c + 1`;
/// every other height belongs to the reward phase of the cycle it falls in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Prepare,
    Reward,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prepare => "prepare",
            Self::Reward => "reward",
        }
        .fmt(f)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CyclePosition {
    pub cycle: CycleId,
    pub phase: Phase,
    /// Distance, in heights, from the start of `cycle`.
    pub offset: u64,
}

// The start is inclusive and the end is exclusive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CycleBounds {
    pub start: BurnHeight,
    pub end: BurnHeight,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleClock {
    activation_height: BurnHeight,
    reward_cycle_length: u64,
    prepare_cycle_length: u64,
}

impl CycleClock {
    pub fn new(
        activation_height: BurnHeight,
        reward_cycle_length: u64,
        prepare_cycle_length: u64,
    ) -> Result<Self, CycleClockError> {
        if reward_cycle_length == 0 {
            return Err(CycleClockError::EmptyCycle);
        }

        if prepare_cycle_length >= reward_cycle_length {
            return Err(CycleClockError::PreparePhaseTooLong {
                prepare: prepare_cycle_length,
                length: reward_cycle_length,
            });
        }

        Ok(CycleClock {
            activation_height,
            reward_cycle_length,
            prepare_cycle_length,
        })
    }

    pub fn activation_height(&self) -> BurnHeight {
        self.activation_height
    }

    pub fn reward_cycle_length(&self) -> u64 {
        self.reward_cycle_length
    }

    pub fn prepare_cycle_length(&self) -> u64 {
        self.prepare_cycle_length
    }

    pub fn cycle_for_height(&self, height: BurnHeight) -> Result<CyclePosition, CycleClockError> {
        if height < self.activation_height {
            return Err(CycleClockError::OutOfRangeHeight {
                height,
                activation_height: self.activation_height,
            });
        }

        let elapsed = height - self.activation_height;
        let cycle = elapsed / self.reward_cycle_length;
        let offset = elapsed % self.reward_cycle_length;

        let phase = if offset >= self.reward_cycle_length - self.prepare_cycle_length {
            Phase::Prepare
        } else {
            Phase::Reward
        };

        Ok(CyclePosition {
            cycle,
            phase,
            offset,
        })
    }

    /// First height of the given cycle. This is also the height at which the cycle's prepare
    /// phase closes.
    pub fn cycle_start(&self, cycle: CycleId) -> Result<BurnHeight, CycleClockError> {
        cycle
            .checked_mul(self.reward_cycle_length)
            .and_then(|elapsed| elapsed.checked_add(self.activation_height))
            .ok_or(CycleClockError::PastHorizon(cycle))
    }

    /// First height of the prepare phase leading into the given cycle. The very first cycle
    /// starts at activation and therefore has none.
    pub fn prepare_phase_start(&self, cycle: CycleId) -> Result<BurnHeight, CycleClockError> {
        if cycle == 0 || self.prepare_cycle_length == 0 {
            return Err(CycleClockError::NoPreparePhase(cycle));
        }
        Ok(self.cycle_start(cycle)? - self.prepare_cycle_length)
    }

    pub fn reward_phase_bounds(&self, cycle: CycleId) -> Result<CycleBounds, CycleClockError> {
        let start = self.cycle_start(cycle)?;
        let end = start
            .checked_add(self.reward_cycle_length - self.prepare_cycle_length)
            .ok_or(CycleClockError::PastHorizon(cycle))?;
        Ok(CycleBounds { start, end })
    }

    /// Whether the snapshot of `cycle` can no longer change once the chain has reached `tip`.
    pub fn is_frozen(&self, cycle: CycleId, tip: BurnHeight) -> bool {
        self.cycle_start(cycle)
            .map(|start| tip >= start)
            .unwrap_or(false)
    }
}

impl<C> Encode<C> for CycleClock {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        ctx: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.array(3)?;
        self.activation_height.encode(e, ctx)?;
        self.reward_cycle_length.encode(e, ctx)?;
        self.prepare_cycle_length.encode(e, ctx)?;
        Ok(())
    }
}

impl<'b, C> Decode<'b, C> for CycleClock {
    fn decode(d: &mut Decoder<'b>, _ctx: &mut C) -> Result<Self, minicbor::decode::Error> {
        let _ = d.array()?;
        let activation_height = d.u64()?;
        let reward_cycle_length = d.u64()?;
        let prepare_cycle_length = d.u64()?;
        CycleClock::new(activation_height, reward_cycle_length, prepare_cycle_length)
            .map_err(|e| minicbor::decode::Error::message(e.to_string()))
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils {
    use super::CycleClock;
    use proptest::prelude::*;

    prop_compose! {
        pub fn any_cycle_clock()(
            activation_height in 0u64..1_000_000,
            reward_cycle_length in 1u64..2_100,
        )(
            activation_height in Just(activation_height),
            reward_cycle_length in Just(reward_cycle_length),
            prepare_cycle_length in 0..reward_cycle_length,
        ) -> CycleClock {
            CycleClock {
                activation_height,
                reward_cycle_length,
                prepare_cycle_length,
            }
        }
    }
}
