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

//! Ledger rules. Each rule is a pure function of a read-only view over the ledger state: it
//! either rejects the event, or returns the `StoreUpdate` to commit along with an `Outcome`
//! describing what happened. Committing is left to the caller.

pub mod aggregate;
pub mod delegation;
pub mod distribution;
pub mod reserve;

use crate::{
    error::LedgerError,
    events::Outcome,
    store::{ReadStore, StoreUpdate},
};
use stackpool_kernel::{BurnHeight, CycleClock, CycleId, ProtocolParameters};

/// The update to commit for an accepted event, and what the event did.
pub type Applied = (StoreUpdate, Outcome);

/// Everything a rule needs to know besides the ledger state.
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    pub parameters: &'a ProtocolParameters,
    pub clock: &'a CycleClock,
    /// Height of the block carrying the event.
    pub height: BurnHeight,
}

impl<'a> Context<'a> {
    pub fn new(
        parameters: &'a ProtocolParameters,
        clock: &'a CycleClock,
        height: BurnHeight,
    ) -> Self {
        Context {
            parameters,
            clock,
            height,
        }
    }

    /// Cycle the current height belongs to. Heights preceding the activation height count as
    /// part of the very first cycle, which they lead into.
    pub fn cycle(&self) -> CycleId {
        self.clock
            .cycle_for_height(self.height)
            .map(|position| position.cycle)
            .unwrap_or(0)
    }
}

/// Refuse to touch a cycle that was halted after an invariant violation.
pub fn ensure_not_halted(db: &impl ReadStore, cycle: CycleId) -> Result<(), LedgerError> {
    match db.cycle(&cycle)?.and_then(|row| row.halted) {
        Some(reason) => Err(LedgerError::CycleHalted { cycle, reason }),
        None => Ok(()),
    }
}

/// Whether the given cycle's aggregates are frozen.
pub fn is_frozen(db: &impl ReadStore, cycle: CycleId) -> Result<bool, LedgerError> {
    Ok(db.cycle(&cycle)?.is_some())
}
