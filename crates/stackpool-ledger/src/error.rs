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

use crate::store::StoreError;
use stackpool_kernel::{
    Address, BurnHeight, CycleClockError, CycleId, Nonce, RawAmount, Role, Ustx, WEIGHT_SCALE,
};
use std::fmt;
use thiserror::Error;

/// Coarse classification of ledger errors, telling callers what they can do about them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The event is malformed; resubmitting it as-is will always fail.
    InputValidation,
    /// The event is well-formed but conflicts with the current state; a corrected event may
    /// succeed.
    StateConflict,
    /// The event arrived out of order with respect to other events.
    Sequencing,
    /// The ledger detected an inconsistency. The affected cycle is halted.
    InvariantViolation,
    /// The underlying store failed; the event wasn't applied.
    Storage,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::InputValidation => "input_validation",
            ErrorKind::StateConflict => "state_conflict",
            ErrorKind::Sequencing => "sequencing",
            ErrorKind::InvariantViolation => "invariant_violation",
            ErrorKind::Storage => "storage",
        }
        .fmt(f)
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    // InputValidation ---------------------------------------------------------
    #[error("invalid amount {0}: must be a non-negative quantity of µSTX")]
    InvalidAmount(RawAmount),

    #[error("stale sequence number for {sender}: expected {expected}, got {received}")]
    StaleSequence {
        sender: Address,
        expected: Nonce,
        received: Nonce,
    },

    #[error("invalid height: {0}")]
    InvalidHeight(#[source] CycleClockError),

    #[error("invalid protocol parameters: {0}")]
    InvalidParameters(#[source] CycleClockError),

    // StateConflict -----------------------------------------------------------
    #[error("{participant} already delegates to {current}")]
    AlreadyInDifferentPool {
        participant: Address,
        current: Address,
    },

    #[error("{participant} hasn't joined the pool operated by {operator}")]
    NotJoined {
        participant: Address,
        operator: Address,
    },

    #[error("{0} has no active delegation")]
    NotDelegated(Address),

    #[error("insufficient deposit for {provider}: requested {requested}, available {available}")]
    InsufficientDeposit {
        provider: Address,
        requested: Ustx,
        available: Ustx,
    },

    #[error("over-release for {provider}: requested {requested}, reserved {reserved}")]
    OverRelease {
        provider: Address,
        requested: Ustx,
        reserved: Ustx,
    },

    #[error("unknown pool operator {0}")]
    UnknownPool(Address),

    #[error("{participant} hasn't allowed {operator} to stack on their behalf")]
    CallerNotAllowed {
        participant: Address,
        operator: Address,
    },

    #[error("{participant} acts as {role} and can't perform this operation")]
    RoleNotPermitted { participant: Address, role: Role },

    #[error("cycle {0} is frozen")]
    CycleFrozen(CycleId),

    #[error("insufficient reserve for {operator}: required {required}, available {available}")]
    InsufficientReserve {
        operator: Address,
        required: Ustx,
        available: Ustx,
    },

    #[error("no pool entry index left in cycle {0}")]
    PoolEntriesExhausted(CycleId),

    // Sequencing --------------------------------------------------------------
    #[error("no reward observed at height {0}")]
    NotYetObserved(BurnHeight),

    #[error("rewards already observed at height {0}")]
    DuplicateObservation(BurnHeight),

    #[error("cycle {0} isn't frozen yet")]
    CycleNotFrozen(CycleId),

    #[error("the prepare phase of cycle {0} hasn't started")]
    NotInPreparePhase(CycleId),

    #[error("height {height} doesn't extend the current tip {tip}")]
    NonMonotonicHeight { tip: BurnHeight, height: BurnHeight },

    // InvariantViolation ------------------------------------------------------
    #[error(
        "weights of pool {operator} in cycle {cycle} sum to {total} for {participants} participants; expected within {participants} of {scale}",
        scale = WEIGHT_SCALE
    )]
    ReconciliationMismatch {
        cycle: CycleId,
        operator: Address,
        total: u64,
        participants: usize,
    },

    #[error("torn commit detected at height {height} (cycle {cycle}): {reason}")]
    TornCommit {
        height: BurnHeight,
        cycle: CycleId,
        reason: String,
    },

    #[error("cycle {cycle} is halted: {reason}")]
    CycleHalted { cycle: CycleId, reason: String },

    // Storage -----------------------------------------------------------------
    #[error("error accessing storage: {0}")]
    Storage(#[from] StoreError),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidAmount(..)
            | Self::StaleSequence { .. }
            | Self::InvalidHeight(..)
            | Self::InvalidParameters(..) => ErrorKind::InputValidation,

            Self::AlreadyInDifferentPool { .. }
            | Self::NotJoined { .. }
            | Self::NotDelegated(..)
            | Self::InsufficientDeposit { .. }
            | Self::OverRelease { .. }
            | Self::UnknownPool(..)
            | Self::CallerNotAllowed { .. }
            | Self::RoleNotPermitted { .. }
            | Self::CycleFrozen(..)
            | Self::InsufficientReserve { .. }
            | Self::PoolEntriesExhausted(..) => ErrorKind::StateConflict,

            Self::NotYetObserved(..)
            | Self::DuplicateObservation(..)
            | Self::CycleNotFrozen(..)
            | Self::NotInPreparePhase(..)
            | Self::NonMonotonicHeight { .. } => ErrorKind::Sequencing,

            Self::ReconciliationMismatch { .. }
            | Self::TornCommit { .. }
            | Self::CycleHalted { .. } => ErrorKind::InvariantViolation,

            Self::Storage(..) => ErrorKind::Storage,
        }
    }

    /// Whether resubmitting the very same event later may succeed, once some other event has
    /// been processed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NotYetObserved(..) | Self::CycleNotFrozen(..) | Self::NotInPreparePhase(..)
        )
    }

    /// The cycle to halt when this error is raised, if any.
    pub fn cycle_to_halt(&self) -> Option<CycleId> {
        match self {
            Self::ReconciliationMismatch { cycle, .. } | Self::TornCommit { cycle, .. } => {
                Some(*cycle)
            }
            Self::InvalidAmount(..)
            | Self::StaleSequence { .. }
            | Self::InvalidHeight(..)
            | Self::InvalidParameters(..)
            | Self::AlreadyInDifferentPool { .. }
            | Self::NotJoined { .. }
            | Self::NotDelegated(..)
            | Self::InsufficientDeposit { .. }
            | Self::OverRelease { .. }
            | Self::UnknownPool(..)
            | Self::CallerNotAllowed { .. }
            | Self::RoleNotPermitted { .. }
            | Self::CycleFrozen(..)
            | Self::InsufficientReserve { .. }
            | Self::PoolEntriesExhausted(..)
            | Self::NotYetObserved(..)
            | Self::DuplicateObservation(..)
            | Self::CycleNotFrozen(..)
            | Self::NotInPreparePhase(..)
            | Self::NonMonotonicHeight { .. }
            | Self::CycleHalted { .. }
            | Self::Storage(..) => None,
        }
    }
}

/// Validate an externally provided amount, rejecting negative values and values beyond what
/// `Ustx` can represent.
pub fn validate_amount(amount: RawAmount) -> Result<Ustx, LedgerError> {
    Ustx::try_from(amount).map_err(|_| LedgerError::InvalidAmount(amount))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0 => Some(0); "zero")]
    #[test_case(125_000_000_000 => Some(125_000_000_000); "regular")]
    #[test_case(u64::MAX as i128 => Some(u64::MAX); "upper bound")]
    #[test_case(-1 => None; "negative")]
    #[test_case(u64::MAX as i128 + 1 => None; "overflow")]
    fn validate(amount: RawAmount) -> Option<Ustx> {
        validate_amount(amount).ok()
    }

    #[test]
    fn retryable_errors() {
        assert!(LedgerError::NotYetObserved(130).is_retryable());
        assert!(LedgerError::CycleNotFrozen(4).is_retryable());
        assert!(!LedgerError::DuplicateObservation(130).is_retryable());
        assert!(!LedgerError::InvalidAmount(-1).is_retryable());
    }

    #[test]
    fn kinds() {
        assert_eq!(
            LedgerError::InvalidAmount(-1).kind(),
            ErrorKind::InputValidation
        );
        assert_eq!(LedgerError::CycleFrozen(3).kind(), ErrorKind::StateConflict);
        assert_eq!(
            LedgerError::DuplicateObservation(130).kind(),
            ErrorKind::Sequencing
        );
        assert_eq!(
            LedgerError::CycleHalted {
                cycle: 3,
                reason: String::new()
            }
            .kind(),
            ErrorKind::InvariantViolation
        );
    }
}
