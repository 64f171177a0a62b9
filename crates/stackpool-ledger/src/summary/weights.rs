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

use crate::{
    error::LedgerError,
    store::columns::{aggregates, snapshots},
    summary::{floor_to_u64, safe_ratio},
};
use num::BigUint;
use stackpool_kernel::{Address, CycleId, Ustx, WEIGHT_SCALE, Weight};
use std::collections::BTreeMap;
use tracing::{debug, error};

const EVENT_TARGET: &str = "stackpool::ledger::summary::weights";

/// Compute the weights of every participant of a pool from its frozen aggregate.
///
/// Each qualifying delegator, as well as the operator (through the stake it reserved), receives
/// `floor(stake * WEIGHT_SCALE / (total_locked + operator_stake))`. Because of truncation, weights
/// don't add up to exactly `WEIGHT_SCALE`: each participant loses strictly less than one unit.
/// Any larger gap means the aggregate and the weights disagree, which is reported as a
/// `ReconciliationMismatch`.
pub fn compute(
    cycle: CycleId,
    operator: &Address,
    aggregate: &aggregates::Row,
) -> Result<snapshots::Row, LedgerError> {
    let denominator = aggregate
        .total_locked
        .saturating_add(aggregate.operator_stake);

    let weight_of = |stake: Ustx| -> Weight {
        if denominator == 0 {
            return 0;
        }
        floor_to_u64(safe_ratio(stake, denominator) * BigUint::from(WEIGHT_SCALE))
    };

    let mut weights: BTreeMap<Address, Weight> = aggregate
        .contributions
        .iter()
        .map(|(participant, amount)| (participant.clone(), weight_of(*amount)))
        .collect();

    if aggregate.operator_stake > 0 {
        weights.insert(operator.clone(), weight_of(aggregate.operator_stake));
    }

    if denominator > 0 {
        reconcile(cycle, operator, &weights)?;
    }

    debug!(
        target: EVENT_TARGET,
        cycle,
        %operator,
        participants = weights.len(),
        denominator,
        "weights.computed"
    );

    Ok(snapshots::Row {
        total_locked: aggregate.total_locked,
        operator_stake: aggregate.operator_stake,
        weights,
    })
}

/// Check that weights add up to the scale, within one unit of truncation per participant.
pub fn reconcile(
    cycle: CycleId,
    operator: &Address,
    weights: &BTreeMap<Address, Weight>,
) -> Result<(), LedgerError> {
    let participants = weights.len();
    let total = weights
        .values()
        .fold(0u64, |total, weight| total.saturating_add(*weight));

    let within_bounds = total <= WEIGHT_SCALE && WEIGHT_SCALE - total < participants as u64;

    if !within_bounds {
        error!(
            target: EVENT_TARGET,
            cycle,
            %operator,
            total,
            participants,
            "weights.reconciliation_mismatch"
        );
        return Err(LedgerError::ReconciliationMismatch {
            cycle,
            operator: operator.clone(),
            total,
            participants,
        });
    }

    Ok(())
}

/// Split a pool's reward according to the given weights. Returns each participant's share
/// along with the truncation remainder (dust); shares and dust always add up to `reward`.
pub fn split(weights: &BTreeMap<Address, Weight>, reward: Ustx) -> (Vec<(Address, Ustx)>, Ustx) {
    let shares: Vec<(Address, Ustx)> = weights
        .iter()
        .map(|(participant, weight)| {
            let share = floor_to_u64(safe_ratio(*weight, WEIGHT_SCALE) * BigUint::from(reward));
            (participant.clone(), share)
        })
        .collect();

    let paid = shares
        .iter()
        .fold(0u64, |total, (_, share)| total.saturating_add(*share));

    (shares, reward.saturating_sub(paid))
}
