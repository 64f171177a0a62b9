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
    events::Outcome,
    rules::{Applied, Context, is_frozen},
    store::{
        ReadStore, StoreUpdate,
        columns::{aggregates, cycles, pool_entries},
    },
    summary::aggregate::{PoolAddressEntry, Tally},
};
use stackpool_kernel::{Address, CycleId, Ustx};
use std::collections::BTreeSet;
use tracing::{Level, info, instrument};

const EVENT_TARGET: &str = "stackpool::ledger::rules::aggregate";

/// Index of the next entry to publish in the given cycle.
fn next_index(db: &impl ReadStore, cycle: CycleId) -> Result<u32, LedgerError> {
    index_after(cycle, db.pool_entries_for(cycle)?.len())
}

fn index_after(cycle: CycleId, published: usize) -> Result<u32, LedgerError> {
    u32::try_from(published).map_err(|_| LedgerError::PoolEntriesExhausted(cycle))
}

fn entry_row(operator: &Address, tally: &Tally) -> pool_entries::Row {
    pool_entries::Row {
        operator: operator.clone(),
        total_ustx: tally.total_locked(),
        represented: tally.qualifying.keys().cloned().collect(),
    }
}

fn operator_stake(db: &impl ReadStore, operator: &Address) -> Result<Ustx, LedgerError> {
    Ok(db
        .reserve(operator)?
        .map(|account| account.reserved)
        .unwrap_or_default())
}

/// Freeze the aggregates of every registered pool for `cycle`, once the cycle's prepare phase
/// closes.
///
/// Aggregates are recomputed from the delegations active at that point, even for pools that
/// published a provisional entry earlier. Pools keep the index of their provisional entry, even
/// when no qualifying stake remains: published entries are never withdrawn. Other pools are
/// appended after, provided they have qualifying stake. Every counted delegation is locked until
/// the end of the cycle, for the stake it was counted for.
///
/// Freezing an already frozen cycle yields an empty update.
#[instrument(level = Level::TRACE, skip_all, name = "aggregate.freeze", fields(cycle = cycle))]
pub fn freeze_cycle(
    db: &impl ReadStore,
    ctx: &Context<'_>,
    cycle: CycleId,
) -> Result<StoreUpdate, LedgerError> {
    let mut update = StoreUpdate::default();

    if is_frozen(db, cycle)? {
        return Ok(update);
    }

    let mut published = db.pool_entries_for(cycle)?.len();

    let operators: BTreeSet<&Address> = ctx.parameters.pool_operators.iter().collect();

    for operator in operators {
        let tally = Tally::new(db, operator, cycle, ctx.parameters.minimum_delegation_ustx)?;
        let total_locked = tally.total_locked();
        let operator_stake = operator_stake(db, operator)?;

        let provisional_index = db
            .aggregate(&(cycle, operator.clone()))?
            .and_then(|aggregate| aggregate.index);

        let index = match provisional_index {
            Some(index) => Some(index),
            None if total_locked > 0 => {
                let index = index_after(cycle, published)?;
                published += 1;
                Some(index)
            }
            None => None,
        };

        if let Some(index) = index {
            update
                .pool_entries
                .insert((cycle, index), entry_row(operator, &tally));
        }

        for (participant, stake) in &tally.qualifying {
            if let Some(mut delegation) = db.delegation(participant)? {
                let until = cycle + 1;
                delegation.locked_until_cycle = Some(
                    delegation
                        .locked_until_cycle
                        .map_or(until, |current| current.max(until)),
                );
                delegation.locked_amount = *stake;
                update.delegations.insert(participant.clone(), delegation);
            }
        }

        info!(
            target: EVENT_TARGET,
            cycle,
            %operator,
            index = ?index,
            total_locked,
            operator_stake,
            qualifying = tally.qualifying.len(),
            below_threshold = tally.below_threshold.len(),
            "aggregate.frozen"
        );

        update.aggregates.insert(
            (cycle, operator.clone()),
            aggregates::Row {
                index,
                total_locked,
                operator_stake,
                contributions: tally.qualifying,
                frozen: true,
            },
        );
    }

    update.cycles.insert(
        cycle,
        cycles::Row {
            frozen_at: ctx.height,
            halted: None,
        },
    );

    Ok(update)
}

/// Publish a provisional entry for the operator's pool in `cycle`, during the cycle's prepare
/// phase. The entry is sealed (and recomputed) when the cycle freezes.
pub fn lock_aggregate(
    db: &impl ReadStore,
    ctx: &Context<'_>,
    operator: &Address,
    cycle: CycleId,
) -> Result<Applied, LedgerError> {
    if !ctx.parameters.is_pool_operator(operator) {
        return Err(LedgerError::UnknownPool(operator.clone()));
    }

    if is_frozen(db, cycle)? || ctx.clock.is_frozen(cycle, ctx.height) {
        return Err(LedgerError::CycleFrozen(cycle));
    }

    let prepare_phase_start = ctx
        .clock
        .prepare_phase_start(cycle)
        .map_err(|_| LedgerError::NotInPreparePhase(cycle))?;

    if ctx.height < prepare_phase_start {
        return Err(LedgerError::NotInPreparePhase(cycle));
    }

    let tally = Tally::new(db, operator, cycle, ctx.parameters.minimum_delegation_ustx)?;
    let total_locked = tally.total_locked();

    let index = match db
        .aggregate(&(cycle, operator.clone()))?
        .and_then(|aggregate| aggregate.index)
    {
        Some(index) => Some(index),
        None if total_locked > 0 => Some(next_index(db, cycle)?),
        None => None,
    };

    let mut update = StoreUpdate::default();

    let entry = index.map(|index| {
        let row = entry_row(operator, &tally);
        update.pool_entries.insert((cycle, index), row.clone());
        PoolAddressEntry::new((cycle, index), row)
    });

    info!(
        target: EVENT_TARGET,
        cycle,
        %operator,
        index = ?index,
        total_locked,
        "aggregate.locked"
    );

    update.aggregates.insert(
        (cycle, operator.clone()),
        aggregates::Row {
            index,
            total_locked,
            operator_stake: operator_stake(db, operator)?,
            contributions: tally.qualifying,
            frozen: false,
        },
    );

    Ok((
        update,
        Outcome::AggregateLocked {
            operator: operator.clone(),
            cycle,
            entry,
        },
    ))
}
