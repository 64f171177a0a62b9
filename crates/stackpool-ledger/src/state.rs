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
    error::{ErrorKind, LedgerError},
    events::{Action, Block, BlockReport, PayoutRecord, Receipt, RewardObservation, Transaction},
    rules::{self, Applied, Context},
    store::{
        Store, StoreUpdate,
        columns::{cycles, delegations, observations, reserves},
    },
    summary::{
        aggregate::{PoolAddressEntry, PoolAggregate},
        weights,
    },
};
use stackpool_kernel::{
    Address, BurnHeight, CycleClock, CycleId, CyclePosition, ProtocolParameters, Ustx, Weight,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{Level, debug, error, instrument, warn};

const EVENT_TARGET: &str = "stackpool::ledger::state";

// Engine
// ----------------------------------------------------------------------------

/// The accounting engine: a single state machine advanced by blocks of the burn chain, and by
/// events submitted in between.
///
/// Every accepted event is committed to the underlying store as one atomic update, so the
/// engine holds no state of its own besides its (fixed) configuration. Restarting from the same
/// store yields the same engine.
pub struct Engine<S: Store> {
    store: S,
    parameters: ProtocolParameters,
    clock: CycleClock,
}

impl<S: Store> Engine<S> {
    /// Open an engine on top of the given store.
    ///
    /// Distributions are checked for consistency upon opening: a height whose payouts don't add
    /// up to its recorded reward halts the cycle it belongs to. The engine opens regardless.
    pub fn new(store: S, parameters: ProtocolParameters) -> Result<Self, LedgerError> {
        let clock = parameters.clock().map_err(LedgerError::InvalidParameters)?;

        let engine = Engine {
            store,
            parameters,
            clock,
        };

        engine.verify_integrity()?;

        Ok(engine)
    }

    pub fn parameters(&self) -> &ProtocolParameters {
        &self.parameters
    }

    pub fn clock(&self) -> &CycleClock {
        &self.clock
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // Writes
    // ------------------------------------------------------------------------

    /// Advance the ledger to the given block.
    ///
    /// Cycles whose prepare phase closes at or before the block are frozen first. Then, each
    /// transaction is applied in order and committed on its own; rejected transactions are
    /// reported and leave no trace. The block's reward observation, if any, comes last.
    ///
    /// Blocks must come in strictly increasing height. A block at or below the tip is refused
    /// without touching the state. Failing to access the store aborts the block, leaving the tip
    /// where it was.
    #[instrument(
        level = Level::TRACE,
        skip_all,
        name = "engine.roll_forward",
        fields(burn_height = block.burn_height, transactions = block.transactions.len()),
    )]
    pub fn roll_forward(&mut self, block: &Block) -> Result<BlockReport, LedgerError> {
        let height = block.burn_height;
        let tip = self.store.tip()?;

        if let Some(tip) = tip.filter(|tip| height <= *tip) {
            return Err(LedgerError::NonMonotonicHeight { tip, height });
        }

        let frozen_cycles = self.freeze_until(tip, height)?;

        let mut transactions = Vec::with_capacity(block.transactions.len());
        for transaction in &block.transactions {
            transactions.push(abort_on_storage(
                self.apply_transaction(height, transaction),
            )?);
        }

        let reward = block
            .reward_observation()
            .map(|observation| abort_on_storage(self.apply_observation(height, &observation)))
            .transpose()?;

        self.store.save(&StoreUpdate {
            tip: Some(height),
            ..StoreUpdate::default()
        })?;

        let report = BlockReport {
            burn_height: height,
            frozen_cycles,
            transactions,
            reward,
        };

        debug!(
            target: EVENT_TARGET,
            burn_height = height,
            accepted = report.accepted(),
            rejected = report.rejected(),
            "block.applied"
        );

        Ok(report)
    }

    /// Apply a transaction at the current tip, outside of any block.
    pub fn submit(&mut self, transaction: &Transaction) -> Result<Receipt, LedgerError> {
        let height = self.store.tip()?.unwrap_or_default();
        self.apply_transaction(height, transaction)
    }

    /// Record rewards observed by the consensus layer, outside of any block.
    pub fn observe(&mut self, observation: &RewardObservation) -> Result<Receipt, LedgerError> {
        let height = self
            .store
            .tip()?
            .unwrap_or_default()
            .max(observation.burn_height);
        self.apply_observation(height, observation)
    }

    fn ctx(&self, height: BurnHeight) -> Context<'_> {
        Context::new(&self.parameters, &self.clock, height)
    }

    /// Freeze every cycle starting after the `tip` and up to `height`. Each cycle is committed
    /// on its own.
    fn freeze_until(
        &self,
        tip: Option<BurnHeight>,
        height: BurnHeight,
    ) -> Result<Vec<CycleId>, LedgerError> {
        let Ok(target) = self.clock.cycle_for_height(height) else {
            return Ok(Vec::new());
        };

        let from = tip
            .and_then(|tip| self.clock.cycle_for_height(tip).ok())
            .map(|position| position.cycle + 1)
            .unwrap_or_default();

        let mut frozen = Vec::new();
        for cycle in from..=target.cycle {
            let update = rules::aggregate::freeze_cycle(&self.store, &self.ctx(height), cycle)?;
            if !update.is_empty() {
                self.store.save(&update)?;
                frozen.push(cycle);
            }
        }

        Ok(frozen)
    }

    fn apply_transaction(
        &self,
        height: BurnHeight,
        transaction: &Transaction,
    ) -> Result<Receipt, LedgerError> {
        let Transaction {
            sender,
            nonce,
            action,
        } = transaction;

        let expected = self.store.sequence(sender)?.unwrap_or_default();
        if *nonce != expected {
            warn!(
                target: EVENT_TARGET,
                %sender,
                expected,
                received = nonce,
                action = action.name(),
                "transaction.stale_sequence"
            );
            return Err(LedgerError::StaleSequence {
                sender: sender.clone(),
                expected,
                received: *nonce,
            });
        }

        let ctx = self.ctx(height);

        match self.dispatch(&ctx, sender, action) {
            Ok((mut update, outcome)) => {
                update.sequences.insert(sender.clone(), expected + 1);
                self.store.save(&update)?;
                debug!(
                    target: EVENT_TARGET,
                    %sender,
                    nonce,
                    action = action.name(),
                    rows = update.len(),
                    "transaction.accepted"
                );
                Ok(Receipt {
                    burn_height: height,
                    sender: Some(sender.clone()),
                    nonce: Some(*nonce),
                    outcome,
                })
            }
            Err(e) => {
                self.reject(&e, action.name())?;
                Err(e)
            }
        }
    }

    fn dispatch(
        &self,
        ctx: &Context<'_>,
        sender: &Address,
        action: &Action,
    ) -> Result<Applied, LedgerError> {
        let db = &self.store;
        match action {
            Action::AllowCaller { operator } => {
                rules::delegation::allow_caller(db, ctx, sender, operator)
            }
            Action::JoinPool { operator } => {
                rules::delegation::join_pool(db, ctx, sender, operator)
            }
            Action::Delegate { amount, operator } => {
                rules::delegation::delegate(db, ctx, sender, *amount, operator)
            }
            Action::Revoke => rules::delegation::revoke(db, ctx, sender),
            Action::Deposit { amount } => rules::reserve::deposit(db, ctx, sender, *amount),
            Action::Reserve { amount } => rules::reserve::reserve(db, ctx, sender, *amount),
            Action::Release { amount } => rules::reserve::release(db, ctx, sender, *amount),
            Action::LockAggregate { cycle } => {
                rules::aggregate::lock_aggregate(db, ctx, sender, *cycle)
            }
            Action::Distribute { burn_height } => {
                rules::distribution::distribute(db, ctx, *burn_height, sender)
            }
        }
    }

    fn apply_observation(
        &self,
        height: BurnHeight,
        observation: &RewardObservation,
    ) -> Result<Receipt, LedgerError> {
        match rules::distribution::observe(&self.store, &self.ctx(height), observation) {
            Ok((update, outcome)) => {
                self.store.save(&update)?;
                Ok(Receipt {
                    burn_height: height,
                    sender: None,
                    nonce: None,
                    outcome,
                })
            }
            Err(e) => {
                self.reject(&e, "observe")?;
                Err(e)
            }
        }
    }

    /// Report a rejected event, halting the cycle it concerns when the rejection stems from an
    /// invariant violation.
    fn reject(&self, e: &LedgerError, action: &'static str) -> Result<(), LedgerError> {
        if let Some(cycle) = e.cycle_to_halt() {
            return self.halt(cycle, e.to_string());
        }

        let kind = e.kind();
        match kind {
            ErrorKind::InvariantViolation | ErrorKind::Storage => {
                error!(target: EVENT_TARGET, action, %kind, reason = %e, "event.rejected")
            }
            ErrorKind::InputValidation | ErrorKind::StateConflict | ErrorKind::Sequencing => {
                debug!(target: EVENT_TARGET, action, %kind, reason = %e, "event.rejected")
            }
        }

        Ok(())
    }

    /// Refuse any further mutation touching `cycle`.
    fn halt(&self, cycle: CycleId, reason: String) -> Result<(), LedgerError> {
        let existing = self.store.cycle(&cycle)?;

        if existing.as_ref().is_some_and(|row| row.halted.is_some()) {
            return Ok(());
        }

        error!(target: EVENT_TARGET, cycle, %reason, "cycle.halted");

        let frozen_at = match existing {
            Some(row) => row.frozen_at,
            None => self.store.tip()?.unwrap_or_default(),
        };

        let mut update = StoreUpdate::default();
        update.cycles.insert(
            cycle,
            cycles::Row {
                frozen_at,
                halted: Some(reason),
            },
        );

        Ok(self.store.save(&update)?)
    }

    /// Look for distributions that were only partially committed, and halt their cycles.
    /// Returns the cycles halted as a result.
    #[instrument(level = Level::TRACE, skip_all, name = "engine.verify_integrity")]
    fn verify_integrity(&self) -> Result<Vec<CycleId>, LedgerError> {
        let mut paid: BTreeMap<BurnHeight, Ustx> = BTreeMap::new();
        for ((_, height), row) in self.store.iter_payouts()? {
            let total = paid.entry(height).or_default();
            *total = total.saturating_add(row.amount);
        }

        let mut torn = BTreeMap::new();
        for (height, observation) in self.store.iter_observations()? {
            let paid = paid.get(&height).copied();
            let reason = match (observation.state, paid) {
                (observations::State::Observed, Some(..)) => Some(format!(
                    "payouts exist at height {height}, which isn't marked as distributed"
                )),
                (observations::State::Distributed, paid) => {
                    let paid = paid.unwrap_or_default();
                    (paid.saturating_add(observation.dust) != observation.pool_reward).then(|| {
                        format!(
                            "payouts at height {height} ({paid}) and dust ({}) don't add up to \
                             the pool reward ({})",
                            observation.dust, observation.pool_reward
                        )
                    })
                }
                (observations::State::Observed, None) => None,
            };

            if let Some(reason) = reason {
                torn.entry(observation.cycle).or_insert_with(|| {
                    LedgerError::TornCommit {
                        height,
                        cycle: observation.cycle,
                        reason,
                    }
                    .to_string()
                });
            }
        }

        let halted: Vec<CycleId> = torn.keys().copied().collect();
        for (cycle, reason) in torn {
            self.halt(cycle, reason)?;
        }

        if halted.is_empty() {
            debug!(target: EVENT_TARGET, "integrity.verified");
        } else {
            warn!(target: EVENT_TARGET, cycles = ?halted, "integrity.violated");
        }

        Ok(halted)
    }

    // Queries
    // ------------------------------------------------------------------------

    pub fn tip(&self) -> Result<Option<BurnHeight>, LedgerError> {
        Ok(self.store.tip()?)
    }

    /// Cycle and phase of the tip. `None` until the tip reaches the activation height.
    pub fn current_position(&self) -> Result<Option<CyclePosition>, LedgerError> {
        Ok(self
            .store
            .tip()?
            .and_then(|tip| self.clock.cycle_for_height(tip).ok()))
    }

    /// Freeze status of a cycle; `None` until frozen.
    pub fn cycle_status(&self, cycle: CycleId) -> Result<Option<cycles::Row>, LedgerError> {
        Ok(self.store.cycle(&cycle)?)
    }

    /// Share of the rewards of `cycle` the participant is entitled to, in units of
    /// `WEIGHT_SCALE`. `None` for participants that don't qualify.
    ///
    /// Weights are computed once, upon first request, and never change afterwards.
    pub fn weight(
        &self,
        participant: &Address,
        cycle: CycleId,
    ) -> Result<Option<Weight>, LedgerError> {
        let status = self
            .store
            .cycle(&cycle)?
            .ok_or(LedgerError::CycleNotFrozen(cycle))?;

        if let Some(reason) = status.halted {
            return Err(LedgerError::CycleHalted { cycle, reason });
        }

        for ((_, operator), aggregate) in self.store.aggregates_for(cycle)? {
            if !aggregate.frozen
                || (&operator != participant && !aggregate.contributions.contains_key(participant))
            {
                continue;
            }

            let key = (cycle, operator);

            let snapshot = match self.store.snapshot(&key)? {
                Some(snapshot) => snapshot,
                None => {
                    let snapshot = match weights::compute(cycle, &key.1, &aggregate) {
                        Ok(snapshot) => snapshot,
                        Err(e) => {
                            self.reject(&e, "weight")?;
                            return Err(e);
                        }
                    };
                    let mut update = StoreUpdate::default();
                    update.snapshots.insert(key, snapshot.clone());
                    self.store.save(&update)?;
                    snapshot
                }
            };

            return Ok(snapshot.weights.get(participant).copied());
        }

        Ok(None)
    }

    /// The participant's active delegation, if any.
    pub fn check_delegation(
        &self,
        participant: &Address,
    ) -> Result<Option<delegations::Row>, LedgerError> {
        rules::delegation::check_delegation(&self.store, participant)
    }

    pub fn read_pool_address_entry(
        &self,
        cycle: CycleId,
        index: u32,
    ) -> Result<Option<PoolAddressEntry>, LedgerError> {
        Ok(self
            .store
            .pool_entry(&(cycle, index))?
            .map(|row| PoolAddressEntry::new((cycle, index), row)))
    }

    /// The entry of `cycle` representing the given participant, if any. Pool operators aren't
    /// represented by their own pool's entry.
    pub fn entry_for_participant(
        &self,
        cycle: CycleId,
        participant: &Address,
    ) -> Result<Option<PoolAddressEntry>, LedgerError> {
        Ok(self
            .store
            .pool_entries_for(cycle)?
            .into_iter()
            .map(|(key, row)| PoolAddressEntry::new(key, row))
            .find(|entry| entry.represents(participant)))
    }

    pub fn pool_aggregate(
        &self,
        cycle: CycleId,
        operator: &Address,
    ) -> Result<Option<PoolAggregate>, LedgerError> {
        let key = (cycle, operator.clone());
        Ok(self
            .store
            .aggregate(&key)?
            .map(|row| PoolAggregate::new(key, row)))
    }

    pub fn pool_members(&self, operator: &Address) -> Result<BTreeSet<Address>, LedgerError> {
        Ok(self
            .store
            .iter_memberships()?
            .filter(|(_, membership)| &membership.operator == operator)
            .map(|(participant, _)| participant)
            .collect())
    }

    /// Payout history of a participant, ordered by height.
    pub fn payouts_for(&self, participant: &Address) -> Result<Vec<PayoutRecord>, LedgerError> {
        let mut records: Vec<PayoutRecord> = self
            .store
            .iter_payouts()?
            .filter(|((p, _), _)| p == participant)
            .map(|(key, row)| PayoutRecord::new(key, row))
            .collect();
        records.sort_by_key(|record| record.burn_height);
        Ok(records)
    }

    pub fn payouts_at(&self, burn_height: BurnHeight) -> Result<Vec<PayoutRecord>, LedgerError> {
        rules::distribution::payouts_at(&self.store, burn_height)
    }

    pub fn observation(
        &self,
        burn_height: BurnHeight,
    ) -> Result<Option<observations::Row>, LedgerError> {
        Ok(self.store.observation(&burn_height)?)
    }

    pub fn reserve_account(&self, provider: &Address) -> Result<reserves::Row, LedgerError> {
        Ok(self.store.reserve(provider)?.unwrap_or_default())
    }

    /// Truncation remainders accumulated by the pool across all its distributions.
    pub fn dust(&self, operator: &Address) -> Result<Ustx, LedgerError> {
        Ok(self.store.dust(operator)?.unwrap_or_default())
    }

    /// Stake currently locked in the pool: the total of its frozen aggregate for the tip's cycle.
    pub fn locked_balance(&self, operator: &Address) -> Result<Ustx, LedgerError> {
        let Some(position) = self.current_position()? else {
            return Ok(0);
        };

        Ok(self
            .store
            .aggregate(&(position.cycle, operator.clone()))?
            .filter(|aggregate| aggregate.frozen)
            .map(|aggregate| aggregate.total_locked)
            .unwrap_or_default())
    }
}

/// Turn a storage failure into a hard error, and keep any other rejection as the event's result.
fn abort_on_storage<T>(
    result: Result<T, LedgerError>,
) -> Result<Result<T, LedgerError>, LedgerError> {
    match result {
        Err(e) if e.kind() == ErrorKind::Storage => {
            error!(target: EVENT_TARGET, reason = %e, "block.aborted");
            Err(e)
        }
        result => Ok(result),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        events::{BlockReward, Outcome},
        rules::tests::{WALLET_1, WALLET_2, WALLET_3, address, deployer},
        store::{
            ReadStore,
            columns::{aggregates, payouts},
            in_memory::MemoryStore,
        },
    };
    use stackpool_kernel::RawAmount;

    fn engine() -> Engine<MemoryStore> {
        Engine::new(MemoryStore::new(), ProtocolParameters::default()).unwrap()
    }

    fn tx(sender: &str, nonce: u64, action: Action) -> Transaction {
        Transaction {
            sender: address(sender),
            nonce,
            action,
        }
    }

    fn block(burn_height: BurnHeight, transactions: Vec<Transaction>) -> Block {
        Block {
            burn_height,
            transactions,
            reward: None,
        }
    }

    fn onboard(sender: &str, amount: RawAmount) -> Vec<Transaction> {
        vec![
            tx(sender, 0, Action::AllowCaller { operator: deployer() }),
            tx(sender, 1, Action::JoinPool { operator: deployer() }),
            tx(
                sender,
                2,
                Action::Delegate {
                    amount,
                    operator: deployer(),
                },
            ),
        ]
    }

    #[test]
    fn stale_sequence_does_not_consume_nonce() {
        let mut engine = engine();
        let report = engine
            .roll_forward(&block(
                101,
                vec![
                    tx(WALLET_1, 1, Action::AllowCaller { operator: deployer() }),
                    tx(WALLET_1, 0, Action::AllowCaller { operator: deployer() }),
                ],
            ))
            .unwrap();

        assert!(matches!(
            report.transactions[0],
            Err(LedgerError::StaleSequence {
                expected: 0,
                received: 1,
                ..
            })
        ));
        assert!(report.transactions[1].is_ok());
        assert_eq!(engine.store().sequence(&address(WALLET_1)).unwrap(), Some(1));
    }

    #[test]
    fn rejected_events_leave_no_trace() {
        let mut engine = engine();
        let report = engine
            .roll_forward(&block(
                101,
                vec![tx(WALLET_1, 0, Action::Deposit { amount: -5 })],
            ))
            .unwrap();
        assert!(matches!(
            report.transactions[0],
            Err(LedgerError::InvalidAmount(-5))
        ));
        assert_eq!(engine.store().sequence(&address(WALLET_1)).unwrap(), None);
        assert_eq!(engine.reserve_account(&address(WALLET_1)).unwrap().deposited, 0);
    }

    #[test]
    fn blocks_must_increase() {
        let mut engine = engine();
        engine.roll_forward(&block(101, vec![])).unwrap();
        assert!(matches!(
            engine.roll_forward(&block(101, onboard(WALLET_1, 125_000_000_000))),
            Err(LedgerError::NonMonotonicHeight {
                tip: 101,
                height: 101
            })
        ));
        assert_eq!(engine.check_delegation(&address(WALLET_1)).unwrap(), None);
    }

    #[test]
    fn cycles_freeze_at_their_start() {
        let mut engine = engine();
        engine
            .roll_forward(&block(101, onboard(WALLET_1, 125_000_000_000)))
            .unwrap();

        assert!(matches!(
            engine.weight(&address(WALLET_1), 1),
            Err(LedgerError::CycleNotFrozen(1))
        ));

        let report = engine.roll_forward(&block(125, vec![])).unwrap();
        assert_eq!(report.frozen_cycles, vec![1, 2]);

        let aggregate = engine.pool_aggregate(2, &deployer()).unwrap().unwrap();
        assert_eq!(aggregate.total_locked, 125_000_000_000);
        assert_eq!(engine.locked_balance(&deployer()).unwrap(), 125_000_000_000);
        assert_eq!(
            engine.weight(&address(WALLET_1), 2).unwrap(),
            Some(1_000_000)
        );
        assert_eq!(engine.weight(&address(WALLET_3), 2).unwrap(), None);
    }

    #[test]
    fn weights_are_persisted_on_first_query() {
        let mut engine = engine();
        engine
            .roll_forward(&block(101, onboard(WALLET_1, 125_000_000_000)))
            .unwrap();
        engine.roll_forward(&block(110, vec![])).unwrap();

        assert_eq!(engine.store().snapshot(&(1, deployer())).unwrap(), None);
        let first = engine.weight(&address(WALLET_1), 1).unwrap();

        engine
            .roll_forward(&block(112, onboard(WALLET_2, 125_000_000_000)))
            .unwrap();

        assert!(engine.store().snapshot(&(1, deployer())).unwrap().is_some());
        assert_eq!(engine.weight(&address(WALLET_1), 1).unwrap(), first);
        assert_eq!(engine.weight(&address(WALLET_2), 1).unwrap(), None);
    }

    #[test]
    fn torn_distribution_halts_cycle_on_open() {
        let store = MemoryStore::new();

        let mut update = StoreUpdate::default();
        update.cycles.insert(
            3,
            cycles::Row {
                frozen_at: 130,
                halted: None,
            },
        );
        update
            .observations
            .insert(131, observations::Row::new(3, vec![deployer()], 1_000));
        update.payouts.insert(
            (address(WALLET_1), 131),
            payouts::Row {
                cycle: 3,
                operator: deployer(),
                amount: 1_000,
            },
        );
        store.save(&update).unwrap();

        let engine = Engine::new(store, ProtocolParameters::default()).unwrap();

        assert!(matches!(
            engine.weight(&address(WALLET_1), 3),
            Err(LedgerError::CycleHalted { cycle: 3, .. })
        ));
        assert!(
            engine
                .cycle_status(3)
                .unwrap()
                .is_some_and(|row| row.halted.is_some())
        );
    }

    #[test]
    fn halted_cycle_refuses_observations_and_distributions() {
        let store = MemoryStore::new();

        let mut update = StoreUpdate::default();
        update.cycles.insert(
            3,
            cycles::Row {
                frozen_at: 130,
                halted: Some("weights don't reconcile".to_string()),
            },
        );
        update
            .observations
            .insert(131, observations::Row::new(3, vec![deployer()], 1_000));
        store.save(&update).unwrap();

        let mut engine = Engine::new(store, ProtocolParameters::default()).unwrap();

        assert!(matches!(
            engine.observe(&RewardObservation {
                burn_height: 132,
                winners: vec![deployer()],
                amount_per_address: 1_000,
            }),
            Err(LedgerError::CycleHalted { cycle: 3, .. })
        ));
        assert_eq!(engine.observation(132).unwrap(), None);

        assert!(matches!(
            engine.submit(&tx(WALLET_1, 0, Action::Distribute { burn_height: 131 })),
            Err(LedgerError::CycleHalted { cycle: 3, .. })
        ));
        assert!(engine.payouts_at(131).unwrap().is_empty());
        assert_eq!(engine.store().sequence(&address(WALLET_1)).unwrap(), None);
        assert!(
            engine
                .observation(131)
                .unwrap()
                .is_some_and(|observation| observation.distributed_by.is_none())
        );
    }

    #[test]
    fn reconciliation_mismatch_halts_cycle() {
        let store = MemoryStore::new();

        let mut update = StoreUpdate::default();
        update.cycles.insert(
            3,
            cycles::Row {
                frozen_at: 130,
                halted: None,
            },
        );
        update.aggregates.insert(
            (3, deployer()),
            aggregates::Row {
                index: Some(0),
                total_locked: 125_000_000_000,
                operator_stake: 0,
                contributions: BTreeMap::from([
                    (address(WALLET_1), 125_000_000_000),
                    (address(WALLET_2), 125_000_000_000),
                ]),
                frozen: true,
            },
        );
        store.save(&update).unwrap();

        let engine = Engine::new(store, ProtocolParameters::default()).unwrap();

        assert!(matches!(
            engine.weight(&address(WALLET_1), 3),
            Err(LedgerError::ReconciliationMismatch { cycle: 3, .. })
        ));
        assert!(
            engine
                .cycle_status(3)
                .unwrap()
                .is_some_and(|row| row.frozen_at == 130 && row.halted.is_some())
        );
        assert_eq!(engine.store().snapshot(&(3, deployer())).unwrap(), None);

        assert!(matches!(
            engine.weight(&address(WALLET_2), 3),
            Err(LedgerError::CycleHalted { cycle: 3, .. })
        ));
    }

    #[test]
    fn observations_come_with_blocks() {
        let mut engine = engine();
        let report = engine
            .roll_forward(&Block {
                burn_height: 131,
                transactions: vec![],
                reward: Some(BlockReward {
                    winners: vec![deployer()],
                    amount_per_address: 1_000,
                }),
            })
            .unwrap();

        assert!(matches!(
            report.reward,
            Some(Ok(Receipt {
                outcome: Outcome::Observed { cycle: 3, .. },
                ..
            }))
        ));

        assert!(matches!(
            engine.observe(&RewardObservation {
                burn_height: 131,
                winners: vec![],
                amount_per_address: 0,
            }),
            Err(LedgerError::DuplicateObservation(131))
        ));
    }

    #[test]
    fn submit_between_blocks() {
        let mut engine = engine();
        engine.roll_forward(&block(101, vec![])).unwrap();
        let receipt = engine
            .submit(&tx(WALLET_1, 0, Action::AllowCaller { operator: deployer() }))
            .unwrap();
        assert_eq!(receipt.burn_height, 101);
        assert_eq!(receipt.nonce, Some(0));
    }
}
