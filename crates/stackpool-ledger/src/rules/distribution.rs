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
    events::{Outcome, PayoutRecord, RewardObservation},
    rules::{Applied, Context, ensure_not_halted, is_frozen},
    store::{
        ReadStore, StoreUpdate,
        columns::{observations, payouts},
    },
    summary::weights,
};
use stackpool_kernel::{Address, BurnHeight, Ustx};
use tracing::{Level, info, instrument};

const EVENT_TARGET: &str = "stackpool::ledger::rules::distribution";

/// Record the rewards paid by the consensus mechanism at a given height. Rewards are observed
/// exactly once per height, and distributed later on.
pub fn observe(
    db: &impl ReadStore,
    ctx: &Context<'_>,
    observation: &RewardObservation,
) -> Result<Applied, LedgerError> {
    let burn_height = observation.burn_height;

    let cycle = ctx
        .clock
        .cycle_for_height(burn_height)
        .map_err(LedgerError::InvalidHeight)?
        .cycle;

    if db.observation(&burn_height)?.is_some() {
        return Err(LedgerError::DuplicateObservation(burn_height));
    }

    ensure_not_halted(db, cycle)?;

    info!(
        target: EVENT_TARGET,
        burn_height,
        cycle,
        winners = observation.winners.len(),
        amount_per_address = observation.amount_per_address,
        "rewards.observed"
    );

    let mut update = StoreUpdate::default();
    update.observations.insert(
        burn_height,
        observations::Row::new(
            cycle,
            observation.winners.clone(),
            observation.amount_per_address,
        ),
    );

    Ok((update, Outcome::Observed { burn_height, cycle }))
}

/// Payout records already written for the given height.
pub fn payouts_at(
    db: &impl ReadStore,
    burn_height: BurnHeight,
) -> Result<Vec<PayoutRecord>, LedgerError> {
    Ok(db
        .iter_payouts()?
        .filter(|((_, height), _)| *height == burn_height)
        .map(|(key, row)| PayoutRecord::new(key, row))
        .collect())
}

/// Split the rewards observed at `burn_height` among the participants of the winning pools,
/// according to their weights in the height's cycle.
///
/// Each winning pool receives `amount_per_address` per slot it won. Its participants are paid
/// out of the operator's reserve; the truncation remainder stays in the reserve and is tracked
/// as the pool's dust. Either every pool of the height gets paid, or none does.
///
/// Distributing a height twice yields the records of the first distribution, without writing
/// anything. Heights won by no pool of this ledger are marked distributed with no records.
#[instrument(
    level = Level::TRACE,
    skip_all,
    name = "rewards.distribute",
    fields(burn_height = burn_height, trigger = %trigger),
)]
pub fn distribute(
    db: &impl ReadStore,
    _ctx: &Context<'_>,
    burn_height: BurnHeight,
    trigger: &Address,
) -> Result<Applied, LedgerError> {
    let mut observation = db
        .observation(&burn_height)?
        .ok_or(LedgerError::NotYetObserved(burn_height))?;

    let cycle = observation.cycle;

    if observation.state == observations::State::Distributed {
        return Ok((
            StoreUpdate::default(),
            Outcome::Distributed {
                burn_height,
                cycle,
                payouts: payouts_at(db, burn_height)?,
                dust: observation.dust,
                already_distributed: true,
            },
        ));
    }

    ensure_not_halted(db, cycle)?;

    if !is_frozen(db, cycle)? {
        return Err(LedgerError::CycleNotFrozen(cycle));
    }

    let mut update = StoreUpdate::default();
    let mut records = Vec::new();
    let mut total_reward: Ustx = 0;
    let mut total_dust: Ustx = 0;

    for ((_, operator), aggregate) in db.aggregates_for(cycle)? {
        if !aggregate.frozen {
            continue;
        }

        let slots = observation.slots_won_by(&operator);
        if slots == 0 {
            continue;
        }

        let pool_reward = observation.amount_per_address.saturating_mul(slots);

        let key = (cycle, operator.clone());
        let snapshot = match db.snapshot(&key)? {
            Some(snapshot) => snapshot,
            None => {
                let snapshot = weights::compute(cycle, &operator, &aggregate)?;
                update.snapshots.insert(key, snapshot.clone());
                snapshot
            }
        };

        let (shares, dust) = weights::split(&snapshot.weights, pool_reward);

        let mut paid: Ustx = 0;
        for (participant, amount) in shares {
            let key = (participant, burn_height);
            if db.payout(&key)?.is_some() {
                return Err(LedgerError::TornCommit {
                    height: burn_height,
                    cycle,
                    reason: format!(
                        "{} was already paid while the height is still pending distribution",
                        key.0
                    ),
                });
            }
            paid = paid.saturating_add(amount);
            let row = payouts::Row {
                cycle,
                operator: operator.clone(),
                amount,
            };
            records.push(PayoutRecord::new(key.clone(), row.clone()));
            update.payouts.insert(key, row);
        }

        let mut account = db.reserve(&operator)?.unwrap_or_default();
        if account.reserved < paid {
            return Err(LedgerError::InsufficientReserve {
                operator,
                required: paid,
                available: account.reserved,
            });
        }
        account.reserved -= paid;
        account.deposited = account.deposited.saturating_sub(paid);

        let accumulated = db.dust(&operator)?.unwrap_or_default();

        info!(
            target: EVENT_TARGET,
            burn_height,
            cycle,
            %operator,
            slots,
            pool_reward,
            paid,
            dust,
            "pool.paid"
        );

        update.reserves.insert(operator.clone(), account);
        update
            .dust
            .insert(operator, accumulated.saturating_add(dust));

        total_reward = total_reward.saturating_add(pool_reward);
        total_dust = total_dust.saturating_add(dust);
    }

    observation.state = observations::State::Distributed;
    observation.distributed_by = Some(trigger.clone());
    observation.pool_reward = total_reward;
    observation.dust = total_dust;
    update.observations.insert(burn_height, observation);

    info!(
        target: EVENT_TARGET,
        burn_height,
        cycle,
        payouts = records.len(),
        pool_reward = total_reward,
        dust = total_dust,
        %trigger,
        "rewards.distributed"
    );

    Ok((
        update,
        Outcome::Distributed {
            burn_height,
            cycle,
            payouts: records,
            dust: total_dust,
            already_distributed: false,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        rules::{
            aggregate::freeze_cycle,
            delegation::{allow_caller, delegate, join_pool},
            reserve::{deposit, reserve},
            tests::{WALLET_1, WALLET_2, WALLET_3, WALLET_8, address, deployer},
        },
        store::{Store, in_memory::MemoryStore},
    };
    use stackpool_kernel::{CycleClock, DEVNET_DEPLOYER, ProtocolParameters, RawAmount};

    struct Fixture {
        store: MemoryStore,
        parameters: ProtocolParameters,
        clock: CycleClock,
    }

    impl Fixture {
        /// Devnet pool with three delegators, frozen for cycle 3.
        fn new(reserved: RawAmount) -> Self {
            let parameters = ProtocolParameters::default();
            let clock = parameters.clock().unwrap();
            let fixture = Fixture {
                store: MemoryStore::new(),
                parameters,
                clock,
            };

            for (wallet, amount) in [
                (WALLET_1, 125_000_000_000),
                (WALLET_2, 125_000_000_000),
                (WALLET_8, 50_286_942_145_278),
            ] {
                let participant = address(wallet);
                fixture.commit(allow_caller(
                    &fixture.store,
                    &fixture.ctx(101),
                    &participant,
                    &deployer(),
                ));
                fixture.commit(join_pool(
                    &fixture.store,
                    &fixture.ctx(101),
                    &participant,
                    &deployer(),
                ));
                fixture.commit(delegate(
                    &fixture.store,
                    &fixture.ctx(101),
                    &participant,
                    amount,
                    &deployer(),
                ));
            }

            fixture.commit(deposit(
                &fixture.store,
                &fixture.ctx(101),
                &deployer(),
                11_000_000_000,
            ));
            fixture.commit(reserve(
                &fixture.store,
                &fixture.ctx(101),
                &deployer(),
                reserved,
            ));

            let update = freeze_cycle(&fixture.store, &fixture.ctx(130), 3).unwrap();
            fixture.store.save(&update).unwrap();

            fixture
        }

        fn ctx(&self, height: u64) -> Context<'_> {
            Context::new(&self.parameters, &self.clock, height)
        }

        fn commit(&self, result: Result<Applied, LedgerError>) -> Outcome {
            let (update, outcome) = result.unwrap();
            self.store.save(&update).unwrap();
            outcome
        }

        fn observe(&self, burn_height: BurnHeight, winners: Vec<Address>, amount: Ustx) {
            self.commit(observe(
                &self.store,
                &self.ctx(burn_height),
                &RewardObservation {
                    burn_height,
                    winners,
                    amount_per_address: amount,
                },
            ));
        }
    }

    fn distributed(outcome: Outcome) -> (Vec<PayoutRecord>, Ustx, bool) {
        let Outcome::Distributed {
            payouts,
            dust,
            already_distributed,
            ..
        } = outcome
        else {
            panic!("expected a distribution outcome");
        };
        (payouts, dust, already_distributed)
    }

    #[test]
    fn distribution_conserves_rewards() {
        let fixture = Fixture::new(11_000_000_000);
        fixture.observe(130, vec![deployer()], 1_000_000_000);

        let (payouts, dust, already_distributed) = distributed(fixture.commit(distribute(
            &fixture.store,
            &fixture.ctx(131),
            130,
            &address(WALLET_1),
        )));

        assert!(!already_distributed);
        assert_eq!(payouts.len(), 4);
        let paid: Ustx = payouts.iter().map(|p| p.amount).sum();
        assert_eq!(paid, 999_997_000);
        assert_eq!(dust, 3_000);
        assert_eq!(paid + dust, 1_000_000_000);

        let amount_of = |wallet: &str| {
            payouts
                .iter()
                .find(|p| p.participant == address(wallet))
                .map(|p| p.amount)
        };
        assert_eq!(amount_of(WALLET_1), Some(2_472_000));
        assert_eq!(amount_of(WALLET_8), Some(994_836_000));
        assert_eq!(amount_of(DEVNET_DEPLOYER), Some(217_000));
        assert_eq!(amount_of(WALLET_3), None);

        let account = fixture.store.reserve(&deployer()).unwrap().unwrap();
        assert_eq!(account.reserved, 11_000_000_000 - 999_997_000);
        assert_eq!(account.deposited, 11_000_000_000 - 999_997_000);
        assert_eq!(fixture.store.dust(&deployer()).unwrap(), Some(3_000));

        let observation = fixture.store.observation(&130).unwrap().unwrap();
        assert_eq!(observation.state, observations::State::Distributed);
        assert_eq!(observation.distributed_by, Some(address(WALLET_1)));
        assert_eq!(observation.pool_reward, 1_000_000_000);
        assert_eq!(observation.dust, 3_000);
    }

    #[test]
    fn distribution_is_idempotent() {
        let fixture = Fixture::new(11_000_000_000);
        fixture.observe(131, vec![deployer(), deployer()], 500_000_000);

        let (first, _, _) = distributed(fixture.commit(distribute(
            &fixture.store,
            &fixture.ctx(132),
            131,
            &address(WALLET_2),
        )));

        let (update, outcome) =
            distribute(&fixture.store, &fixture.ctx(133), 131, &address(WALLET_8)).unwrap();
        assert!(update.is_empty());

        let (second, dust, already_distributed) = distributed(outcome);
        assert!(already_distributed);
        assert_eq!(dust, 3_000);
        let mut first = first;
        let mut second = second;
        first.sort_by(|a, b| a.participant.cmp(&b.participant));
        second.sort_by(|a, b| a.participant.cmp(&b.participant));
        assert_eq!(first, second);
    }

    #[test]
    fn height_not_won_by_any_pool() {
        let fixture = Fixture::new(11_000_000_000);
        fixture.observe(132, vec![address(WALLET_3)], 1_000_000_000);

        let (payouts, dust, _) = distributed(fixture.commit(distribute(
            &fixture.store,
            &fixture.ctx(133),
            132,
            &address(WALLET_3),
        )));

        assert!(payouts.is_empty());
        assert_eq!(dust, 0);
        assert_eq!(
            fixture.store.observation(&132).unwrap().map(|o| o.state),
            Some(observations::State::Distributed)
        );
    }

    #[test]
    fn insufficient_reserve_writes_nothing() {
        let fixture = Fixture::new(1_000);
        fixture.observe(130, vec![deployer()], 1_000_000_000);

        let result = distribute(&fixture.store, &fixture.ctx(131), 130, &address(WALLET_1));
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientReserve {
                required: 999_997_000,
                available: 1_000,
                ..
            })
        ));
        assert!(payouts_at(&fixture.store, 130).unwrap().is_empty());
        assert_eq!(
            fixture.store.observation(&130).unwrap().map(|o| o.state),
            Some(observations::State::Observed)
        );
    }

    #[test]
    fn distribute_before_observation() {
        let fixture = Fixture::new(11_000_000_000);
        assert!(matches!(
            distribute(&fixture.store, &fixture.ctx(131), 130, &address(WALLET_1)),
            Err(LedgerError::NotYetObserved(130))
        ));
    }

    #[test]
    fn duplicate_observation() {
        let fixture = Fixture::new(11_000_000_000);
        fixture.observe(130, vec![deployer()], 1_000_000_000);
        let result = observe(
            &fixture.store,
            &fixture.ctx(130),
            &RewardObservation {
                burn_height: 130,
                winners: vec![],
                amount_per_address: 0,
            },
        );
        assert!(matches!(result, Err(LedgerError::DuplicateObservation(130))));
    }

    #[test]
    fn observation_before_activation() {
        let fixture = Fixture::new(11_000_000_000);
        let result = observe(
            &fixture.store,
            &fixture.ctx(99),
            &RewardObservation {
                burn_height: 99,
                winners: vec![deployer()],
                amount_per_address: 1,
            },
        );
        assert!(matches!(result, Err(LedgerError::InvalidHeight(..))));
    }

    #[test]
    fn distribute_in_unfrozen_cycle() {
        let fixture = Fixture::new(11_000_000_000);
        fixture.observe(140, vec![deployer()], 1_000_000_000);
        assert!(matches!(
            distribute(&fixture.store, &fixture.ctx(141), 140, &address(WALLET_1)),
            Err(LedgerError::CycleNotFrozen(4))
        ));
    }
}
