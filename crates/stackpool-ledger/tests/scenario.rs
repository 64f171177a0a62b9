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

use stackpool_kernel::{Address, BurnHeight, DEVNET_DEPLOYER, Nonce, ProtocolParameters, Ustx};
use stackpool_ledger::{
    Action, Block, BlockReward, Engine, LedgerError, MemoryStore, Outcome, Receipt, Transaction,
};
use std::collections::BTreeMap;

const WALLET_1: &str = "ST1SJ3DTE5DN7X54YDH5D64R3BCB6A2AG2ZQ8YPD5";
const WALLET_2: &str = "ST2CY5V39NHDPWSXMW9QDT3HC3GD6Q6XX4CFRK9AG";
const WALLET_3: &str = "ST2JHG361ZXG51QTKY2NQCVBPPRRE2KZB1HR05NNC";
const WALLET_8: &str = "ST3NBRSFKX28FQ2ZJ1MAKX58HKHSDGNV5N7R21XCP";

const TOTAL_LOCKED: Ustx = 50_536_942_145_278;
const OPERATOR_RESERVE: Ustx = 11_000_000_000;
const REWARD: Ustx = 1_000_000_000;

fn address(raw: &str) -> Address {
    Address::new(raw).unwrap()
}

/// Hands out transactions with consecutive nonces, per sender.
#[derive(Default)]
struct Wallets {
    nonces: BTreeMap<&'static str, Nonce>,
}

impl Wallets {
    fn tx(&mut self, sender: &'static str, action: Action) -> Transaction {
        let nonce = self.nonces.entry(sender).or_default();
        let tx = Transaction {
            sender: address(sender),
            nonce: *nonce,
            action,
        };
        *nonce += 1;
        tx
    }

    fn onboard(&mut self, sender: &'static str, amount: Ustx) -> Vec<Transaction> {
        let operator = address(DEVNET_DEPLOYER);
        vec![
            self.tx(
                sender,
                Action::AllowCaller {
                    operator: operator.clone(),
                },
            ),
            self.tx(
                sender,
                Action::JoinPool {
                    operator: operator.clone(),
                },
            ),
            self.tx(
                sender,
                Action::Delegate {
                    amount: i128::from(amount),
                    operator,
                },
            ),
        ]
    }
}

fn block(burn_height: BurnHeight, transactions: Vec<Transaction>) -> Block {
    Block {
        burn_height,
        transactions,
        reward: None,
    }
}

fn won(burn_height: BurnHeight) -> Block {
    Block {
        burn_height,
        transactions: vec![],
        reward: Some(BlockReward {
            winners: vec![address(DEVNET_DEPLOYER)],
            amount_per_address: REWARD,
        }),
    }
}

fn apply(engine: &mut Engine<MemoryStore>, block: Block) -> Vec<Receipt> {
    let report = engine.roll_forward(&block).unwrap();
    assert_eq!(report.rejected(), 0, "{:?}", report.transactions);
    if let Some(reward) = report.reward {
        reward.unwrap();
    }
    report.transactions.into_iter().map(Result::unwrap).collect()
}

/// The devnet pool: three delegators and an operator backing the pool with its own reserve,
/// locked in for cycle 3.
fn devnet() -> (Engine<MemoryStore>, Wallets) {
    let mut engine = Engine::new(MemoryStore::new(), ProtocolParameters::default()).unwrap();
    let mut wallets = Wallets::default();

    let mut transactions = Vec::new();
    transactions.extend(wallets.onboard(WALLET_1, 125_000_000_000));
    transactions.extend(wallets.onboard(WALLET_2, 125_000_000_000));
    transactions.extend(wallets.onboard(WALLET_8, 50_286_942_145_278));
    transactions.push(wallets.tx(
        DEVNET_DEPLOYER,
        Action::Deposit {
            amount: i128::from(OPERATOR_RESERVE),
        },
    ));
    transactions.push(wallets.tx(
        DEVNET_DEPLOYER,
        Action::Reserve {
            amount: i128::from(OPERATOR_RESERVE),
        },
    ));
    apply(&mut engine, block(101, transactions));

    let lock = wallets.tx(DEVNET_DEPLOYER, Action::LockAggregate { cycle: 3 });
    apply(&mut engine, block(126, vec![lock]));

    (engine, wallets)
}

#[test]
fn pool_entry_of_cycle_three() {
    let (mut engine, _) = devnet();

    let provisional = engine.read_pool_address_entry(3, 0).unwrap().unwrap();
    assert_eq!(provisional.total_ustx, TOTAL_LOCKED);

    apply(&mut engine, block(130, vec![]));

    let entry = engine.read_pool_address_entry(3, 0).unwrap().unwrap();
    assert_eq!(entry.operator, address(DEVNET_DEPLOYER));
    assert_eq!(entry.total_ustx, TOTAL_LOCKED);
    assert_eq!(engine.read_pool_address_entry(3, 1).unwrap(), None);

    assert_eq!(
        engine
            .entry_for_participant(3, &address(WALLET_8))
            .unwrap()
            .map(|entry| entry.index),
        Some(0)
    );
    assert_eq!(
        engine
            .entry_for_participant(3, &address(WALLET_3))
            .unwrap(),
        None
    );
    assert_eq!(
        engine
            .entry_for_participant(3, &address(DEVNET_DEPLOYER))
            .unwrap(),
        None
    );

    assert_eq!(
        engine.locked_balance(&address(DEVNET_DEPLOYER)).unwrap(),
        TOTAL_LOCKED
    );
}

#[test]
fn weights_of_cycle_three() {
    let (mut engine, _) = devnet();

    assert!(matches!(
        engine.weight(&address(WALLET_1), 3),
        Err(LedgerError::CycleNotFrozen(3))
    ));

    apply(&mut engine, block(130, vec![]));

    let weight = |wallet: &str| engine.weight(&address(wallet), 3).unwrap();

    assert_eq!(weight(DEVNET_DEPLOYER), Some(217));
    assert_eq!(weight(WALLET_1), Some(2472));
    assert_eq!(weight(WALLET_2), Some(2472));
    assert_eq!(weight(WALLET_8), Some(994_836));
    assert_eq!(weight(WALLET_3), None);

    // Identical on repeated queries.
    assert_eq!(weight(WALLET_8), Some(994_836));
}

#[test]
fn four_heights_distributed_by_four_participants() {
    let (mut engine, mut wallets) = devnet();

    for height in 130..=133 {
        apply(&mut engine, won(height));
    }

    let triggers = [WALLET_1, WALLET_2, WALLET_8, WALLET_3];
    let transactions = (130..=133)
        .zip(triggers)
        .map(|(burn_height, trigger)| wallets.tx(trigger, Action::Distribute { burn_height }))
        .collect();

    let receipts = apply(&mut engine, block(134, transactions));

    for (receipt, (burn_height, trigger)) in receipts.iter().zip((130..=133).zip(triggers)) {
        let Outcome::Distributed {
            payouts,
            dust,
            already_distributed,
            ..
        } = &receipt.outcome
        else {
            panic!("expected a distribution at {burn_height}");
        };

        assert!(!already_distributed);
        assert_eq!(payouts.len(), 4);
        let paid: Ustx = payouts.iter().map(|payout| payout.amount).sum();
        assert_eq!(paid + dust, REWARD);

        let observation = engine.observation(burn_height).unwrap().unwrap();
        assert_eq!(observation.distributed_by, Some(address(trigger)));
        assert_eq!(observation.pool_reward, REWARD);
        assert_eq!(engine.payouts_at(burn_height).unwrap().len(), 4);
    }

    let history = engine.payouts_for(&address(WALLET_1)).unwrap();
    assert_eq!(
        history
            .iter()
            .map(|payout| (payout.burn_height, payout.amount))
            .collect::<Vec<_>>(),
        vec![
            (130, 2_472_000),
            (131, 2_472_000),
            (132, 2_472_000),
            (133, 2_472_000)
        ]
    );
    assert!(engine.payouts_for(&address(WALLET_3)).unwrap().is_empty());

    let operator = address(DEVNET_DEPLOYER);
    let account = engine.reserve_account(&operator).unwrap();
    assert_eq!(account.reserved, OPERATOR_RESERVE - 4 * 999_997_000);
    assert_eq!(engine.dust(&operator).unwrap(), 4 * 3_000);

    // Distributing again changes nothing, and yields the same records.
    let again = wallets.tx(DEVNET_DEPLOYER, Action::Distribute { burn_height: 130 });
    let receipts = apply(&mut engine, block(135, vec![again]));
    let Outcome::Distributed {
        payouts,
        already_distributed,
        ..
    } = &receipts[0].outcome
    else {
        panic!("expected a distribution");
    };
    assert!(already_distributed);
    assert_eq!(payouts, &engine.payouts_at(130).unwrap());
    assert_eq!(engine.reserve_account(&operator).unwrap(), account);
}

#[test]
fn threshold_and_re_delegation() {
    let (mut engine, mut wallets) = devnet();

    let transactions = wallets.onboard(WALLET_3, 49_999_999_999);
    apply(&mut engine, block(127, transactions));
    apply(&mut engine, block(130, vec![]));

    assert_eq!(engine.weight(&address(WALLET_3), 3).unwrap(), None);
    assert!(
        engine
            .pool_aggregate(3, &address(DEVNET_DEPLOYER))
            .unwrap()
            .is_some_and(|aggregate| aggregate.total_locked == TOTAL_LOCKED)
    );

    // Reaching the threshold exactly qualifies from the next freeze on. The new delegation
    // replaces the previous one.
    let redelegate = wallets.tx(
        WALLET_3,
        Action::Delegate {
            amount: 50_000_000_000,
            operator: address(DEVNET_DEPLOYER),
        },
    );
    apply(&mut engine, block(131, vec![redelegate]));
    apply(&mut engine, block(140, vec![]));

    assert_eq!(
        engine
            .check_delegation(&address(WALLET_3))
            .unwrap()
            .map(|delegation| delegation.amount),
        Some(50_000_000_000)
    );
    assert!(engine.weight(&address(WALLET_3), 4).unwrap().is_some());
    assert_eq!(
        engine
            .pool_aggregate(4, &address(DEVNET_DEPLOYER))
            .unwrap()
            .map(|aggregate| aggregate.total_locked),
        Some(TOTAL_LOCKED + 50_000_000_000)
    );
}

#[test]
fn revoked_delegations_stay_locked_until_cycle_ends() {
    let (mut engine, mut wallets) = devnet();
    apply(&mut engine, block(130, vec![]));

    let revoke = wallets.tx(WALLET_1, Action::Revoke);
    let receipts = apply(&mut engine, block(131, vec![revoke]));

    assert!(matches!(
        receipts[0].outcome,
        Outcome::Revoked {
            locked_until_cycle: Some(4),
            ..
        }
    ));
    assert_eq!(engine.check_delegation(&address(WALLET_1)).unwrap(), None);

    apply(&mut engine, block(140, vec![]));
    assert_eq!(engine.weight(&address(WALLET_1), 4).unwrap(), None);
    assert_eq!(engine.weight(&address(WALLET_1), 3).unwrap(), Some(2472));
}

#[test]
fn re_delegation_during_lock_keeps_stake_stacked() {
    let (mut engine, mut wallets) = devnet();
    apply(&mut engine, block(130, vec![]));
    apply(&mut engine, block(140, vec![]));

    let lowered = [
        (141, WALLET_1, 10_000_000_000),
        (142, WALLET_2, 10_000_000_000),
        (143, WALLET_8, 20_940_000_000_000),
        (144, WALLET_1, 11_000_000_000),
    ];
    for (burn_height, wallet, amount) in lowered {
        let redelegate = wallets.tx(
            wallet,
            Action::Delegate {
                amount,
                operator: address(DEVNET_DEPLOYER),
            },
        );
        apply(&mut engine, block(burn_height, vec![redelegate]));
    }

    apply(&mut engine, block(150, vec![]));

    let entry = engine.read_pool_address_entry(5, 0).unwrap().unwrap();
    assert_eq!(entry.operator, address(DEVNET_DEPLOYER));
    assert_eq!(entry.total_ustx, TOTAL_LOCKED);
    assert_eq!(engine.read_pool_address_entry(5, 1).unwrap(), None);

    assert_eq!(
        engine
            .check_delegation(&address(WALLET_1))
            .unwrap()
            .map(|delegation| delegation.amount),
        Some(11_000_000_000)
    );
    assert_eq!(
        engine
            .entry_for_participant(5, &address(WALLET_1))
            .unwrap()
            .map(|entry| entry.index),
        Some(0)
    );
    assert_eq!(
        engine
            .entry_for_participant(5, &address(DEVNET_DEPLOYER))
            .unwrap(),
        None
    );

    assert_eq!(engine.weight(&address(WALLET_1), 5).unwrap(), Some(2472));
    assert_eq!(engine.weight(&address(WALLET_8), 5).unwrap(), Some(994_836));
}
