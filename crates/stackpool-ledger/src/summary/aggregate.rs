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

use crate::store::{
    ReadStore, StoreError,
    columns::{aggregates, pool_entries},
};
use serde::Serialize;
use stackpool_kernel::{Address, CycleId, Ustx};
use std::collections::{BTreeMap, BTreeSet};

/// Stake currently delegated to a pool, split according to the minimum delegation threshold.
///
/// Below-threshold delegations remain tracked, but don't count towards the pool's locked total
/// nor earn any weight.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    pub qualifying: BTreeMap<Address, Ustx>,
    pub below_threshold: BTreeMap<Address, Ustx>,
}

impl Tally {
    /// Tally the active delegations made to `operator`, as they'd count when `cycle` freezes.
    /// Delegations still locked from the previous cycle count for at least their locked amount.
    pub fn new(
        db: &impl ReadStore,
        operator: &Address,
        cycle: CycleId,
        minimum_delegation: Ustx,
    ) -> Result<Self, StoreError> {
        let mut tally = Tally::default();

        for (participant, delegation) in db.iter_delegations()? {
            if !delegation.active || &delegation.operator != operator {
                continue;
            }

            let stake = delegation.stake_for(cycle);
            if stake >= minimum_delegation {
                tally.qualifying.insert(participant, stake);
            } else {
                tally.below_threshold.insert(participant, stake);
            }
        }

        Ok(tally)
    }

    /// Sum of qualifying delegations. Saturates rather than overflowing, although the total
    /// supply of µSTX fits comfortably in 64 bits.
    pub fn total_locked(&self) -> Ustx {
        self.qualifying
            .values()
            .fold(0, |total, amount| total.saturating_add(*amount))
    }
}

/// An entry of a cycle's reward address list: the pool's address along with the stake it
/// represents. The operator's own stake backs the pool but isn't part of the entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolAddressEntry {
    pub reward_cycle: CycleId,
    pub index: u32,
    pub operator: Address,
    pub total_ustx: Ustx,
    pub represented: BTreeSet<Address>,
}

impl PoolAddressEntry {
    pub fn new((reward_cycle, index): pool_entries::Key, row: pool_entries::Row) -> Self {
        PoolAddressEntry {
            reward_cycle,
            index,
            operator: row.operator,
            total_ustx: row.total_ustx,
            represented: row.represented,
        }
    }

    /// Whether the given address is one of the participants the entry represents. The pool
    /// operator isn't, unless they delegated to their own pool.
    pub fn represents(&self, address: &Address) -> bool {
        self.represented.contains(address)
    }
}

/// Stake backing one pool during one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolAggregate {
    pub cycle: CycleId,
    pub operator: Address,
    pub index: Option<u32>,
    pub total_locked: Ustx,
    pub operator_stake: Ustx,
    pub contributions: BTreeMap<Address, Ustx>,
    pub frozen: bool,
}

impl PoolAggregate {
    pub fn new((cycle, operator): aggregates::Key, row: aggregates::Row) -> Self {
        PoolAggregate {
            cycle,
            operator,
            index: row.index,
            total_locked: row.total_locked,
            operator_stake: row.operator_stake,
            contributions: row.contributions,
            frozen: row.frozen,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Store, StoreUpdate, columns::delegations, in_memory::MemoryStore};

    fn address(raw: &str) -> Address {
        Address::new(raw).unwrap()
    }

    fn delegation(amount: Ustx, operator: &Address, active: bool) -> delegations::Row {
        delegations::Row {
            amount,
            operator: operator.clone(),
            created_at_cycle: 0,
            active,
            locked_until_cycle: None,
            locked_amount: 0,
        }
    }

    #[test]
    fn tally_splits_on_threshold() {
        let operator = address("ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM");
        let other = address("ST2JHG361ZXG51QTKY2NQCVBPPRRE2KZB1HR05NNC");

        let mut update = StoreUpdate::default();
        update
            .delegations
            .insert(address("ST1"), delegation(50, &operator, true));
        update
            .delegations
            .insert(address("ST2"), delegation(49, &operator, true));
        update
            .delegations
            .insert(address("ST3"), delegation(100, &operator, false));
        update
            .delegations
            .insert(address("ST4"), delegation(100, &other, true));

        let store = MemoryStore::new();
        store.save(&update).unwrap();

        let tally = Tally::new(&store, &operator, 3, 50).unwrap();
        assert_eq!(
            tally.qualifying,
            BTreeMap::from([(address("ST1"), 50)]),
            "exactly-at-threshold qualifies"
        );
        assert_eq!(
            tally.below_threshold,
            BTreeMap::from([(address("ST2"), 49)])
        );
        assert_eq!(tally.total_locked(), 50);
    }

    #[test]
    fn tally_counts_locked_stake() {
        let operator = address("ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM");

        let mut update = StoreUpdate::default();
        update.delegations.insert(
            address("ST1"),
            delegations::Row {
                locked_until_cycle: Some(4),
                locked_amount: 125,
                ..delegation(10, &operator, true)
            },
        );

        let store = MemoryStore::new();
        store.save(&update).unwrap();

        let locked = Tally::new(&store, &operator, 4, 50).unwrap();
        assert_eq!(locked.qualifying, BTreeMap::from([(address("ST1"), 125)]));

        let unlocked = Tally::new(&store, &operator, 5, 50).unwrap();
        assert_eq!(unlocked.below_threshold, BTreeMap::from([(address("ST1"), 10)]));
        assert_eq!(unlocked.total_locked(), 0);
    }

    #[test]
    fn entry_represents_members_only() {
        let operator = address("ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM");
        let entry = PoolAddressEntry::new(
            (3, 0),
            pool_entries::Row {
                operator: operator.clone(),
                total_ustx: 100,
                represented: BTreeSet::from([address("ST1")]),
            },
        );
        assert!(!entry.represents(&operator));
        assert!(entry.represents(&address("ST1")));
        assert!(!entry.represents(&address("ST2")));
    }
}
