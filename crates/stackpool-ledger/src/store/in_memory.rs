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

use crate::store::{ReadStore, Store, StoreError, StoreUpdate, columns::*};
use stackpool_kernel::{Address, BurnHeight, CycleId, Nonce};
use std::{cell::RefCell, collections::BTreeMap};

/// A `Store` living entirely in memory, for tests and dry runs. Saving an update can't fail
/// half-way, so atomicity comes for free.
#[derive(Default)]
pub struct MemoryStore {
    tip: RefCell<Option<BurnHeight>>,
    sequences: RefCell<BTreeMap<sequences::Key, sequences::Row>>,
    participants: RefCell<BTreeMap<participants::Key, participants::Row>>,
    allowances: RefCell<BTreeMap<allowances::Key, allowances::Row>>,
    memberships: RefCell<BTreeMap<memberships::Key, memberships::Row>>,
    delegations: RefCell<BTreeMap<delegations::Key, delegations::Row>>,
    aggregates: RefCell<BTreeMap<aggregates::Key, aggregates::Row>>,
    pool_entries: RefCell<BTreeMap<pool_entries::Key, pool_entries::Row>>,
    snapshots: RefCell<BTreeMap<snapshots::Key, snapshots::Row>>,
    reserves: RefCell<BTreeMap<reserves::Key, reserves::Row>>,
    observations: RefCell<BTreeMap<observations::Key, observations::Row>>,
    payouts: RefCell<BTreeMap<payouts::Key, payouts::Row>>,
    dust: RefCell<BTreeMap<dust::Key, dust::Row>>,
    cycles: RefCell<BTreeMap<cycles::Key, cycles::Row>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn get<K: Ord, V: Clone>(column: &RefCell<BTreeMap<K, V>>, key: &K) -> Option<V> {
    column.borrow().get(key).cloned()
}

fn snapshot_of<K: Clone, V: Clone>(column: &RefCell<BTreeMap<K, V>>) -> std::vec::IntoIter<(K, V)> {
    column
        .borrow()
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect::<Vec<_>>()
        .into_iter()
}

fn put<K: Ord + Clone, V: Clone>(column: &RefCell<BTreeMap<K, V>>, rows: &BTreeMap<K, V>) {
    column
        .borrow_mut()
        .extend(rows.iter().map(|(k, v)| (k.clone(), v.clone())));
}

impl ReadStore for MemoryStore {
    fn tip(&self) -> Result<Option<BurnHeight>, StoreError> {
        Ok(*self.tip.borrow())
    }

    fn sequence(&self, sender: &Address) -> Result<Option<Nonce>, StoreError> {
        Ok(get(&self.sequences, sender))
    }

    fn participant(&self, address: &Address) -> Result<Option<participants::Row>, StoreError> {
        Ok(get(&self.participants, address))
    }

    fn allowance(&self, key: &allowances::Key) -> Result<Option<allowances::Row>, StoreError> {
        Ok(get(&self.allowances, key))
    }

    fn membership(&self, participant: &Address) -> Result<Option<memberships::Row>, StoreError> {
        Ok(get(&self.memberships, participant))
    }

    fn delegation(&self, participant: &Address) -> Result<Option<delegations::Row>, StoreError> {
        Ok(get(&self.delegations, participant))
    }

    fn aggregate(&self, key: &aggregates::Key) -> Result<Option<aggregates::Row>, StoreError> {
        Ok(get(&self.aggregates, key))
    }

    fn pool_entry(
        &self,
        key: &pool_entries::Key,
    ) -> Result<Option<pool_entries::Row>, StoreError> {
        Ok(get(&self.pool_entries, key))
    }

    fn snapshot(&self, key: &snapshots::Key) -> Result<Option<snapshots::Row>, StoreError> {
        Ok(get(&self.snapshots, key))
    }

    fn reserve(&self, provider: &Address) -> Result<Option<reserves::Row>, StoreError> {
        Ok(get(&self.reserves, provider))
    }

    fn observation(&self, height: &BurnHeight) -> Result<Option<observations::Row>, StoreError> {
        Ok(get(&self.observations, height))
    }

    fn payout(&self, key: &payouts::Key) -> Result<Option<payouts::Row>, StoreError> {
        Ok(get(&self.payouts, key))
    }

    fn dust(&self, operator: &Address) -> Result<Option<dust::Row>, StoreError> {
        Ok(get(&self.dust, operator))
    }

    fn cycle(&self, cycle: &CycleId) -> Result<Option<cycles::Row>, StoreError> {
        Ok(get(&self.cycles, cycle))
    }

    #[allow(refining_impl_trait)]
    fn iter_delegations(
        &self,
    ) -> Result<std::vec::IntoIter<(delegations::Key, delegations::Row)>, StoreError> {
        Ok(snapshot_of(&self.delegations))
    }

    #[allow(refining_impl_trait)]
    fn iter_memberships(
        &self,
    ) -> Result<std::vec::IntoIter<(memberships::Key, memberships::Row)>, StoreError> {
        Ok(snapshot_of(&self.memberships))
    }

    #[allow(refining_impl_trait)]
    fn iter_aggregates(
        &self,
    ) -> Result<std::vec::IntoIter<(aggregates::Key, aggregates::Row)>, StoreError> {
        Ok(snapshot_of(&self.aggregates))
    }

    #[allow(refining_impl_trait)]
    fn iter_pool_entries(
        &self,
    ) -> Result<std::vec::IntoIter<(pool_entries::Key, pool_entries::Row)>, StoreError> {
        Ok(snapshot_of(&self.pool_entries))
    }

    #[allow(refining_impl_trait)]
    fn iter_observations(
        &self,
    ) -> Result<std::vec::IntoIter<(observations::Key, observations::Row)>, StoreError> {
        Ok(snapshot_of(&self.observations))
    }

    #[allow(refining_impl_trait)]
    fn iter_payouts(
        &self,
    ) -> Result<std::vec::IntoIter<(payouts::Key, payouts::Row)>, StoreError> {
        Ok(snapshot_of(&self.payouts))
    }
}

impl Store for MemoryStore {
    fn save(&self, update: &StoreUpdate) -> Result<(), StoreError> {
        if let Some(tip) = update.tip {
            *self.tip.borrow_mut() = Some(tip);
        }
        put(&self.sequences, &update.sequences);
        put(&self.participants, &update.participants);
        put(&self.allowances, &update.allowances);
        put(&self.memberships, &update.memberships);
        put(&self.delegations, &update.delegations);
        put(&self.aggregates, &update.aggregates);
        put(&self.pool_entries, &update.pool_entries);
        put(&self.snapshots, &update.snapshots);
        put(&self.reserves, &update.reserves);
        put(&self.observations, &update.observations);
        put(&self.payouts, &update.payouts);
        put(&self.dust, &update.dust);
        put(&self.cycles, &update.cycles);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackpool_kernel::Address;

    #[test]
    fn save_then_read() {
        let store = MemoryStore::new();
        let provider = Address::new("ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM").unwrap();

        assert_eq!(store.tip().unwrap(), None);
        assert_eq!(store.reserve(&provider).unwrap(), None);

        let mut update = StoreUpdate {
            tip: Some(101),
            ..StoreUpdate::default()
        };
        update.reserves.insert(
            provider.clone(),
            reserves::Row {
                deposited: 11_000_000_000,
                reserved: 0,
            },
        );
        store.save(&update).unwrap();

        assert_eq!(store.tip().unwrap(), Some(101));
        assert_eq!(
            store.reserve(&provider).unwrap().map(|r| r.deposited),
            Some(11_000_000_000)
        );
    }

    #[test]
    fn pool_entries_are_sorted_by_index() {
        let store = MemoryStore::new();
        let operator = Address::new("ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM").unwrap();
        let row = |total_ustx| pool_entries::Row {
            operator: operator.clone(),
            total_ustx,
            represented: Default::default(),
        };

        let mut update = StoreUpdate::default();
        update.pool_entries.insert((3, 1), row(2));
        update.pool_entries.insert((3, 0), row(1));
        update.pool_entries.insert((4, 0), row(3));
        store.save(&update).unwrap();

        let entries = store.pool_entries_for(3).unwrap();
        assert_eq!(
            entries.iter().map(|(key, _)| *key).collect::<Vec<_>>(),
            vec![(3, 0), (3, 1)]
        );
    }
}
