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

pub mod columns;
pub mod in_memory;

use columns::*;
use stackpool_kernel::{Address, BurnHeight, CycleId, Nonce, cbor};
use std::{collections::BTreeMap, io};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OpenErrorKind {
    #[error(transparent)]
    IO(#[from] io::Error),
    #[error("the ledger was created with different protocol parameters")]
    ParametersMismatch,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Internal(#[from] Box<dyn std::error::Error + Send + Sync>),
    #[error("error opening the store")]
    Open(#[source] OpenErrorKind),
    #[error("unable to decode {column} row ({bytes}): {source}")]
    Undecodable {
        column: &'static str,
        bytes: String,
        #[source]
        source: cbor::decode::Error,
    },
}

impl StoreError {
    pub fn undecodable(column: &'static str, bytes: &[u8], source: cbor::decode::Error) -> Self {
        StoreError::Undecodable {
            column,
            bytes: hex::encode(bytes),
            source,
        }
    }
}

// Store
// ----------------------------------------------------------------------------

/// Read-only view over the ledger state. Rules are written against this view only, and never
/// mutate state directly: they produce a `StoreUpdate` instead.
pub trait ReadStore {
    /// Height of the most recently applied block, if any.
    fn tip(&self) -> Result<Option<BurnHeight>, StoreError>;

    /// Next nonce expected from the given sender.
    fn sequence(&self, sender: &Address) -> Result<Option<Nonce>, StoreError>;

    fn participant(&self, address: &Address) -> Result<Option<participants::Row>, StoreError>;

    fn allowance(&self, key: &allowances::Key) -> Result<Option<allowances::Row>, StoreError>;

    fn membership(&self, participant: &Address) -> Result<Option<memberships::Row>, StoreError>;

    fn delegation(&self, participant: &Address) -> Result<Option<delegations::Row>, StoreError>;

    fn aggregate(&self, key: &aggregates::Key) -> Result<Option<aggregates::Row>, StoreError>;

    fn pool_entry(&self, key: &pool_entries::Key)
    -> Result<Option<pool_entries::Row>, StoreError>;

    fn snapshot(&self, key: &snapshots::Key) -> Result<Option<snapshots::Row>, StoreError>;

    fn reserve(&self, provider: &Address) -> Result<Option<reserves::Row>, StoreError>;

    fn observation(&self, height: &BurnHeight) -> Result<Option<observations::Row>, StoreError>;

    fn payout(&self, key: &payouts::Key) -> Result<Option<payouts::Row>, StoreError>;

    fn dust(&self, operator: &Address) -> Result<Option<dust::Row>, StoreError>;

    fn cycle(&self, cycle: &CycleId) -> Result<Option<cycles::Row>, StoreError>;

    /// Get details about all delegations, active or not
    fn iter_delegations(
        &self,
    ) -> Result<impl Iterator<Item = (delegations::Key, delegations::Row)>, StoreError>;

    /// Get details about all pool memberships
    fn iter_memberships(
        &self,
    ) -> Result<impl Iterator<Item = (memberships::Key, memberships::Row)>, StoreError>;

    /// Get details about all pool aggregates, across all cycles
    fn iter_aggregates(
        &self,
    ) -> Result<impl Iterator<Item = (aggregates::Key, aggregates::Row)>, StoreError>;

    /// Get details about all published pool address entries, across all cycles
    fn iter_pool_entries(
        &self,
    ) -> Result<impl Iterator<Item = (pool_entries::Key, pool_entries::Row)>, StoreError>;

    /// Get details about all reward observations
    fn iter_observations(
        &self,
    ) -> Result<impl Iterator<Item = (observations::Key, observations::Row)>, StoreError>;

    /// Get details about all payout records
    fn iter_payouts(&self)
    -> Result<impl Iterator<Item = (payouts::Key, payouts::Row)>, StoreError>;

    /// Aggregates of every pool for the given cycle.
    fn aggregates_for(
        &self,
        cycle: CycleId,
    ) -> Result<Vec<(aggregates::Key, aggregates::Row)>, StoreError> {
        Ok(self
            .iter_aggregates()?
            .filter(|((c, _), _)| *c == cycle)
            .collect())
    }

    /// Pool address entries of the given cycle, ordered by index.
    fn pool_entries_for(
        &self,
        cycle: CycleId,
    ) -> Result<Vec<(pool_entries::Key, pool_entries::Row)>, StoreError> {
        let mut entries: Vec<_> = self
            .iter_pool_entries()?
            .filter(|((c, _), _)| *c == cycle)
            .collect();
        entries.sort_by_key(|((_, index), _)| *index);
        Ok(entries)
    }
}

pub trait Store: ReadStore {
    /// Apply every change of the given update, atomically: either all rows are written, or
    /// none are.
    fn save(&self, update: &StoreUpdate) -> Result<(), StoreError>;
}

// StoreUpdate
// ----------------------------------------------------------------------------

/// A set of rows to write, in a single atomic operation, across all columns. Rows are upserted;
/// the ledger never deletes rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreUpdate {
    pub tip: Option<BurnHeight>,
    pub sequences: BTreeMap<sequences::Key, sequences::Row>,
    pub participants: BTreeMap<participants::Key, participants::Row>,
    pub allowances: BTreeMap<allowances::Key, allowances::Row>,
    pub memberships: BTreeMap<memberships::Key, memberships::Row>,
    pub delegations: BTreeMap<delegations::Key, delegations::Row>,
    pub aggregates: BTreeMap<aggregates::Key, aggregates::Row>,
    pub pool_entries: BTreeMap<pool_entries::Key, pool_entries::Row>,
    pub snapshots: BTreeMap<snapshots::Key, snapshots::Row>,
    pub reserves: BTreeMap<reserves::Key, reserves::Row>,
    pub observations: BTreeMap<observations::Key, observations::Row>,
    pub payouts: BTreeMap<payouts::Key, payouts::Row>,
    pub dust: BTreeMap<dust::Key, dust::Row>,
    pub cycles: BTreeMap<cycles::Key, cycles::Row>,
}

impl StoreUpdate {
    pub fn is_empty(&self) -> bool {
        self.tip.is_none()
            && self.sequences.is_empty()
            && self.participants.is_empty()
            && self.allowances.is_empty()
            && self.memberships.is_empty()
            && self.delegations.is_empty()
            && self.aggregates.is_empty()
            && self.pool_entries.is_empty()
            && self.snapshots.is_empty()
            && self.reserves.is_empty()
            && self.observations.is_empty()
            && self.payouts.is_empty()
            && self.dust.is_empty()
            && self.cycles.is_empty()
    }

    /// Fold another update into this one. Rows from `other` override rows of `self` under the
    /// same key.
    pub fn merge(&mut self, other: StoreUpdate) {
        if other.tip.is_some() {
            self.tip = other.tip;
        }
        self.sequences.extend(other.sequences);
        self.participants.extend(other.participants);
        self.allowances.extend(other.allowances);
        self.memberships.extend(other.memberships);
        self.delegations.extend(other.delegations);
        self.aggregates.extend(other.aggregates);
        self.pool_entries.extend(other.pool_entries);
        self.snapshots.extend(other.snapshots);
        self.reserves.extend(other.reserves);
        self.observations.extend(other.observations);
        self.payouts.extend(other.payouts);
        self.dust.extend(other.dust);
        self.cycles.extend(other.cycles);
    }

    /// Number of rows the update writes, used for tracing.
    pub fn len(&self) -> usize {
        usize::from(self.tip.is_some())
            + self.sequences.len()
            + self.participants.len()
            + self.allowances.len()
            + self.memberships.len()
            + self.delegations.len()
            + self.aggregates.len()
            + self.pool_entries.len()
            + self.snapshots.len()
            + self.reserves.len()
            + self.observations.len()
            + self.payouts.len()
            + self.dust.len()
            + self.cycles.len()
    }
}
