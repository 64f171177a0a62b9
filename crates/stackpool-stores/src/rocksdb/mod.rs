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

use ::rocksdb::{OptimisticTransactionDB, Options, SliceTransform};
use columns::*;
use common::{PREFIX_LEN, as_value, internal};
use stackpool_kernel::{Address, BurnHeight, CycleId, Nonce, ProtocolParameters, cbor};
use stackpool_ledger::store::{
    OpenErrorKind, ReadStore, Store, StoreError, StoreUpdate,
    columns::{
        aggregates, allowances, cycles, delegations, dust, memberships, observations,
        participants, payouts, pool_entries, reserves, snapshots,
    },
};
use std::path::{Path, PathBuf};
use tracing::{Level, info, instrument, trace};

pub mod columns;
pub mod common;

const EVENT_TARGET: &str = "stackpool::ledger::store";

/// Special key where we store the tip of the database (most recently applied block)
const KEY_TIP: &str = "tip";

/// Special key where we store the protocol parameters the ledger was created with
const KEY_PARAMETERS: &str = "parameters";

/// An opaque handle for a store implementation on top of RocksDB. The database has the
/// following structure:
///
/// * ============================*======================================= *
/// * key                         * value                                  *
/// * ============================*======================================= *
/// * 'tip'                       * BurnHeight                             *
/// * 'parameters'                * ProtocolParameters (JSON)              *
/// * 'nonc'Address               * Nonce                                  *
/// * 'prtc'Address               * participants::Row                      *
/// * 'allw'(Address, Address)    * allowances::Row                        *
/// * 'mmbr'Address               * memberships::Row                       *
/// * 'delg'Address               * delegations::Row                       *
/// * 'aggr'(CycleId, Address)    * aggregates::Row                        *
/// * 'entr'(CycleId, u32)        * pool_entries::Row                      *
/// * 'snap'(CycleId, Address)    * snapshots::Row                         *
/// * 'rsrv'Address               * reserves::Row                          *
/// * 'obsv'BurnHeight            * observations::Row                      *
/// * 'pays'(Address, BurnHeight) * payouts::Row                           *
/// * 'dust'Address               * Ustx                                   *
/// * 'cycl'CycleId               * cycles::Row                            *
/// * ============================*======================================= *
///
/// CBOR is used to serialize objects (as keys or values) into their binary equivalent.
pub struct RocksDB {
    /// The working directory of the database.
    dir: PathBuf,

    /// An instance of RocksDB.
    db: OptimisticTransactionDB,
}

impl RocksDB {
    /// Open (or create) the ledger database living in `dir`.
    ///
    /// A ledger is tied to the protocol parameters it was created with: opening it with
    /// different ones fails with `ParametersMismatch`.
    #[instrument(level = Level::TRACE, skip_all, name = "store.open", fields(dir = %dir.display()))]
    pub fn new(dir: &Path, parameters: &ProtocolParameters) -> Result<RocksDB, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_prefix_extractor(SliceTransform::create_fixed_prefix(PREFIX_LEN));

        let db = OptimisticTransactionDB::open(&opts, dir).map_err(internal)?;

        let store = RocksDB {
            dir: dir.to_path_buf(),
            db,
        };

        store.check_parameters(parameters)?;

        info!(
            target: EVENT_TARGET,
            dir = %store.dir.display(),
            tip = ?store.tip()?,
            "store.opened"
        );

        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Protocol parameters the ledger was created with, if any.
    pub fn parameters(&self) -> Result<Option<ProtocolParameters>, StoreError> {
        self.db
            .get(KEY_PARAMETERS)
            .map_err(internal)?
            .map(|bytes| {
                serde_json::from_slice(&bytes)
                    .map_err(|e| StoreError::Internal(Box::new(e)))
            })
            .transpose()
    }

    fn check_parameters(&self, parameters: &ProtocolParameters) -> Result<(), StoreError> {
        match self.parameters()? {
            Some(recorded) if &recorded == parameters => Ok(()),
            Some(..) => Err(StoreError::Open(OpenErrorKind::ParametersMismatch)),
            None => {
                let bytes =
                    serde_json::to_vec(parameters).map_err(|e| StoreError::Internal(Box::new(e)))?;
                self.db.put(KEY_PARAMETERS, bytes).map_err(internal)?;
                info!(target: EVENT_TARGET, "store.parameters_recorded");
                Ok(())
            }
        }
    }
}

impl ReadStore for RocksDB {
    fn tip(&self) -> Result<Option<BurnHeight>, StoreError> {
        self.db
            .get(KEY_TIP)
            .map_err(internal)?
            .map(|bytes| {
                cbor::decode(&bytes).map_err(|e| StoreError::undecodable("tip", &bytes, e))
            })
            .transpose()
    }

    fn sequence(&self, sender: &Address) -> Result<Option<Nonce>, StoreError> {
        SEQUENCES.get(&self.db, sender)
    }

    fn participant(&self, address: &Address) -> Result<Option<participants::Row>, StoreError> {
        PARTICIPANTS.get(&self.db, address)
    }

    fn allowance(&self, key: &allowances::Key) -> Result<Option<allowances::Row>, StoreError> {
        ALLOWANCES.get(&self.db, key)
    }

    fn membership(&self, participant: &Address) -> Result<Option<memberships::Row>, StoreError> {
        MEMBERSHIPS.get(&self.db, participant)
    }

    fn delegation(&self, participant: &Address) -> Result<Option<delegations::Row>, StoreError> {
        DELEGATIONS.get(&self.db, participant)
    }

    fn aggregate(&self, key: &aggregates::Key) -> Result<Option<aggregates::Row>, StoreError> {
        AGGREGATES.get(&self.db, key)
    }

    fn pool_entry(
        &self,
        key: &pool_entries::Key,
    ) -> Result<Option<pool_entries::Row>, StoreError> {
        POOL_ENTRIES.get(&self.db, key)
    }

    fn snapshot(&self, key: &snapshots::Key) -> Result<Option<snapshots::Row>, StoreError> {
        SNAPSHOTS.get(&self.db, key)
    }

    fn reserve(&self, provider: &Address) -> Result<Option<reserves::Row>, StoreError> {
        RESERVES.get(&self.db, provider)
    }

    fn observation(&self, height: &BurnHeight) -> Result<Option<observations::Row>, StoreError> {
        OBSERVATIONS.get(&self.db, height)
    }

    fn payout(&self, key: &payouts::Key) -> Result<Option<payouts::Row>, StoreError> {
        PAYOUTS.get(&self.db, key)
    }

    fn dust(&self, operator: &Address) -> Result<Option<dust::Row>, StoreError> {
        DUST.get(&self.db, operator)
    }

    fn cycle(&self, cycle: &CycleId) -> Result<Option<cycles::Row>, StoreError> {
        CYCLES.get(&self.db, cycle)
    }

    fn iter_delegations(
        &self,
    ) -> Result<impl Iterator<Item = (delegations::Key, delegations::Row)>, StoreError> {
        Ok(DELEGATIONS.iter(&self.db)?.into_iter())
    }

    fn iter_memberships(
        &self,
    ) -> Result<impl Iterator<Item = (memberships::Key, memberships::Row)>, StoreError> {
        Ok(MEMBERSHIPS.iter(&self.db)?.into_iter())
    }

    fn iter_aggregates(
        &self,
    ) -> Result<impl Iterator<Item = (aggregates::Key, aggregates::Row)>, StoreError> {
        Ok(AGGREGATES.iter(&self.db)?.into_iter())
    }

    fn iter_pool_entries(
        &self,
    ) -> Result<impl Iterator<Item = (pool_entries::Key, pool_entries::Row)>, StoreError> {
        Ok(POOL_ENTRIES.iter(&self.db)?.into_iter())
    }

    fn iter_observations(
        &self,
    ) -> Result<impl Iterator<Item = (observations::Key, observations::Row)>, StoreError> {
        Ok(OBSERVATIONS.iter(&self.db)?.into_iter())
    }

    fn iter_payouts(
        &self,
    ) -> Result<impl Iterator<Item = (payouts::Key, payouts::Row)>, StoreError> {
        Ok(PAYOUTS.iter(&self.db)?.into_iter())
    }
}

impl Store for RocksDB {
    /// Write the whole update within a single optimistic transaction.
    #[instrument(level = Level::TRACE, skip_all, name = "store.save", fields(rows = update.len()))]
    fn save(&self, update: &StoreUpdate) -> Result<(), StoreError> {
        if update.is_empty() {
            return Ok(());
        }

        let batch = self.db.transaction();

        if let Some(tip) = update.tip {
            batch.put(KEY_TIP, as_value(tip)).map_err(internal)?;
        }

        SEQUENCES.put_all(&batch, &update.sequences)?;
        PARTICIPANTS.put_all(&batch, &update.participants)?;
        ALLOWANCES.put_all(&batch, &update.allowances)?;
        MEMBERSHIPS.put_all(&batch, &update.memberships)?;
        DELEGATIONS.put_all(&batch, &update.delegations)?;
        AGGREGATES.put_all(&batch, &update.aggregates)?;
        POOL_ENTRIES.put_all(&batch, &update.pool_entries)?;
        SNAPSHOTS.put_all(&batch, &update.snapshots)?;
        RESERVES.put_all(&batch, &update.reserves)?;
        OBSERVATIONS.put_all(&batch, &update.observations)?;
        PAYOUTS.put_all(&batch, &update.payouts)?;
        DUST.put_all(&batch, &update.dust)?;
        CYCLES.put_all(&batch, &update.cycles)?;

        batch.commit().map_err(internal)?;

        trace!(target: EVENT_TARGET, rows = update.len(), tip = ?update.tip, "store.saved");

        Ok(())
    }
}
