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

use ::rocksdb::{OptimisticTransactionDB, Transaction};
use stackpool_kernel::cbor;
use stackpool_ledger::store::StoreError;
use std::collections::BTreeMap;

/// Length of column prefixes. The database's prefix extractor is configured with it as well.
pub const PREFIX_LEN: usize = 4;

/// Serialize some value to be used as key, with the given prefix. Rows of a same column share a
/// prefix, which emulates tables within RocksDB: it allows iterating over a single column and
/// avoids clashes between columns whose keys would otherwise be identical.
pub fn as_key<T: cbor::Encode<()>>(prefix: &[u8], key: T) -> Vec<u8> {
    as_bytes(prefix, key)
}

/// A simple helper function to encode any (serialisable) value to CBOR bytes.
pub fn as_value<T: cbor::Encode<()>>(value: T) -> Vec<u8> {
    as_bytes(&[], value)
}

/// A simple helper function to encode any (serialisable) value to CBOR bytes.
#[allow(clippy::panic)]
pub fn as_bytes<T: cbor::Encode<()>>(prefix: &[u8], value: T) -> Vec<u8> {
    let mut buffer = Vec::from(prefix);
    cbor::encode(value, &mut buffer)
        .unwrap_or_else(|e| panic!("unable to encode value to CBOR: {e:?}"));
    buffer
}

pub fn internal(err: ::rocksdb::Error) -> StoreError {
    StoreError::Internal(err.into())
}

/// A column of the ledger: all rows whose key starts with the column's prefix.
#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub prefix: [u8; PREFIX_LEN],
}

impl Column {
    pub const fn new(name: &'static str, prefix: &[u8; PREFIX_LEN]) -> Self {
        Column {
            name,
            prefix: *prefix,
        }
    }

    pub fn get<K, V>(&self, db: &OptimisticTransactionDB, key: &K) -> Result<Option<V>, StoreError>
    where
        K: cbor::Encode<()>,
        V: for<'d> cbor::Decode<'d, ()>,
    {
        db.get(as_key(&self.prefix, key))
            .map_err(internal)?
            .map(|bytes| {
                cbor::decode(&bytes).map_err(|e| StoreError::undecodable(self.name, &bytes, e))
            })
            .transpose()
    }

    /// Upsert every given row.
    pub fn put_all<DB, K, V>(
        &self,
        db: &Transaction<'_, DB>,
        rows: &BTreeMap<K, V>,
    ) -> Result<(), StoreError>
    where
        K: cbor::Encode<()>,
        V: cbor::Encode<()>,
    {
        for (key, row) in rows {
            db.put(as_key(&self.prefix, key), as_value(row))
                .map_err(internal)?;
        }
        Ok(())
    }

    /// All rows of the column. Rows are read upfront, so that decoding failures surface as
    /// errors rather than as partial iterations.
    pub fn iter<K, V>(&self, db: &OptimisticTransactionDB) -> Result<Vec<(K, V)>, StoreError>
    where
        K: for<'d> cbor::Decode<'d, ()>,
        V: for<'d> cbor::Decode<'d, ()>,
    {
        let mut rows = Vec::new();

        for entry in db.prefix_iterator(self.prefix) {
            let (key, value) = entry.map_err(internal)?;

            if !key.starts_with(&self.prefix) {
                break;
            }

            let decoded_key = cbor::decode(&key[PREFIX_LEN..])
                .map_err(|e| StoreError::undecodable(self.name, &key, e))?;

            let decoded_value =
                cbor::decode(&value).map_err(|e| StoreError::undecodable(self.name, &value, e))?;

            rows.push((decoded_key, decoded_value));
        }

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_prefixed() {
        assert_eq!(hex::encode(as_key(b"tick", 130u64)), "7469636b1882");
        assert_eq!(hex::encode(as_value(130u64)), "1882");
    }
}
