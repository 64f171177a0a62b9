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

use clap::Parser;
use stackpool_kernel::{ProtocolParameters, load_protocol_parameters_from_file};
use stackpool_ledger::Engine;
use stackpool_stores::rocksdb::RocksDB;
use std::path::PathBuf;
use tracing::info;

pub mod query;
pub mod replay;

pub const DEFAULT_LEDGER_DIR: &str = "./ledger.db";

/// Arguments shared by every command touching the ledger database.
#[derive(Debug, Parser)]
pub struct LedgerArgs {
    /// Path of the ledger on-disk storage.
    #[arg(
        long,
        value_name = "DIR",
        env = "STACKPOOL_LEDGER_DIR",
        default_value = DEFAULT_LEDGER_DIR,
    )]
    pub ledger_dir: PathBuf,

    /// JSON-formatted file with the protocol parameters of the ledger.
    ///
    /// Defaults to the parameters of the local devnet.
    #[arg(long, value_name = "FILE", env = "STACKPOOL_PARAMETERS")]
    pub parameters: Option<PathBuf>,
}

impl LedgerArgs {
    pub fn parameters(&self) -> Result<ProtocolParameters, Box<dyn std::error::Error>> {
        match &self.parameters {
            Some(path) => Ok(load_protocol_parameters_from_file(path)?),
            None => Ok(ProtocolParameters::default()),
        }
    }

    pub fn open(&self) -> Result<Engine<RocksDB>, Box<dyn std::error::Error>> {
        let parameters = self.parameters()?;

        info!(
            ledger_dir = %self.ledger_dir.to_string_lossy(),
            pool_operators = parameters.pool_operators.len(),
            "Opening ledger",
        );

        let store = RocksDB::new(&self.ledger_dir, &parameters)?;

        Ok(Engine::new(store, parameters)?)
    }
}

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
