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

use crate::{Address, BurnHeight, CycleClock, CycleClockError, Ustx};
use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path};

/// Deployer account of the local devnet, which operates the pool and backs it with its own
/// reserve.
pub const DEVNET_DEPLOYER: &str = "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM";

/// Minimum amount a delegation must reach to earn a share of the pool's rewards on devnet.
pub const DEVNET_MINIMUM_DELEGATION_USTX: Ustx = 50_000_000_000;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolParametersFileError {
    #[error("failed to open protocol parameters file: {0}")]
    FileOpenError(#[from] std::io::Error),
    #[error("failed to parse protocol parameters JSON: {0}")]
    JsonParseError(#[from] serde_json::Error),
    #[error("invalid cycle layout: {0}")]
    InvalidClock(#[from] CycleClockError),
}

/// Chain-level settings the ledger is configured with. They're fixed for the lifetime of a
/// ledger; changing them on an existing database yields undefined accounting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProtocolParameters {
    pub activation_height: BurnHeight,
    pub reward_cycle_length: u64,
    pub prepare_cycle_length: u64,
    pub minimum_delegation_ustx: Ustx,
    /// Addresses allowed to run a pool. A pool is identified by its operator's address, which
    /// also serves as the reward address the consensus mechanism pays into.
    pub pool_operators: Vec<Address>,
}

impl ProtocolParameters {
    pub fn clock(&self) -> Result<CycleClock, CycleClockError> {
        CycleClock::new(
            self.activation_height,
            self.reward_cycle_length,
            self.prepare_cycle_length,
        )
    }

    pub fn is_pool_operator(&self, address: &Address) -> bool {
        self.pool_operators.contains(address)
    }
}

impl Default for ProtocolParameters {
    fn default() -> Self {
        ProtocolParameters {
            activation_height: 100,
            reward_cycle_length: 10,
            prepare_cycle_length: 4,
            minimum_delegation_ustx: DEVNET_MINIMUM_DELEGATION_USTX,
            pool_operators: vec![Address::from_static(DEVNET_DEPLOYER)],
        }
    }
}

/// Load `ProtocolParameters` from a JSON file, rejecting files whose cycle layout the
/// `CycleClock` can't represent.
pub fn load_protocol_parameters_from_file(
    path: &Path,
) -> Result<ProtocolParameters, ProtocolParametersFileError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let parameters: ProtocolParameters = serde_json::from_reader(reader)?;
    parameters.clock()?;

    Ok(parameters)
}
