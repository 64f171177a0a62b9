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

use crate::{error::LedgerError, store::columns::payouts, summary::aggregate::PoolAddressEntry};
use serde::{Deserialize, Serialize};
use stackpool_kernel::{Address, BurnHeight, CycleId, Nonce, RawAmount, Ustx};

// Inputs
// ----------------------------------------------------------------------------

/// A block of the burn chain, as finalized by the external consensus layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub burn_height: BurnHeight,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    /// Rewards paid by the consensus mechanism at this height, if any.
    #[serde(default)]
    pub reward: Option<BlockReward>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockReward {
    pub winners: Vec<Address>,
    pub amount_per_address: Ustx,
}

/// Rewards observed at a given burn height.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardObservation {
    pub burn_height: BurnHeight,
    pub winners: Vec<Address>,
    pub amount_per_address: Ustx,
}

impl Block {
    pub fn reward_observation(&self) -> Option<RewardObservation> {
        self.reward.as_ref().map(|reward| RewardObservation {
            burn_height: self.burn_height,
            winners: reward.winners.clone(),
            amount_per_address: reward.amount_per_address,
        })
    }
}

/// An event submitted by a participant. Events from the same sender are ordered by their nonce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: Address,
    pub nonce: Nonce,
    pub action: Action,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Allow `operator` to stack on the sender's behalf.
    AllowCaller { operator: Address },
    JoinPool { operator: Address },
    Delegate { amount: RawAmount, operator: Address },
    Revoke,
    Deposit { amount: RawAmount },
    Reserve { amount: RawAmount },
    Release { amount: RawAmount },
    /// Publish the sender's pool entry for `cycle` ahead of the cycle's freeze.
    LockAggregate { cycle: CycleId },
    /// Distribute the rewards observed at `burn_height`.
    Distribute { burn_height: BurnHeight },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::AllowCaller { .. } => "allow_caller",
            Action::JoinPool { .. } => "join_pool",
            Action::Delegate { .. } => "delegate",
            Action::Revoke => "revoke",
            Action::Deposit { .. } => "deposit",
            Action::Reserve { .. } => "reserve",
            Action::Release { .. } => "release",
            Action::LockAggregate { .. } => "lock_aggregate",
            Action::Distribute { .. } => "distribute",
        }
    }
}

// Outputs
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayoutRecord {
    pub participant: Address,
    pub burn_height: BurnHeight,
    pub cycle: CycleId,
    pub operator: Address,
    pub amount: Ustx,
}

impl PayoutRecord {
    pub fn new((participant, burn_height): payouts::Key, row: payouts::Row) -> Self {
        PayoutRecord {
            participant,
            burn_height,
            cycle: row.cycle,
            operator: row.operator,
            amount: row.amount,
        }
    }
}

/// What an accepted event did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    CallerAllowed {
        participant: Address,
        operator: Address,
    },
    Joined {
        participant: Address,
        operator: Address,
        already_member: bool,
    },
    Delegated {
        participant: Address,
        operator: Address,
        amount: Ustx,
        replaced: Option<Ustx>,
    },
    Revoked {
        participant: Address,
        locked_until_cycle: Option<CycleId>,
    },
    Deposited {
        provider: Address,
        deposited: Ustx,
    },
    Reserved {
        provider: Address,
        reserved: Ustx,
    },
    Released {
        provider: Address,
        reserved: Ustx,
    },
    AggregateLocked {
        operator: Address,
        cycle: CycleId,
        entry: Option<PoolAddressEntry>,
    },
    Observed {
        burn_height: BurnHeight,
        cycle: CycleId,
    },
    Distributed {
        burn_height: BurnHeight,
        cycle: CycleId,
        payouts: Vec<PayoutRecord>,
        dust: Ustx,
        already_distributed: bool,
    },
}

/// Acknowledgement of an accepted event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Receipt {
    pub burn_height: BurnHeight,
    /// Sender and nonce of the transaction, absent for events coming from the consensus layer.
    pub sender: Option<Address>,
    pub nonce: Option<Nonce>,
    pub outcome: Outcome,
}

/// Result of rolling the ledger forward by one block.
#[derive(Debug)]
pub struct BlockReport {
    pub burn_height: BurnHeight,
    /// Cycles whose aggregates were frozen upon reaching this block.
    pub frozen_cycles: Vec<CycleId>,
    /// Outcome of each transaction of the block, in order.
    pub transactions: Vec<Result<Receipt, LedgerError>>,
    pub reward: Option<Result<Receipt, LedgerError>>,
}

impl BlockReport {
    pub fn accepted(&self) -> usize {
        self.transactions.iter().filter(|r| r.is_ok()).count()
    }

    pub fn rejected(&self) -> usize {
        self.transactions.len() - self.accepted()
    }
}
