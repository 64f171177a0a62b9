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

//! Accounting for delegated stacking pools: participants delegate stake to pool operators, pools
//! are weighed once per reward cycle, and the rewards each pool wins are split among its
//! participants according to those weights.

pub mod error;
pub mod events;
pub mod rules;
pub mod state;
pub mod store;
pub mod summary;

pub use error::{ErrorKind, LedgerError};
pub use events::{
    Action, Block, BlockReport, BlockReward, Outcome, PayoutRecord, Receipt, RewardObservation,
    Transaction,
};
pub use state::Engine;
pub use store::{ReadStore, Store, StoreError, StoreUpdate, in_memory::MemoryStore};
