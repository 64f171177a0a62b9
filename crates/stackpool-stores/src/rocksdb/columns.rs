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

//! Prefixes under which each column of the ledger is stored. Prefixes are the UTF-8 encoding of
//! a four-letter mnemonic.

use crate::rocksdb::common::Column;

pub const SEQUENCES: Column = Column::new("sequences", b"nonc");
pub const PARTICIPANTS: Column = Column::new("participants", b"prtc");
pub const ALLOWANCES: Column = Column::new("allowances", b"allw");
pub const MEMBERSHIPS: Column = Column::new("memberships", b"mmbr");
pub const DELEGATIONS: Column = Column::new("delegations", b"delg");
pub const AGGREGATES: Column = Column::new("aggregates", b"aggr");
pub const POOL_ENTRIES: Column = Column::new("pool_entries", b"entr");
pub const SNAPSHOTS: Column = Column::new("snapshots", b"snap");
pub const RESERVES: Column = Column::new("reserves", b"rsrv");
pub const OBSERVATIONS: Column = Column::new("observations", b"obsv");
pub const PAYOUTS: Column = Column::new("payouts", b"pays");
pub const DUST: Column = Column::new("dust", b"dust");
pub const CYCLES: Column = Column::new("cycles", b"cycl");
