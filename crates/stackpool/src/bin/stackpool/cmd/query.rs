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

use super::{LedgerArgs, print_json};
use clap::{Parser, Subcommand};
use serde_json::json;
use stackpool_kernel::{Address, BurnHeight, CycleId};

#[derive(Debug, Subcommand)]
pub enum Query {
    /// Tip of the ledger, along with the cycle and phase it belongs to.
    Cycle {
        #[command(flatten)]
        ledger: LedgerArgs,

        /// Freeze status of a specific cycle, instead of the tip's.
        #[arg(long)]
        cycle: Option<CycleId>,
    },

    /// Share of a cycle's rewards a participant is entitled to, in millionths.
    Weight(ParticipantInCycle),

    /// Pool address entry of a cycle, by index or by represented participant.
    Entry {
        #[command(flatten)]
        ledger: LedgerArgs,

        #[arg(long)]
        cycle: CycleId,

        #[arg(long, conflicts_with = "participant", required_unless_present = "participant")]
        index: Option<u32>,

        #[arg(long)]
        participant: Option<Address>,
    },

    /// Active delegation of a participant.
    Delegation(Participant),

    /// Payout history of a participant, or payouts made at a given height.
    Payouts {
        #[command(flatten)]
        ledger: LedgerArgs,

        #[arg(long, conflicts_with = "height", required_unless_present = "height")]
        participant: Option<Address>,

        #[arg(long)]
        height: Option<BurnHeight>,
    },

    /// Reserve account of a liquidity provider.
    Reserve(Participant),

    /// Members of a pool.
    Members(Participant),

    /// Truncation remainders accumulated by a pool.
    Dust(Participant),

    /// Stake locked in a pool for the tip's cycle.
    Locked(Participant),

    /// Aggregate of a pool for a given cycle.
    Aggregate(ParticipantInCycle),
}

#[derive(Debug, Parser)]
pub struct Participant {
    #[command(flatten)]
    ledger: LedgerArgs,

    /// Address of the participant (or pool operator) to look up.
    #[arg(long, value_name = "ADDRESS")]
    address: Address,
}

#[derive(Debug, Parser)]
pub struct ParticipantInCycle {
    #[command(flatten)]
    ledger: LedgerArgs,

    #[arg(long, value_name = "ADDRESS")]
    address: Address,

    #[arg(long)]
    cycle: CycleId,
}

pub fn run(query: Query) -> Result<(), Box<dyn std::error::Error>> {
    match query {
        Query::Cycle { ledger, cycle } => {
            let engine = ledger.open()?;
            match cycle {
                Some(cycle) => print_json(&json!({
                    "cycle": cycle,
                    "status": engine.cycle_status(cycle)?,
                })),
                None => print_json(&json!({
                    "tip": engine.tip()?,
                    "position": engine.current_position()?,
                })),
            }
        }
        Query::Weight(ParticipantInCycle {
            ledger,
            address,
            cycle,
        }) => {
            let engine = ledger.open()?;
            print_json(&json!({
                "participant": address,
                "cycle": cycle,
                "weight": engine.weight(&address, cycle)?,
            }))
        }
        Query::Entry {
            ledger,
            cycle,
            index,
            participant,
        } => {
            let engine = ledger.open()?;
            let entry = match (index, participant) {
                (Some(index), _) => engine.read_pool_address_entry(cycle, index)?,
                (None, Some(participant)) => engine.entry_for_participant(cycle, &participant)?,
                (None, None) => None,
            };
            print_json(&entry)
        }
        Query::Delegation(Participant { ledger, address }) => {
            print_json(&ledger.open()?.check_delegation(&address)?)
        }
        Query::Payouts {
            ledger,
            participant,
            height,
        } => {
            let engine = ledger.open()?;
            let records = match (participant, height) {
                (Some(participant), _) => engine.payouts_for(&participant)?,
                (None, Some(height)) => engine.payouts_at(height)?,
                (None, None) => Vec::new(),
            };
            print_json(&records)
        }
        Query::Reserve(Participant { ledger, address }) => {
            print_json(&ledger.open()?.reserve_account(&address)?)
        }
        Query::Members(Participant { ledger, address }) => {
            print_json(&ledger.open()?.pool_members(&address)?)
        }
        Query::Dust(Participant { ledger, address }) => print_json(&json!({
            "operator": address,
            "dust": ledger.open()?.dust(&address)?,
        })),
        Query::Locked(Participant { ledger, address }) => print_json(&json!({
            "operator": address,
            "locked": ledger.open()?.locked_balance(&address)?,
        })),
        Query::Aggregate(ParticipantInCycle {
            ledger,
            address,
            cycle,
        }) => print_json(&ledger.open()?.pool_aggregate(cycle, &address)?),
    }
}
