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
use clap::Parser;
use serde_json::json;
use stackpool::journal::{load_journal_from_file, replay};
use stackpool_ledger::{BlockReport, LedgerError, Receipt};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Parser)]
pub struct Args {
    /// JSON-formatted journal of blocks to apply.
    #[arg(long, value_name = "FILE", env = "STACKPOOL_EVENTS")]
    events: PathBuf,

    #[command(flatten)]
    ledger: LedgerArgs,
}

fn event_line(burn_height: u64, result: &Result<Receipt, LedgerError>) -> serde_json::Value {
    match result {
        Ok(receipt) => json!({ "accepted": receipt }),
        Err(e) => json!({
            "rejected": {
                "burn_height": burn_height,
                "kind": e.kind().to_string(),
                "retryable": e.is_retryable(),
                "reason": e.to_string(),
            }
        }),
    }
}

fn print_report(report: &BlockReport) {
    for cycle in &report.frozen_cycles {
        println!("{}", json!({ "frozen": { "burn_height": report.burn_height, "cycle": cycle } }));
    }

    for result in report.transactions.iter().chain(report.reward.iter()) {
        println!("{}", event_line(report.burn_height, result));
    }
}

pub fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        events = %args.events.to_string_lossy(),
        ledger_dir = %args.ledger.ledger_dir.to_string_lossy(),
        "Running command replay",
    );

    let blocks = load_journal_from_file(&args.events)?;

    let mut engine = args.ledger.open()?;

    let summary = replay(&mut engine, &blocks, print_report)?;

    info!(
        applied = summary.applied,
        skipped = summary.skipped,
        accepted = summary.accepted,
        rejected = summary.rejected,
        tip = ?engine.tip()?,
        "Replay complete",
    );

    print_json(&json!({ "summary": summary }))
}
