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

//! Journals of burn-chain blocks, as handed over by the consensus layer, and their replay onto
//! a ledger.

use serde::Serialize;
use stackpool_ledger::{Block, BlockReport, Engine, LedgerError, Store};
use std::{fs::File, io::BufReader, path::Path};
use thiserror::Error;
use tracing::{Level, info, instrument, warn};

const EVENT_TARGET: &str = "stackpool::journal";

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("failed to open journal: {0}")]
    FileOpenError(#[from] std::io::Error),
    #[error("failed to parse journal JSON: {0}")]
    JsonParseError(#[from] serde_json::Error),
}

/// Load a journal: a JSON array of blocks, in the order they were finalized.
pub fn load_journal_from_file(path: &Path) -> Result<Vec<Block>, JournalError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    Ok(serde_json::from_reader(reader)?)
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    /// Blocks applied onto the ledger.
    pub applied: usize,
    /// Blocks at or below the ledger's tip, which were already applied by a previous replay.
    pub skipped: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub frozen_cycles: usize,
}

/// Apply every block of a journal onto the ledger, handing each block's report to `on_report`.
///
/// Blocks the ledger already went through are skipped, so that a journal can be replayed again
/// after being extended.
#[instrument(
    level = Level::TRACE,
    skip_all,
    name = "journal.replay",
    fields(blocks = blocks.len()),
)]
pub fn replay<S: Store>(
    engine: &mut Engine<S>,
    blocks: &[Block],
    mut on_report: impl FnMut(&BlockReport),
) -> Result<ReplaySummary, LedgerError> {
    let mut summary = ReplaySummary::default();

    for block in blocks {
        match engine.roll_forward(block) {
            Ok(report) => {
                summary.applied += 1;
                summary.accepted += report.accepted();
                summary.rejected += report.rejected();
                summary.frozen_cycles += report.frozen_cycles.len();
                on_report(&report);
            }
            Err(LedgerError::NonMonotonicHeight { tip, height }) => {
                warn!(target: EVENT_TARGET, tip, height, "block.skipped");
                summary.skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }

    info!(
        target: EVENT_TARGET,
        applied = summary.applied,
        skipped = summary.skipped,
        accepted = summary.accepted,
        rejected = summary.rejected,
        "journal.replayed"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stackpool_kernel::ProtocolParameters;
    use stackpool_ledger::MemoryStore;
    use std::io::Write;

    const JOURNAL: &str = r#"[
        {
            "burn_height": 101,
            "transactions": [
                {
                    "sender": "ST1SJ3DTE5DN7X54YDH5D64R3BCB6A2AG2ZQ8YPD5",
                    "nonce": 0,
                    "action": { "allow_caller": { "operator": "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM" } }
                },
                {
                    "sender": "ST1SJ3DTE5DN7X54YDH5D64R3BCB6A2AG2ZQ8YPD5",
                    "nonce": 1,
                    "action": { "join_pool": { "operator": "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM" } }
                },
                {
                    "sender": "ST1SJ3DTE5DN7X54YDH5D64R3BCB6A2AG2ZQ8YPD5",
                    "nonce": 2,
                    "action": { "delegate": { "amount": 125000000000, "operator": "ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM" } }
                },
                {
                    "sender": "ST1SJ3DTE5DN7X54YDH5D64R3BCB6A2AG2ZQ8YPD5",
                    "nonce": 2,
                    "action": "revoke"
                }
            ]
        },
        { "burn_height": 110 },
        {
            "burn_height": 111,
            "reward": {
                "winners": ["ST1PQHQKV0RJXZFY1DGX8MNSNYVE3VGZJSRTPGZGM"],
                "amount_per_address": 1000
            }
        }
    ]"#;

    fn journal() -> Vec<Block> {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(JOURNAL.as_bytes()).unwrap();
        load_journal_from_file(file.path()).unwrap()
    }

    #[test]
    fn replay_journal() {
        let mut engine = Engine::new(MemoryStore::new(), ProtocolParameters::default()).unwrap();
        let blocks = journal();

        let mut reports = Vec::new();
        let summary = replay(&mut engine, &blocks, |report| {
            reports.push(report.burn_height)
        })
        .unwrap();

        assert_eq!(
            summary,
            ReplaySummary {
                applied: 3,
                skipped: 0,
                accepted: 3,
                rejected: 1,
                frozen_cycles: 2,
            }
        );
        assert_eq!(reports, vec![101, 110, 111]);
        assert_eq!(engine.tip().unwrap(), Some(111));
    }

    #[test]
    fn replay_twice_skips_known_blocks() {
        let mut engine = Engine::new(MemoryStore::new(), ProtocolParameters::default()).unwrap();
        let blocks = journal();

        replay(&mut engine, &blocks, |_| ()).unwrap();
        let summary = replay(&mut engine, &blocks, |_| ()).unwrap();

        assert_eq!(summary.applied, 0);
        assert_eq!(summary.skipped, 3);
    }

    #[test]
    fn malformed_journal() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[{ \"burn_height\": \"soon\" }]").unwrap();
        assert!(matches!(
            load_journal_from_file(file.path()),
            Err(JournalError::JsonParseError(..))
        ));
    }
}
