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

use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use stackpool::{
    observability::{Color, setup_observability},
    panic::{panic_handler, version},
};
use std::sync::LazyLock;
use tracing::info;

mod cmd;

static VERSION: LazyLock<String> = LazyLock::new(version);

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply a journal of burn-chain blocks onto the ledger.
    ///
    /// Blocks already applied by a previous replay are skipped; the receipt (or rejection) of
    /// every event is printed to stdout, one JSON object per line.
    Replay(cmd::replay::Args),

    /// Query the ledger.
    #[command(subcommand)]
    Query(cmd::query::Query),
}

#[derive(Debug, Parser)]
#[clap(name = "Stackpool")]
#[clap(bin_name = "stackpool")]
#[clap(author, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[clap(long, action, env("STACKPOOL_WITH_JSON_TRACES"))]
    with_json_traces: bool,

    #[clap(long, action, env("STACKPOOL_COLOR"))]
    color: Option<Color>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    panic_handler();

    let matches = <Cli as CommandFactory>::command()
        .version(VERSION.as_str())
        .get_matches();
    let args = <Cli as FromArgMatches>::from_arg_matches(&matches)?;

    setup_observability(args.with_json_traces, Color::is_enabled(args.color));

    info!(
        with_json_traces = args.with_json_traces,
        "Started with global arguments"
    );

    match args.command {
        Command::Replay(args) => cmd::replay::run(args),
        Command::Query(query) => cmd::query::run(query),
    }
}
