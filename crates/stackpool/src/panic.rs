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

use std::process::exit;

mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

/// Installs a panic handler that prints some useful diagnostics and asks the user to report
/// the issue.
pub fn panic_handler() {
    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let error_message = indoc::formatdoc! {
            r#"{fatal}
                Whoops! The stackpool process panicked, rather than handling the error it encountered gracefully.

                This is almost certainly a bug. The ledger database is left as of the last committed event,
                so it is safe to resume a replay once the issue is fixed.

                Please report this error, along with the information below and, if possible, the journal
                that produced it.
                {info}

                "#,
            info = build_info(),
            fatal = "stackpool::fatal::error",
        };
        eprintln!("\n{}", indent(&error_message, 3));
        prev(info);
        exit(1);
    }));
}

pub fn indent(lines: &str, n: usize) -> String {
    let tab = " ".repeat(n);
    lines
        .lines()
        .map(|line| format!("{tab}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_info() -> String {
    format!(
        r#"
Operating System: {}
Architecture:     {}
Version:          {}"#,
        built_info::CFG_OS,
        built_info::CFG_TARGET_ARCH,
        version(),
    )
}

/// Package version, suffixed with the short hash of the commit it was built from, when known.
pub fn version() -> String {
    let version = built_info::PKG_VERSION;
    match (built_info::GIT_COMMIT_HASH_SHORT, built_info::GIT_DIRTY) {
        (Some(sha), Some(true)) => format!("{version} ({sha}+dirty)"),
        (Some(sha), _) => format!("{version} ({sha})"),
        _ => version.to_string(),
    }
}
