// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 U.S. Federal Government (in countries where recognized)
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

//! Certificate export and the post-export hook.
//!
//! The export stage writes the received certificate material to its
//! configured paths and then records the new certificate in the metadata
//! ledger. The ordering matters: file writes happen first and any failure
//! there aborts before the ledger is touched, so the ledger never points at
//! files that were not written. A ledger write failure after successful file
//! writes is the opposite case — the files are already correct — and is
//! surfaced as a warning instead of failing the run; the comparator
//! reconciles on the next run.

use std::path::PathBuf;

use tokio::process::Command;

use crate::config::AgentConfig;
use crate::error::{AgentError, Result};
use crate::fetch::FetchedCertificate;
use crate::ledger;

/// What the export stage actually did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    /// Artifacts written, as `(name, path)` pairs.
    pub written: Vec<(&'static str, PathBuf)>,
    /// Whether the metadata record was persisted.
    ///
    /// `false` means the files on disk are newer than the ledger; the next
    /// run's comparator converges (same fingerprint becomes a no-op once the
    /// ledger catches up, otherwise it safely replaces again).
    pub ledger_updated: bool,
}

/// Export `cert`'s material to the configured paths and update the ledger.
///
/// Paths not present in the configuration are skipped. Any file write
/// failure aborts the stage with the failing path in the error and leaves
/// the ledger untouched.
pub fn export_certificate(config: &AgentConfig, cert: &FetchedCertificate) -> Result<ExportReport> {
    let mut written = Vec::new();

    tracing::info!("exporting new certificate");
    for (what, path, content) in [
        ("crt", config.crt.as_deref(), cert.crt.as_str()),
        ("key", config.key.as_deref(), cert.key.as_str()),
        ("cab", config.cab.as_deref(), cert.cab.as_str()),
    ] {
        let Some(path) = path else {
            tracing::debug!("no output path configured for {what}, skipping");
            continue;
        };

        std::fs::write(path, content).map_err(|source| AgentError::Export {
            what,
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!("  {what} => {}", path.display());
        written.push((what, path.to_path_buf()));
    }

    let record = cert.record();
    let ledger_updated = match ledger::write_record(&config.metadata, &record) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(
                "certificate files were exported, but the metadata record at {} could not be \
                 written: {e}; the ledger now lags the exported files until a later run succeeds",
                config.metadata.display()
            );
            false
        }
    };

    Ok(ExportReport {
        written,
        ledger_updated,
    })
}

/// Run the configured post-export shell command.
///
/// Invoked exactly once, after a successful export. The command runs under
/// the platform shell (`cmd /C` on Windows, `sh -c` elsewhere).
///
/// # Errors
///
/// Returns [`AgentError::Tool`] if the command cannot be launched or exits
/// nonzero. The exported state is already consistent at that point.
pub async fn run_post_export_hook(command: &str) -> Result<()> {
    tracing::info!("running post-export command: {command}");

    let status = shell_command(command)
        .status()
        .await
        .map_err(|e| AgentError::tool(command, format!("failed to launch: {e}")))?;

    if !status.success() {
        return Err(AgentError::tool(
            command,
            format!("post-export command exited with {status}"),
        ));
    }
    Ok(())
}

#[cfg(windows)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.args(["/C", command]);
    cmd
}

#[cfg(not(windows))]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.args(["-c", command]);
    cmd
}
