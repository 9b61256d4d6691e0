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

//! SSL certificate download and export tool.
//!
//! Fetches the latest certificate for the configured domain from the remote
//! issuing server, validates it against the persisted metadata record, and
//! exports the certificate, private key, and CA bundle to the configured
//! paths. Optionally runs a shell command after a new certificate has been
//! exported (e.g. to restart a service that reads the files).
//!
//! # Usage
//!
//! ```text
//! ssl-export [OPTIONS]
//!
//! Options:
//!   -c, --config <PATH>       Path to the JSON configuration file
//!       --on-export <COMMAND> Shell command to run after exporting a new certificate
//!   -v, --verbose             Enable verbose output
//!   -q, --quiet               Suppress non-error output
//!   -h, --help                Print help
//!   -V, --version             Print version
//! ```
//!
//! Designed to be run repeatedly by an external scheduler; a run that finds
//! the certificate already current is a successful no-op.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use rds_ssl_agent::{AgentConfig, Decision, LedgerState, RemoteClient, export, ledger};

/// SSL certificate download and export tool.
#[derive(Parser)]
#[command(name = "ssl-export")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Downloads the latest SSL certificate from the remote server and exports it to the local machine",
    long_about = None
)]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long, value_name = "PATH", default_value = "config.json")]
    config: PathBuf,

    /// Shell command to execute after exporting a new certificate
    #[arg(long, value_name = "COMMAND")]
    on_export: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Suppress non-error output
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.quiet {
        tracing::Level::ERROR
    } else if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    // Create runtime for async operations
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(&cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> rds_ssl_agent::Result<()> {
    tracing::info!(
        "certificate export run starting at {}",
        ledger::fmt_timestamp(ledger::unix_now())
    );

    let config = AgentConfig::load(&cli.config)?;
    tracing::debug!("configuration loaded from {}", cli.config.display());

    let client = RemoteClient::new(&config)?;
    let fetched = client.fetch_certificate().await?;

    let state = ledger::load_ledger(&config.metadata);
    match &state {
        LedgerState::Loaded(record) => {
            tracing::debug!(
                "current metadata record: fingerprint {} valid until {}",
                record.fingerprint,
                ledger::fmt_timestamp(record.valid_to)
            );
        }
        LedgerState::Missing => tracing::info!("metadata file does not exist"),
        LedgerState::Corrupt(reason) => tracing::warn!(
            "metadata file at {} could not be used ({reason}); exporting the received \
             certificate to override it",
            config.metadata.display()
        ),
    }

    match ledger::decide(&fetched.record(), &state, ledger::unix_now()) {
        Decision::Keep => {
            tracing::info!("certificate is up to date");
            return Ok(());
        }
        Decision::Reject(reason) => return Err(reason.into()),
        Decision::Replace(_) => {}
    }

    tracing::info!(
        "received new certificate with fingerprint {}",
        fetched.fingerprint
    );
    export::export_certificate(&config, &fetched)?;

    if let Some(command) = &cli.on_export {
        export::run_post_export_hook(command).await?;
    }

    Ok(())
}
