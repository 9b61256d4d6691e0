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

//! RDS SSL certificate installation tool.
//!
//! Takes an exported certificate and private key, converts them to a
//! PKCS #12 container with OpenSSL, imports the container into the machine
//! certificate store, binds the certificate to Remote Desktop Services, and
//! finally deletes expired certificates from the store.
//!
//! # Usage
//!
//! ```text
//! rds-install [OPTIONS] <CRT> <KEY>
//!
//! Arguments:
//!   <CRT>  Path to the SSL certificate in PEM format
//!   <KEY>  Path to the SSL private key in PEM format
//!
//! Options:
//!       --openssl <PATH>     Path to the OpenSSL executable [default: openssl]
//!       --pfx <PATH>         Path to save the PKCS #12 container
//!       --metadata <PATH>    Path to the certificate metadata file [default: metadata.json]
//!       --store-name <NAME>  Certificate store name in the local machine [default: My]
//!   -v, --verbose            Enable verbose output
//!   -q, --quiet              Suppress non-error output
//!   -h, --help               Print help
//!   -V, --version            Print version
//! ```
//!
//! Must be run with administrative privileges: certutil cannot modify the
//! machine store, nor WMI the RDS binding, otherwise.

use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use rds_ssl_agent::tools::{CertUtil, PfxConverter, rds};
use rds_ssl_agent::{AgentError, ledger, store, windows};

/// RDS SSL certificate installation tool.
#[derive(Parser)]
#[command(name = "rds-install")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Installs an SSL certificate for Remote Desktop Services and cleans expired store entries",
    long_about = None
)]
struct Cli {
    /// Path to the SSL certificate in PEM format
    #[arg(value_name = "CRT")]
    crt: PathBuf,

    /// Path to the SSL private key in PEM format
    #[arg(value_name = "KEY")]
    key: PathBuf,

    /// Path to the OpenSSL executable
    #[arg(long, value_name = "PATH", default_value = "openssl")]
    openssl: PathBuf,

    /// Path to save the PKCS #12 container (default: certificate path with a .pfx extension)
    #[arg(long, value_name = "PATH")]
    pfx: Option<PathBuf>,

    /// Path to the certificate metadata file
    #[arg(long, value_name = "PATH", default_value = "metadata.json")]
    metadata: PathBuf,

    /// Certificate store name in the local machine
    #[arg(long, value_name = "NAME", default_value = "My")]
    store_name: String,

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
    // Preconditions, checked before any mutation.
    windows::ensure_elevated()?;

    for path in [&cli.crt, &cli.key, &cli.metadata] {
        if !path.is_file() {
            return Err(AgentError::config(format!(
                "File not found: {}",
                path.display()
            )));
        }
    }

    let pfx = resolve_pfx_path(cli.pfx.as_deref(), &cli.crt)?;

    // Convert, import, bind, clean — each stage runs only after the prior
    // one reports success; there is no rollback.
    let converter = PfxConverter::new(&cli.openssl);
    converter.convert(&cli.crt, &cli.key, &pfx).await?;

    let certutil = CertUtil::new(cli.store_name.as_str());
    certutil.import_pfx(&pfx).await?;

    let record = ledger::read_record(&cli.metadata)?;
    rds::bind_certificate(&record.fingerprint).await?;

    let report = store::clean_store(&certutil, &record.fingerprint, ledger::unix_now()).await?;
    tracing::info!(
        "store cleanup finished: {} examined, {} deleted, {} failed, {} retained",
        report.examined,
        report.deleted,
        report.failed,
        report.retained
    );

    Ok(())
}

/// Validate an explicit PKCS #12 path, or derive one from the certificate
/// path by replacing a `.crt`/`.pem` extension with `.pfx`.
fn resolve_pfx_path(explicit: Option<&Path>, crt: &Path) -> rds_ssl_agent::Result<PathBuf> {
    if let Some(path) = explicit {
        if path.extension().and_then(|e| e.to_str()) != Some("pfx") {
            return Err(AgentError::config(
                "The path for the PKCS #12 certificate file must end with a .pfx extension",
            ));
        }
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.is_dir()
        {
            return Err(AgentError::config(format!(
                "The directory for the PKCS #12 certificate file was not found: {}",
                parent.display()
            )));
        }
        return Ok(path.to_path_buf());
    }

    Ok(derive_pfx_path(crt))
}

/// `server.crt` and `server.pem` become `server.pfx`; any other name keeps
/// its full name and gains the `.pfx` suffix.
fn derive_pfx_path(crt: &Path) -> PathBuf {
    let name = crt.to_string_lossy();
    let lower = name.to_lowercase();
    let stem = if lower.ends_with(".crt") || lower.ends_with(".pem") {
        &name[..name.len() - 4]
    } else {
        &name[..]
    };
    PathBuf::from(format!("{stem}.pfx"))
}
