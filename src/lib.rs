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

//! # rds-ssl-agent
//!
//! Automated SSL certificate lifecycle management for a Windows host running
//! Remote Desktop Services (RDS).
//!
//! The crate drives two independent batch pipelines, each exposed as its own
//! command-line binary:
//!
//! - **`ssl-export`** fetches the latest certificate for a domain from a
//!   remote issuing server, compares it against the locally persisted
//!   metadata record, and — when the received certificate supersedes the
//!   current one — exports the certificate, private key, and CA bundle to
//!   their configured paths and updates the metadata record.
//!
//! - **`rds-install`** converts an exported certificate to a PKCS #12
//!   container via OpenSSL, imports it into the machine certificate store
//!   with `certutil`, binds it as the active RDS certificate via WMI, and
//!   finally deletes expired certificates from the store.
//!
//! The two pipelines share no process state; they are connected only through
//! the exported files and the metadata record on disk. Each invocation is a
//! self-contained, re-entrant batch run: a run that is killed part-way leaves
//! state the next run's comparator tolerates.
//!
//! ## Quick Start
//!
//! ```no_run
//! use rds_ssl_agent::{AgentConfig, RemoteClient, ledger};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AgentConfig::load("config.json".as_ref())?;
//! let client = RemoteClient::new(&config)?;
//!
//! let fetched = client.fetch_certificate().await?;
//! let state = ledger::load_ledger(&config.metadata);
//!
//! match ledger::decide(&fetched.record(), &state, ledger::unix_now()) {
//!     ledger::Decision::Keep => println!("Certificate is up to date."),
//!     ledger::Decision::Reject(reason) => println!("Rejected: {reason}"),
//!     ledger::Decision::Replace(_) => {
//!         rds_ssl_agent::export::export_certificate(&config, &fetched)?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## External tools
//!
//! The install pipeline shells out to `openssl`, `certutil`, and `wmic`.
//! Each tool is wrapped in an adapter (see [`tools`]) that turns its textual
//! output into a typed outcome, so the brittle substring matching lives in
//! exactly one place per tool and can be exercised against canned output in
//! tests.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod error;
pub mod export;
pub mod fetch;
pub mod ledger;
pub mod store;
pub mod tools;
pub mod windows;

// Re-export main types at crate root for convenience
pub use config::AgentConfig;
pub use error::{AgentError, Result};
pub use fetch::{FetchedCertificate, RemoteClient};
pub use ledger::{CertificateRecord, Decision, LedgerState, RejectReason, ReplaceReason};
pub use store::{CleanupReport, StoreEntry};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// User-Agent string for requests to the remote issuing server.
pub const USER_AGENT: &str = concat!("rds-ssl-agent/", env!("CARGO_PKG_VERSION"));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_user_agent() {
        assert!(USER_AGENT.starts_with("rds-ssl-agent/"));
    }
}
