// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 U.S. Federal Government (in countries where recognized)

//! Certificate store management via `certutil`.
//!
//! `certutil` reports everything through free-form text, so each operation
//! pairs the invocation with a pure classifier over the captured output.
//! The known success markers are narrow on purpose: anything the classifier
//! does not recognize counts as failure.

use std::path::Path;

use crate::error::{AgentError, Result};

use super::{render_command, run_tool};

/// Marker certutil prints when a certificate was newly added to a store.
const ADDED_MARKER: &str = " added to store.";
/// Marker certutil prints when the certificate already exists in the store.
const ALREADY_PRESENT_MARKER: &str = " already in store";
/// Marker certutil prints at the end of a successful command.
const COMPLETED_MARKER: &str = " completed successfully";

/// Outcome of importing a container into the store.
///
/// Both variants let the install pipeline continue; only unrecognized
/// output or a nonzero exit is a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    /// The certificate was newly added to the store.
    Added,
    /// An identical certificate was already present.
    AlreadyPresent,
}

/// Adapter around `certutil` operations on one named store.
#[derive(Debug, Clone)]
pub struct CertUtil {
    store_name: String,
}

impl CertUtil {
    /// Create an adapter for the store named `store_name` (e.g. `My`).
    pub fn new(store_name: impl Into<String>) -> Self {
        Self {
            store_name: store_name.into(),
        }
    }

    /// The store this adapter operates on.
    pub fn store_name(&self) -> &str {
        &self.store_name
    }

    /// Import a password-less PKCS #12 container into the store.
    pub async fn import_pfx(&self, pfx: &Path) -> Result<ImportOutcome> {
        let pfx_arg = pfx.to_string_lossy();
        let args = ["-p", "", "-importpfx", self.store_name.as_str(), &*pfx_arg];
        let rendered = render_command("certutil", &args);

        let output = run_tool("certutil", &args).await?;
        if !output.success {
            return Err(AgentError::tool(
                rendered,
                format!(
                    "import exited with code {:?}\n{}",
                    output.code, output.text
                ),
            ));
        }

        match classify_import(&output.text) {
            Some(outcome) => {
                match outcome {
                    ImportOutcome::Added => tracing::info!(
                        "added certificate to store {} in local machine",
                        self.store_name
                    ),
                    ImportOutcome::AlreadyPresent => tracing::info!(
                        "certificate already exists in store {} in local machine",
                        self.store_name
                    ),
                }
                Ok(outcome)
            }
            None => Err(AgentError::tool(
                rendered,
                format!("unrecognized import output\n{}", output.text),
            )),
        }
    }

    /// List the store contents as raw `certutil -store` text.
    ///
    /// The caller parses the listing (see [`crate::store`]); this method
    /// only verifies the listing command itself succeeded.
    pub async fn list(&self) -> Result<String> {
        let args = ["-store", self.store_name.as_str()];
        let rendered = render_command("certutil", &args);

        let output = run_tool("certutil", &args).await?;
        if !output.success || !listing_succeeded(&output.text) {
            return Err(AgentError::tool(
                rendered,
                format!(
                    "store listing exited with code {:?}\n{}",
                    output.code, output.text
                ),
            ));
        }
        Ok(output.text)
    }

    /// Delete the certificate identified by `fingerprint` from the store.
    pub async fn delete(&self, fingerprint: &str) -> Result<()> {
        let args = ["-delstore", self.store_name.as_str(), fingerprint];
        let rendered = render_command("certutil", &args);

        let output = run_tool("certutil", &args).await?;
        if !output.success {
            return Err(AgentError::tool(
                rendered,
                format!(
                    "deletion exited with code {:?}\n{}",
                    output.code, output.text
                ),
            ));
        }

        if !delete_succeeded(&output.text, fingerprint) {
            return Err(AgentError::tool(
                rendered,
                format!("deletion output did not confirm removal\n{}", output.text),
            ));
        }
        Ok(())
    }
}

/// Classify `certutil -importpfx` output.
///
/// Returns `None` for anything other than the two known success shapes.
pub fn classify_import(output: &str) -> Option<ImportOutcome> {
    if output.contains(ADDED_MARKER) {
        Some(ImportOutcome::Added)
    } else if output.contains(ALREADY_PRESENT_MARKER) {
        Some(ImportOutcome::AlreadyPresent)
    } else {
        None
    }
}

/// Whether `certutil -store` output reports overall success.
pub fn listing_succeeded(output: &str) -> bool {
    output.contains("CertUtil: -store command completed successfully.")
}

/// Whether `certutil -delstore` output confirms removal of `fingerprint`.
///
/// certutil can exit zero while deleting nothing, so the output must both
/// name the fingerprint and report completion.
pub fn delete_succeeded(output: &str, fingerprint: &str) -> bool {
    output.contains(fingerprint) && output.contains(COMPLETED_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_import_added() {
        let output = "Certificate \"rds.example.com\" added to store.\n\
                      CertUtil: -importPFX command completed successfully.";
        assert_eq!(classify_import(output), Some(ImportOutcome::Added));
    }

    #[test]
    fn test_classify_import_already_present() {
        let output = "Certificate \"rds.example.com\" already in store.\n\
                      CertUtil: -importPFX command completed successfully.";
        assert_eq!(classify_import(output), Some(ImportOutcome::AlreadyPresent));
    }

    #[test]
    fn test_classify_import_unrecognized() {
        assert_eq!(classify_import("CertUtil: -importPFX command FAILED"), None);
        assert_eq!(classify_import(""), None);
    }

    #[test]
    fn test_listing_succeeded() {
        assert!(listing_succeeded(
            "================ Certificate 0 ================\n\
             CertUtil: -store command completed successfully."
        ));
        assert!(!listing_succeeded("CertUtil: -store command FAILED"));
    }

    #[test]
    fn test_delete_succeeded_requires_fingerprint_and_completion() {
        let fp = "1a2b3c4d";
        let ok = format!(
            "Deleting Certificate {fp}\nCertUtil: -delstore command completed successfully."
        );
        assert!(delete_succeeded(&ok, fp));

        // Completion without the fingerprint means something else was (or
        // was not) deleted.
        let wrong_cert = "Deleting Certificate ffff\n\
                          CertUtil: -delstore command completed successfully.";
        assert!(!delete_succeeded(wrong_cert, fp));

        let no_completion = format!("Deleting Certificate {fp}");
        assert!(!delete_succeeded(&no_completion, fp));
    }

    #[tokio::test]
    async fn test_import_missing_certutil_is_tool_error() {
        // On hosts without certutil the launch itself fails; that must be a
        // typed tool error, not a panic.
        if which_certutil() {
            return;
        }
        let adapter = CertUtil::new("My");
        let err = adapter
            .import_pfx(Path::new("/nonexistent/a.pfx"))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Tool { .. }));
    }

    fn which_certutil() -> bool {
        std::process::Command::new("certutil")
            .arg("-?")
            .output()
            .is_ok()
    }
}
