// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 U.S. Federal Government (in countries where recognized)

//! Certificate metadata ledger and replacement comparator.
//!
//! The ledger is a single JSON record describing the certificate currently
//! exported to disk and expected to be bound to RDS. On every fetch the
//! comparator decides whether the received certificate should **replace** the
//! recorded one, be **kept** (no-op), or be **rejected**.
//!
//! The decision rules, in order:
//!
//! 1. A certificate whose validity window has not begun is rejected, no
//!    matter what the ledger says.
//! 2. With no usable ledger record (missing or corrupt file), the received
//!    certificate always replaces.
//! 3. An identical fingerprint is always a no-op, even if the recorded
//!    validity window disagrees.
//! 4. A replacement must strictly extend the expiry; anything else is
//!    rejected.
//!
//! The comparator is a pure function over the candidate record, the loaded
//! ledger state, and a caller-supplied wall-clock timestamp, so the ordering
//! above is pinned by unit tests without touching the filesystem.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::Result;

/// The persisted record of the currently active certificate.
///
/// At most one record exists at a time; it is written only by the export
/// stage after a certificate passes validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRecord {
    /// Subject host the certificate was issued for.
    pub domain: String,
    /// Start of the validity window (Unix timestamp).
    pub valid_from: i64,
    /// End of the validity window (Unix timestamp).
    pub valid_to: i64,
    /// SHA-1 fingerprint, the certificate's primary key everywhere.
    pub fingerprint: String,
}

/// Result of loading the ledger file.
///
/// `Missing` and `Corrupt` are ordinary states, not errors: both lead to a
/// replace decision so a damaged ledger never wedges the pipeline.
#[derive(Debug, Clone)]
pub enum LedgerState {
    /// The record was read and parsed.
    Loaded(CertificateRecord),
    /// No ledger file exists.
    Missing,
    /// The file exists but could not be read or parsed; carries the reason.
    Corrupt(String),
}

/// Load the ledger record from `path`.
///
/// Never fails: unreadable or unparseable files are reported as
/// [`LedgerState::Corrupt`] for the comparator to handle.
pub fn load_ledger(path: &Path) -> LedgerState {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return LedgerState::Missing,
        Err(e) => return LedgerState::Corrupt(format!("unreadable: {e}")),
    };

    match serde_json::from_str(&text) {
        Ok(record) => LedgerState::Loaded(record),
        Err(e) => LedgerState::Corrupt(format!("invalid JSON: {e}")),
    }
}

/// Read the ledger record from `path`, failing hard on any problem.
///
/// The install pipeline uses this: without a fingerprint there is nothing to
/// bind, so missing or corrupt metadata is fatal there.
pub fn read_record(path: &Path) -> Result<CertificateRecord> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        crate::error::AgentError::config(format!(
            "Failed to read the metadata file {}: {e}",
            path.display()
        ))
    })?;
    serde_json::from_str(&text).map_err(|e| {
        crate::error::AgentError::config(format!(
            "Failed to parse the metadata file as JSON ({e}). Path: {}",
            path.display()
        ))
    })
}

/// Persist `record` to `path` as pretty-printed JSON.
pub fn write_record(path: &Path, record: &CertificateRecord) -> Result<()> {
    let text = serde_json::to_string_pretty(record)?;
    std::fs::write(path, text)?;
    Ok(())
}

/// Why a certificate replaces the recorded one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceReason {
    /// No ledger file existed.
    LedgerMissing,
    /// The ledger file was unreadable or unparseable.
    LedgerCorrupt,
    /// The certificate is new and expires later than the recorded one.
    ExtendsValidity,
}

/// Why a certificate was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    /// The certificate's validity window has not begun.
    #[error(
        "the received certificate is not valid before {} (fingerprint {fingerprint})",
        fmt_timestamp(*valid_from)
    )]
    NotYetValid {
        /// Start of the validity window (Unix timestamp).
        valid_from: i64,
        /// Fingerprint of the rejected certificate.
        fingerprint: String,
    },

    /// The certificate expires at or before the recorded one.
    #[error(
        "the received certificate {new_fingerprint} (valid until {}) expires before the existing certificate {current_fingerprint} (valid until {})",
        fmt_timestamp(*new_valid_to),
        fmt_timestamp(*current_valid_to)
    )]
    ExpiryRegression {
        /// Fingerprint of the rejected certificate.
        new_fingerprint: String,
        /// Expiry of the rejected certificate (Unix timestamp).
        new_valid_to: i64,
        /// Fingerprint of the recorded certificate.
        current_fingerprint: String,
        /// Expiry of the recorded certificate (Unix timestamp).
        current_valid_to: i64,
    },
}

/// Outcome of comparing a received certificate against the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Export the received certificate and overwrite the record.
    Replace(ReplaceReason),
    /// The certificate is already current; do nothing.
    Keep,
    /// Do not export; the prior state stays in place.
    Reject(RejectReason),
}

/// Decide whether `candidate` should replace the recorded certificate.
///
/// `now` is the current wall clock as a Unix timestamp; see [`unix_now`].
pub fn decide(candidate: &CertificateRecord, ledger: &LedgerState, now: i64) -> Decision {
    // Validity check first: a not-yet-valid certificate is never exported,
    // not even over a missing or corrupt ledger.
    if candidate.valid_from > now {
        return Decision::Reject(RejectReason::NotYetValid {
            valid_from: candidate.valid_from,
            fingerprint: candidate.fingerprint.clone(),
        });
    }

    let current = match ledger {
        LedgerState::Loaded(record) => record,
        LedgerState::Missing => return Decision::Replace(ReplaceReason::LedgerMissing),
        LedgerState::Corrupt(_) => return Decision::Replace(ReplaceReason::LedgerCorrupt),
    };

    // Identical fingerprint short-circuits before the expiry comparison: the
    // same certificate must be a no-op even if the recorded window disagrees.
    if candidate.fingerprint == current.fingerprint {
        return Decision::Keep;
    }

    if candidate.valid_to <= current.valid_to {
        return Decision::Reject(RejectReason::ExpiryRegression {
            new_fingerprint: candidate.fingerprint.clone(),
            new_valid_to: candidate.valid_to,
            current_fingerprint: current.fingerprint.clone(),
            current_valid_to: current.valid_to,
        });
    }

    Decision::Replace(ReplaceReason::ExtendsValidity)
}

/// Current wall clock as a Unix timestamp.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Render a Unix timestamp as `YYYY-MM-DD HH:MM:SS` UTC for diagnostics.
pub fn fmt_timestamp(ts: i64) -> String {
    DateTime::from_timestamp(ts, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(fingerprint: &str, valid_from: i64, valid_to: i64) -> CertificateRecord {
        CertificateRecord {
            domain: "rds.example.com".to_string(),
            valid_from,
            valid_to,
            fingerprint: fingerprint.to_string(),
        }
    }

    #[test]
    fn test_equal_fingerprint_always_keeps() {
        // Even with a differing recorded window, the same fingerprint is a
        // no-op.
        let current = record("AA", 0, 1000);
        let candidate = record("AA", 0, 5000);
        let ledger = LedgerState::Loaded(current);

        assert_eq!(decide(&candidate, &ledger, 100), Decision::Keep);
    }

    #[test]
    fn test_not_yet_valid_rejected_even_without_record() {
        let candidate = record("BB", 2000, 9000);

        let decision = decide(&candidate, &LedgerState::Missing, 100);
        assert!(matches!(
            decision,
            Decision::Reject(RejectReason::NotYetValid { .. })
        ));
    }

    #[test]
    fn test_not_yet_valid_precedes_fingerprint_check() {
        let current = record("AA", 0, 1000);
        let candidate = record("AA", 2000, 9000);
        let ledger = LedgerState::Loaded(current);

        let decision = decide(&candidate, &ledger, 100);
        assert!(matches!(
            decision,
            Decision::Reject(RejectReason::NotYetValid { .. })
        ));
    }

    #[test]
    fn test_expiry_regression_rejected() {
        let current = record("AA", 0, 2000);
        let candidate = record("BB", 0, 1500);
        let ledger = LedgerState::Loaded(current);

        let decision = decide(&candidate, &ledger, 100);
        assert!(matches!(
            decision,
            Decision::Reject(RejectReason::ExpiryRegression { .. })
        ));
    }

    #[test]
    fn test_equal_expiry_rejected() {
        // A replacement must strictly extend validity.
        let current = record("AA", 0, 2000);
        let candidate = record("BB", 0, 2000);
        let ledger = LedgerState::Loaded(current);

        assert!(matches!(
            decide(&candidate, &ledger, 100),
            Decision::Reject(RejectReason::ExpiryRegression { .. })
        ));
    }

    #[test]
    fn test_missing_ledger_replaces() {
        let candidate = record("CC", 0, 9999);
        assert_eq!(
            decide(&candidate, &LedgerState::Missing, 100),
            Decision::Replace(ReplaceReason::LedgerMissing)
        );
    }

    #[test]
    fn test_corrupt_ledger_replaces() {
        let candidate = record("CC", 0, 9999);
        let ledger = LedgerState::Corrupt("invalid JSON".to_string());
        assert_eq!(
            decide(&candidate, &ledger, 100),
            Decision::Replace(ReplaceReason::LedgerCorrupt)
        );
    }

    #[test]
    fn test_newer_certificate_replaces() {
        let current = record("AA", 0, 1000);
        let candidate = record("BB", 0, 2000);
        let ledger = LedgerState::Loaded(current);

        let decision = decide(&candidate, &ledger, 100);
        assert_eq!(decision, Decision::Replace(ReplaceReason::ExtendsValidity));
    }

    #[test]
    fn test_load_ledger_missing_file() {
        let dir = tempdir().unwrap();
        let state = load_ledger(&dir.path().join("metadata.json"));
        assert!(matches!(state, LedgerState::Missing));
    }

    #[test]
    fn test_load_ledger_corrupt_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("metadata.json");
        std::fs::write(&path, "{ truncated").unwrap();

        let state = load_ledger(&path);
        assert!(matches!(state, LedgerState::Corrupt(_)));
    }

    #[test]
    fn test_write_then_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("metadata.json");
        let rec = record("AB:CD", 100, 9999);

        write_record(&path, &rec).unwrap();

        match load_ledger(&path) {
            LedgerState::Loaded(loaded) => assert_eq!(loaded, rec),
            other => panic!("expected Loaded, got {other:?}"),
        }
    }

    #[test]
    fn test_read_record_fails_on_missing_file() {
        let dir = tempdir().unwrap();
        let err = read_record(&dir.path().join("metadata.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }

    #[test]
    fn test_fmt_timestamp() {
        assert_eq!(fmt_timestamp(0), "1970-01-01 00:00:00");
        assert_eq!(fmt_timestamp(1_700_000_000), "2023-11-14 22:13:20");
    }

    // Scenario tests mirroring the documented replacement semantics.

    #[test]
    fn test_scenario_new_fingerprint_extended_expiry() {
        let current = record("AA", 0, 1000);
        let candidate = record("BB", 0, 2000);
        let ledger = LedgerState::Loaded(current);

        assert_eq!(
            decide(&candidate, &ledger, 500),
            Decision::Replace(ReplaceReason::ExtendsValidity)
        );
    }

    #[test]
    fn test_scenario_new_fingerprint_shorter_expiry() {
        let current = record("AA", 0, 2000);
        let candidate = record("BB", 0, 1500);
        let ledger = LedgerState::Loaded(current.clone());

        assert!(matches!(
            decide(&candidate, &ledger, 500),
            Decision::Reject(_)
        ));
        // The recorded state is untouched by a rejection.
        match ledger {
            LedgerState::Loaded(r) => assert_eq!(r, current),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_scenario_first_run_no_metadata() {
        let candidate = record("CC", 0, 9999);
        assert_eq!(
            decide(&candidate, &LedgerState::Missing, 500),
            Decision::Replace(ReplaceReason::LedgerMissing)
        );
    }
}
