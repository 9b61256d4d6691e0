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

//! Certificate store enumeration and expired-entry cleanup.
//!
//! `certutil -store` prints one text block per certificate. Each block is
//! parsed independently for its SHA-1 fingerprint, subject common name, and
//! optional `NotAfter:` expiration; a block with no expiration parses fine
//! and is simply exempt from expiry-based deletion.
//!
//! Cleanup policy: an entry is retained when it matches the active
//! fingerprint or carries no expiration; it is deleted when its expiration
//! is strictly before the current wall clock. Unlike every other stage in
//! the install pipeline, cleanup is best-effort: each deletion is attempted
//! independently and a failure is logged and counted rather than halting
//! the remaining candidates.

use chrono::NaiveDateTime;

use crate::error::Result;
use crate::ledger::fmt_timestamp;
use crate::tools::CertUtil;

/// Timestamp format certutil uses for `NotAfter:` fields.
pub const NOT_AFTER_FORMAT: &str = "%m/%d/%Y %I:%M %p";

/// One certificate as enumerated from the store.
///
/// Read-only view over state this system does not own; entries are created
/// by the store importer or external actors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEntry {
    /// SHA-1 fingerprint, the deletion key.
    pub fingerprint: String,
    /// Subject common name, when the block carries one.
    pub common_name: Option<String>,
    /// Expiration as a Unix timestamp; `None` when the entry has no
    /// `NotAfter:` field.
    pub not_after: Option<i64>,
}

/// Summary of one cleanup pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Entries parsed from the store listing.
    pub examined: usize,
    /// Expired entries successfully deleted.
    pub deleted: usize,
    /// Expired entries whose deletion failed.
    pub failed: usize,
    /// Entries retained (active, unexpired, or without expiration).
    pub retained: usize,
}

/// Parse a full `certutil -store` listing into store entries.
///
/// Blocks that carry no recognizable fingerprint are dropped; a missing
/// `NotAfter:` field is not an error.
pub fn parse_store_listing(listing: &str) -> Vec<StoreEntry> {
    split_certificate_blocks(listing)
        .iter()
        .filter_map(|block| parse_entry(block))
        .collect()
}

/// Split the listing on its `==== Certificate N ====` separator lines.
fn split_certificate_blocks(listing: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Option<String> = None;

    for line in listing.lines() {
        if is_block_header(line) {
            if let Some(block) = current.take() {
                blocks.push(block);
            }
            current = Some(String::new());
        } else if let Some(block) = current.as_mut() {
            block.push_str(line);
            block.push('\n');
        }
    }
    if let Some(block) = current {
        blocks.push(block);
    }
    blocks
}

fn is_block_header(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.starts_with("===") && trimmed.ends_with("===") && trimmed.contains(" Certificate ")
}

fn parse_entry(block: &str) -> Option<StoreEntry> {
    let fingerprint = field_token(block, "Cert Hash(sha1): ")?;
    let common_name = field_rest(block, "Subject: CN=");
    let not_after = field_rest(block, "NotAfter: ").and_then(|s| parse_not_after(&s));

    Some(StoreEntry {
        fingerprint,
        common_name,
        not_after,
    })
}

/// First whitespace-delimited token after `prefix` on any line of `block`.
fn field_token(block: &str, prefix: &str) -> Option<String> {
    field_rest(block, prefix)?
        .split_whitespace()
        .next()
        .map(str::to_string)
}

/// Remainder of the first line in `block` starting with `prefix`.
fn field_rest(block: &str, prefix: &str) -> Option<String> {
    block.lines().find_map(|line| {
        line.trim_start()
            .strip_prefix(prefix)
            .map(str::trim)
            .filter(|rest| !rest.is_empty())
            .map(str::to_string)
    })
}

/// Parse a certutil `NotAfter:` value (`6/15/2025 10:30 AM`).
fn parse_not_after(value: &str) -> Option<i64> {
    NaiveDateTime::parse_from_str(value, NOT_AFTER_FORMAT)
        .ok()
        .map(|dt| dt.and_utc().timestamp())
}

/// Split entries into deletion candidates and retained entries.
///
/// Retained: the active fingerprint (regardless of expiration), entries
/// with no expiration, and entries not yet expired. Candidates: everything
/// whose expiration is strictly before `now`.
pub fn partition_expired<'a>(
    entries: &'a [StoreEntry],
    active_fingerprint: &str,
    now: i64,
) -> (Vec<&'a StoreEntry>, Vec<&'a StoreEntry>) {
    let mut expired = Vec::new();
    let mut retained = Vec::new();

    for entry in entries {
        if entry.fingerprint == active_fingerprint {
            retained.push(entry);
            continue;
        }
        match entry.not_after {
            Some(not_after) if not_after < now => expired.push(entry),
            _ => retained.push(entry),
        }
    }
    (expired, retained)
}

/// Delete expired certificates from the store, retaining the active one.
///
/// Enumeration failure is an error; yielding zero parsed entries (despite a
/// certificate having been imported or confirmed present earlier in the
/// run) is reported as an anomaly and returns an empty report. Individual
/// deletion failures never stop the remaining candidates.
pub async fn clean_store(
    certutil: &CertUtil,
    active_fingerprint: &str,
    now: i64,
) -> Result<CleanupReport> {
    tracing::info!(
        "deleting expired certificate(s) from store {}",
        certutil.store_name()
    );

    let listing = certutil.list().await?;
    let entries = parse_store_listing(&listing);

    if entries.is_empty() {
        tracing::error!(
            "no certificates were parsed from store {}, even though a certificate was added or \
             reported present in a previous step",
            certutil.store_name()
        );
        return Ok(CleanupReport::default());
    }

    let (expired, retained) = partition_expired(&entries, active_fingerprint, now);
    let mut report = CleanupReport {
        examined: entries.len(),
        retained: retained.len(),
        ..Default::default()
    };

    for entry in expired {
        tracing::info!(
            "found expired certificate: CN={} fingerprint={} not_after={}",
            entry.common_name.as_deref().unwrap_or("?"),
            entry.fingerprint,
            entry.not_after.map(fmt_timestamp).unwrap_or_default(),
        );

        match certutil.delete(&entry.fingerprint).await {
            Ok(()) => {
                tracing::info!("deleted certificate {}", entry.fingerprint);
                report.deleted += 1;
            }
            Err(e) => {
                tracing::warn!("failed to delete certificate {}: {e}", entry.fingerprint);
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "My \"Personal\"\n\
================ Certificate 0 ================\n\
Serial Number: 00a1\n\
Issuer: CN=Example CA\n\
 NotBefore: 1/1/2023 12:00 PM\n\
 NotAfter: 6/15/2024 10:30 AM\n\
Subject: CN=old.example.com\n\
Cert Hash(sha1): aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa\n\
================ Certificate 1 ================\n\
Serial Number: 00b2\n\
Issuer: CN=Example Root\n\
Subject: CN=no-expiry.example.com\n\
Cert Hash(sha1): bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb\n\
================ Certificate 2 ================\n\
Serial Number: 00c3\n\
Issuer: CN=Example CA\n\
 NotBefore: 1/1/2024 12:00 PM\n\
 NotAfter: 6/15/2024 10:30 AM\n\
Subject: CN=rds.example.com\n\
Cert Hash(sha1): cccccccccccccccccccccccccccccccccccccccc\n\
CertUtil: -store command completed successfully.\n";

    #[test]
    fn test_parse_store_listing() {
        let entries = parse_store_listing(LISTING);
        assert_eq!(entries.len(), 3);

        assert_eq!(entries[0].fingerprint, "a".repeat(40));
        assert_eq!(entries[0].common_name.as_deref(), Some("old.example.com"));
        assert!(entries[0].not_after.is_some());

        // No NotAfter field: parsed without error, exempt from expiry.
        assert_eq!(entries[1].fingerprint, "b".repeat(40));
        assert_eq!(entries[1].not_after, None);

        assert_eq!(entries[2].common_name.as_deref(), Some("rds.example.com"));
    }

    #[test]
    fn test_parse_not_after_format() {
        let ts = parse_not_after("6/15/2024 10:30 AM").unwrap();
        assert_eq!(fmt_timestamp(ts), "2024-06-15 10:30:00");

        let pm = parse_not_after("12/1/2024 1:05 PM").unwrap();
        assert_eq!(fmt_timestamp(pm), "2024-12-01 13:05:00");

        assert_eq!(parse_not_after("not a date"), None);
    }

    #[test]
    fn test_parse_empty_listing() {
        assert!(parse_store_listing("").is_empty());
        assert!(parse_store_listing("CertUtil: -store command completed successfully.\n").is_empty());
    }

    #[test]
    fn test_block_without_fingerprint_is_dropped() {
        let listing = "================ Certificate 0 ================\n\
                       Subject: CN=anon.example.com\n";
        assert!(parse_store_listing(listing).is_empty());
    }

    fn entry(fp: &str, not_after: Option<i64>) -> StoreEntry {
        StoreEntry {
            fingerprint: fp.to_string(),
            common_name: None,
            not_after,
        }
    }

    #[test]
    fn test_partition_only_expired_nonactive_entries() {
        // Expired "AA", no-expiry "BB", expired-but-active "CC".
        let entries = vec![
            entry("AA", Some(500)),
            entry("BB", None),
            entry("CC", Some(500)),
        ];

        let (expired, retained) = partition_expired(&entries, "CC", 1000);

        let expired_fps: Vec<_> = expired.iter().map(|e| e.fingerprint.as_str()).collect();
        assert_eq!(expired_fps, vec!["AA"]);
        assert_eq!(retained.len(), 2);
    }

    #[test]
    fn test_no_expiry_entry_never_deleted() {
        let entries = vec![entry("BB", None)];
        let (expired, retained) = partition_expired(&entries, "ZZ", i64::MAX);
        assert!(expired.is_empty());
        assert_eq!(retained.len(), 1);
    }

    #[test]
    fn test_active_fingerprint_never_deleted() {
        let entries = vec![entry("CC", Some(0))];
        let (expired, retained) = partition_expired(&entries, "CC", i64::MAX);
        assert!(expired.is_empty());
        assert_eq!(retained.len(), 1);
    }

    #[test]
    fn test_unexpired_entry_retained() {
        let entries = vec![entry("DD", Some(2000))];
        let (expired, retained) = partition_expired(&entries, "ZZ", 1000);
        assert!(expired.is_empty());
        assert_eq!(retained.len(), 1);
    }

    #[test]
    fn test_expiry_boundary_is_strict() {
        // not_after == now is not "strictly before now".
        let entries = vec![entry("EE", Some(1000))];
        let (expired, _) = partition_expired(&entries, "ZZ", 1000);
        assert!(expired.is_empty());

        let (expired, _) = partition_expired(&entries, "ZZ", 1001);
        assert_eq!(expired.len(), 1);
    }
}
