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

//! Export pipeline configuration.
//!
//! The `ssl-export` binary is driven by a JSON configuration file that names
//! the remote issuing server, the authentication token, the target domain,
//! and the local output paths. All keys must be present; the `crt`, `key`,
//! and `cab` paths may be set to an empty string to skip exporting that
//! artifact.
//!
//! ```json
//! {
//!     "remote_url": "https://ca.example.com/api",
//!     "token": "Bearer abcd1234",
//!     "domain": "rds.example.com",
//!     "crt": "C:\\ssl\\rds.example.com.crt",
//!     "key": "C:\\ssl\\rds.example.com.key",
//!     "cab": "",
//!     "metadata": "C:\\ssl\\metadata.json"
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use url::Url;

use crate::error::{AgentError, Result};

/// Keys that must be present in the configuration file.
pub const REQUIRED_FIELDS: [&str; 7] = [
    "remote_url",
    "token",
    "domain",
    "crt",
    "key",
    "cab",
    "metadata",
];

/// Pre-validation mirror of the configuration file. Every field is optional
/// here so that missing keys can be reported all at once, by name.
#[derive(Debug, Deserialize)]
struct RawConfig {
    remote_url: Option<String>,
    token: Option<String>,
    domain: Option<String>,
    crt: Option<String>,
    key: Option<String>,
    cab: Option<String>,
    metadata: Option<String>,
}

impl RawConfig {
    fn missing_fields(&self) -> Vec<&'static str> {
        let present = [
            self.remote_url.is_some(),
            self.token.is_some(),
            self.domain.is_some(),
            self.crt.is_some(),
            self.key.is_some(),
            self.cab.is_some(),
            self.metadata.is_some(),
        ];
        REQUIRED_FIELDS
            .iter()
            .zip(present)
            .filter(|(_, p)| !p)
            .map(|(name, _)| *name)
            .collect()
    }
}

/// Validated configuration for the fetch-and-export pipeline.
///
/// Constructed once at startup by [`AgentConfig::load`] and passed by
/// reference into every component; nothing in the crate reads ambient
/// process state for its paths.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Base URL of the remote issuing server.
    pub remote_url: String,
    /// Authorization header value sent with the fetch request.
    pub token: String,
    /// Domain the certificate is requested for.
    pub domain: String,
    /// Output path for the PEM certificate, or `None` to skip exporting it.
    pub crt: Option<PathBuf>,
    /// Output path for the PEM private key, or `None` to skip exporting it.
    pub key: Option<PathBuf>,
    /// Output path for the PEM CA bundle, or `None` to skip exporting it.
    pub cab: Option<PathBuf>,
    /// Path of the persisted certificate metadata record.
    pub metadata: PathBuf,
}

impl AgentConfig {
    /// Load and validate the configuration file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Config`] if:
    /// - the file does not exist or cannot be read
    /// - the file is not valid JSON
    /// - any required key is missing (every missing key is named)
    /// - `remote_url` does not parse as a URL
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(AgentError::config(format!(
                "The configuration file does not exist. Path: {}",
                path.display()
            )));
        }

        let text = std::fs::read_to_string(path).map_err(|e| {
            AgentError::config(format!(
                "Failed to read the configuration file {}: {e}",
                path.display()
            ))
        })?;

        let raw: RawConfig = serde_json::from_str(&text).map_err(|e| {
            AgentError::config(format!(
                "Failed to parse the configuration file as JSON ({e}). Path: {}",
                path.display()
            ))
        })?;

        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self> {
        let missing = raw.missing_fields();
        if !missing.is_empty() {
            return Err(AgentError::config(format!(
                "The configuration file is missing the following required fields: {}",
                missing.join(", ")
            )));
        }

        let remote_url = raw.remote_url.unwrap_or_default();
        Url::parse(&remote_url).map_err(|e| {
            AgentError::config(format!("Invalid remote_url `{remote_url}`: {e}"))
        })?;

        let metadata = raw.metadata.unwrap_or_default();
        if metadata.is_empty() {
            return Err(AgentError::config(
                "The `metadata` path must not be empty",
            ));
        }

        Ok(Self {
            remote_url,
            token: raw.token.unwrap_or_default(),
            domain: raw.domain.unwrap_or_default(),
            crt: optional_path(raw.crt),
            key: optional_path(raw.key),
            cab: optional_path(raw.cab),
            metadata: PathBuf::from(metadata),
        })
    }

    /// Load configuration from a JSON string.
    ///
    /// Useful for testing or when config is provided programmatically.
    pub fn load_from_str(text: &str) -> Result<Self> {
        let raw: RawConfig = serde_json::from_str(text)
            .map_err(|e| AgentError::config(format!("Failed to parse configuration: {e}")))?;
        Self::from_raw(raw)
    }
}

/// An empty path value means "not configured": the export stage skips it.
fn optional_path(value: Option<String>) -> Option<PathBuf> {
    value.filter(|s| !s.is_empty()).map(PathBuf::from)
}
