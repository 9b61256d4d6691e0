// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 U.S. Federal Government (in countries where recognized)

//! PEM to PKCS #12 conversion via the OpenSSL command-line tool.

use std::path::{Path, PathBuf};

use crate::error::{AgentError, Result};

use super::{render_command, run_tool};

/// Adapter around `openssl pkcs12 -export`.
///
/// Combines a PEM certificate and PEM private key into a single
/// password-less PKCS #12 container suitable for import into the machine
/// certificate store.
#[derive(Debug, Clone)]
pub struct PfxConverter {
    openssl: PathBuf,
}

impl PfxConverter {
    /// Create a converter using the OpenSSL executable at `openssl`.
    pub fn new(openssl: impl Into<PathBuf>) -> Self {
        Self {
            openssl: openssl.into(),
        }
    }

    /// Convert `crt` + `key` into a PKCS #12 container at `pfx`.
    ///
    /// Success requires both a zero exit status and the output file actually
    /// existing afterwards; OpenSSL has failure modes that exit zero without
    /// producing output.
    pub async fn convert(&self, crt: &Path, key: &Path, pfx: &Path) -> Result<()> {
        let openssl = self.openssl.to_string_lossy();
        let crt_arg = crt.to_string_lossy();
        let key_arg = key.to_string_lossy();
        let pfx_arg = pfx.to_string_lossy();

        let args = [
            "pkcs12", "-export", "-passout", "pass:", "-in", &*crt_arg, "-inkey", &*key_arg,
            "-out", &*pfx_arg,
        ];
        let rendered = render_command(&openssl, &args);

        let output = run_tool(&openssl, &args).await?;
        if !output.success {
            return Err(AgentError::tool(
                rendered,
                format!(
                    "certificate conversion exited with code {:?}\n{}",
                    output.code, output.text
                ),
            ));
        }

        if !pfx.is_file() {
            return Err(AgentError::tool(
                rendered,
                format!(
                    "conversion command executed without errors, but the PKCS #12 file was not \
                     found at {}",
                    pfx.display()
                ),
            ));
        }

        tracing::info!("converted certificate to PKCS #12 format: {}", pfx.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_convert_missing_executable() {
        let dir = tempdir().unwrap();
        let converter = PfxConverter::new("no-such-openssl-xyzzy");

        let err = converter
            .convert(
                &dir.path().join("a.crt"),
                &dir.path().join("a.key"),
                &dir.path().join("a.pfx"),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::Tool { .. }));
    }

    #[cfg(not(windows))]
    #[tokio::test]
    async fn test_convert_requires_output_file() {
        // A tool that exits zero without creating the output file must still
        // be reported as a failure.
        let dir = tempdir().unwrap();
        let converter = PfxConverter::new("true");

        let err = converter
            .convert(
                &dir.path().join("a.crt"),
                &dir.path().join("a.key"),
                &dir.path().join("a.pfx"),
            )
            .await
            .unwrap_err();

        assert!(err.to_string().contains("was not found"));
    }
}
