// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 U.S. Federal Government (in countries where recognized)

//! RDS certificate binding via WMI.
//!
//! The binding lives in the `Win32_TSGeneralSetting` WMI class; setting its
//! `SSLCertificateSHA1Hash` property tells Remote Desktop Services which
//! certificate to present to clients.

use crate::error::{AgentError, Result};

use super::{render_command, run_tool};

/// Marker wmic prints when the property update was applied.
const UPDATE_SUCCESS_MARKER: &str = " update successful";

/// Set the machine's RDS SSL binding to the certificate with `fingerprint`.
///
/// Success is recognized only by the update marker in the tool output; any
/// other output or a nonzero exit is a failure, and the caller must not run
/// store cleanup afterwards (the active-certificate binding may not have
/// taken effect).
pub async fn bind_certificate(fingerprint: &str) -> Result<()> {
    let setting = format!("SSLCertificateSHA1Hash=\"{fingerprint}\"");
    let args = [
        r"/namespace:\\root\cimv2\TerminalServices",
        "PATH",
        "Win32_TSGeneralSetting",
        "Set",
        &setting,
    ];
    let rendered = render_command("wmic", &args);

    let output = run_tool("wmic", &args).await?;
    if !output.success {
        return Err(AgentError::tool(
            rendered,
            format!(
                "setting the RDS certificate exited with code {:?}\n{}",
                output.code, output.text
            ),
        ));
    }

    if !bind_succeeded(&output.text) {
        return Err(AgentError::tool(
            rendered,
            format!(
                "output did not confirm the RDS binding update\n{}",
                output.text
            ),
        ));
    }

    tracing::info!("certificate for RDS is set to {fingerprint}");
    Ok(())
}

/// Whether wmic output confirms the binding update.
pub fn bind_succeeded(output: &str) -> bool {
    output.contains(UPDATE_SUCCESS_MARKER)
}
