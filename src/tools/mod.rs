// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 U.S. Federal Government (in countries where recognized)

//! Adapters for the external command-line tools.
//!
//! The install pipeline delegates format conversion, store management, and
//! RDS binding to external tools whose only contract is their exit status
//! and textual output. Each adapter invokes one tool with an explicit
//! argument vector (no shell), captures stdout and stderr together, and
//! classifies the output into a typed outcome with a pure function so the
//! substring matching can be tested against canned output.
//!
//! Unrecognized output is always treated as failure.

pub mod certutil;
pub mod openssl;
pub mod rds;

pub use certutil::{CertUtil, ImportOutcome};
pub use openssl::PfxConverter;

use crate::error::{AgentError, Result};

/// Captured result of one external tool invocation.
#[derive(Debug)]
pub(crate) struct ToolOutput {
    /// Whether the tool exited with status zero.
    pub success: bool,
    /// Exit code, when the process exited normally.
    pub code: Option<i32>,
    /// Combined stdout and stderr text.
    pub text: String,
}

/// Run `program` with `args`, capturing stdout and stderr as one string.
///
/// Fails only when the process cannot be launched; a nonzero exit is
/// reported through [`ToolOutput::success`] so callers can attach the
/// captured output to their error.
pub(crate) async fn run_tool(program: &str, args: &[&str]) -> Result<ToolOutput> {
    let rendered = render_command(program, args);
    tracing::debug!("running: {rendered}");

    let output = tokio::process::Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|e| AgentError::tool(rendered.as_str(), format!("failed to launch: {e}")))?;

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    if !output.stderr.is_empty() {
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&String::from_utf8_lossy(&output.stderr));
    }

    Ok(ToolOutput {
        success: output.status.success(),
        code: output.status.code(),
        text,
    })
}

/// Render a command line for diagnostics.
pub(crate) fn render_command(program: &str, args: &[&str]) -> String {
    let mut rendered = String::from(program);
    for arg in args {
        rendered.push(' ');
        rendered.push_str(arg);
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_command() {
        assert_eq!(
            render_command("certutil", &["-store", "My"]),
            "certutil -store My"
        );
        assert_eq!(render_command("wmic", &[]), "wmic");
    }

    #[tokio::test]
    async fn test_run_tool_missing_program() {
        let err = run_tool("no-such-program-xyzzy", &[]).await.unwrap_err();
        assert!(matches!(err, AgentError::Tool { .. }));
        assert!(err.to_string().contains("failed to launch"));
    }

    #[cfg(not(windows))]
    #[tokio::test]
    async fn test_run_tool_captures_output_and_status() {
        let out = run_tool("sh", &["-c", "echo hello; exit 2"]).await.unwrap();
        assert!(!out.success);
        assert_eq!(out.code, Some(2));
        assert!(out.text.contains("hello"));
    }
}
