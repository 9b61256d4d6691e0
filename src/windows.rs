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

//! Windows platform checks.
//!
//! Importing into the machine certificate store and setting the RDS binding
//! both require an elevated process; the install pipeline verifies this
//! before mutating anything.

use crate::error::{AgentError, Result};

/// Check if the current process has administrator privileges.
///
/// # Returns
///
/// `true` if the process is running with elevated privileges.
#[cfg(windows)]
pub fn is_elevated() -> bool {
    use std::mem::MaybeUninit;
    use windows::Win32::Security::{
        GetTokenInformation, TOKEN_ELEVATION, TOKEN_QUERY, TokenElevation,
    };
    use windows::Win32::System::Threading::{GetCurrentProcess, OpenProcessToken};

    unsafe {
        let mut token = windows::Win32::Foundation::HANDLE::default();
        if OpenProcessToken(GetCurrentProcess(), TOKEN_QUERY, &mut token).is_err() {
            return false;
        }

        let mut elevation = MaybeUninit::<TOKEN_ELEVATION>::uninit();
        let mut size = 0u32;

        let result = GetTokenInformation(
            token,
            TokenElevation,
            Some(elevation.as_mut_ptr() as *mut _),
            std::mem::size_of::<TOKEN_ELEVATION>() as u32,
            &mut size,
        );

        if result.is_ok() {
            elevation.assume_init().TokenIsElevated != 0
        } else {
            false
        }
    }
}

/// Non-Windows builds never report elevation.
#[cfg(not(windows))]
pub fn is_elevated() -> bool {
    false
}

/// Fail unless the process runs elevated on Windows.
///
/// # Errors
///
/// Returns [`AgentError::Platform`] when not elevated, or when not running
/// on Windows at all.
pub fn ensure_elevated() -> Result<()> {
    #[cfg(windows)]
    {
        if is_elevated() {
            Ok(())
        } else {
            Err(AgentError::platform(
                "administrative privileges are required; otherwise certutil cannot add the \
                 certificate or set it for Remote Desktop Services",
            ))
        }
    }

    #[cfg(not(windows))]
    {
        Err(AgentError::platform(
            "the install pipeline manages the Windows certificate store and RDS binding and must \
             run on Windows",
        ))
    }
}
