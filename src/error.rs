//! Custom error types for the extraction pipeline.
//!
//! This module defines the primary error type, `HarvestError`, for the entire
//! application. Using the `thiserror` crate, it provides a centralized and
//! consistent way to handle the failure classes a run can encounter:
//!
//! - **`Preflight`**: the host cannot run the toolchain at all (wrong OS, a
//!   required binary missing from PATH). These abort before any device work
//!   and are rendered as a single remediation message, never a diagnostic
//!   dump; the top-level caller checks [`HarvestError::is_preflight`].
//! - **`Toolchain`** / **`ToolchainTimeout`**: the external build/test
//!   invocation failed or overran its budget. Fatal to the current device.
//! - **`MissingArtifact`**: the toolchain exited cleanly but the expected
//!   result bundle or attachments never appeared. Kept distinct from
//!   `Toolchain` because a zero exit status proves nothing about output.
//! - **`AttachmentRead`** / **`MalformedAttachment`**: one measurement file
//!   could not be read or decoded. Localized to the offending attachment.
//! - **`IncompleteRecord`**: only one orientation was captured for a device.
//!   Detected explicitly rather than silently emitting a half-record.
//! - **`NoDevices`**: discovery produced an empty catalog.
//! - **`Io`** / **`Json`** / **`Configuration`**: ambient failures.
//!
//! By using `#[from]`, `HarvestError` can be seamlessly created from
//! underlying error types with the `?` operator.

use crate::geometry::Orientation;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type HarvestResult<T> = std::result::Result<T, HarvestError>;

/// A precondition the host failed before any extraction work began.
///
/// Each variant carries enough context to print one actionable line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PreflightError {
    #[error("This tool drives the iOS simulator toolchain and must run on macOS (detected '{os}')")]
    UnsupportedHost { os: String },

    #[error("Required tool '{tool}' was not found on PATH. {hint}")]
    MissingTool { tool: String, hint: String },
}

#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("{0}")]
    Preflight(#[from] PreflightError),

    #[error("Toolchain invocation failed: {detail}")]
    Toolchain { detail: String },

    #[error("Toolchain invocation timed out after {}s: {detail}", .timeout.as_secs())]
    ToolchainTimeout { timeout: Duration, detail: String },

    #[error("Expected artifact was not produced: {detail}")]
    MissingArtifact { detail: String },

    #[error("Failed to read attachment {}: {source}", .path.display())]
    AttachmentRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed attachment {}: {detail}", .path.display())]
    MalformedAttachment { path: PathBuf, detail: String },

    #[error("Incomplete record for device '{device}': no {orientation} attachment was captured")]
    IncompleteRecord {
        device: String,
        orientation: Orientation,
    },

    #[error("No simulated devices matched the configured name filters")]
    NoDevices,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration validation error: {0}")]
    Configuration(String),
}

impl HarvestError {
    /// Whether this failure is an intentional pre-flight abort.
    ///
    /// Pre-flight aborts are rendered as a single remediation message and a
    /// non-zero exit; everything else is an unexpected failure and is
    /// reported with full diagnostic context.
    pub fn is_preflight(&self) -> bool {
        matches!(self, HarvestError::Preflight(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preflight_errors_are_tagged() {
        let err = HarvestError::from(PreflightError::MissingTool {
            tool: "xcparse".into(),
            hint: "Install it with: brew install chargepoint/xcparse/xcparse".into(),
        });
        assert!(err.is_preflight());
        assert!(err.to_string().contains("xcparse"));
        assert!(err.to_string().contains("brew install"));
    }

    #[test]
    fn toolchain_errors_are_not_preflight() {
        let err = HarvestError::Toolchain {
            detail: "xcodebuild exited with status 65".into(),
        };
        assert!(!err.is_preflight());
    }

    #[test]
    fn incomplete_record_names_device_and_orientation() {
        let err = HarvestError::IncompleteRecord {
            device: "iPhone 16 Pro".into(),
            orientation: Orientation::Landscape,
        };
        let message = err.to_string();
        assert!(message.contains("iPhone 16 Pro"));
        assert!(message.contains("landscape"));
    }
}
