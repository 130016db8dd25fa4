//! Attachment file parsing.
//!
//! One attachment is one JSON file emitted by the measurement harness for a
//! single device/orientation pair. Parsing has no side effects beyond the
//! read and establishes no ordering; attachments arrive in whatever order the
//! filesystem enumerates them and the measurer folds them by orientation tag.

use crate::error::{HarvestError, HarvestResult};
use crate::geometry::RawAttachment;
use std::fs;
use std::path::Path;

/// File extension the extraction helper gives attachment files.
pub const ATTACHMENT_EXTENSION: &str = "json";

/// Read and decode one measurement attachment.
///
/// Fails with [`HarvestError::AttachmentRead`] if the file is absent or
/// unreadable, and with [`HarvestError::MalformedAttachment`] if it decodes
/// to something other than a well-formed, in-range attachment (missing
/// field, wrong type, orientation outside {portrait, landscape},
/// non-positive scale, negative radius).
pub fn parse_attachment(path: &Path) -> HarvestResult<RawAttachment> {
    let text = fs::read_to_string(path).map_err(|source| HarvestError::AttachmentRead {
        path: path.to_path_buf(),
        source,
    })?;

    let attachment: RawAttachment =
        serde_json::from_str(&text).map_err(|err| HarvestError::MalformedAttachment {
            path: path.to_path_buf(),
            detail: err.to_string(),
        })?;

    attachment
        .validate()
        .map_err(|detail| HarvestError::MalformedAttachment {
            path: path.to_path_buf(),
            detail,
        })?;

    Ok(attachment)
}
