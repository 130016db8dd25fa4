//! Per-device measurement.
//!
//! Drives one device through the external toolchain and folds the
//! attachments it emitted into one complete [`Dimensions`] record. The
//! sub-sequence is strictly sequential: run the test cycle, locate the
//! newest result bundle, extract attachments, parse and fold, assemble.
//!
//! Each invocation claims its own uniquely-named scratch directory under the
//! system temp root, so concurrent sub-sequences can never collide, and the
//! directory is removed on every exit path — a failed device must not
//! pollute its siblings' retries.

use crate::attachment::{parse_attachment, ATTACHMENT_EXTENSION};
use crate::error::{HarvestError, HarvestResult};
use crate::geometry::{Dimensions, Orientation, OrientedDimensions};
use crate::toolchain::Toolchain;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Directory-name suffix of the toolchain's result bundle.
const RESULT_BUNDLE_SUFFIX: &str = "xcresult";

/// Measure one device and return its complete geometry record.
///
/// A failure at any step is scoped to this device; the scratch directory is
/// gone by the time this returns, success or not.
pub async fn measure_device(toolchain: &dyn Toolchain, device: &str) -> HarvestResult<Dimensions> {
    let scratch = tempfile::Builder::new()
        .prefix("devicedims-")
        .tempdir()?;
    debug!(device, scratch = %scratch.path().display(), "claimed scratch directory");

    let outcome = measure_in_scratch(toolchain, device, scratch.path()).await;

    // Unconditional cleanup; `close` also surfaces removal errors that a
    // plain drop would swallow.
    if let Err(err) = scratch.close() {
        warn!(device, error = %err, "failed to remove scratch directory");
    }
    outcome
}

async fn measure_in_scratch(
    toolchain: &dyn Toolchain,
    device: &str,
    scratch: &Path,
) -> HarvestResult<Dimensions> {
    toolchain.run_measurement(device, scratch).await?;

    let bundle = locate_result_bundle(scratch).ok_or_else(|| HarvestError::MissingArtifact {
        detail: format!(
            "the test cycle for '{device}' exited cleanly but produced no .{RESULT_BUNDLE_SUFFIX} bundle"
        ),
    })?;
    debug!(device, bundle = %bundle.display(), "located result bundle");

    let extracted = scratch.join("attachments");
    fs::create_dir_all(&extracted)?;
    toolchain.extract_attachments(&bundle, &extracted).await?;

    let files = attachment_files(&extracted)?;
    if files.is_empty() {
        return Err(HarvestError::MissingArtifact {
            detail: format!("the result bundle for '{device}' contained no attachments"),
        });
    }

    fold_attachments(device, &files)
}

/// Newest directory under `scratch` carrying the result-bundle suffix.
///
/// The toolchain may nest the bundle arbitrarily deep inside its derived
/// data; modification time breaks ties if stale bundles survive a rerun.
fn locate_result_bundle(scratch: &Path) -> Option<PathBuf> {
    WalkDir::new(scratch)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| {
            entry.file_type().is_dir()
                && entry
                    .path()
                    .extension()
                    .is_some_and(|ext| ext == RESULT_BUNDLE_SUFFIX)
        })
        .max_by_key(|entry| entry.metadata().ok().and_then(|meta| meta.modified().ok()))
        .map(walkdir::DirEntry::into_path)
}

/// Extracted attachment files, in whatever order the filesystem yields them.
fn attachment_files(dir: &Path) -> HarvestResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path
            .extension()
            .is_some_and(|ext| ext == ATTACHMENT_EXTENSION)
        {
            files.push(path);
        }
    }
    Ok(files)
}

/// Parse every attachment and fold the set into one record.
///
/// Routing is by orientation tag; `device`/`scale`/`radius` are taken from
/// whichever attachment last supplied them (both orientations agree by the
/// producer's contract). A missing orientation slot is an error, never a
/// half-populated record.
fn fold_attachments(device: &str, files: &[PathBuf]) -> HarvestResult<Dimensions> {
    let mut portrait: Option<OrientedDimensions> = None;
    let mut landscape: Option<OrientedDimensions> = None;
    let mut meta: Option<(String, f64, f64)> = None;

    for path in files {
        let attachment = parse_attachment(path)?;
        match attachment.orientation {
            Orientation::Portrait => portrait = Some(attachment.dimensions),
            Orientation::Landscape => landscape = Some(attachment.dimensions),
        }
        meta = Some((attachment.device, attachment.scale, attachment.radius));
    }

    let portrait = portrait.ok_or_else(|| HarvestError::IncompleteRecord {
        device: device.to_string(),
        orientation: Orientation::Portrait,
    })?;
    let landscape = landscape.ok_or_else(|| HarvestError::IncompleteRecord {
        device: device.to_string(),
        orientation: Orientation::Landscape,
    })?;
    let (device_tag, scale, radius) = meta.ok_or_else(|| HarvestError::MissingArtifact {
        detail: format!("no attachments were parsed for '{device}'"),
    })?;

    Ok(Dimensions {
        device: device_tag,
        scale,
        radius,
        portrait,
        landscape,
    })
}
