//! Mock toolchain implementation.
//!
//! Simulates the full external-toolchain contract without Xcode installed:
//! `run_measurement` materializes a synthetic result bundle inside the
//! scratch directory and `extract_attachments` copies the attachment files
//! out of it, exactly as `xcparse` would. Used by the pipeline and
//! integration tests on any host.
//!
//! The mock also records every scratch directory it was handed, so tests
//! can assert the guaranteed-cleanup property after a sub-sequence ends.

use crate::error::{HarvestError, HarvestResult, PreflightError};
use crate::geometry::PlatformDescriptor;
use crate::toolchain::Toolchain;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// In-memory stand-in for the Xcode toolchain.
pub struct MockToolchain {
    devices: Vec<String>,
    attachments: HashMap<String, Vec<serde_json::Value>>,
    descriptor: PlatformDescriptor,
    preflight_failure: Option<PreflightError>,
    failing_devices: HashSet<String>,
    empty_bundle_devices: HashSet<String>,
    scratch_dirs: Mutex<Vec<PathBuf>>,
}

impl Default for MockToolchain {
    fn default() -> Self {
        Self::new()
    }
}

impl MockToolchain {
    /// Create an empty mock with no devices and an iOS 17.5 descriptor.
    pub fn new() -> Self {
        Self {
            devices: Vec::new(),
            attachments: HashMap::new(),
            descriptor: PlatformDescriptor {
                name: "iOS".to_string(),
                version: "17.5".to_string(),
            },
            preflight_failure: None,
            failing_devices: HashSet::new(),
            empty_bundle_devices: HashSet::new(),
            scratch_dirs: Mutex::new(Vec::new()),
        }
    }

    /// Register a device and the attachment payloads its test run emits.
    pub fn with_device(mut self, name: &str, attachments: Vec<serde_json::Value>) -> Self {
        self.devices.push(name.to_string());
        self.attachments.insert(name.to_string(), attachments);
        self
    }

    /// Make `preflight` fail with the given error.
    pub fn with_preflight_failure(mut self, failure: PreflightError) -> Self {
        self.preflight_failure = Some(failure);
        self
    }

    /// Make the named device's measurement cycle exit non-zero.
    pub fn with_failing_device(mut self, name: &str) -> Self {
        self.devices.push(name.to_string());
        self.failing_devices.insert(name.to_string());
        self
    }

    /// Make the named device's cycle succeed without emitting a bundle.
    pub fn with_bundleless_device(mut self, name: &str) -> Self {
        self.devices.push(name.to_string());
        self.empty_bundle_devices.insert(name.to_string());
        self
    }

    /// Override the platform descriptor.
    pub fn with_descriptor(mut self, descriptor: PlatformDescriptor) -> Self {
        self.descriptor = descriptor;
        self
    }

    /// Every scratch directory handed to `run_measurement` so far.
    pub fn seen_scratch_dirs(&self) -> Vec<PathBuf> {
        self.scratch_dirs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl Toolchain for MockToolchain {
    async fn preflight(&self) -> Result<(), PreflightError> {
        match &self.preflight_failure {
            Some(failure) => Err(failure.clone()),
            None => Ok(()),
        }
    }

    async fn discover_devices(&self) -> HarvestResult<Vec<String>> {
        Ok(self.devices.clone())
    }

    async fn run_measurement(&self, device: &str, derived_data: &Path) -> HarvestResult<()> {
        self.scratch_dirs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(derived_data.to_path_buf());

        if self.failing_devices.contains(device) {
            return Err(HarvestError::Toolchain {
                detail: format!("xcodebuild test for '{device}' exited with exit status: 65"),
            });
        }
        if self.empty_bundle_devices.contains(device) {
            return Ok(());
        }

        let bundle = derived_data.join("Logs/Test/Run.xcresult");
        fs::create_dir_all(&bundle)?;
        let attachments = self.attachments.get(device).cloned().unwrap_or_default();
        for (index, payload) in attachments.iter().enumerate() {
            let path = bundle.join(format!("attachment_{index}.json"));
            fs::write(&path, serde_json::to_vec_pretty(payload)?)?;
        }
        Ok(())
    }

    async fn extract_attachments(&self, bundle: &Path, dest: &Path) -> HarvestResult<()> {
        if !bundle.is_dir() {
            return Err(HarvestError::Toolchain {
                detail: format!("xcparse: bundle '{}' not found", bundle.display()),
            });
        }
        for entry in fs::read_dir(bundle)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                let target = dest.join(entry.file_name());
                fs::copy(&path, &target)?;
            }
        }
        Ok(())
    }

    async fn platform_version(&self) -> HarvestResult<PlatformDescriptor> {
        Ok(self.descriptor.clone())
    }
}

/// Build a portrait/landscape attachment payload pair for tests and demos.
///
/// `screen` is the portrait width/height; the landscape payload swaps the
/// axes the way the harness reports them.
pub fn attachment_pair(device: &str, scale: f64, radius: f64, width: f64, height: f64) -> Vec<serde_json::Value> {
    let frame = |top: f64, right: f64, bottom: f64, left: f64| {
        serde_json::json!({ "top": top, "right": right, "bottom": bottom, "left": left })
    };
    vec![
        serde_json::json!({
            "orientation": "portrait",
            "device": device,
            "scale": scale,
            "radius": radius,
            "screen": { "width": width, "height": height },
            "safeArea": frame(47.0, 0.0, 34.0, 0.0),
            "layoutMargins": frame(47.0, 16.0, 34.0, 16.0),
            "readableContent": frame(47.0, 16.0, 34.0, 16.0),
            "sizeClasses": { "horizontal": "compact", "vertical": "regular" }
        }),
        serde_json::json!({
            "orientation": "landscape",
            "device": device,
            "scale": scale,
            "radius": radius,
            "screen": { "width": height, "height": width },
            "safeArea": frame(0.0, 47.0, 21.0, 47.0),
            "layoutMargins": frame(0.0, 63.0, 21.0, 63.0),
            "readableContent": frame(0.0, 63.0, 21.0, 63.0),
            "sizeClasses": { "horizontal": "compact", "vertical": "compact" }
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn measurement_materializes_bundle_and_extraction_copies_it() {
        let toolchain =
            MockToolchain::new().with_device("iPhone 15", attachment_pair("iPhone", 3.0, 0.0, 393.0, 852.0));
        let scratch = tempdir().unwrap();

        toolchain
            .run_measurement("iPhone 15", scratch.path())
            .await
            .unwrap();
        let bundle = scratch.path().join("Logs/Test/Run.xcresult");
        assert!(bundle.is_dir());

        let dest = scratch.path().join("attachments");
        fs::create_dir_all(&dest).unwrap();
        toolchain.extract_attachments(&bundle, &dest).await.unwrap();
        assert_eq!(fs::read_dir(&dest).unwrap().count(), 2);
    }

    #[tokio::test]
    async fn failing_device_reports_toolchain_error() {
        let toolchain = MockToolchain::new().with_failing_device("iPhone 15");
        let scratch = tempdir().unwrap();
        let err = toolchain
            .run_measurement("iPhone 15", scratch.path())
            .await
            .unwrap_err();
        assert!(matches!(err, HarvestError::Toolchain { .. }));
        assert_eq!(toolchain.seen_scratch_dirs().len(), 1);
    }

    #[tokio::test]
    async fn extraction_fails_for_missing_bundle() {
        let toolchain = MockToolchain::new();
        let scratch = tempdir().unwrap();
        let err = toolchain
            .extract_attachments(&scratch.path().join("absent.xcresult"), scratch.path())
            .await
            .unwrap_err();
        assert!(matches!(err, HarvestError::Toolchain { .. }));
    }
}
