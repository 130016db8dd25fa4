//! Xcode toolchain driver.
//!
//! Shells out to the real simulator toolchain: `xcrun simctl` for device and
//! runtime listings, `xcodebuild test` for the per-device measurement cycle,
//! `xcparse` for pulling attachments out of a result bundle. Every
//! invocation is an external process with a checked exit status; the
//! measurement cycle additionally runs under a timeout with the child killed
//! on abandonment.

use crate::config::ToolchainConfig;
use crate::error::{HarvestError, HarvestResult, PreflightError};
use crate::geometry::PlatformDescriptor;
use crate::toolchain::Toolchain;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::collections::HashMap;
use std::path::Path;
use std::process::Output;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info};

const XCODEBUILD_HINT: &str =
    "Install Xcode from the App Store, then select it with: xcode-select --switch /Applications/Xcode.app";
const XCRUN_HINT: &str = "Install the Xcode command line tools with: xcode-select --install";
const XCPARSE_HINT: &str = "Install it with: brew install chargepoint/xcparse/xcparse";

/// Drives `xcodebuild`, `xcrun simctl` and `xcparse` as external processes.
pub struct XcodeToolchain {
    config: ToolchainConfig,
}

impl XcodeToolchain {
    /// Create a toolchain driver from toolchain settings.
    pub fn new(config: ToolchainConfig) -> Self {
        Self { config }
    }

    async fn simctl_json(&self, args: &[&str]) -> HarvestResult<Vec<u8>> {
        let output = Command::new(&self.config.xcrun)
            .arg("simctl")
            .args(args)
            .args(["--json"])
            .output()
            .await?;
        if !output.status.success() {
            return Err(HarvestError::Toolchain {
                detail: format!(
                    "'{} simctl {}' exited with {}: {}",
                    self.config.xcrun,
                    args.join(" "),
                    output.status,
                    output_tail(&output)
                ),
            });
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl Toolchain for XcodeToolchain {
    async fn preflight(&self) -> Result<(), PreflightError> {
        if std::env::consts::OS != "macos" {
            return Err(PreflightError::UnsupportedHost {
                os: std::env::consts::OS.to_string(),
            });
        }

        let required = [
            (&self.config.xcodebuild, XCODEBUILD_HINT),
            (&self.config.xcrun, XCRUN_HINT),
            (&self.config.xcparse, XCPARSE_HINT),
        ];
        for (tool, hint) in required {
            if which::which(tool).is_err() {
                return Err(PreflightError::MissingTool {
                    tool: tool.clone(),
                    hint: hint.to_string(),
                });
            }
        }
        Ok(())
    }

    async fn discover_devices(&self) -> HarvestResult<Vec<String>> {
        let stdout = self.simctl_json(&["list", "devices", "available"]).await?;
        let listing: DeviceListing = serde_json::from_slice(&stdout)?;
        let devices = filter_device_names(&listing, &self.config.device_prefixes);
        debug!(count = devices.len(), "discovered simulated devices");
        Ok(devices)
    }

    async fn run_measurement(&self, device: &str, derived_data: &Path) -> HarvestResult<()> {
        let destination = format!("platform=iOS Simulator,name={device}");
        info!(device, "running measurement test cycle");

        let mut command = Command::new(&self.config.xcodebuild);
        command
            .arg("test")
            .arg("-project")
            .arg(&self.config.project)
            .args(["-scheme", &self.config.scheme])
            .args(["-destination", &destination])
            .arg("-derivedDataPath")
            .arg(derived_data)
            .kill_on_drop(true);

        let output = timeout(self.config.test_timeout, command.output())
            .await
            .map_err(|_| HarvestError::ToolchainTimeout {
                timeout: self.config.test_timeout,
                detail: format!("xcodebuild test for '{device}'"),
            })??;

        if !output.status.success() {
            return Err(HarvestError::Toolchain {
                detail: format!(
                    "xcodebuild test for '{device}' exited with {}: {}",
                    output.status,
                    output_tail(&output)
                ),
            });
        }
        Ok(())
    }

    async fn extract_attachments(&self, bundle: &Path, dest: &Path) -> HarvestResult<()> {
        debug!(bundle = %bundle.display(), "extracting attachments");
        let output = Command::new(&self.config.xcparse)
            .arg("attachments")
            .arg(bundle)
            .arg(dest)
            .output()
            .await?;
        if !output.status.success() {
            return Err(HarvestError::Toolchain {
                detail: format!(
                    "xcparse attachments for '{}' exited with {}: {}",
                    bundle.display(),
                    output.status,
                    output_tail(&output)
                ),
            });
        }
        Ok(())
    }

    async fn platform_version(&self) -> HarvestResult<PlatformDescriptor> {
        let stdout = self.simctl_json(&["list", "runtimes"]).await?;
        let listing: RuntimeListing = serde_json::from_slice(&stdout)?;
        newest_ios_runtime(&listing.runtimes).ok_or_else(|| HarvestError::Toolchain {
            detail: "no available iOS simulator runtime was found".to_string(),
        })
    }
}

/// `simctl list devices --json` payload: runtime identifier -> devices.
#[derive(Debug, Deserialize)]
struct DeviceListing {
    devices: HashMap<String, Vec<DeviceEntry>>,
}

#[derive(Debug, Deserialize)]
struct DeviceEntry {
    name: String,
    #[serde(rename = "isAvailable", default = "default_available")]
    is_available: bool,
}

/// `simctl list runtimes --json` payload.
#[derive(Debug, Deserialize)]
struct RuntimeListing {
    runtimes: Vec<RuntimeEntry>,
}

#[derive(Debug, Deserialize)]
struct RuntimeEntry {
    name: String,
    version: String,
    #[serde(rename = "isAvailable", default = "default_available")]
    is_available: bool,
}

fn default_available() -> bool {
    true
}

/// Collect unique device names matching any configured prefix.
///
/// The same hardware model appears once per installed runtime; the set
/// collapses those. Order is irrelevant downstream.
fn filter_device_names(listing: &DeviceListing, prefixes: &[String]) -> Vec<String> {
    let mut names = BTreeSet::new();
    for entries in listing.devices.values() {
        for entry in entries {
            if entry.is_available && prefixes.iter().any(|p| entry.name.starts_with(p.as_str())) {
                names.insert(entry.name.clone());
            }
        }
    }
    names.into_iter().collect()
}

/// Pick the highest-versioned available iOS runtime.
fn newest_ios_runtime(runtimes: &[RuntimeEntry]) -> Option<PlatformDescriptor> {
    runtimes
        .iter()
        .filter(|r| r.is_available && r.name.starts_with("iOS"))
        .max_by_key(|r| version_key(&r.version))
        .map(|r| PlatformDescriptor {
            name: "iOS".to_string(),
            version: r.version.clone(),
        })
}

/// Numeric ordering key for dotted version strings ("17.5" < "17.10").
fn version_key(version: &str) -> Vec<u32> {
    version
        .split('.')
        .map(|part| part.parse().unwrap_or(0))
        .collect()
}

fn output_tail(output: &Output) -> String {
    let stream = if output.stderr.is_empty() {
        &output.stdout
    } else {
        &output.stderr
    };
    let text = String::from_utf8_lossy(stream);
    let lines: Vec<&str> = text.lines().rev().take(10).collect();
    lines.into_iter().rev().collect::<Vec<_>>().join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEVICE_LISTING: &str = r#"{
        "devices": {
            "com.apple.CoreSimulator.SimRuntime.iOS-17-5": [
                { "name": "iPhone 15", "isAvailable": true },
                { "name": "iPhone 15 Pro Max", "isAvailable": true },
                { "name": "Apple TV", "isAvailable": true },
                { "name": "iPad Air 11-inch (M2)", "isAvailable": true }
            ],
            "com.apple.CoreSimulator.SimRuntime.iOS-16-4": [
                { "name": "iPhone 15", "isAvailable": true },
                { "name": "iPhone SE (3rd generation)", "isAvailable": false }
            ]
        }
    }"#;

    #[test]
    fn filters_by_prefix_and_availability_and_dedupes() {
        let listing: DeviceListing = serde_json::from_str(DEVICE_LISTING).unwrap();
        let prefixes = vec!["iPhone".to_string(), "iPad".to_string()];
        let names = filter_device_names(&listing, &prefixes);
        assert_eq!(
            names,
            vec![
                "iPad Air 11-inch (M2)".to_string(),
                "iPhone 15".to_string(),
                "iPhone 15 Pro Max".to_string(),
            ]
        );
    }

    #[test]
    fn picks_newest_available_ios_runtime() {
        let listing: RuntimeListing = serde_json::from_str(
            r#"{
                "runtimes": [
                    { "name": "iOS 16.4", "version": "16.4", "isAvailable": true },
                    { "name": "iOS 17.5", "version": "17.5", "isAvailable": true },
                    { "name": "watchOS 10.5", "version": "10.5", "isAvailable": true },
                    { "name": "iOS 18.0", "version": "18.0", "isAvailable": false }
                ]
            }"#,
        )
        .unwrap();
        let descriptor = newest_ios_runtime(&listing.runtimes).unwrap();
        assert_eq!(descriptor.name, "iOS");
        assert_eq!(descriptor.version, "17.5");
    }

    #[test]
    fn version_key_orders_numerically_not_lexically() {
        assert!(version_key("17.10") > version_key("17.5"));
        assert!(version_key("17.5") > version_key("16.9"));
    }
}
