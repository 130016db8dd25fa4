//! External toolchain abstraction.
//!
//! Everything the pipeline needs from the outside world sits behind the
//! [`Toolchain`] trait: host preflight probing, simulated-device discovery,
//! the per-device build/test cycle, attachment extraction from a result
//! bundle, and the platform version query. The pipeline itself never shells
//! out directly.
//!
//! Two implementations ship in-crate:
//!
//! - [`XcodeToolchain`] drives the real thing (`xcodebuild`, `xcrun simctl`,
//!   `xcparse`) as external processes.
//! - [`MockToolchain`] simulates the full contract on any host, writing
//!   synthetic result bundles and attachments, so the pipeline is testable
//!   without Xcode installed.

pub mod mock;
pub mod xcode;

pub use mock::MockToolchain;
pub use xcode::XcodeToolchain;

use crate::error::{HarvestResult, PreflightError};
use crate::geometry::PlatformDescriptor;
use async_trait::async_trait;
use std::path::Path;

/// The external device-simulation toolchain, as the pipeline sees it.
#[async_trait]
pub trait Toolchain: Send + Sync {
    /// Probe the host for every requirement the run needs.
    ///
    /// Must have no data side effects; a failure aborts the run before any
    /// device work and names the missing requirement.
    async fn preflight(&self) -> Result<(), PreflightError>;

    /// Enumerate the simulated devices available for measurement.
    ///
    /// The returned order is unspecified and must not influence the final
    /// dataset order.
    async fn discover_devices(&self) -> HarvestResult<Vec<String>>;

    /// Run one device's build/test cycle, directing derived output into
    /// `derived_data`. Success means a zero exit within the configured
    /// budget; it does not guarantee a result bundle was produced.
    async fn run_measurement(&self, device: &str, derived_data: &Path) -> HarvestResult<()>;

    /// Extract all attachment files embedded in `bundle` into `dest`.
    async fn extract_attachments(&self, bundle: &Path, dest: &Path) -> HarvestResult<()>;

    /// The platform/OS version this toolchain measures against.
    async fn platform_version(&self) -> HarvestResult<PlatformDescriptor>;
}
