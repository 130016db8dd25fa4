//! Configuration system using Figment.
//!
//! Strongly-typed configuration for the extraction pipeline, merged from:
//! 1. `config/devicedims.toml` (base configuration, optional — every field
//!    has a default)
//! 2. Environment variables prefixed with `DEVICEDIMS_`
//!
//! # Example
//! ```no_run
//! use devicedims::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load()?;
//! println!("Scheme: {}", config.toolchain.scheme);
//! # Ok(())
//! # }
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/devicedims.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Application-level settings
    pub application: ApplicationConfig,
    /// External toolchain settings
    pub toolchain: ToolchainConfig,
    /// Output artifact settings
    pub output: OutputConfig,
}

/// Application-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log output format ("pretty" or "compact")
    pub log_format: String,
}

/// External toolchain configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    /// Build/test driver binary
    pub xcodebuild: String,
    /// Simulator control binary
    pub xcrun: String,
    /// Attachment extraction helper binary
    pub xcparse: String,
    /// Project the measurement harness lives in
    pub project: PathBuf,
    /// Scheme that runs the measurement tests
    pub scheme: String,
    /// Device-name prefixes admitted into the catalog
    pub device_prefixes: Vec<String>,
    /// Budget for one device's build/test cycle
    #[serde(with = "humantime_serde")]
    pub test_timeout: Duration,
}

/// Output artifact configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Path of the dataset artifact
    pub dataset_path: PathBuf,
    /// Path of the platform descriptor artifact
    pub descriptor_path: PathBuf,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            xcodebuild: "xcodebuild".to_string(),
            xcrun: "xcrun".to_string(),
            xcparse: "xcparse".to_string(),
            project: PathBuf::from("harness/DimensionsHarness.xcodeproj"),
            scheme: "DimensionsHarness".to_string(),
            device_prefixes: vec![
                "iPhone".to_string(),
                "iPad".to_string(),
                "iPod".to_string(),
            ],
            test_timeout: Duration::from_secs(15 * 60),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from("data/dimensions.json"),
            descriptor_path: PathBuf::from("data/platform.json"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            application: ApplicationConfig::default(),
            toolchain: ToolchainConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default file location and environment.
    ///
    /// Environment variables override file values with the `DEVICEDIMS_`
    /// prefix, e.g. `DEVICEDIMS_APPLICATION_LOG_LEVEL=debug`.
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("DEVICEDIMS_").split("_"))
            .extract()
    }

    /// Validate configuration after loading.
    pub fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            ));
        }

        let valid_formats = ["pretty", "compact"];
        if !valid_formats.contains(&self.application.log_format.as_str()) {
            return Err(format!(
                "Invalid log_format '{}'. Must be one of: {}",
                self.application.log_format,
                valid_formats.join(", ")
            ));
        }

        if self.toolchain.scheme.is_empty() {
            return Err("Toolchain scheme cannot be empty".to_string());
        }

        if self.toolchain.device_prefixes.is_empty() {
            return Err("At least one device-name prefix is required".to_string());
        }

        if self.toolchain.test_timeout.is_zero() {
            return Err("test_timeout must be non-zero".to_string());
        }

        if self.output.dataset_path == self.output.descriptor_path {
            return Err("dataset_path and descriptor_path must differ".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.application.log_level, "info");
        assert_eq!(config.toolchain.scheme, "DimensionsHarness");
        assert_eq!(config.toolchain.test_timeout, Duration::from_secs(900));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = Config::load_from("/nonexistent/devicedims.toml").unwrap();
        assert_eq!(config.toolchain.xcparse, "xcparse");
        assert_eq!(config.output.dataset_path, PathBuf::from("data/dimensions.json"));
    }

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            r#"
[application]
log_level = "debug"

[toolchain]
scheme = "GeometryProbe"
test_timeout = "5m"
"#
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.application.log_level, "debug");
        assert_eq!(config.toolchain.scheme, "GeometryProbe");
        assert_eq!(config.toolchain.test_timeout, Duration::from_secs(300));
        // Untouched sections keep their defaults
        assert_eq!(config.toolchain.xcodebuild, "xcodebuild");
    }

    #[test]
    fn validation_rejects_bad_level_and_empty_prefixes() {
        let mut config = Config::default();
        config.application.log_level = "verbose".to_string();
        assert!(config.validate().is_err());

        config.application.log_level = "info".to_string();
        config.toolchain.device_prefixes.clear();
        assert!(config.validate().is_err());
    }
}
