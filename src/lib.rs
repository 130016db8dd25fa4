//! # devicedims Core Library
//!
//! This crate is the core library for the `devicedims` tool. It produces a
//! canonical, deduplicated dataset of device-screen geometry (screen size,
//! safe-area insets, layout margins, readable-content insets, corner radius,
//! pixel scale, size classes) for the catalog of simulated handheld devices,
//! by driving the external Xcode toolchain, extracting the measurement
//! attachments its test runs emit, normalizing them, and persisting the
//! result as a stable, order-independent JSON artifact.
//!
//! ## Crate Structure
//!
//! The library is organized into several modules, each with a distinct
//! responsibility:
//!
//! - **`assemble`**: Deduplicates per-device records by full structural
//!   equality and orders the final dataset deterministically.
//! - **`attachment`**: Decodes one raw measurement file into a typed,
//!   orientation-tagged attachment.
//! - **`config`**: Strongly-typed configuration loaded from
//!   `config/devicedims.toml` and `DEVICEDIMS_`-prefixed environment
//!   variables. See [`config::Config`].
//! - **`error`**: The central [`error::HarvestError`] taxonomy; pre-flight
//!   aborts are a tagged variant the CLI inspects, not a crash path.
//! - **`geometry`**: The data model — attachments, oriented geometry
//!   payloads, the orientation-merged [`geometry::Dimensions`] record and
//!   its stable sort fingerprint.
//! - **`logging`**: Tracing subscriber setup from application settings.
//! - **`measure`**: Drives one device's build/test cycle and folds its
//!   attachments into one complete record, with a guaranteed-cleanup
//!   scratch directory.
//! - **`pipeline`**: The staged task runner sequencing preconditions,
//!   discovery, measurement, sorting and the atomic artifact commit.
//! - **`toolchain`**: The external-toolchain seam: an Xcode-backed driver
//!   and an in-memory mock for running the pipeline without Xcode.

pub mod assemble;
pub mod attachment;
pub mod config;
pub mod error;
pub mod geometry;
pub mod logging;
pub mod measure;
pub mod pipeline;
pub mod toolchain;
