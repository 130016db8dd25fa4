//! The staged extraction pipeline.
//!
//! Sequences the run through its stages and owns the only durable writes:
//!
//! ```text
//! Idle -> VerifyingPreconditions -> DiscoveringDevices -> MeasuringDevices
//!      -> Sorting -> Persisting -> Done
//!                          (any stage) -> Aborted
//! ```
//!
//! Each stage transitions to the next only on success; a failure moves the
//! pipeline to `Aborted` carrying the cause, and aborted runs never touch
//! the output artifacts. A [`ProgressObserver`] is notified on transitions
//! and per-device progress; console reporting is an observer concern, not
//! pipeline semantics.
//!
//! Devices are measured sequentially — the external build/test harness is
//! heavyweight and exclusive — but each sub-sequence claims its own scratch
//! directory and shares no state with its siblings, so bounded concurrent
//! fan-out stays possible without changing observable behavior. One failing
//! device aborts the whole run: a dataset silently missing a device is a
//! worse defect than a loud failure.

use crate::assemble::DatasetAssembler;
use crate::config::OutputConfig;
use crate::error::{HarvestError, HarvestResult};
use crate::geometry::{Dimensions, PlatformDescriptor};
use crate::measure::measure_device;
use crate::toolchain::Toolchain;
use chrono::{DateTime, Utc};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

/// Pipeline lifecycle stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// No run active
    Idle,
    /// Probing the host environment and tool availability
    VerifyingPreconditions,
    /// Enumerating the simulated-device catalog
    DiscoveringDevices,
    /// Running per-device measurement sub-sequences
    MeasuringDevices,
    /// Deduplicating and ordering the record set
    Sorting,
    /// Committing the output artifacts
    Persisting,
    /// Run completed and artifacts committed
    Done,
    /// Run failed; artifacts untouched
    Aborted,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Stage::Idle => "Idle",
            Stage::VerifyingPreconditions => "VerifyingPreconditions",
            Stage::DiscoveringDevices => "DiscoveringDevices",
            Stage::MeasuringDevices => "MeasuringDevices",
            Stage::Sorting => "Sorting",
            Stage::Persisting => "Persisting",
            Stage::Done => "Done",
            Stage::Aborted => "Aborted",
        };
        write!(f, "{label}")
    }
}

impl Stage {
    /// Whether the pipeline can accept no further work in this stage.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done | Stage::Aborted)
    }
}

/// Receives pipeline progress notifications.
///
/// All methods have empty defaults so an observer implements only what it
/// cares about.
pub trait ProgressObserver: Send + Sync {
    /// The pipeline entered a new stage.
    fn stage_changed(&self, _stage: Stage) {}
    /// A device's measurement sub-sequence began.
    fn device_started(&self, _device: &str, _index: usize, _total: usize) {}
    /// A device's sub-sequence produced a complete record.
    fn device_measured(&self, _device: &str, _record: &Dimensions) {}
}

/// Default observer: reports progress through `tracing`.
#[derive(Debug, Default)]
pub struct LogObserver;

impl ProgressObserver for LogObserver {
    fn stage_changed(&self, stage: Stage) {
        info!(stage = %stage, "pipeline stage");
    }

    fn device_started(&self, device: &str, index: usize, total: usize) {
        info!(device, step = index + 1, total, "measuring device");
    }

    fn device_measured(&self, device: &str, record: &Dimensions) {
        info!(
            device,
            class = %record.device,
            scale = record.scale,
            radius = record.radius,
            "device measured"
        );
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Unique run identifier
    pub run_id: String,
    /// Devices the catalog contained (all measured)
    pub devices_measured: usize,
    /// Unique records in the committed dataset
    pub unique_records: usize,
    /// Platform the run measured against
    pub platform: PlatformDescriptor,
    /// When the run began
    pub started_at: DateTime<Utc>,
    /// When the artifacts were committed
    pub finished_at: DateTime<Utc>,
}

/// The extraction task runner.
pub struct Pipeline {
    toolchain: Arc<dyn Toolchain>,
    output: OutputConfig,
    observer: Box<dyn ProgressObserver>,
    stage: Stage,
}

impl Pipeline {
    /// Create a pipeline over a toolchain, reporting through [`LogObserver`].
    pub fn new(toolchain: Arc<dyn Toolchain>, output: OutputConfig) -> Self {
        Self {
            toolchain,
            output,
            observer: Box::new(LogObserver),
            stage: Stage::Idle,
        }
    }

    /// Replace the progress observer.
    pub fn with_observer(mut self, observer: Box<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// The stage the pipeline is currently in.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Execute a full extraction run.
    ///
    /// On success the artifacts have been committed atomically and the
    /// summary describes the run. On failure the pipeline is `Aborted` and
    /// the artifacts are exactly as they were before the run.
    pub async fn run(&mut self) -> HarvestResult<RunSummary> {
        let started_at = Utc::now();
        let run_id = Uuid::new_v4().to_string();
        info!(run_id = %run_id, "starting extraction run");

        match self.execute(&run_id, started_at).await {
            Ok(summary) => {
                self.transition(Stage::Done);
                info!(
                    run_id = %run_id,
                    records = summary.unique_records,
                    "extraction run complete"
                );
                Ok(summary)
            }
            Err(err) => {
                if !err.is_preflight() {
                    error!(run_id = %run_id, error = %err, "extraction run aborted");
                }
                self.transition(Stage::Aborted);
                Err(err)
            }
        }
    }

    async fn execute(
        &mut self,
        run_id: &str,
        started_at: DateTime<Utc>,
    ) -> HarvestResult<RunSummary> {
        self.transition(Stage::VerifyingPreconditions);
        self.toolchain.preflight().await?;

        self.transition(Stage::DiscoveringDevices);
        let devices = self.toolchain.discover_devices().await?;
        if devices.is_empty() {
            return Err(HarvestError::NoDevices);
        }
        info!(count = devices.len(), "device catalog ready");

        self.transition(Stage::MeasuringDevices);
        let total = devices.len();
        let mut assembler = DatasetAssembler::new();
        for (index, device) in devices.iter().enumerate() {
            self.observer.device_started(device, index, total);
            let record = measure_device(self.toolchain.as_ref(), device).await?;
            self.observer.device_measured(device, &record);
            assembler.insert(record);
        }

        self.transition(Stage::Sorting);
        let records = assembler.into_sorted();

        self.transition(Stage::Persisting);
        let platform = self.toolchain.platform_version().await?;
        persist_artifacts(&records, &platform, &self.output)?;

        Ok(RunSummary {
            run_id: run_id.to_string(),
            devices_measured: total,
            unique_records: records.len(),
            platform,
            started_at,
            finished_at: Utc::now(),
        })
    }

    fn transition(&mut self, stage: Stage) {
        self.stage = stage;
        self.observer.stage_changed(stage);
    }
}

/// Commit the dataset and descriptor, each atomically.
///
/// Both artifacts replace their predecessors wholesale; a consumer never
/// observes a partially written file.
pub fn persist_artifacts(
    records: &[Dimensions],
    platform: &PlatformDescriptor,
    output: &OutputConfig,
) -> HarvestResult<()> {
    write_atomic(&output.dataset_path, &serde_json::to_string_pretty(records)?)?;
    write_atomic(
        &output.descriptor_path,
        &serde_json::to_string_pretty(platform)?,
    )?;
    info!(
        dataset = %output.dataset_path.display(),
        descriptor = %output.descriptor_path.display(),
        "artifacts committed"
    );
    Ok(())
}

/// Write `contents` to `path` via a temp file in the same directory and an
/// atomic rename over the destination.
fn write_atomic(path: &Path, contents: &str) -> HarvestResult<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut staged = tempfile::NamedTempFile::new_in(parent)?;
    staged.write_all(contents.as_bytes())?;
    staged.write_all(b"\n")?;
    staged
        .persist(path)
        .map_err(|persist| HarvestError::Io(persist.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PreflightError;
    use crate::toolchain::mock::{attachment_pair, MockToolchain};
    use std::sync::Mutex;
    use tempfile::tempdir;

    #[derive(Default)]
    struct RecordingObserver {
        stages: Mutex<Vec<Stage>>,
    }

    impl ProgressObserver for RecordingObserver {
        fn stage_changed(&self, stage: Stage) {
            self.stages
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .push(stage);
        }
    }

    fn output_in(dir: &Path) -> OutputConfig {
        OutputConfig {
            dataset_path: dir.join("dimensions.json"),
            descriptor_path: dir.join("platform.json"),
        }
    }

    #[tokio::test]
    async fn stages_advance_in_order_on_success() {
        let dir = tempdir().unwrap();
        let toolchain = MockToolchain::new()
            .with_device("iPhone 15", attachment_pair("iPhone", 3.0, 55.0, 393.0, 852.0));
        let observer = Arc::new(RecordingObserver::default());

        struct Forward(Arc<RecordingObserver>);
        impl ProgressObserver for Forward {
            fn stage_changed(&self, stage: Stage) {
                self.0.stage_changed(stage);
            }
        }

        let mut pipeline = Pipeline::new(Arc::new(toolchain), output_in(dir.path()))
            .with_observer(Box::new(Forward(observer.clone())));
        pipeline.run().await.unwrap();

        let stages = observer
            .stages
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        assert_eq!(
            stages,
            vec![
                Stage::VerifyingPreconditions,
                Stage::DiscoveringDevices,
                Stage::MeasuringDevices,
                Stage::Sorting,
                Stage::Persisting,
                Stage::Done,
            ]
        );
        assert!(pipeline.stage().is_terminal());
    }

    #[tokio::test]
    async fn preflight_failure_aborts_without_touching_artifacts() {
        let dir = tempdir().unwrap();
        let output = output_in(dir.path());
        let toolchain = MockToolchain::new().with_preflight_failure(PreflightError::MissingTool {
            tool: "xcodebuild".into(),
            hint: "Install Xcode".into(),
        });

        let mut pipeline = Pipeline::new(Arc::new(toolchain), output.clone());
        let err = pipeline.run().await.unwrap_err();

        assert!(err.is_preflight());
        assert_eq!(pipeline.stage(), Stage::Aborted);
        assert!(!output.dataset_path.exists());
        assert!(!output.descriptor_path.exists());
    }

    #[tokio::test]
    async fn empty_catalog_aborts() {
        let dir = tempdir().unwrap();
        let mut pipeline = Pipeline::new(Arc::new(MockToolchain::new()), output_in(dir.path()));
        let err = pipeline.run().await.unwrap_err();
        assert!(matches!(err, HarvestError::NoDevices));
        assert_eq!(pipeline.stage(), Stage::Aborted);
    }

    #[test]
    fn atomic_write_replaces_existing_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dataset.json");
        fs::write(&path, "stale").unwrap();

        write_atomic(&path, "fresh").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "fresh\n");
    }

    #[test]
    fn atomic_write_creates_missing_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data/nested/dataset.json");
        write_atomic(&path, "[]").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "[]\n");
    }
}
