//! Progress reporting service
//!
//! Separates progress reporting from pipeline logic so different frontends
//! can implement their own handling: silent library use, logged CLI use, or
//! the JSON-lines records a host application consumes during a batch.

use crate::types::ItemOutcome;
use serde::Serialize;

/// Stages of a single pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Initializing the matting backend (one-time model load)
    Initialization,
    /// Loading and decoding the input image
    ImageLoading,
    /// Detecting and cropping a light border
    BorderDetection,
    /// Generating the raw matte
    MatteGeneration,
    /// Refining the matte edges
    EdgeRefinement,
    /// Darkening the original background (darken mode)
    BackgroundDarkening,
    /// Resolving the background and compositing
    Compositing,
    /// Encoding the output image
    Encoding,
    /// Processing completed
    Completed,
}

impl ProcessingStage {
    /// Human-readable description of the stage
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Initialization => "Initializing matting backend",
            Self::ImageLoading => "Loading input image",
            Self::BorderDetection => "Detecting border",
            Self::MatteGeneration => "Generating alpha matte",
            Self::EdgeRefinement => "Refining matte edges",
            Self::BackgroundDarkening => "Darkening background",
            Self::Compositing => "Compositing onto background",
            Self::Encoding => "Encoding output",
            Self::Completed => "Processing completed",
        }
    }
}

/// Sink for pipeline and batch progress
pub trait ProgressReporter {
    /// A single-run stage started
    fn report_stage(&self, stage: ProcessingStage, detail: &str);

    /// A batch item finished (successfully or not)
    fn report_batch_progress(&self, completed: usize, total: usize, current: &ItemOutcome);
}

/// Reporter that logs stages at info level
pub struct ConsoleProgressReporter;

impl ProgressReporter for ConsoleProgressReporter {
    fn report_stage(&self, stage: ProcessingStage, detail: &str) {
        if detail.is_empty() {
            log::info!("{}", stage.description());
        } else {
            log::info!("{}: {}", stage.description(), detail);
        }
    }

    fn report_batch_progress(&self, completed: usize, total: usize, current: &ItemOutcome) {
        log::info!(
            "Batch progress {}/{}: {} ({})",
            completed,
            total,
            current.input,
            if current.success { "ok" } else { "failed" }
        );
    }
}

/// Reporter that discards everything
pub struct NoOpProgressReporter;

impl ProgressReporter for NoOpProgressReporter {
    fn report_stage(&self, _stage: ProcessingStage, _detail: &str) {}

    fn report_batch_progress(&self, _completed: usize, _total: usize, _current: &ItemOutcome) {}
}

/// Batch progress record in the sidecar protocol shape
#[derive(Debug, Clone, Serialize)]
pub struct BatchProgressRecord<'a> {
    pub progress: usize,
    pub total: usize,
    pub current: &'a ItemOutcome,
}

/// Reporter that prints one JSON record per completed batch item to stdout
///
/// Host applications watching a long batch parse these lines incrementally.
/// Single-run stages are logged, not printed, to keep stdout pure JSON.
pub struct JsonLinesReporter;

impl ProgressReporter for JsonLinesReporter {
    fn report_stage(&self, stage: ProcessingStage, detail: &str) {
        ConsoleProgressReporter.report_stage(stage, detail);
    }

    fn report_batch_progress(&self, completed: usize, total: usize, current: &ItemOutcome) {
        let record = BatchProgressRecord {
            progress: completed,
            total,
            current,
        };
        match serde_json::to_string(&record) {
            Ok(line) => println!("{line}"),
            Err(e) => log::warn!("Failed to serialize progress record: {e}"),
        }
    }
}
