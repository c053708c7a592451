//! Batch processing behavior: per-item isolation, capacity caps, and path
//! allow-list enforcement.

use image::{DynamicImage, Rgb, RgbImage};
use portrait_cutout::{
    BackgroundSpec, BatchItem, CutoutError, EdgeSettings, ItemOutcome, MockMatteSource, PathGuard,
    PipelineConfig, PortraitProcessor, ProgressReporter, MAX_BATCH_SIZE,
};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

fn portrait(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([120, 110, 100])))
}

fn processor_for(dir: &TempDir) -> PortraitProcessor {
    let config = PipelineConfig::builder()
        .background(BackgroundSpec::Solid { r: 30, g: 30, b: 30 })
        .edge_settings(EdgeSettings::disabled())
        .build()
        .unwrap();
    PortraitProcessor::new(config, Box::new(MockMatteSource::new()))
        .with_path_guard(PathGuard::new([dir.path()]))
}

/// Reporter capturing batch progress records for assertions.
#[derive(Default)]
struct RecordingReporter {
    records: Mutex<Vec<(usize, usize, bool)>>,
}

/// Shared handle so the test can read records after the processor takes
/// ownership of the boxed reporter.
struct SharedReporter(Arc<RecordingReporter>);

impl ProgressReporter for SharedReporter {
    fn report_stage(&self, _stage: portrait_cutout::ProcessingStage, _detail: &str) {}

    fn report_batch_progress(&self, completed: usize, total: usize, current: &ItemOutcome) {
        self.0
            .records
            .lock()
            .unwrap()
            .push((completed, total, current.success));
    }
}

#[test]
fn batch_with_one_bad_item_still_processes_the_rest() {
    let temp_dir = TempDir::new().unwrap();
    let good_input = temp_dir.path().join("good.png");
    portrait(24, 24).save(&good_input).unwrap();

    let mut processor = processor_for(&temp_dir);

    let items = vec![
        BatchItem {
            input: good_input.display().to_string(),
            output: temp_dir.path().join("out1.jpg").display().to_string(),
        },
        BatchItem {
            // Outside the allow-list: rejected with a distinct error kind.
            input: "/etc/not-allowed.png".to_string(),
            output: temp_dir.path().join("out2.jpg").display().to_string(),
        },
        BatchItem {
            input: good_input.display().to_string(),
            output: temp_dir.path().join("out3.jpg").display().to_string(),
        },
    ];

    let summary = processor.process_batch(&items).unwrap();

    assert!(summary.success, "batch success means all items attempted");
    assert_eq!(summary.total, 3);
    assert_eq!(summary.successful, 2);

    let failures: Vec<&ItemOutcome> = summary.results.iter().filter(|r| !r.success).collect();
    assert_eq!(failures.len(), 1);
    let kind = failures[0].error_kind.as_deref().unwrap();
    assert!(
        kind == "path_not_allowed" || kind == "invalid_input",
        "unexpected kind {kind}"
    );

    assert!(summary.results[0].success);
    assert!(summary.results[2].success);
    assert!(temp_dir.path().join("out1.jpg").exists());
    assert!(!temp_dir.path().join("out2.jpg").exists());
    assert!(temp_dir.path().join("out3.jpg").exists());
}

#[test]
fn batch_emits_a_progress_record_per_item() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("in.png");
    portrait(16, 16).save(&input).unwrap();

    let recorder = Arc::new(RecordingReporter::default());
    let mut processor = processor_for(&temp_dir)
        .with_reporter(Box::new(SharedReporter(Arc::clone(&recorder))));

    let items: Vec<BatchItem> = (0..3)
        .map(|i| BatchItem {
            input: input.display().to_string(),
            output: temp_dir
                .path()
                .join(format!("out{i}.jpg"))
                .display()
                .to_string(),
        })
        .collect();
    processor.process_batch(&items).unwrap();

    let records = recorder.records.lock().unwrap().clone();
    assert_eq!(records, vec![(1, 3, true), (2, 3, true), (3, 3, true)]);
}

#[test]
fn batch_over_capacity_is_rejected_not_truncated() {
    let temp_dir = TempDir::new().unwrap();
    let mut processor = processor_for(&temp_dir);

    let items: Vec<BatchItem> = (0..=MAX_BATCH_SIZE)
        .map(|i| BatchItem {
            input: format!("in{i}.png"),
            output: format!("out{i}.jpg"),
        })
        .collect();

    let err = processor.process_batch(&items).unwrap_err();
    assert!(matches!(err, CutoutError::ResourceLimit(_)));
}

#[test]
fn empty_batch_succeeds_with_no_results() {
    let temp_dir = TempDir::new().unwrap();
    let mut processor = processor_for(&temp_dir);

    let summary = processor.process_batch(&[]).unwrap();
    assert!(summary.success);
    assert_eq!(summary.total, 0);
    assert_eq!(summary.successful, 0);
    assert!(summary.results.is_empty());
}

#[test]
fn outcome_records_carry_timing() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("in.png");
    portrait(16, 16).save(&input).unwrap();

    let mut processor = processor_for(&temp_dir);
    let outcome = processor.process_file(
        &input.display().to_string(),
        &temp_dir.path().join("out.jpg").display().to_string(),
    );
    assert!(outcome.success);
    assert!(outcome.processing_time_seconds >= 0.0);
    assert_eq!(outcome.output.as_deref(), Some(&*temp_dir.path().join("out.jpg").display().to_string()));
}
