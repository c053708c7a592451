//! Portrait cutout pipeline driver
//!
//! `PortraitProcessor` wires the stages together: border crop, matte
//! generation, edge refinement, and compositing (or background darkening).
//! It owns the matting backend handle, the compositor with its background
//! cache, the path allow-list, and the progress reporter.

use crate::{
    border::BorderCropDetector,
    compositor::{darken_background, Compositor},
    config::{OutputMode, PipelineConfig},
    edge::{feather_matte, shrink_matte, smooth_matte, EdgeProcessor},
    error::{CutoutError, Result},
    matting::MatteSource,
    services::{ImageIOService, NoOpProgressReporter, ProcessingStage, ProgressReporter},
    types::{AlphaMatte, BatchItem, BatchSummary, CompositeResult, ItemOutcome, PipelineTimings},
    utils::PathGuard,
};
use image::{DynamicImage, GenericImageView};
use instant::Instant;

/// Hard cap on input size, rejecting pathological images early
pub const MAX_IMAGE_PIXELS: u64 = 50_000_000;

/// Hard cap on batch length; larger batches are rejected, not truncated
pub const MAX_BATCH_SIZE: usize = 500;

/// The full portrait cutout pipeline
///
/// Single-threaded and synchronous; one processor handles one image at a
/// time. The matting backend loads lazily on the first image and is reused
/// for the processor's lifetime. Background resolution is cached per output
/// size for the same lifetime.
pub struct PortraitProcessor {
    config: PipelineConfig,
    matte_source: Box<dyn MatteSource>,
    compositor: Compositor,
    border_detector: BorderCropDetector,
    guard: PathGuard,
    reporter: Box<dyn ProgressReporter>,
}

impl PortraitProcessor {
    /// Create a processor with the default path guard and a silent reporter
    #[must_use]
    pub fn new(config: PipelineConfig, matte_source: Box<dyn MatteSource>) -> Self {
        let guard = PathGuard::with_default_roots();
        let compositor = Compositor::new(config.background.clone(), guard.clone());
        Self {
            config,
            matte_source,
            compositor,
            border_detector: BorderCropDetector::new(),
            guard,
            reporter: Box::new(NoOpProgressReporter),
        }
    }

    /// Replace the path allow-list
    #[must_use]
    pub fn with_path_guard(mut self, guard: PathGuard) -> Self {
        self.compositor = Compositor::new(self.config.background.clone(), guard.clone());
        self.guard = guard;
        self
    }

    /// Replace the progress reporter
    #[must_use]
    pub fn with_reporter(mut self, reporter: Box<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// The configuration in effect
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Path allow-list in effect
    #[must_use]
    pub fn path_guard(&self) -> &PathGuard {
        &self.guard
    }

    /// Run the pipeline over an in-memory image
    ///
    /// # Errors
    /// - `InvalidInput` for zero-sized images
    /// - `ResourceLimit` for images above [`MAX_IMAGE_PIXELS`]
    /// - `ModelUnavailable` when the matting backend cannot load
    /// - `Processing` for stage failures
    pub fn process_image(&mut self, image: &DynamicImage) -> Result<CompositeResult> {
        let total_start = Instant::now();
        let mut timings = PipelineTimings::default();

        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(CutoutError::invalid_input("Image has zero dimensions"));
        }
        ensure_within_pixel_cap((width, height))?;

        self.reporter
            .report_stage(ProcessingStage::BorderDetection, "");
        let border_start = Instant::now();
        let cropped = self.border_detector.detect_and_crop(image)?;
        timings.border_crop_ms = border_start.elapsed().as_millis() as u64;

        if !self.matte_source.is_initialized() {
            self.reporter.report_stage(
                ProcessingStage::Initialization,
                self.matte_source.model_name(),
            );
            if let Some(load_time) = self.matte_source.initialize()? {
                timings.model_load_ms = load_time.as_millis() as u64;
            }
        }

        self.reporter.report_stage(
            ProcessingStage::MatteGeneration,
            self.matte_source.model_name(),
        );
        let matting_start = Instant::now();
        let (foreground, matte) = self.matte_source.remove_background(&cropped)?;
        timings.matting_ms = matting_start.elapsed().as_millis() as u64;

        let (output, final_matte) = match self.config.mode {
            OutputMode::Replace => self.run_replace(&cropped, &foreground, &matte, &mut timings)?,
            OutputMode::Darken => self.run_darken(&cropped, &matte, &mut timings)?,
        };

        timings.total_ms = total_start.elapsed().as_millis() as u64;
        self.reporter.report_stage(ProcessingStage::Completed, "");
        Ok(CompositeResult::new(
            DynamicImage::ImageRgb8(output),
            final_matte,
            timings,
        ))
    }

    fn run_replace(
        &mut self,
        original: &DynamicImage,
        foreground: &image::RgbaImage,
        matte: &AlphaMatte,
        timings: &mut PipelineTimings,
    ) -> Result<(image::RgbImage, AlphaMatte)> {
        self.reporter
            .report_stage(ProcessingStage::EdgeRefinement, "");
        let edge_start = Instant::now();
        let edge_processor = EdgeProcessor::new(&self.config.edge);
        let original_rgb = original.to_rgb8();
        let (refined_fg, refined_matte) =
            edge_processor.process(foreground, matte, Some(&original_rgb))?;
        timings.edge_processing_ms = edge_start.elapsed().as_millis() as u64;

        self.reporter.report_stage(ProcessingStage::Compositing, "");
        let composite_start = Instant::now();
        let output = match &self.config.shadow {
            Some(shadow) => {
                self.compositor
                    .composite_with_shadow(&refined_fg, &refined_matte, shadow)?
            },
            None => self.compositor.composite(&refined_fg, &refined_matte)?,
        };
        timings.compositing_ms = composite_start.elapsed().as_millis() as u64;

        Ok((output, refined_matte))
    }

    fn run_darken(
        &mut self,
        original: &DynamicImage,
        matte: &AlphaMatte,
        timings: &mut PipelineTimings,
    ) -> Result<(image::RgbImage, AlphaMatte)> {
        // Darken mode applies only the light matte preparation: shrink,
        // smooth, feather. Decontamination and hair refinement are
        // replace-mode concerns.
        self.reporter
            .report_stage(ProcessingStage::EdgeRefinement, "");
        let edge_start = Instant::now();
        let settings = self.config.edge.clamped();
        let mut mask = matte.to_image()?;
        if settings.edge_inset > 0 {
            mask = shrink_matte(&mask, settings.edge_inset);
        }
        if settings.edge_smoothing > 0 {
            mask = smooth_matte(&mask, settings.edge_smoothing);
        }
        if settings.feather_radius > 0 {
            mask = feather_matte(&mask, settings.feather_radius);
        }
        let prepared = AlphaMatte::from_image(&mask);
        timings.edge_processing_ms = edge_start.elapsed().as_millis() as u64;

        self.reporter
            .report_stage(ProcessingStage::BackgroundDarkening, "");
        let darken_start = Instant::now();
        let output = darken_background(&original.to_rgb8(), &prepared, &self.config.darken)?;
        timings.compositing_ms = darken_start.elapsed().as_millis() as u64;

        Ok((output, prepared))
    }

    /// Process one file into another, capturing any failure in the outcome
    ///
    /// Never panics and never returns `Err`; all failures land in the
    /// returned record so batch processing can continue.
    pub fn process_file(&mut self, input: &str, output: &str) -> ItemOutcome {
        let start = Instant::now();
        match self.process_file_inner(input, output) {
            Ok(()) => {
                let elapsed = start.elapsed().as_secs_f64();
                log::info!("Processed: {input} -> {output} in {elapsed:.2}s");
                ItemOutcome::success(input.to_string(), output.to_string(), elapsed)
            },
            Err(e) => {
                log::warn!("Failed to process {input}: {e}");
                ItemOutcome::failure(input.to_string(), &e, start.elapsed().as_secs_f64())
            },
        }
    }

    fn process_file_inner(&mut self, input: &str, output: &str) -> Result<()> {
        let checked_input = self.guard.check(input)?;
        let checked_output = self.guard.check(output)?;

        self.reporter.report_stage(ProcessingStage::ImageLoading, input);
        let decode_start = Instant::now();
        let loaded = if self.config.preserve_color_profiles {
            ImageIOService::load_with_profile(&checked_input)?
        } else {
            crate::services::LoadedImage {
                image: ImageIOService::load_image(&checked_input)?,
                color_profile: None,
            }
        };
        let decode_ms = decode_start.elapsed().as_millis() as u64;

        let mut result = self.process_image(&loaded.image)?;
        result.timings.image_decode_ms = decode_ms;
        result = result
            .with_color_profile(loaded.color_profile)
            .with_input_path(input.to_string());

        self.reporter.report_stage(ProcessingStage::Encoding, output);
        ImageIOService::save_composite(
            &mut result,
            &checked_output,
            self.config.output_format,
            self.config.output_quality,
        )
    }

    /// Process an ordered batch of input/output pairs sequentially
    ///
    /// Items are independent: a failed item is recorded and the batch
    /// continues. A progress record is reported after every item.
    ///
    /// # Errors
    /// `ResourceLimit` when the batch exceeds [`MAX_BATCH_SIZE`]; the batch
    /// is rejected outright rather than truncated.
    pub fn process_batch(&mut self, items: &[BatchItem]) -> Result<BatchSummary> {
        if items.len() > MAX_BATCH_SIZE {
            return Err(CutoutError::resource_limit(format!(
                "Batch of {} items exceeds the maximum of {MAX_BATCH_SIZE}",
                items.len()
            )));
        }

        let total = items.len();
        let mut results = Vec::with_capacity(total);
        for item in items {
            let outcome = self.process_file(&item.input, &item.output);
            results.push(outcome);
            let completed = results.len();
            self.reporter.report_batch_progress(
                completed,
                total,
                results.last().expect("just pushed"),
            );
        }

        let successful = results.iter().filter(|r| r.success).count();
        Ok(BatchSummary {
            success: true,
            results,
            total,
            successful,
        })
    }
}

/// Reject images above the pixel cap before any allocation-heavy work
fn ensure_within_pixel_cap(dimensions: (u32, u32)) -> Result<()> {
    let pixels = u64::from(dimensions.0) * u64::from(dimensions.1);
    if pixels > MAX_IMAGE_PIXELS {
        return Err(CutoutError::resource_limit(format!(
            "Image of {}x{} ({pixels} pixels) exceeds the maximum of {MAX_IMAGE_PIXELS}",
            dimensions.0, dimensions.1
        )));
    }
    Ok(())
}
