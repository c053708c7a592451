#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # Portrait Cutout Library
//!
//! Post-processing for AI-generated portrait mattes: border-crop detection,
//! matte edge refinement (shrink, smooth, decontaminate, feather, hair
//! refinement), and alpha-blended compositing onto solid, gradient, or image
//! backgrounds, producing a studio-style cutout.
//!
//! The neural matting model itself is an external collaborator behind the
//! [`MatteSource`] trait: any backend that turns an image into a foreground
//! RGBA cutout plus an alpha matte can drive the pipeline. The refinement
//! and compositing stages are deterministic, synchronous, and fully covered
//! by the non-increasing-opacity invariant.
//!
//! ## Features
//!
//! - **Border crop**: detects and trims the uniform light border of scanned
//!   portraits before matting
//! - **Edge refinement**: five independently toggleable stages with a fixed
//!   order and per-stage erosion guarantees
//! - **Backgrounds**: studio presets, explicit colors, cover-resized images,
//!   and synthesized gradients, cached per output size
//! - **Shadow and darken modes**: drop-shadow compositing and an in-place
//!   background darkening alternative
//! - **Color profiles**: embedded ICC blobs pass through to the output
//!   unmodified
//! - **Batch processing**: sequential, capacity-capped, per-item outcome
//!   records with incremental progress reporting
//! - **CLI integration**: optional command-line interface (enable with the
//!   `cli` feature) speaking the sidecar JSON protocol
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use portrait_cutout::{
//!     BackgroundSpec, MatteSource, MockMatteSource, PipelineConfig, PortraitProcessor,
//! };
//!
//! # fn example() -> portrait_cutout::Result<()> {
//! let config = PipelineConfig::builder()
//!     .background(BackgroundSpec::Preset("charcoal".to_string()))
//!     .output_quality(95)
//!     .build()?;
//!
//! // Swap in a real neural matting backend here.
//! let source: Box<dyn MatteSource> = Box::new(MockMatteSource::new());
//!
//! let mut processor = PortraitProcessor::new(config, source);
//! let outcome = processor.process_file("portrait.jpg", "cutout.jpg");
//! assert!(outcome.success);
//! # Ok(())
//! # }
//! ```

pub mod background;
pub mod border;
pub mod color_profile;
pub mod compositor;
pub mod config;
pub mod edge;
pub mod error;
pub mod matting;
pub mod processor;
pub mod services;
pub mod types;
pub mod utils;

#[cfg(feature = "cli")]
pub mod cli;

// Public API exports
pub use background::{preset_color, BackgroundResolver, DEFAULT_PRESET, PRESET_BACKGROUNDS};
pub use border::BorderCropDetector;
pub use color_profile::{ColorProfile, ProfileEmbedder, ProfileExtractor};
pub use compositor::{darken_background, Compositor};
pub use config::{
    BackgroundSpec, DarkenSettings, EdgeSettings, GradientDirection, OutputFormat, OutputMode,
    PipelineConfig, PipelineConfigBuilder, PortraitSettings, ShadowSettings,
};
pub use edge::EdgeProcessor;
pub use error::{CutoutError, Result};
pub use matting::{
    DefaultMatteFactory, MatteSource, MatteSourceFactory, MockMatteSource, UnavailableMatteSource,
};
pub use processor::{PortraitProcessor, MAX_BATCH_SIZE, MAX_IMAGE_PIXELS};
pub use services::{
    ConsoleProgressReporter, ImageIOService, JsonLinesReporter, NoOpProgressReporter,
    ProcessingStage, ProgressReporter,
};
pub use types::{
    AlphaMatte, BatchItem, BatchSummary, CompositeResult, ItemOutcome, PipelineTimings,
};
pub use utils::PathGuard;

/// Process an in-memory image through the full cutout pipeline
///
/// Convenience wrapper constructing a one-shot [`PortraitProcessor`]. For
/// repeated use (warm model, cached backgrounds), build a processor once and
/// call [`PortraitProcessor::process_image`] directly.
///
/// # Errors
/// See [`PortraitProcessor::process_image`].
pub fn process_portrait_image(
    image: &image::DynamicImage,
    config: &PipelineConfig,
    matte_source: Box<dyn MatteSource>,
) -> Result<CompositeResult> {
    let mut processor = PortraitProcessor::new(config.clone(), matte_source);
    processor.process_image(image)
}

/// Process an image provided as encoded bytes
///
/// Decodes with format auto-detection, then runs the pipeline.
///
/// # Errors
/// Decoding failures in addition to pipeline errors.
pub fn process_portrait_bytes(
    image_bytes: &[u8],
    config: &PipelineConfig,
    matte_source: Box<dyn MatteSource>,
) -> Result<CompositeResult> {
    let image = image::load_from_memory(image_bytes)
        .map_err(|e| CutoutError::processing(format!("Failed to decode image from bytes: {}", e)))?;
    process_portrait_image(&image, config, matte_source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_portrait_bytes_roundtrip() {
        let image = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            16,
            16,
            image::Rgb([120, 110, 100]),
        ));
        let mut bytes = Vec::new();
        image
            .write_to(
                &mut std::io::Cursor::new(&mut bytes),
                image::ImageFormat::Png,
            )
            .unwrap();

        let config = PipelineConfig::builder()
            .edge_settings(EdgeSettings::disabled())
            .build()
            .unwrap();
        let result =
            process_portrait_bytes(&bytes, &config, Box::new(MockMatteSource::constant(255)))
                .unwrap();
        assert_eq!(result.image.to_rgb8().get_pixel(8, 8).0, [120, 110, 100]);
    }

    #[test]
    fn test_process_portrait_bytes_rejects_garbage() {
        let config = PipelineConfig::default();
        let result =
            process_portrait_bytes(b"not an image", &config, Box::new(MockMatteSource::new()));
        assert!(result.is_err());
    }
}
