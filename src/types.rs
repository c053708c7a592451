//! Core types for the cutout pipeline

use crate::{
    color_profile::ColorProfile,
    config::OutputFormat,
    error::{CutoutError, Result},
};
use image::{DynamicImage, GenericImageView, GrayImage, ImageBuffer, Rgba};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Single-channel alpha matte, co-addressed with its image
///
/// Values are 0 (fully transparent) to 255 (fully opaque). The matte must
/// share dimensions with its companion image at every pipeline boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlphaMatte {
    /// Matte data as grayscale values (0-255), row-major
    pub data: Vec<u8>,

    /// Matte dimensions (width, height)
    pub dimensions: (u32, u32),
}

impl AlphaMatte {
    /// Create a new matte from raw data
    ///
    /// # Errors
    /// `InvalidInput` when the data length does not match the dimensions.
    pub fn new(data: Vec<u8>, dimensions: (u32, u32)) -> Result<Self> {
        let expected = dimensions.0 as usize * dimensions.1 as usize;
        if data.len() != expected {
            return Err(CutoutError::invalid_input(format!(
                "Matte data length {} does not match dimensions {}x{}",
                data.len(),
                dimensions.0,
                dimensions.1
            )));
        }
        Ok(Self { data, dimensions })
    }

    /// Create a fully opaque (or otherwise constant) matte
    #[must_use]
    pub fn constant(value: u8, dimensions: (u32, u32)) -> Self {
        let len = dimensions.0 as usize * dimensions.1 as usize;
        Self {
            data: vec![value; len],
            dimensions,
        }
    }

    /// Create a matte from a grayscale image
    #[must_use]
    pub fn from_image(image: &GrayImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            data: image.as_raw().clone(),
            dimensions: (width, height),
        }
    }

    /// Convert the matte to a grayscale image
    ///
    /// # Errors
    /// `Processing` when the buffer cannot be reassembled (corrupt length).
    pub fn to_image(&self) -> Result<GrayImage> {
        let (width, height) = self.dimensions;
        ImageBuffer::from_raw(width, height, self.data.clone())
            .ok_or_else(|| CutoutError::processing("Failed to create image from matte data"))
    }

    /// Matte width in pixels
    #[must_use]
    pub fn width(&self) -> u32 {
        self.dimensions.0
    }

    /// Matte height in pixels
    #[must_use]
    pub fn height(&self) -> u32 {
        self.dimensions.1
    }

    /// Alpha value at (x, y); `None` outside the matte
    #[must_use]
    pub fn get(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.dimensions.0 || y >= self.dimensions.1 {
            return None;
        }
        self.data
            .get(y as usize * self.dimensions.0 as usize + x as usize)
            .copied()
    }

    /// Write the matte into the alpha channel of a co-sized RGBA image
    ///
    /// # Errors
    /// `InvalidInput` when the dimensions differ.
    pub fn apply_to_image(&self, image: &mut ImageBuffer<Rgba<u8>, Vec<u8>>) -> Result<()> {
        let img_dims = image.dimensions();
        if img_dims != self.dimensions {
            return Err(CutoutError::dimension_mismatch(img_dims, self.dimensions));
        }

        for (pixel, alpha) in image.pixels_mut().zip(self.data.iter()) {
            pixel[3] = *alpha;
        }

        Ok(())
    }

    /// Resize the matte to new dimensions
    ///
    /// # Errors
    /// Propagates buffer reassembly failures.
    pub fn resize(&self, new_width: u32, new_height: u32) -> Result<AlphaMatte> {
        let current = self.to_image()?;
        let resized = image::imageops::resize(
            &current,
            new_width,
            new_height,
            image::imageops::FilterType::Lanczos3,
        );
        Ok(AlphaMatte::from_image(&resized))
    }

    /// Coverage statistics over the matte
    #[must_use]
    pub fn statistics(&self) -> MatteStatistics {
        let total_pixels = self.data.len();
        let opaque_pixels = self.data.iter().filter(|&&v| v > 127).count();
        let transparent_pixels = total_pixels - opaque_pixels;

        MatteStatistics {
            total_pixels,
            opaque_pixels,
            transparent_pixels,
            opaque_ratio: if total_pixels == 0 {
                0.0
            } else {
                opaque_pixels as f32 / total_pixels as f32
            },
        }
    }
}

/// Coverage statistics for an alpha matte
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatteStatistics {
    pub total_pixels: usize,
    pub opaque_pixels: usize,
    pub transparent_pixels: usize,
    pub opaque_ratio: f32,
}

/// Detailed timing breakdown for a single pipeline run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineTimings {
    /// Matting model loading time (first call only)
    pub model_load_ms: u64,

    /// Image loading and decoding from file
    pub image_decode_ms: u64,

    /// Border detection and crop
    pub border_crop_ms: u64,

    /// Matte generation by the matting backend
    pub matting_ms: u64,

    /// Edge refinement stages (or the darken-mode matte preparation)
    pub edge_processing_ms: u64,

    /// Background resolution and compositing (or darkening)
    pub compositing_ms: u64,

    /// Final image encoding (if saving to file)
    pub image_encode_ms: Option<u64>,

    /// Total end-to-end processing time
    pub total_ms: u64,
}

/// Final composited image plus everything needed to encode it
#[derive(Debug, Clone)]
pub struct CompositeResult {
    /// The composited image, ready for encoding
    pub image: DynamicImage,

    /// The refined matte used for compositing
    pub matte: AlphaMatte,

    /// Input image dimensions after border crop
    pub dimensions: (u32, u32),

    /// Color profile blob carried through from the input, unmodified
    pub color_profile: Option<ColorProfile>,

    /// Timing breakdown
    pub timings: PipelineTimings,

    /// Original input path (for logging purposes)
    pub input_path: Option<String>,
}

impl CompositeResult {
    /// Create a new composite result
    #[must_use]
    pub fn new(image: DynamicImage, matte: AlphaMatte, timings: PipelineTimings) -> Self {
        let dimensions = image.dimensions();
        Self {
            image,
            matte,
            dimensions,
            color_profile: None,
            timings,
            input_path: None,
        }
    }

    /// Attach the input's color profile blob
    #[must_use]
    pub fn with_color_profile(mut self, profile: Option<ColorProfile>) -> Self {
        self.color_profile = profile;
        self
    }

    /// Attach the originating input path
    #[must_use]
    pub fn with_input_path(mut self, path: String) -> Self {
        self.input_path = Some(path);
        self
    }

    /// Save in the requested format, embedding the carried color profile
    ///
    /// Encoding time is recorded into `timings.image_encode_ms`.
    ///
    /// # Errors
    /// File creation or encoding failures.
    pub fn save<P: AsRef<Path>>(
        &mut self,
        path: P,
        format: OutputFormat,
        quality: u8,
    ) -> Result<()> {
        let encode_start = instant::Instant::now();
        let profile = self
            .color_profile
            .clone()
            .unwrap_or_else(ColorProfile::none);
        crate::color_profile::ProfileEmbedder::embed_in_output(
            &self.image,
            &profile,
            path,
            format.to_image_format(),
            quality,
        )?;
        self.timings.image_encode_ms = Some(encode_start.elapsed().as_millis() as u64);
        Ok(())
    }

    /// Encode to in-memory bytes in the requested format
    ///
    /// The color profile blob is not embedded on this path; use `save` for
    /// profile-preserving output.
    ///
    /// # Errors
    /// Encoding failures.
    pub fn to_bytes(&self, format: OutputFormat, quality: u8) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buffer);
        match format {
            OutputFormat::Png => {
                self.image.write_to(&mut cursor, image::ImageFormat::Png)?;
            },
            OutputFormat::Jpeg => {
                let rgb_image = self.image.to_rgb8();
                let mut encoder =
                    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, quality);
                encoder.encode_image(&rgb_image)?;
            },
        }
        Ok(buffer)
    }
}

/// One input/output pair in a batch request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItem {
    /// Input image path
    pub input: String,
    /// Output image path
    pub output: String,
}

/// Per-item result record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemOutcome {
    /// Whether the item processed and saved successfully
    pub success: bool,

    /// Input path as given
    pub input: String,

    /// Output path, present on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// Human-readable error message, present on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Machine-readable error kind, present on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,

    /// Wall-clock processing time in seconds, rounded to centiseconds
    pub processing_time_seconds: f64,
}

impl ItemOutcome {
    /// Build a success record
    #[must_use]
    pub fn success(input: String, output: String, elapsed_seconds: f64) -> Self {
        Self {
            success: true,
            input,
            output: Some(output),
            error: None,
            error_kind: None,
            processing_time_seconds: round_centis(elapsed_seconds),
        }
    }

    /// Build a failure record from a pipeline error
    #[must_use]
    pub fn failure(input: String, error: &CutoutError, elapsed_seconds: f64) -> Self {
        Self {
            success: false,
            input,
            output: None,
            error: Some(error.to_string()),
            error_kind: Some(error.kind().to_string()),
            processing_time_seconds: round_centis(elapsed_seconds),
        }
    }
}

/// Summary record for a completed batch
///
/// Batch-level success means "all items attempted"; individual outcomes are
/// in `results`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub success: bool,
    pub results: Vec<ItemOutcome>,
    pub total: usize,
    pub successful: usize,
}

fn round_centis(seconds: f64) -> f64 {
    (seconds * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matte_creation() {
        let matte = AlphaMatte::new(vec![255, 128, 0, 255], (2, 2)).unwrap();
        assert_eq!(matte.dimensions, (2, 2));
        assert_eq!(matte.get(1, 0), Some(128));
        assert_eq!(matte.get(2, 0), None);
    }

    #[test]
    fn test_matte_rejects_bad_length() {
        let result = AlphaMatte::new(vec![255, 0, 0], (2, 2));
        assert!(matches!(result, Err(CutoutError::InvalidInput(_))));
    }

    #[test]
    fn test_matte_statistics() {
        let matte = AlphaMatte::new(vec![255, 255, 0, 0], (2, 2)).unwrap();
        let stats = matte.statistics();
        assert_eq!(stats.total_pixels, 4);
        assert_eq!(stats.opaque_pixels, 2);
        assert_eq!(stats.transparent_pixels, 2);
        assert!((stats.opaque_ratio - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_matte_image_roundtrip() {
        let matte = AlphaMatte::new(vec![0, 64, 128, 255], (2, 2)).unwrap();
        let image = matte.to_image().unwrap();
        assert_eq!(AlphaMatte::from_image(&image), matte);
    }

    #[test]
    fn test_apply_to_image_sets_alpha() {
        let matte = AlphaMatte::new(vec![10, 20, 30, 40], (2, 2)).unwrap();
        let mut rgba: ImageBuffer<Rgba<u8>, Vec<u8>> =
            ImageBuffer::from_pixel(2, 2, Rgba([1, 2, 3, 255]));
        matte.apply_to_image(&mut rgba).unwrap();
        assert_eq!(rgba.get_pixel(0, 0)[3], 10);
        assert_eq!(rgba.get_pixel(1, 1)[3], 40);
    }

    #[test]
    fn test_apply_to_image_dimension_mismatch() {
        let matte = AlphaMatte::constant(255, (2, 2));
        let mut rgba: ImageBuffer<Rgba<u8>, Vec<u8>> =
            ImageBuffer::from_pixel(3, 2, Rgba([0, 0, 0, 0]));
        let result = matte.apply_to_image(&mut rgba);
        assert!(matches!(result, Err(CutoutError::InvalidInput(_))));
    }

    #[test]
    fn test_outcome_records() {
        let ok = ItemOutcome::success("in.jpg".into(), "out.jpg".into(), 1.23456);
        assert!(ok.success);
        assert!((ok.processing_time_seconds - 1.23).abs() < 1e-9);

        let err = CutoutError::path_not_allowed("/etc/shadow");
        let bad = ItemOutcome::failure("in.jpg".into(), &err, 0.0);
        assert!(!bad.success);
        assert_eq!(bad.error_kind.as_deref(), Some("path_not_allowed"));
        assert!(bad.output.is_none());
    }

    #[test]
    fn test_outcome_serialization_skips_empty_fields() {
        let ok = ItemOutcome::success("a".into(), "b".into(), 0.5);
        let json = serde_json::to_string(&ok).unwrap();
        assert!(!json.contains("error"));
        assert!(json.contains("\"output\":\"b\""));
    }
}
