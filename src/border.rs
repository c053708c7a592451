//! Uniform light-border detection and cropping
//!
//! Scanned or re-photographed portraits often carry a bright paper border
//! that confuses the matting model. The detector measures a border run on
//! each side independently, unifies the four runs into one symmetric crop,
//! and refuses to crop when the result would remove too much of the image.

use crate::error::Result;
use image::{DynamicImage, GenericImageView, RgbImage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Top,
    Bottom,
    Left,
    Right,
}

/// Detector for near-uniform light borders
///
/// All thresholds are tunable; the defaults match the studio scanning setup
/// this pipeline was built for.
#[derive(Debug, Clone)]
pub struct BorderCropDetector {
    /// Per-channel minimum for a pixel to count as "light"
    pub light_threshold: u8,
    /// Fraction of strip pixels that must be light for a border line
    pub coverage: f32,
    /// Fraction trimmed from both ends of each scanned line
    pub strip_margin: f32,
    /// Minimum primary run for a side to count at all
    pub min_border: u32,
    /// Maximum extra lines the inner-border extension may add
    pub inner_extension_max: u32,
    /// Pixels kept back from the unified border width
    pub safety_margin: u32,
    /// Minimum surviving fraction of each dimension after the crop
    pub content_floor: f32,
}

impl Default for BorderCropDetector {
    fn default() -> Self {
        Self {
            light_threshold: 240,
            coverage: 0.92,
            strip_margin: 0.20,
            min_border: 8,
            inner_extension_max: 15,
            safety_margin: 2,
            content_floor: 0.5,
        }
    }
}

impl BorderCropDetector {
    /// Create a detector with default thresholds
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Detect a light border and crop it away
    ///
    /// Returns the input unchanged when no side reaches the minimum border
    /// width, or when the unified crop would leave less than the content
    /// floor of either dimension. "No border found" is a normal zero-size
    /// crop, never an error. Idempotent on its own output.
    ///
    /// # Errors
    /// None in practice; the `Result` mirrors the other pipeline stages.
    pub fn detect_and_crop(&self, image: &DynamicImage) -> Result<DynamicImage> {
        let rgb = image.to_rgb8();
        let crop = self.detect_border(&rgb);
        if crop == 0 {
            return Ok(image.clone());
        }

        let (width, height) = image.dimensions();
        let new_width = width - 2 * crop;
        let new_height = height - 2 * crop;
        log::info!(
            "Border crop: trimming {crop}px per side, {width}x{height} -> {new_width}x{new_height}"
        );
        Ok(image.crop_imm(crop, crop, new_width, new_height))
    }

    /// Measure the symmetric per-side crop that `detect_and_crop` would apply
    ///
    /// Zero means no crop: either no side met the minimum border width or
    /// the crop was rejected by the content floor.
    #[must_use]
    pub fn detect_border(&self, rgb: &RgbImage) -> u32 {
        let (width, height) = rgb.dimensions();
        if width < 4 || height < 4 {
            return 0;
        }

        let sides = [Side::Top, Side::Bottom, Side::Left, Side::Right];
        let unified = sides
            .iter()
            .map(|&side| self.side_run(rgb, side))
            .max()
            .unwrap_or(0);

        let crop = unified.saturating_sub(self.safety_margin);
        if crop == 0 {
            return 0;
        }

        let remaining_w = width.saturating_sub(2 * crop) as f32;
        let remaining_h = height.saturating_sub(2 * crop) as f32;
        if remaining_w < width as f32 * self.content_floor
            || remaining_h < height as f32 * self.content_floor
        {
            log::debug!(
                "Border crop rejected: {crop}px per side would leave under {:.0}% of the image",
                self.content_floor * 100.0
            );
            return 0;
        }

        crop
    }

    /// Border run on one side: consecutive light lines, extended by faint
    /// low-variance lines when the primary run met the minimum.
    fn side_run(&self, rgb: &RgbImage, side: Side) -> u32 {
        let (width, height) = rgb.dimensions();
        let span = match side {
            Side::Top | Side::Bottom => height,
            Side::Left | Side::Right => width,
        };
        let max_depth = (span / 2).saturating_sub(1);

        let mut primary = 0;
        while primary < max_depth {
            let stats = self.line_stats(rgb, side, primary);
            if stats.light_ratio < self.coverage {
                break;
            }
            primary += 1;
        }

        if primary < self.min_border {
            return 0;
        }

        let mut extension = 0;
        while extension < self.inner_extension_max && primary + extension < max_depth {
            let stats = self.line_stats(rgb, side, primary + extension);
            if !self.is_faint_border_line(&stats) {
                break;
            }
            extension += 1;
        }

        primary + extension
    }

    fn is_faint_border_line(&self, stats: &LineStats) -> bool {
        (stats.variance < 200.0 && (stats.mean > 200.0 || stats.mean < 80.0))
            || stats.variance < 40.0
    }

    /// Statistics over the margin-trimmed central strip of one scan line
    fn line_stats(&self, rgb: &RgbImage, side: Side, depth: u32) -> LineStats {
        let (width, height) = rgb.dimensions();
        let span = match side {
            Side::Top | Side::Bottom => width,
            Side::Left | Side::Right => height,
        };
        let margin = (span as f32 * self.strip_margin) as u32;
        let start = margin;
        let end = span.saturating_sub(margin).max(start + 1);

        let mut light = 0usize;
        let mut count = 0usize;
        let mut sum = 0.0f64;
        let mut sum_sq = 0.0f64;

        for i in start..end {
            let (x, y) = match side {
                Side::Top => (i, depth),
                Side::Bottom => (i, height - 1 - depth),
                Side::Left => (depth, i),
                Side::Right => (width - 1 - depth, i),
            };
            let pixel = rgb.get_pixel(x, y);
            if pixel[0] >= self.light_threshold
                && pixel[1] >= self.light_threshold
                && pixel[2] >= self.light_threshold
            {
                light += 1;
            }
            let gray =
                (f64::from(pixel[0]) + f64::from(pixel[1]) + f64::from(pixel[2])) / 3.0;
            sum += gray;
            sum_sq += gray * gray;
            count += 1;
        }

        let n = count.max(1) as f64;
        let mean = sum / n;
        let variance = (sum_sq / n - mean * mean).max(0.0);
        LineStats {
            light_ratio: light as f32 / n as f32,
            mean,
            variance,
        }
    }
}

struct LineStats {
    light_ratio: f32,
    mean: f64,
    variance: f64,
}
