//! Matte edge refinement
//!
//! A fixed pipeline of refinement stages over a (foreground, matte) pair:
//! shrink, smooth, decontaminate, feather, hair refinement. Each stage is a
//! standalone pure function so the non-increasing-opacity invariant can be
//! checked per stage; [`EdgeProcessor`] applies them in the fixed order
//! according to [`EdgeSettings`].
//!
//! Stages documented as erosive never increase opacity at any pixel: each
//! one ends with an explicit pixelwise min against its input mask.

use crate::{
    config::EdgeSettings,
    error::{CutoutError, Result},
    types::AlphaMatte,
};
use image::{GrayImage, ImageBuffer, Luma, RgbImage, RgbaImage};
use imageproc::filter::{bilateral_filter, gaussian_blur_f32, separable_filter};
use imageproc::morphology::{grayscale_erode, Mask};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Alpha threshold (0-255) under which a pixel counts as background when
/// estimating the contaminating background color.
const BACKGROUND_ALPHA_MAX: u8 = 30;

/// Cap on sampled background pixels for the color estimate.
const BACKGROUND_SAMPLE_CAP: usize = 1000;

/// Vertical 5-tap kernel giving the hair noise a directional streak.
const HAIR_NOISE_KERNEL: [f32; 5] = [0.1, 0.2, 0.4, 0.2, 0.1];

/// Morphologically erode the matte with a disk kernel of radius `inset`
///
/// Removes halo/fringe pixels at the matte boundary. No-op when `inset` is 0.
#[must_use]
pub fn shrink_matte(mask: &GrayImage, inset: u32) -> GrayImage {
    if inset == 0 {
        return mask.clone();
    }
    grayscale_erode(mask, &Mask::disk(inset.min(127) as u8))
}

/// Edge-preserving smoothing of the matte, `iterations` bilateral passes
///
/// The result is clamped to never exceed the input at any pixel, so
/// smoothing cannot grow opacity.
#[must_use]
pub fn smooth_matte(mask: &GrayImage, iterations: u32) -> GrayImage {
    if iterations == 0 {
        return mask.clone();
    }
    let mut smoothed = mask.clone();
    for _ in 0..iterations {
        smoothed = bilateral_filter(&smoothed, 5, 50.0, 50.0);
    }
    pixelwise_min(&smoothed, mask)
}

/// Gaussian-feather the matte with kernel size `2 * radius + 1`
///
/// The result is the pixelwise minimum of the blurred and input masks:
/// feathering may only soften or shrink the matte, never re-add opacity.
#[must_use]
pub fn feather_matte(mask: &GrayImage, radius: u32) -> GrayImage {
    if radius == 0 {
        return mask.clone();
    }
    let blurred = gaussian_blur_f32(mask, sigma_for_radius(radius));
    pixelwise_min(&blurred, mask)
}

/// Estimate the contaminating background color
///
/// Per-channel median of `image` pixels whose matte value is below the
/// background threshold, deterministically subsampled to at most 1000
/// pixels. Falls back to mid-gray when no background pixel exists.
#[must_use]
pub fn estimate_background_color(image: &RgbImage, mask: &GrayImage) -> (u8, u8, u8) {
    debug_assert_eq!(image.dimensions(), mask.dimensions());

    let mut samples: Vec<[u8; 3]> = Vec::new();
    for (pixel, mask_pixel) in image.pixels().zip(mask.pixels()) {
        if mask_pixel[0] < BACKGROUND_ALPHA_MAX {
            samples.push([pixel[0], pixel[1], pixel[2]]);
        }
    }

    if samples.is_empty() {
        return (128, 128, 128);
    }

    let stride = (samples.len() + BACKGROUND_SAMPLE_CAP - 1) / BACKGROUND_SAMPLE_CAP;
    let sampled: Vec<[u8; 3]> = samples.into_iter().step_by(stride.max(1)).collect();

    (
        channel_median(&sampled, 0),
        channel_median(&sampled, 1),
        channel_median(&sampled, 2),
    )
}

/// Remove background-color bleed from semi-transparent edge pixels
///
/// Only pixels with normalized alpha strictly inside (0.05, 0.95) are
/// touched; fully transparent and fully opaque regions pass through
/// unchanged. Per channel:
/// `corrected = (observed - (1 - a) * bg * strength) / max(a, 0.01)`,
/// clamped to [0, 255]. The alpha channel is left alone.
#[must_use]
pub fn decontaminate_foreground(
    foreground: &RgbaImage,
    mask: &GrayImage,
    background_color: (u8, u8, u8),
    strength: f32,
) -> RgbaImage {
    let strength = strength.clamp(0.0, 1.0);
    let bg = [
        f32::from(background_color.0),
        f32::from(background_color.1),
        f32::from(background_color.2),
    ];

    let mut result = foreground.clone();
    for (pixel, mask_pixel) in result.pixels_mut().zip(mask.pixels()) {
        let alpha = f32::from(mask_pixel[0]) / 255.0;
        if alpha <= 0.05 || alpha >= 0.95 {
            continue;
        }
        let safe_alpha = alpha.max(0.01);
        for channel in 0..3 {
            let observed = f32::from(pixel[channel]);
            let corrected = (observed - (1.0 - alpha) * bg[channel] * strength) / safe_alpha;
            pixel[channel] = corrected.clamp(0.0, 255.0) as u8;
        }
    }
    result
}

/// Synthesize fine-hair translucency at the matte boundary
///
/// Combines a bilateral-smoothed matte, a disk-eroded reference, and a
/// directionally streaked seeded noise field restricted to the transition
/// band and weighted by proximity to 50% opacity. Noise may only reduce
/// opacity, and the refined matte is clamped to the input matte, so the
/// stage is erosive like the others. Counteracts the "hard helmet" artifact
/// of single-pass neural mattes.
#[must_use]
pub fn refine_hair(
    foreground: &RgbaImage,
    mask: &GrayImage,
    strength: f32,
    seed: u64,
) -> (RgbaImage, GrayImage) {
    let (width, height) = mask.dimensions();
    if width == 0 || height == 0 {
        return (foreground.clone(), mask.clone());
    }

    let smoothed = bilateral_filter(mask, 7, 50.0, 50.0);
    let eroded = grayscale_erode(&smoothed, &Mask::disk(2));

    let mut rng = StdRng::seed_from_u64(seed);
    let noise: ImageBuffer<Luma<f32>, Vec<f32>> =
        ImageBuffer::from_fn(width, height, |_, _| Luma([rng.gen::<f32>()]));
    let streaked = separable_filter(&noise, &[1.0], &HAIR_NOISE_KERNEL);

    let mut refined = GrayImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let original = f32::from(mask.get_pixel(x, y)[0]);
            let smooth = f32::from(smoothed.get_pixel(x, y)[0]);
            let eroded_value = f32::from(eroded.get_pixel(x, y)[0]);

            let in_band = smooth > 10.0 && eroded_value < 245.0;
            let value = if in_band {
                let weight = 1.0 - (smooth / 255.0 - 0.5).abs() * 2.0;
                let noise_effect =
                    ((streaked.get_pixel(x, y)[0] - 0.5) * strength * 15.0).min(0.0);
                (smooth + noise_effect * weight).clamp(0.0, 255.0)
            } else {
                smooth
            };

            refined.put_pixel(x, y, Luma([value.min(original).round() as u8]));
        }
    }

    let mut fg = foreground.clone();
    for (pixel, refined_pixel) in fg.pixels_mut().zip(refined.pixels()) {
        pixel[3] = refined_pixel[0];
    }

    (fg, refined)
}

/// OpenCV's automatic sigma for a Gaussian kernel of size `2 * radius + 1`
pub(crate) fn sigma_for_radius(radius: u32) -> f32 {
    0.3 * (radius as f32 - 1.0) + 0.8
}

fn pixelwise_min(a: &GrayImage, b: &GrayImage) -> GrayImage {
    debug_assert_eq!(a.dimensions(), b.dimensions());
    let mut out = a.clone();
    for (out_pixel, b_pixel) in out.pixels_mut().zip(b.pixels()) {
        out_pixel[0] = out_pixel[0].min(b_pixel[0]);
    }
    out
}

/// The complete edge refinement pipeline
///
/// Stage order is fixed; each stage applies only when its setting enables
/// it. Returns a foreground whose alpha channel equals the final matte.
#[derive(Debug, Clone)]
pub struct EdgeProcessor {
    settings: EdgeSettings,
}

impl EdgeProcessor {
    /// Create a processor; out-of-range settings are clamped up front
    #[must_use]
    pub fn new(settings: &EdgeSettings) -> Self {
        Self {
            settings: settings.clamped(),
        }
    }

    /// Refinement settings in effect
    #[must_use]
    pub fn settings(&self) -> &EdgeSettings {
        &self.settings
    }

    /// Run the refinement stages over a foreground and its matte
    ///
    /// `original` supplies the uncut image for background-color estimation
    /// during decontamination; when absent (or of mismatched size) the
    /// foreground's own RGB data is used instead.
    ///
    /// # Errors
    /// `InvalidInput` when foreground and matte dimensions differ.
    pub fn process(
        &self,
        foreground: &RgbaImage,
        matte: &AlphaMatte,
        original: Option<&RgbImage>,
    ) -> Result<(RgbaImage, AlphaMatte)> {
        if foreground.dimensions() != matte.dimensions {
            return Err(CutoutError::dimension_mismatch(
                foreground.dimensions(),
                matte.dimensions,
            ));
        }

        let mut mask = matte.to_image()?;
        let mut fg = foreground.clone();

        if self.settings.edge_inset > 0 {
            mask = shrink_matte(&mask, self.settings.edge_inset);
        }

        if self.settings.edge_smoothing > 0 {
            mask = smooth_matte(&mask, self.settings.edge_smoothing);
        }

        if self.settings.decontaminate {
            let reference_owned;
            let reference = match original {
                Some(orig) if orig.dimensions() == fg.dimensions() => orig,
                Some(orig) => {
                    log::debug!(
                        "Original image {}x{} does not match foreground, estimating background from foreground",
                        orig.width(),
                        orig.height()
                    );
                    reference_owned = rgb_of(&fg);
                    &reference_owned
                },
                None => {
                    reference_owned = rgb_of(&fg);
                    &reference_owned
                },
            };
            let bg_color = estimate_background_color(reference, &mask);
            log::debug!("Estimated background color: {bg_color:?}");
            fg = decontaminate_foreground(&fg, &mask, bg_color, self.settings.decontaminate_strength);
        }

        if self.settings.feather_radius > 0 {
            mask = feather_matte(&mask, self.settings.feather_radius);
        }

        if self.settings.hair_refinement {
            let (refined_fg, refined_mask) = refine_hair(
                &fg,
                &mask,
                self.settings.hair_refinement_strength,
                self.settings.effective_seed(),
            );
            fg = refined_fg;
            mask = refined_mask;
        }

        let final_matte = AlphaMatte::from_image(&mask);
        final_matte.apply_to_image(&mut fg)?;
        Ok((fg, final_matte))
    }
}

fn rgb_of(image: &RgbaImage) -> RgbImage {
    let mut rgb = RgbImage::new(image.width(), image.height());
    for (out, pixel) in rgb.pixels_mut().zip(image.pixels()) {
        out.0 = [pixel[0], pixel[1], pixel[2]];
    }
    rgb
}

fn channel_median(samples: &[[u8; 3]], channel: usize) -> u8 {
    let mut values: Vec<u8> = samples.iter().map(|s| s[channel]).collect();
    values.sort_unstable();
    values[values.len() / 2]
}
