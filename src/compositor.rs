//! Alpha-blended compositing onto resolved backgrounds
//!
//! The plain composite is `out = fg * a + bg * (1 - a)` per channel with the
//! matte normalized to [0, 1]. The shadow variant renders a blurred, offset
//! black silhouette between background and subject. Darken mode keeps the
//! original background and dims it instead of replacing it.

use crate::{
    background::BackgroundResolver,
    config::{BackgroundSpec, DarkenSettings, ShadowSettings},
    edge::sigma_for_radius,
    error::{CutoutError, Result},
    types::AlphaMatte,
    utils::PathGuard,
};
use image::{GrayImage, Rgb, RgbImage, RgbaImage};
use imageproc::filter::gaussian_blur_f32;

/// Gaussian kernel size used to soften the silhouette in darken mode.
const DARKEN_BLUR_KERNEL: u32 = 21;

/// Composites refined foregrounds over one background spec
///
/// The background is resolved once per distinct output size and cached for
/// the lifetime of the compositor (single run or single batch; never
/// persisted across runs).
pub struct Compositor {
    resolver: BackgroundResolver,
}

impl Compositor {
    /// Compositor for one background spec
    #[must_use]
    pub fn new(spec: BackgroundSpec, guard: PathGuard) -> Self {
        Self {
            resolver: BackgroundResolver::new(spec, guard),
        }
    }

    /// The background spec in use
    #[must_use]
    pub fn background_spec(&self) -> &BackgroundSpec {
        self.resolver.spec()
    }

    /// Alpha-blend the foreground over the resolved background
    ///
    /// # Errors
    /// `InvalidInput` when foreground and matte dimensions differ.
    pub fn composite(&mut self, foreground: &RgbaImage, matte: &AlphaMatte) -> Result<RgbImage> {
        let dimensions = foreground.dimensions();
        if dimensions != matte.dimensions {
            return Err(CutoutError::dimension_mismatch(dimensions, matte.dimensions));
        }

        let background = self.resolver.resolve(dimensions);
        let mut output = RgbImage::new(dimensions.0, dimensions.1);
        for ((out, fg), (bg, alpha)) in output
            .pixels_mut()
            .zip(foreground.pixels())
            .zip(background.pixels().zip(matte.data.iter()))
        {
            let a = f32::from(*alpha) / 255.0;
            for channel in 0..3 {
                let blended =
                    f32::from(fg[channel]) * a + f32::from(bg[channel]) * (1.0 - a);
                out[channel] = blended.round().clamp(0.0, 255.0) as u8;
            }
        }
        Ok(output)
    }

    /// Composite with a drop shadow beneath the subject
    ///
    /// The matte is Gaussian-blurred, scaled by the shadow opacity, and
    /// rendered as an offset black silhouette; layers are composed
    /// background, then shadow, then subject.
    ///
    /// # Errors
    /// `InvalidInput` when foreground and matte dimensions differ.
    pub fn composite_with_shadow(
        &mut self,
        foreground: &RgbaImage,
        matte: &AlphaMatte,
        shadow: &ShadowSettings,
    ) -> Result<RgbImage> {
        let dimensions = foreground.dimensions();
        if dimensions != matte.dimensions {
            return Err(CutoutError::dimension_mismatch(dimensions, matte.dimensions));
        }

        let silhouette = matte.to_image()?;
        let blurred = if shadow.blur_radius > 0 {
            gaussian_blur_f32(&silhouette, sigma_for_radius(shadow.blur_radius))
        } else {
            silhouette
        };
        let opacity = shadow.opacity.clamp(0.0, 1.0);
        let (dx, dy) = shadow.offset;

        let background = self.resolver.resolve(dimensions);
        let mut output = RgbImage::new(dimensions.0, dimensions.1);
        for y in 0..dimensions.1 {
            for x in 0..dimensions.0 {
                let bg = background.get_pixel(x, y);

                // Shadow layer: the silhouette shifted by the offset.
                let shadow_alpha = shadow_value(&blurred, x, y, dx, dy) * opacity;

                let fg = foreground.get_pixel(x, y);
                let a = f32::from(matte.get(x, y).unwrap_or(0)) / 255.0;

                let mut pixel = [0u8; 3];
                for channel in 0..3 {
                    let shadowed = f32::from(bg[channel]) * (1.0 - shadow_alpha);
                    let blended = f32::from(fg[channel]) * a + shadowed * (1.0 - a);
                    pixel[channel] = blended.round().clamp(0.0, 255.0) as u8;
                }
                output.put_pixel(x, y, Rgb(pixel));
            }
        }
        Ok(output)
    }
}

fn shadow_value(blurred: &GrayImage, x: u32, y: u32, dx: i32, dy: i32) -> f32 {
    let sx = i64::from(x) - i64::from(dx);
    let sy = i64::from(y) - i64::from(dy);
    if sx < 0 || sy < 0 || sx >= i64::from(blurred.width()) || sy >= i64::from(blurred.height()) {
        return 0.0;
    }
    f32::from(blurred.get_pixel(sx as u32, sy as u32)[0]) / 255.0
}

/// Darken the original background in place instead of replacing it
///
/// The subject's smoothed silhouette masks the effect to the background
/// region; each background pixel blends toward a brightness-adaptive
/// darkened copy of itself, leaving the subject untouched. Produces a
/// vignette-like result preserving the original background content.
///
/// # Errors
/// `InvalidInput` when image and matte dimensions differ.
pub fn darken_background(
    original: &RgbImage,
    matte: &AlphaMatte,
    settings: &DarkenSettings,
) -> Result<RgbImage> {
    let dimensions = original.dimensions();
    if dimensions != matte.dimensions {
        return Err(CutoutError::dimension_mismatch(dimensions, matte.dimensions));
    }

    let silhouette = matte.to_image()?;
    let blurred = gaussian_blur_f32(&silhouette, sigma_for_radius(DARKEN_BLUR_KERNEL / 2));
    let darken_amount = settings.darken_amount.clamp(0.0, 1.0);
    let target = settings.target_brightness.max(0.0);

    let mut output = RgbImage::new(dimensions.0, dimensions.1);
    for ((out, src), mask) in output
        .pixels_mut()
        .zip(original.pixels())
        .zip(blurred.pixels())
    {
        let m = f32::from(mask[0]) / 255.0;
        let strength = (1.0 - m) * darken_amount;

        let gray = 0.299 * f32::from(src[0]) + 0.587 * f32::from(src[1]) + 0.114 * f32::from(src[2]);
        let dark_factor = (target / (gray + 1.0)).clamp(0.1, 1.0);

        for channel in 0..3 {
            let value = f32::from(src[channel]);
            let darkened = value * dark_factor;
            let blended = value * (1.0 - strength) + darkened * strength;
            out[channel] = blended.round().clamp(0.0, 255.0) as u8;
        }
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid_compositor(color: (u8, u8, u8)) -> Compositor {
        Compositor::new(
            BackgroundSpec::Solid {
                r: color.0,
                g: color.1,
                b: color.2,
            },
            PathGuard::with_default_roots(),
        )
    }

    fn uniform_foreground(size: (u32, u32), color: [u8; 3]) -> RgbaImage {
        RgbaImage::from_pixel(size.0, size.1, Rgba([color[0], color[1], color[2], 255]))
    }

    #[test]
    fn test_opaque_matte_reproduces_foreground() {
        let mut compositor = solid_compositor((0, 0, 255));
        let fg = uniform_foreground((12, 8), [170, 120, 40]);
        let matte = AlphaMatte::constant(255, (12, 8));

        let result = compositor.composite(&fg, &matte).unwrap();
        assert!(result.pixels().all(|p| p.0 == [170, 120, 40]));
    }

    #[test]
    fn test_transparent_matte_reproduces_background() {
        let mut compositor = solid_compositor((33, 66, 99));
        let fg = uniform_foreground((12, 8), [255, 255, 255]);
        let matte = AlphaMatte::constant(0, (12, 8));

        let result = compositor.composite(&fg, &matte).unwrap();
        assert!(result.pixels().all(|p| p.0 == [33, 66, 99]));
    }

    #[test]
    fn test_half_alpha_blends_midway() {
        let mut compositor = solid_compositor((0, 0, 0));
        let fg = uniform_foreground((4, 4), [200, 100, 50]);
        let matte = AlphaMatte::constant(128, (4, 4));

        let result = compositor.composite(&fg, &matte).unwrap();
        let pixel = result.get_pixel(0, 0).0;
        assert!((i32::from(pixel[0]) - 100).abs() <= 1);
        assert!((i32::from(pixel[1]) - 50).abs() <= 1);
        assert!((i32::from(pixel[2]) - 25).abs() <= 1);
    }

    #[test]
    fn test_dimension_mismatch_is_rejected() {
        let mut compositor = solid_compositor((0, 0, 0));
        let fg = uniform_foreground((4, 4), [1, 2, 3]);
        let matte = AlphaMatte::constant(255, (4, 5));
        let result = compositor.composite(&fg, &matte);
        assert!(matches!(result, Err(CutoutError::InvalidInput(_))));
    }

    #[test]
    fn test_shadow_darkens_offset_region() {
        let mut compositor = solid_compositor((220, 220, 220));
        let size = (48u32, 48u32);
        let fg = uniform_foreground(size, [10, 10, 10]);

        // Subject square in the upper-left quadrant.
        let mut data = vec![0u8; (size.0 * size.1) as usize];
        for y in 8..20 {
            for x in 8..20 {
                data[(y * size.0 + x) as usize] = 255;
            }
        }
        let matte = AlphaMatte::new(data, size).unwrap();

        let shadow = ShadowSettings {
            offset: (10, 10),
            blur_radius: 2,
            opacity: 0.5,
        };
        let result = compositor
            .composite_with_shadow(&fg, &matte, &shadow)
            .unwrap();

        // Outside both subject and shadow: pure background.
        assert_eq!(result.get_pixel(44, 44).0, [220, 220, 220]);
        // Inside the offset shadow but outside the subject: darkened.
        let shadowed = result.get_pixel(24, 24).0;
        assert!(shadowed[0] < 160, "expected shadow, got {:?}", shadowed);
        // Inside the subject: the foreground wins.
        assert_eq!(result.get_pixel(12, 12).0, [10, 10, 10]);
    }

    #[test]
    fn test_shadow_with_transparent_matte_is_pure_background() {
        let mut compositor = solid_compositor((50, 60, 70));
        let fg = uniform_foreground((16, 16), [255, 0, 0]);
        let matte = AlphaMatte::constant(0, (16, 16));

        let result = compositor
            .composite_with_shadow(&fg, &matte, &ShadowSettings::default())
            .unwrap();
        assert!(result.pixels().all(|p| p.0 == [50, 60, 70]));
    }

    #[test]
    fn test_background_cache_reused_across_composites() {
        let mut compositor = solid_compositor((1, 2, 3));
        let fg = uniform_foreground((10, 10), [9, 9, 9]);
        let matte = AlphaMatte::constant(0, (10, 10));

        let first = compositor.composite(&fg, &matte).unwrap();
        let second = compositor.composite(&fg, &matte).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_darken_leaves_subject_untouched() {
        let original = RgbImage::from_pixel(64, 64, Rgb([180, 160, 140]));
        // Large opaque subject block so the blurred silhouette saturates at
        // its center.
        let mut data = vec![0u8; 64 * 64];
        for y in 8..56 {
            for x in 8..56 {
                data[y * 64 + x] = 255;
            }
        }
        let matte = AlphaMatte::new(data, (64, 64)).unwrap();

        let result = darken_background(&original, &matte, &DarkenSettings::default()).unwrap();

        // Subject center keeps the original value.
        assert_eq!(result.get_pixel(32, 32).0, [180, 160, 140]);
        // A far corner (background) is dimmed.
        let corner = result.get_pixel(0, 0).0;
        assert!(corner[0] < 180, "corner should darken, got {:?}", corner);
    }

    #[test]
    fn test_darken_factor_respects_floor() {
        // Very bright background with a tiny target brightness still only
        // darkens to the 0.1 floor.
        let original = RgbImage::from_pixel(16, 16, Rgb([250, 250, 250]));
        let matte = AlphaMatte::constant(0, (16, 16));
        let settings = DarkenSettings {
            darken_amount: 1.0,
            target_brightness: 1.0,
        };
        let result = darken_background(&original, &matte, &settings).unwrap();
        let pixel = result.get_pixel(8, 8).0;
        assert!((i32::from(pixel[0]) - 25).abs() <= 2, "got {:?}", pixel);
    }

    #[test]
    fn test_darken_dimension_mismatch() {
        let original = RgbImage::new(4, 4);
        let matte = AlphaMatte::constant(0, (5, 4));
        let result = darken_background(&original, &matte, &DarkenSettings::default());
        assert!(matches!(result, Err(CutoutError::InvalidInput(_))));
    }
}
