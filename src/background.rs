//! Background resolution
//!
//! Turns a [`BackgroundSpec`] into a concrete background image sized to the
//! subject. Solid colors and presets fill a flat canvas, gradients are
//! synthesized per pixel, and image files are loaded once and resized to
//! cover. Resolution never fails: unknown or unavailable sources fall back
//! to the default preset.

use crate::{
    config::{BackgroundSpec, GradientDirection},
    utils::PathGuard,
};
use image::{imageops, Rgb, RgbImage};
use std::collections::HashMap;
use std::path::Path;

/// Preset name used when a spec cannot be honored
pub const DEFAULT_PRESET: &str = "charcoal";

/// Studio background presets
pub const PRESET_BACKGROUNDS: &[(&str, (u8, u8, u8))] = &[
    ("black", (0, 0, 0)),
    ("charcoal", (44, 44, 48)),
    ("dark_gray", (64, 64, 68)),
    ("navy", (18, 28, 58)),
    ("dark_blue", (24, 44, 92)),
    ("white", (245, 245, 245)),
    ("light_gray", (200, 200, 202)),
];

/// Look up a preset color by name
#[must_use]
pub fn preset_color(name: &str) -> Option<(u8, u8, u8)> {
    PRESET_BACKGROUNDS
        .iter()
        .find(|(preset, _)| *preset == name)
        .map(|(_, color)| *color)
}

fn default_color() -> (u8, u8, u8) {
    preset_color(DEFAULT_PRESET).unwrap_or((44, 44, 48))
}

/// Resolves a background spec into concrete images, one per target size
///
/// Resolved images are cached per distinct target size for the resolver's
/// lifetime, so repeated composites against the same background reuse the
/// loaded and resized instance.
pub struct BackgroundResolver {
    spec: BackgroundSpec,
    guard: PathGuard,
    cache: HashMap<(u32, u32), RgbImage>,
}

impl BackgroundResolver {
    /// Create a resolver for one background spec
    #[must_use]
    pub fn new(spec: BackgroundSpec, guard: PathGuard) -> Self {
        Self {
            spec,
            guard,
            cache: HashMap::new(),
        }
    }

    /// The spec this resolver serves
    #[must_use]
    pub fn spec(&self) -> &BackgroundSpec {
        &self.spec
    }

    /// Resolve to a concrete background of `target_size`
    ///
    /// Infallible by design: a background image that cannot be validated or
    /// loaded degrades to the default preset with a warning.
    pub fn resolve(&mut self, target_size: (u32, u32)) -> &RgbImage {
        if !self.cache.contains_key(&target_size) {
            let rendered = self.render(target_size);
            self.cache.insert(target_size, rendered);
        }
        self.cache
            .get(&target_size)
            .expect("background cached above")
    }

    fn render(&self, target_size: (u32, u32)) -> RgbImage {
        match &self.spec {
            BackgroundSpec::Preset(name) => {
                let color = preset_color(name).unwrap_or_else(|| {
                    log::warn!("Unknown background preset '{name}', using '{DEFAULT_PRESET}'");
                    default_color()
                });
                solid_image(target_size, color)
            },
            BackgroundSpec::Solid { r, g, b } => solid_image(target_size, (*r, *g, *b)),
            BackgroundSpec::ImageFile(path) => self.render_image_file(path, target_size),
            BackgroundSpec::Gradient {
                start,
                end,
                direction,
            } => gradient_image(target_size, *start, *end, *direction),
        }
    }

    fn render_image_file(&self, path: &Path, target_size: (u32, u32)) -> RgbImage {
        let checked = match self.guard.check(path) {
            Ok(checked) => checked,
            Err(e) => {
                log::warn!("Background image rejected ({e}), using default preset");
                return solid_image(target_size, default_color());
            },
        };

        match image::open(&checked) {
            Ok(loaded) => cover_resize(&loaded.to_rgb8(), target_size),
            Err(e) => {
                log::warn!(
                    "Failed to load background image '{}': {e}, using default preset",
                    checked.display()
                );
                solid_image(target_size, default_color())
            },
        }
    }
}

/// Flat-color background
#[must_use]
pub fn solid_image(size: (u32, u32), color: (u8, u8, u8)) -> RgbImage {
    RgbImage::from_pixel(size.0, size.1, Rgb([color.0, color.1, color.2]))
}

/// Per-pixel linear gradient between two colors along the requested axis
#[must_use]
pub fn gradient_image(
    size: (u32, u32),
    start: (u8, u8, u8),
    end: (u8, u8, u8),
    direction: GradientDirection,
) -> RgbImage {
    let (width, height) = size;
    let start = [f32::from(start.0), f32::from(start.1), f32::from(start.2)];
    let end = [f32::from(end.0), f32::from(end.1), f32::from(end.2)];

    let lerp = |t: f32| -> Rgb<u8> {
        let t = t.clamp(0.0, 1.0);
        Rgb([
            (start[0] + (end[0] - start[0]) * t).round().clamp(0.0, 255.0) as u8,
            (start[1] + (end[1] - start[1]) * t).round().clamp(0.0, 255.0) as u8,
            (start[2] + (end[2] - start[2]) * t).round().clamp(0.0, 255.0) as u8,
        ])
    };

    match direction {
        GradientDirection::Vertical => RgbImage::from_fn(width, height, |_, y| {
            lerp(axis_position(y, height))
        }),
        GradientDirection::Horizontal => RgbImage::from_fn(width, height, |x, _| {
            lerp(axis_position(x, width))
        }),
        GradientDirection::Radial => {
            let cx = width as f32 / 2.0;
            let cy = height as f32 / 2.0;
            let max_dist = (cx * cx + cy * cy).sqrt().max(1.0);
            RgbImage::from_fn(width, height, |x, y| {
                let dx = x as f32 - cx;
                let dy = y as f32 - cy;
                let dist = (dx * dx + dy * dy).sqrt() / max_dist;
                lerp(dist)
            })
        },
    }
}

/// Position along a gradient axis, 0.0 at index 0 and 1.0 at the last index
fn axis_position(index: u32, span: u32) -> f32 {
    if span <= 1 {
        0.0
    } else {
        index as f32 / (span - 1) as f32
    }
}

/// Scale to fully cover the target rectangle, then center-crop the excess
#[must_use]
pub fn cover_resize(image: &RgbImage, target_size: (u32, u32)) -> RgbImage {
    let (target_w, target_h) = target_size;
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 || target_w == 0 || target_h == 0 {
        return RgbImage::new(target_w, target_h);
    }

    let scale = (target_w as f32 / width as f32).max(target_h as f32 / height as f32);
    let scaled_w = ((width as f32 * scale).ceil() as u32).max(target_w);
    let scaled_h = ((height as f32 * scale).ceil() as u32).max(target_h);

    let resized = imageops::resize(image, scaled_w, scaled_h, imageops::FilterType::Lanczos3);
    let offset_x = (scaled_w - target_w) / 2;
    let offset_y = (scaled_h - target_h) / 2;
    imageops::crop_imm(&resized, offset_x, offset_y, target_w, target_h).to_image()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn guard_for(dir: &TempDir) -> PathGuard {
        PathGuard::new([dir.path()])
    }

    #[test]
    fn test_preset_lookup() {
        assert_eq!(preset_color("black"), Some((0, 0, 0)));
        assert_eq!(preset_color("charcoal"), Some((44, 44, 48)));
        assert_eq!(preset_color("nonexistent"), None);
    }

    #[test]
    fn test_unknown_preset_falls_back_to_default() {
        let mut resolver = BackgroundResolver::new(
            BackgroundSpec::Preset("plasma".to_string()),
            PathGuard::with_default_roots(),
        );
        let background = resolver.resolve((4, 4));
        assert_eq!(background.get_pixel(0, 0).0, [44, 44, 48]);
    }

    #[test]
    fn test_solid_background() {
        let mut resolver = BackgroundResolver::new(
            BackgroundSpec::Solid { r: 10, g: 20, b: 30 },
            PathGuard::with_default_roots(),
        );
        let background = resolver.resolve((3, 2));
        assert_eq!(background.dimensions(), (3, 2));
        assert!(background.pixels().all(|p| p.0 == [10, 20, 30]));
    }

    #[test]
    fn test_vertical_gradient_scenario() {
        // Black-to-white vertical gradient at 100x200.
        let gradient = gradient_image(
            (100, 200),
            (0, 0, 0),
            (255, 255, 255),
            GradientDirection::Vertical,
        );
        assert_eq!(gradient.get_pixel(50, 0).0, [0, 0, 0]);
        assert_eq!(gradient.get_pixel(50, 199).0, [255, 255, 255]);
        let mid = gradient.get_pixel(50, 100).0;
        assert!((i32::from(mid[0]) - 127).abs() <= 2, "row 100 = {:?}", mid);
    }

    #[test]
    fn test_horizontal_gradient_endpoints() {
        let gradient = gradient_image(
            (50, 10),
            (255, 0, 0),
            (0, 0, 255),
            GradientDirection::Horizontal,
        );
        assert_eq!(gradient.get_pixel(0, 5).0, [255, 0, 0]);
        assert_eq!(gradient.get_pixel(49, 5).0, [0, 0, 255]);
    }

    #[test]
    fn test_radial_gradient_center_and_corner() {
        let gradient = gradient_image(
            (100, 100),
            (0, 0, 0),
            (200, 200, 200),
            GradientDirection::Radial,
        );
        let center = gradient.get_pixel(50, 50).0;
        assert!(center[0] <= 4, "center = {:?}", center);
        // Corners are at the maximum normalized distance.
        let corner = gradient.get_pixel(0, 0).0;
        assert!(corner[0] >= 196, "corner = {:?}", corner);
    }

    #[test]
    fn test_single_row_gradient_degenerates_to_start() {
        let gradient = gradient_image(
            (5, 1),
            (10, 10, 10),
            (200, 200, 200),
            GradientDirection::Vertical,
        );
        assert!(gradient.pixels().all(|p| p.0 == [10, 10, 10]));
    }

    #[test]
    fn test_cover_resize_covers_and_center_crops() {
        // Wide source into a square target: vertical fit, horizontal crop.
        let source = RgbImage::from_fn(40, 10, |x, _| {
            if x < 20 {
                Rgb([255, 0, 0])
            } else {
                Rgb([0, 0, 255])
            }
        });
        let covered = cover_resize(&source, (10, 10));
        assert_eq!(covered.dimensions(), (10, 10));
        // The center crop keeps the middle of the source: red left, blue right.
        assert!(covered.get_pixel(0, 5).0[0] >= 200);
        assert!(covered.get_pixel(9, 5).0[2] >= 200);
    }

    #[test]
    fn test_image_file_background_resolves_and_caches() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bg.png");
        RgbImage::from_pixel(16, 16, Rgb([0, 128, 0]))
            .save(&path)
            .unwrap();

        let mut resolver = BackgroundResolver::new(
            BackgroundSpec::ImageFile(path),
            guard_for(&temp_dir),
        );
        let first = resolver.resolve((8, 8)).clone();
        assert_eq!(first.dimensions(), (8, 8));
        assert_eq!(first.get_pixel(4, 4).0, [0, 128, 0]);

        // Second resolution of the same size comes from the cache.
        std::fs::remove_file(temp_dir.path().join("bg.png")).unwrap();
        let second = resolver.resolve((8, 8));
        assert_eq!(*second, first);
    }

    #[test]
    fn test_disallowed_image_path_falls_back() {
        let temp_dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        let path = outside.path().join("bg.png");
        RgbImage::from_pixel(4, 4, Rgb([255, 0, 0])).save(&path).unwrap();

        let mut resolver =
            BackgroundResolver::new(BackgroundSpec::ImageFile(path), guard_for(&temp_dir));
        let background = resolver.resolve((4, 4));
        assert_eq!(background.get_pixel(0, 0).0, [44, 44, 48]);
    }

    #[test]
    fn test_missing_image_file_falls_back() {
        let temp_dir = TempDir::new().unwrap();
        let mut resolver = BackgroundResolver::new(
            BackgroundSpec::ImageFile(temp_dir.path().join("missing.png")),
            guard_for(&temp_dir),
        );
        let background = resolver.resolve((4, 4));
        assert_eq!(background.get_pixel(0, 0).0, [44, 44, 48]);
    }
}
