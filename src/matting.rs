//! Matting backend abstraction
//!
//! The neural matting model is an external collaborator behind the
//! [`MatteSource`] trait: one operation turning an image into a foreground
//! RGBA cutout plus an alpha matte. Concrete neural backends are injected by
//! frontends; this crate only defines the seam and test doubles.

use crate::{
    error::{CutoutError, Result},
    types::AlphaMatte,
};
use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};
use instant::Duration;

/// Trait for matting backends
///
/// Implementations carry a potentially expensive model load behind
/// [`MatteSource::initialize`] (possibly multi-second, possibly including a
/// one-time download) and reuse the loaded instance afterwards. A source is
/// not reentrant: concurrent use from multiple threads is unsupported.
/// Parallelism across images belongs in separate processes, each with its
/// own source instance.
pub trait MatteSource {
    /// Load the underlying model, returning the load time on a cold start
    ///
    /// Idempotent: subsequent calls on a loaded source return `Ok(None)`
    /// without reloading.
    ///
    /// # Errors
    /// `ModelUnavailable` when the backend cannot be loaded.
    fn initialize(&mut self) -> Result<Option<Duration>>;

    /// Check if the source has been initialized
    fn is_initialized(&self) -> bool;

    /// Produce a foreground RGBA image and an alpha matte for `image`
    ///
    /// The returned foreground and matte share the input's dimensions.
    ///
    /// # Errors
    /// `ModelUnavailable` if the model is not loaded and cannot be loaded;
    /// `Processing` for inference failures.
    fn remove_background(&mut self, image: &DynamicImage) -> Result<(RgbaImage, AlphaMatte)>;

    /// Name of the underlying model, for logging and result metadata
    fn model_name(&self) -> &str;
}

/// Factory trait for constructing matting backends
pub trait MatteSourceFactory: Send + Sync {
    /// Create a matting source
    ///
    /// # Errors
    /// `ModelUnavailable` when no backend is linked in.
    fn create_source(&self) -> Result<Box<dyn MatteSource>>;

    /// Whether a usable backend is available without constructing it
    fn is_available(&self) -> bool;
}

/// Default factory: no neural backend is compiled into this crate
///
/// Frontends that link a concrete matting model provide their own factory;
/// this one reports `ModelUnavailable` so callers can present an actionable
/// message (and so `--check` can answer honestly).
pub struct DefaultMatteFactory;

impl MatteSourceFactory for DefaultMatteFactory {
    fn create_source(&self) -> Result<Box<dyn MatteSource>> {
        Err(CutoutError::model_unavailable(
            "No matting backend linked into this build. Inject a MatteSource implementation.",
        ))
    }

    fn is_available(&self) -> bool {
        false
    }
}

/// Deterministic mock matting source for tests and diagnostics
///
/// Produces a centered soft-edged ellipse as the subject silhouette, a
/// constant matte, or a caller-supplied matte. No model load cost.
#[derive(Debug, Clone)]
pub struct MockMatteSource {
    initialized: bool,
    behavior: MockBehavior,
}

#[derive(Debug, Clone)]
enum MockBehavior {
    Ellipse,
    Constant(u8),
    Fixed(AlphaMatte),
}

impl MockMatteSource {
    /// Mock source producing a centered soft ellipse matte
    #[must_use]
    pub fn new() -> Self {
        Self {
            initialized: false,
            behavior: MockBehavior::Ellipse,
        }
    }

    /// Mock source producing a constant-alpha matte sized to the input
    #[must_use]
    pub fn constant(alpha: u8) -> Self {
        Self {
            initialized: false,
            behavior: MockBehavior::Constant(alpha),
        }
    }

    /// Mock source producing exactly the supplied matte
    ///
    /// The matte must match the dimensions of images passed in later.
    #[must_use]
    pub fn with_matte(matte: AlphaMatte) -> Self {
        Self {
            initialized: false,
            behavior: MockBehavior::Fixed(matte),
        }
    }

    fn ellipse_matte(width: u32, height: u32) -> AlphaMatte {
        let cx = f64::from(width) / 2.0;
        let cy = f64::from(height) / 2.0;
        let rx = f64::from(width) * 0.35;
        let ry = f64::from(height) * 0.45;

        let mut data = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                let dx = (f64::from(x) + 0.5 - cx) / rx.max(1.0);
                let dy = (f64::from(y) + 0.5 - cy) / ry.max(1.0);
                let dist = (dx * dx + dy * dy).sqrt();
                // Soft falloff over the outer 10% of the ellipse radius.
                let alpha = if dist <= 0.9 {
                    255.0
                } else if dist >= 1.0 {
                    0.0
                } else {
                    255.0 * (1.0 - dist) / 0.1
                };
                data.push(alpha.round().clamp(0.0, 255.0) as u8);
            }
        }
        AlphaMatte { data, dimensions: (width, height) }
    }
}

impl Default for MockMatteSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MatteSource for MockMatteSource {
    fn initialize(&mut self) -> Result<Option<Duration>> {
        self.initialized = true;
        Ok(None)
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn remove_background(&mut self, image: &DynamicImage) -> Result<(RgbaImage, AlphaMatte)> {
        if !self.initialized {
            self.initialize()?;
        }

        let (width, height) = image.dimensions();
        let matte = match &self.behavior {
            MockBehavior::Ellipse => Self::ellipse_matte(width, height),
            MockBehavior::Constant(alpha) => AlphaMatte::constant(*alpha, (width, height)),
            MockBehavior::Fixed(fixed) if fixed.dimensions == (width, height) => fixed.clone(),
            MockBehavior::Fixed(fixed) => {
                return Err(CutoutError::dimension_mismatch(
                    (width, height),
                    fixed.dimensions,
                ));
            },
        };

        let rgb = image.to_rgb8();
        let mut foreground = RgbaImage::new(width, height);
        for (x, y, pixel) in rgb.enumerate_pixels() {
            let alpha = matte.get(x, y).unwrap_or(0);
            foreground.put_pixel(x, y, Rgba([pixel[0], pixel[1], pixel[2], alpha]));
        }

        Ok((foreground, matte))
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}

/// Matting source that always fails with `ModelUnavailable`
///
/// Used to test the distinct surfacing of backend load failures.
#[derive(Debug, Default)]
pub struct UnavailableMatteSource;

impl MatteSource for UnavailableMatteSource {
    fn initialize(&mut self) -> Result<Option<Duration>> {
        Err(CutoutError::model_unavailable(
            "Matting model could not be loaded (missing dependency)",
        ))
    }

    fn is_initialized(&self) -> bool {
        false
    }

    fn remove_background(&mut self, _image: &DynamicImage) -> Result<(RgbaImage, AlphaMatte)> {
        Err(CutoutError::model_unavailable(
            "Matting model could not be loaded (missing dependency)",
        ))
    }

    fn model_name(&self) -> &str {
        "unavailable"
    }
}
