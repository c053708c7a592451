//! Pipeline configuration types
//!
//! `PipelineConfig` is the typed configuration consumed by the processor;
//! `PortraitSettings` is the flat JSON shape produced by host applications,
//! decoded with serde and converted into a `PipelineConfig`.

use crate::error::{CutoutError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default noise seed for the hair-refinement stage; identical inputs
/// produce identical mattes unless a caller overrides the seed.
pub const DEFAULT_NOISE_SEED: u64 = 0x05EE_DCA7;

/// Output encoding format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JPEG output (default; quality applies)
    Jpeg,
    /// PNG output
    Png,
}

impl OutputFormat {
    /// Corresponding `image` crate format
    #[must_use]
    pub fn to_image_format(self) -> image::ImageFormat {
        match self {
            Self::Jpeg => image::ImageFormat::Jpeg,
            Self::Png => image::ImageFormat::Png,
        }
    }
}

/// Gradient axis for synthesized backgrounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradientDirection {
    /// Top to bottom
    Vertical,
    /// Left to right
    Horizontal,
    /// Center outward, by normalized Euclidean distance
    Radial,
}

impl GradientDirection {
    /// Parse a direction name; unknown names fall back to vertical
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name {
            "horizontal" => Self::Horizontal,
            "radial" => Self::Radial,
            _ => Self::Vertical,
        }
    }
}

/// Background specification, resolved to a concrete image at composite time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BackgroundSpec {
    /// Named studio preset; unknown names resolve to the default preset
    Preset(String),
    /// Explicit flat color
    Solid { r: u8, g: u8, b: u8 },
    /// Image file, resized to cover the subject
    ImageFile(PathBuf),
    /// Linear interpolation between two colors along an axis
    Gradient {
        start: (u8, u8, u8),
        end: (u8, u8, u8),
        direction: GradientDirection,
    },
}

impl Default for BackgroundSpec {
    fn default() -> Self {
        Self::Preset(crate::background::DEFAULT_PRESET.to_string())
    }
}

/// Edge refinement settings
///
/// All stages are independently toggleable; a zero count or radius disables
/// the corresponding stage. The stage order itself is fixed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeSettings {
    /// Erosion radius in pixels (0 = off)
    pub edge_inset: u32,
    /// Gaussian feather radius in pixels (0 = off)
    pub feather_radius: u32,
    /// Remove background-color bleed from semi-transparent edge pixels
    pub decontaminate: bool,
    /// Decontamination strength, clamped to [0, 1]
    pub decontaminate_strength: f32,
    /// Synthesize fine-hair translucency at the matte boundary
    pub hair_refinement: bool,
    /// Hair refinement strength
    pub hair_refinement_strength: f32,
    /// Bilateral-filter iteration count (0 = off)
    pub edge_smoothing: u32,
    /// Seed for the hair-refinement noise field; `None` uses the fixed
    /// default so repeated runs are reproducible
    pub noise_seed: Option<u64>,
}

impl Default for EdgeSettings {
    fn default() -> Self {
        Self {
            edge_inset: 2,
            feather_radius: 3,
            decontaminate: true,
            decontaminate_strength: 0.8,
            hair_refinement: true,
            hair_refinement_strength: 0.4,
            edge_smoothing: 2,
            noise_seed: None,
        }
    }
}

impl EdgeSettings {
    /// Settings with every stage disabled
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            edge_inset: 0,
            feather_radius: 0,
            decontaminate: false,
            decontaminate_strength: 0.0,
            hair_refinement: false,
            hair_refinement_strength: 0.0,
            edge_smoothing: 0,
            noise_seed: None,
        }
    }

    /// Copy with out-of-range values clamped to their documented domains
    #[must_use]
    pub fn clamped(&self) -> Self {
        Self {
            edge_inset: self.edge_inset.min(64),
            feather_radius: self.feather_radius.min(64),
            decontaminate: self.decontaminate,
            decontaminate_strength: sanitize_unit(self.decontaminate_strength),
            hair_refinement: self.hair_refinement,
            hair_refinement_strength: sanitize_unit(self.hair_refinement_strength),
            edge_smoothing: self.edge_smoothing.min(16),
            noise_seed: self.noise_seed,
        }
    }

    /// Effective noise seed
    #[must_use]
    pub fn effective_seed(&self) -> u64 {
        self.noise_seed.unwrap_or(DEFAULT_NOISE_SEED)
    }
}

fn sanitize_unit(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Drop-shadow settings for the shadowed composite variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShadowSettings {
    /// Shadow offset in pixels (x, y)
    pub offset: (i32, i32),
    /// Gaussian blur radius applied to the silhouette
    pub blur_radius: u32,
    /// Shadow opacity, clamped to [0, 1]
    pub opacity: f32,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            offset: (8, 12),
            blur_radius: 15,
            opacity: 0.3,
        }
    }
}

/// Settings for the background-darkening mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DarkenSettings {
    /// Blend strength toward the darkened background, [0, 1]
    pub darken_amount: f32,
    /// Target background brightness used to derive the darkening factor
    pub target_brightness: f32,
}

impl Default for DarkenSettings {
    fn default() -> Self {
        Self {
            darken_amount: 0.7,
            target_brightness: 35.0,
        }
    }
}

/// Pipeline mode selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Replace the background entirely
    Replace,
    /// Darken the original background in place
    Darken,
}

/// Complete pipeline configuration
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Replace vs darken
    pub mode: OutputMode,
    /// Background specification for replace mode
    pub background: BackgroundSpec,
    /// Edge refinement settings
    pub edge: EdgeSettings,
    /// Drop shadow, when present (replace mode only)
    pub shadow: Option<ShadowSettings>,
    /// Darken-mode settings
    pub darken: DarkenSettings,
    /// Output encoding format
    pub output_format: OutputFormat,
    /// Output encoding quality, clamped to 50-100
    pub output_quality: u8,
    /// Carry ICC color profiles from input to output
    pub preserve_color_profiles: bool,
}

impl PipelineConfig {
    /// Create a new configuration builder
    #[must_use]
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::new()
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: OutputMode::Replace,
            background: BackgroundSpec::default(),
            edge: EdgeSettings::default(),
            shadow: None,
            darken: DarkenSettings::default(),
            output_format: OutputFormat::Jpeg,
            output_quality: 95,
            preserve_color_profiles: true,
        }
    }
}

/// Builder for `PipelineConfig`
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
        }
    }

    #[must_use]
    pub fn mode(mut self, mode: OutputMode) -> Self {
        self.config.mode = mode;
        self
    }

    #[must_use]
    pub fn background(mut self, background: BackgroundSpec) -> Self {
        self.config.background = background;
        self
    }

    #[must_use]
    pub fn edge_settings(mut self, edge: EdgeSettings) -> Self {
        self.config.edge = edge;
        self
    }

    #[must_use]
    pub fn shadow(mut self, shadow: Option<ShadowSettings>) -> Self {
        self.config.shadow = shadow;
        self
    }

    #[must_use]
    pub fn darken_settings(mut self, darken: DarkenSettings) -> Self {
        self.config.darken = darken;
        self
    }

    #[must_use]
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    #[must_use]
    pub fn output_quality(mut self, quality: u8) -> Self {
        self.config.output_quality = quality.clamp(50, 100);
        self
    }

    #[must_use]
    pub fn preserve_color_profiles(mut self, preserve: bool) -> Self {
        self.config.preserve_color_profiles = preserve;
        self
    }

    /// Build the configuration
    ///
    /// # Errors
    /// `InvalidInput` for non-finite strength values.
    pub fn build(self) -> Result<PipelineConfig> {
        if !self.config.edge.decontaminate_strength.is_finite()
            || !self.config.edge.hair_refinement_strength.is_finite()
        {
            return Err(CutoutError::invalid_input(
                "Edge strength values must be finite",
            ));
        }
        let mut config = self.config;
        config.edge = config.edge.clamped();
        Ok(config)
    }
}

impl Default for PipelineConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Flat settings shape used by host applications
///
/// Field names and defaults mirror the settings JSON documented in the
/// sidecar protocol; absent fields take the documented defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PortraitSettings {
    pub mode: Option<String>,
    pub background_type: Option<String>,
    pub preset_name: Option<String>,
    pub background_image_path: Option<String>,
    pub color_r: Option<i64>,
    pub color_g: Option<i64>,
    pub color_b: Option<i64>,
    pub gradient_start_r: Option<i64>,
    pub gradient_start_g: Option<i64>,
    pub gradient_start_b: Option<i64>,
    pub gradient_end_r: Option<i64>,
    pub gradient_end_g: Option<i64>,
    pub gradient_end_b: Option<i64>,
    pub gradient_direction: Option<String>,
    pub edge_inset: Option<i64>,
    pub feather_radius: Option<i64>,
    pub decontaminate: Option<bool>,
    pub decontaminate_strength: Option<f32>,
    pub hair_refinement: Option<bool>,
    pub hair_refinement_strength: Option<f32>,
    pub edge_smoothing: Option<i64>,
    pub add_shadow: Option<bool>,
    pub shadow_opacity: Option<f32>,
    pub darken_amount: Option<f32>,
    pub target_brightness: Option<f32>,
    pub output_quality: Option<i64>,
}

impl PortraitSettings {
    /// Convert into a typed `PipelineConfig`
    ///
    /// # Errors
    /// `InvalidInput` for an unrecognized `mode`. Unknown background types
    /// and preset names fall back to the default preset instead of failing.
    pub fn to_pipeline_config(&self) -> Result<PipelineConfig> {
        let mode = match self.mode.as_deref() {
            None | Some("replace") => OutputMode::Replace,
            Some("darken") => OutputMode::Darken,
            Some(other) => {
                return Err(CutoutError::invalid_input(format!(
                    "Unsupported mode '{other}' (expected 'replace' or 'darken')"
                )));
            },
        };

        let background = self.resolve_background_spec();

        let edge = EdgeSettings {
            edge_inset: clamp_px(self.edge_inset, 2),
            feather_radius: clamp_px(self.feather_radius, 3),
            decontaminate: self.decontaminate.unwrap_or(true),
            decontaminate_strength: self.decontaminate_strength.unwrap_or(0.8),
            hair_refinement: self.hair_refinement.unwrap_or(true),
            hair_refinement_strength: self.hair_refinement_strength.unwrap_or(0.4),
            edge_smoothing: clamp_px(self.edge_smoothing, 2),
            noise_seed: None,
        };

        let shadow = if self.add_shadow.unwrap_or(false) {
            Some(ShadowSettings {
                opacity: sanitize_unit(self.shadow_opacity.unwrap_or(0.3)),
                ..ShadowSettings::default()
            })
        } else {
            None
        };

        let darken = DarkenSettings {
            darken_amount: sanitize_unit(self.darken_amount.unwrap_or(0.7)),
            target_brightness: self
                .target_brightness
                .filter(|v| v.is_finite() && *v >= 0.0)
                .unwrap_or(35.0),
        };

        let quality = self.output_quality.unwrap_or(95).clamp(50, 100) as u8;

        PipelineConfig::builder()
            .mode(mode)
            .background(background)
            .edge_settings(edge)
            .shadow(shadow)
            .darken_settings(darken)
            .output_quality(quality)
            .build()
    }

    fn resolve_background_spec(&self) -> BackgroundSpec {
        match self.background_type.as_deref() {
            None | Some("preset") => BackgroundSpec::Preset(
                self.preset_name
                    .clone()
                    .unwrap_or_else(|| crate::background::DEFAULT_PRESET.to_string()),
            ),
            Some("color") => BackgroundSpec::Solid {
                r: clamp_channel(self.color_r),
                g: clamp_channel(self.color_g),
                b: clamp_channel(self.color_b),
            },
            Some("image") => match &self.background_image_path {
                Some(path) if !path.is_empty() => BackgroundSpec::ImageFile(PathBuf::from(path)),
                _ => {
                    log::warn!("Background image path missing, using default preset");
                    BackgroundSpec::default()
                },
            },
            Some("gradient") => BackgroundSpec::Gradient {
                start: (
                    clamp_channel(self.gradient_start_r),
                    clamp_channel(self.gradient_start_g),
                    clamp_channel(self.gradient_start_b),
                ),
                end: (
                    clamp_channel(self.gradient_end_r),
                    clamp_channel(self.gradient_end_g),
                    clamp_channel(self.gradient_end_b),
                ),
                direction: GradientDirection::parse(
                    self.gradient_direction.as_deref().unwrap_or("vertical"),
                ),
            },
            Some(other) => {
                log::warn!("Unknown background type '{other}', using default preset");
                BackgroundSpec::default()
            },
        }
    }
}

fn clamp_channel(value: Option<i64>) -> u8 {
    value.unwrap_or(0).clamp(0, 255) as u8
}

fn clamp_px(value: Option<i64>, default: u32) -> u32 {
    value.map_or(default, |v| v.clamp(0, 64) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.mode, OutputMode::Replace);
        assert_eq!(config.output_quality, 95);
        assert_eq!(config.edge.edge_inset, 2);
        assert!(config.shadow.is_none());
    }

    #[test]
    fn test_builder_clamps_quality() {
        let config = PipelineConfig::builder().output_quality(10).build().unwrap();
        assert_eq!(config.output_quality, 50);

        let config = PipelineConfig::builder()
            .output_quality(255)
            .build()
            .unwrap();
        assert_eq!(config.output_quality, 100);
    }

    #[test]
    fn test_edge_settings_clamping() {
        let settings = EdgeSettings {
            decontaminate_strength: 3.5,
            hair_refinement_strength: -1.0,
            edge_inset: 500,
            ..EdgeSettings::default()
        };
        let clamped = settings.clamped();
        assert!((clamped.decontaminate_strength - 1.0).abs() < f32::EPSILON);
        assert_eq!(clamped.hair_refinement_strength, 0.0);
        assert_eq!(clamped.edge_inset, 64);
    }

    #[test]
    fn test_builder_rejects_nan_strength() {
        let settings = EdgeSettings {
            decontaminate_strength: f32::NAN,
            ..EdgeSettings::default()
        };
        let result = PipelineConfig::builder().edge_settings(settings).build();
        assert!(matches!(result, Err(CutoutError::InvalidInput(_))));
    }

    #[test]
    fn test_settings_json_defaults() {
        let settings: PortraitSettings = serde_json::from_str("{}").unwrap();
        let config = settings.to_pipeline_config().unwrap();
        assert_eq!(config.mode, OutputMode::Replace);
        assert_eq!(config.edge.feather_radius, 3);
        assert!(config.edge.decontaminate);
        assert_eq!(config.output_quality, 95);
        assert_eq!(
            config.background,
            BackgroundSpec::Preset(crate::background::DEFAULT_PRESET.to_string())
        );
    }

    #[test]
    fn test_settings_json_full() {
        let json = r#"{
            "mode": "replace",
            "background_type": "gradient",
            "gradient_start_r": 0, "gradient_start_g": 0, "gradient_start_b": 0,
            "gradient_end_r": 255, "gradient_end_g": 255, "gradient_end_b": 255,
            "gradient_direction": "radial",
            "edge_inset": 4,
            "feather_radius": 0,
            "decontaminate": false,
            "add_shadow": true,
            "shadow_opacity": 0.5,
            "output_quality": 120
        }"#;
        let settings: PortraitSettings = serde_json::from_str(json).unwrap();
        let config = settings.to_pipeline_config().unwrap();
        assert_eq!(config.edge.edge_inset, 4);
        assert_eq!(config.edge.feather_radius, 0);
        assert!(!config.edge.decontaminate);
        assert_eq!(config.output_quality, 100);
        let shadow = config.shadow.expect("shadow enabled");
        assert!((shadow.opacity - 0.5).abs() < f32::EPSILON);
        assert!(matches!(
            config.background,
            BackgroundSpec::Gradient {
                direction: GradientDirection::Radial,
                ..
            }
        ));
    }

    #[test]
    fn test_settings_unknown_mode_is_invalid() {
        let settings = PortraitSettings {
            mode: Some("invert".to_string()),
            ..PortraitSettings::default()
        };
        let result = settings.to_pipeline_config();
        assert!(matches!(result, Err(CutoutError::InvalidInput(_))));
    }

    #[test]
    fn test_settings_unknown_background_type_falls_back() {
        let settings = PortraitSettings {
            background_type: Some("plasma".to_string()),
            ..PortraitSettings::default()
        };
        let config = settings.to_pipeline_config().unwrap();
        assert_eq!(config.background, BackgroundSpec::default());
    }

    #[test]
    fn test_settings_color_channels_clamped() {
        let settings = PortraitSettings {
            background_type: Some("color".to_string()),
            color_r: Some(-20),
            color_g: Some(300),
            color_b: Some(128),
            ..PortraitSettings::default()
        };
        let config = settings.to_pipeline_config().unwrap();
        assert_eq!(
            config.background,
            BackgroundSpec::Solid { r: 0, g: 255, b: 128 }
        );
    }

    #[test]
    fn test_effective_seed_default() {
        let settings = EdgeSettings::default();
        assert_eq!(settings.effective_seed(), DEFAULT_NOISE_SEED);
        let seeded = EdgeSettings {
            noise_seed: Some(42),
            ..EdgeSettings::default()
        };
        assert_eq!(seeded.effective_seed(), 42);
    }
}
