//! Error types for portrait cutout operations

use thiserror::Error;

/// Result type alias for portrait cutout operations
pub type Result<T> = std::result::Result<T, CutoutError>;

/// Comprehensive error types for the cutout pipeline
#[derive(Error, Debug)]
pub enum CutoutError {
    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or encoding errors
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Malformed input (mismatched dimensions, unsupported mode, bad settings)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Input exceeds a hard capacity limit (pixel count, batch size)
    #[error("Resource limit exceeded: {0}")]
    ResourceLimit(String),

    /// The matting backend cannot be loaded or is not linked in
    #[error("Matting model unavailable: {0}")]
    ModelUnavailable(String),

    /// Path falls outside the allowed root directories
    #[error("Path not allowed: {0}")]
    PathNotAllowed(String),

    /// Any other unexpected failure during a pipeline stage
    #[error("Processing error: {0}")]
    Processing(String),
}

impl CutoutError {
    /// Create a new invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new resource limit error
    pub fn resource_limit<S: Into<String>>(msg: S) -> Self {
        Self::ResourceLimit(msg.into())
    }

    /// Create a new model unavailable error
    pub fn model_unavailable<S: Into<String>>(msg: S) -> Self {
        Self::ModelUnavailable(msg.into())
    }

    /// Create a new path-not-allowed error
    pub fn path_not_allowed<P: AsRef<std::path::Path>>(path: P) -> Self {
        Self::PathNotAllowed(path.as_ref().display().to_string())
    }

    /// Create a new processing error
    pub fn processing<S: Into<String>>(msg: S) -> Self {
        Self::Processing(msg.into())
    }

    /// Create a file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {} '{}': {}", operation, path_display, error),
        ))
    }

    /// Create a processing error with stage context
    pub fn stage_error(stage: &str, details: &str) -> Self {
        Self::Processing(format!("Stage '{}' failed: {}", stage, details))
    }

    /// Create an invalid input error for mismatched image/matte dimensions
    pub fn dimension_mismatch(image: (u32, u32), matte: (u32, u32)) -> Self {
        Self::InvalidInput(format!(
            "Image dimensions {}x{} do not match matte dimensions {}x{}",
            image.0, image.1, matte.0, matte.1
        ))
    }

    /// Stable machine-readable kind, used in per-item result records
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Image(_) => "image",
            Self::InvalidInput(_) => "invalid_input",
            Self::ResourceLimit(_) => "resource_limit",
            Self::ModelUnavailable(_) => "model_unavailable",
            Self::PathNotAllowed(_) => "path_not_allowed",
            Self::Processing(_) => "processing",
        }
    }
}
