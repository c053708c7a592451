//! Image file input/output service
//!
//! Separates file I/O from the pipeline stages, keeping the stages total
//! functions over in-memory buffers.

use crate::{
    color_profile::{ColorProfile, ProfileExtractor},
    config::OutputFormat,
    error::{CutoutError, Result},
    types::CompositeResult,
};
use image::DynamicImage;
use std::path::Path;

/// A decoded image together with its embedded color profile blob
pub struct LoadedImage {
    /// The decoded image
    pub image: DynamicImage,
    /// Embedded ICC profile, if any; passed through unmodified
    pub color_profile: Option<ColorProfile>,
}

/// Service for image file input/output operations
pub struct ImageIOService;

impl ImageIOService {
    /// Load an image from a file path
    ///
    /// Tries extension-based format detection first and falls back to
    /// content-based detection when that fails.
    ///
    /// # Errors
    /// File-not-found or undecodable content.
    pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
        let path_ref = path.as_ref();

        if !path_ref.exists() {
            return Err(CutoutError::file_io_error(
                "read image file",
                path_ref,
                &std::io::Error::new(std::io::ErrorKind::NotFound, "file does not exist"),
            ));
        }

        match image::open(path_ref) {
            Ok(img) => Ok(img),
            Err(e) => {
                log::debug!(
                    "Extension-based loading failed for {}: {}. Attempting content-based detection.",
                    path_ref.display(),
                    e
                );
                let data = std::fs::read(path_ref)
                    .map_err(|io_err| CutoutError::file_io_error("read image data", path_ref, &io_err))?;
                image::load_from_memory(&data).map_err(CutoutError::Image)
            },
        }
    }

    /// Load an image and extract its embedded color profile
    ///
    /// A failed profile probe is not fatal; the image loads without one.
    ///
    /// # Errors
    /// Same failures as [`ImageIOService::load_image`].
    pub fn load_with_profile<P: AsRef<Path>>(path: P) -> Result<LoadedImage> {
        let path_ref = path.as_ref();
        let image = Self::load_image(path_ref)?;
        let color_profile = match ProfileExtractor::extract_from_image(path_ref) {
            Ok(profile) => profile,
            Err(e) => {
                log::debug!("Color profile extraction failed: {e}");
                None
            },
        };
        Ok(LoadedImage {
            image,
            color_profile,
        })
    }

    /// Save a composite result, creating parent directories as needed
    ///
    /// # Errors
    /// Directory creation, file creation, or encoding failures.
    pub fn save_composite<P: AsRef<Path>>(
        result: &mut CompositeResult,
        path: P,
        format: OutputFormat,
        quality: u8,
    ) -> Result<()> {
        let path_ref = path.as_ref();
        Self::ensure_parent_dirs(path_ref)?;
        result.save(path_ref, format, quality)
    }

    /// Create parent directories for an output path if they don't exist
    ///
    /// # Errors
    /// Directory creation failures.
    pub fn ensure_parent_dirs<P: AsRef<Path>>(path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    CutoutError::file_io_error("create parent directory", parent, &e)
                })?;
            }
        }
        Ok(())
    }
}
