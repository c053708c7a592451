//! ICC color profile passthrough
//!
//! The pipeline never interprets color profiles; the embedded blob is
//! extracted from the input and carried through to the encoded output
//! unmodified.

use crate::error::{CutoutError, Result};
use image::codecs::{jpeg::JpegDecoder, png::PngDecoder};
use image::ImageDecoder;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// An opaque embedded ICC profile blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorProfile {
    /// Raw ICC profile bytes, if present
    pub icc_data: Option<Vec<u8>>,
}

impl ColorProfile {
    /// Create a profile from raw ICC bytes
    #[must_use]
    pub fn from_icc_data(icc_data: Vec<u8>) -> Self {
        Self {
            icc_data: Some(icc_data),
        }
    }

    /// Create an empty profile (no embedded ICC data)
    #[must_use]
    pub fn none() -> Self {
        Self { icc_data: None }
    }

    /// Whether any ICC data is present
    #[must_use]
    pub fn is_present(&self) -> bool {
        self.icc_data.as_ref().is_some_and(|d| !d.is_empty())
    }

    /// Size of the embedded blob in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.icc_data.as_ref().map_or(0, Vec::len)
    }

    /// Whether the blob is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// ICC profile extractor for supported input formats
pub struct ProfileExtractor;

impl ProfileExtractor {
    /// Extract the ICC profile from an image file
    ///
    /// # Supported Formats
    /// - **JPEG/JPG**: via `JpegDecoder`
    /// - **PNG**: via `PngDecoder`
    /// - **Other formats**: returns `None`
    ///
    /// # Errors
    /// File I/O errors when opening the image. Decoder failures while probing
    /// for a profile are logged and treated as "no profile".
    pub fn extract_from_image<P: AsRef<Path>>(path: P) -> Result<Option<ColorProfile>> {
        let path = path.as_ref();

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase);

        match extension.as_deref() {
            Some("jpg" | "jpeg") => Self::extract_from_jpeg(path),
            Some("png") => Self::extract_from_png(path),
            _ => Ok(None),
        }
    }

    fn extract_from_jpeg<P: AsRef<Path>>(path: P) -> Result<Option<ColorProfile>> {
        let file = File::open(&path)
            .map_err(|e| CutoutError::file_io_error("open image file", &path, &e))?;
        let mut reader = BufReader::new(file);
        let mut decoder = JpegDecoder::new(&mut reader).map_err(|e| {
            CutoutError::processing(format!("Failed to create JPEG decoder: {e}"))
        })?;

        match decoder.icc_profile() {
            Ok(Some(icc_data)) => Ok(Some(ColorProfile::from_icc_data(icc_data))),
            Ok(None) => Ok(None),
            Err(e) => {
                log::debug!("Failed to extract ICC profile from JPEG: {e}");
                Ok(None)
            },
        }
    }

    fn extract_from_png<P: AsRef<Path>>(path: P) -> Result<Option<ColorProfile>> {
        let file = File::open(&path)
            .map_err(|e| CutoutError::file_io_error("open image file", &path, &e))?;
        let mut reader = BufReader::new(file);
        let mut decoder = PngDecoder::new(&mut reader)
            .map_err(|e| CutoutError::processing(format!("Failed to create PNG decoder: {e}")))?;

        match decoder.icc_profile() {
            Ok(Some(icc_data)) => Ok(Some(ColorProfile::from_icc_data(icc_data))),
            Ok(None) => Ok(None),
            Err(e) => {
                log::debug!("Failed to extract ICC profile from PNG: {e}");
                Ok(None)
            },
        }
    }
}

/// ICC profile embedder for output images
pub struct ProfileEmbedder;

impl ProfileEmbedder {
    /// Encode `image` to `output_path` with the profile blob embedded
    ///
    /// Uses the standardized `ImageEncoder::set_icc_profile()` method. An
    /// encoder that rejects the profile logs a debug message and writes the
    /// image without it rather than failing the save.
    ///
    /// # Errors
    /// File creation or image encoding failures.
    pub fn embed_in_output<P: AsRef<Path>>(
        image: &image::DynamicImage,
        profile: &ColorProfile,
        output_path: P,
        format: image::ImageFormat,
        quality: u8,
    ) -> Result<()> {
        use image::{ExtendedColorType, ImageEncoder};
        use std::io::BufWriter;

        let output_path = output_path.as_ref();
        let file = File::create(output_path)
            .map_err(|e| CutoutError::file_io_error("create output file", output_path, &e))?;
        let writer = BufWriter::new(file);

        match format {
            image::ImageFormat::Jpeg => {
                let rgb_image = image.to_rgb8();
                let mut encoder =
                    image::codecs::jpeg::JpegEncoder::new_with_quality(writer, quality);

                if let Some(icc_data) = &profile.icc_data {
                    if let Err(e) = encoder.set_icc_profile(icc_data.clone()) {
                        log::debug!("Failed to embed ICC profile in JPEG: {e}");
                    }
                }

                encoder.write_image(
                    rgb_image.as_raw(),
                    rgb_image.width(),
                    rgb_image.height(),
                    ExtendedColorType::Rgb8,
                )?;
            },
            image::ImageFormat::Png => {
                let rgb_image = image.to_rgb8();
                let mut encoder = image::codecs::png::PngEncoder::new(writer);

                if let Some(icc_data) = &profile.icc_data {
                    if let Err(e) = encoder.set_icc_profile(icc_data.clone()) {
                        log::debug!("Failed to embed ICC profile in PNG: {e}");
                    }
                }

                encoder.write_image(
                    rgb_image.as_raw(),
                    rgb_image.width(),
                    rgb_image.height(),
                    ExtendedColorType::Rgb8,
                )?;
            },
            other => {
                return Err(CutoutError::invalid_input(format!(
                    "Unsupported output format: {other:?}"
                )));
            },
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageBuffer, Rgb};
    use tempfile::TempDir;

    fn test_image() -> DynamicImage {
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_pixel(8, 8, Rgb([120, 90, 60]));
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_profile_presence() {
        assert!(!ColorProfile::none().is_present());
        assert!(!ColorProfile::from_icc_data(vec![]).is_present());

        let profile = ColorProfile::from_icc_data(vec![1, 2, 3]);
        assert!(profile.is_present());
        assert_eq!(profile.len(), 3);
    }

    #[test]
    fn test_extract_from_plain_jpeg_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("plain.jpg");
        test_image().save(&path).unwrap();

        let profile = ProfileExtractor::extract_from_image(&path).unwrap();
        assert!(profile.is_none());
    }

    #[test]
    fn test_extract_unsupported_extension_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("image.bmp");
        // Never opened; unsupported extensions short-circuit to None.
        let profile = ProfileExtractor::extract_from_image(&path).unwrap();
        assert!(profile.is_none());
    }

    #[test]
    fn test_embed_roundtrip_through_jpeg() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("out.jpg");
        let profile = ColorProfile::from_icc_data(b"fake-icc-payload".to_vec());

        ProfileEmbedder::embed_in_output(
            &test_image(),
            &profile,
            &path,
            image::ImageFormat::Jpeg,
            90,
        )
        .unwrap();

        let extracted = ProfileExtractor::extract_from_image(&path).unwrap();
        assert_eq!(extracted, Some(profile));
    }

    #[test]
    fn test_embed_without_profile_still_writes() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("noicc.png");

        ProfileEmbedder::embed_in_output(
            &test_image(),
            &ColorProfile::none(),
            &path,
            image::ImageFormat::Png,
            100,
        )
        .unwrap();

        assert!(path.exists());
        assert!(ProfileExtractor::extract_from_image(&path)
            .unwrap()
            .is_none());
    }
}
