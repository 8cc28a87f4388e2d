//! Pure Rust image processing backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (PNG, JPEG, GIF, WebP) | `image::ImageReader` with format sniffing and [`Limits`] |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` filter |
//! | Crop | `DynamicImage::crop_imm` |
//! | Encode → PNG / WebP / GIF | `DynamicImage::write_to` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` at quality 90 |

use super::backend::{BackendError, ImageBackend, Raster};
use super::calculations::CropRect;
use super::params::OutputFormat;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader, Limits};
use std::io::Cursor;

/// Formats accepted as uploads. GIFs decode to their first frame.
const ACCEPTED_INPUTS: &[ImageFormat] = &[
    ImageFormat::Png,
    ImageFormat::Jpeg,
    ImageFormat::Gif,
    ImageFormat::WebP,
];

/// Largest accepted edge of a decoded upload, in pixels.
pub const MAX_DECODE_EDGE: u32 = 16_384;

/// Upper bound on decoder allocations for a single upload.
pub const MAX_DECODE_ALLOC: u64 = 512 * 1024 * 1024;

const JPEG_QUALITY: u8 = 90;

/// Backend built on the `image` crate.
///
/// See the [module docs](self) for the crate-to-operation mapping.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

fn decode_limits() -> Limits {
    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_DECODE_EDGE);
    limits.max_image_height = Some(MAX_DECODE_EDGE);
    limits.max_alloc = Some(MAX_DECODE_ALLOC);
    limits
}

impl ImageBackend for RustBackend {
    fn decode(&self, bytes: &[u8]) -> Result<Raster, BackendError> {
        let mut reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| BackendError::Decode(e.to_string()))?;

        let format = reader
            .format()
            .ok_or_else(|| BackendError::Decode("unrecognized image format".to_string()))?;
        if !ACCEPTED_INPUTS.contains(&format) {
            return Err(BackendError::Decode(format!(
                "{format:?} uploads are not accepted"
            )));
        }

        reader.limits(decode_limits());
        let img = reader
            .decode()
            .map_err(|e| BackendError::Decode(e.to_string()))?;

        if img.width() == 0 || img.height() == 0 {
            return Err(BackendError::Decode("image has no pixels".to_string()));
        }
        Ok(Raster::new(img))
    }

    fn resize(&self, raster: &Raster, width: u32, height: u32) -> Result<Raster, BackendError> {
        let resized = raster
            .image()
            .resize_exact(width, height, FilterType::Lanczos3);
        Ok(Raster::new(resized))
    }

    fn crop(&self, raster: &Raster, rect: CropRect) -> Result<Raster, BackendError> {
        let dims = raster.dimensions();
        if rect.x + rect.width > dims.width || rect.y + rect.height > dims.height {
            return Err(BackendError::Geometry(format!(
                "crop {}x{}+{}+{} outside {}x{} raster",
                rect.width, rect.height, rect.x, rect.y, dims.width, dims.height
            )));
        }
        let cropped = raster
            .image()
            .crop_imm(rect.x, rect.y, rect.width, rect.height);
        Ok(Raster::new(cropped))
    }

    fn encode(&self, raster: &Raster, format: OutputFormat) -> Result<Vec<u8>, BackendError> {
        let img = raster.image();
        let mut out = Cursor::new(Vec::new());

        let result = match format {
            // JPEG has no alpha channel
            OutputFormat::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8())
                .write_with_encoder(JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY)),
            OutputFormat::WebP | OutputFormat::Gif => {
                DynamicImage::ImageRgba8(img.to_rgba8()).write_to(&mut out, format.image_format())
            }
            OutputFormat::Png => img.write_to(&mut out, ImageFormat::Png),
        };

        result.map_err(|e| BackendError::Encode(format!("{format} encode failed: {e}")))?;
        Ok(out.into_inner())
    }
}
