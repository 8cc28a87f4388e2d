//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the four operations the upload
//! pipeline needs: decode, resize, crop and encode. Everything works on an
//! in-memory [`Raster`]; nothing here touches the filesystem.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate. Tests use the recording `MockBackend` below.

use super::calculations::CropRect;
use super::params::OutputFormat;
use image::DynamicImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("unsupported or corrupt image: {0}")]
    Decode(String),
    #[error("encoding failed: {0}")]
    Encode(String),
    #[error("invalid geometry: {0}")]
    Geometry(String),
}

/// Pixel dimensions of a raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn as_tuple(self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// A decoded pixel grid owned by a single request.
#[derive(Debug, Clone)]
pub struct Raster(DynamicImage);

impl Raster {
    pub fn new(image: DynamicImage) -> Self {
        Self(image)
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.0.width(),
            height: self.0.height(),
        }
    }

    pub fn image(&self) -> &DynamicImage {
        &self.0
    }
}

/// Trait for image processing backends.
///
/// Implementations must be `Send + Sync`: one backend is shared by every
/// request handler.
pub trait ImageBackend: Send + Sync {
    /// Decode an uploaded byte stream. Unknown formats and truncated or
    /// corrupt data are a [`BackendError::Decode`].
    fn decode(&self, bytes: &[u8]) -> Result<Raster, BackendError>;

    /// Resize to exactly `width` x `height` with a smooth filter.
    fn resize(&self, raster: &Raster, width: u32, height: u32) -> Result<Raster, BackendError>;

    /// Cut `rect` out of the raster. The rect must lie inside it.
    fn crop(&self, raster: &Raster, rect: CropRect) -> Result<Raster, BackendError>;

    /// Encode to the given output format.
    fn encode(&self, raster: &Raster, format: OutputFormat) -> Result<Vec<u8>, BackendError>;
}
