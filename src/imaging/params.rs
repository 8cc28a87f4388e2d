//! Parameter types for image operations.
//!
//! These describe *what* to produce, not *how*. The
//! [`operations`](super::operations) module decides the geometry and the
//! [`backend`](super::backend) does the pixel work.
//!
//! ## Types
//!
//! - [`OutputFormat`]: the server-wide encoding for every stored asset.
//! - [`DerivePlan`]: resize dimensions plus the crop rectangle inside them.

use super::calculations::CropRect;
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Encoding used for every stored asset.
///
/// Chosen once in the config; callers never pick a format per upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OutputFormat {
    #[default]
    Png,
    Jpeg,
    WebP,
    Gif,
}

impl OutputFormat {
    /// File extension used when naming stored assets.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::WebP => "webp",
            OutputFormat::Gif => "gif",
        }
    }

    pub fn image_format(self) -> ImageFormat {
        match self {
            OutputFormat::Png => ImageFormat::Png,
            OutputFormat::Jpeg => ImageFormat::Jpeg,
            OutputFormat::WebP => ImageFormat::WebP,
            OutputFormat::Gif => ImageFormat::Gif,
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(OutputFormat::Png),
            "jpg" | "jpeg" => Ok(OutputFormat::Jpeg),
            "webp" => Ok(OutputFormat::WebP),
            "gif" => Ok(OutputFormat::Gif),
            other => Err(format!(
                "unsupported image format '{other}' (expected png, jpeg, webp or gif)"
            )),
        }
    }
}

impl TryFrom<String> for OutputFormat {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OutputFormat> for String {
    fn from(format: OutputFormat) -> Self {
        format.extension().to_string()
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Geometry for one derived image: resize to `resize`, then cut `crop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DerivePlan {
    pub resize: (u32, u32),
    pub crop: CropRect,
}
