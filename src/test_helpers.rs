//! Shared test utilities for the imghost test suite.
//!
//! Synthetic images, their encoded bytes, and a config pointed at a temp
//! storage directory.

use crate::config::Config;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::path::Path;

/// Secret used by [`test_config`].
pub const TEST_SECRET: &str = "test-secret";

/// Caller address on the default allowlist.
pub const LOCAL_CALLER: &str = "127.0.0.1:50000";

// =========================================================================
// Images
// =========================================================================

/// RGB image with `x` in the red channel and `y` in the green channel.
pub fn gradient_image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    }))
}

/// RGB image split into three horizontal bands: red above `top`, green
/// between `top` and `bottom`, blue below.
pub fn banded_image(width: u32, height: u32, top: u32, bottom: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |_, y| {
        if y < top {
            Rgb([255, 0, 0])
        } else if y < bottom {
            Rgb([0, 255, 0])
        } else {
            Rgb([0, 0, 255])
        }
    }))
}

/// Encode an image into memory in the given format.
pub fn encode_as(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    match format {
        ImageFormat::Gif => DynamicImage::ImageRgba8(img.to_rgba8())
            .write_to(&mut out, format)
            .unwrap(),
        _ => img.write_to(&mut out, format).unwrap(),
    }
    out.into_inner()
}

/// PNG bytes of a gradient image.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    encode_as(&gradient_image(width, height), ImageFormat::Png)
}

// =========================================================================
// Config
// =========================================================================

/// Default config writing into `dir`, with a known secret and thumbnails off.
pub fn test_config(dir: &Path) -> Config {
    Config {
        secret_key: TEST_SECRET.to_string(),
        image_directory: dir.to_path_buf(),
        image_url: "http://img.test/img".to_string(),
        generate_thumbnails: false,
        ..Config::default()
    }
}

/// Names of all files in `dir`, sorted.
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
