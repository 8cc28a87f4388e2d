//! High-level image operations.
//!
//! These functions combine calculations with backend execution: plan the
//! geometry, then run resize and crop through the backend.

use super::backend::{BackendError, ImageBackend, Raster};
use super::calculations::{THUMBNAIL_EDGE, pixel_count, plan_crop, plan_resize};
use super::params::DerivePlan;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Largest intermediate raster the resize step may allocate.
///
/// Extreme aspect ratios blow the cover-resize up along one edge (a 16384x1
/// strip resized to cover 512x512 is 8 million pixels wide), so plans above
/// this are refused before any pixels are touched.
pub const MAX_RESIZE_PIXELS: u64 = 64 * 1024 * 1024;

/// Target geometry for a derived image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeriveTarget {
    /// Cover-resize target (width, height).
    pub resize: (u32, u32),
    /// Final crop (width, height), never larger than `resize`.
    pub crop: (u32, u32),
}

impl DeriveTarget {
    /// Square thumbnail target derived from an already cropped image.
    pub fn thumbnail() -> Self {
        Self {
            resize: (THUMBNAIL_EDGE, THUMBNAIL_EDGE),
            crop: (THUMBNAIL_EDGE, THUMBNAIL_EDGE),
        }
    }
}

/// Plan a derive operation without executing it.
pub fn plan_derive(source: (u32, u32), target: &DeriveTarget) -> Result<DerivePlan> {
    let resize = plan_resize(source, target.resize);
    if pixel_count(resize) > MAX_RESIZE_PIXELS {
        return Err(BackendError::Geometry(format!(
            "{}x{} source needs a {}x{} intermediate, over the {MAX_RESIZE_PIXELS} pixel budget",
            source.0, source.1, resize.0, resize.1
        )));
    }

    let crop = plan_crop(resize, target.crop).ok_or_else(|| {
        BackendError::Geometry(format!(
            "crop {}x{} does not fit resized {}x{}",
            target.crop.0, target.crop.1, resize.0, resize.1
        ))
    })?;

    Ok(DerivePlan { resize, crop })
}

/// Cover-resize and center-crop a raster to the target.
///
/// Returns the derived raster together with the plan that produced it.
pub fn derive(
    backend: &impl ImageBackend,
    raster: &Raster,
    target: &DeriveTarget,
) -> Result<(Raster, DerivePlan)> {
    let plan = plan_derive(raster.dimensions().as_tuple(), target)?;
    let resized = backend.resize(raster, plan.resize.0, plan.resize.1)?;
    let cropped = backend.crop(&resized, plan.crop)?;
    Ok((cropped, plan))
}
