//! Pure calculation functions for image geometry.
//!
//! All functions here are pure and testable without any I/O or images.

/// Edge length of the square thumbnail derived from the cropped image.
pub const THUMBNAIL_EDGE: u32 = 64;

/// A crop rectangle in the coordinate space of the resized raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Calculate the resize dimensions that cover a target area.
///
/// The source aspect ratio is preserved. Width is matched first; if the
/// resulting height falls short of the target, height is matched instead
/// and width grows past the target. Either way both target dimensions are
/// met or exceeded.
///
/// # Arguments
/// * `source` - Decoded image dimensions (width, height), both non-zero
/// * `target` - Configured resize dimensions (width, height)
///
/// # Examples
/// ```
/// # use imghost::imaging::plan_resize;
/// // 4:3 landscape into a square target → height matches, width exceeds
/// assert_eq!(plan_resize((1024, 768), (512, 512)), (683, 512));
///
/// // 1:4 portrait into a square target → width matches, height exceeds
/// assert_eq!(plan_resize((200, 800), (512, 512)), (512, 2048));
/// ```
pub fn plan_resize(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    let aspect = src_w as f64 / src_h as f64;

    let w = tgt_w;
    let h = (w as f64 / aspect).round() as u32;
    if h >= tgt_h {
        return (w, h.max(1));
    }

    let h = tgt_h;
    let w = (h as f64 * aspect).round() as u32;
    (w.max(1), h)
}

/// Calculate a centered crop rectangle inside a resized raster.
///
/// Offsets use floor division, so an odd leftover pixel ends up on the
/// right or bottom edge.
///
/// Returns `None` when the crop does not fit, which cannot happen for a
/// resize planned by [`plan_resize`] against a validated config.
pub fn plan_crop(resized: (u32, u32), crop: (u32, u32)) -> Option<CropRect> {
    let (res_w, res_h) = resized;
    let (crop_w, crop_h) = crop;

    if crop_w > res_w || crop_h > res_h {
        return None;
    }

    Some(CropRect {
        x: (res_w - crop_w) / 2,
        y: (res_h - crop_h) / 2,
        width: crop_w,
        height: crop_h,
    })
}

/// Number of pixels in a planned raster, widened so it cannot overflow.
pub fn pixel_count(dims: (u32, u32)) -> u64 {
    dims.0 as u64 * dims.1 as u64
}
