//! Image processing in pure Rust, entirely in memory.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` (PNG, JPEG, GIF, WebP) with decoder limits |
//! | **Cover resize** | `resize_exact` + Lanczos3 |
//! | **Center crop** | `crop_imm` |
//! | **Encode** | `image` encoders for the configured output format |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for resize and crop geometry (unit testable)
//! - **Parameters**: Output format and derive plans
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: Plan-then-execute functions combining calculations + backend

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend, Raster};
pub use calculations::{CropRect, THUMBNAIL_EDGE, pixel_count, plan_crop, plan_resize};
pub use operations::{DeriveTarget, MAX_RESIZE_PIXELS, derive, plan_derive};
pub use params::{DerivePlan, OutputFormat};
pub use rust_backend::RustBackend;
