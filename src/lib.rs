//! # imghost
//!
//! A small self-hosted image upload service. Allowlisted callers holding a
//! shared secret POST an image; the server normalises it to one configured
//! size and format, stores it under a random name and answers with its
//! public URL.
//!
//! # Architecture: One Request, One Pass
//!
//! Each upload runs straight through a fixed sequence of steps. The first
//! failing step ends the request with its own HTTP status:
//!
//! ```text
//! 1. Guard     caller IP allowlist, then shared secret    (403 / 401)
//! 2. Extract   multipart `image` field, size limit         (400 / 413)
//! 3. Decode    bytes → raster                              (422)
//! 4. Derive    resize to cover, centre crop                (422)
//! 5. Store     encode, write under a fresh UUID name       (500)
//! 6. Thumbnail optional 64×64 derived from the crop        (500)
//! ```
//!
//! Nothing is shared between requests except the read-only [`config::Config`]
//! and the image backend, so uploads run concurrently without locks. Image
//! work happens on Tokio's blocking pool; the async side only moves bytes.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`server`] | axum router: upload route, CORS preflight, static `/img/{file}` retrieval |
//! | [`pipeline`] | Runs one upload through guard, decode, derive and store; maps failures to statuses |
//! | [`guard`] | IP allowlist and constant-time shared-secret check |
//! | [`imaging`] | Pure-Rust image operations: decode, cover-resize, centre crop, encode |
//! | [`naming`] | UUID-based asset names and the filename check used by static retrieval |
//! | [`config`] | JSON config loading, defaults, first-run bootstrap and validation |
//! | [`logging`] | Console plus rotated log file via `tracing` |
//!
//! # Design Decisions
//!
//! ## Cover, Then Crop
//!
//! Every upload is scaled so it covers the configured resize box on the
//! constraining axis, with aspect ratio preserved, and the crop box is then
//! taken from the centre. Whatever the input shape, the stored image always has
//! exactly the crop dimensions. The geometry lives in pure functions
//! ([`imaging::plan_resize`], [`imaging::plan_crop`]) so it can be tested
//! without touching pixels.
//!
//! ## Swappable Backend
//!
//! Pixel work goes through the [`imaging::ImageBackend`] trait. Production uses
//! [`imaging::RustBackend`] (the `image` crate, Lanczos3 resampling); tests
//! substitute a recording mock to assert exactly which operations an upload
//! performed without encoding anything.
//!
//! ## Never Overwrite
//!
//! Stored names are random v4 UUIDs and files are created with `create_new`, so
//! a collision fails loudly instead of clobbering an existing asset. If the
//! thumbnail cannot be written the primary is removed again, so a failed
//! request leaves nothing behind.

pub mod config;
pub mod guard;
pub mod imaging;
pub mod logging;
pub mod naming;
pub mod pipeline;
pub mod server;

#[cfg(test)]
pub(crate) mod test_helpers;
