//! Upload pipeline: from raw upload to stored derived images.
//!
//! One linear pass per request, stopping at the first failure:
//!
//! ```text
//! guard → extract → decode → plan → resize → crop → name → encode+write
//!                                                        └→ thumbnail (optional)
//! ```
//!
//! ## Output Structure
//!
//! ```text
//! images/
//! ├── 6f1c…-…-….png              # primary: cover-resized, center-cropped
//! └── 6f1c…-…-…_thumbnail.png    # 64x64, derived from the primary crop
//! ```
//!
//! Files are created with create-new semantics and never rewritten. If the
//! thumbnail cannot be produced the primary is deleted again, so a failed
//! request leaves nothing behind.
//!
//! The pipeline is synchronous and CPU-bound; the server runs it on the
//! blocking thread pool. [`Pipeline`] holds only read-only state and is
//! shared between all requests.

use crate::config::Config;
use crate::guard::{self, Denial};
use crate::imaging::{BackendError, DeriveTarget, Dimensions, ImageBackend, Raster, derive};
use crate::naming::AssetId;
use axum::http::StatusCode;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Invalid method")]
    MethodNotAllowed,
    #[error("Not allowed")]
    Forbidden,
    #[error("Invalid secret key")]
    Unauthorized,
    #[error("Could not get image file: {0}")]
    BadRequest(String),
    #[error("Upload exceeds the {limit} byte limit")]
    TooLarge { limit: usize },
    #[error("Could not read image file: {0}")]
    Unprocessable(#[source] BackendError),
    #[error("Could not encode {asset} image: {source}")]
    Encode {
        asset: &'static str,
        #[source]
        source: BackendError,
    },
    #[error("Could not write {asset} file {}: {source}", path.display())]
    Storage {
        asset: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Internal error: {0}")]
    Internal(String),
}

impl UploadError {
    /// HTTP status reported to the caller.
    pub fn status(&self) -> StatusCode {
        match self {
            UploadError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            UploadError::Forbidden => StatusCode::FORBIDDEN,
            UploadError::Unauthorized => StatusCode::UNAUTHORIZED,
            UploadError::BadRequest(_) => StatusCode::BAD_REQUEST,
            UploadError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            UploadError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            UploadError::Encode { .. }
            | UploadError::Storage { .. }
            | UploadError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Pipeline step that failed, for logs.
    pub fn step(&self) -> &'static str {
        match self {
            UploadError::MethodNotAllowed => "method",
            UploadError::Forbidden | UploadError::Unauthorized => "guard",
            UploadError::BadRequest(_) | UploadError::TooLarge { .. } => "extract",
            UploadError::Unprocessable(_) => "decode",
            UploadError::Encode { .. } => "encode",
            UploadError::Storage { .. } => "write",
            UploadError::Internal(_) => "internal",
        }
    }
}

impl From<Denial> for UploadError {
    fn from(denial: Denial) -> Self {
        match denial {
            Denial::Forbidden => UploadError::Forbidden,
            Denial::Unauthorized => UploadError::Unauthorized,
        }
    }
}

/// State of the `image` form field after reading the request body.
#[derive(Debug)]
pub enum ImageField {
    Missing,
    /// The body could not be read as multipart form data.
    Unreadable(String),
    /// The body hit the upload size limit.
    TooLarge { limit: usize },
    Present {
        /// Client-side filename. Logged, never used for paths.
        file_name: Option<String>,
        bytes: Vec<u8>,
    },
}

/// Everything the pipeline needs from one HTTP request.
#[derive(Debug)]
pub struct UploadRequest {
    /// Remote address, `ip:port`.
    pub caller: String,
    /// Value of the `key` form field.
    pub key: Option<String>,
    pub image: ImageField,
}

/// A successfully stored upload.
#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub id: AssetId,
    /// Public URL of the primary asset.
    pub url: String,
    pub primary: PathBuf,
    pub thumbnail: Option<PathBuf>,
    /// Dimensions of the primary asset.
    pub dimensions: Dimensions,
}

/// The upload pipeline with its read-only configuration and image backend.
pub struct Pipeline<B> {
    config: Arc<Config>,
    backend: B,
}

impl<B: ImageBackend> Pipeline<B> {
    pub fn new(config: Arc<Config>, backend: B) -> Self {
        Self { config, backend }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Run one upload through the pipeline.
    ///
    /// Every failure is logged with the caller and failing step before it
    /// is returned.
    pub fn run(&self, request: UploadRequest) -> Result<StoredUpload, UploadError> {
        let result = self.process(&request);
        if let Err(err) = &result {
            log_failure(&request.caller, err);
        }
        result
    }

    fn process(&self, request: &UploadRequest) -> Result<StoredUpload, UploadError> {
        let config = &self.config;

        guard::authorize(&request.caller, request.key.as_deref(), config)?;

        let (file_name, bytes) = match &request.image {
            ImageField::Present { file_name, bytes } => (file_name.as_deref(), bytes.as_slice()),
            ImageField::Missing => {
                return Err(UploadError::BadRequest("no image field".to_string()));
            }
            ImageField::Unreadable(reason) => {
                return Err(UploadError::BadRequest(reason.clone()));
            }
            ImageField::TooLarge { limit } => return Err(UploadError::TooLarge { limit: *limit }),
        };

        let raster = self
            .backend
            .decode(bytes)
            .map_err(UploadError::Unprocessable)?;
        let source = raster.dimensions();
        tracing::info!(
            caller = %request.caller,
            original_filename = file_name.unwrap_or("<none>"),
            width = source.width,
            height = source.height,
            bytes = bytes.len(),
            "Original image"
        );

        let (primary, plan) = derive(&self.backend, &raster, &config.primary_target())
            .map_err(UploadError::Unprocessable)?;
        tracing::debug!(
            resize_width = plan.resize.0,
            resize_height = plan.resize.1,
            crop_x = plan.crop.x,
            crop_y = plan.crop.y,
            "Planned geometry"
        );

        let id = AssetId::generate();
        let format = config.image_format;
        let primary_name = id.file_name(format);
        let primary_path = config.image_directory.join(&primary_name);

        let encoded = self
            .backend
            .encode(&primary, format)
            .map_err(|source| UploadError::Encode {
                asset: "primary",
                source,
            })?;
        write_new(&primary_path, &encoded).map_err(|source| UploadError::Storage {
            asset: "image",
            path: primary_path.clone(),
            source,
        })?;

        let thumbnail = if config.generate_thumbnails {
            match self.store_thumbnail(&primary, &id) {
                Ok(path) => Some(path),
                Err(err) => {
                    remove_orphan(&primary_path);
                    return Err(err);
                }
            }
        } else {
            None
        };

        let dimensions = primary.dimensions();
        tracing::info!(
            caller = %request.caller,
            final_filename = %primary_name,
            width = dimensions.width,
            height = dimensions.height,
            thumbnail = thumbnail.is_some(),
            "Stored image"
        );

        Ok(StoredUpload {
            id,
            url: config.public_url(&primary_name),
            primary: primary_path,
            thumbnail,
            dimensions,
        })
    }

    /// Derive, encode and write the thumbnail of an already cropped raster.
    fn store_thumbnail(&self, cropped: &Raster, id: &AssetId) -> Result<PathBuf, UploadError> {
        let format = self.config.image_format;
        let encode_err = |source| UploadError::Encode {
            asset: "thumbnail",
            source,
        };

        let (thumb, _) =
            derive(&self.backend, cropped, &DeriveTarget::thumbnail()).map_err(encode_err)?;
        let encoded = self.backend.encode(&thumb, format).map_err(encode_err)?;

        let path = self
            .config
            .image_directory
            .join(id.thumbnail_file_name(format));
        write_new(&path, &encoded).map_err(|source| UploadError::Storage {
            asset: "thumbnail",
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

/// Write `bytes` to a file that must not exist yet, flushing it to disk.
///
/// A failed write removes the partial file.
fn write_new(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    if let Err(e) = file.write_all(bytes).and_then(|()| file.sync_all()) {
        drop(file);
        let _ = fs::remove_file(path);
        return Err(e);
    }
    Ok(())
}

fn remove_orphan(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => tracing::warn!(path = %path.display(), "Removed primary image after thumbnail failure"),
        Err(e) => tracing::error!(
            path = %path.display(),
            error = %e,
            "Could not remove primary image after thumbnail failure"
        ),
    }
}

/// Log a terminal pipeline failure. Client mistakes are warnings, server
/// faults are errors.
pub fn log_failure(caller: &str, err: &UploadError) {
    let status = err.status().as_u16();
    if err.status().is_server_error() {
        tracing::error!(caller = %caller, step = err.step(), status, error = %err, "Upload failed");
    } else {
        tracing::warn!(caller = %caller, step = err.step(), status, error = %err, "Upload rejected");
    }
}
