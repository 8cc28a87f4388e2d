//! HTTP layer: axum router, upload handler, static retrieval and middleware.
//!
//! ## Routes
//!
//! ```text
//! POST    {uploadRoute}, {uploadRoute}/   multipart upload → plain-text URL
//! OPTIONS {uploadRoute}, {uploadRoute}/   CORS preflight
//! GET     /img/{file}                     stored asset from imageDirectory
//! ```
//!
//! Upload routes answer any origin (`Access-Control-Allow-Origin: *`). The
//! shared `key` is the only thing standing between the internet and the
//! storage directory, so treat it as a credential.

use crate::guard;
use crate::imaging::{ImageBackend, RustBackend};
use crate::naming;
use crate::pipeline::{ImageField, Pipeline, UploadError, UploadRequest, log_failure};
use axum::Router;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{ConnectInfo, DefaultBodyLimit, Multipart, Path, Request, State};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    CONTENT_TYPE,
};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use image::ImageFormat;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

/// URL prefix under which stored assets are served.
pub const STATIC_PREFIX: &str = "/img";

const CORS_ALLOW_METHODS: &str = "POST, OPTIONS";
const CORS_ALLOW_HEADERS: &str =
    "Accept, Content-Type, Content-Length, Accept-Encoding, X-CSRF-Token, Authorization";

impl UploadError {
    /// Message sent to the caller. Server-side details stay in the log.
    fn public_message(&self) -> String {
        match self {
            UploadError::Encode { .. } => "Could not encode image file".to_string(),
            UploadError::Storage { asset, .. } => format!("Could not write {asset} file"),
            UploadError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        (self.status(), self.public_message()).into_response()
    }
}

/// Build the application router around a shared pipeline.
pub fn build_router<B: ImageBackend + 'static>(pipeline: Arc<Pipeline<B>>) -> Router {
    let config = pipeline.config();
    let upload_methods = post(upload::<B>).fallback(method_not_allowed);

    let mut uploads = Router::new();
    for route in config.upload_routes() {
        uploads = uploads.route(&route, upload_methods.clone());
    }
    let uploads = uploads
        .layer(middleware::from_fn(cors))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes));

    Router::new()
        .merge(uploads)
        .route(&format!("{STATIC_PREFIX}/{{file}}"), get(serve_asset::<B>))
        .layer(middleware::from_fn(log_requests))
        .with_state(pipeline)
}

/// Bind the configured port and serve until Ctrl-C.
pub async fn serve(pipeline: Arc<Pipeline<RustBackend>>) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], pipeline.config().port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "imghost listening");

    let app = build_router(pipeline).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

/// `POST` on the upload routes.
async fn upload<B: ImageBackend + 'static>(
    State(pipeline): State<Arc<Pipeline<B>>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<String, UploadError> {
    let caller = addr.to_string();

    // Reject disallowed callers before buffering their body
    if let Err(denial) = guard::check_caller(&caller, pipeline.config()) {
        let err = UploadError::from(denial);
        log_failure(&caller, &err);
        return Err(err);
    }

    let limit = pipeline.config().max_upload_bytes;
    let (key, image) = match multipart {
        Ok(multipart) => read_form(multipart, limit).await,
        Err(rejection) => (None, ImageField::Unreadable(rejection.body_text())),
    };

    // The limit tripped before the key could be read
    if let (None, ImageField::TooLarge { limit }) = (&key, &image) {
        let err = UploadError::TooLarge { limit: *limit };
        log_failure(&caller, &err);
        return Err(err);
    }

    let request = UploadRequest {
        caller: caller.clone(),
        key,
        image,
    };
    let stored = tokio::task::spawn_blocking(move || pipeline.run(request))
        .await
        .map_err(|e| {
            let err = UploadError::Internal(e.to_string());
            log_failure(&caller, &err);
            err
        })??;

    Ok(stored.url)
}

/// Collect the `key` and `image` fields. Other fields are skipped.
async fn read_form(mut multipart: Multipart, limit: usize) -> (Option<String>, ImageField) {
    let mut key = None;
    let mut image = ImageField::Missing;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                image = field_error(e, limit);
                break;
            }
        };

        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("key") => match field.text().await {
                Ok(text) => key = Some(text),
                Err(e) => {
                    image = field_error(e, limit);
                    break;
                }
            },
            Some("image") => {
                let file_name = field.file_name().map(str::to_owned);
                match field.bytes().await {
                    Ok(bytes) => {
                        image = ImageField::Present {
                            file_name,
                            bytes: bytes.to_vec(),
                        }
                    }
                    Err(e) => {
                        image = field_error(e, limit);
                        break;
                    }
                }
            }
            _ => {}
        }
    }

    (key, image)
}

fn field_error(err: MultipartError, limit: usize) -> ImageField {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ImageField::TooLarge { limit }
    } else {
        ImageField::Unreadable(err.body_text())
    }
}

/// Any other method on the upload routes.
async fn method_not_allowed(ConnectInfo(addr): ConnectInfo<SocketAddr>) -> UploadError {
    let err = UploadError::MethodNotAllowed;
    log_failure(&addr.to_string(), &err);
    err
}

/// `GET /img/{file}`: serve a stored asset.
async fn serve_asset<B: ImageBackend + 'static>(
    State(pipeline): State<Arc<Pipeline<B>>>,
    Path(file): Path<String>,
) -> Response {
    if !naming::is_asset_file_name(&file) {
        return (StatusCode::NOT_FOUND, "Not found").into_response();
    }

    let path = pipeline.config().image_directory.join(&file);
    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let mime = ImageFormat::from_path(&path)
                .map(|f| f.to_mime_type())
                .unwrap_or("application/octet-stream");
            ([(CONTENT_TYPE, mime)], bytes).into_response()
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            (StatusCode::NOT_FOUND, "Not found").into_response()
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Could not read stored file");
            (StatusCode::INTERNAL_SERVER_ERROR, "Could not read file").into_response()
        }
    }
}

/// CORS for the upload routes; preflight requests are answered directly.
async fn cors(request: Request, next: Next) -> Response {
    let mut response = if request.method() == Method::OPTIONS {
        StatusCode::OK.into_response()
    } else {
        next.run(request).await
    };

    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(CORS_ALLOW_METHODS),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(CORS_ALLOW_HEADERS),
    );
    response
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let start = Instant::now();

    let response = next.run(request).await;

    tracing::info!(
        %method,
        %path,
        status = response.status().as_u16(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Request processed"
    );
    response
}
