//! Server configuration module.
//!
//! Handles creating, loading and validating `config.json`. The file is read
//! once at startup; the resulting [`Config`] is immutable and shared by every
//! request handler.
//!
//! ## First Run
//!
//! When the config file does not exist it is written out with the stock
//! defaults below and the server starts with them. Edit the file and restart
//! to change anything.
//!
//! ## Configuration Options
//!
//! ```json
//! {
//!   "secretKey": "your-secret-key",       // value the `key` form field must match
//!   "imageDirectory": "images",           // where derived images are written
//!   "imageUrl": "http://localhost:39716/img", // public base URL of imageDirectory
//!   "port": 39716,                        // listen port (a string is accepted too)
//!   "resizeWidth": 512,                   // cover-resize target, at most 64 Mi pixels
//!   "resizeHeight": 512,
//!   "cropWidth": 512,                     // center crop, must fit inside the resize target
//!   "cropHeight": 512,
//!   "imageFormat": "png",                 // png, jpeg (or jpg), webp or gif
//!   "uploadRoute": "/upload",             // also served with a trailing slash
//!   "allowedIPs": ["127.0.0.1"],          // caller allowlist, used when checkIP is on
//!   "logFilePath": "imghost.log",
//!   "generateThumbnails": true,           // also write a 64x64 `_thumbnail` variant
//!   "checkIP": true,
//!   "maxUploadBytes": 20971520            // request body limit
//! }
//! ```
//!
//! Every key is optional; missing keys take the default. Unknown keys are
//! rejected to catch typos early.
//!
//! `imageFormat` is case-insensitive and normalised: stored files take the
//! canonical extension of the format, so `"jpeg"`, `"jpg"` and `"JPEG"` all
//! produce `{id}.jpg`, and the format is written back as `"jpg"`.

use crate::imaging::{DeriveTarget, MAX_RESIZE_PIXELS, OutputFormat, pixel_count};
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Config file name used when none is given on the command line.
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Secret written into a freshly generated config.
pub const PLACEHOLDER_SECRET: &str = "your-secret-key";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Server configuration loaded from `config.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct Config {
    /// Shared secret every upload must present in its `key` field.
    pub secret_key: String,
    /// Directory derived images are written to.
    pub image_directory: PathBuf,
    /// Public base URL under which `image_directory` is reachable.
    pub image_url: String,
    /// TCP port to listen on.
    #[serde(deserialize_with = "deserialize_port")]
    pub port: u16,
    pub resize_width: u32,
    pub resize_height: u32,
    pub crop_width: u32,
    pub crop_height: u32,
    /// Encoding of every stored asset.
    pub image_format: OutputFormat,
    /// Path of the upload endpoint.
    pub upload_route: String,
    /// Caller addresses allowed to upload when `check_ip` is on.
    #[serde(rename = "allowedIPs")]
    pub allowed_ips: Vec<String>,
    pub log_file_path: PathBuf,
    pub generate_thumbnails: bool,
    #[serde(rename = "checkIP")]
    pub check_ip: bool,
    /// Largest accepted request body, in bytes.
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            secret_key: PLACEHOLDER_SECRET.to_string(),
            image_directory: PathBuf::from("images"),
            image_url: "http://localhost:39716/img".to_string(),
            port: 39716,
            resize_width: 512,
            resize_height: 512,
            crop_width: 512,
            crop_height: 512,
            image_format: OutputFormat::Png,
            upload_route: "/upload".to_string(),
            allowed_ips: vec!["127.0.0.1".to_string()],
            log_file_path: PathBuf::from("imghost.log"),
            generate_thumbnails: true,
            check_ip: true,
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

/// Accept the port as a JSON number or, as older config files have it, a string.
fn deserialize_port<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Number(u16),
        Text(String),
    }

    match Port::deserialize(deserializer)? {
        Port::Number(port) => Ok(port),
        Port::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid port '{text}'"))),
    }
}

impl Config {
    /// Validate config values are usable.
    ///
    /// Crop targets larger than the resize targets are rejected here rather
    /// than clamped per request.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret_key.is_empty() {
            return Err(ConfigError::Validation("secretKey must not be empty".into()));
        }
        if self.resize_width == 0 || self.resize_height == 0 {
            return Err(ConfigError::Validation(
                "resizeWidth and resizeHeight must be non-zero".into(),
            ));
        }
        if self.crop_width == 0 || self.crop_height == 0 {
            return Err(ConfigError::Validation(
                "cropWidth and cropHeight must be non-zero".into(),
            ));
        }
        if self.crop_width > self.resize_width || self.crop_height > self.resize_height {
            return Err(ConfigError::Validation(format!(
                "crop {}x{} must fit inside resize {}x{}",
                self.crop_width, self.crop_height, self.resize_width, self.resize_height
            )));
        }
        if pixel_count((self.resize_width, self.resize_height)) > MAX_RESIZE_PIXELS {
            return Err(ConfigError::Validation(format!(
                "resize {}x{} exceeds the {MAX_RESIZE_PIXELS} pixel budget",
                self.resize_width, self.resize_height
            )));
        }
        if !self.upload_route.starts_with('/') {
            return Err(ConfigError::Validation(
                "uploadRoute must start with '/'".into(),
            ));
        }
        if self.image_url.trim().is_empty() {
            return Err(ConfigError::Validation("imageUrl must not be empty".into()));
        }
        if self.image_directory.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "imageDirectory must not be empty".into(),
            ));
        }
        if self.check_ip && self.allowed_ips.is_empty() {
            return Err(ConfigError::Validation(
                "allowedIPs must not be empty when checkIP is enabled".into(),
            ));
        }
        if self.max_upload_bytes == 0 {
            return Err(ConfigError::Validation(
                "maxUploadBytes must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Geometry of the primary derived image.
    pub fn primary_target(&self) -> DeriveTarget {
        DeriveTarget {
            resize: (self.resize_width, self.resize_height),
            crop: (self.crop_width, self.crop_height),
        }
    }

    /// Public URL of a stored file.
    pub fn public_url(&self, file_name: &str) -> String {
        format!("{}/{}", self.image_url.trim_end_matches('/'), file_name)
    }

    /// The upload route and its trailing-slash variant.
    pub fn upload_routes(&self) -> Vec<String> {
        let base = self.upload_route.trim_end_matches('/');
        if base.is_empty() {
            return vec!["/".to_string()];
        }
        vec![base.to_string(), format!("{base}/")]
    }

    /// Whether the secret is still the one written on first run.
    pub fn uses_placeholder_secret(&self) -> bool {
        self.secret_key == PLACEHOLDER_SECRET
    }
}

/// Parse and validate a config from JSON text.
pub fn parse_config(json: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(json)?;
    config.validate()?;
    Ok(config)
}

/// Load and validate the config file at `path`.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Load the config at `path`, writing the stock config there first if the
/// file does not exist.
///
/// Returns the config and whether the file was created.
pub fn load_or_create(path: &Path) -> Result<(Config, bool), ConfigError> {
    if path.exists() {
        return Ok((load_config(path)?, false));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, stock_config_json())?;
    Ok((Config::default(), true))
}

/// The stock config as pretty-printed JSON.
///
/// Used for first-run bootstrapping and by the `gen-config` CLI command.
pub fn stock_config_json() -> String {
    let mut json =
        serde_json::to_string_pretty(&Config::default()).expect("default config must serialize");
    json.push('\n');
    json
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_passes_validation() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn defaults_match_stock_json() {
        let parsed = parse_config(&stock_config_json()).unwrap();
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn stock_json_uses_camel_case_keys() {
        let json = stock_config_json();
        for key in [
            "secretKey",
            "imageDirectory",
            "imageUrl",
            "port",
            "resizeWidth",
            "resizeHeight",
            "cropWidth",
            "cropHeight",
            "imageFormat",
            "uploadRoute",
            "allowedIPs",
            "logFilePath",
            "generateThumbnails",
            "checkIP",
            "maxUploadBytes",
        ] {
            assert!(json.contains(&format!("\"{key}\"")), "missing {key}");
        }
    }

    #[test]
    fn image_format_spellings_share_one_extension() {
        for spelling in ["jpeg", "jpg", "JPEG"] {
            let json = format!(r#"{{"imageFormat": "{spelling}"}}"#);
            let config = parse_config(&json).unwrap();
            assert_eq!(config.image_format.extension(), "jpg", "{spelling}");
            let written = serde_json::to_value(&config).unwrap();
            assert_eq!(written["imageFormat"], "jpg");
        }
    }

    #[test]
    fn parses_legacy_config_with_string_port() {
        let json = r#"{
            "secretKey": "s3cret",
            "imageDirectory": "/srv/img",
            "imageUrl": "https://img.example.com/i/",
            "port": "8080",
            "resizeWidth": 800,
            "resizeHeight": 600,
            "cropWidth": 400,
            "cropHeight": 400,
            "imageFormat": "jpeg",
            "uploadRoute": "/up",
            "allowedIPs": ["10.0.0.1", "10.0.0.2"],
            "logFilePath": "up.log",
            "generateThumbnails": false,
            "checkIP": false
        }"#;

        let config = parse_config(json).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.image_format, OutputFormat::Jpeg);
        assert_eq!(config.allowed_ips, vec!["10.0.0.1", "10.0.0.2"]);
        assert!(!config.check_ip);
        assert!(!config.generate_thumbnails);
        // Not present in the file → default
        assert_eq!(config.max_upload_bytes, Config::default().max_upload_bytes);
    }

    #[test]
    fn numeric_port_accepted() {
        let config = parse_config(r#"{"port": 9000}"#).unwrap();
        assert_eq!(config.port, 9000);
    }

    #[test]
    fn invalid_port_string_rejected() {
        assert!(matches!(
            parse_config(r#"{"port": "eighty"}"#),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn unknown_key_rejected() {
        let result = parse_config(r#"{"secretKye": "typo"}"#);
        assert!(matches!(result, Err(ConfigError::Json(_))));
    }

    #[test]
    fn unknown_image_format_rejected() {
        let err = parse_config(r#"{"imageFormat": "bmp"}"#).unwrap_err();
        assert!(err.to_string().contains("bmp"));
    }

    #[test]
    fn invalid_json_is_error() {
        assert!(matches!(
            parse_config("{ not json"),
            Err(ConfigError::Json(_))
        ));
    }

    // =========================================================================
    // Validation tests
    // =========================================================================

    #[test]
    fn validate_crop_wider_than_resize() {
        let config = Config {
            crop_width: 600,
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("crop 600x512"));
    }

    #[test]
    fn validate_crop_taller_than_resize() {
        let config = Config {
            resize_height: 300,
            crop_height: 301,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_crop_smaller_than_resize_ok() {
        let config = Config {
            resize_width: 800,
            resize_height: 600,
            crop_width: 300,
            crop_height: 600,
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_resize_over_pixel_budget() {
        let config = Config {
            resize_width: 9000,
            resize_height: 9000,
            crop_width: 9000,
            crop_height: 9000,
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("pixel budget"), "{err}");
    }

    #[test]
    fn validated_resize_always_plans() {
        // A source already at the target size is the smallest cover-resize;
        // any config that validates must be able to plan it.
        let config = Config {
            resize_width: 8192,
            resize_height: 8192,
            crop_width: 8192,
            crop_height: 8192,
            ..Config::default()
        };
        assert!(config.validate().is_ok());
        assert!(crate::imaging::plan_derive((8192, 8192), &config.primary_target()).is_ok());
    }

    #[test]
    fn validate_zero_dimensions() {
        let config = Config {
            resize_width: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            crop_height: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_empty_secret() {
        let config = Config {
            secret_key: String::new(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_route_needs_leading_slash() {
        let config = Config {
            upload_route: "upload".into(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_empty_allowlist_only_matters_with_ip_check() {
        let mut config = Config {
            allowed_ips: Vec::new(),
            ..Config::default()
        };
        assert!(config.validate().is_err());

        config.check_ip = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(&path, r#"{"cropWidth": 1024}"#).unwrap();

        assert!(matches!(
            load_config(&path),
            Err(ConfigError::Validation(_))
        ));
    }

    // =========================================================================
    // load_or_create tests
    // =========================================================================

    #[test]
    fn load_or_create_writes_defaults_when_missing() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/config.json");

        let (config, created) = load_or_create(&path).unwrap();
        assert!(created);
        assert_eq!(config, Config::default());
        assert!(path.exists());

        // Second run reads the file back instead of rewriting it
        let (again, created) = load_or_create(&path).unwrap();
        assert!(!created);
        assert_eq!(again, config);
    }

    #[test]
    fn load_or_create_keeps_existing_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(&path, r#"{"secretKey": "mine", "port": 1234}"#).unwrap();

        let (config, created) = load_or_create(&path).unwrap();
        assert!(!created);
        assert_eq!(config.secret_key, "mine");
        assert_eq!(config.port, 1234);
        assert_eq!(fs::read_to_string(&path).unwrap(), r#"{"secretKey": "mine", "port": 1234}"#);
    }

    // =========================================================================
    // Derived values
    // =========================================================================

    #[test]
    fn public_url_joins_without_double_slash() {
        let config = Config {
            image_url: "https://cdn.example.com/img/".into(),
            ..Config::default()
        };
        assert_eq!(
            config.public_url("abc.png"),
            "https://cdn.example.com/img/abc.png"
        );
    }

    #[test]
    fn upload_routes_include_trailing_slash_variant() {
        let config = Config::default();
        assert_eq!(config.upload_routes(), vec!["/upload", "/upload/"]);

        let config = Config {
            upload_route: "/api/upload/".into(),
            ..Config::default()
        };
        assert_eq!(config.upload_routes(), vec!["/api/upload", "/api/upload/"]);
    }

    #[test]
    fn root_upload_route_has_single_variant() {
        let config = Config {
            upload_route: "/".into(),
            ..Config::default()
        };
        assert_eq!(config.upload_routes(), vec!["/"]);
    }

    #[test]
    fn placeholder_secret_detected() {
        assert!(Config::default().uses_placeholder_secret());
        let config = Config {
            secret_key: "real".into(),
            ..Config::default()
        };
        assert!(!config.uses_placeholder_secret());
    }
}
