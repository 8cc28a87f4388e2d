//! Asset naming.
//!
//! Every accepted upload gets a fresh random identifier. The caller's
//! filename is never part of it, so an upload can neither escape the
//! storage directory nor land on top of an existing asset.
//!
//! ## File names
//!
//! For identifier `3f2b…` and output format `png`:
//! - `3f2b….png`: the primary asset
//! - `3f2b…_thumbnail.png`: the optional thumbnail

use crate::imaging::OutputFormat;
use std::fmt;
use uuid::Uuid;

const THUMBNAIL_SUFFIX: &str = "_thumbnail";

/// Random identifier naming one stored upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AssetId(Uuid);

impl AssetId {
    /// Generate a new identifier from a v4 UUID.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// File name of the primary asset.
    pub fn file_name(&self, format: OutputFormat) -> String {
        format!("{}.{}", self, format.extension())
    }

    /// File name of the thumbnail.
    pub fn thumbnail_file_name(&self, format: OutputFormat) -> String {
        format!("{}{}.{}", self, THUMBNAIL_SUFFIX, format.extension())
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Whether `name` is a plain file name that could have been produced here.
///
/// Used to sanitise static retrieval requests: only ASCII alphanumerics,
/// `-`, `_` and a single `.` extension separator, nothing hidden.
pub fn is_asset_file_name(name: &str) -> bool {
    let Some((stem, ext)) = name.split_once('.') else {
        return false;
    };
    !stem.is_empty()
        && !ext.is_empty()
        && stem
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        && ext.chars().all(|c| c.is_ascii_alphanumeric())
}
