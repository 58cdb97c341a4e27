//! On-disk storage for captured photos.
//!
//! The camera front end sends `data:image/<type>;base64,<payload>` URLs. The
//! payload is decoded and written verbatim; pixel content is never inspected.
//! Callers get back a relative, forward-slash reference such as
//! `2025-10-28/P3_s12345_01930c1e....png` to persist alongside the record.

use std::path::{Component, Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{HallPassError, Result};

const DATA_URL_PREFIX: &str = "data:image/";

/// A decoded image data URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    /// File extension derived from the media type.
    pub extension: &'static str,
    /// Raw image bytes.
    pub bytes: Vec<u8>,
}

/// Decode an image data URL.
///
/// # Errors
///
/// Returns [`HallPassError::InvalidPhoto`] if the string is not a base64
/// image data URL or the payload is empty.
pub fn decode_data_url(data_url: &str) -> Result<DecodedImage> {
    let rest = data_url
        .strip_prefix(DATA_URL_PREFIX)
        .ok_or_else(|| HallPassError::InvalidPhoto("expected a data:image/ URL".into()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| HallPassError::InvalidPhoto("data URL has no payload".into()))?;
    let (media, encoding) = header.split_once(';').unwrap_or((header, ""));
    if encoding != "base64" {
        return Err(HallPassError::InvalidPhoto(
            "only base64 data URLs are supported".into(),
        ));
    }

    let extension = match media.to_ascii_lowercase().as_str() {
        "png" => "png",
        "jpeg" | "jpg" => "jpg",
        "webp" => "webp",
        "gif" => "gif",
        other => {
            return Err(HallPassError::InvalidPhoto(format!(
                "unsupported image type image/{other}"
            )))
        }
    };

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| HallPassError::InvalidPhoto(format!("payload is not base64: {e}")))?;
    if bytes.is_empty() {
        return Err(HallPassError::InvalidPhoto("empty image payload".into()));
    }

    Ok(DecodedImage { extension, bytes })
}

/// Keep only characters that are safe in a file name.
fn sanitize(part: &str) -> String {
    part.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
        .collect()
}

/// Writes photos below a root directory.
#[derive(Debug, Clone)]
pub struct PhotoStore {
    root: PathBuf,
}

impl PhotoStore {
    /// Create a store rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write a decoded image to `<root>/<folder>/<prefix>_<uuid>.<ext>` and
    /// return the reference relative to the root.
    ///
    /// # Errors
    ///
    /// Returns [`HallPassError::IoError`] if the file cannot be written.
    pub fn write(&self, folder: &str, prefix: &str, image: &DecodedImage) -> Result<String> {
        let folder = sanitize(folder);
        let file_name = format!(
            "{}_{}.{}",
            sanitize(prefix),
            Uuid::now_v7().simple(),
            image.extension
        );

        let dir = self.root.join(&folder);
        std::fs::create_dir_all(&dir)?;
        std::fs::write(dir.join(&file_name), &image.bytes)?;

        let reference = if folder.is_empty() {
            file_name
        } else {
            format!("{folder}/{file_name}")
        };
        debug!(photo = %reference, bytes = image.bytes.len(), "Stored photo");
        Ok(reference)
    }

    /// Absolute path of a stored reference, or `None` if the reference tries
    /// to leave the root.
    #[must_use]
    pub fn resolve(&self, reference: &str) -> Option<PathBuf> {
        let relative = Path::new(reference);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        safe.then(|| self.root.join(relative))
    }

    /// Delete a stored photo. Failures are logged, not returned.
    pub fn remove(&self, reference: &str) {
        let Some(path) = self.resolve(reference) else {
            return;
        };
        if let Err(e) = std::fs::remove_file(&path) {
            warn!(photo = %reference, error = %e, "Failed to remove photo");
        }
    }
}
