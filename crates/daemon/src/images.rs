// Uploaded images: stored in an `images/` directory beside the documents and
// served back by name. Names are generated server-side; serving applies the
// same normalization and canonical-prefix check as document paths.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use quire_common::path::normalize_relative_path;
use tracing::{debug, warn};

use crate::error::{ImageError, NotFoundError, ValidationError};

/// Directory name, relative to the document root, holding uploads.
pub const IMAGES_DIR_NAME: &str = "images";

/// Accepted upload extensions, lowercase and without the dot.
pub const ALLOWED_IMAGE_EXTENSIONS: &[&str] =
    &["png", "jpg", "jpeg", "gif", "webp", "svg", "bmp", "ico"];

/// Largest accepted upload.
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

const FALLBACK_NAME: &str = "image.png";
const FALLBACK_STEM: &str = "image";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub filename: String,
    /// `images/<filename>`, usable as a markdown link target.
    pub relative_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServedImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Validate and store an upload under a sanitized, timestamped name.
    pub fn save(&self, original_name: Option<&str>, data: &[u8]) -> Result<StoredImage, ImageError> {
        let original_name =
            original_name.filter(|name| !name.trim().is_empty()).unwrap_or(FALLBACK_NAME);
        let base_name = original_name.rsplit(['/', '\\']).next().unwrap_or(original_name);
        let extension = accepted_extension(base_name)?;
        if data.is_empty() {
            return Err(ImageError::Empty);
        }
        if data.len() > MAX_IMAGE_BYTES {
            return Err(ImageError::TooLarge { limit: MAX_IMAGE_BYTES });
        }

        let filename = format!(
            "{}-{}.{extension}",
            sanitize_stem(base_name),
            Utc::now().format("%Y%m%d-%H%M%S-%6f")
        );
        fs::create_dir_all(&self.dir)
            .map_err(|source| ImageError::Io { path: self.dir.clone(), source })?;
        let destination = self.dir.join(&filename);
        self.write_atomically(&destination, data)
            .map_err(|source| ImageError::Io { path: destination.clone(), source })?;

        debug!(path = %destination.display(), bytes = data.len(), "image stored");
        Ok(StoredImage { relative_path: format!("{IMAGES_DIR_NAME}/{filename}"), filename })
    }

    /// Absolute path of a stored image. Rejects anything that normalizes or
    /// resolves outside the images directory.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, ImageError> {
        let normalized = normalize_relative_path(relative)?;
        let root = canonicalize_existing(&self.dir, &normalized)?;
        let resolved = canonicalize_existing(&root.join(&normalized), &normalized)?;

        if !resolved.starts_with(&root) {
            warn!(path = %normalized, "rejected image path outside images directory");
            return Err(ValidationError::OutsideRoot(normalized).into());
        }
        if !resolved.is_file() {
            return Err(NotFoundError { path: normalized }.into());
        }
        Ok(resolved)
    }

    pub fn load(&self, relative: &str) -> Result<ServedImage, ImageError> {
        let path = self.resolve(relative)?;
        let bytes = fs::read(&path).map_err(|source| ImageError::Io { path: path.clone(), source })?;
        let content_type = mime_guess::from_path(&path).first_or_octet_stream().to_string();
        Ok(ServedImage { bytes, content_type })
    }

    fn write_atomically(&self, destination: &Path, data: &[u8]) -> io::Result<()> {
        let mut temp = tempfile::Builder::new()
            .prefix(".upload-")
            .suffix(".tmp")
            .tempfile_in(&self.dir)?;
        temp.write_all(data)?;
        temp.as_file().sync_all()?;
        temp.persist(destination).map_err(|error| error.error)?;
        Ok(())
    }
}

fn accepted_extension(name: &str) -> Result<String, ImageError> {
    let extension = Path::new(name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    if ALLOWED_IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        Ok(extension)
    } else if extension.is_empty() {
        Err(ImageError::UnsupportedFormat("(missing extension)".to_string()))
    } else {
        Err(ImageError::UnsupportedFormat(format!(".{extension}")))
    }
}

/// Replace everything outside `[A-Za-z0-9_-]` with `-` and trim dashes.
fn sanitize_stem(name: &str) -> String {
    let stem = Path::new(name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let cleaned: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '-' })
        .collect();
    let cleaned = cleaned.trim_matches('-');
    if cleaned.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        cleaned.to_string()
    }
}

fn canonicalize_existing(path: &Path, requested: &str) -> Result<PathBuf, ImageError> {
    path.canonicalize().map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => NotFoundError { path: requested.to_string() }.into(),
        _ => ImageError::Io { path: path.to_path_buf(), source },
    })
}
