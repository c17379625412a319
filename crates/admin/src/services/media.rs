//! Product image storage on local disk.
//!
//! Files are written under the configured media directory with a random
//! UUID name and served back at [`MEDIA_URL_PREFIX`].

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use uuid::Uuid;

/// URL path the media directory is served under.
pub const MEDIA_URL_PREFIX: &str = "/media";

/// Largest accepted image.
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Accepted image content types and the extension stored for each.
const IMAGE_TYPES: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
];

/// Errors from storing or removing media files.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("file is larger than {} MiB", MAX_IMAGE_BYTES / 1024 / 1024)]
    TooLarge,

    #[error("file is empty")]
    Empty,

    #[error("media storage error: {0}")]
    Io(#[from] io::Error),
}

/// Public URL of a stored file.
#[must_use]
pub fn media_url(file_name: &str) -> String {
    format!("{MEDIA_URL_PREFIX}/{file_name}")
}

/// Stored extension for an accepted content type.
#[must_use]
pub fn image_extension(content_type: &str) -> Option<&'static str> {
    let content_type = content_type.split(';').next().unwrap_or_default().trim();
    IMAGE_TYPES
        .iter()
        .find(|(ty, _)| ty.eq_ignore_ascii_case(content_type))
        .map(|(_, ext)| *ext)
}

/// Local directory holding product images.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    #[must_use]
    pub const fn new(root: PathBuf) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Check an upload before anything touches the disk.
    ///
    /// # Errors
    ///
    /// Returns `MediaError::UnsupportedType`, `MediaError::Empty` or
    /// `MediaError::TooLarge`.
    pub fn check(content_type: &str, len: usize) -> Result<&'static str, MediaError> {
        let extension = image_extension(content_type)
            .ok_or_else(|| MediaError::UnsupportedType(content_type.to_owned()))?;
        if len == 0 {
            return Err(MediaError::Empty);
        }
        if len > MAX_IMAGE_BYTES {
            return Err(MediaError::TooLarge);
        }
        Ok(extension)
    }

    /// Write an image and return its stored file name.
    ///
    /// # Errors
    ///
    /// Returns a validation error from [`MediaStore::check`] or
    /// `MediaError::Io` if the file cannot be written.
    pub async fn save_image(&self, content_type: &str, bytes: &[u8]) -> Result<String, MediaError> {
        let extension = Self::check(content_type, bytes.len())?;
        tokio::fs::create_dir_all(&self.root).await?;

        let file_name = format!("{}.{extension}", Uuid::new_v4());
        tokio::fs::write(self.root.join(&file_name), bytes).await?;

        tracing::debug!(file_name = %file_name, size = bytes.len(), "Stored media file");
        Ok(file_name)
    }

    /// Remove a stored file. A file that is already gone is not an error.
    ///
    /// # Errors
    ///
    /// Returns `MediaError::Io` for anything other than a missing file.
    pub async fn remove(&self, file_name: &str) -> Result<(), MediaError> {
        // Stored names never contain separators.
        if file_name.contains(['/', '\\']) || file_name.starts_with('.') {
            return Ok(());
        }
        match tokio::fs::remove_file(self.root.join(file_name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove several files, logging failures instead of stopping.
    pub async fn remove_all(&self, file_names: &[String]) {
        for file_name in file_names {
            if let Err(e) = self.remove(file_name).await {
                tracing::warn!(file_name = %file_name, error = %e, "Failed to remove media file");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_image_extension() {
        assert_eq!(image_extension("image/png"), Some("png"));
        assert_eq!(image_extension("IMAGE/JPEG"), Some("jpg"));
        assert_eq!(image_extension("image/webp; charset=binary"), Some("webp"));
        assert_eq!(image_extension("image/svg+xml"), None);
        assert_eq!(image_extension("application/pdf"), None);
    }

    #[test]
    fn test_check_limits() {
        assert!(matches!(
            MediaStore::check("image/png", 0),
            Err(MediaError::Empty)
        ));
        assert!(matches!(
            MediaStore::check("image/png", MAX_IMAGE_BYTES + 1),
            Err(MediaError::TooLarge)
        ));
        assert!(matches!(
            MediaStore::check("text/html", 10),
            Err(MediaError::UnsupportedType(_))
        ));
        assert_eq!(MediaStore::check("image/gif", MAX_IMAGE_BYTES).unwrap(), "gif");
    }

    #[tokio::test]
    async fn test_save_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path().join("media"));

        let name = store.save_image("image/png", b"\x89PNG").await.unwrap();
        assert!(name.ends_with(".png"));
        assert!(store.root().join(&name).exists());
        assert_eq!(media_url(&name), format!("/media/{name}"));

        store.remove(&name).await.unwrap();
        assert!(!store.root().join(&name).exists());
        store.remove(&name).await.unwrap();
    }

    #[tokio::test]
    async fn test_remove_ignores_paths() {
        let dir = tempfile::tempdir().unwrap();
        let outside = dir.path().join("keep.txt");
        std::fs::write(&outside, "x").unwrap();

        let store = MediaStore::new(dir.path().join("media"));
        store.remove("../keep.txt").await.unwrap();
        assert!(outside.exists());
    }
}
