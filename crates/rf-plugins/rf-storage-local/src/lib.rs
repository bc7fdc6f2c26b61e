//! # rf-storage-local
//! Local filesystem implementation of `MediaStore`.
//!
//! Files live under `root_path` at the relative path chosen by the caller
//! (`posts/<uuid>.<ext>`, `comments/<uuid>.<ext>`). Uploads are decoded once
//! before they hit the disk so that only real images are accepted.

use std::io::Cursor;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use image::ImageReader;
use rf_core::error::{AppError, Result};
use rf_core::traits::MediaStore;
use tokio::fs;

pub struct LocalMediaStore {
    /// Root directory for all uploads (e.g., "./data/media")
    root_path: PathBuf,
    /// Public URL prefix (e.g., "/media")
    url_prefix: String,
}

impl LocalMediaStore {
    pub fn new(root: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        let url_prefix = url_prefix.into().trim_end_matches('/').to_string();
        Self { root_path: root.into(), url_prefix }
    }

    pub fn root(&self) -> &Path {
        &self.root_path
    }

    /// Resolves a relative media path below the root, refusing anything that
    /// could escape it.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let safe = !path.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !safe {
            return Err(AppError::validation(format!("invalid media path: {path}")));
        }
        Ok(self.root_path.join(relative))
    }
}

/// Rejects bytes that do not decode as a supported image.
fn ensure_image(data: &[u8]) -> Result<()> {
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|err| AppError::Storage(format!("failed to read upload: {err}")))?;
    if reader.format().is_none() {
        return Err(AppError::validation("upload is not a recognised image format"));
    }
    reader
        .decode()
        .map_err(|err| AppError::validation(format!("upload is not a valid image: {err}")))?;
    Ok(())
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn store(&self, path: &str, data: Vec<u8>) -> Result<String> {
        let target = self.resolve(path)?;
        ensure_image(&data)?;

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|err| AppError::Storage(format!("failed to create {}: {err}", parent.display())))?;
        }
        fs::write(&target, &data)
            .await
            .map_err(|err| AppError::Storage(format!("failed to write {path}: {err}")))?;

        log::debug!("Stored {} bytes at {}", data.len(), target.display());
        Ok(self.url(path))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.url_prefix, path.trim_start_matches('/'))
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let target = self.resolve(path)?;
        fs::try_exists(&target)
            .await
            .map_err(|err| AppError::Storage(format!("failed to stat {path}: {err}")))
    }

    /// Removing a file that is already gone is not an error.
    async fn delete(&self, path: &str) -> Result<()> {
        let target = self.resolve(path)?;
        match fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(AppError::Storage(format!("failed to delete {path}: {err}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};

    fn png_bytes() -> Vec<u8> {
        let img = RgbImage::from_pixel(4, 4, image::Rgb([200, 30, 30]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn store(dir: &tempfile::TempDir) -> LocalMediaStore {
        LocalMediaStore::new(dir.path(), "/media/")
    }

    #[tokio::test]
    async fn test_store_then_delete() {
        let dir = tempfile::tempdir().unwrap();
        let media = store(&dir);

        let url = media.store("posts/abc.png", png_bytes()).await.unwrap();
        assert_eq!(url, "/media/posts/abc.png");
        assert!(dir.path().join("posts/abc.png").exists());
        assert!(media.exists("posts/abc.png").await.unwrap());

        media.delete("posts/abc.png").await.unwrap();
        assert!(!media.exists("posts/abc.png").await.unwrap());
        // second delete is a no-op
        media.delete("posts/abc.png").await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_non_image() {
        let dir = tempfile::tempdir().unwrap();
        let media = store(&dir);

        let err = media.store("posts/bad.png", b"definitely not a png".to_vec()).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
        assert!(!dir.path().join("posts/bad.png").exists());
    }

    #[tokio::test]
    async fn test_rejects_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        let media = store(&dir);

        for path in ["../outside.png", "/etc/passwd", "posts/../../x.png", ""] {
            let err = media.store(path, png_bytes()).await.unwrap_err();
            assert!(matches!(err, AppError::ValidationError(_)), "{path} accepted");
        }
        assert!(media.delete("../outside.png").await.is_err());
    }

    #[test]
    fn test_url_joins_prefix() {
        let media = LocalMediaStore::new("/tmp/unused", "https://cdn.example.com/media");
        assert_eq!(media.url("comments/x.jpg"), "https://cdn.example.com/media/comments/x.jpg");
    }
}
