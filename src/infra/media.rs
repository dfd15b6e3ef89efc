//! Filesystem storage for article images and attachments.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::{fs, io::AsyncWriteExt};

use crate::application::repos::{MediaStorageError, MediaStore};

/// Media files rooted at a directory, addressed as `{article_id}/{file}`.
#[derive(Debug)]
pub struct MediaStorage {
    root: PathBuf,
}

impl MediaStorage {
    /// Initialise storage rooted at the provided directory, creating it if necessary.
    pub fn new(root: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn read(&self, relative_path: &str) -> Result<Bytes, MediaStorageError> {
        let absolute = self.resolve(relative_path)?;
        let data = fs::read(absolute).await?;
        Ok(Bytes::from(data))
    }

    fn resolve(&self, relative_path: &str) -> Result<PathBuf, MediaStorageError> {
        let relative = Path::new(relative_path);
        let escapes = relative.components().any(|component| {
            matches!(
                component,
                Component::ParentDir | Component::Prefix(_) | Component::RootDir
            )
        });
        if relative_path.is_empty() || escapes {
            return Err(MediaStorageError::InvalidPath {
                path: relative_path.to_string(),
            });
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl MediaStore for MediaStorage {
    async fn put(&self, relative_path: &str, data: Bytes) -> Result<(), MediaStorageError> {
        if data.is_empty() {
            return Err(MediaStorageError::EmptyPayload);
        }

        let absolute = self.resolve(relative_path)?;
        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&absolute).await?;
        file.write_all(&data).await?;
        file.flush().await?;
        Ok(())
    }

    async fn discard(&self, relative_dir: &str) -> Result<(), MediaStorageError> {
        let absolute = self.resolve(relative_dir)?;
        match fs::remove_dir_all(absolute).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn put_overwrites_existing_files() {
        let dir = TempDir::new().expect("tempdir");
        let storage = MediaStorage::new(dir.path().join("media")).expect("storage");

        storage
            .put("24030901/thumb.png", Bytes::from_static(b"first"))
            .await
            .expect("put");
        storage
            .put("24030901/thumb.png", Bytes::from_static(b"second"))
            .await
            .expect("overwrite");

        let data = storage.read("24030901/thumb.png").await.expect("read");
        assert_eq!(&data[..], b"second");
    }

    #[tokio::test]
    async fn rejects_paths_outside_the_root() {
        let dir = TempDir::new().expect("tempdir");
        let storage = MediaStorage::new(dir.path().join("media")).expect("storage");

        for path in ["../secret", "/etc/passwd", "24030901/../../x", ""] {
            let err = storage
                .put(path, Bytes::from_static(b"x"))
                .await
                .expect_err("invalid path");
            assert!(matches!(err, MediaStorageError::InvalidPath { .. }), "{path}");
        }
    }

    #[tokio::test]
    async fn discard_removes_the_article_directory() {
        let dir = TempDir::new().expect("tempdir");
        let storage = MediaStorage::new(dir.path().to_path_buf()).expect("storage");
        storage
            .put("24030901/thumb.png", Bytes::from_static(b"x"))
            .await
            .expect("put");

        storage.discard("24030901").await.expect("discard");
        assert!(!dir.path().join("24030901").exists());

        storage.discard("24030901").await.expect("discard twice");
        assert!(matches!(
            storage.discard("../elsewhere").await,
            Err(MediaStorageError::InvalidPath { .. })
        ));
    }

    #[tokio::test]
    async fn rejects_empty_payloads() {
        let dir = TempDir::new().expect("tempdir");
        let storage = MediaStorage::new(dir.path().to_path_buf()).expect("storage");
        let err = storage
            .put("24030901/banner.png", Bytes::new())
            .await
            .expect_err("empty");
        assert!(matches!(err, MediaStorageError::EmptyPayload));
    }
}
