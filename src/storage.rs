use std::io::ErrorKind;
use std::path::PathBuf;

use anyhow::{ensure, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;

/// Where uploaded document bodies live. Paths returned by `put_file` are stored
/// verbatim on the document row and handed back to `read_file`/`delete_file`.
#[async_trait]
pub trait FileStorage: Send + Sync + 'static {
    async fn put_file(&self, name: &str, bytes: Bytes) -> Result<String>;

    async fn read_file(&self, path: &str) -> Result<Vec<u8>>;

    async fn delete_file(&self, path: &str) -> Result<()>;
}

pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub async fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("failed to create upload directory {}", self.root.display()))
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn put_file(&self, name: &str, bytes: Bytes) -> Result<String> {
        ensure!(
            !name.is_empty() && !name.contains(['/', '\\']) && name != "..",
            "invalid stored file name {name:?}"
        );
        self.ensure_root().await?;

        let path = self.root.join(name);
        fs::write(&path, &bytes)
            .await
            .with_context(|| format!("failed to write upload to {}", path.display()))?;

        Ok(path.to_string_lossy().into_owned())
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        fs::read(path)
            .await
            .with_context(|| format!("failed to read stored file {path}"))
    }

    async fn delete_file(&self, path: &str) -> Result<()> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => {
                Err(err).with_context(|| format!("failed to delete stored file {path}"))
            }
        }
    }
}

/// True when the failure bottoms out in a missing file.
pub fn is_missing_file(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<std::io::Error>()
            .is_some_and(|io| io.kind() == ErrorKind::NotFound)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stores_reads_and_deletes_files() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let storage = LocalFileStorage::new(dir.path().join("uploads"));

        let path = storage
            .put_file("report.pdf", Bytes::from_static(b"%PDF-1.7"))
            .await?;
        assert!(path.ends_with("report.pdf"));
        assert_eq!(storage.read_file(&path).await?, b"%PDF-1.7");

        storage.delete_file(&path).await?;
        let err = storage.read_file(&path).await.unwrap_err();
        assert!(is_missing_file(&err));

        // second delete is a no-op
        storage.delete_file(&path).await?;
        Ok(())
    }

    #[tokio::test]
    async fn rejects_names_that_escape_the_root() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let storage = LocalFileStorage::new(dir.path());

        assert!(storage
            .put_file("../outside.txt", Bytes::from_static(b"x"))
            .await
            .is_err());
        assert!(storage.put_file("", Bytes::new()).await.is_err());
        Ok(())
    }
}
