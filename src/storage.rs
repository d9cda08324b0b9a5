use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;

/// Seam between the request handlers and wherever document bytes live.
/// Paths are relative to the store root and always use `/` separators.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    async fn put_file(&self, relative_path: &str, bytes: Vec<u8>) -> Result<()>;

    async fn read_file(&self, relative_path: &str) -> Result<Vec<u8>>;

    async fn file_size(&self, relative_path: &str) -> Result<u64>;

    async fn exists(&self, relative_path: &str) -> bool;
}

pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, relative_path: &str) -> Result<PathBuf> {
        let candidate = Path::new(relative_path);
        if candidate.is_absolute() {
            bail!("storage path must be relative: {relative_path}");
        }
        for component in candidate.components() {
            match component {
                Component::Normal(_) => {}
                _ => bail!("storage path must not escape the root: {relative_path}"),
            }
        }
        Ok(self.root.join(candidate))
    }
}

#[async_trait]
impl DocumentStore for LocalStorage {
    async fn put_file(&self, relative_path: &str, bytes: Vec<u8>) -> Result<()> {
        let target = self.resolve(relative_path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        tokio::fs::write(&target, bytes)
            .await
            .with_context(|| format!("failed to write {}", target.display()))?;
        Ok(())
    }

    async fn read_file(&self, relative_path: &str) -> Result<Vec<u8>> {
        let target = self.resolve(relative_path)?;
        tokio::fs::read(&target)
            .await
            .with_context(|| format!("failed to read {}", target.display()))
    }

    async fn file_size(&self, relative_path: &str) -> Result<u64> {
        let target = self.resolve(relative_path)?;
        let metadata = tokio::fs::metadata(&target)
            .await
            .with_context(|| format!("failed to stat {}", target.display()))?;
        Ok(metadata.len())
    }

    async fn exists(&self, relative_path: &str) -> bool {
        match self.resolve(relative_path) {
            Ok(target) => tokio::fs::try_exists(&target).await.unwrap_or(false),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_bytes_and_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        storage
            .put_file("documents/2024/05/invoice.pdf", b"%PDF-1.4".to_vec())
            .await
            .unwrap();

        assert!(storage.exists("documents/2024/05/invoice.pdf").await);
        let bytes = storage.read_file("documents/2024/05/invoice.pdf").await.unwrap();
        assert_eq!(bytes, b"%PDF-1.4");
        assert_eq!(storage.file_size("documents/2024/05/invoice.pdf").await.unwrap(), 8);
    }

    #[tokio::test]
    async fn rejects_paths_that_escape_the_root() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());

        assert!(storage.put_file("../outside.pdf", vec![1]).await.is_err());
        assert!(storage.read_file("/etc/passwd").await.is_err());
        assert!(!storage.exists("../outside.pdf").await);
    }
}
