use crate::domain::ports::{KeyValueStore, Storage};
use crate::utils::error::{Result, StatsError};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn full_path(&self, path: &str) -> PathBuf {
        Path::new(&self.base_path).join(path)
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let data = tokio::fs::read(self.full_path(path)).await?;
        Ok(data)
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.full_path(path);

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(full_path, data).await?;
        Ok(())
    }

    async fn delete_file(&self, path: &str) -> Result<()> {
        match tokio::fs::remove_file(self.full_path(path)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// `Storage` 中的單一檔案，當作快取的鍵值儲存
#[derive(Debug, Clone)]
pub struct StorageSlot<S: Storage> {
    storage: S,
    name: String,
}

impl<S: Storage> StorageSlot<S> {
    pub fn new(storage: S, name: impl Into<String>) -> Self {
        Self {
            storage,
            name: name.into(),
        }
    }
}

impl<S: Storage> KeyValueStore for StorageSlot<S> {
    async fn read(&self) -> Result<Option<Vec<u8>>> {
        match self.storage.read_file(&self.name).await {
            Ok(data) => Ok(Some(data)),
            Err(StatsError::Io(e)) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn write(&self, data: &[u8]) -> Result<()> {
        self.storage.write_file(&self.name, data).await
    }

    async fn delete(&self) -> Result<()> {
        self.storage.delete_file(&self.name).await
    }
}
