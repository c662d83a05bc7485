use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::traits::Storage;

/// 本地文件系统存储实现
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// 目录不存在时创建，已存在不报错
    ///
    /// 相对路径按当前工作目录转为绝对路径，评分程序可能在别的目录下运行。
    pub fn new(base_path: impl AsRef<Path>) -> Result<Self> {
        let base_path = base_path.as_ref();
        let base_path = if base_path.is_absolute() {
            base_path.to_path_buf()
        } else {
            std::env::current_dir()
                .context("Failed to resolve current directory")?
                .join(base_path)
        };

        std::fs::create_dir_all(&base_path).with_context(|| {
            format!("Failed to create base directory: {}", base_path.display())
        })?;

        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// 获取文件的完整路径
    fn get_full_path(&self, key: &str) -> PathBuf {
        self.base_path.join(key.trim_start_matches('/'))
    }

    /// 确保文件的父目录存在（暂存目录可能在运行中被清理）
    async fn ensure_parent_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create parent directory")?;
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.get_full_path(key);

        self.ensure_parent_dir(&path).await?;

        fs::write(&path, data)
            .await
            .with_context(|| format!("Failed to write file: {}", path.display()))?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.get_full_path(key);

        match fs::remove_file(&path).await {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context("Failed to delete file")?,
        }
    }

    fn local_path(&self, key: &str) -> PathBuf {
        self.get_full_path(key)
    }

    async fn health_check(&self) -> Result<bool> {
        let probe = self.base_path.join(".write_test");
        let writable = fs::write(&probe, b"ok").await.is_ok();
        if writable {
            let _ = fs::remove_file(&probe).await;
        }
        Ok(writable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_local_storage() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path().join("uploads")).unwrap();

        let key = "sheet.png";
        let data = b"\x89PNG\r\n\x1a\n";

        storage.put(key, data).await.unwrap();
        let path = storage.local_path(key);
        assert_eq!(path, temp_dir.path().join("uploads").join(key));
        assert_eq!(std::fs::read(&path).unwrap(), data);

        storage.delete(key).await.unwrap();
        assert!(!path.exists());
        // 重复删除不报错
        storage.delete(key).await.unwrap();
    }

    #[test]
    fn test_relative_base_becomes_absolute() {
        let name = format!("staging-{}", nanoid::nanoid!(8));
        let storage = LocalStorage::new(&name).unwrap();
        assert!(storage.base_path().is_absolute());
        assert_eq!(
            storage.local_path("sheet.png"),
            std::env::current_dir().unwrap().join(&name).join("sheet.png")
        );
        std::fs::remove_dir_all(storage.base_path()).unwrap();
    }

    #[tokio::test]
    async fn test_create_is_idempotent_and_healthy() {
        let temp_dir = TempDir::new().unwrap();
        let first = LocalStorage::new(temp_dir.path()).unwrap();
        let second = LocalStorage::new(temp_dir.path()).unwrap();
        assert_eq!(first.base_path(), second.base_path());
        assert!(second.health_check().await.unwrap());
    }
}
