//! 上传暂存区
//!
//! 评分程序只接受文件路径，所以上传内容必须先落盘。暂存区负责生成暂存键、
//! 原样写入字节并给出评分程序可读的本地路径。

use anyhow::Result;
use chrono::Utc;
use nanoid::nanoid;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use super::traits::Storage;
use crate::model::UploadedImage;
use crate::util::config::StagingNaming;

const STAGING_ID_RANDOM_ALPHABET: &[char] = &[
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'J',
    'K', 'L', 'M', 'N', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z',
];
const STAGING_ID_RANDOM_LEN: usize = 8;
const FALLBACK_FILE_NAME: &str = "upload";

/// 已暂存的上传文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub key: String,
    pub path: PathBuf,
    pub size: usize,
}

pub struct StagingArea {
    storage: Arc<dyn Storage>,
    naming: StagingNaming,
    sequence: AtomicU64,
    /// 本进程的暂存会话ID，与序号一起组成唯一键
    session_id: String,
}

impl StagingArea {
    pub fn new(storage: Arc<dyn Storage>, naming: StagingNaming) -> Self {
        Self {
            storage,
            naming,
            sequence: AtomicU64::new(0),
            session_id: generate_session_id(),
        }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// 原样写入上传字节
    pub async fn stage(&self, image: &UploadedImage) -> Result<StagedFile> {
        let key = self.staging_key(&image.file_name);
        self.storage.put(&key, &image.bytes).await?;

        let staged = StagedFile {
            path: self.storage.local_path(&key),
            size: image.bytes.len(),
            key,
        };
        debug!(
            target: "omr_server::storage",
            key = %staged.key,
            path = %staged.path.display(),
            bytes = staged.size
        );
        Ok(staged)
    }

    /// 评分结束后删除暂存文件；失败只记录日志
    pub async fn discard(&self, staged: &StagedFile) {
        match self.storage.delete(&staged.key).await {
            Ok(()) => debug!(target: "omr_server::storage", key = %staged.key, "暂存文件已删除"),
            Err(e) => warn!(
                target: "omr_server::storage",
                key = %staged.key,
                error = %e,
                "暂存文件删除失败"
            ),
        }
    }

    fn staging_key(&self, file_name: &str) -> String {
        let safe_name = sanitize_file_name(file_name);
        match self.naming {
            StagingNaming::Original => safe_name,
            StagingNaming::Unique => {
                let seq = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
                format!("{}-{:06}-{}", self.session_id, seq, safe_name)
            }
        }
    }
}

/// 格式：{13位毫秒时间戳}{8位大写随机码}
fn generate_session_id() -> String {
    let timestamp = format!("{:013}", Utc::now().timestamp_millis().abs());
    let random = nanoid!(STAGING_ID_RANDOM_LEN, STAGING_ID_RANDOM_ALPHABET);
    format!("{}{}", timestamp, random)
}

/// 只保留客户端文件名的最后一段，防止路径穿越
pub fn sanitize_file_name(file_name: &str) -> String {
    let last = file_name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .trim();

    let cleaned: String = last.chars().filter(|c| !c.is_control()).collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        FALLBACK_FILE_NAME.to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStorage;
    use tempfile::TempDir;

    fn staging(dir: &TempDir, naming: StagingNaming) -> StagingArea {
        let storage = LocalStorage::new(dir.path().join("uploads")).unwrap();
        StagingArea::new(Arc::new(storage), naming)
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("sheet.png"), "sheet.png");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\scans\\sheet 01.JPG"), "sheet 01.JPG");
        assert_eq!(sanitize_file_name(".."), "upload");
        assert_eq!(sanitize_file_name("dir/"), "upload");
        assert_eq!(sanitize_file_name("a\nb.png"), "ab.png");
    }

    #[tokio::test]
    async fn test_stage_writes_bytes_verbatim() {
        let dir = TempDir::new().unwrap();
        let area = staging(&dir, StagingNaming::Unique);

        for ext in ["jpg", "jpeg", "png"] {
            let bytes: Vec<u8> = (0..=255u8).chain([0, 0, 255]).collect();
            let image = UploadedImage::new(format!("sheet.{ext}"), bytes.clone());

            let staged = area.stage(&image).await.unwrap();
            assert!(staged.path.starts_with(dir.path().join("uploads")));
            assert!(staged.key.ends_with(&format!("-sheet.{ext}")));
            assert_eq!(std::fs::read(&staged.path).unwrap(), bytes);
            assert_eq!(staged.size, bytes.len());
        }
    }

    #[tokio::test]
    async fn test_unique_naming_keeps_same_name_uploads_apart() {
        let dir = TempDir::new().unwrap();
        let area = staging(&dir, StagingNaming::Unique);

        let first = area.stage(&UploadedImage::new("sheet.png", b"first".to_vec())).await.unwrap();
        let second = area.stage(&UploadedImage::new("sheet.png", b"second".to_vec())).await.unwrap();

        assert_ne!(first.path, second.path);
        assert_eq!(std::fs::read(&first.path).unwrap(), b"first");
        assert_eq!(std::fs::read(&second.path).unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_original_naming_overwrites() {
        let dir = TempDir::new().unwrap();
        let area = staging(&dir, StagingNaming::Original);

        let first = area.stage(&UploadedImage::new("sheet.png", b"first".to_vec())).await.unwrap();
        let second = area.stage(&UploadedImage::new("sheet.png", b"second".to_vec())).await.unwrap();

        assert_eq!(first.path, dir.path().join("uploads").join("sheet.png"));
        assert_eq!(first.path, second.path);
        assert_eq!(std::fs::read(&second.path).unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_traversal_name_stays_inside_staging() {
        let dir = TempDir::new().unwrap();
        let area = staging(&dir, StagingNaming::Original);

        let staged = area
            .stage(&UploadedImage::new("../../escape.png", b"x".to_vec()))
            .await
            .unwrap();
        assert_eq!(staged.path, dir.path().join("uploads").join("escape.png"));
        assert!(!dir.path().join("escape.png").exists());
    }

    #[tokio::test]
    async fn test_discard_removes_staged_file() {
        let dir = TempDir::new().unwrap();
        let area = staging(&dir, StagingNaming::Unique);

        let staged = area.stage(&UploadedImage::new("sheet.png", b"x".to_vec())).await.unwrap();
        area.discard(&staged).await;
        assert!(!staged.path.exists());
        area.discard(&staged).await;
    }
}
