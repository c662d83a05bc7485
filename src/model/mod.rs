use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod report;

pub use omr_conn::{AnswerKeyVersion, EvaluationOutput, ScoreSheet};

/// 用户上传的答题卡图片（原始字节 + 原文件名）
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadedImage {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }

    /// 小写扩展名
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
    }
}

/// 一次评分调用的参数，构造后不再修改
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationRequest {
    pub image_path: PathBuf,
    pub version: AnswerKeyVersion,
    pub debug: bool,
}

/// 表单输入快照：一次请求的全部输入
#[derive(Debug, Clone)]
pub struct UploadForm {
    pub image: UploadedImage,
    pub version: AnswerKeyVersion,
    pub debug: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_is_lowercased() {
        assert_eq!(UploadedImage::new("Sheet.JPG", vec![]).extension().as_deref(), Some("jpg"));
        assert_eq!(UploadedImage::new("scan.tar.png", vec![]).extension().as_deref(), Some("png"));
        assert_eq!(UploadedImage::new("noext", vec![]).extension(), None);
    }
}
