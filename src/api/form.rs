//! 上传表单解析

use axum::extract::multipart::MultipartError;
use axum::extract::Multipart;
use axum::http::StatusCode;
use thiserror::Error;

use crate::controller::ReportError;
use crate::model::{AnswerKeyVersion, UploadForm, UploadedImage};

const FILE_FIELD: &str = "file";
const VERSION_FIELD: &str = "version";
const DEBUG_FIELD: &str = "debug";

#[derive(Debug, Error)]
pub enum FormError {
    #[error("invalid multipart body: {}", .0.body_text())]
    Multipart(#[from] MultipartError),
    #[error("invalid debug flag `{0}`, expected true, false, on, 1 or 0")]
    InvalidDebugFlag(String),
    #[error(transparent)]
    Report(#[from] ReportError),
}

impl FormError {
    pub fn status(&self) -> StatusCode {
        match self {
            FormError::Multipart(e) => e.status(),
            FormError::InvalidDebugFlag(_) => StatusCode::BAD_REQUEST,
            FormError::Report(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            FormError::Report(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// 读取 `file`、`version`、`debug` 三个字段，其余字段忽略。
/// 同名字段以最后一次为准（表单的隐藏 `debug=false` 会被勾选的复选框覆盖）。
pub async fn parse_upload_form(mut multipart: Multipart) -> Result<UploadForm, FormError> {
    let mut image: Option<UploadedImage> = None;
    let mut version = AnswerKeyVersion::default();
    let mut debug = true;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            FILE_FIELD => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await?;
                // 浏览器未选择文件时也会提交一个空的文件字段
                if file_name.is_empty() && bytes.is_empty() {
                    continue;
                }
                image = Some(UploadedImage::new(file_name, bytes.to_vec()));
            }
            VERSION_FIELD => {
                let text = field.text().await?;
                version = text.parse().map_err(ReportError::InvalidVersion)?;
            }
            DEBUG_FIELD => {
                let text = field.text().await?;
                debug = parse_debug_flag(&text)?;
            }
            _ => {}
        }
    }

    let image = image.ok_or(ReportError::MissingFile)?;
    Ok(UploadForm {
        image,
        version,
        debug,
    })
}

pub fn parse_debug_flag(raw: &str) -> Result<bool, FormError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "1" => Ok(true),
        "false" | "off" | "0" => Ok(false),
        _ => Err(FormError::InvalidDebugFlag(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_debug_flag() {
        assert!(parse_debug_flag("true").unwrap());
        assert!(parse_debug_flag("on").unwrap());
        assert!(parse_debug_flag(" 1 ").unwrap());
        assert!(!parse_debug_flag("FALSE").unwrap());
        assert!(!parse_debug_flag("0").unwrap());
        assert!(matches!(
            parse_debug_flag("maybe"),
            Err(FormError::InvalidDebugFlag(_))
        ));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            FormError::from(ReportError::MissingFile).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            FormError::InvalidDebugFlag("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            FormError::from(ReportError::Staging(anyhow::anyhow!("disk full"))).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
