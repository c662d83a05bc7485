//! 上传评分控制器
//!
//! 一次请求：校验上传 → 暂存 → 调用评分程序 → 组装报告描述。
//! 控制器不关心呈现方式，HTTP、JSON API 与命令行共用同一份 [`ReportView`]。

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::evaluator::{EvaluationFailure, Evaluator};
use crate::model::report::{Banner, DownloadArtifact, InlineImage, QuestionTable, ReportView};
use crate::model::{EvaluationOutput, EvaluationRequest, UploadForm};
use crate::storage::StagingArea;
use crate::util::logging::standards::events;

const JSON_MIME: &str = "application/json";
const CSV_MIME: &str = "text/csv";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("no file uploaded")]
    MissingFile,
    #[error("{0}")]
    InvalidVersion(#[from] omr_conn::ParseVersionError),
    #[error("unsupported file type '{extension}', allowed: {allowed}")]
    UnsupportedFileType { extension: String, allowed: String },
    #[error("failed to stage upload: {0}")]
    Staging(#[source] anyhow::Error),
    #[error("{}", banner.text)]
    Evaluation {
        banner: Banner,
        #[source]
        source: EvaluationFailure,
    },
}

impl ReportError {
    /// 输入问题（客户端可修正）
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ReportError::MissingFile
                | ReportError::InvalidVersion(_)
                | ReportError::UnsupportedFileType { .. }
        )
    }

    /// 页面展示的错误横幅
    pub fn banner(&self) -> Banner {
        match self {
            ReportError::Evaluation { banner, .. } => banner.clone(),
            other if other.is_client_error() => Banner::rejected(other),
            other => Banner::error(other),
        }
    }
}

pub struct ReportController {
    staging: StagingArea,
    evaluator: Arc<dyn Evaluator>,
    allowed_extensions: Vec<String>,
    preview_rows: usize,
}

impl ReportController {
    pub fn new(
        staging: StagingArea,
        evaluator: Arc<dyn Evaluator>,
        allowed_extensions: Vec<String>,
        preview_rows: usize,
    ) -> Self {
        Self {
            staging,
            evaluator,
            allowed_extensions: allowed_extensions
                .into_iter()
                .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            preview_rows,
        }
    }

    pub fn allowed_extensions(&self) -> &[String] {
        &self.allowed_extensions
    }

    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    pub fn evaluator(&self) -> &Arc<dyn Evaluator> {
        &self.evaluator
    }

    /// 处理一次上传
    pub async fn handle(&self, form: UploadForm) -> Result<ReportView, ReportError> {
        let started = Instant::now();
        info!(
            target: "omr_server::controller",
            event = events::UPLOAD_RECEIVED,
            file_name = %form.image.file_name,
            bytes = form.image.bytes.len(),
            version = %form.version,
            debug = form.debug
        );

        self.check_extension(&form)?;

        let staged = self.staging.stage(&form.image).await.map_err(|e| {
            error!(
                target: "omr_server::controller",
                event = events::STAGING_FAILED,
                file_name = %form.image.file_name,
                error = %e
            );
            ReportError::Staging(e)
        })?;
        info!(
            target: "omr_server::controller",
            event = events::STAGING_WRITTEN,
            key = %staged.key,
            bytes = staged.size
        );

        let request = EvaluationRequest {
            image_path: staged.path.clone(),
            version: form.version,
            debug: form.debug,
        };

        info!(
            target: "omr_server::controller",
            event = events::EVALUATION_START,
            path = %request.image_path.display(),
            version = %request.version,
            debug = request.debug
        );
        let outcome = self.evaluator.evaluate(&request).await;
        // 评分程序只在调用期间读取图像
        self.staging.discard(&staged).await;
        let output = match outcome {
            Ok(output) => output,
            Err(e) => {
                error!(
                    target: "omr_server::controller",
                    event = events::EVALUATION_FAILED,
                    path = %request.image_path.display(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    error = %e
                );
                return Err(ReportError::Evaluation {
                    banner: Banner::error(&e),
                    source: e,
                });
            }
        };
        info!(
            target: "omr_server::controller",
            event = events::EVALUATION_COMPLETE,
            total = %output.result.total,
            percentage = output.result.percentage,
            elapsed_ms = started.elapsed().as_millis() as u64
        );

        let view = self.build_view(&request, output).await;
        debug!(
            target: "omr_server::controller",
            event = events::REPORT_RENDERED,
            subjects = view.subject_scores.len(),
            preview_rows = view.question_preview.rows.len(),
            downloads = view.downloads.len(),
            debug_image = view.debug_image.is_some()
        );
        Ok(view)
    }

    fn check_extension(&self, form: &UploadForm) -> Result<(), ReportError> {
        let extension = form.image.extension().unwrap_or_default();
        if self.allowed_extensions.iter().any(|ext| *ext == extension) {
            return Ok(());
        }

        warn!(
            target: "omr_server::controller",
            event = events::UPLOAD_REJECTED,
            file_name = %form.image.file_name,
            extension = %extension
        );
        Err(ReportError::UnsupportedFileType {
            extension,
            allowed: self.allowed_extensions.join(", "),
        })
    }

    async fn build_view(&self, request: &EvaluationRequest, output: EvaluationOutput) -> ReportView {
        let mut downloads = Vec::new();
        if let Some(json) = read_artifact(&output.json_path, "Download JSON", JSON_MIME).await {
            downloads.push(json);
        }
        if let Some(csv) = read_artifact(&output.csv_path, "Download CSV", CSV_MIME).await {
            downloads.push(csv);
        }

        let debug_image = match (&output.debug_path, request.debug) {
            (Some(path), true) => read_debug_image(path).await,
            _ => None,
        };

        ReportView {
            banner: Banner::success(&output.result),
            version: request.version.to_string(),
            subject_scores: ReportView::subject_rows(&output.result),
            question_preview: QuestionTable::preview(&output.result.per_question, self.preview_rows),
            downloads,
            debug_image,
        }
    }
}

/// 产物不存在时返回 None，不报错
async fn read_bytes(path: &Path) -> Option<Vec<u8>> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        debug!(
            target: "omr_server::controller",
            event = events::ARTIFACT_MISSING,
            path = %path.display()
        );
        return None;
    }

    match tokio::fs::read(path).await {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            warn!(
                target: "omr_server::controller",
                event = events::ARTIFACT_READ_FAILED,
                path = %path.display(),
                error = %e
            );
            None
        }
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

async fn read_artifact(path: &Path, label: &str, mime: &str) -> Option<DownloadArtifact> {
    let content = read_bytes(path).await?;
    Some(DownloadArtifact {
        label: label.to_string(),
        file_name: file_name_of(path),
        mime: mime.to_string(),
        content,
    })
}

async fn read_debug_image(path: &Path) -> Option<InlineImage> {
    let content = read_bytes(path).await?;
    Some(InlineImage {
        file_name: file_name_of(path),
        mime: mime_guess::from_path(path).first_or_octet_stream().to_string(),
        content,
    })
}
