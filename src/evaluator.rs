//! 评分服务接口
//!
//! 控制器只依赖 [`Evaluator`] trait；生产环境使用子进程实现，测试使用桩实现。

use async_trait::async_trait;
use omr_conn::{EvaluatorError, EvaluatorOptions, ProcessEvaluator};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::model::{EvaluationOutput, EvaluationRequest};

/// 评分失败：评分程序抛出的任何错误
pub type EvaluationFailure = EvaluatorError;

#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(&self, request: &EvaluationRequest) -> Result<EvaluationOutput, EvaluationFailure>;

    /// 健康检查：评分程序是否可用
    fn is_available(&self) -> bool {
        true
    }
}

/// 子进程评分实现，限制同时运行的评分进程数
pub struct ProcessEvaluatorService {
    inner: Arc<ProcessEvaluator>,
    permits: Arc<Semaphore>,
}

impl ProcessEvaluatorService {
    pub fn new(options: EvaluatorOptions, max_concurrent: usize) -> Self {
        tracing::info!(
            "初始化评分并发控制: 最大{}个并发评分进程, 程序: {}",
            max_concurrent.max(1),
            options.program.display()
        );
        Self {
            inner: Arc::new(ProcessEvaluator::new(options)),
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }
}

#[async_trait]
impl Evaluator for ProcessEvaluatorService {
    async fn evaluate(&self, request: &EvaluationRequest) -> Result<EvaluationOutput, EvaluationFailure> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| EvaluatorError::Failed("evaluator is shutting down".to_string()))?;

        let inner = Arc::clone(&self.inner);
        let request = request.clone();
        tokio::task::spawn_blocking(move || {
            inner.evaluate(&request.image_path, request.version, request.debug)
        })
        .await
        .map_err(|e| EvaluatorError::Failed(format!("evaluator task aborted: {}", e)))?
    }

    fn is_available(&self) -> bool {
        program_available(&self.inner.options().program)
    }
}

/// 带路径分隔符的程序直接检查文件，否则在 PATH 中查找
pub fn program_available(program: &Path) -> bool {
    if program.components().count() > 1 {
        return program.is_file();
    }

    std::env::var_os("PATH")
        .map(|paths| {
            std::env::split_paths(&paths).any(|dir| {
                let candidate: PathBuf = dir.join(program);
                candidate.is_file()
            })
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_available() {
        assert!(!program_available(Path::new("/nonexistent/omr-evaluator")));
        assert!(!program_available(Path::new("omr-evaluator-that-does-not-exist")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_service_runs_on_blocking_pool() {
        let dir = tempfile::TempDir::new().unwrap();
        let script = dir.path().join("evaluator.sh");
        std::fs::write(&script, "echo '{\"error\": \"bad image\"}'\n").unwrap();

        let service = ProcessEvaluatorService::new(
            EvaluatorOptions {
                program: PathBuf::from("/bin/sh"),
                args: vec![script.to_string_lossy().into_owned()],
                work_dir: None,
                timeout: None,
            },
            1,
        );
        assert!(service.is_available());

        let request = EvaluationRequest {
            image_path: dir.path().join("sheet.png"),
            version: crate::model::AnswerKeyVersion::A,
            debug: false,
        };
        let err = service.evaluate(&request).await.unwrap_err();
        assert_eq!(err.to_string(), "bad image");
    }
}
