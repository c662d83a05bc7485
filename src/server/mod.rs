//! 服务器模块
//!
//! - 配置管理 (config.rs)
//! - HTTP服务器设置 (http.rs)
//! - 单次评分命令 (cli.rs)
//!
//! 使用示例：
//! ```rust,ignore
//! use omr_server::server::ServerBootstrap;
//!
//! let server = ServerBootstrap::new()?;
//! server.start().await?;
//! ```

pub mod cli;
pub mod config;
pub mod http;

pub use cli::EvaluateCommand;
pub use config::{ConfigManager, ConfigValidationReport};
pub use http::{HttpServer, ServerManager};

use crate::build_info;
use crate::controller::ReportController;
use crate::evaluator::{Evaluator, ProcessEvaluatorService};
use crate::storage::{LocalStorage, StagingArea, Storage};
use crate::util::config::Config;
use crate::util::report::TextReportGenerator;
use crate::AppState;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;

/// 服务器引导程序 - 统一的启动入口
pub struct ServerBootstrap {
    config: Config,
    validation_report: ConfigValidationReport,
    _log_guard: Option<WorkerGuard>,
}

impl ServerBootstrap {
    /// 加载配置、初始化日志并检查配置错误
    pub fn new() -> Result<Self> {
        let (config, validation_report) = ConfigManager::load_and_validate()?;
        let log_guard = ConfigManager::initialize_logging(&config)?;

        ConfigManager::log_validation_report(&validation_report);
        if validation_report.has_errors() {
            return Err(anyhow::anyhow!(
                "配置验证失败: {} 个错误",
                validation_report.error_count()
            ));
        }

        Ok(Self {
            config,
            validation_report,
            _log_guard: log_guard,
        })
    }

    /// 启动服务器
    pub async fn start(self) -> Result<()> {
        info!("=== OMR评分服务启动 ===");
        info!("版本信息: {}", build_info::summary());
        info!("服务端口: {}", self.config.get_port());

        let app_state = self.create_app_state()?;
        let server = ServerManager::create_server(&self.config, app_state).await?;
        ServerManager::start_server(server).await
    }

    /// 创建应用状态
    pub fn create_app_state(&self) -> Result<AppState> {
        let controller = build_controller(&self.config)?;
        info!(
            staging = %self.config.staging.directory,
            naming = ?self.config.staging.naming,
            evaluator = %self.config.evaluator.program,
            "[ok] 应用状态创建完成"
        );
        Ok(AppState::new(self.config.clone(), controller))
    }

    /// 执行健康检查
    pub async fn health_check(&self) -> Result<SystemHealthReport> {
        let storage = LocalStorage::new(&self.config.staging.directory)?;
        let staging_writable = storage.health_check().await.unwrap_or(false);
        let evaluator = ProcessEvaluatorService::new(
            self.config.evaluator.to_options(),
            self.config.evaluator.max_concurrent,
        );
        let evaluator_available = evaluator.is_available();

        Ok(SystemHealthReport {
            overall_healthy: staging_writable && evaluator_available,
            staging_writable,
            evaluator_available,
            config_valid: self.validation_report.is_valid(),
            validation_warnings: self
                .validation_report
                .warnings
                .iter()
                .map(|w| format!("{}: {}", w.field, w.message))
                .collect(),
            check_time: chrono::Utc::now(),
        })
    }

    /// 单次评分：结果以文本形式返回；评分失败时返回错误横幅
    pub async fn run_once(&self, command: &EvaluateCommand) -> Result<String> {
        let controller = build_controller(&self.config)?;
        let form = command.to_form().await?;

        match controller.handle(form).await {
            Ok(view) => Ok(TextReportGenerator::generate_report(&view)),
            Err(e) => {
                error!(error = %e, image = %command.image.display(), "单次评分失败");
                Err(anyhow::anyhow!(
                    "{}",
                    TextReportGenerator::generate_error(&e.banner()).trim_end()
                ))
            }
        }
    }

    pub fn get_config(&self) -> &Config {
        &self.config
    }

    pub fn get_validation_report(&self) -> &ConfigValidationReport {
        &self.validation_report
    }
}

/// 按配置组装控制器：本地暂存 + 子进程评分
pub fn build_controller(config: &Config) -> Result<ReportController> {
    let storage: Arc<dyn Storage> = Arc::new(
        LocalStorage::new(&config.staging.directory)
            .with_context(|| format!("初始化暂存目录失败: {}", config.staging.directory))?,
    );
    let staging = StagingArea::new(storage, config.staging.naming);
    let evaluator: Arc<dyn Evaluator> = Arc::new(ProcessEvaluatorService::new(
        config.evaluator.to_options(),
        config.evaluator.max_concurrent,
    ));

    Ok(ReportController::new(
        staging,
        evaluator,
        config.upload.allowed_extensions.clone(),
        config.report.preview_rows,
    ))
}

/// 系统健康检查报告
#[derive(Debug, Clone)]
pub struct SystemHealthReport {
    pub overall_healthy: bool,
    pub staging_writable: bool,
    pub evaluator_available: bool,
    pub config_valid: bool,
    pub validation_warnings: Vec<String>,
    pub check_time: chrono::DateTime<chrono::Utc>,
}

/// 便捷函数：快速启动服务器
pub async fn start_server() -> Result<()> {
    let bootstrap = ServerBootstrap::new()?;
    bootstrap.start().await
}

/// 便捷函数：执行健康检查
pub async fn check_system_health() -> Result<SystemHealthReport> {
    let bootstrap = ServerBootstrap::new()?;
    bootstrap.health_check().await
}

/// 便捷函数：单次评分
pub async fn run_once_evaluation(command: EvaluateCommand) -> Result<String> {
    let bootstrap = ServerBootstrap::new()?;
    bootstrap.run_once(&command).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AnswerKeyVersion;
    use tempfile::TempDir;

    #[test]
    fn test_build_controller_creates_staging_dir() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.staging.directory = dir.path().join("nested/uploads").to_string_lossy().into_owned();
        config.upload.allowed_extensions = vec![".PNG".to_string()];

        let controller = build_controller(&config).unwrap();
        assert!(dir.path().join("nested/uploads").is_dir());
        assert_eq!(controller.allowed_extensions(), ["png"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_controller_with_script_evaluator() {
        let dir = TempDir::new().unwrap();
        let script = dir.path().join("evaluator.sh");
        let out = dir.path().join("out");
        std::fs::create_dir(&out).unwrap();
        std::fs::write(
            &script,
            format!(
                r#"printf 'question,marked\n1,a\n' > {out}/r.csv
printf '{{"result":{{"total":87,"percentage":87.0,"subject_scores":{{"Python":20}},"per_question":[{{"q":1}}]}},"json_path":"{out}/r.json","csv_path":"{out}/r.csv"}}\n'
"#,
                out = out.display()
            ),
        )
        .unwrap();

        let mut config = Config::default();
        config.staging.directory = dir.path().join("uploads").to_string_lossy().into_owned();
        config.evaluator.program = "/bin/sh".to_string();
        config.evaluator.args = vec![script.to_string_lossy().into_owned()];

        let controller = build_controller(&config).unwrap();
        let form = crate::model::UploadForm {
            image: crate::model::UploadedImage::new("sheet.png", b"png".to_vec()),
            version: AnswerKeyVersion::B,
            debug: false,
        };
        let view = controller.handle(form).await.unwrap();
        assert_eq!(view.banner.text, "Done — Total Score: 87/100 (87.00%)");
        assert_eq!(view.version, "B");
        // 评分程序没有写出 JSON 文件
        let labels: Vec<_> = view.downloads.iter().map(|d| d.label.as_str()).collect();
        assert_eq!(labels, ["Download CSV"]);
        assert_eq!(view.downloads[0].content, b"question,marked\n1,a\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_evaluator_work_dir_with_relative_staging() {
        let dir = TempDir::new().unwrap();
        let engine = dir.path().join("engine");
        std::fs::create_dir(&engine).unwrap();
        let script = dir.path().join("evaluator.sh");
        std::fs::write(
            &script,
            r#"test -f "$1" || { echo "no such image: $1 (cwd $(pwd))" >&2; exit 1; }
mkdir -p out && printf 'question\n1\n' > out/r.csv
printf '{"result":{"total":50,"percentage":50.0},"json_path":"out/missing.json","csv_path":"out/r.csv"}\n'
"#,
        )
        .unwrap();

        let staging_dir = format!("target/test-uploads-{}", nanoid::nanoid!(8));
        let mut config = Config::default();
        config.staging.directory = staging_dir.clone();
        config.evaluator.program = "/bin/sh".to_string();
        config.evaluator.args = vec![script.to_string_lossy().into_owned()];
        config.evaluator.work_dir = Some(engine.to_string_lossy().into_owned());

        let controller = build_controller(&config).unwrap();
        let result = controller
            .handle(crate::model::UploadForm {
                image: crate::model::UploadedImage::new("sheet.png", b"png".to_vec()),
                version: AnswerKeyVersion::A,
                debug: false,
            })
            .await;
        std::fs::remove_dir_all(&staging_dir).unwrap();

        let view = result.unwrap();
        assert_eq!(view.banner.text, "Done — Total Score: 50/100 (50.00%)");
        let labels: Vec<_> = view.downloads.iter().map(|d| d.label.as_str()).collect();
        assert_eq!(labels, ["Download CSV"]);
        assert_eq!(view.downloads[0].content, b"question\n1\n");
    }
}
