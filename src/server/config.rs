//! 配置管理模块
//! 负责配置文件的加载、验证和日志初始化

use crate::util::config::loader::ConfigLoader;
use crate::util::config::{Config, StagingNaming};
use crate::util::log::{cleanup_old_logs, log_init_with_config};
use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;

const LOG_FILE_PREFIX: &str = "omr-server";

/// 配置管理器
pub struct ConfigManager;

impl ConfigManager {
    /// 加载和验证配置
    pub fn load_and_validate() -> Result<(Config, ConfigValidationReport)> {
        let config_path = Self::find_config_file_path("config.yaml");
        let config = Self::load_from_path(&config_path)?;
        let validation_report = Self::validate_config(&config);
        Ok((config, validation_report))
    }

    /// 文件不存在时写出模板并使用默认值；存在但无法解析时报错
    pub fn load_from_path(config_path: &Path) -> Result<Config> {
        if config_path.exists() {
            return ConfigLoader::load_with_env_overrides(config_path).map_err(|e| {
                anyhow::anyhow!("配置文件解析失败: {}: {}", config_path.display(), e)
            });
        }

        let template = Config::default();
        if let Err(write_err) = template.write_yaml_to_path(config_path) {
            // 此时日志尚未初始化
            eprintln!(
                "[warn] 创建默认配置文件失败: {}: {}",
                config_path.display(),
                write_err
            );
        }
        Ok(ConfigLoader::apply_env_overrides(template))
    }

    /// 初始化日志系统
    pub fn initialize_logging(config: &Config) -> Result<Option<WorkerGuard>> {
        let log_guard = log_init_with_config(LOG_FILE_PREFIX, &config.logging)?;

        // 执行日志清理（如果配置了保留天数）
        if let (true, Some(retention_days)) =
            (config.logging.file.enabled, config.logging.file.retention_days)
        {
            let log_path = Path::new(&config.logging.file.directory);
            match cleanup_old_logs(log_path, retention_days, LOG_FILE_PREFIX) {
                Ok(removed) => info!(removed, retention_days, "[ok] 日志清理完成"),
                Err(e) => warn!("日志清理失败: {}", e),
            }
        }

        Ok(log_guard)
    }

    /// 查找配置文件路径，适应开发和生产环境
    pub fn find_config_file_path(filename: &str) -> PathBuf {
        let current_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

        // 当前目录的 config/
        let config_in_current = current_dir.join("config").join(filename);
        if config_in_current.exists() {
            return config_in_current;
        }

        // 在 bin/ 下运行时，上级目录的 config/
        if let Some(parent) = current_dir.parent() {
            let config_in_parent = parent.join("config").join(filename);
            if config_in_parent.exists() {
                return config_in_parent;
            }
        }

        // 可执行文件位于 bin/ 时，项目根目录的 config/
        if let Some(exe_dir) = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(Path::to_path_buf))
        {
            if exe_dir.file_name() == Some(std::ffi::OsStr::new("bin")) {
                if let Some(project_root) = exe_dir.parent() {
                    let config_in_root = project_root.join("config").join(filename);
                    if config_in_root.exists() {
                        return config_in_root;
                    }
                }
            }
        }

        current_dir.join(filename)
    }

    /// 验证配置
    pub fn validate_config(config: &Config) -> ConfigValidationReport {
        let mut report = ConfigValidationReport::new();

        Self::validate_server_settings(config, &mut report);
        Self::validate_upload_settings(config, &mut report);
        Self::validate_evaluator_settings(config, &mut report);
        Self::validate_report_settings(config, &mut report);

        report
    }

    /// 将验证结果写入日志（需在日志初始化之后调用）
    pub fn log_validation_report(report: &ConfigValidationReport) {
        for error in &report.errors {
            warn!(event = "config.validation.error", field = %error.field, "{}", error.message);
        }
        for warning in &report.warnings {
            warn!(event = "config.validation.warning", field = %warning.field, "{}", warning.message);
        }
        for info in &report.info {
            info!(event = "config.validation.info", field = %info.field, "{}", info.message);
        }
    }

    fn validate_server_settings(config: &Config, report: &mut ConfigValidationReport) {
        if config.get_port() == 0 {
            report.add_error("server.port", "端口不能为0");
        } else if config.get_port() < 1024 {
            report.add_warning("server.port", "使用了特权端口，可能需要管理员权限");
        }

        if config.bind_host().is_empty() {
            report.add_info("server.host", "未配置监听地址，使用双栈通配地址");
        }
    }

    fn validate_upload_settings(config: &Config, report: &mut ConfigValidationReport) {
        if config.upload.allowed_extensions.is_empty() {
            report.add_error("upload.allowed_extensions", "允许的扩展名列表不能为空");
        }

        if config.upload.max_bytes == 0 {
            report.add_error("upload.max_bytes", "上传大小上限必须大于0");
        } else if config.upload.max_bytes < 1024 * 1024 {
            report.add_warning("upload.max_bytes", "上传大小上限低于1MB，扫描件可能被拒绝");
        }

        if config.staging.directory.trim().is_empty() {
            report.add_error("staging.directory", "暂存目录不能为空");
        }

        if config.staging.naming == StagingNaming::Original {
            report.add_warning("staging.naming", "original 命名下同名上传会互相覆盖");
        }
    }

    fn validate_evaluator_settings(config: &Config, report: &mut ConfigValidationReport) {
        if config.evaluator.program.trim().is_empty() {
            report.add_error("evaluator.program", "评分程序不能为空");
        }

        if config.evaluator.max_concurrent == 0 {
            report.add_error("evaluator.max_concurrent", "评分并发数必须大于0");
        }

        match config.evaluator.timeout_secs {
            Some(0) => report.add_error("evaluator.timeout_secs", "评分超时必须大于0"),
            Some(_) => {}
            None => report.add_info("evaluator.timeout_secs", "未配置评分超时，评分程序不限时运行"),
        }

        if let Some(work_dir) = &config.evaluator.work_dir {
            if !Path::new(work_dir).is_dir() {
                report.add_warning("evaluator.work_dir", "评分程序工作目录不存在");
            }
        }
    }

    fn validate_report_settings(config: &Config, report: &mut ConfigValidationReport) {
        if config.report.preview_rows == 0 {
            report.add_error("report.preview_rows", "预览行数必须大于0");
        }
    }
}

/// 配置验证报告
#[derive(Debug, Clone, Default)]
pub struct ConfigValidationReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    pub info: Vec<ValidationIssue>,
}

/// 验证问题
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
}

impl ConfigValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, field: &str, message: &str) {
        self.errors.push(ValidationIssue {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    pub fn add_warning(&mut self, field: &str, message: &str) {
        self.warnings.push(ValidationIssue {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    pub fn add_info(&mut self, field: &str, message: &str) {
        self.info.push(ValidationIssue {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn is_valid(&self) -> bool {
        !self.has_errors()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let report = ConfigManager::validate_config(&Config::default());
        assert!(report.is_valid(), "{:?}", report.errors);
    }

    #[test]
    fn test_validation_errors() {
        let mut config = Config::default();
        config.server.port = 0;
        config.upload.allowed_extensions.clear();
        config.report.preview_rows = 0;
        config.evaluator.max_concurrent = 0;
        config.evaluator.program = "  ".to_string();

        let report = ConfigManager::validate_config(&config);
        assert_eq!(report.error_count(), 5);
        for field in [
            "server.port",
            "upload.allowed_extensions",
            "report.preview_rows",
            "evaluator.max_concurrent",
            "evaluator.program",
        ] {
            assert!(
                report.errors.iter().any(|issue| issue.field == field),
                "missing error for {field}"
            );
        }
    }

    #[test]
    fn test_original_naming_warns() {
        let mut config = Config::default();
        config.staging.naming = StagingNaming::Original;
        let report = ConfigManager::validate_config(&config);
        assert!(report.is_valid());
        assert!(report.warnings.iter().any(|w| w.field == "staging.naming"));
    }

    #[test]
    fn test_missing_file_writes_template() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config").join("config.yaml");

        let config = ConfigManager::load_from_path(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.report.preview_rows, 50);

        let reloaded = ConfigManager::load_from_path(&path).unwrap();
        assert_eq!(reloaded.upload.allowed_extensions, config.upload.allowed_extensions);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "server: [not, a, map]\n").unwrap();
        assert!(ConfigManager::load_from_path(&path).is_err());
    }
}
