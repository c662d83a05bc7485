//! 配置数据结构定义

use omr_conn::EvaluatorOptions;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// 主配置结构
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub staging: StagingConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub evaluator: EvaluatorConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub fn get_port(&self) -> u16 {
        self.server.port
    }

    pub fn bind_host(&self) -> &str {
        self.server.host.trim()
    }
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8501,
        }
    }
}

/// 暂存文件命名策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StagingNaming {
    /// `<请求ID>-<序号>-<原文件名>`，同名上传互不覆盖
    #[default]
    Unique,
    /// 直接使用原文件名，同名上传会覆盖前一次
    Original,
}

/// 上传文件暂存目录配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagingConfig {
    pub directory: String,
    #[serde(default)]
    pub naming: StagingNaming,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            directory: "uploads".to_string(),
            naming: StagingNaming::Unique,
        }
    }
}

/// 上传限制
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
    /// 请求体上限（字节）
    #[serde(default = "default_max_upload_bytes")]
    pub max_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: default_allowed_extensions(),
            max_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_allowed_extensions() -> Vec<String> {
    vec!["jpg".to_string(), "jpeg".to_string(), "png".to_string()]
}

fn default_max_upload_bytes() -> usize {
    20 * 1024 * 1024
}

/// 外部评分程序配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub work_dir: Option<String>,
    /// 不配置则不限时
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        let defaults = EvaluatorOptions::default();
        Self {
            program: defaults.program.to_string_lossy().into_owned(),
            args: defaults.args,
            work_dir: None,
            timeout_secs: None,
            max_concurrent: default_max_concurrent(),
        }
    }
}

impl EvaluatorConfig {
    pub fn to_options(&self) -> EvaluatorOptions {
        EvaluatorOptions {
            program: PathBuf::from(&self.program),
            args: self.args.clone(),
            work_dir: self.work_dir.as_ref().map(PathBuf::from),
            timeout: self.timeout_secs.map(Duration::from_secs),
        }
    }
}

fn default_max_concurrent() -> usize {
    2
}

/// 报告展示配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// 逐题表格预览行数
    #[serde(default = "default_preview_rows")]
    pub preview_rows: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            preview_rows: default_preview_rows(),
        }
    }
}

fn default_preview_rows() -> usize {
    50
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    #[serde(default)]
    pub file: LogFileConfig,
    /// 是否输出 JSON 结构化日志
    #[serde(default)]
    pub structured: Option<bool>,
    #[serde(default)]
    pub level_config: Option<LevelConfig>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: LogFileConfig::default(),
            structured: Some(false),
            level_config: None,
        }
    }
}

/// 日志文件配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogFileConfig {
    pub enabled: bool,
    pub directory: String,
    pub retention_days: Option<u32>,
}

impl Default for LogFileConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: "logs".to_string(),
            retention_days: Some(7),
        }
    }
}

/// 分模块日志级别
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LevelConfig {
    #[serde(default)]
    pub api: Option<String>,
    #[serde(default)]
    pub business: Option<String>,
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub overrides: HashMap<String, String>,
}
