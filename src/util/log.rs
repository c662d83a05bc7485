use crate::util::config::{LevelConfig, LoggingConfig};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::daily;
use tracing_subscriber::fmt::format::Format;
use tracing_subscriber::fmt::layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{filter::EnvFilter, Layer, Registry};

const ACCESS_TARGET: &str = "http.server";

static ACCESS_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// 按配置初始化日志：控制台 + 按天滚动的 info 文件 + 单独的访问日志文件
///
/// 文件日志关闭时只输出到控制台，返回 None。
pub fn log_init_with_config(
    file_prefix: &str,
    config: &LoggingConfig,
) -> anyhow::Result<Option<WorkerGuard>> {
    let level_filter = parse_level_filter(&config.level);
    let filter_expression = build_env_filter_expression(level_filter, config.level_config.as_ref());
    let use_json = config.structured.unwrap_or(false);

    let stdout_filter = EnvFilter::try_new(filter_expression.as_str())
        .unwrap_or_else(|_| EnvFilter::new(level_filter_to_str(level_filter)));

    if !config.file.enabled {
        if use_json {
            let stdout_layer = layer()
                .json()
                .with_target(false)
                .with_writer(io::stdout)
                .with_filter(stdout_filter);
            Registry::default().with(stdout_layer).try_init()?;
        } else {
            let stdout_layer = layer()
                .event_format(console_format())
                .with_writer(io::stdout)
                .with_filter(stdout_filter);
            Registry::default().with(stdout_layer).try_init()?;
        }

        tracing::info!(event = "log.init", level = %config.level, console = true, file = false, structured = use_json);
        return Ok(None);
    }

    let log_dir = resolve_log_dir(&config.file.directory);
    std::fs::create_dir_all(&log_dir)?;

    let main_filter_expr = format!("{},{}=off", filter_expression, ACCESS_TARGET);
    let access_filter_expr = format!("{}={}", ACCESS_TARGET, level_filter_to_str(level_filter));

    let file_filter = EnvFilter::try_new(main_filter_expr.as_str())
        .unwrap_or_else(|_| EnvFilter::new(level_filter_to_str(level_filter)));
    let access_filter = EnvFilter::try_new(access_filter_expr.as_str())
        .unwrap_or_else(|_| EnvFilter::new("http.server=info"));

    let file_appender = daily(&log_dir, format!("{}-info", file_prefix));
    let (no_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let access_appender = daily(&log_dir, format!("{}-access", file_prefix));
    let (access_nb, access_guard) = tracing_appender::non_blocking(access_appender);
    let _ = ACCESS_GUARD.set(access_guard);

    if use_json {
        let stdout_layer = layer()
            .json()
            .with_target(false)
            .with_writer(io::stdout)
            .with_filter(stdout_filter);
        let file_layer = layer()
            .json()
            .with_target(false)
            .with_ansi(false)
            .with_writer(no_blocking)
            .with_filter(file_filter);
        let access_layer = layer()
            .json()
            .with_target(false)
            .with_ansi(false)
            .with_writer(access_nb)
            .with_filter(access_filter);

        Registry::default()
            .with(stdout_layer)
            .with(file_layer)
            .with(access_layer)
            .try_init()?;
    } else {
        let stdout_layer = layer()
            .event_format(console_format())
            .with_writer(io::stdout)
            .with_filter(stdout_filter);
        let file_layer = layer()
            .event_format(console_format())
            .with_ansi(false)
            .with_writer(no_blocking)
            .with_filter(file_filter);
        let access_layer = layer()
            .event_format(console_format())
            .with_ansi(false)
            .with_writer(access_nb)
            .with_filter(access_filter);

        Registry::default()
            .with(stdout_layer)
            .with(file_layer)
            .with(access_layer)
            .try_init()?;
    }

    tracing::info!(
        event = "log.init",
        level = %config.level,
        console = true,
        file = true,
        directory = %log_dir.display(),
        rotation = "daily",
        structured = use_json,
        access_file = format!("{}-access", file_prefix)
    );
    if let Some(retention) = config.file.retention_days {
        tracing::info!(event = "log.retention", days = retention);
    }

    Ok(Some(guard))
}

fn console_format() -> Format {
    Format::default()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
}

/// 相对路径基于工作目录解析；在 bin/ 目录中启动时使用上级目录
fn resolve_log_dir(directory: &str) -> PathBuf {
    let path = Path::new(directory);
    if path.is_absolute() {
        return path.to_path_buf();
    }

    let current_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    if current_dir.file_name() == Some(std::ffi::OsStr::new("bin")) {
        if let Some(parent) = current_dir.parent() {
            return parent.join(path);
        }
    }
    current_dir.join(path)
}

/// 删除超过保留天数的日志文件，返回删除数量
pub fn cleanup_old_logs(log_dir: &Path, retention_days: u32, file_prefix: &str) -> anyhow::Result<usize> {
    if !log_dir.exists() {
        tracing::debug!("日志目录不存在: {}", log_dir.display());
        return Ok(0);
    }

    let retention = std::time::Duration::from_secs(retention_days as u64 * 24 * 60 * 60);
    let cutoff = std::time::SystemTime::now()
        .checked_sub(retention)
        .unwrap_or(std::time::UNIX_EPOCH);

    let mut deleted_count = 0;
    let mut total_size_deleted = 0u64;
    let mut error_count = 0;

    for entry in std::fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("");

        // 只处理本服务的日志文件
        if !file_name.ends_with(".log") && !file_name.starts_with(file_prefix) {
            continue;
        }

        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }

        let check_time = metadata
            .modified()
            .or_else(|_| metadata.created())
            .unwrap_or_else(|_| std::time::SystemTime::now());

        if check_time < cutoff {
            let file_size = metadata.len();
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    deleted_count += 1;
                    total_size_deleted += file_size;
                    tracing::debug!("已删除过期日志: {}", path.display());
                }
                Err(e) => {
                    error_count += 1;
                    tracing::warn!("删除日志文件失败: {} - {}", path.display(), e);
                }
            }
        }
    }

    if deleted_count > 0 {
        let size_mb = total_size_deleted as f64 / (1024.0 * 1024.0);
        tracing::info!(
            "已清理 {} 个过期日志文件，释放空间 {:.2} MB",
            deleted_count,
            size_mb
        );
    }
    if error_count > 0 {
        tracing::warn!("有 {} 个文件清理失败", error_count);
    }

    Ok(deleted_count)
}

fn parse_level_filter(level: &str) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "warn" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        _ => LevelFilter::INFO,
    }
}

fn build_env_filter_expression(
    default_level: LevelFilter,
    level_config: Option<&LevelConfig>,
) -> String {
    let mut directives = vec![level_filter_to_str(default_level).to_string()];

    if let Some(cfg) = level_config {
        if let Some(level) = cfg.api.as_deref().and_then(normalize_level_str) {
            directives.push(format!("omr_server::api={level}"));
        }
        if let Some(level) = cfg.business.as_deref().and_then(normalize_level_str) {
            directives.push(format!("omr_server::controller={level}"));
            directives.push(format!("omr_conn={level}"));
        }
        if let Some(level) = cfg.system.as_deref().and_then(normalize_level_str) {
            directives.push(format!("omr_server::server={level}"));
            directives.push(format!("omr_server::storage={level}"));
        }

        for (target, level_str) in &cfg.overrides {
            if let Some(level) = normalize_level_str(level_str) {
                directives.push(format!("{}={level}", normalize_directive_target(target)));
            }
        }
    }

    directives.join(",")
}

fn normalize_level_str(level: &str) -> Option<&'static str> {
    match level.to_lowercase().as_str() {
        "trace" => Some("trace"),
        "debug" => Some("debug"),
        "info" => Some("info"),
        "warn" => Some("warn"),
        "error" => Some("error"),
        _ => None,
    }
}

fn level_filter_to_str(level: LevelFilter) -> &'static str {
    match level {
        LevelFilter::OFF => "off",
        LevelFilter::ERROR => "error",
        LevelFilter::WARN => "warn",
        LevelFilter::INFO => "info",
        LevelFilter::DEBUG => "debug",
        LevelFilter::TRACE => "trace",
    }
}

fn normalize_directive_target(target: &str) -> String {
    if let Some(raw) = target.strip_prefix("target:") {
        raw.to_string()
    } else if target.contains("::") {
        target.to_string()
    } else {
        let path = target.replace('.', "::");
        format!("omr_server::{path}")
    }
}
