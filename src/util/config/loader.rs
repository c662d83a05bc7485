//! 配置加载和管理模块
//! 处理配置文件的读取、写入和环境变量覆盖

use super::types::*;
use anyhow::Result;
use std::fs;
use std::path::Path;

/// 配置加载器
pub struct ConfigLoader;

impl ConfigLoader {
    /// 从YAML文件读取配置
    pub fn read_yaml(path: impl AsRef<Path>) -> Result<Config> {
        let config_str = fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&config_str)?;
        Ok(config)
    }

    /// 从环境变量读取配置覆盖
    pub fn apply_env_overrides(config: Config) -> Config {
        Self::apply_overrides_from(config, |key| std::env::var(key).ok())
    }

    /// 覆盖来源可注入，便于测试
    pub fn apply_overrides_from<F>(mut config: Config, lookup: F) -> Config
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("OMR_HOST") {
            tracing::info!("[ok] 环境变量覆盖服务器地址: {}", host);
            config.server.host = host;
        }

        if let Some(port_str) = lookup("OMR_PORT") {
            match port_str.trim().parse::<u16>() {
                Ok(port) => {
                    config.server.port = port;
                    tracing::info!("[ok] 环境变量覆盖服务器端口: {}", port);
                }
                Err(_) => tracing::warn!("[warn] OMR_PORT 无效: {}", port_str),
            }
        }

        if let Some(dir) = lookup("OMR_STAGING_DIR") {
            tracing::info!("[ok] 环境变量覆盖暂存目录: {}", dir);
            config.staging.directory = dir;
        }

        if let Some(program) = lookup("OMR_EVALUATOR_PROGRAM") {
            tracing::info!("[ok] 环境变量覆盖评分程序: {}", program);
            config.evaluator.program = program;
        }

        if let Some(timeout) = lookup("OMR_EVALUATOR_TIMEOUT_SECS") {
            let trimmed = timeout.trim();
            if trimmed.is_empty() || trimmed == "0" {
                config.evaluator.timeout_secs = None;
                tracing::info!("[ok] 环境变量关闭评分超时");
            } else if let Ok(secs) = trimmed.parse::<u64>() {
                config.evaluator.timeout_secs = Some(secs);
                tracing::info!("[ok] 环境变量覆盖评分超时: {}s", secs);
            } else {
                tracing::warn!("[warn] OMR_EVALUATOR_TIMEOUT_SECS 无效: {}", timeout);
            }
        }

        if let Some(level) = lookup("OMR_LOG_LEVEL") {
            config.logging.level = level.trim().to_ascii_lowercase();
        }

        config
    }

    /// 配置加载（配置文件 + 环境变量）
    pub fn load_with_env_overrides(path: impl AsRef<Path>) -> Result<Config> {
        let base_config = Self::read_yaml(path)?;
        let config = Self::apply_env_overrides(base_config);
        tracing::info!("[ok] 配置加载完成");
        Ok(config)
    }
}

/// 配置写入器
pub struct ConfigWriter;

impl ConfigWriter {
    /// 写入配置到指定路径，确保目录存在
    pub fn write_yaml_with_dir(config: &Config, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let yaml_content = serde_yaml::to_string(config)?;
        fs::write(path, yaml_content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "server:\n  host: 127.0.0.1\n  port: 9000\nevaluator:\n  program: /opt/omr/evaluate\n",
        )
        .unwrap();

        let config = ConfigLoader::read_yaml(&path).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.evaluator.program, "/opt/omr/evaluate");
        assert!(config.evaluator.args.is_empty());
        assert_eq!(config.evaluator.max_concurrent, 2);
        assert_eq!(config.staging.directory, "uploads");
        assert_eq!(config.staging.naming, StagingNaming::Unique);
        assert_eq!(config.upload.allowed_extensions, ["jpg", "jpeg", "png"]);
        assert_eq!(config.report.preview_rows, 50);
    }

    #[test]
    fn test_template_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.yaml");
        ConfigWriter::write_yaml_with_dir(&Config::default(), &path).unwrap();

        let config = ConfigLoader::read_yaml(&path).unwrap();
        assert_eq!(config.server.port, 8501);
        assert_eq!(config.evaluator.program, "python3");
        assert_eq!(config.evaluator.timeout_secs, None);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("OMR_PORT", "8080"),
            ("OMR_STAGING_DIR", "/tmp/omr-staging"),
            ("OMR_EVALUATOR_TIMEOUT_SECS", "90"),
            ("OMR_LOG_LEVEL", "DEBUG"),
        ]);
        let config = ConfigLoader::apply_overrides_from(Config::default(), |key| {
            env.get(key).map(|v| v.to_string())
        });

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.staging.directory, "/tmp/omr-staging");
        assert_eq!(config.evaluator.timeout_secs, Some(90));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn test_invalid_port_override_is_ignored() {
        let config = ConfigLoader::apply_overrides_from(Config::default(), |key| {
            (key == "OMR_PORT").then(|| "not-a-port".to_string())
        });
        assert_eq!(config.server.port, 8501);
    }

    #[test]
    fn test_example_config_parses() {
        let config: Config =
            serde_yaml::from_str(include_str!("../../../config.example.yaml")).unwrap();
        assert_eq!(config.server.port, 8501);
        assert_eq!(config.evaluator.args, ["-m", "theme_1_omr_system"]);
        assert_eq!(config.upload.max_bytes, 20 * 1024 * 1024);
        assert_eq!(
            config.logging.level_config.unwrap().business.as_deref(),
            Some("debug")
        );
    }
}
