//! 日志系统配置模块
//! 支持结构化日志、日志级别配置和文件输出

use std::{fs::OpenOptions, path::Path, sync::Mutex};

use anyhow::{Context, Result};
use tracing_subscriber::{
    fmt::{self, time::ChronoUtc},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

use crate::config::LoggingConfig;

const DEFAULT_LOG_FILE: &str = "./logs/ironpocket.log";

/// 初始化日志系统
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    // 设置日志级别过滤器
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let json = config.format == "json";

    let stdout_layer = if json {
        fmt::layer()
            .json()
            .with_timer(ChronoUtc::rfc_3339())
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        fmt::layer()
            .with_timer(ChronoUtc::rfc_3339())
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .boxed()
    };

    let file_layer = if config.enable_file_logging {
        let path = config
            .log_file_path
            .as_deref()
            .unwrap_or(DEFAULT_LOG_FILE);
        if let Some(dir) = Path::new(path).parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory: {:?}", dir))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file: {}", path))?;

        // 文件日志不带颜色
        let layer = if json {
            fmt::layer()
                .json()
                .with_timer(ChronoUtc::rfc_3339())
                .with_writer(Mutex::new(file))
                .boxed()
        } else {
            fmt::layer()
                .with_timer(ChronoUtc::rfc_3339())
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .boxed()
        };
        Some(layer)
    } else {
        None
    };

    Registry::default()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_logging_creates_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("app.log");
        let config = LoggingConfig {
            level: "debug".to_string(),
            format: "json".to_string(),
            enable_file_logging: true,
            log_file_path: Some(path.to_string_lossy().into_owned()),
        };

        // 全局 subscriber 可能已被其它测试安装，这里只关心文件创建
        let _ = init_logging(&config);
        assert!(path.exists());
    }
}
