//! 配置管理模块
//! 支持从环境变量和配置文件加载配置

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// 应用配置结构体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub send: SendConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 链网关配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    /// 节点提供的索引历史查询方法名
    pub history_method: String,
    pub history_page_size: u32,
    pub request_timeout_secs: u64,
}

/// 安全存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// 加密文件所在目录
    pub dir: PathBuf,
    /// 钱包私钥使用的固定键名
    pub key_name: String,
    /// 读取时是否要求设备认证
    pub require_auth: bool,
    /// 口令从该环境变量读取，不写入配置文件
    pub passphrase_env: String,
}

/// 认证配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub biometric_enabled: bool,
    pub unlock_prompt: String,
    pub export_prompt: String,
}

/// 转账配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendConfig {
    /// Gas 预估输入防抖间隔
    pub gas_debounce_ms: u64,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "text"
    pub enable_file_logging: bool,
    pub log_file_path: Option<String>,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            rpc_url: std::env::var("IRONPOCKET_RPC_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8545".into()),
            chain_id: env_or("IRONPOCKET_CHAIN_ID", 1),
            history_method: std::env::var("IRONPOCKET_HISTORY_METHOD")
                .unwrap_or_else(|_| "ironpocket_getTransactionHistory".into()),
            history_page_size: env_or("IRONPOCKET_HISTORY_PAGE_SIZE", 25),
            request_timeout_secs: env_or("IRONPOCKET_RPC_TIMEOUT_SECS", 30),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: std::env::var("IRONPOCKET_STORE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./.ironpocket")),
            key_name: std::env::var("IRONPOCKET_KEY_NAME")
                .unwrap_or_else(|_| "ironpocket.wallet.private_key".into()),
            require_auth: env_flag("IRONPOCKET_STORE_REQUIRE_AUTH", true),
            passphrase_env: "IRONPOCKET_STORE_PASSPHRASE".into(),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            biometric_enabled: env_flag("IRONPOCKET_BIOMETRIC", false),
            unlock_prompt: "Unlock your wallet".into(),
            export_prompt: "Confirm to reveal your private key".into(),
        }
    }
}

impl Default for SendConfig {
    fn default() -> Self {
        Self {
            gas_debounce_ms: env_or("IRONPOCKET_GAS_DEBOUNCE_MS", 500),
        }
    }
}

impl SendConfig {
    pub fn gas_debounce(&self) -> Duration {
        Duration::from_millis(self.gas_debounce_ms)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".into()),
            enable_file_logging: env_flag("LOG_FILE_ENABLED", false),
            log_file_path: std::env::var("LOG_FILE_PATH").ok(),
        }
    }
}

impl Config {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            gateway: GatewayConfig::default(),
            storage: StorageConfig::default(),
            security: SecurityConfig::default(),
            send: SendConfig::default(),
            logging: LoggingConfig::default(),
        })
    }

    /// 从配置文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse config file as TOML")?;

        Ok(config)
    }

    /// 从环境变量和配置文件合并加载（配置文件中出现的段覆盖环境变量）
    pub fn from_env_and_file<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut config = Self::from_env()?;

        if let Some(path) = path {
            if path.as_ref().exists() {
                config = Self::from_file(path)?;
            }
        }

        Ok(config)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<()> {
        if !self.gateway.rpc_url.starts_with("http://")
            && !self.gateway.rpc_url.starts_with("https://")
        {
            anyhow::bail!("IRONPOCKET_RPC_URL must start with http:// or https://");
        }

        if self.gateway.chain_id == 0 {
            anyhow::bail!("IRONPOCKET_CHAIN_ID must be non-zero");
        }

        if self.gateway.history_page_size == 0 || self.gateway.history_page_size > 1000 {
            anyhow::bail!("IRONPOCKET_HISTORY_PAGE_SIZE must be between 1 and 1000");
        }

        if self.send.gas_debounce_ms > 10_000 {
            anyhow::bail!("IRONPOCKET_GAS_DEBOUNCE_MS must be at most 10000");
        }

        if self.storage.key_name.trim().is_empty() {
            anyhow::bail!("IRONPOCKET_KEY_NAME must not be empty");
        }

        // 验证日志级别
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!("LOG_LEVEL must be one of: {:?}", valid_levels);
        }

        // 验证日志格式
        if self.logging.format != "json" && self.logging.format != "text" {
            anyhow::bail!("LOG_FORMAT must be 'json' or 'text'");
        }

        Ok(())
    }

    /// 读取安全存储口令
    pub fn store_passphrase(&self) -> Result<String> {
        let value = std::env::var(&self.storage.passphrase_env)
            .with_context(|| format!("{} environment variable not set", self.storage.passphrase_env))?;
        if value.len() < 8 {
            anyhow::bail!("{} too short (min 8)", self.storage.passphrase_env);
        }
        Ok(value)
    }
}
