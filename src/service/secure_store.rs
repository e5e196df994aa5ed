//! 安全存储
//!
//! 钱包私钥只在这里落盘。`FileSecureStore` 每个键一个加密信封文件，
//! `MemorySecureStore` 用于测试和一次性会话。

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::Arc,
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use zeroize::Zeroizing;

use crate::{
    infrastructure::encryption::{self, SealedEnvelope},
    service::biometric::BiometricGate,
};

/// 读写选项
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    /// 读取前是否要求设备认证
    pub require_auth: bool,
    /// 认证提示语
    pub prompt: Option<String>,
}

impl StoreOptions {
    pub fn authenticated(prompt: impl Into<String>) -> Self {
        Self {
            require_auth: true,
            prompt: Some(prompt.into()),
        }
    }
}

/// 存储层故障（放进 anyhow 链，编排层据此归类）
#[derive(Debug, thiserror::Error)]
pub enum StoreFault {
    #[error("secure store locked: authentication declined")]
    AuthDeclined,
}

#[async_trait]
pub trait SecureStore: Send + Sync {
    /// 写入（覆盖）
    async fn set(&self, key: &str, secret: &str, options: &StoreOptions) -> Result<()>;

    /// 读取；不存在返回 `None`
    ///
    /// `require_auth` 为真且设备有认证硬件时，只有认证通过才返回密钥
    async fn get(&self, key: &str, options: &StoreOptions) -> Result<Option<Zeroizing<String>>>;

    /// 删除；不存在视为成功
    async fn delete(&self, key: &str) -> Result<()>;
}

const DEFAULT_PROMPT: &str = "Unlock your wallet";

/// 文件加密存储
pub struct FileSecureStore {
    dir: PathBuf,
    passphrase: Zeroizing<String>,
    gate: Option<Arc<dyn BiometricGate>>,
}

impl FileSecureStore {
    pub fn new(dir: impl Into<PathBuf>, passphrase: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            passphrase: Zeroizing::new(passphrase.into()),
            gate: None,
        }
    }

    /// 读取需要认证时使用的门
    pub fn with_gate(mut self, gate: Arc<dyn BiometricGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// 文件名取键名的 SHA-256，避免键名中的特殊字符
    fn path_for(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir.join(format!("{}.json", hex::encode(digest)))
    }

    async fn unlock(&self, options: &StoreOptions) -> Result<()> {
        if !options.require_auth {
            return Ok(());
        }
        let Some(gate) = &self.gate else {
            return Ok(());
        };
        if !gate.is_available().await {
            return Ok(());
        }

        let prompt = options.prompt.as_deref().unwrap_or(DEFAULT_PROMPT);
        let approved = gate
            .challenge(prompt)
            .await
            .context("Secure store authentication failed")?;
        if !approved {
            return Err(StoreFault::AuthDeclined.into());
        }
        Ok(())
    }
}

#[async_trait]
impl SecureStore for FileSecureStore {
    async fn set(&self, key: &str, secret: &str, _options: &StoreOptions) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create store directory: {:?}", self.dir))?;

        // Argon2 派生较慢，放到阻塞线程池
        let plaintext = Zeroizing::new(secret.as_bytes().to_vec());
        let passphrase = self.passphrase.clone();
        let envelope = tokio::task::spawn_blocking(move || {
            encryption::seal(plaintext.as_slice(), passphrase.as_str())
        })
        .await
        .context("Seal task failed")??;

        let body = serde_json::to_vec_pretty(&envelope).context("Failed to encode envelope")?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");

        // 先写临时文件再 rename，保证原子替换
        tokio::fs::write(&tmp, &body)
            .await
            .with_context(|| format!("Failed to write {:?}", tmp))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))
                .await
                .with_context(|| format!("Failed to restrict permissions on {:?}", tmp))?;
        }
        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("Failed to replace {:?}", path))?;

        tracing::debug!(file = ?path, "secret stored");
        Ok(())
    }

    async fn get(&self, key: &str, options: &StoreOptions) -> Result<Option<Zeroizing<String>>> {
        let path = self.path_for(key);
        let body = match tokio::fs::read(&path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(anyhow::Error::new(e).context(format!("Failed to read {:?}", path)))
            }
        };

        self.unlock(options).await?;

        let envelope: SealedEnvelope =
            serde_json::from_slice(&body).context("Stored envelope is not valid JSON")?;
        let passphrase = self.passphrase.clone();
        let plaintext = tokio::task::spawn_blocking(move || {
            encryption::open(&envelope, passphrase.as_str()).map(Zeroizing::new)
        })
        .await
        .context("Open task failed")??;

        let secret = String::from_utf8(plaintext.to_vec()).context("Stored secret is not UTF-8")?;
        Ok(Some(Zeroizing::new(secret)))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(anyhow::Error::new(e).context(format!("Failed to delete {:?}", path))),
        }
    }
}

/// 内存存储（不做设备认证，忽略 `require_auth`）
#[derive(Default)]
pub struct MemorySecureStore {
    entries: RwLock<HashMap<String, Zeroizing<String>>>,
}

impl MemorySecureStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecureStore for MemorySecureStore {
    async fn set(&self, key: &str, secret: &str, _options: &StoreOptions) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), Zeroizing::new(secret.to_string()));
        Ok(())
    }

    async fn get(&self, key: &str, _options: &StoreOptions) -> Result<Option<Zeroizing<String>>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}
