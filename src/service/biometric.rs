//! 生物识别/设备认证门
//!
//! 设备没有认证硬件时按约定放行（fail-open），由调用方决定是否挑战。

use std::{
    io::{BufRead, Write},
    sync::atomic::{AtomicUsize, Ordering},
};

use anyhow::{Context, Result};
use async_trait::async_trait;

#[async_trait]
pub trait BiometricGate: Send + Sync {
    /// 设备是否具备认证能力
    async fn is_available(&self) -> bool;

    /// 发起一次认证；`Ok(false)` 表示用户拒绝或取消
    async fn challenge(&self, prompt: &str) -> Result<bool>;
}

/// 无认证硬件
#[derive(Debug, Default, Clone, Copy)]
pub struct NoBiometricHardware;

#[async_trait]
impl BiometricGate for NoBiometricHardware {
    async fn is_available(&self) -> bool {
        false
    }

    async fn challenge(&self, _prompt: &str) -> Result<bool> {
        Ok(true)
    }
}

/// 终端确认（开发用 CLI）
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsolePromptGate;

#[async_trait]
impl BiometricGate for ConsolePromptGate {
    async fn is_available(&self) -> bool {
        true
    }

    async fn challenge(&self, prompt: &str) -> Result<bool> {
        let prompt = prompt.to_string();
        tokio::task::spawn_blocking(move || -> Result<bool> {
            let mut stderr = std::io::stderr();
            write!(stderr, "{} [y/N]: ", prompt)?;
            stderr.flush()?;

            let mut answer = String::new();
            std::io::stdin()
                .lock()
                .read_line(&mut answer)
                .context("Failed to read confirmation")?;
            let answer = answer.trim();
            Ok(answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes"))
        })
        .await
        .context("Confirmation prompt task failed")?
    }
}

/// 固定结果的认证门，记录挑战次数
#[derive(Debug)]
pub struct StaticGate {
    available: bool,
    approve: bool,
    challenges: AtomicUsize,
}

impl StaticGate {
    pub fn approving() -> Self {
        Self::new(true, true)
    }

    pub fn declining() -> Self {
        Self::new(true, false)
    }

    pub fn new(available: bool, approve: bool) -> Self {
        Self {
            available,
            approve,
            challenges: AtomicUsize::new(0),
        }
    }

    pub fn challenges(&self) -> usize {
        self.challenges.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BiometricGate for StaticGate {
    async fn is_available(&self) -> bool {
        self.available
    }

    async fn challenge(&self, _prompt: &str) -> Result<bool> {
        self.challenges.fetch_add(1, Ordering::SeqCst);
        Ok(self.approve)
    }
}
