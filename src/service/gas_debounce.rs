//! Gas 预估防抖
//!
//! 输入框每次变化都提交一次；只有在间隔内没有被新提交覆盖的那次才真正请求网关。

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use crate::{
    config::SendConfig, domain::PendingSend, error::WalletResult,
    service::wallet_manager::WalletManager,
};

pub const DEFAULT_GAS_DEBOUNCE: Duration = Duration::from_millis(500);

pub struct GasEstimateDebouncer {
    manager: Arc<WalletManager>,
    interval: Duration,
    generation: AtomicU64,
}

impl GasEstimateDebouncer {
    pub fn new(manager: Arc<WalletManager>, interval: Duration) -> Self {
        Self {
            manager,
            interval,
            generation: AtomicU64::new(0),
        }
    }

    /// 间隔取自 `send.gas_debounce_ms`
    pub fn from_config(manager: Arc<WalletManager>, config: &SendConfig) -> Self {
        Self::new(manager, config.gas_debounce())
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// 提交一次输入；被后续提交覆盖时返回 `None`
    pub async fn submit(&self, to: &str, amount: &str) -> Option<WalletResult<PendingSend>> {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.interval).await;

        if self.generation.load(Ordering::SeqCst) != ticket {
            tracing::trace!(ticket = ticket, "gas estimate superseded");
            return None;
        }
        Some(self.manager.prepare_send(to, amount).await)
    }
}
