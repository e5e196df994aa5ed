//! 钱包生命周期编排
//!
//! `WalletManager` 持有唯一的活动钱包句柄，按 认证 → 存储 → 链 的顺序调度协作方。
//! 所有输入校验都在调用任何协作方之前完成；协作方的错误统一包装为 `WalletError`。
//!
//! 句柄锁只在短暂读写时持有，不跨越协作方的 await，因此并发的两次转账互不排斥。

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::{
    config::Config,
    domain::{
        reconcile_page, KeySource, PendingSend, SendReceipt, SessionState, TransactionPage,
        TxProgress, WalletHandle, WalletSummary,
    },
    error::{WalletError, WalletResult},
    infrastructure::{
        log_redact::{redact_address, sanitize_message},
        rpc_validator,
    },
    service::{
        biometric::BiometricGate,
        chain_gateway::ChainGateway,
        key_provider::{
            normalize_mnemonic, KeyMaterialProvider, UnsignedTransaction, MNEMONIC_WORD_COUNTS,
        },
        secure_store::{SecureStore, StoreFault, StoreOptions},
    },
    utils::{ether_to_wei, parse_positive_amount, AddressValidator},
};

/// 编排器运行参数
#[derive(Debug, Clone)]
pub struct WalletManagerOptions {
    /// 私钥在安全存储中的固定键名
    pub storage_key: String,
    /// 读取私钥时是否要求设备认证
    pub require_auth: bool,
    pub unlock_prompt: String,
    pub export_prompt: String,
    pub history_page_size: u32,
}

impl Default for WalletManagerOptions {
    fn default() -> Self {
        Self {
            storage_key: "ironpocket.wallet.private_key".into(),
            require_auth: true,
            unlock_prompt: "Unlock your wallet".into(),
            export_prompt: "Confirm to reveal your private key".into(),
            history_page_size: 25,
        }
    }
}

impl From<&Config> for WalletManagerOptions {
    fn from(config: &Config) -> Self {
        Self {
            storage_key: config.storage.key_name.clone(),
            require_auth: config.storage.require_auth,
            unlock_prompt: config.security.unlock_prompt.clone(),
            export_prompt: config.security.export_prompt.clone(),
            history_page_size: config.gateway.history_page_size,
        }
    }
}

/// 转账前从句柄中取出的快照（不在锁内调用协作方）
struct SendContext {
    address: String,
    private_key: Zeroizing<String>,
    chain_id: Option<u64>,
}

pub struct WalletManager {
    keys: Arc<dyn KeyMaterialProvider>,
    store: Arc<dyn SecureStore>,
    gate: Arc<dyn BiometricGate>,
    gateway: Arc<dyn ChainGateway>,
    options: WalletManagerOptions,
    wallet: RwLock<Option<WalletHandle>>,
    state: RwLock<SessionState>,
    /// 本会话是否至少认证成功过一次
    authenticated: AtomicBool,
}

impl WalletManager {
    pub fn new(
        keys: Arc<dyn KeyMaterialProvider>,
        store: Arc<dyn SecureStore>,
        gate: Arc<dyn BiometricGate>,
        gateway: Arc<dyn ChainGateway>,
        options: WalletManagerOptions,
    ) -> Self {
        Self {
            keys,
            store,
            gate,
            gateway,
            options,
            wallet: RwLock::new(None),
            state: RwLock::new(SessionState::Uninitialized),
            authenticated: AtomicBool::new(false),
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 访问器
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    pub async fn address(&self) -> Option<String> {
        self.wallet
            .read()
            .await
            .as_ref()
            .map(|w| w.address().to_string())
    }

    /// 缓存余额，不触网
    pub async fn balance(&self) -> Option<Decimal> {
        self.wallet.read().await.as_ref().and_then(|w| w.balance())
    }

    pub async fn summary(&self) -> Option<WalletSummary> {
        self.wallet.read().await.as_ref().map(|w| w.summary(None))
    }

    pub fn chain_id(&self) -> u64 {
        self.gateway.chain_id()
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 状态机
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    async fn transition(&self, target: SessionState) -> WalletResult<()> {
        let mut state = self.state.write().await;
        if !state.can_transition_to(&target) {
            return Err(WalletError::invalid_state_transition(format!(
                "cannot move from {} to {}",
                *state, target
            )));
        }
        debug!(from = %*state, to = %target, "session state change");
        *state = target;
        Ok(())
    }

    /// 强制回退（失败路径，不校验）
    async fn reset_state(&self, target: SessionState) {
        let mut state = self.state.write().await;
        debug!(from = %*state, to = %target, "session state reset");
        *state = target;
    }

    fn store_options(&self, prompt: &str) -> StoreOptions {
        StoreOptions {
            require_auth: self.options.require_auth,
            prompt: Some(prompt.to_string()),
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 启动
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// 冷启动：从安全存储加载钱包
    ///
    /// 有钱包返回摘要并进入 `WalletLoaded`；没有则进入 `NoWallet` 并返回 `None`。
    pub async fn initialize(&self) -> WalletResult<Option<WalletSummary>> {
        self.transition(SessionState::Initializing).await?;
        self.authenticated.store(false, Ordering::SeqCst);

        let options = self.store_options(&self.options.unlock_prompt);
        let stored = match self.store.get(&self.options.storage_key, &options).await {
            Ok(stored) => stored,
            Err(e) => {
                // 回退到 Uninitialized 时不能留着旧句柄
                *self.wallet.write().await = None;
                self.reset_state(SessionState::Uninitialized).await;
                let declined = e.chain().any(|c| {
                    matches!(c.downcast_ref::<StoreFault>(), Some(StoreFault::AuthDeclined))
                });
                if declined {
                    warn!("secure store unlock declined");
                    return Err(WalletError::authentication_failed(
                        "secure store unlock was declined",
                    )
                    .with_source(e));
                }
                warn!(error = %sanitize_message(&format!("{:#}", e)), "secure store unavailable");
                return Err(WalletError::storage_unavailable(e));
            }
        };

        let Some(secret) = stored else {
            *self.wallet.write().await = None;
            self.transition(SessionState::NoWallet).await?;
            info!("no wallet on this device");
            return Ok(None);
        };

        let derived = if AddressValidator::is_valid_private_key(&secret) {
            self.keys.from_private_key(&secret)
        } else {
            Err(anyhow::anyhow!("stored secret is not a private key"))
        };
        let key = match derived {
            Ok(key) => key,
            Err(e) => {
                // 存储里的密钥不可用，允许调用方直接恢复覆盖
                *self.wallet.write().await = None;
                self.transition(SessionState::NoWallet).await?;
                warn!("stored wallet secret is corrupt");
                return Err(WalletError::corrupt_secret(e));
            }
        };

        let mut handle = WalletHandle::new(key);
        handle.bind(self.gateway.chain_id());
        let address = handle.address().to_string();
        *self.wallet.write().await = Some(handle);
        self.transition(SessionState::WalletLoaded).await?;

        info!(address = %redact_address(&address), "wallet loaded");

        // 存储解锁已经挑战过一次，视为本会话已认证
        if self.options.require_auth && self.gate.is_available().await {
            self.transition(SessionState::Authenticating).await?;
            self.authenticated.store(true, Ordering::SeqCst);
            self.transition(SessionState::Authenticated).await?;
            debug!("session authenticated by secure store unlock");
        }

        self.refresh_balance_best_effort().await;
        Ok(self.summary().await)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 创建 / 恢复
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// 创建钱包；已有钱包时直接覆盖（确认由调用方负责）
    pub async fn create_wallet(&self, source: KeySource) -> WalletResult<WalletSummary> {
        let kind = source.kind();

        // 先做本地格式校验，再调用任何协作方
        validate_key_source(&source)?;
        {
            let state = self.state.read().await;
            if !state.can_transition_to(&SessionState::WalletLoaded) {
                return Err(WalletError::invalid_state_transition(format!(
                    "cannot load a wallet while {}",
                    *state
                )));
            }
        }

        let key = match &source {
            KeySource::Random => self
                .keys
                .generate()
                .map_err(|e| WalletError::invalid_key_format(e.to_string()))?,
            KeySource::PrivateKey(raw) => {
                let normalized = Zeroizing::new(
                    AddressValidator::normalize_private_key(raw)
                        .ok_or_else(|| WalletError::invalid_key_format("malformed private key"))?,
                );
                self.keys
                    .from_private_key(&normalized)
                    .map_err(|e| WalletError::invalid_key_format(e.to_string()))?
            }
            KeySource::Mnemonic(phrase) => self
                .keys
                .from_mnemonic(phrase)
                .map_err(|e| WalletError::invalid_mnemonic(e.to_string()))?,
        };

        let options = self.store_options(&self.options.unlock_prompt);
        self.store
            .set(&self.options.storage_key, &key.private_key, &options)
            .await
            .map_err(WalletError::storage_failed)?;

        let mut handle = WalletHandle::new(key);
        handle.bind(self.gateway.chain_id());
        let address = handle.address().to_string();
        *self.wallet.write().await = Some(handle);
        self.authenticated.store(false, Ordering::SeqCst);
        self.transition(SessionState::WalletLoaded).await?;

        info!(address = %redact_address(&address), source = kind, "wallet created");
        self.refresh_balance_best_effort().await;

        let wallet = self.wallet.read().await;
        wallet
            .as_ref()
            .map(|w| w.summary(Some(kind)))
            .ok_or_else(WalletError::wallet_not_loaded)
    }

    /// 用已有私钥或助记词恢复；会覆盖当前钱包
    pub async fn restore_wallet(&self, source: KeySource) -> WalletResult<WalletSummary> {
        if matches!(source, KeySource::Random) {
            return Err(WalletError::invalid_key_format(
                "restore requires a private key or recovery phrase",
            ));
        }
        self.create_wallet(source).await
    }

    /// 删除持久化私钥与内存句柄
    pub async fn delete_wallet(&self) -> WalletResult<()> {
        let current = self.state().await;
        if current != SessionState::NoWallet && !current.can_transition_to(&SessionState::NoWallet)
        {
            return Err(WalletError::invalid_state_transition(format!(
                "cannot delete the wallet while {}",
                current
            )));
        }

        self.store
            .delete(&self.options.storage_key)
            .await
            .map_err(WalletError::storage_failed)?;

        *self.wallet.write().await = None;
        self.authenticated.store(false, Ordering::SeqCst);
        if self.state().await != SessionState::NoWallet {
            self.transition(SessionState::NoWallet).await?;
        }
        info!("wallet deleted");
        Ok(())
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 认证 / 导出
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// 会话认证；设备无认证硬件时直接通过
    pub async fn authenticate(&self) -> WalletResult<()> {
        if self.wallet.read().await.is_none() {
            return Err(WalletError::wallet_not_loaded());
        }
        self.transition(SessionState::Authenticating).await?;

        let outcome = if self.gate.is_available().await {
            self.gate.challenge(&self.options.unlock_prompt).await
        } else {
            debug!("no biometric hardware, session unlocked");
            Ok(true)
        };

        match outcome {
            Ok(true) => {
                self.authenticated.store(true, Ordering::SeqCst);
                self.transition(SessionState::Authenticated).await?;
                info!("session authenticated");
                Ok(())
            }
            Ok(false) => {
                self.transition(SessionState::AuthFailed).await?;
                warn!("session authentication declined");
                Err(WalletError::authentication_failed("authentication was declined"))
            }
            Err(e) => {
                self.transition(SessionState::AuthFailed).await?;
                warn!(error = %e, "session authentication errored");
                Err(WalletError::authentication_failed("authentication failed").with_source(e))
            }
        }
    }

    /// 导出私钥：每次调用都重新挑战一次
    pub async fn export_private_key(&self) -> WalletResult<Zeroizing<String>> {
        if self.wallet.read().await.is_none() {
            return Err(WalletError::authentication_required("no wallet to export"));
        }

        if self.gate.is_available().await {
            let approved = self
                .gate
                .challenge(&self.options.export_prompt)
                .await
                .map_err(|e| {
                    WalletError::authentication_failed("export authentication failed")
                        .with_source(e)
                })?;
            if !approved {
                warn!("private key export declined");
                return Err(WalletError::authentication_failed("export was declined"));
            }
        }

        let wallet = self.wallet.read().await;
        let handle = wallet
            .as_ref()
            .ok_or_else(|| WalletError::authentication_required("no wallet to export"))?;
        info!(address = %redact_address(handle.address()), "private key exported");
        Ok(Zeroizing::new(handle.private_key().to_string()))
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 余额
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// 向网关查询余额并覆盖缓存；失败时保留旧缓存
    pub async fn refresh_balance(&self) -> WalletResult<Decimal> {
        let address = self.address().await.ok_or_else(WalletError::wallet_not_loaded)?;

        let balance = self
            .gateway
            .get_balance(&address)
            .await
            .map_err(WalletError::from_gateway)?;

        let mut wallet = self.wallet.write().await;
        // 查询期间钱包可能已被替换
        if let Some(handle) = wallet.as_mut() {
            if handle.address() == address {
                handle.set_balance(balance);
            }
        }
        debug!(address = %redact_address(&address), balance = %balance, "balance refreshed");
        Ok(balance)
    }

    pub async fn get_balance(&self) -> WalletResult<Decimal> {
        self.refresh_balance().await
    }

    async fn refresh_balance_best_effort(&self) {
        if let Err(e) = self.refresh_balance().await {
            warn!(code = %e.code, error = %sanitize_message(&e.message), "balance refresh failed");
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 转账
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// 本地校验：钱包 → 地址 → 金额
    async fn validate_send(
        &self,
        to: &str,
        amount: &str,
    ) -> WalletResult<(SendContext, Decimal, Option<Decimal>)> {
        let (context, cached_balance) = {
            let wallet = self.wallet.read().await;
            let handle = wallet
                .as_ref()
                .ok_or_else(|| WalletError::authentication_required("no wallet loaded"))?;
            (
                SendContext {
                    address: handle.address().to_string(),
                    private_key: Zeroizing::new(handle.private_key().to_string()),
                    chain_id: handle.chain_id(),
                },
                handle.balance(),
            )
        };

        if !AddressValidator::is_valid(to) {
            return Err(WalletError::invalid_address(format!(
                "recipient is not a valid address: {}",
                to
            )));
        }

        let amount = parse_positive_amount(amount)
            .map_err(|e| WalletError::invalid_amount(e.to_string()))?;

        Ok((context, amount, cached_balance))
    }

    /// 转账预估（不签名、不广播）
    pub async fn prepare_send(&self, to: &str, amount: &str) -> WalletResult<PendingSend> {
        let (context, amount, _) = self.validate_send(to, amount).await?;
        let value_wei =
            ether_to_wei(amount).map_err(|e| WalletError::invalid_amount(e.to_string()))?;

        let estimated_gas = self
            .gateway
            .estimate_gas(&context.address, to, value_wei)
            .await
            .map_err(WalletError::from_gateway)?;

        Ok(PendingSend {
            recipient: to.to_string(),
            amount,
            estimated_gas,
        })
    }

    /// 签名并广播原生币转账
    pub async fn send_transaction(&self, to: &str, amount: &str) -> WalletResult<SendReceipt> {
        let (context, amount, cached_balance) = self.validate_send(to, amount).await?;

        // 余额未知按 0 处理
        let available = cached_balance.unwrap_or(Decimal::ZERO);
        if amount > available {
            return Err(WalletError::insufficient_balance(format!(
                "amount {} exceeds balance {}",
                amount, available
            )));
        }

        if !self.is_authenticated() {
            return Err(WalletError::authentication_required(
                "authenticate before sending",
            ));
        }

        let value_wei =
            ether_to_wei(amount).map_err(|e| WalletError::invalid_amount(e.to_string()))?;

        let gas_limit = self
            .gateway
            .estimate_gas(&context.address, to, value_wei)
            .await
            .map_err(WalletError::from_gateway)?;
        let pending = PendingSend {
            recipient: to.to_string(),
            amount,
            estimated_gas: gas_limit,
        };

        let nonce = self
            .gateway
            .transaction_count(&context.address)
            .await
            .map_err(WalletError::from_gateway)?;
        let gas_price = self
            .gateway
            .gas_price()
            .await
            .map_err(WalletError::from_gateway)?;

        let tx = UnsignedTransaction {
            nonce,
            gas_price,
            gas_limit: pending.estimated_gas,
            to: pending.recipient.clone(),
            value: value_wei,
            data: Vec::new(),
            chain_id: context.chain_id.unwrap_or_else(|| self.gateway.chain_id()),
        };
        let signed = self
            .keys
            .sign_transaction(&context.private_key, &tx)
            .map_err(WalletError::corrupt_secret)?;
        drop(context.private_key);

        let tx_hash = self
            .gateway
            .broadcast(&signed.raw)
            .await
            .map_err(WalletError::from_gateway)?;

        info!(
            tx_hash = %tx_hash,
            from = %redact_address(&context.address),
            to = %redact_address(&pending.recipient),
            amount = %pending.amount,
            nonce = nonce,
            "transaction sent"
        );

        self.refresh_balance_best_effort().await;

        Ok(SendReceipt {
            tx_hash,
            recipient: pending.recipient,
            amount: pending.amount,
            gas_limit: pending.estimated_gas,
        })
    }

    /// 交易进度：先查回执，没有回执再查交易池
    pub async fn transaction_status(&self, tx_hash: &str) -> WalletResult<TxProgress> {
        let tx_hash = rpc_validator::validate_tx_hash(tx_hash)
            .map_err(|e| WalletError::invalid_transaction_hash(e.to_string()))?;

        let receipt = self
            .gateway
            .get_receipt(&tx_hash)
            .await
            .map_err(WalletError::from_gateway)?;
        if let Some(receipt) = receipt {
            return Ok(TxProgress::Mined(receipt.status));
        }

        let known = self
            .gateway
            .get_transaction(&tx_hash)
            .await
            .map_err(WalletError::from_gateway)?;
        Ok(match known {
            Some(_) => TxProgress::Pending,
            None => TxProgress::Unknown,
        })
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 历史
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// 查询一页历史，并按 `address` 判定收/发方向
    pub async fn get_transaction_history(&self, address: &str) -> WalletResult<TransactionPage> {
        if !AddressValidator::is_valid(address) {
            return Err(WalletError::invalid_address(format!(
                "not a valid address: {}",
                address
            )));
        }

        let page = self
            .gateway
            .get_transaction_history(address, self.options.history_page_size, None)
            .await
            .map_err(WalletError::from_gateway)?;
        let page = reconcile_page(page, address).map_err(WalletError::malformed_response)?;

        debug!(
            address = %redact_address(address),
            count = page.records.len(),
            "history reconciled"
        );
        Ok(page)
    }
}

/// 私钥/助记词格式校验（纯本地）
fn validate_key_source(source: &KeySource) -> WalletResult<()> {
    match source {
        KeySource::Random => Ok(()),
        KeySource::PrivateKey(raw) => {
            if AddressValidator::is_valid_private_key(raw.trim()) {
                Ok(())
            } else {
                Err(WalletError::invalid_key_format(
                    "private key must be 64 hex characters, optionally 0x-prefixed",
                ))
            }
        }
        KeySource::Mnemonic(phrase) => {
            let normalized = Zeroizing::new(normalize_mnemonic(phrase));
            let words = if normalized.is_empty() {
                0
            } else {
                normalized.split(' ').count()
            };
            if MNEMONIC_WORD_COUNTS.contains(&words) {
                Ok(())
            } else {
                Err(WalletError::invalid_mnemonic(format!(
                    "recovery phrase must have 12, 15, 18, 21 or 24 words, got {}",
                    words
                )))
            }
        }
    }
}
