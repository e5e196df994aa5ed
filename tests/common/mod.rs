//! 测试辅助模块
//! 提供带调用计数的内存协作方，以及组装 `WalletManager` 的工具函数

#![allow(dead_code)]

use std::{
    str::FromStr,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use anyhow::Result;
use async_trait::async_trait;
use ironpocket::{
    domain::{DerivedKey, HistoryPage, RawTransactionRecord},
    error::GatewayFault,
    service::{
        ChainGateway, KeyMaterialProvider, MemorySecureStore, ReceiptSummary,
        Secp256k1KeyProvider, SecureStore, SignedTransaction, StaticGate, StoreOptions,
        UnsignedTransaction,
    },
    WalletManager, WalletManagerOptions,
};
use rust_decimal::Decimal;
use serde_json::Value;
use zeroize::Zeroizing;

pub const CHAIN_ID: u64 = 11155111;

/// web3.js 文档中的示例私钥
pub const KEY_1: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
pub const ADDRESS_1: &str = "0x2c7536E3605D9C16a7a3D7b1898e529396a65c23";
/// EIP-155 示例私钥
pub const KEY_2: &str = "0x4646464646464646464646464646464646464646464646464646464646464646";

pub const TEST_MNEMONIC: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
pub const MNEMONIC_ADDRESS: &str = "0x9858EfFD232B4033E47d90003D41EC34EcaEda94";

pub const RECIPIENT: &str = "0x1111111111111111111111111111111111111111";
pub const FAKE_TX_HASH: &str = "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b";

pub fn address_of(key: &str) -> String {
    Secp256k1KeyProvider::new()
        .from_private_key(key)
        .expect("valid test key")
        .address
}

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).expect("valid decimal")
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 密钥
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Default)]
pub struct CountingKeys {
    inner: Secp256k1KeyProvider,
    pub generate_calls: AtomicUsize,
    pub private_key_calls: AtomicUsize,
    pub mnemonic_calls: AtomicUsize,
    pub sign_calls: AtomicUsize,
}

impl CountingKeys {
    pub fn total_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
            + self.private_key_calls.load(Ordering::SeqCst)
            + self.mnemonic_calls.load(Ordering::SeqCst)
            + self.sign_calls.load(Ordering::SeqCst)
    }
}

impl KeyMaterialProvider for CountingKeys {
    fn generate(&self) -> Result<DerivedKey> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.generate()
    }

    fn from_private_key(&self, private_key: &str) -> Result<DerivedKey> {
        self.private_key_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.from_private_key(private_key)
    }

    fn from_mnemonic(&self, phrase: &str) -> Result<DerivedKey> {
        self.mnemonic_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.from_mnemonic(phrase)
    }

    fn sign_transaction(
        &self,
        private_key: &str,
        tx: &UnsignedTransaction,
    ) -> Result<SignedTransaction> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.sign_transaction(private_key, tx)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 存储
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Default)]
pub struct CountingStore {
    inner: MemorySecureStore,
    pub unavailable: AtomicBool,
    pub set_calls: AtomicUsize,
    pub get_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
}

impl CountingStore {
    pub fn total_calls(&self) -> usize {
        self.set_calls.load(Ordering::SeqCst)
            + self.get_calls.load(Ordering::SeqCst)
            + self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// 绕过计数直接读取
    pub async fn peek(&self, key: &str) -> Option<String> {
        self.inner
            .get(key, &StoreOptions::default())
            .await
            .expect("memory store read")
            .map(|s| s.to_string())
    }

    pub async fn plant(&self, key: &str, secret: &str) {
        self.inner
            .set(key, secret, &StoreOptions::default())
            .await
            .expect("memory store write");
    }

    fn check(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            anyhow::bail!("keychain is locked by the OS");
        }
        Ok(())
    }
}

#[async_trait]
impl SecureStore for CountingStore {
    async fn set(&self, key: &str, secret: &str, options: &StoreOptions) -> Result<()> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.set(key, secret, options).await
    }

    async fn get(&self, key: &str, options: &StoreOptions) -> Result<Option<Zeroizing<String>>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.get(key, options).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.delete(key).await
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 链网关
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct FakeGateway {
    balance: Mutex<Decimal>,
    balance_offline: AtomicBool,
    broadcast_rejection: Mutex<Option<String>>,
    history: Mutex<HistoryPage>,
    receipt: Mutex<Option<ReceiptSummary>>,
    mempool_tx: Mutex<Option<Value>>,
    pub balance_calls: AtomicUsize,
    pub estimate_calls: AtomicUsize,
    pub nonce_calls: AtomicUsize,
    pub gas_price_calls: AtomicUsize,
    pub broadcast_calls: AtomicUsize,
    pub history_calls: AtomicUsize,
    pub broadcasts: Mutex<Vec<String>>,
    pub estimates: Mutex<Vec<(String, String, u128)>>,
    pub history_queries: Mutex<Vec<(String, u32, Option<String>)>>,
}

impl Default for FakeGateway {
    fn default() -> Self {
        Self {
            balance: Mutex::new(Decimal::ZERO),
            balance_offline: AtomicBool::new(false),
            broadcast_rejection: Mutex::new(None),
            history: Mutex::new(HistoryPage::default()),
            receipt: Mutex::new(None),
            mempool_tx: Mutex::new(None),
            balance_calls: AtomicUsize::new(0),
            estimate_calls: AtomicUsize::new(0),
            nonce_calls: AtomicUsize::new(0),
            gas_price_calls: AtomicUsize::new(0),
            broadcast_calls: AtomicUsize::new(0),
            history_calls: AtomicUsize::new(0),
            broadcasts: Mutex::new(Vec::new()),
            estimates: Mutex::new(Vec::new()),
            history_queries: Mutex::new(Vec::new()),
        }
    }
}

impl FakeGateway {
    pub fn with_balance(balance: &str) -> Self {
        let gateway = Self::default();
        gateway.set_balance(balance);
        gateway
    }

    pub fn set_balance(&self, balance: &str) {
        *self.balance.lock().unwrap() = dec(balance);
    }

    pub fn set_offline(&self, offline: bool) {
        self.balance_offline.store(offline, Ordering::SeqCst);
    }

    pub fn reject_broadcasts(&self, message: &str) {
        *self.broadcast_rejection.lock().unwrap() = Some(message.to_string());
    }

    pub fn set_history(&self, page: HistoryPage) {
        *self.history.lock().unwrap() = page;
    }

    pub fn set_receipt(&self, receipt: Option<ReceiptSummary>) {
        *self.receipt.lock().unwrap() = receipt;
    }

    /// 交易池中可查到的交易
    pub fn set_mempool_tx(&self, tx: Option<Value>) {
        *self.mempool_tx.lock().unwrap() = tx;
    }

    /// 除 chain_id 之外的所有网络调用
    pub fn total_calls(&self) -> usize {
        self.balance_calls.load(Ordering::SeqCst)
            + self.estimate_calls.load(Ordering::SeqCst)
            + self.nonce_calls.load(Ordering::SeqCst)
            + self.gas_price_calls.load(Ordering::SeqCst)
            + self.broadcast_calls.load(Ordering::SeqCst)
            + self.history_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainGateway for FakeGateway {
    fn chain_id(&self) -> u64 {
        CHAIN_ID
    }

    async fn get_balance(&self, _address: &str) -> Result<Decimal> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        if self.balance_offline.load(Ordering::SeqCst) {
            anyhow::bail!("Failed to send RPC request: connection refused");
        }
        Ok(*self.balance.lock().unwrap())
    }

    async fn estimate_gas(&self, from: &str, to: &str, value_wei: u128) -> Result<u64> {
        self.estimate_calls.fetch_add(1, Ordering::SeqCst);
        self.estimates
            .lock()
            .unwrap()
            .push((from.to_string(), to.to_string(), value_wei));
        Ok(21_000)
    }

    async fn gas_price(&self) -> Result<u128> {
        self.gas_price_calls.fetch_add(1, Ordering::SeqCst);
        Ok(1_000_000_000)
    }

    async fn transaction_count(&self, _address: &str) -> Result<u64> {
        self.nonce_calls.fetch_add(1, Ordering::SeqCst);
        Ok(7)
    }

    async fn broadcast(&self, signed_raw_tx: &str) -> Result<String> {
        self.broadcast_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.broadcast_rejection.lock().unwrap().clone() {
            return Err(GatewayFault::Rpc {
                code: -32000,
                message,
            }
            .into());
        }
        self.broadcasts
            .lock()
            .unwrap()
            .push(signed_raw_tx.to_string());
        Ok(FAKE_TX_HASH.to_string())
    }

    async fn get_transaction(&self, _tx_hash: &str) -> Result<Option<Value>> {
        Ok(self.mempool_tx.lock().unwrap().clone())
    }

    async fn get_receipt(&self, _tx_hash: &str) -> Result<Option<ReceiptSummary>> {
        Ok(self.receipt.lock().unwrap().clone())
    }

    async fn get_transaction_history(
        &self,
        address: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<HistoryPage> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        self.history_queries.lock().unwrap().push((
            address.to_string(),
            page_size,
            page_token.map(str::to_string),
        ));
        Ok(self.history.lock().unwrap().clone())
    }
}

pub fn raw_record(hash: &str, from: &str, to: Option<&str>, value_hex: &str) -> RawTransactionRecord {
    RawTransactionRecord {
        hash: hash.to_string(),
        from: from.to_string(),
        to: to.map(str::to_string),
        value: value_hex.to_string(),
        block_number: "0x10".to_string(),
        time_stamp: "0x6553f100".to_string(),
        status: Some("0x1".to_string()),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 组装
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct Harness {
    pub manager: Arc<WalletManager>,
    pub keys: Arc<CountingKeys>,
    pub store: Arc<CountingStore>,
    pub gate: Arc<StaticGate>,
    pub gateway: Arc<FakeGateway>,
}

pub fn options() -> WalletManagerOptions {
    WalletManagerOptions {
        require_auth: false,
        ..WalletManagerOptions::default()
    }
}

impl Harness {
    pub fn new() -> Self {
        Self::with_parts(
            Arc::new(CountingStore::default()),
            StaticGate::approving(),
            FakeGateway::default(),
        )
    }

    pub fn with_parts(store: Arc<CountingStore>, gate: StaticGate, gateway: FakeGateway) -> Self {
        let keys = Arc::new(CountingKeys::default());
        let gate = Arc::new(gate);
        let gateway = Arc::new(gateway);
        let manager = Arc::new(WalletManager::new(
            keys.clone(),
            store.clone(),
            gate.clone(),
            gateway.clone(),
            options(),
        ));

        Self {
            manager,
            keys,
            store,
            gate,
            gateway,
        }
    }

    /// 同一存储上的新进程
    pub fn restart(&self) -> Self {
        Self::with_parts(
            self.store.clone(),
            StaticGate::approving(),
            FakeGateway::default(),
        )
    }

    /// 初始化并用给定私钥建钱包
    pub async fn with_wallet(key: &str, balance: &str) -> Self {
        let harness = Self::with_parts(
            Arc::new(CountingStore::default()),
            StaticGate::approving(),
            FakeGateway::with_balance(balance),
        );
        harness.manager.initialize().await.expect("initialize");
        harness
            .manager
            .create_wallet(ironpocket::domain::KeySource::PrivateKey(key.to_string()))
            .await
            .expect("create wallet");
        harness
    }
}
