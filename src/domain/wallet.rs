//! 钱包领域模型
//!
//! `WalletHandle` 是进程内唯一的活动密钥；私钥只在这里和安全存储中出现。

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use zeroize::Zeroizing;

/// 密钥来源
#[derive(Clone)]
pub enum KeySource {
    /// 随机熵生成
    Random,
    /// 用户提供的私钥（hex，可带 0x）
    PrivateKey(String),
    /// 用户提供的 BIP39 助记词
    Mnemonic(String),
}

impl KeySource {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::PrivateKey(_) => "private_key",
            Self::Mnemonic(_) => "mnemonic",
        }
    }
}

// 不打印私钥/助记词
impl fmt::Debug for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeySource::{}", self.kind())
    }
}

/// 派生出的密钥对
pub struct DerivedKey {
    /// EIP-55 校验和地址
    pub address: String,
    /// `0x` + 64 位小写十六进制
    pub private_key: Zeroizing<String>,
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedKey")
            .field("address", &self.address)
            .field("private_key", &"***REDACTED***")
            .finish()
    }
}

/// 活动钱包句柄
pub struct WalletHandle {
    address: String,
    private_key: Zeroizing<String>,
    /// 绑定的链（绑定后才能查余额/转账）
    chain_id: Option<u64>,
    balance: Option<Decimal>,
    balance_updated_at: Option<DateTime<Utc>>,
}

impl WalletHandle {
    pub fn new(key: DerivedKey) -> Self {
        Self {
            address: key.address,
            private_key: key.private_key,
            chain_id: None,
            balance: None,
            balance_updated_at: None,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn private_key(&self) -> &str {
        self.private_key.as_str()
    }

    pub fn bind(&mut self, chain_id: u64) {
        self.chain_id = Some(chain_id);
    }

    pub fn chain_id(&self) -> Option<u64> {
        self.chain_id
    }

    pub fn balance(&self) -> Option<Decimal> {
        self.balance
    }

    pub fn balance_updated_at(&self) -> Option<DateTime<Utc>> {
        self.balance_updated_at
    }

    pub fn set_balance(&mut self, balance: Decimal) {
        self.balance = Some(balance);
        self.balance_updated_at = Some(Utc::now());
    }

    pub fn summary(&self, created_from: Option<&'static str>) -> WalletSummary {
        WalletSummary {
            address: self.address.clone(),
            balance: self.balance,
            chain_id: self.chain_id,
            created_from,
        }
    }
}

impl fmt::Debug for WalletHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletHandle")
            .field("address", &self.address)
            .field("chain_id", &self.chain_id)
            .field("balance", &self.balance)
            .finish_non_exhaustive()
    }
}

/// 对外暴露的钱包信息（不含私钥）
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WalletSummary {
    pub address: String,
    pub balance: Option<Decimal>,
    pub chain_id: Option<u64>,
    pub created_from: Option<&'static str>,
}

/// 待提交的转账（仅在输入与提交期间存在，从不持久化）
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSend {
    pub recipient: String,
    pub amount: Decimal,
    pub estimated_gas: u64,
}

/// 广播成功后的回执
#[derive(Debug, Clone, Serialize)]
pub struct SendReceipt {
    pub tx_hash: String,
    pub recipient: String,
    pub amount: Decimal,
    pub gas_limit: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_key() -> DerivedKey {
        DerivedKey {
            address: "0x2c7536E3605D9C16a7a3D7b1898e529396a65c23".into(),
            private_key: Zeroizing::new(
                "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318".into(),
            ),
        }
    }

    #[test]
    fn test_debug_never_prints_secret() {
        let handle = WalletHandle::new(sample_key());
        let printed = format!("{:?}", handle);
        assert!(!printed.contains("4c0883a6"));
        assert!(printed.contains("0x2c7536E3605D9C16a7a3D7b1898e529396a65c23"));

        let source = KeySource::PrivateKey("4c0883a6".into());
        assert_eq!(format!("{:?}", source), "KeySource::private_key");
    }

    #[test]
    fn test_bind_and_balance() {
        let mut handle = WalletHandle::new(sample_key());
        assert!(handle.chain_id().is_none());
        assert!(handle.balance().is_none());

        handle.bind(1);
        handle.set_balance(Decimal::new(15, 1));
        assert_eq!(handle.chain_id(), Some(1));
        assert_eq!(handle.balance(), Some(Decimal::new(15, 1)));
        assert!(handle.balance_updated_at().is_some());

        let summary = handle.summary(Some("private_key"));
        assert_eq!(summary.address, handle.address());
        assert_eq!(summary.created_from, Some("private_key"));
    }
}
