//! 钱包错误分类
//!
//! 所有协作方（存储、生物识别、链网关）的错误都在编排层被包装成 `WalletError`，
//! 调用方只需按 `ErrorCategory` 分支，或直接展示 `user_message()`。

use std::fmt;

/// 错误大类（对外只暴露四类）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// 生物识别拒绝、缺少认证
    Authentication,
    /// 安全存储不可达或读写失败
    Storage,
    /// 链网关不可达、响应畸形、链上拒绝
    Blockchain,
    /// 地址/金额/私钥格式错误（在调用任何协作方之前拦截）
    InvalidInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletErrorCode {
    // 认证
    AuthenticationRequired,
    AuthenticationFailed,

    // 存储
    StorageUnavailable,
    StorageFailed,
    CorruptSecret,

    // 链
    GatewayUnavailable,
    MalformedResponse,
    TransactionRejected,

    // 输入
    InvalidKeyFormat,
    InvalidMnemonic,
    InvalidAddress,
    InvalidAmount,
    InvalidTransactionHash,
    InsufficientBalance,
    WalletNotLoaded,
    InvalidStateTransition,
}

impl WalletErrorCode {
    pub fn category(&self) -> ErrorCategory {
        use WalletErrorCode::*;

        match self {
            AuthenticationRequired | AuthenticationFailed => ErrorCategory::Authentication,
            StorageUnavailable | StorageFailed | CorruptSecret => ErrorCategory::Storage,
            GatewayUnavailable | MalformedResponse | TransactionRejected => {
                ErrorCategory::Blockchain
            }
            InvalidKeyFormat | InvalidMnemonic | InvalidAddress | InvalidAmount
            | InvalidTransactionHash | InsufficientBalance | WalletNotLoaded
            | InvalidStateTransition => {
                ErrorCategory::InvalidInput
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthenticationRequired => "authentication_required",
            Self::AuthenticationFailed => "authentication_failed",
            Self::StorageUnavailable => "storage_unavailable",
            Self::StorageFailed => "storage_failed",
            Self::CorruptSecret => "corrupt_secret",
            Self::GatewayUnavailable => "gateway_unavailable",
            Self::MalformedResponse => "malformed_response",
            Self::TransactionRejected => "transaction_rejected",
            Self::InvalidKeyFormat => "invalid_key_format",
            Self::InvalidMnemonic => "invalid_mnemonic",
            Self::InvalidAddress => "invalid_address",
            Self::InvalidAmount => "invalid_amount",
            Self::InvalidTransactionHash => "invalid_transaction_hash",
            Self::InsufficientBalance => "insufficient_balance",
            Self::WalletNotLoaded => "wallet_not_loaded",
            Self::InvalidStateTransition => "invalid_state_transition",
        }
    }
}

impl fmt::Display for WalletErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 链网关故障（网关实现放进 anyhow 链中，编排层据此归类）
#[derive(Debug, thiserror::Error)]
pub enum GatewayFault {
    /// 节点明确返回了 JSON-RPC error 对象
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("Invalid RPC response: {0}")]
    Malformed(String),
}

#[derive(Debug, thiserror::Error)]
#[error("{code}: {message}")]
pub struct WalletError {
    pub code: WalletErrorCode,
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

pub type WalletResult<T> = std::result::Result<T, WalletError>;

impl WalletError {
    pub fn new(code: WalletErrorCode, msg: impl Into<String>) -> Self {
        Self {
            code,
            message: msg.into(),
            source: None,
        }
    }

    /// 附带底层错误（保留 anyhow 上下文链）
    pub fn with_source(mut self, err: anyhow::Error) -> Self {
        self.source = Some(err.into());
        self
    }

    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    /// 面向用户的简短提示；技术细节只进日志
    pub fn user_message(&self) -> String {
        match self.code {
            WalletErrorCode::AuthenticationRequired => "Please unlock your wallet first".into(),
            WalletErrorCode::AuthenticationFailed => "Authentication was cancelled or failed".into(),
            WalletErrorCode::StorageUnavailable => {
                "Secure storage is unavailable on this device".into()
            }
            WalletErrorCode::StorageFailed => "Could not access secure storage".into(),
            WalletErrorCode::CorruptSecret => {
                "The stored wallet key is unreadable; restore from backup".into()
            }
            WalletErrorCode::GatewayUnavailable => {
                "Network unavailable, please check your connection and retry".into()
            }
            WalletErrorCode::MalformedResponse => {
                "The blockchain node returned an unexpected response".into()
            }
            WalletErrorCode::TransactionRejected => {
                format!("Transaction rejected: {}", self.message)
            }
            WalletErrorCode::InvalidKeyFormat => {
                "Private key must be 64 hexadecimal characters".into()
            }
            WalletErrorCode::InvalidMnemonic => "Recovery phrase is not valid".into(),
            WalletErrorCode::InvalidAddress => "Recipient address is not valid".into(),
            WalletErrorCode::InvalidAmount => "Amount must be a positive number".into(),
            WalletErrorCode::InvalidTransactionHash => "Transaction hash is not valid".into(),
            WalletErrorCode::InsufficientBalance => "Insufficient balance".into(),
            WalletErrorCode::WalletNotLoaded => "No wallet on this device yet".into(),
            WalletErrorCode::InvalidStateTransition => self.message.clone(),
        }
    }

    // 认证
    pub fn authentication_required(msg: impl Into<String>) -> Self {
        Self::new(WalletErrorCode::AuthenticationRequired, msg)
    }

    pub fn authentication_failed(msg: impl Into<String>) -> Self {
        Self::new(WalletErrorCode::AuthenticationFailed, msg)
    }

    // 存储
    pub fn storage_unavailable(err: anyhow::Error) -> Self {
        Self::new(WalletErrorCode::StorageUnavailable, err.to_string()).with_source(err)
    }

    pub fn storage_failed(err: anyhow::Error) -> Self {
        Self::new(WalletErrorCode::StorageFailed, err.to_string()).with_source(err)
    }

    pub fn corrupt_secret(err: anyhow::Error) -> Self {
        Self::new(WalletErrorCode::CorruptSecret, err.to_string()).with_source(err)
    }

    // 链
    pub fn gateway_unavailable(err: anyhow::Error) -> Self {
        Self::new(WalletErrorCode::GatewayUnavailable, format!("{:#}", err)).with_source(err)
    }

    pub fn malformed_response(err: anyhow::Error) -> Self {
        Self::new(WalletErrorCode::MalformedResponse, format!("{:#}", err)).with_source(err)
    }

    pub fn transaction_rejected(err: anyhow::Error) -> Self {
        Self::new(WalletErrorCode::TransactionRejected, format!("{:#}", err)).with_source(err)
    }

    /// 网关错误归类：沿 anyhow 链查找 `GatewayFault`，找不到则视为网络不可达
    pub fn from_gateway(err: anyhow::Error) -> Self {
        let fault = err.chain().find_map(|e| e.downcast_ref::<GatewayFault>());
        let rejected = matches!(fault, Some(GatewayFault::Rpc { .. }));
        let malformed = matches!(fault, Some(GatewayFault::Malformed(_)));

        if rejected {
            Self::transaction_rejected(err)
        } else if malformed {
            Self::malformed_response(err)
        } else {
            Self::gateway_unavailable(err)
        }
    }

    // 输入
    pub fn invalid_key_format(msg: impl Into<String>) -> Self {
        Self::new(WalletErrorCode::InvalidKeyFormat, msg)
    }

    pub fn invalid_mnemonic(msg: impl Into<String>) -> Self {
        Self::new(WalletErrorCode::InvalidMnemonic, msg)
    }

    pub fn invalid_address(msg: impl Into<String>) -> Self {
        Self::new(WalletErrorCode::InvalidAddress, msg)
    }

    pub fn invalid_amount(msg: impl Into<String>) -> Self {
        Self::new(WalletErrorCode::InvalidAmount, msg)
    }

    pub fn invalid_transaction_hash(msg: impl Into<String>) -> Self {
        Self::new(WalletErrorCode::InvalidTransactionHash, msg)
    }

    pub fn insufficient_balance(msg: impl Into<String>) -> Self {
        Self::new(WalletErrorCode::InsufficientBalance, msg)
    }

    pub fn wallet_not_loaded() -> Self {
        Self::new(WalletErrorCode::WalletNotLoaded, "no wallet is loaded")
    }

    pub fn invalid_state_transition(msg: impl Into<String>) -> Self {
        Self::new(WalletErrorCode::InvalidStateTransition, msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_mapping() {
        assert_eq!(
            WalletError::invalid_key_format("bad").category(),
            ErrorCategory::InvalidInput
        );
        assert_eq!(
            WalletError::authentication_failed("declined").category(),
            ErrorCategory::Authentication
        );
        assert_eq!(
            WalletError::storage_unavailable(anyhow::anyhow!("keychain locked")).category(),
            ErrorCategory::Storage
        );
        assert_eq!(
            WalletError::gateway_unavailable(anyhow::anyhow!("connection refused")).category(),
            ErrorCategory::Blockchain
        );
    }

    #[test]
    fn test_from_gateway_classification() {
        let rejected = WalletError::from_gateway(
            anyhow::Error::new(GatewayFault::Rpc {
                code: -32000,
                message: "nonce too low".into(),
            })
            .context("eth_sendRawTransaction failed"),
        );
        assert_eq!(rejected.code, WalletErrorCode::TransactionRejected);
        assert!(rejected.message.contains("nonce too low"));

        let malformed = WalletError::from_gateway(anyhow::Error::new(GatewayFault::Malformed(
            "missing result".into(),
        )));
        assert_eq!(malformed.code, WalletErrorCode::MalformedResponse);

        let offline = WalletError::from_gateway(anyhow::anyhow!("Failed to send RPC request"));
        assert_eq!(offline.code, WalletErrorCode::GatewayUnavailable);
    }

    #[test]
    fn test_display_keeps_code_and_message() {
        let err = WalletError::insufficient_balance("amount 2 exceeds balance 1");
        assert_eq!(
            err.to_string(),
            "insufficient_balance: amount 2 exceeds balance 1"
        );
        assert_eq!(err.user_message(), "Insufficient balance");
    }
}
