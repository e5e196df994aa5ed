//! IronPocket - 单钱包 EVM 密钥生命周期核心
//!
//! 非托管：私钥只存在于设备的安全存储与进程内存中，任何日志都不输出密钥材料

pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod service;
pub mod utils;

// 重新导出常用类型
pub use error::{ErrorCategory, WalletError, WalletErrorCode, WalletResult};
pub use service::wallet_manager::{WalletManager, WalletManagerOptions};

// 统一模块导出
pub mod prelude {
    pub use crate::{
        config::Config,
        domain::{
            Direction, KeySource, PendingSend, SendReceipt, SessionState, TransactionPage,
            TransactionRecord, TxProgress, TxStatus, WalletSummary,
        },
        error::{ErrorCategory, WalletError, WalletErrorCode, WalletResult},
        service::{
            BiometricGate, ChainGateway, FileSecureStore, GasEstimateDebouncer,
            JsonRpcChainGateway, KeyMaterialProvider, MemorySecureStore, NoBiometricHardware,
            Secp256k1KeyProvider, SecureStore, StoreOptions, WalletManager, WalletManagerOptions,
        },
    };
}
