//! Domain 模块
//!
//! 钱包句柄、交易记录与会话状态

pub mod session;
pub mod transaction;
pub mod wallet;

// 重新导出常用类型
pub use session::SessionState;
pub use transaction::{
    reconcile_page, Direction, HistoryPage, RawTransactionRecord, TransactionPage,
    TransactionRecord, TxProgress, TxStatus,
};
pub use wallet::{DerivedKey, KeySource, PendingSend, SendReceipt, WalletHandle, WalletSummary};
