pub mod biometric;
pub mod chain_gateway;
pub mod gas_debounce; // 转账输入的 gas 预估防抖
pub mod key_provider;
pub mod secure_store;
pub mod wallet_manager;

pub use biometric::{BiometricGate, ConsolePromptGate, NoBiometricHardware, StaticGate};
pub use chain_gateway::{ChainGateway, JsonRpcChainGateway, ReceiptSummary};
pub use gas_debounce::{GasEstimateDebouncer, DEFAULT_GAS_DEBOUNCE};
pub use key_provider::{
    KeyMaterialProvider, Secp256k1KeyProvider, SignedTransaction, UnsignedTransaction,
};
pub use secure_store::{
    FileSecureStore, MemorySecureStore, SecureStore, StoreFault, StoreOptions,
};
pub use wallet_manager::{WalletManager, WalletManagerOptions};
