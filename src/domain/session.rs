//! 会话状态机（每次进程启动一个会话）

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// 冷启动，尚未读取安全存储
    Uninitialized,
    /// 正在读取安全存储
    Initializing,
    /// 设备上没有钱包，等待调用方创建/恢复
    NoWallet,
    /// 钱包已加载但本会话尚未认证
    WalletLoaded,
    /// 生物识别挑战进行中
    Authenticating,
    Authenticated,
    AuthFailed,
}

impl SessionState {
    /// 验证状态转换合法性
    pub fn can_transition_to(&self, target: &Self) -> bool {
        use SessionState::*;

        match (self, target) {
            (Uninitialized, Initializing) => true,

            // 读取完成或存储不可达回退
            (Initializing, NoWallet) | (Initializing, WalletLoaded) | (Initializing, Uninitialized) => {
                true
            }

            // 创建/恢复：任何已初始化状态都可以载入新钱包
            (NoWallet, WalletLoaded)
            | (WalletLoaded, WalletLoaded)
            | (Authenticated, WalletLoaded)
            | (AuthFailed, WalletLoaded) => true,

            // 认证：首次、失败重试、已认证后重新挑战
            (WalletLoaded, Authenticating)
            | (AuthFailed, Authenticating)
            | (Authenticated, Authenticating) => true,
            (Authenticating, Authenticated) | (Authenticating, AuthFailed) => true,

            // 删除钱包
            (WalletLoaded, NoWallet) | (Authenticated, NoWallet) | (AuthFailed, NoWallet) => true,

            // 重新初始化
            (NoWallet, Initializing)
            | (WalletLoaded, Initializing)
            | (Authenticated, Initializing)
            | (AuthFailed, Initializing) => true,

            _ => false,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::NoWallet => "no_wallet",
            Self::WalletLoaded => "wallet_loaded",
            Self::Authenticating => "authenticating",
            Self::Authenticated => "authenticated",
            Self::AuthFailed => "auth_failed",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::SessionState::*;

    #[test]
    fn test_cold_start_paths() {
        assert!(Uninitialized.can_transition_to(&Initializing));
        assert!(Initializing.can_transition_to(&NoWallet));
        assert!(Initializing.can_transition_to(&WalletLoaded));
        assert!(Initializing.can_transition_to(&Uninitialized));
        assert!(!Uninitialized.can_transition_to(&WalletLoaded));
    }

    #[test]
    fn test_authentication_paths() {
        assert!(WalletLoaded.can_transition_to(&Authenticating));
        assert!(Authenticating.can_transition_to(&Authenticated));
        assert!(Authenticating.can_transition_to(&AuthFailed));
        assert!(AuthFailed.can_transition_to(&Authenticating));
        assert!(!NoWallet.can_transition_to(&Authenticating));
        assert!(!Authenticating.can_transition_to(&WalletLoaded));
    }

    #[test]
    fn test_display() {
        assert_eq!(AuthFailed.to_string(), "auth_failed");
        assert_eq!(NoWallet.to_string(), "no_wallet");
    }
}
