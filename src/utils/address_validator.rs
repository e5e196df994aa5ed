//! 地址与私钥格式校验
//!
//! 只支持 EVM 地址：`0x` + 40 个十六进制字符，混合大小写时必须满足 EIP-55。
//! 私钥：可选 `0x` 前缀 + 64 个十六进制字符。

use std::sync::OnceLock;

use regex::Regex;
use sha3::{Digest, Keccak256};

static PRIVATE_KEY_PATTERN: OnceLock<Regex> = OnceLock::new();

fn private_key_pattern() -> &'static Regex {
    PRIVATE_KEY_PATTERN.get_or_init(|| {
        Regex::new(r"^(0x)?[0-9a-fA-F]{64}$").expect("static private key pattern")
    })
}

/// 地址验证器
pub struct AddressValidator;

impl AddressValidator {
    /// 验证 EVM 地址（支持 EIP-55 Checksum）
    pub fn is_valid(address: &str) -> bool {
        // 1. 基本格式检查
        let Some(hex_part) = address.strip_prefix("0x") else {
            return false;
        };
        if hex_part.len() != 40 {
            return false;
        }

        // 2. 验证hex字符
        if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return false;
        }

        // 3. 全小写/全大写不带校验信息，直接放行
        let has_lower = hex_part.chars().any(|c| c.is_ascii_lowercase());
        let has_upper = hex_part.chars().any(|c| c.is_ascii_uppercase());
        if !(has_lower && has_upper) {
            return true;
        }

        Self::to_checksum(address).as_deref() == Some(address)
    }

    /// 计算 EIP-55 校验和地址
    /// https://eips.ethereum.org/EIPS/eip-55
    pub fn to_checksum(address: &str) -> Option<String> {
        let hex_part = address.strip_prefix("0x")?;
        if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }

        let addr_lower = hex_part.to_lowercase();
        let hash = Keccak256::digest(addr_lower.as_bytes());

        let mut out = String::with_capacity(42);
        out.push_str("0x");
        for (i, ch) in addr_lower.chars().enumerate() {
            let hash_byte = hash[i / 2];
            let hash_nibble = if i % 2 == 0 {
                hash_byte >> 4
            } else {
                hash_byte & 0x0f
            };

            if ch.is_ascii_alphabetic() && hash_nibble >= 8 {
                out.push(ch.to_ascii_uppercase());
            } else {
                out.push(ch);
            }
        }

        Some(out)
    }

    /// 地址比较不区分大小写
    pub fn same_address(a: &str, b: &str) -> bool {
        a.trim().eq_ignore_ascii_case(b.trim())
    }

    /// 私钥格式校验（只看形状，不判断是否落在曲线阶内）
    pub fn is_valid_private_key(key: &str) -> bool {
        private_key_pattern().is_match(key.trim())
    }

    /// 规范化私钥为 `0x` + 小写十六进制
    pub fn normalize_private_key(key: &str) -> Option<String> {
        let key = key.trim();
        if !Self::is_valid_private_key(key) {
            return None;
        }
        let body = key.strip_prefix("0x").unwrap_or(key);
        Some(format!("0x{}", body.to_lowercase()))
    }
}
