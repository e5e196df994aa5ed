//! 日志脱敏
//! 地址只显示前后缀；私钥、助记词在任何日志中都不允许出现

use std::sync::OnceLock;

use regex::Regex;

static SECRET_HEX: OnceLock<Regex> = OnceLock::new();
static MNEMONIC_LIKE: OnceLock<Regex> = OnceLock::new();

const REDACTED: &str = "***REDACTED***";

/// 脱敏十六进制字符串（显示前缀和后缀）
pub fn redact_hex_string(hex: &str, show_chars: usize) -> String {
    if hex.len() <= show_chars * 2 {
        return "*".repeat(hex.len());
    }

    let prefix = &hex[..show_chars];
    let suffix = &hex[hex.len() - show_chars..];
    format!("{}...{}", prefix, suffix)
}

/// 脱敏地址（显示前6位和后4位）
pub fn redact_address(address: &str) -> String {
    if address.len() < 10 {
        return "*".repeat(address.len());
    }

    let prefix = &address[..6];
    let suffix = &address[address.len() - 4..];
    format!("{}...{}", prefix, suffix)
}

fn secret_hex() -> &'static Regex {
    // 64 位十六进制（私钥/交易哈希同形，宁可多删）
    SECRET_HEX.get_or_init(|| Regex::new(r"(0x)?[0-9a-fA-F]{64}").expect("static secret pattern"))
}

fn mnemonic_like() -> &'static Regex {
    // 连续 12 个以上的小写单词
    MNEMONIC_LIKE.get_or_init(|| {
        Regex::new(r"\b([a-z]{3,8}\s+){11,23}[a-z]{3,8}\b").expect("static mnemonic pattern")
    })
}

/// 清洗自由文本（错误信息等）中的疑似私钥与助记词
pub fn sanitize_message(text: &str) -> String {
    let step = secret_hex().replace_all(text, REDACTED);
    mnemonic_like().replace_all(&step, REDACTED).into_owned()
}
