//! 时间工具模块
//! 链上时间戳（十六进制秒）与 UTC 时间之间的换算

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};

use crate::utils::amount::parse_hex_u64;

/// 格式化时间戳为RFC3339格式
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

/// 十六进制秒 → UTC 时间
pub fn hex_seconds_to_datetime(hex_secs: &str) -> Result<DateTime<Utc>> {
    let secs = parse_hex_u64(hex_secs)?;
    let secs = i64::try_from(secs).context("Timestamp out of range")?;
    Utc.timestamp_opt(secs, 0)
        .single()
        .with_context(|| format!("Invalid timestamp: {}", hex_secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_seconds_conversion() {
        // 0x6553f100 = 1700000000
        let dt = hex_seconds_to_datetime("0x6553f100").unwrap();
        assert_eq!(dt.timestamp(), 1_700_000_000);
        assert_eq!(dt.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(format_timestamp(&dt), "2023-11-14T22:13:20+00:00");
    }

    #[test]
    fn test_invalid_hex_timestamp() {
        assert!(hex_seconds_to_datetime("1700000000").is_err());
        assert!(hex_seconds_to_datetime("0xnothex").is_err());
    }
}
