//! 金额换算：用户输入的以太单位 Decimal 与链上 wei 整数之间的转换

use std::str::FromStr;

use anyhow::{Context, Result};
use rust_decimal::{Decimal, RoundingStrategy};

/// 1 ETH = 10^18 wei
pub const NATIVE_DECIMALS: u32 = 18;

/// Decimal 可精确表示的有效数字位数
const DECIMAL_DIGITS: u32 = 28;

/// 解析用户输入的金额，必须为正数
pub fn parse_positive_amount(input: &str) -> Result<Decimal> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        anyhow::bail!("Amount is empty");
    }

    let amount = Decimal::from_str(trimmed)
        .with_context(|| format!("Amount is not a decimal number: {}", trimmed))?;

    if amount <= Decimal::ZERO {
        anyhow::bail!("Amount must be positive: {}", trimmed);
    }
    if amount.scale() > NATIVE_DECIMALS {
        anyhow::bail!("Amount has more than {} decimal places", NATIVE_DECIMALS);
    }

    Ok(amount)
}

/// 以太单位 → wei
pub fn ether_to_wei(amount: Decimal) -> Result<u128> {
    if amount.is_sign_negative() {
        anyhow::bail!("Negative amount: {}", amount);
    }

    // Decimal 尾数最多 96 位；以 10^scale 为底拆分整数与小数部分，避免乘法溢出
    let mantissa = u128::try_from(amount.mantissa()).context("Amount mantissa out of range")?;
    let scale = amount.scale();
    if scale > NATIVE_DECIMALS {
        anyhow::bail!("Amount has more than {} decimal places", NATIVE_DECIMALS);
    }

    let factor = 10u128.pow(NATIVE_DECIMALS - scale);
    mantissa
        .checked_mul(factor)
        .context("Amount overflows wei range")
}

/// wei → 以太单位
///
/// 超过 28 位有效数字时截掉多余的小数位（向零取整，结果不会大于真实值）
pub fn wei_to_ether(wei: u128) -> Result<Decimal> {
    let base = 10u128.pow(NATIVE_DECIMALS);
    let whole_wei = wei / base;

    let whole =
        Decimal::from_str(&whole_wei.to_string()).context("Balance integer part too large")?;
    let frac = Decimal::from_i128_with_scale((wei % base) as i128, NATIVE_DECIMALS);

    let int_digits = whole_wei.checked_ilog10().map_or(0, |d| d + 1);
    let frac_digits = DECIMAL_DIGITS.saturating_sub(int_digits).min(NATIVE_DECIMALS);
    let frac = frac.round_dp_with_strategy(frac_digits, RoundingStrategy::ToZero);

    Ok((whole + frac).normalize())
}

/// 解析 `0x` 前缀的十六进制数量（u128）
pub fn parse_hex_quantity(hex_str: &str) -> Result<u128> {
    let body = hex_str
        .strip_prefix("0x")
        .with_context(|| format!("Hex quantity missing 0x prefix: {}", hex_str))?;
    if body.is_empty() {
        anyhow::bail!("Empty hex quantity");
    }
    if body.len() > 32 {
        anyhow::bail!("Hex quantity too long: {}", body.len());
    }
    u128::from_str_radix(body, 16).with_context(|| format!("Invalid hex quantity: {}", hex_str))
}

/// u64 版本（区块号、nonce、gas）
pub fn parse_hex_u64(hex_str: &str) -> Result<u64> {
    let value = parse_hex_quantity(hex_str)?;
    u64::try_from(value).with_context(|| format!("Hex quantity exceeds u64: {}", hex_str))
}

/// 整数 → `0x` 十六进制数量
pub fn to_hex_quantity(value: u128) -> String {
    format!("0x{:x}", value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_positive_amount() {
        assert_eq!(
            parse_positive_amount(" 1.5 ").unwrap(),
            Decimal::from_str("1.5").unwrap()
        );
        assert!(parse_positive_amount("0").is_err());
        assert!(parse_positive_amount("-1").is_err());
        assert!(parse_positive_amount("abc").is_err());
        assert!(parse_positive_amount("").is_err());
        assert!(parse_positive_amount("0.0000000000000000001").is_err()); // 19 位小数
    }

    #[test]
    fn test_ether_wei_conversion() {
        let one = Decimal::from_str("1.0").unwrap();
        assert_eq!(ether_to_wei(one).unwrap(), 1_000_000_000_000_000_000);

        let small = Decimal::from_str("0.000000000000000001").unwrap();
        assert_eq!(ether_to_wei(small).unwrap(), 1);

        assert_eq!(
            wei_to_ether(2_500_000_000_000_000_000).unwrap(),
            Decimal::from_str("2.5").unwrap()
        );
        assert_eq!(wei_to_ether(0).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_wei_to_ether_truncates_toward_zero() {
        // 10^30 - 1 wei：30 位有效数字，不能被进位成 10^12 ETH
        let almost = 10u128.pow(30) - 1;
        let ether = wei_to_ether(almost).unwrap();
        assert!(ether < Decimal::from(1_000_000_000_000u64));
        assert_eq!(ether.to_string(), "999999999999.9999999999999999");

        let max = wei_to_ether(u128::MAX).unwrap();
        assert_eq!(max.to_string(), "340282366920938463463.3746074");

        // 28 位以内保持精确
        assert_eq!(
            wei_to_ether(1_234_567_890_123_456_789).unwrap(),
            Decimal::from_str("1.234567890123456789").unwrap()
        );
    }

    #[test]
    fn test_parse_hex_quantity() {
        assert_eq!(parse_hex_quantity("0x1bc16d674ec80000").unwrap(), 2_000_000_000_000_000_000);
        assert_eq!(parse_hex_quantity("0x0").unwrap(), 0);
        assert_eq!(parse_hex_u64("0x1a2b3c").unwrap(), 1715004);
        assert!(parse_hex_quantity("1a").is_err());
        assert!(parse_hex_quantity("0x").is_err());
        assert!(parse_hex_quantity("0xzz").is_err());
        assert_eq!(to_hex_quantity(255), "0xff");
    }
}
