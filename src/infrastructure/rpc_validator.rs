// RPC响应校验模块 - 防止链上数据污染
// 所有校验失败都以 GatewayFault 形式进入错误链，编排层据此归类

use anyhow::Result;
use serde_json::Value;

use crate::{error::GatewayFault, utils::amount::parse_hex_quantity};

/// 最大余额上限：10^30 wei（约 1 万亿个以太币）
const MAX_REASONABLE_BALANCE: u128 = 1_000_000_000_000_000_000_000_000_000_000;
/// 单笔 gas limit 上限
const MAX_REASONABLE_GAS: u64 = 30_000_000;

fn malformed(msg: impl Into<String>) -> anyhow::Error {
    GatewayFault::Malformed(msg.into()).into()
}

/// 验证RPC响应格式，返回 result 字段
pub fn validate_rpc_response(json: Value) -> Result<Value> {
    // 检查是否有error字段
    if let Some(error) = json.get("error") {
        let code = error.get("code").and_then(|c| c.as_i64()).unwrap_or(-1);
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown error")
            .to_string();
        return Err(GatewayFault::Rpc { code, message }.into());
    }

    // 检查jsonrpc版本
    if let Some(version) = json.get("jsonrpc") {
        if version.as_str() != Some("2.0") {
            return Err(malformed(format!("Unsupported JSON-RPC version: {}", version)));
        }
    }

    match json {
        Value::Object(mut map) => map
            .remove("result")
            .ok_or_else(|| malformed("Missing result field in RPC response")),
        other => Err(malformed(format!("RPC response is not an object: {}", other))),
    }
}

/// result 必须是字符串
pub fn expect_string(result: &Value, what: &str) -> Result<String> {
    result
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| malformed(format!("{} is not a string: {}", what, result)))
}

/// 验证RPC返回的余额值（wei）
pub fn validate_balance(balance_hex: &str) -> Result<u128> {
    let balance = parse_hex_quantity(balance_hex)
        .map_err(|e| malformed(format!("Failed to parse balance: {}", e)))?;

    if balance > MAX_REASONABLE_BALANCE {
        return Err(malformed(format!(
            "Balance exceeds reasonable maximum: {}",
            balance
        )));
    }

    Ok(balance)
}

/// 验证RPC返回的nonce值
pub fn validate_nonce(nonce_hex: &str) -> Result<u64> {
    let nonce = parse_hex_quantity(nonce_hex)
        .map_err(|e| malformed(format!("Failed to parse nonce: {}", e)))?;
    u64::try_from(nonce).map_err(|_| malformed(format!("Nonce exceeds u64: {}", nonce_hex)))
}

/// 验证RPC返回的gas值
pub fn validate_gas(gas_hex: &str) -> Result<u64> {
    let gas = parse_hex_quantity(gas_hex)
        .map_err(|e| malformed(format!("Failed to parse gas: {}", e)))?;

    if gas > MAX_REASONABLE_GAS as u128 {
        return Err(malformed(format!("Gas exceeds reasonable maximum: {}", gas)));
    }

    Ok(gas as u64)
}

/// 验证RPC返回的 gas price（wei）
pub fn validate_gas_price(price_hex: &str) -> Result<u128> {
    parse_hex_quantity(price_hex).map_err(|e| malformed(format!("Failed to parse gas price: {}", e)))
}

/// 验证交易哈希格式
pub fn validate_tx_hash(tx_hash: &str) -> Result<String> {
    let hash = tx_hash.strip_prefix("0x").unwrap_or(tx_hash);

    // 以太坊交易哈希为32字节 = 64个十六进制字符
    if hash.len() != 64 {
        return Err(malformed(format!(
            "Invalid transaction hash length: expected 64, got {}",
            hash.len()
        )));
    }

    if !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(malformed(
            "Invalid transaction hash format: contains non-hex characters",
        ));
    }

    Ok(format!("0x{}", hash.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn fault_of(err: &anyhow::Error) -> Option<&GatewayFault> {
        err.downcast_ref::<GatewayFault>()
    }

    #[test]
    fn test_validate_balance() {
        assert_eq!(
            validate_balance("0x1bc16d674ec80000").unwrap(),
            2_000_000_000_000_000_000
        ); // 2 ETH
        assert_eq!(validate_balance("0x0").unwrap(), 0);
        assert!(validate_balance("invalid").is_err());
        assert!(validate_balance("0xffffffffffffffffffffffffffffffff").is_err());
    }

    #[test]
    fn test_validate_nonce_and_gas() {
        assert_eq!(validate_nonce("0x5").unwrap(), 5);
        assert_eq!(validate_gas("0x5208").unwrap(), 21000);
        assert!(validate_gas("0x7fffffff").is_err());
    }

    #[test]
    fn test_validate_tx_hash() {
        let hash = "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b";
        assert_eq!(validate_tx_hash(hash).unwrap(), hash);
        assert!(validate_tx_hash("0x1234").is_err());
    }

    #[test]
    fn test_validate_rpc_response_extracts_result() {
        let result = validate_rpc_response(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": "0x10"
        }))
        .unwrap();
        assert_eq!(result, json!("0x10"));
    }

    #[test]
    fn test_validate_rpc_response_error_is_rpc_fault() {
        let err = validate_rpc_response(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": -32000, "message": "insufficient funds for gas * price + value"}
        }))
        .unwrap_err();

        match fault_of(&err) {
            Some(GatewayFault::Rpc { code, message }) => {
                assert_eq!(*code, -32000);
                assert!(message.contains("insufficient funds"));
            }
            other => panic!("unexpected fault: {:?}", other),
        }
    }

    #[test]
    fn test_validate_rpc_response_missing_result_is_malformed() {
        let err = validate_rpc_response(json!({"jsonrpc": "2.0", "id": 1})).unwrap_err();
        assert!(matches!(fault_of(&err), Some(GatewayFault::Malformed(_))));

        let err = validate_rpc_response(json!({"jsonrpc": "1.0", "result": "0x1"})).unwrap_err();
        assert!(matches!(fault_of(&err), Some(GatewayFault::Malformed(_))));
    }
}
