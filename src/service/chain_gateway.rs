// 链网关 - JSON-RPC 2.0 客户端
// 单节点、单链；不做重试与故障转移，错误原样交给编排层归类

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    config::GatewayConfig,
    domain::{HistoryPage, TxStatus},
    error::GatewayFault,
    infrastructure::{
        log_redact::{redact_address, redact_hex_string},
        rpc_validator,
    },
    utils::amount::{parse_hex_u64, to_hex_quantity, wei_to_ether},
};

/// 交易回执摘要
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReceiptSummary {
    pub tx_hash: String,
    pub block_number: Option<u64>,
    pub gas_used: Option<u64>,
    pub status: TxStatus,
}

#[async_trait]
pub trait ChainGateway: Send + Sync {
    /// 网关所在链（本地配置，不触网）
    fn chain_id(&self) -> u64;

    /// 原生币余额（以太单位）
    async fn get_balance(&self, address: &str) -> Result<Decimal>;

    async fn estimate_gas(&self, from: &str, to: &str, value_wei: u128) -> Result<u64>;

    async fn gas_price(&self) -> Result<u128>;

    /// pending nonce
    async fn transaction_count(&self, address: &str) -> Result<u64>;

    /// 广播已签名交易，返回交易哈希
    async fn broadcast(&self, signed_raw_tx: &str) -> Result<String>;

    /// 交易池或链上都查不到返回 `None`
    async fn get_transaction(&self, tx_hash: &str) -> Result<Option<Value>>;

    /// 未上链返回 `None`
    async fn get_receipt(&self, tx_hash: &str) -> Result<Option<ReceiptSummary>>;

    /// 索引历史查询（单页）
    async fn get_transaction_history(
        &self,
        address: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<HistoryPage>;
}

pub struct JsonRpcChainGateway {
    http_client: reqwest::Client,
    rpc_url: String,
    chain_id: u64,
    history_method: String,
    request_id: AtomicU64,
}

impl JsonRpcChainGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http_client,
            rpc_url: config.rpc_url.clone(),
            chain_id: config.chain_id,
            history_method: config.history_method.clone(),
            request_id: AtomicU64::new(1),
        })
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// 发送一次 JSON-RPC 调用，返回校验后的 result
    async fn rpc_call(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id
        });

        tracing::debug!(method = %method, id = id, "JSON-RPC request");

        let response = self
            .http_client
            .post(&self.rpc_url)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("Failed to send RPC request: {}", method))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            anyhow::bail!("RPC request {} failed with status {}", method, status);
        }

        let json: Value = serde_json::from_str(&body)
            .map_err(|e| GatewayFault::Malformed(format!("{} returned non-JSON body: {}", method, e)))?;

        rpc_validator::validate_rpc_response(json)
            .with_context(|| format!("RPC method {} failed", method))
    }
}

#[async_trait]
impl ChainGateway for JsonRpcChainGateway {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn get_balance(&self, address: &str) -> Result<Decimal> {
        let result = self
            .rpc_call("eth_getBalance", json!([address, "latest"]))
            .await?;
        let wei = rpc_validator::validate_balance(&rpc_validator::expect_string(
            &result,
            "eth_getBalance result",
        )?)?;

        tracing::debug!(address = %redact_address(address), wei = %wei, "balance fetched");
        wei_to_ether(wei).map_err(|e| GatewayFault::Malformed(e.to_string()).into())
    }

    async fn estimate_gas(&self, from: &str, to: &str, value_wei: u128) -> Result<u64> {
        let result = self
            .rpc_call(
                "eth_estimateGas",
                json!([{
                    "from": from,
                    "to": to,
                    "value": to_hex_quantity(value_wei),
                }]),
            )
            .await?;
        rpc_validator::validate_gas(&rpc_validator::expect_string(
            &result,
            "eth_estimateGas result",
        )?)
    }

    async fn gas_price(&self) -> Result<u128> {
        let result = self.rpc_call("eth_gasPrice", json!([])).await?;
        rpc_validator::validate_gas_price(&rpc_validator::expect_string(
            &result,
            "eth_gasPrice result",
        )?)
    }

    async fn transaction_count(&self, address: &str) -> Result<u64> {
        let result = self
            .rpc_call("eth_getTransactionCount", json!([address, "pending"]))
            .await?;
        rpc_validator::validate_nonce(&rpc_validator::expect_string(
            &result,
            "eth_getTransactionCount result",
        )?)
    }

    async fn broadcast(&self, signed_raw_tx: &str) -> Result<String> {
        // 验证交易数据格式
        if !signed_raw_tx.starts_with("0x") || signed_raw_tx.len() < 10 {
            anyhow::bail!("Invalid raw transaction format");
        }

        tracing::debug!(
            raw = %redact_hex_string(signed_raw_tx, 10),
            "broadcasting raw transaction"
        );
        let result = self
            .rpc_call("eth_sendRawTransaction", json!([signed_raw_tx]))
            .await?;
        let tx_hash = rpc_validator::validate_tx_hash(&rpc_validator::expect_string(
            &result,
            "eth_sendRawTransaction result",
        )?)?;

        tracing::info!(tx_hash = %tx_hash, chain_id = self.chain_id, "transaction broadcast");
        Ok(tx_hash)
    }

    async fn get_transaction(&self, tx_hash: &str) -> Result<Option<Value>> {
        let result = self
            .rpc_call("eth_getTransactionByHash", json!([tx_hash]))
            .await?;
        Ok(match result {
            Value::Null => None,
            other => Some(other),
        })
    }

    async fn get_receipt(&self, tx_hash: &str) -> Result<Option<ReceiptSummary>> {
        let result = self
            .rpc_call("eth_getTransactionReceipt", json!([tx_hash]))
            .await?;
        if result.is_null() {
            return Ok(None);
        }

        let hex_field = |name: &str| -> Result<Option<u64>> {
            match result.get(name).and_then(|v| v.as_str()) {
                Some(s) => parse_hex_u64(s)
                    .map(Some)
                    .map_err(|e| GatewayFault::Malformed(format!("receipt {}: {}", name, e)).into()),
                None => Ok(None),
            }
        };

        Ok(Some(ReceiptSummary {
            tx_hash: tx_hash.to_string(),
            block_number: hex_field("blockNumber")?,
            gas_used: hex_field("gasUsed")?,
            status: TxStatus::from_receipt_field(result.get("status").and_then(|v| v.as_str())),
        }))
    }

    async fn get_transaction_history(
        &self,
        address: &str,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<HistoryPage> {
        let mut query = json!({
            "address": address,
            "pageSize": to_hex_quantity(u128::from(page_size)),
            "order": "desc",
        });
        if let Some(token) = page_token {
            query["pageKey"] = json!(token);
        }

        let result = self.rpc_call(&self.history_method, json!([query])).await?;
        let page: HistoryPage = serde_json::from_value(result)
            .map_err(|e| GatewayFault::Malformed(format!("history page: {}", e)))?;

        tracing::debug!(
            address = %redact_address(address),
            count = page.transactions.len(),
            has_more = page.next_page_token.is_some(),
            "history page fetched"
        );
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> GatewayConfig {
        GatewayConfig {
            rpc_url: url.to_string(),
            chain_id: 11155111,
            history_method: "ironpocket_getTransactionHistory".into(),
            history_page_size: 25,
            request_timeout_secs: 2,
        }
    }

    #[test]
    fn test_gateway_exposes_local_chain_id() {
        let gateway = JsonRpcChainGateway::new(&config("http://127.0.0.1:8545")).unwrap();
        assert_eq!(gateway.chain_id(), 11155111);
        assert_eq!(gateway.rpc_url(), "http://127.0.0.1:8545");
    }

    #[tokio::test]
    async fn test_unreachable_node_is_not_a_gateway_fault() {
        // 端口 9 (discard) 通常无服务，连接失败
        let gateway = JsonRpcChainGateway::new(&config("http://127.0.0.1:9")).unwrap();
        let err = gateway
            .get_balance("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed")
            .await
            .unwrap_err();
        assert!(err
            .chain()
            .all(|e| e.downcast_ref::<GatewayFault>().is_none()));
    }
}
