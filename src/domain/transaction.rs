//! 交易记录与方向归类
//!
//! 网关返回的原始记录携带十六进制数量（wei、区块号、秒级时间戳），
//! 在这里统一换算为十进制金额与毫秒时间，并按查询地址判定收/发方向。

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::utils::{
    address_validator::AddressValidator,
    amount::{parse_hex_quantity, parse_hex_u64, wei_to_ether},
    time_utils::hex_seconds_to_datetime,
};

/// 网关原始记录（字段名与 JSON-RPC 响应一致）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawTransactionRecord {
    pub hash: String,
    pub from: String,
    /// 合约创建交易没有 to
    #[serde(default)]
    pub to: Option<String>,
    /// wei，十六进制
    pub value: String,
    /// 十六进制
    pub block_number: String,
    /// 秒，十六进制
    pub time_stamp: String,
    /// `0x1` 成功，其它失败
    #[serde(default)]
    pub status: Option<String>,
}

/// 一页原始记录
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    #[serde(default)]
    pub transactions: Vec<RawTransactionRecord>,
    #[serde(default, rename = "pageKey")]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Success,
    Failed,
}

impl TxStatus {
    /// 回执 status 字段：`0x1` 成功；缺失按成功处理（拜占庭分叉前的回执没有 status）
    pub fn from_receipt_field(status: Option<&str>) -> Self {
        match status {
            None => Self::Success,
            Some(s) => match parse_hex_u64(s) {
                Ok(1) => Self::Success,
                _ => Self::Failed,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Sent,
    Received,
}

impl Direction {
    /// `to` 等于参考地址（不区分大小写）即为收款，其余都算转出
    pub fn derive(to: Option<&str>, reference: &str) -> Self {
        match to {
            Some(to) if AddressValidator::same_address(to, reference) => Self::Received,
            _ => Self::Sent,
        }
    }
}

/// 单笔交易在链上的进度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TxProgress {
    /// 节点不认识这笔交易（从未广播或已被丢弃）
    Unknown,
    /// 仍在交易池中
    Pending,
    Mined(TxStatus),
}

/// 面向用户的交易记录
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TransactionRecord {
    pub hash: String,
    pub from: String,
    pub to: Option<String>,
    /// 以太单位
    pub value: Decimal,
    pub timestamp: DateTime<Utc>,
    pub block_number: u64,
    pub status: TxStatus,
    pub direction: Direction,
}

impl TransactionRecord {
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }

    /// 单条归类
    pub fn reconcile(raw: RawTransactionRecord, reference: &str) -> Result<Self> {
        let wei = parse_hex_quantity(&raw.value)
            .with_context(|| format!("Invalid value in transaction {}", raw.hash))?;
        let value = wei_to_ether(wei)?;
        let block_number = parse_hex_u64(&raw.block_number)
            .with_context(|| format!("Invalid block number in transaction {}", raw.hash))?;
        let timestamp = hex_seconds_to_datetime(&raw.time_stamp)
            .with_context(|| format!("Invalid timestamp in transaction {}", raw.hash))?;
        let status = TxStatus::from_receipt_field(raw.status.as_deref());
        let direction = Direction::derive(raw.to.as_deref(), reference);

        Ok(Self {
            hash: raw.hash,
            from: raw.from,
            to: raw.to,
            value,
            timestamp,
            block_number,
            status,
            direction,
        })
    }
}

/// 归类后的一页记录；顺序与网关返回一致
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TransactionPage {
    pub records: Vec<TransactionRecord>,
    pub next_page_token: Option<String>,
}

/// 整页归类：任何一条字段畸形都会让整页失败
pub fn reconcile_page(page: HistoryPage, reference: &str) -> Result<TransactionPage> {
    let records = page
        .transactions
        .into_iter()
        .map(|raw| TransactionRecord::reconcile(raw, reference))
        .collect::<Result<Vec<_>>>()?;

    Ok(TransactionPage {
        records,
        next_page_token: page.next_page_token,
    })
}
