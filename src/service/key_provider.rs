//! 密钥材料提供者
//!
//! 负责私钥生成、私钥/助记词到地址的派生，以及 EIP-155 legacy 交易签名。
//! 所有操作均为本地计算，不触网、不落盘。

use anyhow::{anyhow, Context, Result};
use bip39::{Language, Mnemonic};
use coins_bip32::{path::DerivationPath, prelude::*};
use k256::ecdsa::SigningKey;
use rlp::RlpStream;
use sha3::{Digest, Keccak256};
use zeroize::Zeroizing;

use crate::{domain::DerivedKey, utils::AddressValidator};

/// 以太坊 BIP44 路径：m/44'/60'/0'/0/0
pub const ETHEREUM_DERIVATION_PATH: &str = "m/44'/60'/0'/0/0";

/// 允许的助记词长度
pub const MNEMONIC_WORD_COUNTS: [usize; 5] = [12, 15, 18, 21, 24];

/// 待签名交易（EIP-155 legacy）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    /// 接收地址（0x + 40 hex）
    pub to: String,
    /// wei
    pub value: u128,
    pub data: Vec<u8>,
    pub chain_id: u64,
}

/// 已签名交易
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    /// `0x` + RLP 编码
    pub raw: String,
    /// keccak256(raw)
    pub hash: String,
}

/// 密钥材料提供者 trait
pub trait KeyMaterialProvider: Send + Sync {
    /// 随机生成新私钥
    fn generate(&self) -> Result<DerivedKey>;

    /// 从私钥派生（输入格式已由调用方校验）
    fn from_private_key(&self, private_key: &str) -> Result<DerivedKey>;

    /// 从 BIP39 助记词派生（m/44'/60'/0'/0/0）
    fn from_mnemonic(&self, phrase: &str) -> Result<DerivedKey>;

    /// 用私钥签名交易
    fn sign_transaction(&self, private_key: &str, tx: &UnsignedTransaction)
        -> Result<SignedTransaction>;
}

/// secp256k1 实现
#[derive(Debug, Default, Clone, Copy)]
pub struct Secp256k1KeyProvider;

impl Secp256k1KeyProvider {
    pub fn new() -> Self {
        Self
    }
}

impl KeyMaterialProvider for Secp256k1KeyProvider {
    fn generate(&self) -> Result<DerivedKey> {
        let signing_key = SigningKey::random(&mut rand::rngs::OsRng);
        derived_from_signing_key(&signing_key)
    }

    fn from_private_key(&self, private_key: &str) -> Result<DerivedKey> {
        let signing_key = signing_key_from_hex(private_key)?;
        derived_from_signing_key(&signing_key)
    }

    fn from_mnemonic(&self, phrase: &str) -> Result<DerivedKey> {
        let normalized = Zeroizing::new(normalize_mnemonic(phrase));
        let word_count = normalized.split(' ').count();
        if !MNEMONIC_WORD_COUNTS.contains(&word_count) {
            anyhow::bail!("Invalid mnemonic word count: {}", word_count);
        }

        // 解析助记词（校验词表与 checksum）
        let mnemonic =
            Mnemonic::parse_in(Language::English, normalized.as_str()).context("Invalid mnemonic")?;

        // 生成种子（空口令）
        let seed = Zeroizing::new(mnemonic.to_seed(""));

        let derivation_path = ETHEREUM_DERIVATION_PATH
            .parse::<DerivationPath>()
            .context("Invalid derivation path")?;

        // 从种子派生密钥
        let master_key =
            XPriv::root_from_seed(seed.as_slice(), None).context("Failed to derive master key")?;
        let derived_key = master_key
            .derive_path(&derivation_path)
            .context("Failed to derive key")?;

        // XPriv 实现 AsRef<SigningKey>
        let signing_key: &SigningKey = derived_key.as_ref();
        derived_from_signing_key(signing_key)
    }

    fn sign_transaction(
        &self,
        private_key: &str,
        tx: &UnsignedTransaction,
    ) -> Result<SignedTransaction> {
        let signing_key = signing_key_from_hex(private_key)?;
        let to = decode_address(&tx.to)?;

        let sighash = Keccak256::digest(signing_payload(tx, &to));
        let (signature, recovery_id) = signing_key
            .sign_prehash_recoverable(&sighash)
            .map_err(|e| anyhow!("Signing failed: {}", e))?;

        // EIP-155: v = recid + 35 + chain_id * 2
        let v = u64::from(recovery_id.to_byte()) + 35 + tx.chain_id * 2;
        let sig_bytes = signature.to_bytes();
        let r = trim_leading_zeros(&sig_bytes[..32]);
        let s = trim_leading_zeros(&sig_bytes[32..]);

        let mut stream = RlpStream::new();
        stream.begin_list(9);
        append_tx_fields(&mut stream, tx, &to);
        stream.append(&v);
        stream.append(&r);
        stream.append(&s);
        let raw = stream.out();

        let hash = Keccak256::digest(&raw);
        Ok(SignedTransaction {
            raw: format!("0x{}", hex::encode(&raw)),
            hash: format!("0x{}", hex::encode(hash)),
        })
    }
}

/// 助记词规范化：小写、合并空白
pub fn normalize_mnemonic(phrase: &str) -> String {
    phrase
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// 未签名 RLP：[nonce, gasPrice, gasLimit, to, value, data, chainId, 0, 0]
fn signing_payload(tx: &UnsignedTransaction, to: &[u8]) -> Vec<u8> {
    let mut stream = RlpStream::new();
    stream.begin_list(9);
    append_tx_fields(&mut stream, tx, to);
    stream.append(&tx.chain_id);
    stream.append(&0u8);
    stream.append(&0u8);
    stream.out().to_vec()
}

fn append_tx_fields(stream: &mut RlpStream, tx: &UnsignedTransaction, to: &[u8]) {
    stream.append(&tx.nonce);
    stream.append(&tx.gas_price);
    stream.append(&tx.gas_limit);
    stream.append(&to.to_vec());
    stream.append(&tx.value);
    stream.append(&tx.data);
}

fn decode_address(address: &str) -> Result<Vec<u8>> {
    let body = address.strip_prefix("0x").unwrap_or(address);
    let bytes = hex::decode(body).map_err(|e| anyhow!("Invalid to address hex: {}", e))?;
    if bytes.len() != 20 {
        anyhow::bail!("Invalid to address length: {}", bytes.len());
    }
    Ok(bytes)
}

fn trim_leading_zeros(bytes: &[u8]) -> Vec<u8> {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    bytes[start..].to_vec()
}

fn signing_key_from_hex(private_key: &str) -> Result<SigningKey> {
    let body = private_key.strip_prefix("0x").unwrap_or(private_key);
    let bytes = Zeroizing::new(hex::decode(body).context("Private key is not valid hex")?);
    if bytes.len() != 32 {
        anyhow::bail!("Private key must be 32 bytes, got {}", bytes.len());
    }
    SigningKey::from_slice(&bytes).map_err(|_| anyhow!("Private key is outside the secp256k1 range"))
}

fn derived_from_signing_key(signing_key: &SigningKey) -> Result<DerivedKey> {
    let private_key_bytes = signing_key.to_bytes();

    let verifying_key = signing_key.verifying_key();
    let public_key_bytes = verifying_key.to_encoded_point(false); // 未压缩格式
    let public_key_slice = &public_key_bytes.as_bytes()[1..]; // 去掉 0x04 前缀

    // Keccak256 哈希，取后 20 字节
    let hash = Keccak256::digest(public_key_slice);
    let lower = format!("0x{}", hex::encode(&hash[12..]));
    let address = AddressValidator::to_checksum(&lower).context("Failed to checksum address")?;

    Ok(DerivedKey {
        address,
        private_key: Zeroizing::new(format!("0x{}", hex::encode(private_key_bytes))),
    })
}
