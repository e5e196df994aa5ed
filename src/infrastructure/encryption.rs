//! AES-256-GCM 加密/解密模块
//! 用于安全存储中的私钥信封：Argon2 从口令派生密钥，随机 salt 与 nonce 随信封保存

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use anyhow::{anyhow, Context, Result};
use argon2::Argon2;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

const ENVELOPE_VERSION: u8 = 1;
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;

/// 加密数据
///
/// # Arguments
/// * `data` - 要加密的原始数据
/// * `key` - 32字节加密密钥
///
/// # Returns
/// 返回加密后的数据（nonce + ciphertext）
pub fn encrypt_data(data: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    if key.len() != 32 {
        return Err(anyhow!("Key must be 32 bytes for AES-256"));
    }

    let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| anyhow!("Invalid key: {}", e))?;

    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, data)
        .map_err(|e| anyhow!("Encryption failed: {}", e))?;

    // 将 nonce (12字节) 和 ciphertext 组合
    let mut result = nonce.to_vec();
    result.extend_from_slice(&ciphertext);

    Ok(result)
}

/// 解密数据（输入为 nonce + ciphertext）
pub fn decrypt_data(encrypted: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    if key.len() != 32 {
        return Err(anyhow!("Key must be 32 bytes for AES-256"));
    }

    if encrypted.len() < NONCE_LEN {
        return Err(anyhow!("Encrypted data too short"));
    }

    let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| anyhow!("Invalid key: {}", e))?;

    // 提取 nonce（前12字节）
    let nonce = Nonce::from_slice(&encrypted[..NONCE_LEN]);
    let ciphertext = &encrypted[NONCE_LEN..];

    // 认证失败通常意味着口令错误
    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| anyhow!("Decryption failed: wrong passphrase or tampered data"))?;

    Ok(plaintext)
}

/// 加密密钥（使用Zeroize保护）
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey {
    key: [u8; 32],
}

impl EncryptionKey {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Argon2id 从口令派生
    pub fn derive(passphrase: &str, salt: &[u8]) -> Result<Self> {
        let mut key = [0u8; 32];
        Argon2::default()
            .hash_password_into(passphrase.as_bytes(), salt, &mut key)
            .map_err(|e| anyhow!("Key derivation failed: {}", e))?;
        Ok(Self { key })
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.key
    }
}

/// 落盘信封格式
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealedEnvelope {
    pub v: u8,
    pub salt: String, // base64
    pub ct: String,   // base64(nonce + ciphertext)
}

/// 用口令封装明文
pub fn seal(plaintext: &[u8], passphrase: &str) -> Result<SealedEnvelope> {
    let mut salt = [0u8; SALT_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);

    let key = EncryptionKey::derive(passphrase, &salt)?;
    let ciphertext = encrypt_data(plaintext, key.as_slice())?;

    Ok(SealedEnvelope {
        v: ENVELOPE_VERSION,
        salt: BASE64.encode(salt),
        ct: BASE64.encode(ciphertext),
    })
}

/// 解封信封
pub fn open(envelope: &SealedEnvelope, passphrase: &str) -> Result<Vec<u8>> {
    if envelope.v != ENVELOPE_VERSION {
        anyhow::bail!("Unsupported envelope version: {}", envelope.v);
    }

    let salt = BASE64
        .decode(&envelope.salt)
        .context("Invalid stored salt")?;
    let ciphertext = BASE64
        .decode(&envelope.ct)
        .context("Invalid stored ciphertext")?;

    let key = EncryptionKey::derive(passphrase, &salt)?;
    decrypt_data(&ciphertext, key.as_slice())
}
