use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256, Sha512};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::utils::error::PaymentError;

/// 商户订单号长度，Binance Pay 要求不超过 32 位字母数字
pub const MERCHANT_TRADE_NO_LEN: usize = 32;

// SHA-256 哈希
pub fn sha256(input: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input);
    hex::encode(hasher.finalize())
}

// HMAC-SHA512 签名
pub fn hmac_sha512(key: &[u8], message: &[u8]) -> Result<String, PaymentError> {
    type HmacSha512 = Hmac<Sha512>;

    let mut mac = HmacSha512::new_from_slice(key)
        .map_err(|_| PaymentError::Internal("invalid HMAC key length".to_string()))?;
    mac.update(message);

    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// 计算请求签名: HMAC-SHA512(secret, payload + nonce)
///
/// 同样的 payload、nonce 和密钥总是得到同样的签名。
pub fn sign_payload(payload: &str, nonce: &str, secret: &str) -> Result<String, PaymentError> {
    let mut message = String::with_capacity(payload.len() + nonce.len());
    message.push_str(payload);
    message.push_str(nonce);

    hmac_sha512(secret.as_bytes(), message.as_bytes())
}

/// 由幂等键派生商户订单号
///
/// 取 SHA-256 的前 128 位，同一个键永远得到同一个订单号。
pub fn derive_merchant_trade_no(idempotency_key: &str) -> String {
    let digest = sha256(idempotency_key.as_bytes());
    digest[..MERCHANT_TRADE_NO_LEN].to_string()
}

/// 基于毫秒时间戳的单调 nonce
///
/// 同一毫秒内多次调用时顺延，保证每次签名的 nonce 都不同。
#[derive(Debug, Default)]
pub struct NonceGenerator {
    last: AtomicU64,
}

impl NonceGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> u64 {
        let now = Utc::now().timestamp_millis().max(0) as u64;
        let mut current = self.last.load(Ordering::Relaxed);

        loop {
            let candidate = now.max(current + 1);
            match self.last.compare_exchange_weak(
                current,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return candidate,
                Err(actual) => current = actual,
            }
        }
    }
}
