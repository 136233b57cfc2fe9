// src/api/ipn.rs

use hmac::{Hmac, Mac};
use serde::Serialize;
use serde_json::Value;
use sha2::Sha512;

pub const SIGNATURE_HEADER: &str = "x-nowpayments-sig";

type HmacSha512 = Hmac<Sha512>;

/// Тело IPN, пересобранное с отсортированными ключами (аналог JSON.stringify
/// над отсортированным объектом). serde_json::Map без `preserve_order` это BTreeMap,
/// поэтому сортировка рекурсивная и бесплатная. Числа с `arbitrary_precision`
/// выводятся ровно так, как пришли: подпись считалась над исходными литералами.
pub fn sorted_payload(body: &[u8]) -> Result<String, serde_json::Error> {
    let value: Value = serde_json::from_slice(body)?;
    serde_json::to_string(&value)
}

/// HMAC-SHA512 в hex.
pub fn sign_hmac_sha512_hex(secret: &str, data: &str) -> String {
    let mut mac =
        HmacSha512::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(data.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(payload) = sorted_payload(body) else {
        return false;
    };
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };

    let mut mac =
        HmacSha512::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(payload.as_bytes());
    mac.verify_slice(&expected).is_ok()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IpnNotification {
    pub payment_id: Option<String>,
    pub payment_status: Option<String>,
    pub actually_paid: Option<String>,
    pub pay_amount: Option<String>,
    pub order_id: Option<String>,
}

fn field_as_string(raw: &Value, key: &str) -> Option<String> {
    match raw.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Достаёт нужные поля из IPN. `payment_id` приходит числом, суммы бывают и строками.
pub fn normalize_ipn(raw: &Value) -> IpnNotification {
    IpnNotification {
        payment_id: field_as_string(raw, "payment_id"),
        payment_status: field_as_string(raw, "payment_status"),
        actually_paid: field_as_string(raw, "actually_paid"),
        pay_amount: field_as_string(raw, "pay_amount"),
        order_id: field_as_string(raw, "order_id"),
    }
}
