//! Decode ladder for encrypted `sources` payloads.
//!
//! The upstream scheme is unversioned, so several plausible decryptions are
//! tried in a fixed order and the first one producing a JSON array wins.

use base64::{
    prelude::{BASE64_STANDARD, BASE64_STANDARD_NO_PAD},
    Engine,
};
use log::debug;
use serde_json::Value;

use super::{
    crypto::{self, DecodeError, AES_BLOCK_SIZE, AES_KEY_SIZE},
    crypto_js,
};

type Strategy = fn(&[u8], &str) -> Result<Vec<u8>, DecodeError>;

const STRATEGIES: [(&str, Strategy); 3] = [
    ("openssl", decrypt_openssl),
    ("raw_iv", decrypt_raw_iv),
    ("zero_iv", decrypt_zero_iv),
];

pub fn decode(payload: &str, key: &str) -> Vec<Value> {
    let payload = payload.trim();
    if payload.is_empty() {
        return vec![];
    }

    if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(payload) {
        return items;
    }

    let data = match decode_base64(payload) {
        Ok(data) => data,
        Err(err) => {
            debug!("[payload] not base64: {err}");
            return vec![];
        }
    };

    for (name, strategy) in STRATEGIES {
        match strategy(&data, key).and_then(|pt| parse_array(&pt)) {
            Ok(items) => {
                debug!("[payload] decoded with {name} strategy");
                return items;
            }
            Err(err) => debug!("[payload] {name} strategy failed: {err}"),
        }
    }

    vec![]
}

fn decode_base64(payload: &str) -> Result<Vec<u8>, DecodeError> {
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();

    BASE64_STANDARD
        .decode(&compact)
        .or_else(|_| BASE64_STANDARD_NO_PAD.decode(compact.trim_end_matches('=')))
        .map_err(DecodeError::from)
}

fn parse_array(pt: &[u8]) -> Result<Vec<Value>, DecodeError> {
    match serde_json::from_slice::<Value>(pt)? {
        Value::Array(items) => Ok(items),
        _ => Err(DecodeError::NotArray),
    }
}

fn decrypt_openssl(data: &[u8], key: &str) -> Result<Vec<u8>, DecodeError> {
    crypto_js::decrypt_salted(key.as_bytes(), data)
}

fn decrypt_raw_iv(data: &[u8], key: &str) -> Result<Vec<u8>, DecodeError> {
    if data.len() <= AES_BLOCK_SIZE {
        return Err(DecodeError::TooShort(data.len()));
    }

    let (iv, ct) = data.split_at(AES_BLOCK_SIZE);
    crypto::decrypt_aes(&aes_key(key), iv, ct)
}

fn decrypt_zero_iv(data: &[u8], key: &str) -> Result<Vec<u8>, DecodeError> {
    crypto::decrypt_aes(&aes_key(key), &[0u8; AES_BLOCK_SIZE], data)
}

/// Hex keys of the right size are used as-is, anything else is hashed.
fn aes_key(key: &str) -> [u8; AES_KEY_SIZE] {
    let mut out = [0u8; AES_KEY_SIZE];

    match hex::decode_to_slice(key, &mut out) {
        Ok(()) => out,
        Err(_) => crypto::sha256(key.as_bytes()),
    }
}
