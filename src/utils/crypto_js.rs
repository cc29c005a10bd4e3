//! OpenSSL `enc` / CryptoJS compatible AES-256-CBC with the `Salted__` header
//! and MD5 based `EVP_BytesToKey` derivation.

use md5::{Digest, Md5};

use super::crypto::{self, DecodeError, AES_BLOCK_SIZE, AES_KEY_SIZE};

pub const SALTED_MAGIC: &[u8; 8] = b"Salted__";
const SALT_SIZE: usize = 8;
const HEADER_SIZE: usize = SALTED_MAGIC.len() + SALT_SIZE;

pub fn decrypt_salted(password: &[u8], data: &[u8]) -> Result<Vec<u8>, DecodeError> {
    if data.len() < HEADER_SIZE {
        return Err(DecodeError::TooShort(data.len()));
    }

    let (magic, rest) = data.split_at(SALTED_MAGIC.len());
    if magic != SALTED_MAGIC {
        return Err(DecodeError::NotSalted);
    }

    let (salt, ct) = rest.split_at(SALT_SIZE);
    let (key, iv) = derive_key_and_iv(password, salt);

    crypto::decrypt_aes(&key, &iv, ct)
}

pub fn encrypt_salted(
    password: &[u8],
    salt: &[u8; SALT_SIZE],
    pt: &[u8],
) -> Result<Vec<u8>, DecodeError> {
    let (key, iv) = derive_key_and_iv(password, salt);
    let ct = crypto::encrypt_aes(&key, &iv, pt)?;

    let mut out = Vec::with_capacity(HEADER_SIZE + ct.len());
    out.extend_from_slice(SALTED_MAGIC);
    out.extend_from_slice(salt);
    out.extend_from_slice(&ct);
    Ok(out)
}

// D_0 = MD5(password || salt), D_i = MD5(D_{i-1} || password || salt)
fn derive_key_and_iv(
    password: &[u8],
    salt: &[u8],
) -> ([u8; AES_KEY_SIZE], [u8; AES_BLOCK_SIZE]) {
    let mut material = Vec::with_capacity(AES_KEY_SIZE + AES_BLOCK_SIZE + 16);
    let mut prev: Option<[u8; 16]> = None;

    while material.len() < AES_KEY_SIZE + AES_BLOCK_SIZE {
        let mut hasher = Md5::new();
        if let Some(d) = prev {
            hasher.update(d);
        }
        let d: [u8; 16] = hasher.chain_update(password).chain_update(salt).finalize().into();

        material.extend_from_slice(&d);
        prev = Some(d);
    }

    let mut key = [0u8; AES_KEY_SIZE];
    let mut iv = [0u8; AES_BLOCK_SIZE];
    key.copy_from_slice(&material[..AES_KEY_SIZE]);
    iv.copy_from_slice(&material[AES_KEY_SIZE..AES_KEY_SIZE + AES_BLOCK_SIZE]);

    (key, iv)
}
