use cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use sha2::{Digest, Sha256};

type AesCbcDec = cbc::Decryptor<aes::Aes256>;
type AesCbcEnc = cbc::Encryptor<aes::Aes256>;

pub const AES_KEY_SIZE: usize = 32;
pub const AES_BLOCK_SIZE: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("missing Salted__ header")]
    NotSalted,
    #[error("payload too short ({0} bytes)")]
    TooShort(usize),
    #[error("invalid key or iv length")]
    InvalidLength,
    #[error("bad padding")]
    Padding,
    #[error("decrypted data is not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("decoded json is not an array")]
    NotArray,
}

pub fn decrypt_aes(key: &[u8], iv: &[u8], ct: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let cipher = AesCbcDec::new_from_slices(key, iv).map_err(|_| DecodeError::InvalidLength)?;

    cipher
        .decrypt_padded_vec_mut::<Pkcs7>(ct)
        .map_err(|_| DecodeError::Padding)
}

pub fn encrypt_aes(key: &[u8], iv: &[u8], pt: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let cipher = AesCbcEnc::new_from_slices(key, iv).map_err(|_| DecodeError::InvalidLength)?;

    Ok(cipher.encrypt_padded_vec_mut::<Pkcs7>(pt))
}

pub fn sha256(data: &[u8]) -> [u8; AES_KEY_SIZE] {
    Sha256::digest(data).into()
}
