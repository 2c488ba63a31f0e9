//! Symmetric encryption for credentials at rest
//!
//! Environment passwords are stored as base64(nonce || ciphertext) under a
//! server-held AES-256-GCM key. A fresh random nonce is drawn per message
//! and prepended to the ciphertext.

use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose, Engine as _};
use rand::RngCore;

const NONCE_LEN: usize = 12;

pub fn encrypt(data: &[u8], key: &[u8; 32]) -> Result<Vec<u8>, &'static str> {
    let key = GenericArray::from_slice(key);
    let cipher = Aes256Gcm::new(key);

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, data)
        .map_err(|_| "encryption failed")?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

pub fn decrypt(data: &[u8], key: &[u8; 32]) -> Result<Vec<u8>, &'static str> {
    if data.len() <= NONCE_LEN {
        return Err("ciphertext too short");
    }
    let key = GenericArray::from_slice(key);
    let cipher = Aes256Gcm::new(key);
    let nonce = Nonce::from_slice(&data[..NONCE_LEN]);

    cipher
        .decrypt(nonce, &data[NONCE_LEN..])
        .map_err(|_| "decryption failed")
}

/// Encrypt a UTF-8 secret into the base64 wire form stored on environments.
pub fn encrypt_to_b64(secret: &str, key: &[u8; 32]) -> Result<String, &'static str> {
    let bytes = encrypt(secret.as_bytes(), key)?;
    Ok(general_purpose::STANDARD.encode(bytes))
}

/// Decrypt the base64 wire form back into the plaintext secret.
pub fn decrypt_from_b64(encoded: &str, key: &[u8; 32]) -> Result<String, &'static str> {
    let bytes = general_purpose::STANDARD
        .decode(encoded)
        .map_err(|_| "invalid base64")?;
    let plain = decrypt(&bytes, key)?;
    String::from_utf8(plain).map_err(|_| "plaintext is not utf-8")
}

pub fn decode_base64_key(encoded_key: &str) -> Result<[u8; 32], &'static str> {
    let decoded = general_purpose::STANDARD
        .decode(encoded_key)
        .map_err(|_| "invalid base64")?;
    if decoded.len() != 32 {
        return Err("invalid key length");
    }
    let mut key = [0u8; 32];
    key.copy_from_slice(&decoded);
    Ok(key)
}
