//! Encrypted-at-rest credential storage for account secret keys.
//!
//! Password storage uses a salted PBKDF2-HMAC-SHA256 hash. The 64-hex-digit
//! secret key is protected at rest with ChaCha20-Poly1305, an authenticated
//! construction: a wrong password or corrupted ciphertext surfaces as
//! [`Error::DecryptFailed`] rather than returning garbage, and callers treat
//! a decrypted value whose length isn't exactly 64 hex digits as
//! [`Error::InvalidSecretKey`].

use chacha20poly1305::aead::{Aead, KeyInit, OsRng};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use hmac::Hmac;
use pbkdf2::pbkdf2;
use rand::RngCore;
use sha2::Sha256;

const PBKDF2_ROUNDS: u32 = 210_000;
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("decryption failed: wrong password or corrupted data")]
    DecryptFailed,

    #[error("decrypted value is not a 64-hex-digit secret key")]
    InvalidSecretKey,

    #[error("malformed ciphertext")]
    MalformedCiphertext,

    #[error("malformed password hash")]
    MalformedHash,

    #[error("login password did not match the stored hash")]
    LoginMismatch,
}

fn derive_key(password: &str, salt: &[u8]) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    pbkdf2::<Hmac<Sha256>>(password.as_bytes(), salt, PBKDF2_ROUNDS, &mut key)
        .expect("HMAC can be initialized with any key length");
    key
}

/// Hash `password` for storage in the `Login` table. Returns
/// `hex(salt) || "$" || hex(derived)`.
pub fn create_password_hash(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let derived = derive_key(password, &salt);
    format!("{}${}", hex::encode(salt), hex::encode(derived))
}

/// Compare `password` against a previously stored hash.
pub fn verify_password(stored_hash: &str, password: &str) -> Result<bool, Error> {
    let (salt_hex, derived_hex) = stored_hash.split_once('$').ok_or(Error::MalformedHash)?;
    let salt = hex::decode(salt_hex).map_err(|_| Error::MalformedHash)?;
    let expected = hex::decode(derived_hex).map_err(|_| Error::MalformedHash)?;
    let got = derive_key(password, &salt);
    Ok(got.as_slice() == expected.as_slice())
}

/// Encrypt `plaintext` (the 64-hex-digit secret key) with `password` as key
/// material. Layout: `salt(16) || nonce(12) || aead_ciphertext`, hex-encoded.
pub fn encrypt(password: &str, plaintext: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let key_bytes = derive_key(password, &salt);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key_bytes));

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .expect("encryption with a freshly generated nonce cannot fail");

    let mut out = Vec::with_capacity(SALT_LEN + NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&salt);
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    hex::encode(out)
}

/// Decrypt a value produced by [`encrypt`]. Surfaces [`Error::DecryptFailed`]
/// on AEAD failure (wrong password or tampered data) and
/// [`Error::InvalidSecretKey`] if the recovered plaintext isn't a
/// 64-hex-digit secret key.
pub fn decrypt(password: &str, ciphertext_hex: &str) -> Result<String, Error> {
    let raw = hex::decode(ciphertext_hex).map_err(|_| Error::MalformedCiphertext)?;
    if raw.len() < SALT_LEN + NONCE_LEN {
        return Err(Error::MalformedCiphertext);
    }

    let (salt, rest) = raw.split_at(SALT_LEN);
    let (nonce_bytes, body) = rest.split_at(NONCE_LEN);

    let key_bytes = derive_key(password, salt);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key_bytes));
    let nonce = Nonce::from_slice(nonce_bytes);

    let plaintext = cipher
        .decrypt(nonce, body)
        .map_err(|_| Error::DecryptFailed)?;
    let plaintext = String::from_utf8(plaintext).map_err(|_| Error::DecryptFailed)?;

    if is_valid_secret_key(&plaintext) {
        Ok(plaintext)
    } else {
        Err(Error::InvalidSecretKey)
    }
}

/// A decrypted value is usable only if it is exactly 64 lowercase hex
/// digits.
pub fn is_valid_secret_key(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit()) && s == s.to_ascii_lowercase()
}
