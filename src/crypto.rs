use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use anyhow::{anyhow, bail, Result};
use pbkdf2::pbkdf2_hmac;
use rand_core::{OsRng, RngCore};
use sha2::Sha256;

/// PBKDF2-HMAC-SHA256 rounds for deriving the AES key from a password.
pub const PBKDF2_ITERATIONS: u32 = 120_000;

/// AES-GCM nonce length in bytes.
const IV_LEN: usize = 12;

/// KDF salt length in bytes.
const SALT_LEN: usize = 16;

/// Output of one encryption: ciphertext (including the GCM tag), nonce and
/// salt, all hex-encoded. Salt and nonce are regenerated on every call.
pub struct CipherBlob {
    pub cipher_hex: String,
    pub iv_hex: String,
    pub salt_hex: String,
}

fn derive_key(password: &str, salt: &[u8]) -> [u8; 32] {
    let mut key = [0u8; 32];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ITERATIONS, &mut key);
    key
}

/// Encrypt `plain` with a key derived from `password` and a fresh random
/// salt, under a fresh random nonce.
pub fn encrypt_text(plain: &str, password: &str) -> Result<CipherBlob> {
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);

    let key = derive_key(password, &salt);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&iv), plain.as_bytes())
        .map_err(|_| anyhow!("encryption failed"))?;

    Ok(CipherBlob {
        cipher_hex: hex::encode(ciphertext),
        iv_hex: hex::encode(iv),
        salt_hex: hex::encode(salt),
    })
}

/// Re-derive the key from `password` + salt, decrypt and authenticate.
/// Fails on a wrong password or tampered data with no partial output.
pub fn decrypt_text(cipher_hex: &str, password: &str, iv_hex: &str, salt_hex: &str) -> Result<String> {
    let ciphertext = hex::decode(cipher_hex)?;
    let iv = hex::decode(iv_hex)?;
    let salt = hex::decode(salt_hex)?;
    if iv.len() != IV_LEN {
        bail!("invalid nonce length");
    }

    let key = derive_key(password, &salt);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    let plain = cipher
        .decrypt(Nonce::from_slice(&iv), ciphertext.as_ref())
        .map_err(|_| anyhow!("decryption failed"))?;

    Ok(String::from_utf8(plain)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_plaintext() {
        let blob = encrypt_text("Hello, world", "abc123").expect("encrypt");
        let plain = decrypt_text(&blob.cipher_hex, "abc123", &blob.iv_hex, &blob.salt_hex)
            .expect("decrypt");
        assert_eq!(plain, "Hello, world");
    }

    #[test]
    fn round_trips_empty_and_unicode() {
        for plain in ["", "caffè ☕ — <p>notes</p>"] {
            let blob = encrypt_text(plain, "pw").expect("encrypt");
            let out = decrypt_text(&blob.cipher_hex, "pw", &blob.iv_hex, &blob.salt_hex)
                .expect("decrypt");
            assert_eq!(out, plain);
        }
    }

    #[test]
    fn wrong_password_fails() {
        let blob = encrypt_text("secret", "right").expect("encrypt");
        let result = decrypt_text(&blob.cipher_hex, "wrong", &blob.iv_hex, &blob.salt_hex);
        assert!(result.is_err());
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let blob = encrypt_text("secret", "pw").expect("encrypt");
        let mut bytes = hex::decode(&blob.cipher_hex).expect("hex");
        bytes[0] ^= 0x01;
        let result = decrypt_text(&hex::encode(bytes), "pw", &blob.iv_hex, &blob.salt_hex);
        assert!(result.is_err());
    }

    #[test]
    fn malformed_hex_fails() {
        assert!(decrypt_text("not hex", "pw", "zz", "zz").is_err());
    }

    #[test]
    fn salt_and_nonce_are_fresh_every_call() {
        let a = encrypt_text("same input", "same password").expect("encrypt");
        let b = encrypt_text("same input", "same password").expect("encrypt");
        assert_ne!(a.iv_hex, b.iv_hex);
        assert_ne!(a.salt_hex, b.salt_hex);
        assert_ne!(a.cipher_hex, b.cipher_hex);
    }

    #[test]
    fn hex_fields_have_expected_lengths() {
        let blob = encrypt_text("x", "pw").expect("encrypt");
        assert_eq!(blob.iv_hex.len(), 24);
        assert_eq!(blob.salt_hex.len(), 32);
        // 1 byte of plaintext + 16-byte GCM tag
        assert_eq!(blob.cipher_hex.len(), 34);
    }
}
