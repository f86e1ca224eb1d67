// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Password sealing of the raw signing key.
//!
//! Blob layout before encoding: `salt (16) | nonce (12) | ciphertext+tag`.
//! A fresh salt and nonce are drawn for every encryption.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64ct::{Base64, Encoding};
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{EngineError, EngineResult};

/// PBKDF2-HMAC-SHA256 rounds.
pub const PBKDF2_ITERATIONS: u32 = 100_000;
pub const SALT_LEN: usize = 16;
pub const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;
const TAG_LEN: usize = 16;

/// Reject anything that is not 64 hex characters with an optional `0x`.
pub fn validate_private_key(raw: &str) -> EngineResult<()> {
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    if digits.len() == 64 && digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        Ok(())
    } else {
        Err(EngineError::InvalidKeyFormat)
    }
}

/// Sealed signing key.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedKeyBlob {
    pub salt: [u8; SALT_LEN],
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
}

impl std::fmt::Debug for EncryptedKeyBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedKeyBlob")
            .field("ciphertext_len", &self.ciphertext.len())
            .finish_non_exhaustive()
    }
}

impl EncryptedKeyBlob {
    /// Base64 of the concatenated parts.
    pub fn encode(&self) -> String {
        let mut bytes = Vec::with_capacity(SALT_LEN + NONCE_LEN + self.ciphertext.len());
        bytes.extend_from_slice(&self.salt);
        bytes.extend_from_slice(&self.nonce);
        bytes.extend_from_slice(&self.ciphertext);
        Base64::encode_string(&bytes)
    }

    /// Malformed input is indistinguishable from a wrong password.
    pub fn decode(encoded: &str) -> EngineResult<Self> {
        let bytes = Base64::decode_vec(encoded.trim()).map_err(|_| EngineError::InvalidPassword)?;
        if bytes.len() < SALT_LEN + NONCE_LEN + TAG_LEN {
            return Err(EngineError::InvalidPassword);
        }

        let (salt, rest) = bytes.split_at(SALT_LEN);
        let (nonce, ciphertext) = rest.split_at(NONCE_LEN);
        Ok(Self {
            salt: salt.try_into().map_err(|_| EngineError::InvalidPassword)?,
            nonce: nonce.try_into().map_err(|_| EngineError::InvalidPassword)?,
            ciphertext: ciphertext.to_vec(),
        })
    }
}

fn derive_key(password: &str, salt: &[u8]) -> Zeroizing<[u8; KEY_LEN]> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ITERATIONS, &mut *key);
    key
}

/// Validate and seal `raw_key` under `password`.
///
/// CPU-bound; call from a blocking context (see [`seal`]).
pub fn encrypt(raw_key: &str, password: &str) -> EngineResult<EncryptedKeyBlob> {
    validate_private_key(raw_key)?;

    let mut salt = [0u8; SALT_LEN];
    let mut nonce = [0u8; NONCE_LEN];
    let mut rng = rand::thread_rng();
    rng.fill_bytes(&mut salt);
    rng.fill_bytes(&mut nonce);

    let key = derive_key(password, &salt);
    let cipher = Aes256Gcm::new_from_slice(&key[..])
        .map_err(|e| EngineError::Storage(format!("cipher init failed: {e}")))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), raw_key.as_bytes())
        .map_err(|_| EngineError::Storage("encryption failed".to_string()))?;

    Ok(EncryptedKeyBlob {
        salt,
        nonce,
        ciphertext,
    })
}

/// Open a blob. Any authentication failure is `InvalidPassword`.
pub fn decrypt(blob: &EncryptedKeyBlob, password: &str) -> EngineResult<Zeroizing<String>> {
    let key = derive_key(password, &blob.salt);
    let cipher =
        Aes256Gcm::new_from_slice(&key[..]).map_err(|_| EngineError::InvalidPassword)?;
    let plaintext = Zeroizing::new(
        cipher
            .decrypt(Nonce::from_slice(&blob.nonce), blob.ciphertext.as_slice())
            .map_err(|_| EngineError::InvalidPassword)?,
    );

    let raw_key = std::str::from_utf8(&plaintext).map_err(|_| EngineError::InvalidPassword)?;
    validate_private_key(raw_key).map_err(|_| EngineError::InvalidPassword)?;
    Ok(Zeroizing::new(raw_key.to_string()))
}

/// [`encrypt`] on the blocking pool.
pub async fn seal(
    raw_key: Zeroizing<String>,
    password: Zeroizing<String>,
) -> EngineResult<EncryptedKeyBlob> {
    // Format errors must not cost a key derivation.
    validate_private_key(&raw_key)?;
    tokio::task::spawn_blocking(move || encrypt(&raw_key, &password))
        .await
        .map_err(|e| EngineError::Storage(format!("key sealing task failed: {e}")))?
}

/// [`decrypt`] on the blocking pool.
pub async fn open(
    blob: EncryptedKeyBlob,
    password: Zeroizing<String>,
) -> EngineResult<Zeroizing<String>> {
    tokio::task::spawn_blocking(move || decrypt(&blob, &password))
        .await
        .map_err(|e| EngineError::Storage(format!("key opening task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    #[test]
    fn round_trip_with_and_without_prefix() {
        let prefixed = format!("0x{KEY}");
        for raw in [KEY, prefixed.as_str()] {
            let blob = encrypt(raw, "hunter2").unwrap();
            let opened = decrypt(&blob, "hunter2").unwrap();
            assert_eq!(opened.as_str(), raw);
        }
    }

    #[test]
    fn wrong_password_is_rejected() {
        let blob = encrypt(KEY, "correct horse").unwrap();
        assert_eq!(
            decrypt(&blob, "battery staple").unwrap_err(),
            EngineError::InvalidPassword
        );
    }

    #[test]
    fn salt_and_nonce_are_fresh_each_time() {
        let a = encrypt(KEY, "pw").unwrap();
        let b = encrypt(KEY, "pw").unwrap();
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn malformed_keys_fail_validation() {
        let too_short = &KEY[..63];
        let too_long = format!("{KEY}0");
        let non_hex = format!("{}zz", &KEY[..62]);
        let bad_prefix = format!("0X{KEY}");
        for raw in [too_short, too_long.as_str(), non_hex.as_str(), bad_prefix.as_str(), ""] {
            assert_eq!(encrypt(raw, "pw").unwrap_err(), EngineError::InvalidKeyFormat);
        }
    }

    #[test]
    fn encoded_blob_layout() {
        let blob = encrypt(KEY, "pw").unwrap();
        let decoded = EncryptedKeyBlob::decode(&blob.encode()).unwrap();
        assert_eq!(decoded, blob);
        // 64 plaintext bytes plus the 16-byte tag
        assert_eq!(blob.ciphertext.len(), 64 + TAG_LEN);
    }

    #[test]
    fn malformed_blob_reads_as_invalid_password() {
        assert_eq!(
            EncryptedKeyBlob::decode("not base64!").unwrap_err(),
            EngineError::InvalidPassword
        );
        assert_eq!(
            EncryptedKeyBlob::decode(&Base64::encode_string(&[0u8; 20])).unwrap_err(),
            EngineError::InvalidPassword
        );

        let mut blob = encrypt(KEY, "pw").unwrap();
        blob.ciphertext[0] ^= 0xff;
        assert_eq!(decrypt(&blob, "pw").unwrap_err(), EngineError::InvalidPassword);
    }

    #[tokio::test]
    async fn async_wrappers_run_off_the_runtime() {
        let blob = seal(Zeroizing::new(KEY.to_string()), Zeroizing::new("pw".into()))
            .await
            .unwrap();
        let opened = open(blob, Zeroizing::new("pw".into())).await.unwrap();
        assert_eq!(opened.as_str(), KEY);

        let err = seal(Zeroizing::new("abc".into()), Zeroizing::new("pw".into()))
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::InvalidKeyFormat);
    }
}
