// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Local custody of a single hot signing key.
//!
//! The raw key only ever exists in memory inside `Zeroizing` buffers. On disk
//! there is exactly one artifact: the password-sealed blob managed by
//! [`KeyStore`].

pub mod cipher;
pub mod key_store;

use alloy::signers::local::PrivateKeySigner;

use crate::error::{EngineError, EngineResult};

pub use cipher::{decrypt, encrypt, open, seal, validate_private_key, EncryptedKeyBlob};
pub use key_store::{KeyStore, KeyStoreError, KEY_BLOB_FILE};

/// Build a signer from a validated hex key (`0x` optional).
pub fn signer_from_hex(raw_key: &str) -> EngineResult<PrivateKeySigner> {
    validate_private_key(raw_key)?;
    let digits = raw_key.strip_prefix("0x").unwrap_or(raw_key);
    let bytes = zeroize::Zeroizing::new(
        alloy::hex::decode(digits).map_err(|_| EngineError::InvalidKeyFormat)?,
    );
    PrivateKeySigner::from_slice(&bytes).map_err(|_| EngineError::InvalidKeyFormat)
}
