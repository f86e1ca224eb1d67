// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Persistence of the single encrypted key blob.
//!
//! The blob lives under one well-known file name inside the data directory.
//! Its absence means "no stored wallet".

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::cipher::EncryptedKeyBlob;
use crate::error::{EngineError, EngineResult};

/// File name of the persisted blob.
pub const KEY_BLOB_FILE: &str = "trader_wallet.enc";

/// Error type for key store operations.
#[derive(Debug, thiserror::Error)]
pub enum KeyStoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl From<KeyStoreError> for EngineError {
    fn from(e: KeyStoreError) -> Self {
        EngineError::Storage(e.to_string())
    }
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> KeyStoreError + '_ {
    move |source| KeyStoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// File-backed store for the encrypted signing key.
#[derive(Debug, Clone)]
pub struct KeyStore {
    path: PathBuf,
}

impl KeyStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join(KEY_BLOB_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the blob, replacing any previous one (atomic via rename).
    pub fn persist(&self, blob: &EncryptedKeyBlob) -> Result<(), KeyStoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err(parent))?;
        }

        let temp_path = self.path.with_extension("tmp");
        {
            let mut file = create_private(&temp_path).map_err(io_err(&temp_path))?;
            file.write_all(blob.encode().as_bytes())
                .and_then(|_| file.sync_all())
                .map_err(io_err(&temp_path))?;
        }

        fs::rename(&temp_path, &self.path).map_err(io_err(&self.path))?;
        tracing::info!(path = %self.path.display(), "Encrypted key persisted");
        Ok(())
    }

    /// Read the stored blob, if any. A corrupted blob reads as a wrong password.
    pub fn load(&self) -> EngineResult<Option<EncryptedKeyBlob>> {
        match fs::read_to_string(&self.path) {
            Ok(encoded) => EncryptedKeyBlob::decode(&encoded).map(Some),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err(&self.path)(e).into()),
        }
    }

    pub fn exists(&self) -> bool {
        File::open(&self.path).is_ok()
    }

    /// Remove the stored blob. Clearing an empty store is not an error.
    pub fn clear(&self) -> Result<(), KeyStoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::info!(path = %self.path.display(), "Encrypted key removed");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(&self.path)(e)),
        }
    }
}

#[cfg(unix)]
fn create_private(path: &Path) -> io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn create_private(path: &Path) -> io::Result<File> {
    File::create(path)
}
