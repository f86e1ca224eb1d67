// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! LRU cache of token metadata.
//!
//! Descriptors never change once read, so entries have no TTL; the cache
//! only bounds memory.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use alloy::primitives::Address;
use lru::LruCache;

use crate::blockchain::TokenDescriptor;

/// Default number of tokens kept.
pub const DEFAULT_TOKEN_CACHE_CAPACITY: usize = 256;

/// In-process cache of token descriptors keyed by address.
pub struct TokenCache {
    cache: Mutex<LruCache<Address, TokenDescriptor>>,
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_CACHE_CAPACITY)
    }
}

impl TokenCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
        }
    }

    pub fn get(&self, address: &Address) -> Option<TokenDescriptor> {
        let mut cache = self.cache.lock().ok()?;
        cache.get(address).cloned()
    }

    pub fn put(&self, descriptor: TokenDescriptor) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(descriptor.address, descriptor);
        }
    }

    pub fn len(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
