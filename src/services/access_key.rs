// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Shared-key check for callers of the analysis endpoint.
//!
//! Only the SHA-256 digest of the configured key is kept, so the key never
//! ends up in `Debug` output or logs.

use sha2::{Digest, Sha256};
use std::fmt;

/// Header carrying the shared key.
pub const ACCESS_KEY_HEADER: &str = "x-wce-key";

#[derive(Clone, PartialEq, Eq)]
pub struct AccessKey {
    digest: Option<[u8; 32]>,
}

impl AccessKey {
    /// Build from the configured value. Surrounding whitespace is ignored and
    /// a blank value disables the check.
    pub fn new(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::disabled();
        }
        Self {
            digest: Some(Self::hash(trimmed)),
        }
    }

    pub fn disabled() -> Self {
        Self { digest: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.digest.is_some()
    }

    /// A disabled key lets everything through; otherwise the provided value
    /// must match exactly.
    pub fn verify(&self, provided: Option<&str>) -> bool {
        match (&self.digest, provided) {
            (None, _) => true,
            (Some(expected), Some(value)) => Self::hash(value) == *expected,
            (Some(_), None) => false,
        }
    }

    fn hash(value: &str) -> [u8; 32] {
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&Sha256::digest(value.as_bytes()));
        digest
    }
}

impl fmt::Debug for AccessKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessKey")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
