// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Privileged-secret check gating renewal and deletion.

use std::fmt;

use sha2::{Digest, Sha256};

/// Decides whether a caller-supplied secret grants privileged access.
pub trait PrivilegeCheck: Send + Sync {
    /// `true` if `secret` is the administrator secret.
    fn is_privileged(&self, secret: &str) -> bool;
}

/// The configured administrator secret, held only as a SHA-256 digest.
#[derive(Clone)]
pub struct AdminSecret {
    digest: [u8; 32],
}

impl AdminSecret {
    /// Wrap the configured secret.
    pub fn new(secret: impl AsRef<str>) -> Self {
        Self {
            digest: hash(secret.as_ref()),
        }
    }
}

impl PrivilegeCheck for AdminSecret {
    fn is_privileged(&self, secret: &str) -> bool {
        let candidate = hash(secret);
        // Fold over every byte so the comparison time does not depend on
        // where the first mismatch is.
        self.digest
            .iter()
            .zip(candidate.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

/// No configured secret: nobody is privileged.
impl PrivilegeCheck for Option<AdminSecret> {
    fn is_privileged(&self, secret: &str) -> bool {
        self.as_ref().is_some_and(|admin| admin.is_privileged(secret))
    }
}

impl fmt::Debug for AdminSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AdminSecret(<redacted>)")
    }
}

fn hash(secret: &str) -> [u8; 32] {
    Sha256::digest(secret.as_bytes()).into()
}
