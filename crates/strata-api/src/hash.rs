//! Manifest fingerprints
//!
//! [`ManifestHash`] is a SHA-256 digest of a desired-state manifest. It is
//! the only input to the "is this node stale" decision; timestamps never
//! participate. Records carry it in its lowercase hex form.

use sha2::{Digest, Sha256};
use std::fmt::{self, Display, Formatter};

/// A 32-byte manifest fingerprint (SHA-256)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ManifestHash([u8; 32]);

impl ManifestHash {
    /// Hash raw manifest bytes
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// First 12 hex chars, for log lines
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..6])
    }
}

impl Display for ManifestHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}
