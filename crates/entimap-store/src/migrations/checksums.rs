//! Checksums of generated DDL
//!
//! The ledger stores the SHA-256 of the DDL applied under each migration
//! id, so a model change that alters an existing table is detected instead
//! of silently ignored.

use sha2::{Digest, Sha256};

/// Compute SHA256 checksum of a string
pub fn compute_checksum(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}
