//! Keccak-256 hashing, hex-encoded the way on-chain tooling expects it.

use sha3::{Digest, Keccak256};
use std::fmt::Write as _;

/// Keccak-256 of `data`, returned as a 0x-prefixed lowercase hex string.
///
/// Role identifiers and `keccak:` value expressions both reduce to this.
pub fn keccak_hex(data: &[u8]) -> String {
    let digest = Keccak256::digest(data);
    let mut out = String::with_capacity(2 + digest.len() * 2);
    out.push_str("0x");
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}
