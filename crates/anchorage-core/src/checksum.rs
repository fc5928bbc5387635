//! Payload checksums.
//!
//! The checksum is a plain SHA-256 over the payload bytes, kept distinct
//! from the Merkle content address. It serves as a second integrity
//! signal: the storage client logs it on every store and retrieve, and
//! the backup verification sweep compares it against the ledger row.

use sha2::{Digest, Sha256};

/// SHA-256 of the payload, hex-encoded.
pub fn payload_checksum(payload: &[u8]) -> String {
    let digest = Sha256::digest(payload);
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merkle_root;

    #[test]
    fn checksum_is_stable() {
        assert_eq!(payload_checksum(b"abc"), payload_checksum(b"abc"));
        assert_ne!(payload_checksum(b"abc"), payload_checksum(b"abd"));
    }

    #[test]
    fn checksum_differs_from_content_address() {
        let payload = b"two independent integrity signals";
        assert_ne!(payload_checksum(payload), merkle_root(payload).to_hex());
    }
}
