//! Content addressing.
//!
//! A content address is the root of a Merkle tree built over the payload:
//! the payload is split into fixed-size segments, each segment is hashed
//! into a leaf, and parents combine adjacent children until a single root
//! remains. The address is a deterministic function of the bytes alone --
//! node selection, replica count, and upload order never influence it --
//! and it is the sole key used for later retrieval.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Size of one Merkle leaf segment in bytes.
pub const SEGMENT_SIZE: usize = 256;

/// A 32-byte Merkle root identifying stored content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentAddress([u8; 32]);

impl ContentAddress {
    /// Wrap a raw 32-byte digest.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex rendering used in logs and ledger rows.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ContentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Failure to parse a hex-encoded content address.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum AddressParseError {
    /// The string was not valid hex.
    #[error("content address is not valid hex: {0}")]
    InvalidHex(String),
    /// The decoded digest was not 32 bytes.
    #[error("content address must be 32 bytes, got {0}")]
    InvalidLength(usize),
}

impl FromStr for ContentAddress {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = hex::decode(s).map_err(|e| AddressParseError::InvalidHex(e.to_string()))?;
        let bytes: [u8; 32] = raw
            .as_slice()
            .try_into()
            .map_err(|_| AddressParseError::InvalidLength(raw.len()))?;
        Ok(Self(bytes))
    }
}

/// Compute the Merkle root of a payload.
///
/// Leaves are BLAKE3 hashes of consecutive [`SEGMENT_SIZE`]-byte segments
/// (the final segment may be shorter). Parents hash the concatenation of
/// two children; an odd trailing node is promoted unchanged. The empty
/// payload hashes to the digest of zero bytes, though callers reject empty
/// payloads before addressing them.
pub fn merkle_root(payload: &[u8]) -> ContentAddress {
    if payload.is_empty() {
        return ContentAddress(*blake3::hash(&[]).as_bytes());
    }

    let mut level: Vec<[u8; 32]> = payload
        .chunks(SEGMENT_SIZE)
        .map(|segment| *blake3::hash(segment).as_bytes())
        .collect();

    while level.len() > 1 {
        let mut parents = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            match pair {
                [left, right] => {
                    let mut hasher = blake3::Hasher::new();
                    hasher.update(left);
                    hasher.update(right);
                    parents.push(*hasher.finalize().as_bytes());
                }
                [odd] => parents.push(*odd),
                _ => unreachable!("chunks(2) yields one or two elements"),
            }
        }
        level = parents;
    }

    ContentAddress(level[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn address_is_stable_for_identical_bytes() {
        let payload = b"weekly summary artifact".to_vec();
        assert_eq!(merkle_root(&payload), merkle_root(&payload.clone()));
    }

    #[test]
    fn address_differs_for_different_bytes() {
        assert_ne!(merkle_root(b"a"), merkle_root(b"b"));
    }

    #[test]
    fn single_segment_equals_leaf_hash() {
        let payload = vec![7u8; SEGMENT_SIZE];
        let expected = ContentAddress(*blake3::hash(&payload).as_bytes());
        assert_eq!(merkle_root(&payload), expected);
    }

    #[test]
    fn multi_segment_root_covers_all_segments() {
        let mut payload = vec![1u8; SEGMENT_SIZE * 3];
        let root = merkle_root(&payload);
        payload[SEGMENT_SIZE * 2] ^= 0xff;
        assert_ne!(merkle_root(&payload), root);
    }

    #[test]
    fn hex_round_trips_through_parse() {
        let addr = merkle_root(b"round trip");
        let parsed: ContentAddress = addr.to_hex().parse().unwrap();
        assert_eq!(parsed, addr);
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert!(matches!(
            "zz".parse::<ContentAddress>(),
            Err(AddressParseError::InvalidHex(_))
        ));
        assert!(matches!(
            "abcd".parse::<ContentAddress>(),
            Err(AddressParseError::InvalidLength(2))
        ));
    }

    proptest! {
        #[test]
        fn deterministic_over_arbitrary_payloads(payload in proptest::collection::vec(any::<u8>(), 1..4096)) {
            prop_assert_eq!(merkle_root(&payload), merkle_root(&payload));
        }
    }
}
