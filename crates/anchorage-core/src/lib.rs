//! # Anchorage Core - Shared Domain Types
//!
//! Foundation types for the storage integration layer:
//!
//! - **Identifiers**: user identity newtype
//! - **Content Addressing**: deterministic Merkle digest over payload bytes
//! - **Checksums**: SHA-256 integrity signal, independent of the address
//! - **Periods**: calendar-month arithmetic for quota accounting windows
//!
//! This crate is pure and synchronous. Network I/O, persistence, and
//! shared mutable state all live in the crates layered above it.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Content addressing via Merkle digests
pub mod address;

/// Payload checksums
pub mod checksum;

/// User identity newtype
pub mod identifiers;

/// Calendar accounting-period arithmetic
pub mod period;

pub use address::{merkle_root, AddressParseError, ContentAddress, SEGMENT_SIZE};
pub use checksum::payload_checksum;
pub use identifiers::UserId;
pub use period::next_reset;
