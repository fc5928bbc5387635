//! # Anchorage Ledger - Durability Tracking
//!
//! The backup ledger records one row per successful store and tracks its
//! verification out of band: rows start `pending`, a background sweep
//! re-fetches and checksum-compares the object, and the outcome moves the
//! row to `verified` or the terminal `failed`. Verified rows past a
//! retention window are purged; pending and failed rows never are, so the
//! only durability record of an unconfirmed object cannot silently
//! disappear.
//!
//! Persistence sits behind the narrow [`BackupStore`] trait: keyed
//! lookups and bounded range scans, no joins. [`MemoryBackupStore`] is
//! the in-process implementation; a relational adapter slots in behind
//! the same trait.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Backup manager over a ledger store
pub mod manager;

/// Ledger persistence trait and in-memory implementation
pub mod store;

/// Ledger row types
pub mod types;

pub use manager::{BackupManager, LedgerError};
pub use store::{BackupStore, MemoryBackupStore, StoreError};
pub use types::{BackupStatus, StorageBackup};
