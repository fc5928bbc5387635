//! # Anchorage Maintenance - Background Sweeps
//!
//! Out-of-band upkeep for the storage integration: the verification
//! sweep re-fetches recently stored objects and settles their ledger
//! rows, the purge sweep trims verified rows past retention, and the
//! quota sweep applies overdue monthly resets. Each sweep is exposed as
//! a testable `run_*_once` step; [`MaintenanceWorker::run`] drives them
//! on an interval until shutdown is signalled.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Maintenance worker and sweep configuration
pub mod worker;

pub use worker::{MaintenanceConfig, MaintenanceWorker, SweepReport, VerificationOutcome};
