//! Resource ledger storage for hive workers.
//!
//! This crate provides a trait-based ledger interface with an SQLite
//! implementation, plus the guarded schema migrations that install it.

#![warn(missing_docs)]

pub mod trait_;
pub mod schema;
pub mod sqlite_ledger;

pub use trait_::{record_usage_best_effort, Ledger, LedgerError, Result};
pub use schema::{Migration, MigrationOutcome, CURRENT_VERSION};
pub use sqlite_ledger::{LedgerConfig, SqliteLedger};
