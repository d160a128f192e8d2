//! Reconciliation of bank statement transactions against the ledger
//!
//! - [`engine`] derives payment entries from a transaction and a chosen action
//! - [`session`] tracks which imported transactions are still open
//! - [`import`] drives a whole import from statement file to payment entries

pub mod engine;
pub mod import;
pub mod session;

pub use engine::*;
pub use import::*;
pub use session::*;
