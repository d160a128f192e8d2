//! # Bank Reconcile
//!
//! Resolution engine for reconciling bank statement transactions against a
//! ledger and turning them into payment entries.
//!
//! ## Features
//!
//! - **Statement import**: single XML statements or zip archives of XML parts,
//!   joined in archive order and handed to a pluggable statement parser
//! - **Resolution engine**: quick match, close match, party, default party and
//!   internal transfer resolutions dispatched through one function
//! - **Session ledger**: per-transaction open/closed state, with duplicate
//!   submissions rejected
//! - **Collaborator abstraction**: parser, configuration and ledger service are
//!   traits, so any ERP backend can sit behind them
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bank_reconcile::utils::{MemoryConfiguration, MemoryLedgerService, StaticStatementParser};
//! use bank_reconcile::{ImportOrchestrator, ResolutionAction};
//!
//! # async fn run() -> bank_reconcile::ReconcileResult<()> {
//! let parser = StaticStatementParser::new(Vec::new());
//! let mut orchestrator = ImportOrchestrator::new(
//!     parser,
//!     MemoryConfiguration::new(),
//!     MemoryLedgerService::new(),
//! );
//! orchestrator.select_bank_account("1020 - Bank").await?;
//! let count = orchestrator.import_file("statement.zip").await?;
//! if count > 0 {
//!     orchestrator.resolve("0", ResolutionAction::CloseDefault).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod reconciliation;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use reconciliation::*;
pub use traits::*;
pub use types::*;
