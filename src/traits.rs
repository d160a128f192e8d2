//! Contracts for the external collaborators of the reconciliation core
//!
//! The core never parses statements, looks up company configuration or
//! persists payment entries itself. Each of those is delegated to one of the
//! traits below, so the same engine can sit in front of any ERP backend.

use async_trait::async_trait;
use std::sync::Arc;

use crate::types::*;

/// Turns raw statement text into transactions with candidate matches
#[async_trait]
pub trait StatementParser: Send + Sync {
    /// Parse one statement document (possibly several concatenated parts)
    ///
    /// Rejections should be reported as [`ReconcileError::ParseFailure`].
    async fn parse(&self, content: &str) -> ReconcileResult<Vec<Transaction>>;
}

/// Source of bank accounts and their company defaults
#[async_trait]
pub trait ConfigurationProvider: Send + Sync {
    /// List the bank accounts a statement can be imported for
    async fn list_bank_accounts(&self) -> ReconcileResult<Vec<String>>;

    /// Look up the defaults configured for a bank account's company
    async fn resolve_defaults(&self, bank_account: &str) -> ReconcileResult<AccountDefaults>;
}

/// Persists payment entries
#[async_trait]
pub trait LedgerService: Send + Sync {
    /// Create (and, if requested, submit) a payment entry
    ///
    /// Failures should be reported as [`ReconcileError::SubmitError`].
    async fn submit_payment(&self, payment: &PaymentSpecification) -> ReconcileResult<EntryId>;
}

#[async_trait]
impl<T: StatementParser + ?Sized> StatementParser for Arc<T> {
    async fn parse(&self, content: &str) -> ReconcileResult<Vec<Transaction>> {
        (**self).parse(content).await
    }
}

#[async_trait]
impl<T: ConfigurationProvider + ?Sized> ConfigurationProvider for Arc<T> {
    async fn list_bank_accounts(&self) -> ReconcileResult<Vec<String>> {
        (**self).list_bank_accounts().await
    }

    async fn resolve_defaults(&self, bank_account: &str) -> ReconcileResult<AccountDefaults> {
        (**self).resolve_defaults(bank_account).await
    }
}

#[async_trait]
impl<T: LedgerService + ?Sized> LedgerService for Arc<T> {
    async fn submit_payment(&self, payment: &PaymentSpecification) -> ReconcileResult<EntryId> {
        (**self).submit_payment(payment).await
    }
}
