//! In-memory collaborators for testing and development

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use crate::traits::*;
use crate::types::*;

/// Statement parser that returns a fixed set of transactions
///
/// Every content string it receives is recorded, so tests can check what the
/// import pipeline handed over.
#[derive(Debug, Clone)]
pub struct StaticStatementParser {
    outcome: Result<Vec<Transaction>, String>,
    delay: Option<Duration>,
    received: Arc<RwLock<Vec<String>>>,
}

impl StaticStatementParser {
    /// Create a parser that always yields `transactions`
    pub fn new(transactions: Vec<Transaction>) -> Self {
        Self {
            outcome: Ok(transactions),
            delay: None,
            received: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Create a parser that rejects every document
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            outcome: Err(message.into()),
            ..Self::new(Vec::new())
        }
    }

    /// Delay every answer, to simulate a slow remote parser
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Documents received so far, oldest first
    pub fn received(&self) -> Vec<String> {
        self.received
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl StatementParser for StaticStatementParser {
    async fn parse(&self, content: &str) -> ReconcileResult<Vec<Transaction>> {
        self.received
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(content.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.outcome
            .clone()
            .map_err(ReconcileError::ParseFailure)
    }
}

/// Configuration provider backed by a map of bank account defaults
#[derive(Debug, Clone, Default)]
pub struct MemoryConfiguration {
    accounts: Arc<RwLock<Vec<(String, AccountDefaults)>>>,
}

impl MemoryConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the defaults for a bank account
    pub fn with_account(self, bank_account: impl Into<String>, defaults: AccountDefaults) -> Self {
        self.set_defaults(bank_account, defaults);
        self
    }

    pub fn set_defaults(&self, bank_account: impl Into<String>, defaults: AccountDefaults) {
        let bank_account = bank_account.into();
        let mut accounts = self
            .accounts
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        match accounts.iter_mut().find(|(name, _)| *name == bank_account) {
            Some((_, existing)) => *existing = defaults,
            None => accounts.push((bank_account, defaults)),
        }
    }
}

#[async_trait]
impl ConfigurationProvider for MemoryConfiguration {
    async fn list_bank_accounts(&self) -> ReconcileResult<Vec<String>> {
        let accounts = self.accounts.read().unwrap_or_else(PoisonError::into_inner);
        Ok(accounts.iter().map(|(name, _)| name.clone()).collect())
    }

    async fn resolve_defaults(&self, bank_account: &str) -> ReconcileResult<AccountDefaults> {
        let accounts = self.accounts.read().unwrap_or_else(PoisonError::into_inner);
        Ok(accounts
            .iter()
            .find(|(name, _)| name == bank_account)
            .map(|(_, defaults)| defaults.clone())
            .unwrap_or_default())
    }
}

/// Ledger service that keeps created payment entries in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryLedgerService {
    entries: Arc<RwLock<HashMap<EntryId, PaymentSpecification>>>,
    order: Arc<RwLock<Vec<EntryId>>>,
    failures: Arc<RwLock<Vec<String>>>,
    delay: Option<Duration>,
}

impl MemoryLedgerService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every submission, to simulate a slow remote ledger
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Make the next submission fail with `message`
    pub fn fail_next(&self, message: impl Into<String>) {
        self.failures
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.into());
    }

    /// Payment specifications received so far, in submission order
    pub fn submitted(&self) -> Vec<(EntryId, PaymentSpecification)> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        self.order
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(|id| entries.get(id).map(|spec| (id.clone(), spec.clone())))
            .collect()
    }

    pub fn get(&self, entry: &EntryId) -> Option<PaymentSpecification> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(entry)
            .cloned()
    }
}

#[async_trait]
impl LedgerService for MemoryLedgerService {
    async fn submit_payment(&self, payment: &PaymentSpecification) -> ReconcileResult<EntryId> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let failure = {
            let mut failures = self.failures.write().unwrap_or_else(PoisonError::into_inner);
            (!failures.is_empty()).then(|| failures.remove(0))
        };
        if let Some(message) = failure {
            return Err(ReconcileError::SubmitError(message));
        }

        let entry = EntryId(format!("PE-{}", uuid::Uuid::new_v4().simple()));
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(entry.clone(), payment.clone());
        self.order
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.clone());
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_configuration_lists_in_registration_order() {
        let config = MemoryConfiguration::new()
            .with_account("1020 - Bank B", AccountDefaults::default())
            .with_account("1010 - Bank A", AccountDefaults::default());

        assert_eq!(
            config.list_bank_accounts().await.unwrap(),
            vec!["1020 - Bank B", "1010 - Bank A"]
        );
        assert_eq!(
            config.resolve_defaults("unknown").await.unwrap(),
            AccountDefaults::default()
        );
    }

    #[tokio::test]
    async fn test_parser_records_content() {
        let parser = StaticStatementParser::failing("bad xml");

        let err = parser.parse("<Document/>").await.unwrap_err();
        assert_eq!(err, ReconcileError::ParseFailure("bad xml".to_string()));
        assert_eq!(parser.received(), vec!["<Document/>"]);
    }
}
