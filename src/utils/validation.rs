//! Validation of parser output before it enters a session

use bigdecimal::BigDecimal;
use std::collections::HashSet;

use crate::types::*;

/// Validate that an amount is positive
pub fn validate_positive_amount(amount: &BigDecimal) -> ReconcileResult<()> {
    if *amount <= BigDecimal::from(0) {
        Err(ReconcileError::InvalidTransaction(
            "Amount must be positive".to_string(),
        ))
    } else {
        Ok(())
    }
}

/// Validate a single transaction
pub fn validate_transaction(transaction: &Transaction) -> ReconcileResult<()> {
    if transaction.txid.trim().is_empty() {
        return Err(ReconcileError::InvalidTransaction(
            "Transaction ID cannot be empty".to_string(),
        ));
    }

    if transaction.unique_reference.trim().is_empty() {
        return Err(ReconcileError::InvalidTransaction(format!(
            "Transaction {} has no unique reference",
            transaction.txid
        )));
    }

    validate_positive_amount(&transaction.amount).map_err(|_| {
        ReconcileError::InvalidTransaction(format!(
            "Transaction {} has a non-positive amount: {}",
            transaction.txid, transaction.amount
        ))
    })
}

/// Validate a parsed statement: every transaction valid, ids unique
pub fn validate_transactions(transactions: &[Transaction]) -> ReconcileResult<()> {
    let mut seen = HashSet::new();
    for transaction in transactions {
        validate_transaction(transaction)?;
        if !seen.insert(transaction.txid.as_str()) {
            return Err(ReconcileError::InvalidTransaction(format!(
                "Transaction ID '{}' appears more than once",
                transaction.txid
            )));
        }
    }
    Ok(())
}
