//! Session-local set of imported transactions and their row state

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::types::*;
use crate::utils::validation::validate_transactions;

/// Lifecycle of one imported transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RowState {
    /// Waiting for the user to pick a resolution
    Open,
    /// A payment specification is being derived
    Resolving,
    /// The payment entry is with the ledger service
    Submitting,
    /// An entry was created; terminal
    Closed,
}

#[derive(Debug)]
struct Row {
    transaction: Transaction,
    state: Mutex<RowState>,
}

impl Row {
    fn state(&self) -> MutexGuard<'_, RowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Transactions of the current import, in statement order
///
/// Rows are never removed while a session lasts; closing only flips the row
/// state, so a failed submission can be retried without parsing again.
#[derive(Debug, Default)]
pub struct TransactionLedger {
    rows: Vec<Row>,
    index: HashMap<TxId, usize>,
}

impl TransactionLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole set with freshly parsed transactions
    ///
    /// The previous set is discarded even when loading fails. Loading nothing
    /// fails with [`ReconcileError::EmptyImport`].
    pub fn load(&mut self, transactions: Vec<Transaction>) -> ReconcileResult<usize> {
        self.clear();
        validate_transactions(&transactions)?;
        if transactions.is_empty() {
            return Err(ReconcileError::EmptyImport);
        }

        for (position, transaction) in transactions.into_iter().enumerate() {
            self.index.insert(transaction.txid.clone(), position);
            self.rows.push(Row {
                transaction: transaction.normalized(),
                state: Mutex::new(RowState::Open),
            });
        }
        Ok(self.rows.len())
    }

    /// Drop every transaction
    pub fn clear(&mut self) {
        self.rows.clear();
        self.index.clear();
    }

    /// Mark a transaction closed; closing twice is a no-op
    pub fn close(&self, txid: &str) -> ReconcileResult<()> {
        *self.row(txid)?.state() = RowState::Closed;
        Ok(())
    }

    /// Whether the transaction still awaits a resolution
    pub fn is_open(&self, txid: &str) -> ReconcileResult<bool> {
        Ok(self.state(txid)? != RowState::Closed)
    }

    pub fn state(&self, txid: &str) -> ReconcileResult<RowState> {
        Ok(*self.row(txid)?.state())
    }

    pub fn get(&self, txid: &str) -> ReconcileResult<&Transaction> {
        Ok(&self.row(txid)?.transaction)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All transactions in statement order
    pub fn transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.rows.iter().map(|row| &row.transaction)
    }

    /// Transactions not yet closed, in statement order
    pub fn open_transactions(&self) -> Vec<&Transaction> {
        self.rows
            .iter()
            .filter(|row| *row.state() != RowState::Closed)
            .map(|row| &row.transaction)
            .collect()
    }

    /// Take exclusive hold of an open row for one resolution attempt
    ///
    /// The row returns to [`RowState::Open`] when the claim is dropped without
    /// being closed.
    pub(crate) fn claim(&self, txid: &str) -> ReconcileResult<Claim<'_>> {
        let row = self.row(txid)?;
        let mut state = row.state();
        match *state {
            RowState::Open => *state = RowState::Resolving,
            RowState::Closed => return Err(ReconcileError::AlreadyClosed(txid.to_string())),
            RowState::Resolving | RowState::Submitting => {
                return Err(ReconcileError::SubmissionPending(txid.to_string()))
            }
        }
        drop(state);
        Ok(Claim { row, closed: false })
    }

    fn row(&self, txid: &str) -> ReconcileResult<&Row> {
        self.index
            .get(txid)
            .map(|&position| &self.rows[position])
            .ok_or_else(|| ReconcileError::UnknownTransaction(txid.to_string()))
    }
}

/// In-flight resolution of a single row
pub(crate) struct Claim<'a> {
    row: &'a Row,
    closed: bool,
}

impl Claim<'_> {
    pub(crate) fn transaction(&self) -> &Transaction {
        &self.row.transaction
    }

    pub(crate) fn submitting(&self) {
        *self.row.state() = RowState::Submitting;
    }

    pub(crate) fn close(mut self) {
        *self.row.state() = RowState::Closed;
        self.closed = true;
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        if !self.closed {
            *self.row.state() = RowState::Open;
        }
    }
}
