//! Import orchestrator: statement file in, payment entries out

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::Path;
use std::time::Duration;

use crate::reconciliation::engine::{self, ResolutionAction};
use crate::reconciliation::session::TransactionLedger;
use crate::traits::*;
use crate::types::*;
use crate::utils::archive::{decode_text, expand_archive};

/// Progress of the current import attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportState {
    Idle,
    Reading,
    Parsing,
    /// Transactions are loaded; `count` may be zero
    Populated { count: usize },
    /// The attempt was aborted; a new file has to be selected
    Failed(Remedy),
}

/// Statement container, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatementFormat {
    /// Single XML document
    Xml,
    /// Zip archive of XML parts
    Zip,
}

impl StatementFormat {
    /// Detect the format from a file name, ignoring case
    pub fn from_file_name(file_name: &str) -> ReconcileResult<Self> {
        let lower = file_name.to_lowercase();
        if lower.ends_with(".xml") {
            Ok(StatementFormat::Xml)
        } else if lower.ends_with(".zip") {
            Ok(StatementFormat::Zip)
        } else {
            Err(ReconcileError::UnsupportedFormat(file_name.to_string()))
        }
    }

    /// Turn raw file bytes into one statement document
    pub async fn decode(self, bytes: Vec<u8>) -> ReconcileResult<String> {
        match self {
            StatementFormat::Xml => Ok(decode_text(&bytes)),
            StatementFormat::Zip => expand_archive(bytes).await,
        }
    }
}

/// Outcome of a successful resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    /// Quick match: the entry is already submitted, nothing to open
    Matched { txid: TxId, entry: EntryId },
    /// The entry was created as a draft and should be presented for review
    Created { txid: TxId, entry: EntryId },
}

impl Resolution {
    pub fn entry(&self) -> &EntryId {
        match self {
            Resolution::Matched { entry, .. } | Resolution::Created { entry, .. } => entry,
        }
    }

    pub fn txid(&self) -> &str {
        match self {
            Resolution::Matched { txid, .. } | Resolution::Created { txid, .. } => txid,
        }
    }
}

/// Drives one bank-statement import from file selection to payment entries
pub struct ImportOrchestrator<P, C, L> {
    parser: P,
    configuration: C,
    ledger_service: L,
    options: ImportOptions,
    context: Option<ReconcileResult<AccountContext>>,
    transactions: TransactionLedger,
    state: ImportState,
}

impl<P, C, L> ImportOrchestrator<P, C, L>
where
    P: StatementParser,
    C: ConfigurationProvider,
    L: LedgerService,
{
    /// Create an orchestrator with default options
    pub fn new(parser: P, configuration: C, ledger_service: L) -> Self {
        Self::with_options(parser, configuration, ledger_service, ImportOptions::default())
    }

    pub fn with_options(
        parser: P,
        configuration: C,
        ledger_service: L,
        options: ImportOptions,
    ) -> Self {
        Self {
            parser,
            configuration,
            ledger_service,
            options,
            context: None,
            transactions: TransactionLedger::new(),
            state: ImportState::Idle,
        }
    }

    pub fn state(&self) -> &ImportState {
        &self.state
    }

    pub fn transactions(&self) -> &TransactionLedger {
        &self.transactions
    }

    /// Transactions still waiting for a resolution, in statement order
    pub fn open_transactions(&self) -> Vec<&Transaction> {
        self.transactions.open_transactions()
    }

    /// Bank accounts a statement can be imported for
    pub async fn bank_accounts(&self) -> ReconcileResult<Vec<String>> {
        self.configuration.list_bank_accounts().await
    }

    /// Select the bank account the statement belongs to and load its defaults
    ///
    /// An incomplete configuration is remembered: every resolution fails with
    /// [`ReconcileError::IncompleteContext`] until a later selection succeeds.
    pub async fn select_bank_account(
        &mut self,
        bank_account: &str,
    ) -> ReconcileResult<&AccountContext> {
        let resolved = match self.configuration.resolve_defaults(bank_account).await {
            Ok(defaults) => AccountContext::from_defaults(bank_account, defaults),
            Err(e) => Err(e),
        };
        if let Err(e) = &resolved {
            warn!("Resolution disabled for {bank_account}: {e}");
        }
        self.context.insert(resolved).as_ref().map_err(Clone::clone)
    }

    /// The selected account's context, or why resolution is blocked
    pub fn account_context(&self) -> ReconcileResult<&AccountContext> {
        match &self.context {
            Some(context) => context.as_ref().map_err(Clone::clone),
            None => Err(ReconcileError::IncompleteContext {
                bank_account: String::new(),
                company: None,
                missing: vec!["bank_account"],
            }),
        }
    }

    /// Import a statement file from disk; returns the number of transactions
    pub async fn import_file(&mut self, path: impl AsRef<Path>) -> ReconcileResult<usize> {
        let path = path.as_ref();
        let file_name = path.to_string_lossy().into_owned();
        self.begin_import();

        let format = match StatementFormat::from_file_name(&file_name) {
            Ok(format) => format,
            Err(e) => return Err(self.fail(e)),
        };

        self.state = ImportState::Reading;
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                let error = ReconcileError::ReadFailure(format!("{file_name}: {e}"));
                return Err(self.fail(error));
            }
        };
        info!("Read {} bytes from {file_name}", bytes.len());
        self.parse_and_load(format, bytes).await
    }

    /// Import a statement already held in memory; `file_name` picks the format
    pub async fn import_bytes(
        &mut self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> ReconcileResult<usize> {
        self.begin_import();
        let format = match StatementFormat::from_file_name(file_name) {
            Ok(format) => format,
            Err(e) => return Err(self.fail(e)),
        };
        self.state = ImportState::Reading;
        self.parse_and_load(format, bytes).await
    }

    async fn parse_and_load(
        &mut self,
        format: StatementFormat,
        bytes: Vec<u8>,
    ) -> ReconcileResult<usize> {
        let content = match format.decode(bytes).await {
            Ok(content) => content,
            Err(e) => return Err(self.fail(e)),
        };

        self.state = ImportState::Parsing;
        let parsed = with_timeout(
            "Statement parsing",
            self.options.parse_timeout(),
            self.parser.parse(&content),
        )
        .await;
        let parsed = match parsed {
            Ok(transactions) => transactions,
            Err(e) => {
                let e = match e {
                    e @ (ReconcileError::ParseFailure(_) | ReconcileError::Timeout { .. }) => e,
                    other => ReconcileError::ParseFailure(other.to_string()),
                };
                return Err(self.fail(e));
            }
        };

        let count = match self.transactions.load(parsed) {
            Ok(count) => count,
            Err(ReconcileError::EmptyImport) => 0,
            Err(e) => return Err(self.fail(e)),
        };
        info!("{count} transactions found");
        self.state = ImportState::Populated { count };
        Ok(count)
    }

    /// Actions the user can choose from for a transaction
    ///
    /// Closed transactions offer none. For open ones without a complete
    /// account context the gap is reported instead.
    pub fn available_actions(&self, txid: &str) -> ReconcileResult<Vec<ResolutionAction>> {
        let transaction = self.transactions.get(txid)?;
        if !self.transactions.is_open(txid)? {
            return Ok(Vec::new());
        }
        self.account_context()?;
        Ok(engine::available_actions(transaction))
    }

    /// Resolve one transaction and hand the payment entry to the ledger service
    ///
    /// On failure the transaction stays open; nothing is retried.
    pub async fn resolve(
        &self,
        txid: &str,
        action: ResolutionAction,
    ) -> ReconcileResult<Resolution> {
        if !matches!(self.state, ImportState::Populated { .. }) {
            return Err(ReconcileError::NoImport);
        }
        let claim = self.transactions.claim(txid)?;
        let context = self.account_context()?;

        let payment = engine::resolve(claim.transaction(), context, action)?;
        claim.submitting();

        let submitted = with_timeout(
            "Payment submission",
            self.options.submit_timeout(),
            self.ledger_service.submit_payment(&payment),
        )
        .await;
        let entry = match submitted {
            Ok(entry) => entry,
            Err(e) => {
                let e = match e {
                    e @ (ReconcileError::SubmitError(_) | ReconcileError::Timeout { .. }) => e,
                    other => ReconcileError::SubmitError(other.to_string()),
                };
                warn!("Transaction {txid} stays open: {e}");
                return Err(e);
            }
        };
        claim.close();

        let txid = txid.to_string();
        if payment.auto_submit {
            info!("Transaction {txid} matched in {entry}");
            Ok(Resolution::Matched { txid, entry })
        } else {
            info!("Transaction {txid} closed with draft {entry}");
            Ok(Resolution::Created { txid, entry })
        }
    }

    fn begin_import(&mut self) {
        self.transactions.clear();
        self.state = ImportState::Idle;
    }

    fn fail(&mut self, error: ReconcileError) -> ReconcileError {
        warn!("Import failed: {error}");
        self.transactions.clear();
        self.state = ImportState::Failed(error.remedy());
        error
    }
}

async fn with_timeout<T>(
    stage: &'static str,
    limit: Duration,
    call: impl Future<Output = ReconcileResult<T>>,
) -> ReconcileResult<T> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            debug!("{stage} exceeded {limit:?}");
            Err(ReconcileError::Timeout {
                stage,
                seconds: limit.as_secs(),
            })
        }
    }
}
