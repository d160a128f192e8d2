//! Core types and data structures for statement reconciliation

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::time::Duration;

/// Identifier of a transaction, unique within one import session
pub type TxId = String;

/// Direction of a statement line relative to the bank account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CreditDebit {
    /// Money leaving the bank account (we paid)
    #[serde(rename = "DBIT")]
    Debit,
    /// Money arriving on the bank account (we received)
    #[serde(rename = "CRDT")]
    Credit,
}

impl CreditDebit {
    /// Statement code of the direction (`DBIT` / `CRDT`)
    pub fn code(self) -> &'static str {
        match self {
            CreditDebit::Debit => "DBIT",
            CreditDebit::Credit => "CRDT",
        }
    }

    /// Payment type of a party payment in this direction
    pub fn payment_type(self) -> PaymentType {
        match self {
            CreditDebit::Debit => PaymentType::Pay,
            CreditDebit::Credit => PaymentType::Receive,
        }
    }

    /// Party types that can settle a transaction in this direction
    pub fn party_types(self) -> &'static [PartyType] {
        match self {
            CreditDebit::Debit => &[PartyType::Supplier, PartyType::Employee],
            CreditDebit::Credit => &[PartyType::Customer],
        }
    }

    /// Whether `party_type` is a valid counterparty for this direction
    pub fn allows(self, party_type: PartyType) -> bool {
        self.party_types().contains(&party_type)
    }

    /// Party type used when falling back to the company default party
    pub fn default_party_type(self) -> PartyType {
        match self {
            CreditDebit::Debit => PartyType::Supplier,
            CreditDebit::Credit => PartyType::Customer,
        }
    }
}

impl fmt::Display for CreditDebit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Payment entry type understood by the ledger service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentType {
    Pay,
    Receive,
    #[serde(rename = "Internal Transfer")]
    InternalTransfer,
}

/// Counterparty kind of a payment entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartyType {
    Supplier,
    Customer,
    Employee,
}

impl PartyType {
    /// Document type settled by references for this party type
    pub fn reference_doctype(self) -> &'static str {
        match self {
            PartyType::Supplier => "Purchase Invoice",
            PartyType::Customer => "Sales Invoice",
            PartyType::Employee => "Expense Claim",
        }
    }
}

impl fmt::Display for PartyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PartyType::Supplier => "Supplier",
            PartyType::Customer => "Customer",
            PartyType::Employee => "Employee",
        };
        f.write_str(name)
    }
}

/// One statement line as produced by the statement parser, plus its candidate matches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Session-unique identifier; parsers may send it as a running number
    #[serde(deserialize_with = "txid_from_wire")]
    pub txid: TxId,
    /// Unsigned magnitude of the movement
    pub amount: BigDecimal,
    /// Booking date
    pub date: NaiveDate,
    /// Direction relative to the bank account
    pub credit_debit: CreditDebit,
    /// Statement-assigned reference, becomes the payment's reference number
    pub unique_reference: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub transaction_reference: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub party_name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub party_address: String,
    #[serde(default)]
    pub party_iban: Option<String>,
    /// Supplier or customer inferred by the parser
    #[serde(default)]
    pub party_match: Option<String>,
    /// Employee inferred by the parser
    #[serde(default)]
    pub employee_match: Option<String>,
    /// Outstanding invoices this line plausibly settles
    #[serde(default)]
    pub invoice_matches: Option<Vec<String>>,
    /// Outstanding expense claims this line plausibly settles
    #[serde(default)]
    pub expense_matches: Option<Vec<String>>,
    /// Sum of the outstanding amounts of all matched documents
    #[serde(default)]
    pub matched_amount: Option<BigDecimal>,
}

fn txid_from_wire<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TxId, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum WireTxId {
        Text(String),
        Number(u64),
    }

    Ok(match WireTxId::deserialize(deserializer)? {
        WireTxId::Text(txid) => txid,
        WireTxId::Number(txid) => txid.to_string(),
    })
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl Transaction {
    /// Create a transaction without any remark text or matches
    pub fn new(
        txid: impl Into<TxId>,
        amount: BigDecimal,
        date: NaiveDate,
        credit_debit: CreditDebit,
        unique_reference: impl Into<String>,
    ) -> Self {
        Self {
            txid: txid.into(),
            amount,
            date,
            credit_debit,
            unique_reference: unique_reference.into(),
            transaction_reference: String::new(),
            party_name: String::new(),
            party_address: String::new(),
            party_iban: None,
            party_match: None,
            employee_match: None,
            invoice_matches: None,
            expense_matches: None,
            matched_amount: None,
        }
    }

    pub fn with_remarks(
        mut self,
        transaction_reference: impl Into<String>,
        party_name: impl Into<String>,
        party_address: impl Into<String>,
    ) -> Self {
        self.transaction_reference = transaction_reference.into();
        self.party_name = party_name.into();
        self.party_address = party_address.into();
        self
    }

    pub fn with_party_match(mut self, party: impl Into<String>) -> Self {
        self.party_match = Some(party.into());
        self
    }

    pub fn with_employee_match(mut self, employee: impl Into<String>) -> Self {
        self.employee_match = Some(employee.into());
        self
    }

    pub fn with_invoice_matches<I, S>(mut self, invoices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.invoice_matches = Some(invoices.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_expense_matches<I, S>(mut self, claims: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expense_matches = Some(claims.into_iter().map(Into::into).collect());
        self
    }

    /// Human-readable remark combining reference, party name and address
    pub fn remarks(&self) -> String {
        format!(
            "{}, {}, {}",
            self.transaction_reference, self.party_name, self.party_address
        )
    }

    /// Matched party for the given party type, if the parser found one
    pub fn party_match_for(&self, party_type: PartyType) -> Option<&str> {
        match party_type {
            PartyType::Supplier | PartyType::Customer => self.party_match.as_deref(),
            PartyType::Employee => self.employee_match.as_deref(),
        }
    }

    /// Matched documents for the given party type; empty lists count as absent
    pub fn references_for(&self, party_type: PartyType) -> Option<&[String]> {
        let matches = match party_type {
            PartyType::Supplier | PartyType::Customer => self.invoice_matches.as_deref(),
            PartyType::Employee => self.expense_matches.as_deref(),
        };
        matches.filter(|refs| !refs.is_empty())
    }

    /// Collapse empty match lists into `None`
    pub fn normalized(mut self) -> Self {
        if self.invoice_matches.as_ref().is_some_and(Vec::is_empty) {
            self.invoice_matches = None;
        }
        if self.expense_matches.as_ref().is_some_and(Vec::is_empty) {
            self.expense_matches = None;
        }
        self
    }
}

/// Raw defaults returned by the configuration provider; any field may be missing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountDefaults {
    pub company: Option<String>,
    pub default_supplier: Option<String>,
    pub default_customer: Option<String>,
    pub intermediate_account: Option<String>,
    pub default_payable_account: Option<String>,
    pub default_receivable_account: Option<String>,
}

/// Fully resolved defaults for one bank account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountContext {
    pub bank_account: String,
    pub company: String,
    pub default_supplier: String,
    pub default_customer: String,
    pub intermediate_account: String,
    pub default_payable_account: String,
    pub default_receivable_account: String,
}

impl AccountContext {
    /// Build a complete context, or report every missing default
    pub fn from_defaults(
        bank_account: impl Into<String>,
        defaults: AccountDefaults,
    ) -> ReconcileResult<Self> {
        let bank_account = bank_account.into();
        let present =
            |value: &Option<String>| value.as_deref().is_some_and(|v| !v.trim().is_empty());

        let mut missing = Vec::new();
        if bank_account.trim().is_empty() {
            missing.push("bank_account");
        }
        for (name, value) in [
            ("company", &defaults.company),
            ("default_supplier", &defaults.default_supplier),
            ("default_customer", &defaults.default_customer),
            ("intermediate_account", &defaults.intermediate_account),
            ("default_payable_account", &defaults.default_payable_account),
            ("default_receivable_account", &defaults.default_receivable_account),
        ] {
            if !present(value) {
                missing.push(name);
            }
        }

        match defaults {
            AccountDefaults {
                company: Some(company),
                default_supplier: Some(default_supplier),
                default_customer: Some(default_customer),
                intermediate_account: Some(intermediate_account),
                default_payable_account: Some(default_payable_account),
                default_receivable_account: Some(default_receivable_account),
            } if missing.is_empty() => Ok(Self {
                bank_account,
                company,
                default_supplier,
                default_customer,
                intermediate_account,
                default_payable_account,
                default_receivable_account,
            }),
            defaults => Err(ReconcileError::IncompleteContext {
                bank_account,
                company: defaults.company.filter(|c| !c.trim().is_empty()),
                missing,
            }),
        }
    }

    /// Default party used when a transaction is closed against the company default
    pub fn default_party(&self, direction: CreditDebit) -> &str {
        match direction {
            CreditDebit::Debit => &self.default_supplier,
            CreditDebit::Credit => &self.default_customer,
        }
    }
}

/// Payment entry parameters handed to the ledger service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentSpecification {
    pub amount: BigDecimal,
    pub date: NaiveDate,
    pub reference_no: String,
    pub remarks: String,
    pub company: String,
    pub payment_type: PaymentType,
    pub paid_from: String,
    pub paid_to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub party_type: Option<PartyType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub party: Option<String>,
    /// Documents to settle; never `Some` with an empty list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<Vec<String>>,
    pub auto_submit: bool,
}

impl PaymentSpecification {
    /// Document type of the references, if any are attached
    pub fn reference_doctype(&self) -> Option<&'static str> {
        match (&self.references, self.party_type) {
            (Some(_), Some(party_type)) => Some(party_type.reference_doctype()),
            _ => None,
        }
    }
}

/// Identifier of a payment entry created by the ledger service
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub String);

impl EntryId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for EntryId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for EntryId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tunables for an import session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    /// Upper bound for one statement parser call, in seconds
    pub parse_timeout_secs: u64,
    /// Upper bound for one ledger service submission, in seconds
    pub submit_timeout_secs: u64,
}

impl ImportOptions {
    pub fn parse_timeout(&self) -> Duration {
        Duration::from_secs(self.parse_timeout_secs)
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_secs(self.submit_timeout_secs)
    }
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            parse_timeout_secs: 120,
            submit_timeout_secs: 60,
        }
    }
}

/// What the user has to do about an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Remedy {
    /// The file or its content is at fault; select another file
    FixInput,
    /// Company defaults are missing; fix the configuration
    FixConfiguration,
    /// The chosen resolution does not apply; pick another one
    ChooseDifferentAction,
    /// A remote call failed; the same action may be retried
    Retry,
    /// Nothing to fix
    Informational,
}

/// Errors that can occur while importing and resolving a statement
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReconcileError {
    #[error("Unsupported file format: {0}. Please use an xml or zip camt file")]
    UnsupportedFormat(String),
    #[error("Error reading file: {0}")]
    ReadFailure(String),
    #[error("Statement could not be parsed: {0}")]
    ParseFailure(String),
    #[error("0 transactions found")]
    EmptyImport,
    #[error(
        "Please set the default accounts for {} (bank account {}): missing {}",
        .company.as_deref().unwrap_or("the company"),
        .bank_account,
        .missing.join(", ")
    )]
    IncompleteContext {
        bank_account: String,
        company: Option<String>,
        missing: Vec<&'static str>,
    },
    #[error("Transaction {txid} has no matched {party_type}")]
    MissingPartyMatch { txid: TxId, party_type: PartyType },
    #[error("Transaction {} has no matched {}", .txid, .party_type.reference_doctype())]
    MissingReferences { txid: TxId, party_type: PartyType },
    #[error("A {party_type} cannot settle a {direction} transaction")]
    InvalidPartyType {
        direction: CreditDebit,
        party_type: PartyType,
    },
    #[error("Transaction {0} is already closed")]
    AlreadyClosed(TxId),
    #[error("Transaction {0} is already being submitted")]
    SubmissionPending(TxId),
    #[error("Payment entry could not be created: {0}")]
    SubmitError(String),
    #[error("Unknown transaction: {0}")]
    UnknownTransaction(TxId),
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),
    #[error("{stage} timed out after {seconds}s")]
    Timeout { stage: &'static str, seconds: u64 },
    #[error("No statement has been imported")]
    NoImport,
}

impl ReconcileError {
    /// Classify the error by the user action it calls for
    pub fn remedy(&self) -> Remedy {
        match self {
            ReconcileError::UnsupportedFormat(_)
            | ReconcileError::ReadFailure(_)
            | ReconcileError::ParseFailure(_)
            | ReconcileError::InvalidTransaction(_)
            | ReconcileError::NoImport => Remedy::FixInput,
            ReconcileError::IncompleteContext { .. } => Remedy::FixConfiguration,
            ReconcileError::MissingPartyMatch { .. }
            | ReconcileError::MissingReferences { .. }
            | ReconcileError::InvalidPartyType { .. } => Remedy::ChooseDifferentAction,
            ReconcileError::SubmitError(_) | ReconcileError::Timeout { .. } => Remedy::Retry,
            ReconcileError::EmptyImport
            | ReconcileError::AlreadyClosed(_)
            | ReconcileError::SubmissionPending(_)
            | ReconcileError::UnknownTransaction(_) => Remedy::Informational,
        }
    }
}

/// Result type for reconciliation operations
pub type ReconcileResult<T> = Result<T, ReconcileError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_defaults() -> AccountDefaults {
        AccountDefaults {
            company: Some("ACME".to_string()),
            default_supplier: Some("SUP-DEFAULT".to_string()),
            default_customer: Some("CUST-DEFAULT".to_string()),
            intermediate_account: Some("1099 - Transfer".to_string()),
            default_payable_account: Some("2000 - Payables".to_string()),
            default_receivable_account: Some("1100 - Receivables".to_string()),
        }
    }

    #[test]
    fn test_context_from_complete_defaults() {
        let context = AccountContext::from_defaults("1020 - Bank", complete_defaults()).unwrap();
        assert_eq!(context.bank_account, "1020 - Bank");
        assert_eq!(context.company, "ACME");
        assert_eq!(context.default_party(CreditDebit::Debit), "SUP-DEFAULT");
        assert_eq!(context.default_party(CreditDebit::Credit), "CUST-DEFAULT");
    }

    #[test]
    fn test_context_reports_every_missing_field() {
        let defaults = AccountDefaults {
            intermediate_account: None,
            default_customer: Some("  ".to_string()),
            ..complete_defaults()
        };

        let err = AccountContext::from_defaults("1020 - Bank", defaults).unwrap_err();
        match &err {
            ReconcileError::IncompleteContext {
                company, missing, ..
            } => {
                assert_eq!(company.as_deref(), Some("ACME"));
                assert_eq!(missing, &vec!["default_customer", "intermediate_account"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.remedy(), Remedy::FixConfiguration);
        assert!(err.to_string().contains("ACME"));
    }

    #[test]
    fn test_context_without_company() {
        let err = AccountContext::from_defaults("1020 - Bank", AccountDefaults::default())
            .unwrap_err();
        assert!(err.to_string().contains("the company"));
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(serde_json::to_string(&CreditDebit::Debit).unwrap(), "\"DBIT\"");
        assert_eq!(serde_json::to_string(&CreditDebit::Credit).unwrap(), "\"CRDT\"");
        assert_eq!(
            serde_json::to_string(&PaymentType::InternalTransfer).unwrap(),
            "\"Internal Transfer\""
        );
        assert_eq!(serde_json::to_string(&PartyType::Employee).unwrap(), "\"Employee\"");
    }

    #[test]
    fn test_transaction_from_parser_json() {
        let json = r#"{
            "txid": "t1",
            "amount": "100",
            "date": "2024-03-01",
            "credit_debit": "DBIT",
            "unique_reference": "REF-1",
            "party_name": "Supplier Ltd",
            "party_match": "SUP-01",
            "invoice_matches": ["INV-1"],
            "expense_matches": []
        }"#;

        let transaction: Transaction = serde_json::from_str(json).unwrap();
        let transaction = transaction.normalized();

        assert_eq!(transaction.credit_debit, CreditDebit::Debit);
        assert_eq!(transaction.amount, BigDecimal::from(100));
        assert_eq!(transaction.expense_matches, None);
        assert_eq!(
            transaction.references_for(PartyType::Supplier),
            Some(&["INV-1".to_string()][..])
        );
        assert_eq!(transaction.remarks(), ", Supplier Ltd, ");
    }

    #[test]
    fn test_transaction_with_numeric_txid_and_null_remarks() {
        let json = r#"{
            "txid": 0,
            "amount": 100.0,
            "date": "2024-03-01",
            "credit_debit": "CRDT",
            "unique_reference": "REF-2",
            "transaction_reference": "QRR-77",
            "party_name": null,
            "party_address": null,
            "party_iban": null,
            "party_match": null
        }"#;

        let transaction: Transaction = serde_json::from_str(json).unwrap();

        assert_eq!(transaction.txid, "0");
        assert_eq!(transaction.amount, BigDecimal::from(100));
        assert_eq!(transaction.party_name, "");
        assert_eq!(transaction.party_address, "");
        assert_eq!(transaction.party_match, None);
        assert_eq!(transaction.remarks(), "QRR-77, , ");
    }

    #[test]
    fn test_remedy_classification() {
        assert_eq!(
            ReconcileError::UnsupportedFormat("a.csv".into()).remedy(),
            Remedy::FixInput
        );
        assert_eq!(
            ReconcileError::MissingReferences {
                txid: "t1".into(),
                party_type: PartyType::Customer,
            }
            .remedy(),
            Remedy::ChooseDifferentAction
        );
        assert_eq!(ReconcileError::SubmitError("down".into()).remedy(), Remedy::Retry);
        assert_eq!(ReconcileError::EmptyImport.remedy(), Remedy::Informational);
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: ImportOptions = serde_json::from_str(r#"{"submit_timeout_secs": 5}"#).unwrap();
        assert_eq!(options.parse_timeout(), Duration::from_secs(120));
        assert_eq!(options.submit_timeout(), Duration::from_secs(5));
    }
}
