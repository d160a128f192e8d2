//! Resolution engine: derives payment entry parameters for a transaction
//!
//! Every per-row action a user can take is a [`ResolutionAction`] and all of
//! them are dispatched through [`resolve`], so the payment fields are built
//! in exactly one place.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::types::*;

/// How the user chose to settle a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResolutionAction {
    /// Settle the matched documents and submit the entry right away
    QuickMatch(PartyType),
    /// Settle the matched documents, leave the entry for review
    CloseMatch(PartyType),
    /// Book against the matched party without document references
    CloseParty(PartyType),
    /// Book against the company's default supplier or customer
    CloseDefault,
    /// Park the amount on the intermediate account
    InternalTransfer,
}

impl ResolutionAction {
    /// Whether the resulting entry is finalized by the ledger service
    pub fn auto_submits(&self) -> bool {
        matches!(self, ResolutionAction::QuickMatch(_))
    }

    /// Party type named by the action, if any
    pub fn party_type(&self) -> Option<PartyType> {
        match self {
            ResolutionAction::QuickMatch(party_type)
            | ResolutionAction::CloseMatch(party_type)
            | ResolutionAction::CloseParty(party_type) => Some(*party_type),
            ResolutionAction::CloseDefault | ResolutionAction::InternalTransfer => None,
        }
    }
}

/// Derive the payment specification for `action` on `transaction`
pub fn resolve(
    transaction: &Transaction,
    context: &AccountContext,
    action: ResolutionAction,
) -> ReconcileResult<PaymentSpecification> {
    let direction = transaction.credit_debit;
    if let Some(party_type) = action.party_type() {
        if !direction.allows(party_type) {
            return Err(ReconcileError::InvalidPartyType {
                direction,
                party_type,
            });
        }
    }

    let (paid_from, paid_to) = route(direction, context, action);
    let mut payment = PaymentSpecification {
        amount: transaction.amount.clone(),
        date: transaction.date,
        reference_no: transaction.unique_reference.clone(),
        remarks: transaction.remarks(),
        company: context.company.clone(),
        payment_type: direction.payment_type(),
        paid_from,
        paid_to,
        party_type: None,
        party: None,
        references: None,
        auto_submit: action.auto_submits(),
    };

    match action {
        ResolutionAction::QuickMatch(party_type) | ResolutionAction::CloseMatch(party_type) => {
            let references = transaction.references_for(party_type).ok_or_else(|| {
                ReconcileError::MissingReferences {
                    txid: transaction.txid.clone(),
                    party_type,
                }
            })?;
            payment.party_type = Some(party_type);
            payment.party = Some(matched_party(transaction, party_type)?);
            payment.references = Some(references.to_vec());
        }
        ResolutionAction::CloseParty(party_type) => {
            payment.party_type = Some(party_type);
            payment.party = Some(matched_party(transaction, party_type)?);
        }
        ResolutionAction::CloseDefault => {
            payment.party_type = Some(direction.default_party_type());
            payment.party = Some(context.default_party(direction).to_string());
        }
        ResolutionAction::InternalTransfer => {
            payment.payment_type = PaymentType::InternalTransfer;
        }
    }

    debug!(
        "Resolved transaction {} via {:?}: {:?} {} -> {}",
        transaction.txid, action, payment.payment_type, payment.paid_from, payment.paid_to
    );
    Ok(payment)
}

/// Actions [`resolve`] accepts for this transaction, in display order
pub fn available_actions(transaction: &Transaction) -> Vec<ResolutionAction> {
    let party_types = transaction.credit_debit.party_types();
    let has_party = |party_type: PartyType| matched_party(transaction, party_type).is_ok();
    let can_match = |party_type: PartyType| {
        has_party(party_type) && transaction.references_for(party_type).is_some()
    };

    let mut actions = Vec::new();
    for make in [ResolutionAction::QuickMatch, ResolutionAction::CloseMatch] {
        actions.extend(
            party_types
                .iter()
                .copied()
                .filter(|pt| can_match(*pt))
                .map(make),
        );
    }
    actions.extend(
        party_types
            .iter()
            .copied()
            .filter(|pt| has_party(*pt))
            .map(ResolutionAction::CloseParty),
    );
    actions.push(ResolutionAction::CloseDefault);
    actions.push(ResolutionAction::InternalTransfer);
    actions
}

fn route(
    direction: CreditDebit,
    context: &AccountContext,
    action: ResolutionAction,
) -> (String, String) {
    let bank = context.bank_account.clone();
    let counter = match (action, direction) {
        (ResolutionAction::InternalTransfer, _) => &context.intermediate_account,
        (_, CreditDebit::Debit) => &context.default_payable_account,
        (_, CreditDebit::Credit) => &context.default_receivable_account,
    };
    match direction {
        CreditDebit::Debit => (bank, counter.clone()),
        CreditDebit::Credit => (counter.clone(), bank),
    }
}

fn matched_party(transaction: &Transaction, party_type: PartyType) -> ReconcileResult<String> {
    transaction
        .party_match_for(party_type)
        .filter(|party| !party.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| ReconcileError::MissingPartyMatch {
            txid: transaction.txid.clone(),
            party_type,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;

    fn context() -> AccountContext {
        AccountContext {
            bank_account: "1020 - Bank".to_string(),
            company: "ACME".to_string(),
            default_supplier: "SUP-DEFAULT".to_string(),
            default_customer: "CUST-DEFAULT".to_string(),
            intermediate_account: "1099 - Transfer".to_string(),
            default_payable_account: "2000 - Payables".to_string(),
            default_receivable_account: "1100 - Receivables".to_string(),
        }
    }

    fn debit() -> Transaction {
        Transaction::new(
            "t1",
            BigDecimal::from(100),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            CreditDebit::Debit,
            "E2E-1",
        )
        .with_remarks("INV-1", "Supplier Ltd", "Main St 1, 8000 Zurich, CH")
        .with_party_match("SUP-01")
        .with_invoice_matches(["INV-1"])
    }

    fn credit() -> Transaction {
        Transaction::new(
            "t2",
            BigDecimal::from(250),
            NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
            CreditDebit::Credit,
            "E2E-2",
        )
        .with_party_match("CUST-01")
        .with_invoice_matches(["SINV-7", "SINV-8"])
    }

    #[test]
    fn test_close_match_on_debit() {
        let payment =
            resolve(&debit(), &context(), ResolutionAction::CloseMatch(PartyType::Supplier))
                .unwrap();

        assert_eq!(payment.payment_type, PaymentType::Pay);
        assert_eq!(payment.party_type, Some(PartyType::Supplier));
        assert_eq!(payment.party.as_deref(), Some("SUP-01"));
        assert_eq!(payment.references, Some(vec!["INV-1".to_string()]));
        assert!(!payment.auto_submit);
        assert_eq!(payment.paid_from, "1020 - Bank");
        assert_eq!(payment.paid_to, "2000 - Payables");
        assert_eq!(payment.reference_no, "E2E-1");
        assert_eq!(payment.remarks, "INV-1, Supplier Ltd, Main St 1, 8000 Zurich, CH");
        assert_eq!(payment.company, "ACME");
        assert_eq!(payment.reference_doctype(), Some("Purchase Invoice"));
    }

    #[test]
    fn test_close_default_uses_default_supplier() {
        let payment = resolve(&debit(), &context(), ResolutionAction::CloseDefault).unwrap();

        assert_eq!(payment.party_type, Some(PartyType::Supplier));
        assert_eq!(payment.party.as_deref(), Some("SUP-DEFAULT"));
        assert_eq!(payment.references, None);
    }

    #[test]
    fn test_close_default_uses_default_customer() {
        let payment = resolve(&credit(), &context(), ResolutionAction::CloseDefault).unwrap();

        assert_eq!(payment.payment_type, PaymentType::Receive);
        assert_eq!(payment.party_type, Some(PartyType::Customer));
        assert_eq!(payment.party.as_deref(), Some("CUST-DEFAULT"));
        assert_eq!(payment.paid_from, "1100 - Receivables");
        assert_eq!(payment.paid_to, "1020 - Bank");
    }

    #[test]
    fn test_internal_transfer_on_credit() {
        let payment = resolve(&credit(), &context(), ResolutionAction::InternalTransfer).unwrap();

        assert_eq!(payment.payment_type, PaymentType::InternalTransfer);
        assert_eq!(payment.paid_from, "1099 - Transfer");
        assert_eq!(payment.paid_to, "1020 - Bank");
        assert_eq!(payment.party_type, None);
        assert_eq!(payment.party, None);
        assert_eq!(payment.references, None);
    }

    #[test]
    fn test_internal_transfer_on_debit() {
        let payment = resolve(&debit(), &context(), ResolutionAction::InternalTransfer).unwrap();

        assert_eq!(payment.paid_from, "1020 - Bank");
        assert_eq!(payment.paid_to, "1099 - Transfer");
        assert_eq!(payment.party, None);
        assert!(!payment.auto_submit);
    }

    #[test]
    fn test_quick_and_close_match_differ_only_in_auto_submit() {
        for (transaction, party_type) in [
            (debit(), PartyType::Supplier),
            (credit(), PartyType::Customer),
        ] {
            let quick =
                resolve(&transaction, &context(), ResolutionAction::QuickMatch(party_type))
                    .unwrap();
            let close =
                resolve(&transaction, &context(), ResolutionAction::CloseMatch(party_type))
                    .unwrap();

            assert!(quick.auto_submit);
            assert_eq!(
                PaymentSpecification {
                    auto_submit: false,
                    ..quick
                },
                close
            );
        }
    }

    #[test]
    fn test_direction_fixes_payment_type_and_bank_side() {
        let actions = [
            ResolutionAction::CloseDefault,
            ResolutionAction::InternalTransfer,
        ];
        for action in actions {
            let pay = resolve(&debit(), &context(), action).unwrap();
            assert_eq!(pay.paid_from, "1020 - Bank");
            if action != ResolutionAction::InternalTransfer {
                assert_eq!(pay.payment_type, PaymentType::Pay);
            }

            let receive = resolve(&credit(), &context(), action).unwrap();
            assert_eq!(receive.paid_to, "1020 - Bank");
            if action != ResolutionAction::InternalTransfer {
                assert_eq!(receive.payment_type, PaymentType::Receive);
            }
        }
    }

    #[test]
    fn test_quick_match_without_invoices() {
        let transaction = Transaction {
            invoice_matches: Some(Vec::new()),
            ..debit()
        };

        let err = resolve(
            &transaction,
            &context(),
            ResolutionAction::QuickMatch(PartyType::Supplier),
        )
        .unwrap_err();

        assert_eq!(
            err,
            ReconcileError::MissingReferences {
                txid: "t1".to_string(),
                party_type: PartyType::Supplier,
            }
        );
        assert_eq!(err.remedy(), Remedy::ChooseDifferentAction);
    }

    #[test]
    fn test_close_party_without_match() {
        let transaction = Transaction {
            party_match: None,
            ..credit()
        };

        let err = resolve(
            &transaction,
            &context(),
            ResolutionAction::CloseParty(PartyType::Customer),
        )
        .unwrap_err();

        assert!(matches!(err, ReconcileError::MissingPartyMatch { .. }));
    }

    #[test]
    fn test_expense_claim_match() {
        let transaction = debit()
            .with_employee_match("EMP-0003")
            .with_expense_matches(["HR-EXP-0001"]);

        let payment = resolve(
            &transaction,
            &context(),
            ResolutionAction::QuickMatch(PartyType::Employee),
        )
        .unwrap();

        assert_eq!(payment.party_type, Some(PartyType::Employee));
        assert_eq!(payment.party.as_deref(), Some("EMP-0003"));
        assert_eq!(payment.references, Some(vec!["HR-EXP-0001".to_string()]));
        assert_eq!(payment.paid_to, "2000 - Payables");
        assert_eq!(payment.reference_doctype(), Some("Expense Claim"));
    }

    #[test]
    fn test_party_type_must_fit_direction() {
        let err = resolve(
            &credit(),
            &context(),
            ResolutionAction::CloseParty(PartyType::Supplier),
        )
        .unwrap_err();

        assert_eq!(
            err,
            ReconcileError::InvalidPartyType {
                direction: CreditDebit::Credit,
                party_type: PartyType::Supplier,
            }
        );
    }

    #[test]
    fn test_available_actions_follow_matches() {
        assert_eq!(
            available_actions(&debit()),
            vec![
                ResolutionAction::QuickMatch(PartyType::Supplier),
                ResolutionAction::CloseMatch(PartyType::Supplier),
                ResolutionAction::CloseParty(PartyType::Supplier),
                ResolutionAction::CloseDefault,
                ResolutionAction::InternalTransfer,
            ]
        );

        let bare = Transaction::new(
            "t3",
            BigDecimal::from(5),
            NaiveDate::from_ymd_opt(2024, 3, 3).unwrap(),
            CreditDebit::Credit,
            "E2E-3",
        );
        assert_eq!(
            available_actions(&bare),
            vec![
                ResolutionAction::CloseDefault,
                ResolutionAction::InternalTransfer
            ]
        );
    }

    #[test]
    fn test_blank_party_match_offers_no_party_actions() {
        let transaction = credit().with_party_match("  ");

        let actions = available_actions(&transaction);
        assert_eq!(
            actions,
            vec![
                ResolutionAction::CloseDefault,
                ResolutionAction::InternalTransfer
            ]
        );
        assert!(matches!(
            resolve(
                &transaction,
                &context(),
                ResolutionAction::CloseParty(PartyType::Customer)
            ),
            Err(ReconcileError::MissingPartyMatch { .. })
        ));
    }

    #[test]
    fn test_every_available_action_resolves() {
        let transaction = debit()
            .with_employee_match("EMP-0003")
            .with_expense_matches(["HR-EXP-0001"]);

        for action in available_actions(&transaction) {
            assert!(resolve(&transaction, &context(), action).is_ok(), "{action:?}");
        }
    }
}
