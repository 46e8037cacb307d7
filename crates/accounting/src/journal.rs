use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ledgerpost_core::{
    AccountId, BranchId, BusinessId, CurrencyId, DocumentRef, DomainError, DomainResult,
    JournalId, Side,
};

/// One posting line of a journal (immutable).
///
/// Amounts are never negative; `side` says which column they land in. A
/// posting carries its base amount and, for foreign-currency documents, the
/// foreign amount it was translated from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountTransaction {
    pub account_id: AccountId,
    pub branch_id: BranchId,
    pub date: NaiveDate,
    pub side: Side,
    pub base_currency_id: CurrencyId,
    pub base_amount: Decimal,
    pub foreign_currency_id: Option<CurrencyId>,
    pub foreign_amount: Option<Decimal>,
    pub exchange_rate: Decimal,
    /// Zero-amount placeholder later reconciled by the valuation engine.
    #[serde(default)]
    pub is_inventory_valuation: bool,
}

impl AccountTransaction {
    pub fn base_debit(&self) -> Decimal {
        if self.side.is_debit() { self.base_amount } else { Decimal::ZERO }
    }

    pub fn base_credit(&self) -> Decimal {
        if self.side.is_debit() { Decimal::ZERO } else { self.base_amount }
    }

    pub fn foreign_debit(&self) -> Decimal {
        match (self.side, self.foreign_amount) {
            (Side::Debit, Some(a)) => a,
            _ => Decimal::ZERO,
        }
    }

    pub fn foreign_credit(&self) -> Decimal {
        match (self.side, self.foreign_amount) {
            (Side::Credit, Some(a)) => a,
            _ => Decimal::ZERO,
        }
    }

    /// Same posting on the opposite side.
    pub fn reversed(&self) -> Self {
        Self {
            side: self.side.opposite(),
            ..self.clone()
        }
    }
}

/// Column totals of a journal.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct JournalTotals {
    pub base_debits: Decimal,
    pub base_credits: Decimal,
    pub foreign_debits: Decimal,
    pub foreign_credits: Decimal,
}

/// Tagging shared by every posting of a journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalHeader {
    pub business_id: BusinessId,
    pub reference: DocumentRef,
    pub branch_id: BranchId,
    pub date: NaiveDate,
    pub description: Option<String>,
}

/// Balanced set of postings for one accounting event.
///
/// Journals are never deleted or edited. A correction is a new journal whose
/// `reversal_of` points at the original.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountJournal {
    pub id: JournalId,
    pub business_id: BusinessId,
    pub reference: DocumentRef,
    pub branch_id: BranchId,
    pub date: NaiveDate,
    pub description: Option<String>,
    pub transactions: Vec<AccountTransaction>,
    pub reversal_of: Option<JournalId>,
    pub created_at: DateTime<Utc>,
}

impl AccountJournal {
    /// Build a journal, rejecting it unless it balances in both currencies.
    pub fn new(
        id: JournalId,
        header: JournalHeader,
        transactions: Vec<AccountTransaction>,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let journal = Self {
            id,
            business_id: header.business_id,
            reference: header.reference,
            branch_id: header.branch_id,
            date: header.date,
            description: header.description,
            transactions,
            reversal_of: None,
            created_at,
        };
        journal.validate_balanced()?;
        Ok(journal)
    }

    pub fn totals(&self) -> JournalTotals {
        self.transactions
            .iter()
            .fold(JournalTotals::default(), |mut acc, t| {
                acc.base_debits += t.base_debit();
                acc.base_credits += t.base_credit();
                acc.foreign_debits += t.foreign_debit();
                acc.foreign_credits += t.foreign_credit();
                acc
            })
    }

    pub fn validate_balanced(&self) -> DomainResult<()> {
        for t in &self.transactions {
            if t.base_amount.is_sign_negative() && !t.base_amount.is_zero() {
                return Err(DomainError::validation("posting amount must not be negative"));
            }
            if t.is_inventory_valuation && !t.base_amount.is_zero() {
                return Err(DomainError::validation(
                    "inventory valuation placeholder must carry a zero amount",
                ));
            }
        }

        let totals = self.totals();
        if totals.base_debits != totals.base_credits {
            return Err(DomainError::Imbalance {
                currency: "base",
                debits: totals.base_debits,
                credits: totals.base_credits,
            });
        }
        if totals.foreign_debits != totals.foreign_credits {
            return Err(DomainError::Imbalance {
                currency: "foreign",
                debits: totals.foreign_debits,
                credits: totals.foreign_credits,
            });
        }
        Ok(())
    }

    /// Distinct accounts in first-posted order.
    pub fn touched_accounts(&self) -> Vec<AccountId> {
        let mut out: Vec<AccountId> = Vec::with_capacity(self.transactions.len());
        for t in &self.transactions {
            if !out.contains(&t.account_id) {
                out.push(t.account_id);
            }
        }
        out
    }

    pub fn foreign_currency(&self) -> Option<CurrencyId> {
        self.transactions.iter().find_map(|t| t.foreign_currency_id)
    }

    pub fn is_reversal(&self) -> bool {
        self.reversal_of.is_some()
    }

    /// Journal negating this one: same postings, opposite sides, same date.
    pub fn reversal(&self, id: JournalId, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            business_id: self.business_id,
            reference: self.reference,
            branch_id: self.branch_id,
            date: self.date,
            description: Some(match &self.description {
                Some(d) => format!("Reversal of: {d}"),
                None => format!("Reversal of journal {}", self.id),
            }),
            transactions: self.transactions.iter().map(|t| t.reversed()).collect(),
            reversal_of: Some(self.id),
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerpost_core::{DocumentId, DocumentKind};
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    struct Fixture {
        header: JournalHeader,
        base: CurrencyId,
    }

    fn fixture() -> Fixture {
        Fixture {
            header: JournalHeader {
                business_id: BusinessId::new(),
                reference: DocumentRef::new(DocumentKind::Bill, DocumentId::new()),
                branch_id: BranchId::new(),
                date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                description: Some("Bill BILL-001".to_string()),
            },
            base: CurrencyId::new(),
        }
    }

    fn posting(
        f: &Fixture,
        account_id: AccountId,
        side: Side,
        amount: Decimal,
    ) -> AccountTransaction {
        AccountTransaction {
            account_id,
            branch_id: f.header.branch_id,
            date: f.header.date,
            side,
            base_currency_id: f.base,
            base_amount: amount,
            foreign_currency_id: None,
            foreign_amount: None,
            exchange_rate: Decimal::ONE,
            is_inventory_valuation: false,
        }
    }

    #[test]
    fn balanced_journal_is_accepted() {
        let f = fixture();
        let payable = AccountId::new();
        let expense = AccountId::new();
        let lines = vec![
            posting(&f, payable, Side::Credit, dec!(100)),
            posting(&f, expense, Side::Debit, dec!(60)),
            posting(&f, expense, Side::Debit, dec!(40)),
        ];
        let journal = AccountJournal::new(JournalId::new(), f.header, lines, Utc::now()).unwrap();
        assert_eq!(journal.touched_accounts(), vec![payable, expense]);
        assert!(!journal.is_reversal());
        assert_eq!(journal.foreign_currency(), None);
    }

    #[test]
    fn unbalanced_journal_is_rejected() {
        let f = fixture();
        let lines = vec![
            posting(&f, AccountId::new(), Side::Credit, dec!(100)),
            posting(&f, AccountId::new(), Side::Debit, dec!(90)),
        ];
        let err = AccountJournal::new(JournalId::new(), f.header, lines, Utc::now()).unwrap_err();
        match err {
            DomainError::Imbalance { currency: "base", debits, credits } => {
                assert_eq!(debits, dec!(90));
                assert_eq!(credits, dec!(100));
            }
            other => panic!("expected base imbalance, got {other:?}"),
        }
    }

    #[test]
    fn foreign_columns_must_balance_independently() {
        let f = fixture();
        let usd = CurrencyId::new();
        let mut credit = posting(&f, AccountId::new(), Side::Credit, dec!(150));
        credit.foreign_currency_id = Some(usd);
        credit.foreign_amount = Some(dec!(100));
        let mut debit = posting(&f, AccountId::new(), Side::Debit, dec!(150));
        debit.foreign_currency_id = Some(usd);
        debit.foreign_amount = Some(dec!(99));

        let err = AccountJournal::new(JournalId::new(), f.header, vec![credit, debit], Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::Imbalance { currency: "foreign", .. }));
    }

    #[test]
    fn placeholder_with_amount_is_rejected() {
        let f = fixture();
        let mut p = posting(&f, AccountId::new(), Side::Debit, dec!(5));
        p.is_inventory_valuation = true;
        let q = posting(&f, AccountId::new(), Side::Credit, dec!(5));
        let err =
            AccountJournal::new(JournalId::new(), f.header, vec![p, q], Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn reversal_flips_every_side_and_keeps_amounts() {
        let f = fixture();
        let payable = AccountId::new();
        let tax = AccountId::new();
        let expense = AccountId::new();
        let lines = vec![
            posting(&f, payable, Side::Credit, dec!(110)),
            posting(&f, tax, Side::Debit, dec!(10)),
            posting(&f, expense, Side::Debit, dec!(100)),
        ];
        let original = AccountJournal::new(JournalId::new(), f.header, lines, Utc::now()).unwrap();
        let reversal = original.reversal(JournalId::new(), Utc::now());

        assert_eq!(reversal.reversal_of, Some(original.id));
        assert_eq!(reversal.reference, original.reference);
        assert_eq!(reversal.date, original.date);
        assert_eq!(reversal.touched_accounts(), original.touched_accounts());
        for (a, b) in original.transactions.iter().zip(&reversal.transactions) {
            assert_eq!(a.base_amount, b.base_amount);
            assert_eq!(a.side.opposite(), b.side);
        }
        reversal.validate_balanced().unwrap();
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// A journal and its reversal net every account to zero.
        #[test]
        fn journal_plus_reversal_nets_to_zero(
            amounts in prop::collection::vec(1i64..1_000_000i64, 1..10)
        ) {
            let f = fixture();
            let control = AccountId::new();
            let mut lines = Vec::new();
            let mut total = Decimal::ZERO;
            for cents in &amounts {
                let amount = Decimal::new(*cents, 2);
                total += amount;
                lines.push(posting(&f, AccountId::new(), Side::Debit, amount));
            }
            lines.push(posting(&f, control, Side::Credit, total));

            let journal =
                AccountJournal::new(JournalId::new(), f.header, lines, Utc::now()).unwrap();
            let reversal = journal.reversal(JournalId::new(), Utc::now());

            let mut net = Decimal::ZERO;
            for t in journal.transactions.iter().chain(&reversal.transactions) {
                net += t.base_debit() - t.base_credit();
            }
            prop_assert_eq!(net, Decimal::ZERO);
            let totals = reversal.totals();
            prop_assert_eq!(totals.base_debits, total);
        }
    }
}
