//! Journal construction helpers used by the document compilers.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use ledgerpost_core::{AccountId, CurrencyTranslation, DomainResult, JournalId, Side, SignedAmount};

use crate::journal::{AccountJournal, AccountTransaction, JournalHeader};

/// Order-preserving per-account accumulator.
///
/// Accounts are emitted in the order they were first seen, so posting order is
/// stable across runs for the same document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostingAccumulator {
    entries: Vec<(AccountId, Decimal)>,
}

impl PostingAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, account_id: AccountId, amount: Decimal) {
        match self.entries.iter_mut().find(|(a, _)| *a == account_id) {
            Some((_, total)) => *total += amount,
            None => self.entries.push((account_id, amount)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(AccountId, Decimal)> + '_ {
        self.entries.iter()
    }
}

impl IntoIterator for PostingAccumulator {
    type Item = (AccountId, Decimal);
    type IntoIter = std::vec::IntoIter<(AccountId, Decimal)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Mutable journal under construction.
///
/// Amounts are given as stated on the document; the draft applies the currency
/// rule and turns signed values into (side, amount) pairs.
#[derive(Debug, Clone)]
pub struct JournalDraft {
    header: JournalHeader,
    translation: CurrencyTranslation,
    transactions: Vec<AccountTransaction>,
}

impl JournalDraft {
    pub fn new(header: JournalHeader, translation: CurrencyTranslation) -> Self {
        Self {
            header,
            translation,
            transactions: Vec::new(),
        }
    }

    pub fn header(&self) -> &JournalHeader {
        &self.header
    }

    pub fn translation(&self) -> &CurrencyTranslation {
        &self.translation
    }

    /// Post a stated amount on its natural side. Zero amounts are skipped.
    pub fn post(
        &mut self,
        account_id: AccountId,
        natural: Side,
        stated: Decimal,
    ) -> DomainResult<&mut Self> {
        if stated.is_zero() {
            return Ok(self);
        }
        let signed = SignedAmount::on(natural, stated);
        let translated = self.translation.translate(signed.amount)?;
        self.transactions.push(AccountTransaction {
            account_id,
            branch_id: self.header.branch_id,
            date: self.header.date,
            side: signed.side,
            base_currency_id: self.translation.base_currency(),
            base_amount: translated.base,
            foreign_currency_id: self.translation.foreign_currency(),
            foreign_amount: translated.foreign,
            exchange_rate: self.translation.exchange_rate(),
            is_inventory_valuation: false,
        });
        Ok(self)
    }

    /// Zero-amount inventory valuation placeholder.
    pub fn post_placeholder(&mut self, account_id: AccountId, side: Side) -> &mut Self {
        self.transactions.push(AccountTransaction {
            account_id,
            branch_id: self.header.branch_id,
            date: self.header.date,
            side,
            base_currency_id: self.translation.base_currency(),
            base_amount: Decimal::ZERO,
            foreign_currency_id: self.translation.foreign_currency(),
            foreign_amount: self.translation.foreign().map(|_| Decimal::ZERO),
            exchange_rate: self.translation.exchange_rate(),
            is_inventory_valuation: true,
        });
        self
    }

    pub fn transactions(&self) -> &[AccountTransaction] {
        &self.transactions
    }

    pub fn finish(self, id: JournalId, created_at: DateTime<Utc>) -> DomainResult<AccountJournal> {
        AccountJournal::new(id, self.header, self.transactions, created_at)
    }
}
