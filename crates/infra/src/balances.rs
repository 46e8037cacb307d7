//! Balance recomputation port and a journal-derived reference book.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use ledgerpost_accounting::JournalLedger;
use ledgerpost_core::{AccountId, BranchId, BusinessId, CurrencyId, DomainError, DomainResult};

/// One `recompute_balances` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceRecompute {
    pub business_id: BusinessId,
    pub base_currency_id: CurrencyId,
    pub branch_id: BranchId,
    pub account_ids: Vec<AccountId>,
    pub as_of: NaiveDate,
    pub foreign_currency_id: Option<CurrencyId>,
}

/// Materializes running account balances from a given date forward.
///
/// Runs inside the event's transaction and reads journals through it, so it
/// sees the postings the event has just written.
///
/// # Rollback
///
/// The ledger transaction does not cover the recomputer's own storage. When
/// a later step fails the journals roll back but whatever `recompute` wrote
/// stays. Implementations must therefore derive every write from the
/// journals alone, so that the next recompute over the same coordinates
/// replaces a rolled-back result. A failed event is retried with the same
/// coordinates.
pub trait BalanceRecomputer: Send + Sync {
    fn recompute(&self, ledger: &dyn JournalLedger, request: &BalanceRecompute) -> DomainResult<()>;
}

impl<R> BalanceRecomputer for Arc<R>
where
    R: BalanceRecomputer + ?Sized,
{
    fn recompute(
        &self,
        ledger: &dyn JournalLedger,
        request: &BalanceRecompute,
    ) -> DomainResult<()> {
        (**self).recompute(ledger, request)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct BalanceKey {
    business_id: BusinessId,
    branch_id: BranchId,
    account_id: AccountId,
    /// `None` for the base-currency balance.
    currency_id: Option<CurrencyId>,
}

/// Closing balance (debits minus credits) per posting date.
type DailyClosing = BTreeMap<NaiveDate, Decimal>;

/// Reference balance materializer: daily closing balances per
/// (business, branch, account, currency), rebuilt from journals on request.
///
/// Not transactional. Each request clears the closings from `as_of` onward
/// and rebuilds them, so results written by a rolled-back event are replaced
/// on the next recompute at or before their date.
#[derive(Debug, Default)]
pub struct JournalBalanceBook {
    closings: RwLock<HashMap<BalanceKey, DailyClosing>>,
    requests: RwLock<Vec<BalanceRecompute>>,
}

impl JournalBalanceBook {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> DomainError {
        DomainError::persistence("balance book lock poisoned")
    }

    /// Base-currency closing balance on `date` (latest materialized day at or before it).
    pub fn base_balance(
        &self,
        business_id: BusinessId,
        branch_id: BranchId,
        account_id: AccountId,
        date: NaiveDate,
    ) -> DomainResult<Decimal> {
        let key = BalanceKey {
            business_id,
            branch_id,
            account_id,
            currency_id: None,
        };
        self.balance(key, date)
    }

    pub fn foreign_balance(
        &self,
        business_id: BusinessId,
        branch_id: BranchId,
        account_id: AccountId,
        currency_id: CurrencyId,
        date: NaiveDate,
    ) -> DomainResult<Decimal> {
        let key = BalanceKey {
            business_id,
            branch_id,
            account_id,
            currency_id: Some(currency_id),
        };
        self.balance(key, date)
    }

    /// Every request received, in order.
    pub fn requests(&self) -> DomainResult<Vec<BalanceRecompute>> {
        Ok(self.requests.read().map_err(|_| Self::poisoned())?.clone())
    }

    fn balance(&self, key: BalanceKey, date: NaiveDate) -> DomainResult<Decimal> {
        let closings = self.closings.read().map_err(|_| Self::poisoned())?;
        Ok(closings
            .get(&key)
            .and_then(|days| days.range(..=date).next_back())
            .map(|(_, closing)| *closing)
            .unwrap_or(Decimal::ZERO))
    }
}

impl BalanceRecomputer for JournalBalanceBook {
    fn recompute(
        &self,
        ledger: &dyn JournalLedger,
        request: &BalanceRecompute,
    ) -> DomainResult<()> {
        let journals = ledger.journals_for_business(request.business_id)?;

        let mut currencies = vec![None];
        if let Some(foreign) = request.foreign_currency_id {
            currencies.push(Some(foreign));
        }

        let mut closings = self.closings.write().map_err(|_| Self::poisoned())?;
        for account_id in &request.account_ids {
            for currency_id in &currencies {
                // Net movement per day for this account/branch/currency.
                let mut movements: DailyClosing = BTreeMap::new();
                for t in journals.iter().flat_map(|j| j.transactions.iter()) {
                    if t.account_id != *account_id || t.branch_id != request.branch_id {
                        continue;
                    }
                    let net = match currency_id {
                        None => t.base_debit() - t.base_credit(),
                        Some(c) if t.foreign_currency_id == Some(*c) => {
                            t.foreign_debit() - t.foreign_credit()
                        }
                        Some(_) => continue,
                    };
                    *movements.entry(t.date).or_default() += net;
                }

                let key = BalanceKey {
                    business_id: request.business_id,
                    branch_id: request.branch_id,
                    account_id: *account_id,
                    currency_id: *currency_id,
                };
                let days = closings.entry(key).or_default();
                days.retain(|d, _| *d < request.as_of);

                let mut running: Decimal = movements.range(..request.as_of).map(|(_, v)| *v).sum();
                let on_as_of = movements.get(&request.as_of).copied().unwrap_or_default();
                days.insert(request.as_of, running + on_as_of);
                for (day, net) in movements.range(request.as_of..) {
                    running += *net;
                    days.insert(*day, running);
                }
            }
        }
        drop(closings);

        debug!(
            business_id = %request.business_id,
            branch_id = %request.branch_id,
            accounts = request.account_ids.len(),
            as_of = %request.as_of,
            "recomputed balances"
        );
        self.requests
            .write()
            .map_err(|_| Self::poisoned())?
            .push(request.clone());
        Ok(())
    }
}
