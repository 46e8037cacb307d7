//! Append-only corrections for both ledgers.
//!
//! Nothing here deletes or edits a posted value. A correction is always a new
//! row (or journal) pointing at the one it negates; the only field written on
//! an original is its reversal mark, and that is written at most once.

use chrono::{NaiveDate, Utc};
use tracing::debug;

use ledgerpost_accounting::{AccountJournal, JournalLedger};
use ledgerpost_core::{
    AccountId, BranchId, CurrencyId, DocumentRef, DomainError, DomainResult, JournalId,
    StockRowId,
};
use ledgerpost_inventory::{ReversalMark, StockHistory, StockLedger, StockRowDraft};

use crate::store::LedgerTx;

/// A reversal journal plus the accounts it posts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalReversal {
    pub journal: AccountJournal,
    pub touched_accounts: Vec<AccountId>,
}

impl JournalReversal {
    pub fn journal_id(&self) -> JournalId {
        self.journal.id
    }
}

/// Result of `ReversalEngine::replace_stock_row`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Replacement {
    /// Quantity, unit value and description were unchanged; nothing written.
    Unchanged(StockHistory),
    Replaced {
        reversal: StockHistory,
        replacement: StockHistory,
    },
}

/// Everything written when one document version is withdrawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentReversal {
    pub journal: JournalReversal,
    pub stock_reversals: Vec<StockHistory>,
    /// Posting coordinates of the withdrawn version.
    pub branch_id: BranchId,
    pub date: NaiveDate,
    pub foreign_currency_id: Option<CurrencyId>,
}

impl DocumentReversal {
    pub fn touched_accounts(&self) -> &[AccountId] {
        &self.journal.touched_accounts
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ReversalEngine;

impl ReversalEngine {
    pub fn new() -> Self {
        Self
    }

    /// Append a reversal of the active journal for `reference`.
    pub fn reverse_journal<L>(
        &self,
        ledger: &mut L,
        reference: DocumentRef,
    ) -> DomainResult<JournalReversal>
    where
        L: JournalLedger + ?Sized,
    {
        let original = ledger
            .active_journal(reference)?
            .ok_or_else(|| DomainError::lookup(format!("no active journal for {reference}")))?;

        let reversal = original.reversal(JournalId::new(), Utc::now());
        let touched_accounts = original.touched_accounts();
        ledger.insert_journal(reversal.clone())?;

        debug!(%reference, original = %original.id, reversal = %reversal.id, "reversed journal");
        Ok(JournalReversal {
            journal: reversal,
            touched_accounts,
        })
    }

    /// Append a negating row for every given row that is still unreversed.
    ///
    /// Rows are re-read from the ledger first, so a stale copy of an already
    /// reversed row is skipped rather than reversed twice.
    pub fn reverse_stock_rows<L>(
        &self,
        ledger: &mut L,
        rows: &[StockHistory],
        reason: &str,
    ) -> DomainResult<Vec<StockHistory>>
    where
        L: StockLedger + ?Sized,
    {
        let now = Utc::now();
        let mut created = Vec::with_capacity(rows.len());

        for row in rows {
            let current = ledger
                .stock_row(row.id)?
                .ok_or_else(|| DomainError::lookup(format!("stock row {} not found", row.id)))?;
            if current.is_reversal || current.is_reversed() {
                debug!(row = %current.id, "stock row already reversed, skipping");
                continue;
            }

            let reversal = current.reversal(StockRowId::new(), reason, now);
            let mark = ReversalMark {
                reversed_by_id: reversal.id,
                reason: reason.to_string(),
                reversed_at: now,
            };
            match ledger.mark_stock_row_reversed(current.id, mark) {
                Ok(()) => {}
                Err(e) if e.is_benign() => continue,
                Err(e) => return Err(e),
            }
            ledger.insert_stock_row(reversal.clone())?;
            created.push(reversal);
        }

        Ok(created)
    }

    /// Supersede a row with an edited copy.
    ///
    /// `mutate` edits a draft that carries only the row's business fields. When
    /// the edit leaves quantity, unit value and description as they were, the
    /// original is returned and nothing is written.
    pub fn replace_stock_row<L, F>(
        &self,
        ledger: &mut L,
        old_id: StockRowId,
        reason: &str,
        mutate: F,
    ) -> DomainResult<Replacement>
    where
        L: StockLedger + ?Sized,
        F: FnOnce(&mut StockRowDraft),
    {
        let original = ledger
            .stock_row(old_id)?
            .ok_or_else(|| DomainError::lookup(format!("stock row {old_id} not found")))?;
        if original.is_reversal || original.is_reversed() {
            return Err(DomainError::already_reversed(format!("stock row {old_id}")));
        }

        let mut draft = original.to_draft();
        mutate(&mut draft);
        if draft.same_movement_as(&original) {
            return Ok(Replacement::Unchanged(original));
        }

        let reversal = self
            .reverse_stock_rows(ledger, std::slice::from_ref(&original), reason)?
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::already_reversed(format!("stock row {old_id}")))?;
        let replacement = StockHistory::new(StockRowId::new(), draft, Utc::now());
        ledger.insert_stock_row(replacement.clone())?;

        Ok(Replacement::Replaced {
            reversal,
            replacement,
        })
    }

    /// Withdraw the current version of a document from both ledgers.
    pub fn reverse_document<L>(
        &self,
        tx: &mut L,
        reference: DocumentRef,
        reason: &str,
    ) -> DomainResult<DocumentReversal>
    where
        L: LedgerTx + ?Sized,
    {
        let journal = self.reverse_journal(tx, reference)?;
        let active = tx.active_stock_rows(reference)?;
        let stock_reversals = self.reverse_stock_rows(tx, &active, reason)?;

        debug!(%reference, stock_reversals = stock_reversals.len(), "reversed document");

        Ok(DocumentReversal {
            branch_id: journal.journal.branch_id,
            date: journal.journal.date,
            foreign_currency_id: journal.journal.foreign_currency(),
            journal,
            stock_reversals,
        })
    }
}
