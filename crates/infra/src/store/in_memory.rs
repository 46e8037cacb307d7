use std::collections::HashMap;
use std::sync::RwLock;

use ledgerpost_accounting::{AccountJournal, JournalLedger};
use ledgerpost_core::{
    BusinessId, DocumentRef, DomainError, DomainResult, EventId, JournalId, StockRowId,
};
use ledgerpost_events::EventRecord;
use ledgerpost_inventory::{LotKey, ReversalMark, StockHistory, StockLedger, StockValuation};

use super::r#trait::{EventLog, LedgerStore, LedgerTx};

/// Append-only tables plus the materialized "current effective" indexes.
#[derive(Debug, Clone, Default)]
struct LedgerState {
    journals: Vec<AccountJournal>,
    journal_pos: HashMap<JournalId, usize>,
    active_journal: HashMap<DocumentRef, JournalId>,

    stock_rows: Vec<StockHistory>,
    stock_pos: HashMap<StockRowId, usize>,
    active_stock: HashMap<DocumentRef, Vec<StockRowId>>,

    events: Vec<EventRecord>,
    event_pos: HashMap<EventId, usize>,
}

impl LedgerState {
    fn stock_row_mut(&mut self, id: StockRowId) -> DomainResult<&mut StockHistory> {
        let pos = *self
            .stock_pos
            .get(&id)
            .ok_or_else(|| DomainError::lookup(format!("stock row {id} not found")))?;
        Ok(&mut self.stock_rows[pos])
    }
}

impl JournalLedger for LedgerState {
    fn insert_journal(&mut self, journal: AccountJournal) -> DomainResult<()> {
        if self.journal_pos.contains_key(&journal.id) {
            return Err(DomainError::persistence(format!(
                "journal {} already exists",
                journal.id
            )));
        }

        match journal.reversal_of {
            Some(original) => {
                if self.active_journal.get(&journal.reference) != Some(&original) {
                    return Err(DomainError::already_reversed(format!(
                        "journal {original} is not the active journal of {}",
                        journal.reference
                    )));
                }
                self.active_journal.remove(&journal.reference);
            }
            None => {
                if let Some(active) = self.active_journal.get(&journal.reference) {
                    return Err(DomainError::persistence(format!(
                        "{} already has active journal {active}",
                        journal.reference
                    )));
                }
                self.active_journal.insert(journal.reference, journal.id);
            }
        }

        self.journal_pos.insert(journal.id, self.journals.len());
        self.journals.push(journal);
        Ok(())
    }

    fn journal(&self, id: JournalId) -> DomainResult<Option<AccountJournal>> {
        Ok(self.journal_pos.get(&id).map(|&pos| self.journals[pos].clone()))
    }

    fn active_journal(&self, reference: DocumentRef) -> DomainResult<Option<AccountJournal>> {
        match self.active_journal.get(&reference) {
            Some(id) => self.journal(*id),
            None => Ok(None),
        }
    }

    fn journals_for_business(&self, business_id: BusinessId) -> DomainResult<Vec<AccountJournal>> {
        Ok(self
            .journals
            .iter()
            .filter(|j| j.business_id == business_id)
            .cloned()
            .collect())
    }
}

impl StockLedger for LedgerState {
    fn insert_stock_row(&mut self, row: StockHistory) -> DomainResult<()> {
        if self.stock_pos.contains_key(&row.id) {
            return Err(DomainError::persistence(format!(
                "stock row {} already exists",
                row.id
            )));
        }
        if !row.is_reversal {
            self.active_stock
                .entry(row.reference.document())
                .or_default()
                .push(row.id);
        }
        self.stock_pos.insert(row.id, self.stock_rows.len());
        self.stock_rows.push(row);
        Ok(())
    }

    fn stock_row(&self, id: StockRowId) -> DomainResult<Option<StockHistory>> {
        Ok(self.stock_pos.get(&id).map(|&pos| self.stock_rows[pos].clone()))
    }

    fn mark_stock_row_reversed(&mut self, id: StockRowId, mark: ReversalMark) -> DomainResult<()> {
        let row = self.stock_row_mut(id)?;
        if row.is_reversal {
            return Err(DomainError::validation(format!(
                "stock row {id} is itself a reversal"
            )));
        }
        if row.is_reversed() {
            return Err(DomainError::already_reversed(format!("stock row {id}")));
        }
        row.apply_reversal_mark(mark);
        let reference = row.reference.document();

        if let Some(ids) = self.active_stock.get_mut(&reference) {
            ids.retain(|r| *r != id);
            if ids.is_empty() {
                self.active_stock.remove(&reference);
            }
        }
        Ok(())
    }

    fn record_valuation(&mut self, id: StockRowId, valuation: StockValuation) -> DomainResult<()> {
        self.stock_row_mut(id)?.valuation = Some(valuation);
        Ok(())
    }

    fn active_stock_rows(&self, reference: DocumentRef) -> DomainResult<Vec<StockHistory>> {
        Ok(self
            .active_stock
            .get(&reference)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.stock_pos.get(id))
                    .map(|&pos| self.stock_rows[pos].clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    fn stock_rows_for_lot(&self, lot: &LotKey) -> DomainResult<Vec<StockHistory>> {
        Ok(self
            .stock_rows
            .iter()
            .filter(|r| r.lot_key() == *lot)
            .cloned()
            .collect())
    }
}

impl EventLog for LedgerState {
    fn event_record(&self, event_id: EventId) -> DomainResult<Option<EventRecord>> {
        Ok(self.event_pos.get(&event_id).map(|&pos| self.events[pos].clone()))
    }

    fn save_event_record(&mut self, record: EventRecord) -> DomainResult<()> {
        match self.event_pos.get(&record.event_id) {
            Some(&pos) => self.events[pos] = record,
            None => {
                self.event_pos.insert(record.event_id, self.events.len());
                self.events.push(record);
            }
        }
        Ok(())
    }
}

impl LedgerTx for LedgerState {
    fn stock_ledger(&mut self) -> &mut dyn StockLedger {
        self
    }

    fn journal_ledger(&self) -> &dyn JournalLedger {
        self
    }
}

/// In-memory transactional ledger store.
///
/// Intended for tests, replay and dev. Each transaction holds the write lock
/// and runs against a working copy of the committed state; the copy replaces
/// the committed state only when the transaction returns `Ok`.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    state: RwLock<LedgerState>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> DomainError {
        DomainError::persistence("ledger store lock poisoned")
    }

    /// Every journal in insertion order.
    pub fn journals(&self) -> DomainResult<Vec<AccountJournal>> {
        let state = self.state.read().map_err(|_| Self::poisoned())?;
        Ok(state.journals.clone())
    }

    /// Every stock row in insertion order.
    pub fn stock_rows(&self) -> DomainResult<Vec<StockHistory>> {
        let state = self.state.read().map_err(|_| Self::poisoned())?;
        Ok(state.stock_rows.clone())
    }

    /// Every event record in first-seen order.
    pub fn event_records(&self) -> DomainResult<Vec<EventRecord>> {
        let state = self.state.read().map_err(|_| Self::poisoned())?;
        Ok(state.events.clone())
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn LedgerTx) -> Result<T, E>,
        E: From<DomainError>,
    {
        let mut committed = self.state.write().map_err(|_| E::from(Self::poisoned()))?;
        let mut working = committed.clone();
        let out = f(&mut working)?;
        *committed = working;
        Ok(out)
    }

    fn read<T, F>(&self, f: F) -> DomainResult<T>
    where
        F: FnOnce(&dyn LedgerTx) -> DomainResult<T>,
    {
        let state = self.state.read().map_err(|_| Self::poisoned())?;
        f(&*state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use ledgerpost_accounting::{JournalDraft, JournalHeader};
    use ledgerpost_core::{
        AccountId, BranchId, CurrencyId, CurrencyTranslation, DocumentId, DocumentKind, ProductId,
        Side,
    };
    use ledgerpost_inventory::{ProductType, StockReference, StockRowDraft};
    use rust_decimal_macros::dec;

    fn journal(reference: DocumentRef) -> AccountJournal {
        let mut draft = JournalDraft::new(
            JournalHeader {
                business_id: BusinessId::new(),
                reference,
                branch_id: BranchId::new(),
                date: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
                description: None,
            },
            CurrencyTranslation::base_only(CurrencyId::new()),
        );
        draft.post(AccountId::new(), Side::Debit, dec!(5)).unwrap();
        draft.post(AccountId::new(), Side::Credit, dec!(5)).unwrap();
        draft.finish(JournalId::new(), Utc::now()).unwrap()
    }

    fn stock_row(reference: DocumentRef) -> StockHistory {
        StockHistory::new(
            StockRowId::new(),
            StockRowDraft {
                business_id: BusinessId::new(),
                warehouse_id: None,
                product_id: ProductId::new(),
                product_type: ProductType::Goods,
                batch: None,
                stock_date: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
                quantity: dec!(2),
                unit_value: dec!(3),
                description: "Bill B-1".to_string(),
                reference: StockReference {
                    kind: reference.kind,
                    document_id: reference.document_id,
                    detail_id: None,
                },
            },
            Utc::now(),
        )
    }

    fn reference() -> DocumentRef {
        DocumentRef::new(DocumentKind::Bill, DocumentId::new())
    }

    #[test]
    fn failed_transaction_leaves_no_trace() {
        let store = InMemoryLedgerStore::new();
        let reference = reference();
        let result: DomainResult<()> = store.transaction(|tx| {
            tx.insert_journal(journal(reference))?;
            tx.insert_stock_row(stock_row(reference))?;
            Err(DomainError::lookup("boom"))
        });
        assert!(result.is_err());
        assert!(store.journals().unwrap().is_empty());
        assert!(store.stock_rows().unwrap().is_empty());
        let active = store.read(|tx| tx.active_journal(reference)).unwrap();
        assert!(active.is_none());
    }

    #[test]
    fn reversal_journal_retires_the_active_entry() {
        let store = InMemoryLedgerStore::new();
        let reference = reference();
        let original = journal(reference);
        let reversal = original.reversal(JournalId::new(), Utc::now());

        store
            .transaction(|tx| -> DomainResult<()> {
                tx.insert_journal(original.clone())?;
                tx.insert_journal(reversal.clone())
            })
            .unwrap();

        assert!(store.read(|tx| tx.active_journal(reference)).unwrap().is_none());
        assert_eq!(store.journals().unwrap().len(), 2);

        let again = original.reversal(JournalId::new(), Utc::now());
        let err = store
            .transaction(|tx| tx.insert_journal(again.clone()))
            .unwrap_err();
        assert!(err.is_benign());
    }

    #[test]
    fn second_active_journal_is_rejected() {
        let store = InMemoryLedgerStore::new();
        let reference = reference();
        store.transaction(|tx| tx.insert_journal(journal(reference))).unwrap();
        let err = store
            .transaction(|tx| tx.insert_journal(journal(reference)))
            .unwrap_err();
        assert!(matches!(err, DomainError::Persistence(_)));
    }

    #[test]
    fn marking_a_row_reversed_twice_is_benign() {
        let store = InMemoryLedgerStore::new();
        let reference = reference();
        let row = stock_row(reference);
        let mark = ReversalMark {
            reversed_by_id: StockRowId::new(),
            reason: "edit".to_string(),
            reversed_at: Utc::now(),
        };

        store.transaction(|tx| tx.insert_stock_row(row.clone())).unwrap();
        assert_eq!(store.read(|tx| tx.active_stock_rows(reference)).unwrap().len(), 1);

        store
            .transaction(|tx| tx.mark_stock_row_reversed(row.id, mark.clone()))
            .unwrap();
        assert!(store.read(|tx| tx.active_stock_rows(reference)).unwrap().is_empty());

        let err = store
            .transaction(|tx| tx.mark_stock_row_reversed(row.id, mark.clone()))
            .unwrap_err();
        assert!(matches!(err, DomainError::AlreadyReversed(_)));
    }
}
