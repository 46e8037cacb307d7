use std::sync::Arc;

use ledgerpost_accounting::JournalLedger;
use ledgerpost_core::{DomainError, DomainResult, EventId};
use ledgerpost_events::EventRecord;
use ledgerpost_inventory::StockLedger;

/// Event records, keyed by event id.
pub trait EventLog {
    fn event_record(&self, event_id: EventId) -> DomainResult<Option<EventRecord>>;

    /// Insert or replace the record for `record.event_id`.
    fn save_event_record(&mut self, record: EventRecord) -> DomainResult<()>;
}

/// Everything one event may read or write, scoped to an open transaction.
pub trait LedgerTx: JournalLedger + StockLedger + EventLog {
    /// The stock-ledger view handed to the router and valuation engine.
    fn stock_ledger(&mut self) -> &mut dyn StockLedger;

    /// The journal view handed to balance recomputation.
    fn journal_ledger(&self) -> &dyn JournalLedger;
}

/// Transactional ledger store.
///
/// ## Transaction semantics
///
/// `transaction` runs `f` against a transaction and commits only when `f`
/// returns `Ok`. On `Err` every write made through the transaction is
/// discarded. Implementations decide isolation; callers assume that
/// conflicting transactions are serialized.
///
/// `read` gives a consistent view of committed state and never writes.
pub trait LedgerStore: Send + Sync {
    fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn LedgerTx) -> Result<T, E>,
        E: From<DomainError>;

    fn read<T, F>(&self, f: F) -> DomainResult<T>
    where
        F: FnOnce(&dyn LedgerTx) -> DomainResult<T>;
}

impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn LedgerTx) -> Result<T, E>,
        E: From<DomainError>,
    {
        (**self).transaction(f)
    }

    fn read<T, F>(&self, f: F) -> DomainResult<T>
    where
        F: FnOnce(&dyn LedgerTx) -> DomainResult<T>,
    {
        (**self).read(f)
    }
}
