use ledgerpost_core::{DocumentRef, DomainResult, StockRowId};

use crate::stock::{LotKey, ReversalMark, StockHistory, StockValuation};

/// Append-only stock-ledger port, scoped to one open transaction.
///
/// Implementations must never delete a row or change its quantity, unit value
/// or description. The only permitted updates are the reversal mark (set once)
/// and the valuation fields.
pub trait StockLedger {
    /// Append a row. Non-reversal rows join the active set of their document.
    fn insert_stock_row(&mut self, row: StockHistory) -> DomainResult<()>;

    fn stock_row(&self, id: StockRowId) -> DomainResult<Option<StockHistory>>;

    /// Set the reversal mark on an original row and drop it from the active set.
    ///
    /// Returns `DomainError::AlreadyReversed` if the row already carries a mark.
    fn mark_stock_row_reversed(&mut self, id: StockRowId, mark: ReversalMark) -> DomainResult<()>;

    fn record_valuation(&mut self, id: StockRowId, valuation: StockValuation) -> DomainResult<()>;

    /// Current effective rows of a document, in posting order.
    fn active_stock_rows(&self, reference: DocumentRef) -> DomainResult<Vec<StockHistory>>;

    /// Every row of a lot (including reversals), in posting order.
    fn stock_rows_for_lot(&self, lot: &LotKey) -> DomainResult<Vec<StockHistory>>;
}
