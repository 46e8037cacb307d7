//! Inventory stock ledger (append-only).
//!
//! Stock rows are facts: once posted their quantity and value never change.
//! Corrections are new rows pointing at the row they negate. Valuation (FIFO,
//! moving average, ...) is an external concern reached through
//! [`ValuationEngine`].

pub mod ledger;
pub mod router;
pub mod stock;
pub mod valuation;

pub use ledger::StockLedger;
pub use router::{RoutedBatch, StockRouter, merge_accounts};
pub use stock::{
    LotKey, ProductType, REVERSAL_PREFIX, ReversalMark, StockDirection, StockHistory,
    StockReference, StockRowDraft, StockValuation,
};
pub use valuation::ValuationEngine;
