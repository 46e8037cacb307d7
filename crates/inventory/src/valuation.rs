use ledgerpost_core::{AccountId, DomainResult};

use crate::ledger::StockLedger;
use crate::stock::StockHistory;

/// Contract of the external valuation engine (FIFO, moving average, ...).
///
/// Each call receives rows of a single direction in the order they must be
/// valued. The engine fills `StockHistory::valuation` on every row it handles
/// and returns the accounts whose balances its costing affected (e.g. cost of
/// goods sold, inventory variance). It may read earlier rows of the same lot
/// through the ledger; persisting the valuation fields is the router's job.
pub trait ValuationEngine {
    fn process_incoming(
        &self,
        ledger: &mut dyn StockLedger,
        rows: &mut [StockHistory],
    ) -> DomainResult<Vec<AccountId>>;

    fn process_outgoing(
        &self,
        ledger: &mut dyn StockLedger,
        rows: &mut [StockHistory],
    ) -> DomainResult<Vec<AccountId>>;
}

impl<V> ValuationEngine for std::sync::Arc<V>
where
    V: ValuationEngine + ?Sized,
{
    fn process_incoming(
        &self,
        ledger: &mut dyn StockLedger,
        rows: &mut [StockHistory],
    ) -> DomainResult<Vec<AccountId>> {
        (**self).process_incoming(ledger, rows)
    }

    fn process_outgoing(
        &self,
        ledger: &mut dyn StockLedger,
        rows: &mut [StockHistory],
    ) -> DomainResult<Vec<AccountId>> {
        (**self).process_outgoing(ledger, rows)
    }
}
