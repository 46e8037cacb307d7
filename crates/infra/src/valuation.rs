//! Reference valuation engine: moving average cost per lot.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;

use ledgerpost_core::{AccountId, DomainResult};
use ledgerpost_documents::ProductCatalog;
use ledgerpost_inventory::{
    LotKey, StockDirection, StockHistory, StockLedger, StockValuation, ValuationEngine,
    merge_accounts,
};

/// Moving-average costing over (business, product, warehouse) lots.
///
/// Incoming rows add `quantity × unit_value`. Outgoing rows are costed at the
/// lot's current average. A reversal row carries back the negated
/// `value_change` of the row it reverses, so returning a withdrawal restores
/// the value it removed at the average of the day. Reports the product's
/// purchase and inventory accounts as touched.
pub struct MovingAverageValuation {
    catalog: Arc<dyn ProductCatalog>,
}

impl MovingAverageValuation {
    pub fn new(catalog: Arc<dyn ProductCatalog>) -> Self {
        Self { catalog }
    }

    fn value(
        &self,
        ledger: &mut dyn StockLedger,
        rows: &mut [StockHistory],
    ) -> DomainResult<Vec<AccountId>> {
        let mut lots: HashMap<LotKey, StockValuation> = HashMap::new();
        let mut touched = Vec::new();

        for row in rows.iter_mut() {
            let key = row.lot_key();
            let last = match lots.get(&key) {
                Some(v) => v.clone(),
                None => latest_valuation(&*ledger, &key)?,
            };
            let carried = match row.reverses_id {
                Some(id) if row.is_reversal => ledger
                    .stock_row(id)?
                    .and_then(|original| original.valuation)
                    .map(|v| -v.value_change),
                _ => None,
            };
            let next = advance(&last, row, carried);
            row.valuation = Some(next.clone());
            lots.insert(key, next);

            if let Some(accounts) = self
                .catalog
                .product_valuation_accounts(row.product_id, row.product_type)?
            {
                merge_accounts(
                    &mut touched,
                    accounts
                        .inventory_account_id
                        .into_iter()
                        .chain(accounts.purchase_account_id),
                );
            }
        }
        Ok(touched)
    }
}

impl ValuationEngine for MovingAverageValuation {
    fn process_incoming(
        &self,
        ledger: &mut dyn StockLedger,
        rows: &mut [StockHistory],
    ) -> DomainResult<Vec<AccountId>> {
        self.value(ledger, rows)
    }

    fn process_outgoing(
        &self,
        ledger: &mut dyn StockLedger,
        rows: &mut [StockHistory],
    ) -> DomainResult<Vec<AccountId>> {
        self.value(ledger, rows)
    }
}

fn latest_valuation(ledger: &dyn StockLedger, key: &LotKey) -> DomainResult<StockValuation> {
    Ok(ledger
        .stock_rows_for_lot(key)?
        .into_iter()
        .filter_map(|r| r.valuation)
        .max_by_key(|v| v.cumulative_sequence)
        .unwrap_or_default())
}

/// `carried` overrides the costing of a reversal row with the value it undoes.
fn advance(
    last: &StockValuation,
    row: &StockHistory,
    carried: Option<Decimal>,
) -> StockValuation {
    let averaged = !row.is_reversal && last.closing_quantity > Decimal::ZERO;
    let change = match (carried, row.direction) {
        (Some(value), _) => value,
        (None, StockDirection::Outgoing) if averaged => {
            row.quantity * (last.closing_asset_value / last.closing_quantity)
        }
        _ => row.quantity * row.unit_value,
    };
    let incoming = row.quantity.max(Decimal::ZERO);
    let outgoing = (-row.quantity).max(Decimal::ZERO);

    StockValuation {
        closing_quantity: last.closing_quantity + row.quantity,
        closing_asset_value: last.closing_asset_value + change,
        cumulative_incoming_quantity: last.cumulative_incoming_quantity + incoming,
        cumulative_outgoing_quantity: last.cumulative_outgoing_quantity + outgoing,
        cumulative_sequence: last.cumulative_sequence + 1,
        value_change: change,
    }
}
