//! Sequencing stock movements into the valuation engine.

use tracing::debug;

use ledgerpost_core::{AccountId, DomainError, DomainResult};

use crate::ledger::StockLedger;
use crate::stock::{StockDirection, StockHistory};
use crate::valuation::ValuationEngine;

/// Outcome of routing one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutedBatch {
    /// Valued rows: incoming first, then outgoing, each in input order.
    pub rows: Vec<StockHistory>,
    /// Known accounts followed by accounts the valuation step added.
    pub touched_accounts: Vec<AccountId>,
    /// Only the accounts the valuation step added.
    pub valuation_accounts: Vec<AccountId>,
}

/// Splits a batch by direction and values incoming rows strictly before
/// outgoing ones, so withdrawals are costed against lots recorded in the same
/// batch regardless of arrival order.
pub struct StockRouter<'v> {
    valuation: &'v dyn ValuationEngine,
}

impl<'v> StockRouter<'v> {
    pub fn new(valuation: &'v dyn ValuationEngine) -> Self {
        Self { valuation }
    }

    pub fn route(
        &self,
        ledger: &mut dyn StockLedger,
        rows: Vec<StockHistory>,
        known_accounts: &[AccountId],
    ) -> DomainResult<RoutedBatch> {
        let mut touched: Vec<AccountId> = Vec::with_capacity(known_accounts.len());
        merge_accounts(&mut touched, known_accounts.iter().copied());

        if rows.is_empty() {
            return Ok(RoutedBatch {
                rows,
                touched_accounts: touched,
                valuation_accounts: Vec::new(),
            });
        }

        let (mut incoming, mut outgoing): (Vec<_>, Vec<_>) = rows
            .into_iter()
            .partition(|r| r.direction == StockDirection::Incoming);

        debug!(
            incoming = incoming.len(),
            outgoing = outgoing.len(),
            "routing stock batch"
        );

        let mut added = Vec::new();
        if !incoming.is_empty() {
            let accounts = self.valuation.process_incoming(ledger, &mut incoming)?;
            persist_valuations(ledger, &incoming)?;
            added.extend(accounts);
        }
        if !outgoing.is_empty() {
            let accounts = self.valuation.process_outgoing(ledger, &mut outgoing)?;
            persist_valuations(ledger, &outgoing)?;
            added.extend(accounts);
        }

        let mut valuation_accounts = Vec::new();
        for account in added {
            if !touched.contains(&account) {
                touched.push(account);
                valuation_accounts.push(account);
            }
        }

        incoming.append(&mut outgoing);
        Ok(RoutedBatch {
            rows: incoming,
            touched_accounts: touched,
            valuation_accounts,
        })
    }
}

/// Append accounts not already present, keeping first-seen order.
pub fn merge_accounts(into: &mut Vec<AccountId>, accounts: impl IntoIterator<Item = AccountId>) {
    for account in accounts {
        if !into.contains(&account) {
            into.push(account);
        }
    }
}

fn persist_valuations(ledger: &mut dyn StockLedger, rows: &[StockHistory]) -> DomainResult<()> {
    for row in rows {
        let valuation = row.valuation.clone().ok_or_else(|| {
            DomainError::persistence(format!("valuation engine left stock row {} unvalued", row.id))
        })?;
        ledger.record_valuation(row.id, valuation)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stock::{
        LotKey, ProductType, ReversalMark, StockReference, StockRowDraft, StockValuation,
    };
    use chrono::{NaiveDate, Utc};
    use ledgerpost_core::{BusinessId, DocumentId, DocumentKind, DocumentRef, ProductId, StockRowId};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::cell::RefCell;

    #[derive(Default)]
    struct VecLedger {
        rows: Vec<StockHistory>,
    }

    impl StockLedger for VecLedger {
        fn insert_stock_row(&mut self, row: StockHistory) -> DomainResult<()> {
            self.rows.push(row);
            Ok(())
        }

        fn stock_row(&self, id: StockRowId) -> DomainResult<Option<StockHistory>> {
            Ok(self.rows.iter().find(|r| r.id == id).cloned())
        }

        fn mark_stock_row_reversed(
            &mut self,
            id: StockRowId,
            mark: ReversalMark,
        ) -> DomainResult<()> {
            let row = self.rows.iter_mut().find(|r| r.id == id).unwrap();
            row.apply_reversal_mark(mark);
            Ok(())
        }

        fn record_valuation(
            &mut self,
            id: StockRowId,
            valuation: StockValuation,
        ) -> DomainResult<()> {
            let row = self.rows.iter_mut().find(|r| r.id == id).unwrap();
            row.valuation = Some(valuation);
            Ok(())
        }

        fn active_stock_rows(&self, reference: DocumentRef) -> DomainResult<Vec<StockHistory>> {
            Ok(self
                .rows
                .iter()
                .filter(|r| r.reference.document() == reference && r.is_active())
                .cloned()
                .collect())
        }

        fn stock_rows_for_lot(&self, lot: &LotKey) -> DomainResult<Vec<StockHistory>> {
            Ok(self.rows.iter().filter(|r| r.lot_key() == *lot).cloned().collect())
        }
    }

    /// Running-quantity engine that costs withdrawals at the last valued
    /// incoming unit value and records which call saw which row.
    #[derive(Default)]
    struct RecordingValuation {
        calls: RefCell<Vec<(StockDirection, Vec<StockRowId>)>>,
        cogs: Option<AccountId>,
    }

    impl RecordingValuation {
        fn value(
            &self,
            ledger: &mut dyn StockLedger,
            rows: &mut [StockHistory],
            direction: StockDirection,
        ) -> DomainResult<Vec<AccountId>> {
            self.calls
                .borrow_mut()
                .push((direction, rows.iter().map(|r| r.id).collect()));
            for row in rows.iter_mut() {
                let history = ledger.stock_rows_for_lot(&row.lot_key())?;
                let last = history
                    .iter()
                    .filter_map(|r| r.valuation.clone())
                    .max_by_key(|v| v.cumulative_sequence)
                    .unwrap_or_default();
                let unit = if direction == StockDirection::Outgoing
                    && last.closing_quantity > Decimal::ZERO
                {
                    last.closing_asset_value / last.closing_quantity
                } else {
                    row.unit_value
                };
                row.valuation = Some(StockValuation {
                    closing_quantity: last.closing_quantity + row.quantity,
                    closing_asset_value: last.closing_asset_value + row.quantity * unit,
                    value_change: row.quantity * unit,
                    cumulative_incoming_quantity: last.cumulative_incoming_quantity
                        + row.quantity.max(Decimal::ZERO),
                    cumulative_outgoing_quantity: last.cumulative_outgoing_quantity
                        + (-row.quantity).max(Decimal::ZERO),
                    cumulative_sequence: last.cumulative_sequence + 1,
                });
            }
            Ok(self.cogs.into_iter().collect())
        }
    }

    impl ValuationEngine for RecordingValuation {
        fn process_incoming(
            &self,
            ledger: &mut dyn StockLedger,
            rows: &mut [StockHistory],
        ) -> DomainResult<Vec<AccountId>> {
            self.value(ledger, rows, StockDirection::Incoming)
        }

        fn process_outgoing(
            &self,
            ledger: &mut dyn StockLedger,
            rows: &mut [StockHistory],
        ) -> DomainResult<Vec<AccountId>> {
            self.value(ledger, rows, StockDirection::Outgoing)
        }
    }

    fn row(
        business_id: BusinessId,
        product_id: ProductId,
        quantity: Decimal,
        unit: Decimal,
    ) -> StockHistory {
        StockHistory::new(
            StockRowId::new(),
            StockRowDraft {
                business_id,
                warehouse_id: None,
                product_id,
                product_type: ProductType::Goods,
                batch: None,
                stock_date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
                quantity,
                unit_value: unit,
                description: "test".to_string(),
                reference: StockReference {
                    kind: DocumentKind::InventoryAdjustment,
                    document_id: DocumentId::new(),
                    detail_id: None,
                },
            },
            Utc::now(),
        )
    }

    #[test]
    fn incoming_is_valued_before_outgoing_even_when_listed_later() {
        let business = BusinessId::new();
        let product = ProductId::new();
        let withdraw = row(business, product, dec!(-4), dec!(0));
        let receive = row(business, product, dec!(10), dec!(3));

        let mut ledger = VecLedger::default();
        ledger.insert_stock_row(withdraw.clone()).unwrap();
        ledger.insert_stock_row(receive.clone()).unwrap();

        let engine = RecordingValuation::default();
        let router = StockRouter::new(&engine);
        let batch = router
            .route(&mut ledger, vec![withdraw.clone(), receive.clone()], &[])
            .unwrap();

        let calls = engine.calls.borrow();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], (StockDirection::Incoming, vec![receive.id]));
        assert_eq!(calls[1], (StockDirection::Outgoing, vec![withdraw.id]));

        // The withdrawal was costed against the lot received in the same batch.
        let valued = ledger.stock_row(withdraw.id).unwrap().unwrap().valuation.unwrap();
        assert_eq!(valued.closing_quantity, dec!(6));
        assert_eq!(valued.closing_asset_value, dec!(18));
        assert_eq!(batch.rows[0].id, receive.id);
    }

    #[test]
    fn relative_order_within_direction_is_kept() {
        let business = BusinessId::new();
        let a = row(business, ProductId::new(), dec!(1), dec!(1));
        let b = row(business, ProductId::new(), dec!(-1), dec!(1));
        let c = row(business, ProductId::new(), dec!(2), dec!(1));
        let mut ledger = VecLedger::default();
        for r in [&a, &b, &c] {
            ledger.insert_stock_row(r.clone()).unwrap();
        }

        let engine = RecordingValuation::default();
        let batch = StockRouter::new(&engine)
            .route(&mut ledger, vec![a.clone(), b.clone(), c.clone()], &[])
            .unwrap();
        let ids: Vec<_> = batch.rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![a.id, c.id, b.id]);
    }

    #[test]
    fn valuation_accounts_are_deduplicated_against_known_set() {
        let business = BusinessId::new();
        let known = AccountId::new();
        let cogs = AccountId::new();
        let r = row(business, ProductId::new(), dec!(-1), dec!(2));
        let s = row(business, ProductId::new(), dec!(1), dec!(2));
        let mut ledger = VecLedger::default();
        ledger.insert_stock_row(r.clone()).unwrap();
        ledger.insert_stock_row(s.clone()).unwrap();

        let engine = RecordingValuation {
            cogs: Some(cogs),
            ..RecordingValuation::default()
        };
        let batch = StockRouter::new(&engine)
            .route(&mut ledger, vec![r, s], &[known, cogs])
            .unwrap();
        assert_eq!(batch.touched_accounts, vec![known, cogs]);
        assert!(batch.valuation_accounts.is_empty());
    }

    #[test]
    fn empty_batch_skips_valuation() {
        let engine = RecordingValuation::default();
        let known = AccountId::new();
        let batch = StockRouter::new(&engine)
            .route(&mut VecLedger::default(), Vec::new(), &[known, known])
            .unwrap();
        assert!(engine.calls.borrow().is_empty());
        assert_eq!(batch.touched_accounts, vec![known]);
    }
}
