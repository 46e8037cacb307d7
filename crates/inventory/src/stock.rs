use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ledgerpost_core::{
    BusinessId, DetailId, DocumentId, DocumentKind, DocumentRef, ProductId, StockRowId,
    WarehouseId,
};

/// Product classification from the product master.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    Goods,
    Service,
    Digital,
}

/// Direction of a stock movement, derived from the quantity sign.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockDirection {
    Incoming,
    Outgoing,
}

impl StockDirection {
    /// Zero quantities count as incoming.
    pub fn of_quantity(quantity: Decimal) -> Self {
        if quantity.is_sign_negative() && !quantity.is_zero() {
            StockDirection::Outgoing
        } else {
            StockDirection::Incoming
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            StockDirection::Incoming => StockDirection::Outgoing,
            StockDirection::Outgoing => StockDirection::Incoming,
        }
    }
}

/// Document line a stock row came from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StockReference {
    pub kind: DocumentKind,
    pub document_id: DocumentId,
    pub detail_id: Option<DetailId>,
}

impl StockReference {
    pub fn document(&self) -> DocumentRef {
        DocumentRef::new(self.kind, self.document_id)
    }
}

/// Identity that valuation runs over: one product in one warehouse.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LotKey {
    pub business_id: BusinessId,
    pub product_id: ProductId,
    pub warehouse_id: Option<WarehouseId>,
}

/// Derived fields written only by the valuation engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockValuation {
    pub closing_quantity: Decimal,
    pub closing_asset_value: Decimal,
    pub cumulative_incoming_quantity: Decimal,
    pub cumulative_outgoing_quantity: Decimal,
    pub cumulative_sequence: u64,
    /// Asset value this row added to the lot; negative for withdrawals.
    #[serde(default)]
    pub value_change: Decimal,
}

/// Metadata set on an original row when it is reversed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReversalMark {
    pub reversed_by_id: StockRowId,
    pub reason: String,
    pub reversed_at: DateTime<Utc>,
}

/// Caller-editable fields of a stock row.
///
/// Used to build fresh rows and as the mutation target when replacing one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockRowDraft {
    pub business_id: BusinessId,
    pub warehouse_id: Option<WarehouseId>,
    pub product_id: ProductId,
    pub product_type: ProductType,
    pub batch: Option<String>,
    pub stock_date: NaiveDate,
    pub quantity: Decimal,
    pub unit_value: Decimal,
    pub description: String,
    pub reference: StockReference,
}

/// One stock-ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockHistory {
    pub id: StockRowId,
    pub business_id: BusinessId,
    pub warehouse_id: Option<WarehouseId>,
    pub product_id: ProductId,
    pub product_type: ProductType,
    pub batch: Option<String>,
    pub stock_date: NaiveDate,
    /// Signed: positive adds stock, negative withdraws it.
    pub quantity: Decimal,
    /// Base-currency value per unit.
    pub unit_value: Decimal,
    pub description: String,
    pub reference: StockReference,
    pub direction: StockDirection,

    pub is_reversal: bool,
    pub reverses_id: Option<StockRowId>,
    pub reversed_by_id: Option<StockRowId>,
    pub reversal_reason: Option<String>,
    pub reversed_at: Option<DateTime<Utc>>,

    pub valuation: Option<StockValuation>,
    pub created_at: DateTime<Utc>,
}

pub const REVERSAL_PREFIX: &str = "Reversal of: ";

impl StockHistory {
    /// Fresh, non-reversal row.
    pub fn new(id: StockRowId, draft: StockRowDraft, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            business_id: draft.business_id,
            warehouse_id: draft.warehouse_id,
            product_id: draft.product_id,
            product_type: draft.product_type,
            batch: draft.batch,
            stock_date: draft.stock_date,
            quantity: draft.quantity,
            unit_value: draft.unit_value,
            description: draft.description,
            reference: draft.reference,
            direction: StockDirection::of_quantity(draft.quantity),
            is_reversal: false,
            reverses_id: None,
            reversed_by_id: None,
            reversal_reason: None,
            reversed_at: None,
            valuation: None,
            created_at,
        }
    }

    /// Editable copy with identity, derived, reversal and audit fields dropped.
    pub fn to_draft(&self) -> StockRowDraft {
        StockRowDraft {
            business_id: self.business_id,
            warehouse_id: self.warehouse_id,
            product_id: self.product_id,
            product_type: self.product_type,
            batch: self.batch.clone(),
            stock_date: self.stock_date,
            quantity: self.quantity,
            unit_value: self.unit_value,
            description: self.description.clone(),
            reference: self.reference,
        }
    }

    /// Row negating this one. Only the new row is built; marking the
    /// original is the ledger's job.
    pub fn reversal(&self, id: StockRowId, reason: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            quantity: -self.quantity,
            direction: self.direction.flipped(),
            description: format!("{REVERSAL_PREFIX}{}", self.description),
            is_reversal: true,
            reverses_id: Some(self.id),
            reversed_by_id: None,
            reversal_reason: Some(reason.to_string()),
            reversed_at: None,
            valuation: None,
            created_at,
            ..self.clone()
        }
    }

    pub fn is_reversed(&self) -> bool {
        self.reversed_by_id.is_some()
    }

    /// Active rows are originals that have not been reversed.
    pub fn is_active(&self) -> bool {
        !self.is_reversal && !self.is_reversed()
    }

    pub fn lot_key(&self) -> LotKey {
        LotKey {
            business_id: self.business_id,
            product_id: self.product_id,
            warehouse_id: self.warehouse_id,
        }
    }

    /// Signed base value of the movement.
    pub fn value(&self) -> Decimal {
        self.quantity * self.unit_value
    }

    pub fn apply_reversal_mark(&mut self, mark: ReversalMark) {
        self.reversed_by_id = Some(mark.reversed_by_id);
        self.reversal_reason = Some(mark.reason);
        self.reversed_at = Some(mark.reversed_at);
    }
}

impl StockRowDraft {
    /// True when the fields that matter to the ledger match the given row.
    pub fn same_movement_as(&self, row: &StockHistory) -> bool {
        self.quantity == row.quantity
            && self.unit_value == row.unit_value
            && self.description == row.description
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn draft(quantity: Decimal) -> StockRowDraft {
        StockRowDraft {
            business_id: BusinessId::new(),
            warehouse_id: Some(WarehouseId::new()),
            product_id: ProductId::new(),
            product_type: ProductType::Goods,
            batch: Some("LOT-7".to_string()),
            stock_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            quantity,
            unit_value: dec!(4.25),
            description: "Bill BILL-001".to_string(),
            reference: StockReference {
                kind: DocumentKind::Bill,
                document_id: DocumentId::new(),
                detail_id: Some(DetailId::new()),
            },
        }
    }

    #[test]
    fn direction_follows_quantity_sign() {
        let inc = StockHistory::new(StockRowId::new(), draft(dec!(3)), Utc::now());
        let out = StockHistory::new(StockRowId::new(), draft(dec!(-3)), Utc::now());
        assert_eq!(inc.direction, StockDirection::Incoming);
        assert_eq!(out.direction, StockDirection::Outgoing);
        assert_eq!(StockDirection::of_quantity(Decimal::ZERO), StockDirection::Incoming);
    }

    #[test]
    fn reversal_negates_and_points_back() {
        let original = StockHistory::new(StockRowId::new(), draft(dec!(10)), Utc::now());
        let rev = original.reversal(StockRowId::new(), "document updated", Utc::now());

        assert_eq!(rev.quantity, dec!(-10));
        assert_eq!(rev.direction, StockDirection::Outgoing);
        assert_eq!(rev.reverses_id, Some(original.id));
        assert!(rev.is_reversal);
        assert_eq!(rev.unit_value, original.unit_value);
        assert_eq!(rev.reference, original.reference);
        assert_eq!(rev.description, "Reversal of: Bill BILL-001");
        assert_eq!(rev.reversal_reason.as_deref(), Some("document updated"));
        assert!(!rev.is_active());
        assert!(original.is_active());
    }

    #[test]
    fn draft_drops_derived_fields() {
        let mut row = StockHistory::new(StockRowId::new(), draft(dec!(2)), Utc::now());
        row.valuation = Some(StockValuation {
            closing_quantity: dec!(2),
            ..StockValuation::default()
        });
        let d = row.to_draft();
        assert!(d.same_movement_as(&row));
        let fresh = StockHistory::new(StockRowId::new(), d, Utc::now());
        assert_eq!(fresh.valuation, None);
        assert_eq!(fresh.value(), dec!(8.50));
    }
}
