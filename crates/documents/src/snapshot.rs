//! JSON snapshot shapes delivered by the change-notification source.
//!
//! Bills, credit notes and supplier credits share one trade-document shape
//! whose id/number/total fields accept each kind's own names. Inventory
//! adjustments carry quantities and unit costs only; their totals are derived.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use ledgerpost_core::{
    AccountId, BranchId, CurrencyId, DetailId, DocumentId, DocumentKind, DomainError,
    DomainResult, ProductId, WarehouseId,
};
use ledgerpost_inventory::ProductType;

use crate::model::{DetailLine, DocumentHeader, LineProduct, SourceDocument};

fn one() -> Decimal {
    Decimal::ONE
}

fn goods() -> ProductType {
    ProductType::Goods
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradeLineSnapshot {
    pub detail_id: DetailId,
    #[serde(default)]
    pub account_id: Option<AccountId>,
    #[serde(default)]
    pub product_id: Option<ProductId>,
    #[serde(default = "goods")]
    pub product_type: ProductType,
    #[serde(default)]
    pub warehouse_id: Option<WarehouseId>,
    #[serde(default)]
    pub batch: Option<String>,
    #[serde(default)]
    pub quantity: Decimal,
    #[serde(default)]
    pub rate: Decimal,
    pub total: Decimal,
    #[serde(default)]
    pub discount: Decimal,
    #[serde(default)]
    pub tax: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradeDocumentSnapshot {
    #[serde(alias = "bill_id", alias = "credit_note_id", alias = "supplier_credit_id")]
    pub id: DocumentId,
    #[serde(alias = "bill_number", alias = "credit_note_number", alias = "supplier_credit_number")]
    pub number: String,
    #[serde(alias = "bill_date", alias = "credit_note_date")]
    pub date: NaiveDate,
    pub branch_id: BranchId,
    #[serde(default)]
    pub currency_id: Option<CurrencyId>,
    #[serde(default = "one")]
    pub exchange_rate: Decimal,
    #[serde(default)]
    pub discount_total: Decimal,
    #[serde(default)]
    pub tax_total: Decimal,
    #[serde(alias = "payable_total", alias = "receivable_total")]
    pub total: Decimal,
    #[serde(default)]
    pub adjustment: Decimal,
    #[serde(default)]
    pub is_tax_inclusive: bool,
    #[serde(default)]
    pub warehouse_id: Option<WarehouseId>,
    #[serde(default)]
    pub lines: Vec<TradeLineSnapshot>,
}

impl TradeDocumentSnapshot {
    pub fn into_document(self, kind: DocumentKind) -> SourceDocument {
        let lines = self
            .lines
            .into_iter()
            .map(|l| DetailLine {
                id: l.detail_id,
                account_id: l.account_id,
                product: l.product_id.map(|product_id| LineProduct {
                    product_id,
                    product_type: l.product_type,
                }),
                warehouse_id: l.warehouse_id,
                batch: l.batch,
                quantity: l.quantity,
                unit_rate: l.rate,
                total: l.total,
                discount: l.discount,
                tax: l.tax,
            })
            .collect();

        SourceDocument {
            kind,
            header: DocumentHeader {
                id: self.id,
                number: self.number,
                date: self.date,
                branch_id: self.branch_id,
                currency_id: self.currency_id,
                exchange_rate: self.exchange_rate,
                discount_total: self.discount_total,
                tax_total: self.tax_total,
                control_total: self.total,
                adjustment: self.adjustment,
                tax_inclusive: self.is_tax_inclusive,
                warehouse_id: self.warehouse_id,
            },
            lines,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdjustmentLineSnapshot {
    pub detail_id: DetailId,
    #[serde(default)]
    pub account_id: Option<AccountId>,
    pub product_id: ProductId,
    #[serde(default = "goods")]
    pub product_type: ProductType,
    #[serde(default)]
    pub warehouse_id: Option<WarehouseId>,
    #[serde(default)]
    pub batch: Option<String>,
    /// Signed: positive adds stock, negative writes it off.
    pub quantity_adjusted: Decimal,
    pub unit_cost: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InventoryAdjustmentSnapshot {
    #[serde(alias = "adjustment_id")]
    pub id: DocumentId,
    #[serde(alias = "reference_number")]
    pub number: String,
    pub date: NaiveDate,
    pub branch_id: BranchId,
    #[serde(default)]
    pub warehouse_id: Option<WarehouseId>,
    /// Offset account for lines that do not name their own.
    #[serde(default)]
    pub account_id: Option<AccountId>,
    #[serde(default)]
    pub lines: Vec<AdjustmentLineSnapshot>,
}

impl InventoryAdjustmentSnapshot {
    /// Fails with `Validation` when a line value or the total overflows.
    pub fn into_document(self) -> DomainResult<SourceDocument> {
        let default_account = self.account_id;
        let mut lines: Vec<DetailLine> = Vec::with_capacity(self.lines.len());
        let mut control_total = Decimal::ZERO;
        for l in self.lines {
            let total = l
                .quantity_adjusted
                .checked_mul(l.unit_cost)
                .ok_or_else(|| overflow(&self.number, l.detail_id))?;
            control_total = control_total
                .checked_add(total)
                .ok_or_else(|| overflow(&self.number, l.detail_id))?;
            lines.push(DetailLine {
                id: l.detail_id,
                account_id: l.account_id.or(default_account),
                product: Some(LineProduct {
                    product_id: l.product_id,
                    product_type: l.product_type,
                }),
                warehouse_id: l.warehouse_id,
                batch: l.batch,
                quantity: l.quantity_adjusted,
                unit_rate: l.unit_cost,
                total,
                discount: Decimal::ZERO,
                tax: Decimal::ZERO,
            });
        }

        Ok(SourceDocument {
            kind: DocumentKind::InventoryAdjustment,
            header: DocumentHeader {
                id: self.id,
                number: self.number,
                date: self.date,
                branch_id: self.branch_id,
                currency_id: None,
                exchange_rate: Decimal::ONE,
                discount_total: Decimal::ZERO,
                tax_total: Decimal::ZERO,
                control_total,
                adjustment: Decimal::ZERO,
                tax_inclusive: false,
                warehouse_id: self.warehouse_id,
            },
            lines,
        })
    }
}

fn overflow(number: &str, detail_id: DetailId) -> DomainError {
    DomainError::validation(format!(
        "adjustment {number} line {detail_id} value overflows"
    ))
}

/// Decode a snapshot, tagging failures with the document kind.
pub fn decode<T>(kind: DocumentKind, snapshot: &JsonValue) -> DomainResult<T>
where
    T: for<'de> Deserialize<'de>,
{
    T::deserialize(snapshot)
        .map_err(|e| DomainError::decode(format!("{kind} snapshot: {e}")))
}
