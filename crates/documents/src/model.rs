use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ledgerpost_core::{
    AccountId, BranchId, CurrencyId, DetailId, DocumentId, DocumentKind, DocumentRef, ProductId,
    WarehouseId,
};
use ledgerpost_inventory::ProductType;

/// Header fields shared by every document kind.
///
/// `control_total` is the payable (bills, supplier credits), receivable
/// (credit notes) or stock value (adjustments) the document settles against.
/// All amounts are stated in the document currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentHeader {
    pub id: DocumentId,
    pub number: String,
    pub date: NaiveDate,
    pub branch_id: BranchId,
    /// `None` means the business base currency.
    pub currency_id: Option<CurrencyId>,
    pub exchange_rate: Decimal,
    pub discount_total: Decimal,
    pub tax_total: Decimal,
    pub control_total: Decimal,
    pub adjustment: Decimal,
    pub tax_inclusive: bool,
    pub warehouse_id: Option<WarehouseId>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineProduct {
    pub product_id: ProductId,
    pub product_type: ProductType,
}

/// One detail line of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailLine {
    pub id: DetailId,
    pub account_id: Option<AccountId>,
    pub product: Option<LineProduct>,
    pub warehouse_id: Option<WarehouseId>,
    pub batch: Option<String>,
    pub quantity: Decimal,
    pub unit_rate: Decimal,
    pub total: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
}

impl DetailLine {
    /// Value posted to the line's account: total plus line discount, minus
    /// line tax when prices include tax.
    pub fn net_value(&self, tax_inclusive: bool) -> Decimal {
        let gross = self.total + self.discount;
        if tax_inclusive { gross - self.tax } else { gross }
    }
}

/// Decoded snapshot of one document version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub kind: DocumentKind,
    pub header: DocumentHeader,
    pub lines: Vec<DetailLine>,
}

impl SourceDocument {
    pub fn reference(&self) -> DocumentRef {
        DocumentRef::new(self.kind, self.header.id)
    }

    /// Text used on journals and stock rows, e.g. "Bill BILL-001".
    pub fn description(&self) -> String {
        format!("{} {}", self.kind.label(), self.header.number)
    }
}
