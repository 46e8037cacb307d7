//! One compiler per document kind.

use std::sync::Arc;

use serde_json::Value as JsonValue;

use ledgerpost_core::{DocumentKind, DomainResult, Side};

use crate::compiler::{CompilePolicy, DocumentCompiler, PlaceholderSides, StockSign};
use crate::model::SourceDocument;
use crate::ports::SystemAccount;
use crate::snapshot::{InventoryAdjustmentSnapshot, TradeDocumentSnapshot, decode};

fn parse_trade(kind: DocumentKind, snapshot: &JsonValue) -> DomainResult<SourceDocument> {
    Ok(decode::<TradeDocumentSnapshot>(kind, snapshot)?.into_document(kind))
}

/// Purchase bill: credits payable, debits expense/asset lines, receives stock.
#[derive(Debug, Default, Clone, Copy)]
pub struct BillCompiler;

impl DocumentCompiler for BillCompiler {
    fn kind(&self) -> DocumentKind {
        DocumentKind::Bill
    }

    fn policy(&self) -> CompilePolicy {
        CompilePolicy {
            control: SystemAccount::AccountsPayable,
            control_side: Side::Credit,
            discount: SystemAccount::PurchaseDiscount,
            stock_sign: StockSign::Receive,
            valuation_placeholders: None,
        }
    }

    fn parse_snapshot(&self, snapshot: &JsonValue) -> DomainResult<SourceDocument> {
        parse_trade(self.kind(), snapshot)
    }
}

/// Customer credit note: credits receivable, debits the returned lines and
/// takes the goods back into stock.
#[derive(Debug, Default, Clone, Copy)]
pub struct CreditNoteCompiler;

impl DocumentCompiler for CreditNoteCompiler {
    fn kind(&self) -> DocumentKind {
        DocumentKind::CreditNote
    }

    fn policy(&self) -> CompilePolicy {
        CompilePolicy {
            control: SystemAccount::AccountsReceivable,
            control_side: Side::Credit,
            discount: SystemAccount::SalesDiscount,
            stock_sign: StockSign::Receive,
            valuation_placeholders: Some(PlaceholderSides {
                inventory: Side::Debit,
                purchase: Side::Credit,
            }),
        }
    }

    fn parse_snapshot(&self, snapshot: &JsonValue) -> DomainResult<SourceDocument> {
        parse_trade(self.kind(), snapshot)
    }
}

/// Supplier credit: debits payable, credits the returned lines and sends the
/// goods back out of stock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SupplierCreditCompiler;

impl DocumentCompiler for SupplierCreditCompiler {
    fn kind(&self) -> DocumentKind {
        DocumentKind::SupplierCredit
    }

    fn policy(&self) -> CompilePolicy {
        CompilePolicy {
            control: SystemAccount::AccountsPayable,
            control_side: Side::Debit,
            discount: SystemAccount::PurchaseDiscount,
            stock_sign: StockSign::Issue,
            valuation_placeholders: Some(PlaceholderSides {
                inventory: Side::Credit,
                purchase: Side::Debit,
            }),
        }
    }

    fn parse_snapshot(&self, snapshot: &JsonValue) -> DomainResult<SourceDocument> {
        parse_trade(self.kind(), snapshot)
    }
}

/// Quantity adjustment: the inventory asset absorbs the signed stock value and
/// each line's offset account takes the other side.
#[derive(Debug, Default, Clone, Copy)]
pub struct InventoryAdjustmentCompiler;

impl DocumentCompiler for InventoryAdjustmentCompiler {
    fn kind(&self) -> DocumentKind {
        DocumentKind::InventoryAdjustment
    }

    fn policy(&self) -> CompilePolicy {
        CompilePolicy {
            control: SystemAccount::InventoryAsset,
            control_side: Side::Debit,
            discount: SystemAccount::PurchaseDiscount,
            stock_sign: StockSign::Receive,
            valuation_placeholders: None,
        }
    }

    fn parse_snapshot(&self, snapshot: &JsonValue) -> DomainResult<SourceDocument> {
        decode::<InventoryAdjustmentSnapshot>(self.kind(), snapshot)?.into_document()
    }
}

/// Compiler for every supported kind, in `DocumentKind::ALL` order.
pub fn default_compilers() -> Vec<Arc<dyn DocumentCompiler>> {
    vec![
        Arc::new(BillCompiler),
        Arc::new(CreditNoteCompiler),
        Arc::new(SupplierCreditCompiler),
        Arc::new(InventoryAdjustmentCompiler),
    ]
}

pub fn compiler_for(kind: DocumentKind) -> Arc<dyn DocumentCompiler> {
    match kind {
        DocumentKind::Bill => Arc::new(BillCompiler),
        DocumentKind::CreditNote => Arc::new(CreditNoteCompiler),
        DocumentKind::SupplierCredit => Arc::new(SupplierCreditCompiler),
        DocumentKind::InventoryAdjustment => Arc::new(InventoryAdjustmentCompiler),
    }
}
