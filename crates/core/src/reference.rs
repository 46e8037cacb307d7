//! Reference types tagging ledger rows with the document that produced them.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::id::DocumentId;

/// Kind of source document (the event's reference type).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Bill,
    CreditNote,
    SupplierCredit,
    InventoryAdjustment,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 4] = [
        DocumentKind::Bill,
        DocumentKind::CreditNote,
        DocumentKind::SupplierCredit,
        DocumentKind::InventoryAdjustment,
    ];

    /// Stable reference-type name (e.g. "supplier_credit").
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentKind::Bill => "bill",
            DocumentKind::CreditNote => "credit_note",
            DocumentKind::SupplierCredit => "supplier_credit",
            DocumentKind::InventoryAdjustment => "inventory_adjustment",
        }
    }

    /// Human label used in stock-row descriptions.
    pub fn label(self) -> &'static str {
        match self {
            DocumentKind::Bill => "Bill",
            DocumentKind::CreditNote => "Credit Note",
            DocumentKind::SupplierCredit => "Supplier Credit",
            DocumentKind::InventoryAdjustment => "Inventory Adjustment",
        }
    }
}

impl core::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DocumentKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| DomainError::decode(format!("unknown reference type '{s}'")))
    }
}

/// (kind, document id) pair identifying one source document.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentRef {
    pub kind: DocumentKind,
    pub document_id: DocumentId,
}

impl DocumentRef {
    pub fn new(kind: DocumentKind, document_id: DocumentId) -> Self {
        Self { kind, document_id }
    }
}

impl core::fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.kind, self.document_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_type_names_parse_back() {
        for kind in DocumentKind::ALL {
            assert_eq!(kind.as_str().parse::<DocumentKind>().unwrap(), kind);
        }
        assert!("purchase_order".parse::<DocumentKind>().is_err());
    }
}
