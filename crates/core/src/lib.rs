//! `ledgerpost-core`: shared building blocks for the posting engine.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! strongly-typed identifiers, the error taxonomy and decimal money helpers.

pub mod error;
pub mod id;
pub mod money;
pub mod reference;

pub use error::{DomainError, DomainResult};
pub use id::{
    AccountId, BranchId, BusinessId, CurrencyId, DetailId, DocumentId, EventId, JournalId,
    ProductId, StockRowId, WarehouseId,
};
pub use money::{CurrencyTranslation, ForeignCurrency, Side, SignedAmount, TranslatedAmount};
pub use reference::{DocumentKind, DocumentRef};
