//! Source documents and their compilation into ledger state.
//!
//! Pure domain logic: snapshots are decoded into `SourceDocument`s and compiled
//! into one balanced journal plus stock movements. Nothing here persists.

pub mod compiler;
pub mod kinds;
pub mod model;
pub mod ports;
pub mod snapshot;

pub use compiler::{
    CompilePolicy, CompiledDocument, DocumentCompiler, PlaceholderSides, StockSign,
    compile_document,
};
pub use kinds::{
    BillCompiler, CreditNoteCompiler, InventoryAdjustmentCompiler, SupplierCreditCompiler,
    compiler_for, default_compilers,
};
pub use model::{DetailLine, DocumentHeader, LineProduct, SourceDocument};
pub use ports::{
    BusinessContext, BusinessDirectory, ProductCatalog, SystemAccount, ValuationAccounts,
};
pub use snapshot::{InventoryAdjustmentSnapshot, TradeDocumentSnapshot};
