//! Transactional ledger store boundary.
//!
//! One transaction per change event: the journal table, the stock ledger and
//! the event records are written through a single `LedgerTx`, and either all
//! of the writes become visible or none do.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryLedgerStore;
pub use r#trait::{EventLog, LedgerStore, LedgerTx};
