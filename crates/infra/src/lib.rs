//! Infrastructure layer: ledger store, reversal, event dispatch, config.

pub mod balances;
pub mod config;
pub mod directory;
pub mod dispatcher;
pub mod reversal;
pub mod store;
pub mod valuation;


pub use balances::{BalanceRecompute, BalanceRecomputer, JournalBalanceBook};
pub use config::{CONFIG_ENV, ConfigError, DispatcherConfig, ReplayConfig};
pub use directory::{ProductEntry, StaticBusinessDirectory, StaticProductCatalog};
pub use dispatcher::{DispatchError, DispatchOutcome, DispatchStep, EventDispatcher};
pub use reversal::{DocumentReversal, JournalReversal, Replacement, ReversalEngine};
pub use store::{EventLog, InMemoryLedgerStore, LedgerStore, LedgerTx};
pub use valuation::MovingAverageValuation;
