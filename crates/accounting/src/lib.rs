//! Accounting module (double-entry journals, append-only).
//!
//! Pure domain logic only: no IO, no persistence concerns. Journals are
//! immutable once built; corrections are new journals tagged as reversals.

pub mod draft;
pub mod journal;
pub mod ledger;

pub use draft::{JournalDraft, PostingAccumulator};
pub use journal::{AccountJournal, AccountTransaction, JournalHeader, JournalTotals};
pub use ledger::JournalLedger;
