use ledgerpost_core::{BusinessId, DocumentRef, DomainResult, JournalId};

use crate::journal::AccountJournal;

/// Append-only journal port, scoped to one open transaction.
///
/// Journals are never updated or deleted. Inserting a journal whose
/// `reversal_of` is set retires the original from the active index.
pub trait JournalLedger {
    /// Append a journal.
    ///
    /// Fails with `DomainError::AlreadyReversed` when `reversal_of` names a
    /// journal that is no longer active, and with `DomainError::Persistence`
    /// when a non-reversal journal would become a second active journal for
    /// its reference.
    fn insert_journal(&mut self, journal: AccountJournal) -> DomainResult<()>;

    fn journal(&self, id: JournalId) -> DomainResult<Option<AccountJournal>>;

    /// The current effective journal for a document, if any.
    fn active_journal(&self, reference: DocumentRef) -> DomainResult<Option<AccountJournal>>;

    /// Every journal of a business in insertion order, reversals included.
    fn journals_for_business(&self, business_id: BusinessId) -> DomainResult<Vec<AccountJournal>>;
}
