use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use ledgerpost_core::{BusinessId, DocumentKind, EventId, JournalId};

use crate::change::{ChangeEvent, EventAction};

/// Idempotency and audit record for one change event.
///
/// `processed` flips to true only after every ledger step of the event has
/// committed. Failed attempts are counted in a separate write so the record
/// survives the rollback of the ledger work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_id: EventId,
    pub action: EventAction,
    pub business_id: BusinessId,
    pub reference_type: DocumentKind,
    pub old_snapshot: Option<JsonValue>,
    pub new_snapshot: Option<JsonValue>,
    pub resulting_journal_id: Option<JournalId>,
    pub processed: bool,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub received_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl EventRecord {
    /// Fresh, unprocessed record for an incoming event.
    pub fn received(event: &ChangeEvent, received_at: DateTime<Utc>) -> Self {
        Self {
            event_id: event.event_id(),
            action: event.action(),
            business_id: event.business_id(),
            reference_type: event.reference_type(),
            old_snapshot: event.old_snapshot().cloned(),
            new_snapshot: event.new_snapshot().cloned(),
            resulting_journal_id: None,
            processed: false,
            attempts: 0,
            last_error: None,
            received_at,
            processed_at: None,
        }
    }

    pub fn mark_processed(&mut self, journal_id: Option<JournalId>, at: DateTime<Utc>) {
        self.attempts += 1;
        self.resulting_journal_id = journal_id;
        self.processed = true;
        self.last_error = None;
        self.processed_at = Some(at);
    }

    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.attempts += 1;
        self.processed = false;
        self.last_error = Some(error.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn failure_then_success_counts_attempts() {
        let event = ChangeEvent::create(
            EventId::new(),
            BusinessId::new(),
            DocumentKind::Bill,
            json!({ "bill_id": "x" }),
        )
        .unwrap();
        let mut record = EventRecord::received(&event, Utc::now());
        assert!(!record.processed);

        record.record_failure("lookup failed");
        assert_eq!(record.attempts, 1);
        assert_eq!(record.last_error.as_deref(), Some("lookup failed"));

        let journal = JournalId::new();
        record.mark_processed(Some(journal), Utc::now());
        assert!(record.processed);
        assert_eq!(record.attempts, 2);
        assert_eq!(record.resulting_journal_id, Some(journal));
        assert!(record.last_error.is_none());
    }
}
