use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use ledgerpost_core::{BusinessId, DocumentKind, DomainError, DomainResult, EventId};

/// What happened to the source document.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventAction {
    #[serde(alias = "Create", alias = "CREATE")]
    Create,
    #[serde(alias = "Update", alias = "UPDATE")]
    Update,
    #[serde(alias = "Delete", alias = "DELETE")]
    Delete,
}

impl EventAction {
    pub fn as_str(self) -> &'static str {
        match self {
            EventAction::Create => "create",
            EventAction::Update => "update",
            EventAction::Delete => "delete",
        }
    }

    pub fn needs_old_snapshot(self) -> bool {
        matches!(self, EventAction::Update | EventAction::Delete)
    }

    pub fn needs_new_snapshot(self) -> bool {
        matches!(self, EventAction::Create | EventAction::Update)
    }
}

impl core::fmt::Display for EventAction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A change notification for one source document.
///
/// This is the unit the dispatcher consumes. The snapshot shape is owned by
/// the document kind; here it stays opaque JSON.
///
/// ## Snapshot requirements
///
/// - **Create** carries `new_snapshot`
/// - **Update** carries both snapshots
/// - **Delete** carries `old_snapshot`
///
/// The requirements are checked on construction and on deserialization, so a
/// `ChangeEvent` that exists is always well formed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawChangeEvent")]
pub struct ChangeEvent {
    event_id: EventId,
    action: EventAction,
    business_id: BusinessId,
    reference_type: DocumentKind,
    new_snapshot: Option<JsonValue>,
    old_snapshot: Option<JsonValue>,
}

#[derive(Deserialize)]
struct RawChangeEvent {
    event_id: EventId,
    action: EventAction,
    business_id: BusinessId,
    reference_type: DocumentKind,
    #[serde(default, alias = "new_document")]
    new_snapshot: Option<JsonValue>,
    #[serde(default, alias = "old_document")]
    old_snapshot: Option<JsonValue>,
}

impl TryFrom<RawChangeEvent> for ChangeEvent {
    type Error = DomainError;

    fn try_from(raw: RawChangeEvent) -> DomainResult<Self> {
        ChangeEvent::new(
            raw.event_id,
            raw.action,
            raw.business_id,
            raw.reference_type,
            raw.new_snapshot,
            raw.old_snapshot,
        )
    }
}

fn present(snapshot: &Option<JsonValue>) -> bool {
    !matches!(snapshot, None | Some(JsonValue::Null))
}

impl ChangeEvent {
    pub fn new(
        event_id: EventId,
        action: EventAction,
        business_id: BusinessId,
        reference_type: DocumentKind,
        new_snapshot: Option<JsonValue>,
        old_snapshot: Option<JsonValue>,
    ) -> DomainResult<Self> {
        if action.needs_new_snapshot() && !present(&new_snapshot) {
            return Err(DomainError::decode(format!(
                "{action} event {event_id} is missing its new snapshot"
            )));
        }
        if action.needs_old_snapshot() && !present(&old_snapshot) {
            return Err(DomainError::decode(format!(
                "{action} event {event_id} is missing its old snapshot"
            )));
        }
        Ok(Self {
            event_id,
            action,
            business_id,
            reference_type,
            new_snapshot: new_snapshot.filter(|s| !s.is_null()),
            old_snapshot: old_snapshot.filter(|s| !s.is_null()),
        })
    }

    pub fn create(
        event_id: EventId,
        business_id: BusinessId,
        reference_type: DocumentKind,
        snapshot: JsonValue,
    ) -> DomainResult<Self> {
        Self::new(event_id, EventAction::Create, business_id, reference_type, Some(snapshot), None)
    }

    pub fn update(
        event_id: EventId,
        business_id: BusinessId,
        reference_type: DocumentKind,
        old_snapshot: JsonValue,
        new_snapshot: JsonValue,
    ) -> DomainResult<Self> {
        Self::new(
            event_id,
            EventAction::Update,
            business_id,
            reference_type,
            Some(new_snapshot),
            Some(old_snapshot),
        )
    }

    pub fn delete(
        event_id: EventId,
        business_id: BusinessId,
        reference_type: DocumentKind,
        snapshot: JsonValue,
    ) -> DomainResult<Self> {
        Self::new(event_id, EventAction::Delete, business_id, reference_type, None, Some(snapshot))
    }

    pub fn event_id(&self) -> EventId {
        self.event_id
    }

    pub fn action(&self) -> EventAction {
        self.action
    }

    pub fn business_id(&self) -> BusinessId {
        self.business_id
    }

    pub fn reference_type(&self) -> DocumentKind {
        self.reference_type
    }

    pub fn new_snapshot(&self) -> Option<&JsonValue> {
        self.new_snapshot.as_ref()
    }

    pub fn old_snapshot(&self) -> Option<&JsonValue> {
        self.old_snapshot.as_ref()
    }

    /// The new snapshot, for actions that require one.
    pub fn require_new(&self) -> DomainResult<&JsonValue> {
        self.new_snapshot.as_ref().ok_or_else(|| {
            DomainError::decode(format!("event {} has no new snapshot", self.event_id))
        })
    }

    /// The old snapshot, for actions that require one.
    pub fn require_old(&self) -> DomainResult<&JsonValue> {
        self.old_snapshot.as_ref().ok_or_else(|| {
            DomainError::decode(format!("event {} has no old snapshot", self.event_id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_requires_new_snapshot() {
        let err = ChangeEvent::new(
            EventId::new(),
            EventAction::Create,
            BusinessId::new(),
            DocumentKind::Bill,
            None,
            Some(json!({})),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Decode(_)));
    }

    #[test]
    fn update_requires_both_snapshots() {
        let result = ChangeEvent::new(
            EventId::new(),
            EventAction::Update,
            BusinessId::new(),
            DocumentKind::Bill,
            Some(json!({})),
            Some(JsonValue::Null),
        );
        assert!(result.is_err());
    }

    #[test]
    fn decoding_enforces_snapshot_requirements() {
        let ok = json!({
            "event_id": EventId::new(),
            "action": "Delete",
            "business_id": BusinessId::new(),
            "reference_type": "supplier_credit",
            "old_document": { "id": 1 }
        });
        let event: ChangeEvent = serde_json::from_value(ok).unwrap();
        assert_eq!(event.action(), EventAction::Delete);
        assert_eq!(event.reference_type(), DocumentKind::SupplierCredit);
        assert!(event.new_snapshot().is_none());
        assert!(event.require_old().is_ok());

        let missing = json!({
            "event_id": EventId::new(),
            "action": "delete",
            "business_id": BusinessId::new(),
            "reference_type": "bill"
        });
        assert!(serde_json::from_value::<ChangeEvent>(missing).is_err());
    }
}
