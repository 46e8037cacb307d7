//! Change notifications consumed by the posting engine.
//!
//! - `ChangeEvent`: a create/update/delete of one source document, carrying
//!   the old and/or new snapshot as opaque JSON
//! - `EventRecord`: the per-event idempotency and audit record

pub mod change;
pub mod record;

pub use change::{ChangeEvent, EventAction};
pub use record::EventRecord;
