use serde::{Deserialize, Serialize};

use super::roll::{BatchId, RollRecordId};
use super::supporters::SupporterId;

/// Reference to an engine entity handed to collaborators (review queues, audit trails).
///
/// Serialized as `{ "entity_kind": "supporter", "entity_id": 42 }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "entity_kind", content = "entity_id", rename_all = "snake_case")]
pub enum AuditSubject {
    RollRecord(RollRecordId),
    ImportBatch(BatchId),
    Supporter(SupporterId),
}
