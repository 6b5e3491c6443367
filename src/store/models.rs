//! Wire and storage models shared by the scheduler, hub, writer, and web
//! layer.

use crate::probe::ProbeResult;
use crate::sla::SlaSnapshot;
use serde::{Deserialize, Serialize};

/// SLA half of a status payload: the live reading plus per-day history.
///
/// `history[0]` is the still-mutating "today" snapshot; later entries are
/// frozen prior days, newest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlaReport {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(flatten)]
    pub snapshot: SlaSnapshot,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<SlaSnapshot>,
}

/// One status update for one endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusPayload {
    pub probe: ProbeResult,
    pub sla: SlaReport,
}

/// Envelope persisted to the KV store and emitted on the SSE stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub index: i32,
    pub payload: StatusPayload,
}
