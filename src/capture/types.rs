//! Common data types used across the capture subsystem.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Coarse threat level assigned to a captured payload.
///
/// Serialized as `"High"` / `"Low"`, which is the form observers and the
/// query API expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    High,
    Low,
}

/// One classified capture, as kept by the store and pushed to observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackRecord {
    /// Identifier unique across the lifetime of the store.
    pub id: Uuid,
    /// Receipt time, assigned by this node.
    pub timestamp: DateTime<Utc>,
    /// Origin channel: a bus topic, or `relay/<peer>` for tapped traffic.
    pub topic: String,
    /// Captured payload as text. Raw bytes arrive lossily re-encoded.
    pub payload: String,
    /// Node that reported the capture.
    pub node_id: String,
    pub severity: Severity,
}
