//! Wire and bookkeeping types for the peer registry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Self announcement as published on the bus.
///
/// `node_id` and `status` are required; everything else is tolerated missing
/// because remote clocks and remote address detection are both unreliable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerAnnouncement {
    pub node_id: String,
    pub status: String,
    #[serde(default)]
    pub ip: Option<String>,
    /// Sender clock, epoch seconds. Kept on the wire for symmetry but never
    /// trusted on receipt.
    #[serde(default)]
    pub timestamp: i64,
}

/// What the registry knows about one peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerRecord {
    pub node_id: String,
    pub status: String,
    pub ip: Option<String>,
    /// Receipt time of the latest announcement, epoch seconds on the wire.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub last_seen: DateTime<Utc>,
}
