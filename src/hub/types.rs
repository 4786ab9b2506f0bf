//! Events pushed to live observers.

use crate::capture::types::AttackRecord;
use crate::registry::types::PeerRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One frame on the observer feed.
///
/// `Init` is sent exactly once per observer, at join time, and carries the
/// full current state. Everything after it is incremental.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PushEvent {
    #[serde(rename = "INIT")]
    Init {
        node_id: String,
        peers: HashMap<String, PeerRecord>,
        attacks: Vec<AttackRecord>,
    },
    #[serde(rename = "PEER_UPDATE")]
    PeerUpdate { peer_id: String, data: PeerRecord },
    #[serde(rename = "PEER_REMOVED")]
    PeerRemoved { peer_id: String },
    #[serde(rename = "NEW_ATTACK")]
    NewAttack { data: AttackRecord },
}
