use super::types::{PeerAnnouncement, PeerRecord};
use chrono::{DateTime, Duration, Utc};
use log::{debug, info};
use std::collections::HashMap;
use std::sync::Mutex;

/// Ephemeral map of the peers currently heard on the bus.
///
/// A peer exists only while its announcements keep arriving. Membership is
/// driven by receipt time on the local clock; the timestamps peers report
/// about themselves are ignored, so clock skew between nodes cannot pin a
/// dead peer alive or expire a live one. One lock guards the whole map,
/// which makes an announcement and a concurrent sweep of the same peer
/// linearize instead of interleaving.
pub struct PeerRegistry {
    local_node_id: String,
    stale_after: Duration,
    peers: Mutex<HashMap<String, PeerRecord>>,
}

impl PeerRegistry {
    pub fn new(local_node_id: impl Into<String>, stale_after_secs: u64) -> Self {
        Self {
            local_node_id: local_node_id.into(),
            stale_after: Duration::seconds(stale_after_secs as i64),
            peers: Mutex::new(HashMap::new()),
        }
    }

    /// Records a peer announcement, returning the updated record.
    ///
    /// The node's own announcements echo back from the bus and are dropped
    /// here; the registry only ever holds remote peers. Returns `None` for
    /// such self sightings.
    pub fn announce(&self, announcement: PeerAnnouncement) -> Option<PeerRecord> {
        self.announce_at(announcement, Utc::now())
    }

    fn announce_at(
        &self,
        announcement: PeerAnnouncement,
        now: DateTime<Utc>,
    ) -> Option<PeerRecord> {
        if announcement.node_id == self.local_node_id {
            debug!("ignoring own announcement echoed from the bus");
            return None;
        }

        let record = PeerRecord {
            node_id: announcement.node_id.clone(),
            status: announcement.status,
            ip: announcement.ip,
            // Receipt time on our clock, never the clock the peer reported.
            timestamp: now,
            last_seen: now,
        };

        let mut peers = self.peers.lock().unwrap();
        if peers.insert(announcement.node_id, record.clone()).is_none() {
            info!("peer {} joined", record.node_id);
        }
        Some(record)
    }

    /// Removes every peer not heard from within the staleness threshold and
    /// returns the removed records.
    pub fn sweep(&self) -> Vec<PeerRecord> {
        self.sweep_at(Utc::now())
    }

    fn sweep_at(&self, now: DateTime<Utc>) -> Vec<PeerRecord> {
        let mut peers = self.peers.lock().unwrap();
        let expired: Vec<String> = peers
            .values()
            .filter(|record| now - record.last_seen > self.stale_after)
            .map(|record| record.node_id.clone())
            .collect();

        expired
            .iter()
            .filter_map(|node_id| peers.remove(node_id))
            .collect()
    }

    /// Snapshot of the current peer map keyed by node id.
    pub fn list(&self) -> HashMap<String, PeerRecord> {
        self.peers.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.peers.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
