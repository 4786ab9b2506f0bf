use super::classifier::classify;
use super::types::AttackRecord;
use chrono::Utc;
use log::{debug, error};
use std::collections::VecDeque;
use std::sync::Mutex;
use uuid::Uuid;

/// Bounded in-memory log of classified captures.
///
/// The store keeps at most `capacity` records. Inserting into a full store
/// evicts the single oldest record, so the window always covers the most
/// recent activity. All access goes through one lock; snapshots are clones
/// and never observe later inserts.
pub struct AttackStore {
    capacity: usize,
    records: Mutex<VecDeque<AttackRecord>>,
}

impl AttackStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            records: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Classifies and retains one capture, returning the stored record.
    pub fn record(&self, topic: &str, payload: &str, node_id: &str) -> AttackRecord {
        let record = AttackRecord {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            topic: topic.to_string(),
            payload: payload.to_string(),
            node_id: node_id.to_string(),
            severity: classify(payload),
        };

        let mut records = self.records.lock().unwrap();
        records.push_back(record.clone());
        if records.len() > self.capacity {
            if let Some(evicted) = records.pop_front() {
                debug!("attack store full, evicted record {}", evicted.id);
            }
        }
        if records.len() > self.capacity {
            // One insert displaces at most one record; anything else is a bug.
            error!(
                "attack store over capacity after eviction: {} > {}",
                records.len(),
                self.capacity
            );
        }

        record
    }

    /// Snapshot of the retained records, oldest first.
    pub fn list(&self) -> Vec<AttackRecord> {
        self.records.lock().unwrap().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
