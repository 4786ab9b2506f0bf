use super::types::PushEvent;
use crate::capture::attack_store::AttackStore;
use crate::capture::types::AttackRecord;
use crate::registry::peer_registry::PeerRegistry;
use crate::registry::types::{PeerAnnouncement, PeerRecord};
use log::{debug, error, info};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Queue depth per observer. An observer that falls this far behind is
/// evicted rather than allowed to apply backpressure.
pub const OBSERVER_QUEUE_DEPTH: usize = 64;

/// Fan-out point between the capture pipeline and live observers.
///
/// The hub owns the observer set and fronts the peer registry and the attack
/// store for every mutation that must be announced. Mutation and fan-out run
/// under the observer lock, the same lock `join` holds while it snapshots
/// state and registers the new queue. That serialization is what makes the
/// init snapshot seamless: an event is either already inside the snapshot or
/// arrives later as an incremental, never both and never neither.
///
/// Sends never block. Each observer gets a bounded queue; a queue that is
/// full or closed costs the observer its membership, not the publisher its
/// latency.
pub struct BroadcastHub {
    node_id: String,
    registry: Arc<PeerRegistry>,
    store: Arc<AttackStore>,
    observers: Mutex<HashMap<u64, mpsc::Sender<PushEvent>>>,
    next_observer_id: AtomicU64,
}

impl BroadcastHub {
    pub fn new(
        node_id: impl Into<String>,
        registry: Arc<PeerRegistry>,
        store: Arc<AttackStore>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            registry,
            store,
            observers: Mutex::new(HashMap::new()),
            next_observer_id: AtomicU64::new(1),
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Registers an observer and returns its id and event queue.
    ///
    /// The first event on the queue is always `Init` with the state as of
    /// registration.
    pub fn join(&self) -> (u64, mpsc::Receiver<PushEvent>) {
        let mut observers = self.observers.lock().unwrap();

        let init = PushEvent::Init {
            node_id: self.node_id.clone(),
            peers: self.registry.list(),
            attacks: self.store.list(),
        };

        let (tx, rx) = mpsc::channel(OBSERVER_QUEUE_DEPTH);
        if tx.try_send(init).is_err() {
            // A freshly created queue has room; reaching this is a bug.
            error!("observer queue rejected its init snapshot");
        }

        let id = self.next_observer_id.fetch_add(1, Ordering::Relaxed);
        observers.insert(id, tx);
        info!("observer {} joined ({} active)", id, observers.len());
        (id, rx)
    }

    /// Drops an observer. Safe to call for ids already evicted.
    pub fn leave(&self, id: u64) {
        let mut observers = self.observers.lock().unwrap();
        if observers.remove(&id).is_some() {
            info!("observer {} left ({} active)", id, observers.len());
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.lock().unwrap().len()
    }

    /// Delivers an event to every observer.
    pub fn publish(&self, event: PushEvent) {
        let mut observers = self.observers.lock().unwrap();
        self.fan_out(&mut observers, &event);
    }

    /// Stores a capture and announces it, as one step.
    pub fn record_attack(&self, topic: &str, payload: &str) -> AttackRecord {
        let mut observers = self.observers.lock().unwrap();
        let record = self.store.record(topic, payload, &self.node_id);
        debug!(
            "captured {:?} severity payload on {} ({} bytes)",
            record.severity,
            topic,
            payload.len()
        );
        self.fan_out(
            &mut observers,
            &PushEvent::NewAttack {
                data: record.clone(),
            },
        );
        record
    }

    /// Applies a peer announcement and announces the update, as one step.
    ///
    /// Returns `None` when the registry drops the announcement (own echo),
    /// in which case nothing is published.
    pub fn update_peer(&self, announcement: PeerAnnouncement) -> Option<PeerRecord> {
        let mut observers = self.observers.lock().unwrap();
        let record = self.registry.announce(announcement)?;
        self.fan_out(
            &mut observers,
            &PushEvent::PeerUpdate {
                peer_id: record.node_id.clone(),
                data: record.clone(),
            },
        );
        Some(record)
    }

    /// Expires stale peers, publishing one removal event per peer.
    pub fn remove_stale_peers(&self) -> usize {
        let mut observers = self.observers.lock().unwrap();
        let removed = self.registry.sweep();
        let count = removed.len();
        for peer in removed {
            info!("peer {} expired", peer.node_id);
            self.fan_out(
                &mut observers,
                &PushEvent::PeerRemoved {
                    peer_id: peer.node_id,
                },
            );
        }
        count
    }

    fn fan_out(&self, observers: &mut HashMap<u64, mpsc::Sender<PushEvent>>, event: &PushEvent) {
        let mut evicted: Vec<u64> = Vec::new();
        for (id, tx) in observers.iter() {
            match tx.try_send(event.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    info!("observer {} fell behind, evicting", id);
                    evicted.push(*id);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!("observer {} closed its queue", id);
                    evicted.push(*id);
                }
            }
        }
        for id in evicted {
            observers.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::types::Severity;
    use std::thread;

    fn hub() -> BroadcastHub {
        let registry = Arc::new(PeerRegistry::new("LOCAL-01", 30));
        let store = Arc::new(AttackStore::new(100));
        BroadcastHub::new("LOCAL-01", registry, store)
    }

    fn announcement(node_id: &str) -> PeerAnnouncement {
        PeerAnnouncement {
            node_id: String::from(node_id),
            status: String::from("online"),
            ip: None,
            timestamp: 0,
        }
    }

    /// Drains everything currently buffered on an observer queue.
    fn drain(rx: &mut mpsc::Receiver<PushEvent>) -> Vec<PushEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn init_snapshot_reflects_state_at_join() {
        let hub = hub();
        hub.record_attack("admin/settings", "cmd=reboot");
        hub.update_peer(announcement("NODE-B"));

        let (_, mut rx) = hub.join();

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        match &events[0] {
            PushEvent::Init {
                node_id,
                peers,
                attacks,
            } => {
                assert_eq!(node_id, "LOCAL-01");
                assert!(peers.contains_key("NODE-B"));
                assert_eq!(attacks.len(), 1);
                assert_eq!(attacks[0].severity, Severity::High);
            }
            other => panic!("expected init, got {:?}", other),
        }
    }

    #[test]
    fn events_arrive_in_publish_order() {
        let hub = hub();
        let (_, mut rx) = hub.join();

        hub.record_attack("t", "one");
        hub.record_attack("t", "two");
        hub.record_attack("t", "three");

        let events = drain(&mut rx);
        let payloads: Vec<String> = events
            .into_iter()
            .filter_map(|event| match event {
                PushEvent::NewAttack { data } => Some(data.payload),
                _ => None,
            })
            .collect();
        assert_eq!(payloads, vec!["one", "two", "three"]);
    }

    #[test]
    fn attack_before_join_is_seen_once_in_the_snapshot() {
        let hub = hub();
        let record = hub.record_attack("t", "early");

        let (_, mut rx) = hub.join();

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        match &events[0] {
            PushEvent::Init { attacks, .. } => {
                assert_eq!(attacks.len(), 1);
                assert_eq!(attacks[0].id, record.id);
            }
            other => panic!("expected init, got {:?}", other),
        }
    }

    #[test]
    fn attack_after_join_is_seen_once_as_incremental() {
        let hub = hub();
        let (_, mut rx) = hub.join();

        let record = hub.record_attack("t", "late");

        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        match &events[0] {
            PushEvent::Init { attacks, .. } => assert!(attacks.is_empty()),
            other => panic!("expected init, got {:?}", other),
        }
        match &events[1] {
            PushEvent::NewAttack { data } => assert_eq!(data.id, record.id),
            other => panic!("expected new attack, got {:?}", other),
        }
    }

    #[test]
    fn join_racing_a_record_sees_the_attack_exactly_once() {
        for _ in 0..50 {
            let hub = Arc::new(hub());
            let writer = {
                let hub = Arc::clone(&hub);
                thread::spawn(move || hub.record_attack("t", "raced"))
            };

            let (_, mut rx) = hub.join();
            let record = writer.join().expect("writer thread");

            // Both sides are done, so every delivery is already buffered.
            let mut sightings = 0;
            for event in drain(&mut rx) {
                match event {
                    PushEvent::Init { attacks, .. } => {
                        sightings += attacks.iter().filter(|a| a.id == record.id).count();
                    }
                    PushEvent::NewAttack { data } if data.id == record.id => sightings += 1,
                    _ => {}
                }
            }
            assert_eq!(sightings, 1);
        }
    }

    #[test]
    fn own_echo_publishes_nothing() {
        let hub = hub();
        let (_, mut rx) = hub.join();

        assert!(hub.update_peer(announcement("LOCAL-01")).is_none());

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1); // just the init
        assert!(matches!(events[0], PushEvent::Init { .. }));
    }

    #[test]
    fn closed_observer_is_evicted_without_disturbing_the_rest() {
        let hub = hub();
        let (_, mut alive_rx) = hub.join();
        let (_, dead_rx) = hub.join();
        drop(dead_rx);
        assert_eq!(hub.observer_count(), 2);

        hub.record_attack("t", "after drop");

        assert_eq!(hub.observer_count(), 1);
        let events = drain(&mut alive_rx);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], PushEvent::NewAttack { .. }));
    }

    #[test]
    fn observer_that_falls_behind_is_evicted() {
        let hub = hub();
        let (_, mut rx) = hub.join();

        // The init snapshot occupies one slot; fill the rest, then overflow.
        for i in 0..OBSERVER_QUEUE_DEPTH {
            hub.record_attack("t", &format!("flood-{}", i));
        }

        assert_eq!(hub.observer_count(), 0);
        // The buffered backlog is still readable after eviction.
        let events = drain(&mut rx);
        assert_eq!(events.len(), OBSERVER_QUEUE_DEPTH);
        assert!(matches!(events[0], PushEvent::Init { .. }));
    }

    #[test]
    fn fresh_peers_survive_a_sweep_unannounced() {
        let registry = Arc::new(PeerRegistry::new("LOCAL-01", 30));
        let store = Arc::new(AttackStore::new(100));
        let hub = BroadcastHub::new("LOCAL-01", Arc::clone(&registry), store);
        hub.update_peer(announcement("NODE-B"));
        hub.update_peer(announcement("NODE-C"));
        let (_, mut rx) = hub.join();

        assert_eq!(hub.remove_stale_peers(), 0);
        assert_eq!(drain(&mut rx).len(), 1); // init only
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn stale_peer_removal_is_published_per_peer() {
        // Zero threshold makes every peer stale by the time the sweep runs.
        let registry = Arc::new(PeerRegistry::new("LOCAL-01", 0));
        let store = Arc::new(AttackStore::new(100));
        let hub = BroadcastHub::new("LOCAL-01", Arc::clone(&registry), store);
        hub.update_peer(announcement("NODE-B"));
        hub.update_peer(announcement("NODE-C"));
        let (_, mut rx) = hub.join();
        thread::sleep(std::time::Duration::from_millis(5));

        assert_eq!(hub.remove_stale_peers(), 2);

        assert!(registry.is_empty());
        let mut removed: Vec<String> = drain(&mut rx)
            .into_iter()
            .filter_map(|event| match event {
                PushEvent::PeerRemoved { peer_id } => Some(peer_id),
                _ => None,
            })
            .collect();
        removed.sort();
        assert_eq!(removed, vec!["NODE-B", "NODE-C"]);
    }

    #[test]
    fn leave_is_idempotent() {
        let hub = hub();
        let (id, rx) = hub.join();

        hub.leave(id);
        hub.leave(id);

        assert_eq!(hub.observer_count(), 0);
        drop(rx);
    }
}
