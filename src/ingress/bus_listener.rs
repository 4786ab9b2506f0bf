//! # Bus Listener Module
//!
//! Subscribes to the whole shared bus and splits what it hears into two
//! streams: peer announcements, which keep the registry warm, and everything
//! else, which is recorded as hostile traffic. On a decoy bus there is no
//! legitimate third kind of message.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use rumqttc::{AsyncClient, Event, EventLoop, Packet, QoS};
use tokio::sync::Notify;

use super::PEER_TOPIC_PREFIX;
use crate::error_handling::types::IngressError;
use crate::hub::broadcast_hub::BroadcastHub;
use crate::registry::types::PeerAnnouncement;

const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Routes one bus message to the registry or the attack store.
///
/// Malformed announcements are discarded with a warning; they never reach
/// the registry and they are not recorded as attacks either, since the peer
/// namespace is ours by convention.
pub(crate) fn route_message(hub: &BroadcastHub, topic: &str, payload: &[u8]) {
    if let Some(peer_id) = topic.strip_prefix(PEER_TOPIC_PREFIX) {
        match serde_json::from_slice::<PeerAnnouncement>(payload) {
            Ok(announcement) => {
                if hub.update_peer(announcement).is_some() {
                    debug!("peer update from {}", peer_id);
                }
            }
            Err(e) => warn!("discarding malformed announcement on {}: {}", topic, e),
        }
        return;
    }

    let text = String::from_utf8_lossy(payload);
    hub.record_attack(topic, &text);
}

/// Pumps the bus event loop until shutdown.
///
/// The catch-all subscription is re-issued on every connection ack, so it
/// survives broker restarts. Poll errors back off and retry forever: the
/// bus being down is an operating state of the system, not a reason to
/// stop collecting.
pub async fn run_bus_listener(
    mut events: EventLoop,
    client: AsyncClient,
    hub: Arc<BroadcastHub>,
    shutdown: Arc<Notify>,
) -> Result<(), IngressError> {
    loop {
        tokio::select! {
            event = events.poll() => match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("connected to the bus, subscribing to all topics");
                    client
                        .subscribe("#", QoS::AtMostOnce)
                        .await
                        .map_err(IngressError::SubscribeFailed)?;
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    route_message(&hub, &publish.topic, &publish.payload);
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("bus unreachable, retrying in {:?}: {}", RETRY_DELAY, e);
                    tokio::select! {
                        _ = tokio::time::sleep(RETRY_DELAY) => {}
                        _ = shutdown.notified() => break,
                    }
                }
            },
            _ = shutdown.notified() => break,
        }
    }
    info!("bus listener stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::attack_store::AttackStore;
    use crate::capture::types::Severity;
    use crate::hub::types::PushEvent;
    use crate::ingress::peer_topic;
    use crate::registry::peer_registry::PeerRegistry;
    use rumqttc::MqttOptions;
    use std::time::Duration;
    use tokio::time::timeout;

    struct Fixture {
        registry: Arc<PeerRegistry>,
        store: Arc<AttackStore>,
        hub: Arc<BroadcastHub>,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(PeerRegistry::new("LOCAL-01", 30));
        let store = Arc::new(AttackStore::new(100));
        let hub = Arc::new(BroadcastHub::new(
            "LOCAL-01",
            Arc::clone(&registry),
            Arc::clone(&store),
        ));
        Fixture {
            registry,
            store,
            hub,
        }
    }

    #[test]
    fn announcement_topic_reaches_the_registry_not_the_store() {
        let f = fixture();
        let (_, mut rx) = f.hub.join();

        route_message(
            &f.hub,
            &peer_topic("NODE-B"),
            br#"{"node_id":"NODE-B","status":"online","ip":"10.0.0.9","timestamp":12}"#,
        );

        assert_eq!(f.registry.len(), 1);
        assert!(f.store.is_empty());
        let _init = rx.try_recv().expect("init");
        match rx.try_recv().expect("peer update") {
            PushEvent::PeerUpdate { peer_id, data } => {
                assert_eq!(peer_id, "NODE-B");
                assert_eq!(data.ip.as_deref(), Some("10.0.0.9"));
            }
            other => panic!("expected peer update, got {:?}", other),
        }
    }

    #[test]
    fn own_echo_is_not_registered_or_published() {
        let f = fixture();
        let (_, mut rx) = f.hub.join();

        route_message(
            &f.hub,
            &peer_topic("LOCAL-01"),
            br#"{"node_id":"LOCAL-01","status":"online"}"#,
        );

        assert!(f.registry.is_empty());
        assert!(f.store.is_empty());
        let _init = rx.try_recv().expect("init");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn malformed_announcement_is_discarded() {
        let f = fixture();

        route_message(&f.hub, &peer_topic("NODE-B"), b"{not json");
        route_message(&f.hub, &peer_topic("NODE-B"), br#"{"status":"online"}"#);

        assert!(f.registry.is_empty());
        assert!(f.store.is_empty());
    }

    #[test]
    fn other_topics_are_recorded_as_attacks() {
        let f = fixture();
        let (_, mut rx) = f.hub.join();

        route_message(&f.hub, "admin/settings", b"CVE-2023-1234 exploit triggered");

        assert!(f.registry.is_empty());
        let records = f.store.list();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].topic, "admin/settings");
        assert_eq!(records[0].severity, Severity::High);
        assert_eq!(records[0].node_id, "LOCAL-01");
        let _init = rx.try_recv().expect("init");
        assert!(matches!(
            rx.try_recv().expect("new attack"),
            PushEvent::NewAttack { .. }
        ));
    }

    #[test]
    fn probe_payload_is_recorded_as_low() {
        let f = fixture();

        route_message(&f.hub, "admin/settings", b"null");

        let records = f.store.list();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].topic, "admin/settings");
        assert_eq!(records[0].payload, "null");
        assert_eq!(records[0].severity, Severity::Low);
    }

    #[test]
    fn binary_payload_is_recorded_lossily() {
        let f = fixture();
        let raw = [0xde, 0xad, 0xbe, 0xef];

        route_message(&f.hub, "sensor/raw", &raw);

        let records = f.store.list();
        assert_eq!(records[0].payload, String::from_utf8_lossy(&raw));
    }

    #[test]
    fn peer_topic_round_trips_through_the_prefix() {
        assert_eq!(
            peer_topic("NODE-B").strip_prefix(PEER_TOPIC_PREFIX),
            Some("NODE-B")
        );
    }

    #[tokio::test]
    async fn listener_stops_during_retry_backoff() {
        let f = fixture();
        let shutdown = Arc::new(Notify::new());
        // Port 1 refuses connections, so the listener lives in its retry path.
        let opts = MqttOptions::new("test-collector", "127.0.0.1", 1);
        let (client, events) = AsyncClient::new(opts, 8);
        let listener = tokio::spawn(run_bus_listener(
            events,
            client,
            Arc::clone(&f.hub),
            Arc::clone(&shutdown),
        ));

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.notify_waiters();

        timeout(Duration::from_secs(2), listener)
            .await
            .expect("listener exits")
            .expect("listener task")
            .expect("clean stop");
    }
}
