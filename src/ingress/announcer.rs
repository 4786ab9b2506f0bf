use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, info, warn};
use rumqttc::{AsyncClient, QoS};
use tokio::sync::Notify;

use super::peer_topic;
use crate::registry::types::PeerAnnouncement;

pub(crate) fn build_announcement(node_id: &str, ip: Option<String>) -> PeerAnnouncement {
    PeerAnnouncement {
        node_id: node_id.to_string(),
        status: String::from("online"),
        ip,
        timestamp: Utc::now().timestamp(),
    }
}

/// Publishes this node's presence on the bus until shutdown.
///
/// The first announcement goes out immediately, then one per interval. The
/// message is retained so that a peer subscribing later still learns about
/// this node before its next beat. Publish failures are logged and skipped;
/// the next tick tries again.
pub async fn run_announcer(
    client: AsyncClient,
    node_id: String,
    interval_secs: u64,
    shutdown: Arc<Notify>,
) {
    let topic = peer_topic(&node_id);
    let ip = local_ip_address::local_ip().ok().map(|addr| addr.to_string());
    if ip.is_none() {
        debug!("local address detection failed, announcing without one");
    }
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let announcement = build_announcement(&node_id, ip.clone());
                let payload = match serde_json::to_vec(&announcement) {
                    Ok(p) => p,
                    Err(e) => {
                        warn!("failed to encode announcement: {}", e);
                        continue;
                    }
                };
                if let Err(e) = client.publish(topic.as_str(), QoS::AtLeastOnce, true, payload).await {
                    warn!("announcement publish failed: {}", e);
                }
            }
            _ = shutdown.notified() => break,
        }
    }
    info!("announcer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use rumqttc::MqttOptions;
    use std::time::Duration;
    use tokio::time::timeout;

    #[test]
    fn announcement_carries_identity_and_status() {
        let announcement = build_announcement("LOCAL-01", Some(String::from("10.0.0.5")));

        let value = serde_json::to_value(&announcement).expect("serializes");
        assert_eq!(value["node_id"], "LOCAL-01");
        assert_eq!(value["status"], "online");
        assert_eq!(value["ip"], "10.0.0.5");
        assert!(value["timestamp"].as_i64().expect("epoch seconds") > 0);
    }

    #[test]
    fn announcement_topic_is_namespaced_by_node() {
        assert_eq!(peer_topic("LOCAL-01"), "rucher/peers/LOCAL-01");
    }

    #[tokio::test]
    async fn announcer_stops_on_shutdown() {
        let shutdown = Arc::new(Notify::new());
        // No broker needed: publishes queue toward the (unpolled) event loop.
        let opts = MqttOptions::new("test-announcer", "127.0.0.1", 1);
        let (client, _events) = AsyncClient::new(opts, 8);
        let announcer = tokio::spawn(run_announcer(
            client,
            String::from("LOCAL-01"),
            1,
            Arc::clone(&shutdown),
        ));

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.notify_waiters();

        timeout(Duration::from_secs(2), announcer)
            .await
            .expect("announcer exits")
            .expect("announcer task");
    }
}
