use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use log::{debug, warn};
use serde::Serialize;
use warp::ws::{Message, WebSocket};
use warp::{reply, Filter, Rejection, Reply};

use crate::capture::attack_store::AttackStore;
use crate::hub::broadcast_hub::BroadcastHub;
use crate::registry::peer_registry::PeerRegistry;

#[derive(Serialize)]
pub struct StatusResponse {
    pub node_id: String,
    pub status: String,
    pub peers: usize,
    pub attacks: usize,
}

/// GET /
pub fn dashboard_route() -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path::end().and(warp::get()).and_then(|| async move {
        let html = r#"<html><head><title>Rucher</title></head>
                <body><h1>Rucher node is running</h1>
                <p>See /api/status for JSON, /ws for the live feed.</p></body></html>"#;
        Ok::<_, Rejection>(reply::html(html))
    })
}

/// GET /api/status
pub fn status_route(
    registry: Arc<PeerRegistry>,
    store: Arc<AttackStore>,
    node_id: String,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "status")
        .and(warp::get())
        .and_then(move || {
            let registry = registry.clone();
            let store = store.clone();
            let node_id = node_id.clone();
            async move {
                Ok::<_, Rejection>(reply::json(&StatusResponse {
                    node_id,
                    status: String::from("online"),
                    peers: registry.len(),
                    attacks: store.len(),
                }))
            }
        })
}

/// GET /api/peers
pub fn peers_route(
    registry: Arc<PeerRegistry>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "peers")
        .and(warp::get())
        .and_then(move || {
            let registry = registry.clone();
            async move { Ok::<_, Rejection>(reply::json(&registry.list())) }
        })
}

/// GET /api/attacks
pub fn attacks_route(
    store: Arc<AttackStore>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "attacks")
        .and(warp::get())
        .and_then(move || {
            let store = store.clone();
            async move { Ok::<_, Rejection>(reply::json(&store.list())) }
        })
}

/// GET /ws
pub fn ws_route(
    hub: Arc<BroadcastHub>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path("ws")
        .and(warp::path::end())
        .and(warp::ws())
        .map(move |ws: warp::ws::Ws| {
            let hub = hub.clone();
            ws.on_upgrade(move |socket| attach_observer(socket, hub))
        })
}

/// Bridges one websocket to the hub until either side hangs up.
///
/// The hub queue is the only event source; a receiver that returns `None`
/// means the hub already evicted this observer for falling behind.
async fn attach_observer(socket: WebSocket, hub: Arc<BroadcastHub>) {
    let (mut to_client, mut from_client) = socket.split();
    let (observer_id, mut events) = hub.join();

    loop {
        tokio::select! {
            event = events.recv() => {
                let event = match event {
                    Some(e) => e,
                    None => break,
                };
                let frame = match serde_json::to_string(&event) {
                    Ok(text) => Message::text(text),
                    Err(e) => {
                        warn!("observer {} frame encoding failed: {}", observer_id, e);
                        continue;
                    }
                };
                if to_client.send(frame).await.is_err() {
                    break;
                }
            }
            inbound = from_client.next() => {
                match inbound {
                    Some(Ok(message)) if message.is_close() => break,
                    Some(Ok(_)) => {} // pings and chatter, nothing to answer
                    Some(Err(e)) => {
                        debug!("observer {} socket error: {}", observer_id, e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    hub.leave(observer_id);
}
