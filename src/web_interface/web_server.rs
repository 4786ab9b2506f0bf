use std::net::SocketAddr;
use std::sync::Arc;

use log::info;
use warp::Filter;

use super::routes;
use crate::capture::attack_store::AttackStore;
use crate::hub::broadcast_hub::BroadcastHub;
use crate::registry::peer_registry::PeerRegistry;

/// Web server for the query API and the live observer feed.
///
/// Everything served here is a snapshot or a push of in-memory state, so
/// handlers never fail; an empty node answers with empty collections.
pub struct WebServer {
    hub: Arc<BroadcastHub>,
    registry: Arc<PeerRegistry>,
    store: Arc<AttackStore>,
}

impl WebServer {
    pub fn new(
        hub: Arc<BroadcastHub>,
        registry: Arc<PeerRegistry>,
        store: Arc<AttackStore>,
    ) -> Self {
        Self {
            hub,
            registry,
            store,
        }
    }

    /// Serves until the surrounding task is cancelled.
    pub async fn start(&self, port: u16) {
        let routes = routes::dashboard_route()
            .or(routes::status_route(
                self.registry.clone(),
                self.store.clone(),
                self.hub.node_id().to_string(),
            ))
            .or(routes::peers_route(self.registry.clone()))
            .or(routes::attacks_route(self.store.clone()))
            .or(routes::ws_route(self.hub.clone()));

        // Start server (warp 0.4)
        let addr: SocketAddr = ([0, 0, 0, 0], port).into();
        info!("observer interface on {}", addr);
        warp::serve(routes).run(addr).await;
    }
}
