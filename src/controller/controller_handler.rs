use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info};
use rumqttc::{AsyncClient, MqttOptions};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinSet;

use crate::capture::attack_store::AttackStore;
use crate::capture::tap::{run_tap_pump, TAP_QUEUE_DEPTH};
use crate::configuration::config::Config;
use crate::error_handling::types::ControllerError;
use crate::hub::broadcast_hub::BroadcastHub;
use crate::ingress::{run_announcer, run_bus_listener};
use crate::registry::peer_registry::PeerRegistry;
use crate::relay::relay_server::RelayServer;
use crate::web_interface::web_server::WebServer;

const BUS_KEEP_ALIVE: Duration = Duration::from_secs(30);

/// Owns startup, wiring and shutdown of every long-running task.
///
/// `run` brings up the relay, the bus listener, the announcer, the registry
/// sweeper, the tap pump and the web interface, then parks until shutdown.
/// One `Notify` fans the stop signal out to all of them.
pub struct Controller {
    config: Config,
    listen_addr: SocketAddr,
    backend_addr: SocketAddr,
    shutdown: Arc<Notify>,
}

impl Controller {
    pub fn new(config: Config) -> Result<Self, ControllerError> {
        config.validate()?;
        let listen_addr = config.listen_addr()?;
        let backend_addr = config.backend_addr()?;
        Ok(Self {
            config,
            listen_addr,
            backend_addr,
            shutdown: Arc::new(Notify::new()),
        })
    }

    /// Stop handle for tests and embedders.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown)
    }

    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }

    pub async fn run(&mut self) -> Result<(), ControllerError> {
        let node_id = self.config.node_id.clone();

        let registry = Arc::new(PeerRegistry::new(
            node_id.clone(),
            self.config.stale_after_secs,
        ));
        let store = Arc::new(AttackStore::new(self.config.store_capacity));
        let hub = Arc::new(BroadcastHub::new(
            node_id.clone(),
            Arc::clone(&registry),
            Arc::clone(&store),
        ));

        // Bind before spawning anything so a taken port fails startup.
        let (tap_tx, tap_rx) = mpsc::channel(TAP_QUEUE_DEPTH);
        let relay = RelayServer::bind(self.listen_addr, self.backend_addr, tap_tx).await?;

        let mut bus_options = MqttOptions::new(
            format!("{}-collector", node_id),
            self.config.bus_host.clone(),
            self.config.bus_port,
        );
        bus_options.set_keep_alive(BUS_KEEP_ALIVE);
        let (bus_client, bus_events) = AsyncClient::new(bus_options, 64);

        {
            let shutdown = Arc::clone(&self.shutdown);
            tokio::spawn(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!("shutdown signal listener failed: {}", e);
                    return;
                }
                info!("shutdown requested");
                shutdown.notify_waiters();
            });
        }

        let mut tasks: JoinSet<()> = JoinSet::new();

        {
            let hub = Arc::clone(&hub);
            let shutdown = Arc::clone(&self.shutdown);
            let client = bus_client.clone();
            tasks.spawn(async move {
                if let Err(e) = run_bus_listener(bus_events, client, hub, shutdown).await {
                    error!("bus listener failed: {}", e);
                }
            });
        }

        tasks.spawn(run_announcer(
            bus_client,
            node_id.clone(),
            self.config.announce_interval_secs,
            Arc::clone(&self.shutdown),
        ));

        tasks.spawn(run_sweep_loop(
            Arc::clone(&hub),
            self.config.sweep_interval_secs,
            Arc::clone(&self.shutdown),
        ));

        tasks.spawn(run_tap_pump(
            tap_rx,
            Arc::clone(&hub),
            Arc::clone(&self.shutdown),
        ));

        {
            let shutdown = Arc::clone(&self.shutdown);
            tasks.spawn(async move {
                if let Err(e) = relay.run(shutdown).await {
                    error!("relay listener failed: {}", e);
                }
            });
        }

        {
            let server = WebServer::new(
                Arc::clone(&hub),
                Arc::clone(&registry),
                Arc::clone(&store),
            );
            let port = self.config.api_port;
            let shutdown = Arc::clone(&self.shutdown);
            tasks.spawn(async move {
                tokio::select! {
                    _ = server.start(port) => {}
                    _ = shutdown.notified() => info!("web interface stopped"),
                }
            });
        }

        info!("node {} is up", node_id);

        while tasks.join_next().await.is_some() {}
        info!("all tasks stopped");
        Ok(())
    }
}

/// Expires silent peers on a fixed cadence.
async fn run_sweep_loop(hub: Arc<BroadcastHub>, interval_secs: u64, shutdown: Arc<Notify>) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let removed = hub.remove_stale_peers();
                if removed > 0 {
                    debug!("swept {} stale peers", removed);
                }
            }
            _ = shutdown.notified() => break,
        }
    }
    info!("registry sweeper stopped");
}
