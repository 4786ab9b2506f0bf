use crate::error_handling::types::ConfigError;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

/// Runtime configuration for a decoy node.
///
/// Every field has a default so an empty (or missing-field) TOML file yields a
/// node that listens on the conventional broker-facing port and talks to a
/// broker on localhost. The configuration is deliberately flat: one node, one
/// decoy listener, one bus connection.
///
/// # Fields Overview
///
/// - `node_id`: Identity this node announces on the shared bus
/// - `listen_address`: Address the decoy relay listener binds to
/// - `backend_address`: Real service the relay forwards captured traffic to
/// - `bus_host` / `bus_port`: MQTT bus the collector subscribes to
/// - `api_port`: HTTP/websocket observer port
/// - `announce_interval_secs`: Period between self announcements on the bus
/// - `sweep_interval_secs`: Period between staleness sweeps of the peer registry
/// - `stale_after_secs`: Age at which a silent peer is considered gone
/// - `store_capacity`: Maximum retained attack records before FIFO eviction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_node_id")]
    pub node_id: String,

    /// Where the decoy endpoint accepts attacker connections.
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Where relayed traffic is forwarded. Usually the real broker.
    #[serde(default = "default_backend_address")]
    pub backend_address: String,

    #[serde(default = "default_bus_host")]
    pub bus_host: String,

    #[serde(default = "default_bus_port")]
    pub bus_port: u16,

    /// Port for the query API and the live websocket feed.
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    #[serde(default = "default_announce_interval")]
    pub announce_interval_secs: u64,

    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Must be strictly greater than `sweep_interval_secs`, otherwise a peer
    /// could expire before a single missed announcement.
    #[serde(default = "default_stale_after")]
    pub stale_after_secs: u64,

    #[serde(default = "default_store_capacity")]
    pub store_capacity: usize,
}

fn default_node_id() -> String {
    String::from("LOCAL-01")
}

fn default_listen_address() -> String {
    String::from("0.0.0.0:1884")
}

fn default_backend_address() -> String {
    String::from("127.0.0.1:1883")
}

fn default_bus_host() -> String {
    String::from("127.0.0.1")
}

fn default_bus_port() -> u16 {
    1883
}

fn default_api_port() -> u16 {
    8000
}

fn default_announce_interval() -> u64 {
    10
}

fn default_sweep_interval() -> u64 {
    5
}

fn default_stale_after() -> u64 {
    30
}

fn default_store_capacity() -> usize {
    100
}

impl Default for Config {
    fn default() -> Self {
        Config {
            node_id: default_node_id(),
            listen_address: default_listen_address(),
            backend_address: default_backend_address(),
            bus_host: default_bus_host(),
            bus_port: default_bus_port(),
            api_port: default_api_port(),
            announce_interval_secs: default_announce_interval(),
            sweep_interval_secs: default_sweep_interval(),
            stale_after_secs: default_stale_after(),
            store_capacity: default_store_capacity(),
        }
    }
}

impl Config {
    /// Reads and validates a configuration file.
    ///
    /// Missing fields fall back to their defaults; a file that is present but
    /// unreadable or syntactically broken is an error, as is any value the
    /// node could not run with.
    pub fn from_file(path: &Path) -> Result<Config, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&raw).map_err(|e| ConfigError::TomlError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every constraint the rest of the node relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node_id.trim().is_empty() {
            return Err(ConfigError::NodeIdEmpty);
        }
        if self.store_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.announce_interval_secs == 0 || self.sweep_interval_secs == 0 {
            return Err(ConfigError::BadIntervals(String::from(
                "announce and sweep intervals must be at least 1 second",
            )));
        }
        if self.stale_after_secs <= self.sweep_interval_secs {
            return Err(ConfigError::BadIntervals(format!(
                "staleness threshold ({}s) must exceed the sweep interval ({}s)",
                self.stale_after_secs, self.sweep_interval_secs
            )));
        }
        self.listen_addr()?;
        self.backend_addr()?;
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.listen_address
            .parse()
            .map_err(|_| ConfigError::BadAddress(self.listen_address.clone()))
    }

    pub fn backend_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.backend_address
            .parse()
            .map_err(|_| ConfigError::BadAddress(self.backend_address.clone()))
    }
}
