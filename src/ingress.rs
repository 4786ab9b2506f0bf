pub mod announcer;
pub mod bus_listener;

pub use announcer::run_announcer;
pub use bus_listener::run_bus_listener;

/// Topic namespace peers announce themselves under. Everything outside this
/// prefix is treated as capturable traffic.
pub const PEER_TOPIC_PREFIX: &str = "rucher/peers/";

pub fn peer_topic(node_id: &str) -> String {
    format!("{}{}", PEER_TOPIC_PREFIX, node_id)
}
