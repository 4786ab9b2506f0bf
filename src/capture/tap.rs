use crate::hub::broadcast_hub::BroadcastHub;
use log::{debug, info};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use uuid::Uuid;

/// Depth of the queue between relay sessions and the pump. Relay sessions
/// drop chunks rather than wait when the pump falls behind.
pub const TAP_QUEUE_DEPTH: usize = 256;

/// One chunk of relayed traffic copied off the forward path.
#[derive(Debug, Clone)]
pub struct TapChunk {
    pub session_id: Uuid,
    pub peer_addr: SocketAddr,
    pub data: Vec<u8>,
}

/// Builds the origin channel name for a tapped chunk.
pub fn tap_topic(peer_addr: &SocketAddr) -> String {
    format!("relay/{}", peer_addr)
}

/// Drains tapped relay traffic into the capture pipeline.
///
/// Every chunk becomes one attack record attributed to this node, with the
/// peer address as origin channel. Bytes are re-encoded lossily; the decoy
/// front-ends a text protocol, so mangled sequences only ever come from
/// malformed or hostile input, which is exactly what should be on display.
pub async fn run_tap_pump(
    mut chunks: mpsc::Receiver<TapChunk>,
    hub: Arc<BroadcastHub>,
    shutdown: Arc<Notify>,
) {
    loop {
        tokio::select! {
            chunk = chunks.recv() => {
                let chunk = match chunk {
                    Some(c) => c,
                    None => break,
                };
                let payload = String::from_utf8_lossy(&chunk.data);
                let record = hub.record_attack(&tap_topic(&chunk.peer_addr), &payload);
                debug!(
                    "[{}] tapped {} bytes from {} as record {}",
                    chunk.session_id,
                    chunk.data.len(),
                    chunk.peer_addr,
                    record.id
                );
            }
            _ = shutdown.notified() => break,
        }
    }
    info!("capture tap pump stopped");
}
