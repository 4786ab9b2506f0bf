//! # Relay Server Module
//!
//! The decoy's front door: a TCP listener that accepts attacker connections
//! and relays them byte for byte to the real backend, copying the attacker's
//! traffic into the capture pipeline along the way.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐      ┌──────────────┐      ┌─────────────┐
//! │ Attacker │─────▶│ RelayServer  │─────▶│   Backend   │
//! └──────────┘      │  (1 session  │      └─────────────┘
//!                   │   per conn)  │
//!                   └──────┬───────┘
//!                          │ tapped client bytes (mpsc)
//!                          ▼
//!                   capture pipeline
//! ```
//!
//! The backend is dialed per connection, inside the session task, so a slow
//! or dead backend never stalls the accept loop. A failed dial drops the
//! attacker silently; the listener keeps serving.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Notify};

use super::session::RelaySession;
use crate::capture::tap::TapChunk;
use crate::error_handling::types::RelayError;

pub struct RelayServer {
    listener: TcpListener,
    backend_addr: SocketAddr,
    tap: mpsc::Sender<TapChunk>,
}

impl RelayServer {
    /// Binds the decoy endpoint. Port 0 picks an ephemeral port.
    pub async fn bind(
        listen_addr: SocketAddr,
        backend_addr: SocketAddr,
        tap: mpsc::Sender<TapChunk>,
    ) -> Result<Self, RelayError> {
        let listener = TcpListener::bind(listen_addr)
            .await
            .map_err(RelayError::BindError)?;
        Ok(Self {
            listener,
            backend_addr,
            tap,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts and relays connections until shutdown.
    pub async fn run(self, shutdown: Arc<Notify>) -> Result<(), RelayError> {
        let local = self.listener.local_addr().map_err(RelayError::BindError)?;
        info!(
            "decoy endpoint on {}, forwarding to {}",
            local, self.backend_addr
        );

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((client_stream, client_addr)) => {
                            info!("accepted connection from {}", client_addr);
                            let backend_addr = self.backend_addr;
                            let tap = self.tap.clone();
                            tokio::spawn(async move {
                                let backend_stream = match TcpStream::connect(backend_addr).await {
                                    Ok(stream) => stream,
                                    Err(e) => {
                                        warn!(
                                            "backend {} unreachable, dropping {}: {}",
                                            backend_addr, client_addr, e
                                        );
                                        return;
                                    }
                                };
                                let session = RelaySession::new(
                                    client_stream,
                                    backend_stream,
                                    client_addr,
                                    tap,
                                );
                                let session_id = session.id();
                                if let Err(e) = session.run().await {
                                    debug!("[{:?}] session ended with error: {}", session_id, e);
                                }
                            });
                        }
                        Err(e) => warn!("accept failed: {}", e),
                    }
                }
                _ = shutdown.notified() => {
                    info!("decoy listener stopped");
                    break;
                }
            }
        }
        Ok(())
    }
}
