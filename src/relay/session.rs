use std::io;
use std::net::SocketAddr;

use log::{debug, trace};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::capture::tap::TapChunk;
use crate::error_handling::types::RelayError;

/// Copies attacker traffic off the forward path of one session.
///
/// Offers are fire and forget: a full capture queue loses the chunk, never
/// delays the relay.
pub(crate) struct TapHandle {
    session_id: Uuid,
    peer_addr: SocketAddr,
    chunks: mpsc::Sender<TapChunk>,
    dropped: u64,
}

impl TapHandle {
    pub(crate) fn new(
        session_id: Uuid,
        peer_addr: SocketAddr,
        chunks: mpsc::Sender<TapChunk>,
    ) -> Self {
        Self {
            session_id,
            peer_addr,
            chunks,
            dropped: 0,
        }
    }

    fn offer(&mut self, data: &[u8]) {
        let preview = &data[..std::cmp::min(data.len(), 64)];
        trace!(
            "[{:?}] C->B {} bytes: {}{}",
            self.session_id,
            data.len(),
            String::from_utf8_lossy(preview),
            if data.len() > 64 { " ..." } else { "" }
        );

        let chunk = TapChunk {
            session_id: self.session_id,
            peer_addr: self.peer_addr,
            data: data.to_vec(),
        };
        if self.chunks.try_send(chunk).is_err() {
            self.dropped += 1;
            debug!(
                "[{:?}] capture queue full, {} chunks dropped so far",
                self.session_id, self.dropped
            );
        }
    }
}

/// Pumps bytes from `src` to `dst` until EOF or error, returning the total
/// forwarded. EOF shuts down `dst` so the far side sees the close.
pub(crate) async fn forward_stream<R, W>(
    src: &mut R,
    dst: &mut W,
    mut tap: Option<TapHandle>,
) -> Result<u64, io::Error>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; 16 * 1024];
    let mut total: u64 = 0;
    loop {
        let n = src.read(&mut buf).await?;
        if n == 0 {
            let _ = dst.shutdown().await; // signal EOF to the far side
            break Ok(total);
        }
        if let Some(tap) = tap.as_mut() {
            tap.offer(&buf[..n]);
        }
        dst.write_all(&buf[..n]).await?;
        total += n as u64;
    }
}

/// One relayed connection between an attacker and the backend.
///
/// Two tasks pump the two directions. Only attacker bytes are tapped; the
/// backend's replies pass through untouched. The first direction to end, for
/// any reason, ends the whole session: the remaining task is aborted, which
/// drops the stream halves it owns and closes both sockets.
pub struct RelaySession {
    id: Uuid,
    client_stream: TcpStream,
    backend_stream: TcpStream,
    client_addr: SocketAddr,
    tap: mpsc::Sender<TapChunk>,
}

impl RelaySession {
    pub fn new(
        client_stream: TcpStream,
        backend_stream: TcpStream,
        client_addr: SocketAddr,
        tap: mpsc::Sender<TapChunk>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            client_stream,
            backend_stream,
            client_addr,
            tap,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn run(self) -> Result<(), RelayError> {
        let RelaySession {
            id,
            client_stream,
            backend_stream,
            client_addr,
            tap,
        } = self;

        let (cr, cw) = client_stream.into_split();
        let (br, bw) = backend_stream.into_split();

        trace!("[{:?}] starting relay session for {}", id, client_addr);

        let mut set = JoinSet::new();

        // Client -> Backend, tapped
        {
            let tap = TapHandle::new(id, client_addr, tap);
            set.spawn(async move {
                let mut cr = cr;
                let mut bw = bw;
                let res = forward_stream(&mut cr, &mut bw, Some(tap)).await;
                match &res {
                    Ok(n) => trace!("[{:?}] C->B ended after {} bytes", id, n),
                    Err(e) => trace!("[{:?}] C->B error: {}", id, e),
                }
                res
            });
        }

        // Backend -> Client
        {
            set.spawn(async move {
                let mut br = br;
                let mut cw = cw;
                let res = forward_stream(&mut br, &mut cw, None).await;
                match &res {
                    Ok(n) => trace!("[{:?}] B->C ended after {} bytes", id, n),
                    Err(e) => trace!("[{:?}] B->C error: {}", id, e),
                }
                res
            });
        }

        let first = set.join_next().await;
        // Aborting the surviving direction drops its halves and with them
        // both sockets, releasing its blocked read.
        set.shutdown().await;

        debug!("[{:?}] relay session for {} closed", id, client_addr);

        match first {
            Some(Ok(Ok(_))) | None => Ok(()),
            Some(Ok(Err(e))) => Err(RelayError::StreamError(e)),
            Some(Err(e)) => Err(RelayError::StreamError(io::Error::new(
                io::ErrorKind::Other,
                e,
            ))),
        }
    }
}
