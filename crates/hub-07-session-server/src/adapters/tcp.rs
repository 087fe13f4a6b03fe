//! Newline-delimited JSON-RPC over TCP.
//!
//! One reader task per connection hands each line to its own request task;
//! one writer task drains the session's outgoing queue. The connection
//! ends on EOF, an oversized line, a server-side close or shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::domain::errors::{RpcError, SessionError};
use crate::domain::protocol::response;
use crate::service::SessionManager;
use crate::session::Session;

/// Requests of one connection running at once before reading pauses.
const MAX_IN_FLIGHT: usize = 16;

/// Accept connections until shutdown.
pub async fn serve(
    manager: Arc<SessionManager>,
    listener: TcpListener,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), SessionError> {
    let local = listener.local_addr()?;
    info!(address = %local, "Session server listening");
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(err) => {
                        warn!(error = %err, "Accept failed");
                        continue;
                    }
                };
                let manager = manager.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    if let Err(err) = run_connection(manager, stream, peer, shutdown).await {
                        debug!(peer = %peer, error = %err, "Connection ended");
                    }
                });
            }
            _ = shutdown.changed() => break,
        }
    }
    info!(sessions = manager.session_count(), "Session server stopped accepting");
    Ok(())
}

/// Bind the configured address and serve on it.
pub async fn listen(
    manager: Arc<SessionManager>,
    shutdown: watch::Receiver<bool>,
) -> Result<(), SessionError> {
    let listener = TcpListener::bind(manager.config().listen).await?;
    serve(manager, listener, shutdown).await
}

async fn run_connection(
    manager: Arc<SessionManager>,
    stream: TcpStream,
    peer: SocketAddr,
    shutdown: watch::Receiver<bool>,
) -> Result<(), SessionError> {
    let _ = stream.set_nodelay(true);
    let (read_half, write_half) = stream.into_split();
    let (session, outgoing) = manager.open_session(peer.to_string());
    let writer = tokio::spawn(write_lines(write_half, outgoing, session.id));

    let result = read_lines(&manager, &session, BufReader::new(read_half), shutdown).await;

    manager.close_session(session.id);
    drop(session);
    if let Err(err) = writer.await {
        error!(error = %err, "Session writer panicked");
    }
    result
}

/// Read request lines and run each on its own task, so a slow request
/// neither blocks the ones behind it nor hides a disconnect. In-flight
/// requests are aborted when the connection ends.
async fn read_lines<R>(
    manager: &Arc<SessionManager>,
    session: &Arc<Session>,
    mut reader: BufReader<R>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), SessionError>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let limit = manager.config().max_receive;
    let mut closed = session.closed();
    let mut in_flight = JoinSet::new();
    let mut buf = Vec::new();
    loop {
        // A cancelled read keeps its partial line in `buf`.
        let remaining = (limit + 1).saturating_sub(buf.len()) as u64;
        let mut limited = (&mut reader).take(remaining);
        let read = tokio::select! {
            read = limited.read_until(b'\n', &mut buf), if in_flight.len() < MAX_IN_FLIGHT => read?,
            Some(done) = in_flight.join_next() => {
                if let Err(err) = done {
                    if err.is_panic() {
                        error!(session = session.id, error = %err, "Request task panicked");
                    }
                }
                continue;
            }
            _ = closed.changed() => return Err(SessionError::Closed),
            _ = shutdown.changed() => return Ok(()),
        };
        if read == 0 {
            return Ok(());
        }
        if buf.last() != Some(&b'\n') && buf.len() > limit {
            warn!(session = session.id, size = buf.len(), "Oversized request");
            return Err(SessionError::OversizedMessage {
                size: buf.len(),
                limit,
            });
        }

        let line = match String::from_utf8(std::mem::take(&mut buf)) {
            Ok(line) => line,
            Err(err) => {
                debug!(session = session.id, "Request is not UTF-8");
                session.send(&response(Value::Null, Err(RpcError::parse_error(err))))?;
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let manager = manager.clone();
        let session = session.clone();
        in_flight.spawn(async move {
            if let Some(reply) = manager.handle_line(&session, line.trim()).await {
                if let Err(err) = session.send_line(reply) {
                    debug!(session = session.id, error = %err, "Reply dropped");
                }
            }
            if session.wants_close() {
                session.close();
            }
        });
    }
}

async fn write_lines<W>(mut writer: W, mut outgoing: mpsc::Receiver<String>, id: u64)
where
    W: tokio::io::AsyncWrite + Unpin,
{
    while let Some(line) = outgoing.recv().await {
        if let Err(err) = writer.write_all(line.as_bytes()).await {
            debug!(session = id, error = %err, "Write failed");
            return;
        }
    }
    let _ = writer.shutdown().await;
}
