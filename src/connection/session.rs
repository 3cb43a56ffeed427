//! Write-drain and read-drain tasks for one connected socket.
//!
//! A session is one successful dial. The socket is split: the write half
//! belongs to the write-drain task, the read half to the read-drain task.
//! The read-drain task owns the session's teardown: it stops the writer,
//! takes the write half back and drops the reunited socket before asking the
//! supervisor to reconnect. That keeps a single open socket per connection.

use bytes::Bytes;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument};

use super::state::{closed, transition, ConnectionState};
use super::{Outbound, ReconnectRequest, Shared};

const READ_BUFFER_SIZE: usize = 4096;

/// Start both drain tasks for `stream`.
///
/// The returned handle completes once the whole session (reader and writer)
/// has ended and the socket is closed.
pub(super) fn start(shared: Arc<Shared>, stream: TcpStream, generation: u64) -> JoinHandle<()> {
    let (read_half, write_half) = stream.into_split();
    let (stop_tx, stop_rx) = oneshot::channel();
    let span = tracing::info_span!("session", generation);

    let writer = tokio::spawn(
        drain_writes(Arc::clone(&shared), write_half, stop_rx).instrument(span.clone()),
    );
    tokio::spawn(drain_reads(shared, read_half, stop_tx, writer).instrument(span))
}

/// Dequeue payloads and write them to the socket in order.
///
/// Stops on the `Shutdown` sentinel, on the stop signal from the reader, on
/// close, or on the first failed write. A stop or close arriving mid-write
/// abandons the rest of that payload. The write half is handed back so the
/// reader decides when the socket is closed.
async fn drain_writes(
    shared: Arc<Shared>,
    mut sink: OwnedWriteHalf,
    mut stop_rx: oneshot::Receiver<()>,
) -> OwnedWriteHalf {
    let mut state = shared.state.subscribe();
    let mut queue = shared.outbound.lock().await;
    debug!("Write drain started");

    loop {
        let next = tokio::select! {
            biased;
            _ = &mut stop_rx => {
                debug!("Write drain stopped by reader");
                break;
            }
            _ = closed(&mut state) => {
                debug!("Write drain stopped by close");
                break;
            }
            next = queue.recv() => next,
        };

        let payload: Bytes = match next {
            Some(Outbound::Payload(payload)) => payload,
            Some(Outbound::Shutdown) | None => {
                debug!("Write drain received shutdown");
                break;
            }
        };

        // Close and the reader's stop also abandon a write that is in progress.
        let written = tokio::select! {
            biased;
            _ = &mut stop_rx => {
                debug!(bytes = payload.len(), "Write abandoned, stopped by reader");
                break;
            }
            _ = closed(&mut state) => {
                debug!(bytes = payload.len(), "Write abandoned, connection closed");
                break;
            }
            written = tokio::time::timeout(shared.config.write_deadline, sink.write_all(&payload)) => written,
        };

        match written {
            Ok(Ok(())) => shared.metrics.record_write(payload.len()),
            Ok(Err(e)) => {
                shared.metrics.record_write_error();
                error!(error = %e, bytes = payload.len(), "TSDB write error");
                break;
            }
            Err(_) => {
                shared.metrics.record_write_error();
                error!(
                    deadline = ?shared.config.write_deadline,
                    bytes = payload.len(),
                    "TSDB write deadline exceeded"
                );
                break;
            }
        }
    }

    sink
}

/// Read until EOF or error, then tear the session down and re-arm reconnection.
///
/// The backend never sends unsolicited data; anything received is an error
/// banner and gets logged.
async fn drain_reads(
    shared: Arc<Shared>,
    mut source: OwnedReadHalf,
    stop_tx: oneshot::Sender<()>,
    writer: JoinHandle<OwnedWriteHalf>,
) {
    let mut state = shared.state.subscribe();
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    let closed_by_user = loop {
        let read = tokio::select! {
            biased;
            _ = closed(&mut state) => break true,
            read = source.read(&mut buf) => read,
        };

        match read {
            Ok(0) => {
                warn!("TSDB closed the connection");
                break false;
            }
            Ok(n) => {
                let banner = String::from_utf8_lossy(&buf[..n]);
                error!(response = %banner.trim_end(), "Database returned error");
            }
            Err(e) => {
                error!(error = %e, "Read error");
                break false;
            }
        }
    };

    // Stop the writer and take its half back; the writer may already be gone.
    let _ = stop_tx.send(());
    match writer.await {
        Ok(sink) => match source.reunite(sink) {
            Ok(stream) => drop(stream),
            Err(e) => warn!(error = %e, "Socket halves did not match"),
        },
        Err(e) => error!(error = %e, "Write drain task failed"),
    }

    if closed_by_user {
        info!("Session closed");
        return;
    }

    shared.metrics.record_disconnect();
    if !transition(&shared.state, ConnectionState::Disconnected) {
        return;
    }

    if let Err(e) = shared.reconnect_tx.try_send(ReconnectRequest::Attempt(0)) {
        debug!(error = %e, "Reconnect request not queued");
    }
}
