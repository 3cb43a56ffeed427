//! Reconnect supervisor: one task per connection, alive until close.

use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::session;
use super::state::{closed, transition, ConnectionState};
use super::{ReconnectRequest, Shared};
use crate::error::{Result, TsdbError};

/// Consume reconnect requests: wait, dial, start a session.
///
/// A failed dial re-enqueues the next attempt on the same queue. A new dial
/// only starts after the previous session has fully ended.
pub(super) async fn run(shared: Arc<Shared>, mut requests: mpsc::Receiver<ReconnectRequest>) {
    let mut state = shared.state.subscribe();
    let mut current: Option<JoinHandle<()>> = None;
    let mut generation = 0u64;

    loop {
        let request = tokio::select! {
            biased;
            _ = closed(&mut state) => break,
            request = requests.recv() => request,
        };

        let attempt = match request {
            Some(ReconnectRequest::Attempt(attempt)) => attempt,
            Some(ReconnectRequest::Stop) | None => break,
        };

        if let Some(previous) = current.take() {
            let _ = previous.await;
        }

        if !transition(&shared.state, ConnectionState::Connecting) {
            break;
        }

        let delay = shared.config.reconnect.delay(attempt);
        debug!(attempt, ?delay, "Waiting before dial");
        let dialed = tokio::select! {
            biased;
            _ = closed(&mut state) => break,
            dialed = async {
                tokio::time::sleep(delay).await;
                dial(&shared).await
            } => dialed,
        };

        match dialed {
            Ok(stream) => {
                generation += 1;
                shared.metrics.record_connect();
                if !transition(&shared.state, ConnectionState::Connected) {
                    break;
                }
                info!(attempt, generation, "Connection attempt successful");
                current = Some(session::start(Arc::clone(&shared), stream, generation));
            }
            Err(e) => {
                shared.metrics.record_dial_failure();
                warn!(attempt, error = %e, "TSDB connection error");
                if !transition(&shared.state, ConnectionState::Disconnected) {
                    break;
                }
                let next = ReconnectRequest::Attempt(attempt.saturating_add(1));
                if let Err(e) = shared.reconnect_tx.try_send(next) {
                    debug!(error = %e, "Reconnect request not queued");
                }
            }
        }
    }

    info!("Reconnection job stopping");
    if let Some(session) = current.take() {
        let _ = session.await;
    }
}

async fn dial(shared: &Shared) -> Result<TcpStream> {
    shared.metrics.record_dial_attempt();
    match tokio::time::timeout(shared.config.dial_timeout, TcpStream::connect(&shared.address)).await
    {
        Ok(Ok(stream)) => {
            if let Err(e) = stream.set_nodelay(true) {
                debug!(error = %e, "Failed to set TCP_NODELAY");
            }
            Ok(stream)
        }
        Ok(Err(e)) => Err(TsdbError::Connection(e.to_string())),
        Err(_) => Err(TsdbError::Timeout(format!(
            "dial to {} exceeded {:?}",
            shared.address, shared.config.dial_timeout
        ))),
    }
}
