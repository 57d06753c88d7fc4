//! Bidirectional frame relay.
//!
//! # Responsibilities
//! - Register the session so shutdown can reach it
//! - Run one copy loop per direction as its own task
//! - Tear down both sockets once either loop ends
//!
//! # Design Decisions
//! - Each loop owns the read half of one socket and the write half of the other
//! - The first loop to end closes the session; the other loop sees the state
//!   change and unwinds instead of being aborted
//! - The idle ceiling applies to the session, not to one direction: a read
//!   only times out once neither direction has moved a frame for that long
//! - A single write is bounded by the idle ceiling on its own

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Message as DownstreamMessage;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::watch;
use tokio::task::JoinError;
use tokio::time::{timeout, Instant};
use tokio_tungstenite::tungstenite::Message as UpstreamMessage;

use crate::observability::metrics;
use crate::relay::frame;
use crate::relay::registry::SessionRegistry;
use crate::relay::session::{ProxySession, SessionHandle, SessionState};

/// Upper bound on sending our own close frame during teardown.
const CLOSE_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Client → upstream.
    DownstreamToUpstream,
    /// Upstream → client.
    UpstreamToDownstream,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::DownstreamToUpstream => "downstream_to_upstream",
            Direction::UpstreamToDownstream => "upstream_to_downstream",
        }
    }
}

/// Why a copy loop stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PumpEnd {
    /// The read side reached end of stream.
    PeerClosed,
    ReadFailed(String),
    WriteFailed(String),
    /// No frame moved within the idle ceiling.
    IdleTimeout,
    /// The session was closed from outside the loop.
    SessionClosed,
    /// The loop's task panicked or was cancelled.
    Aborted(String),
}

impl fmt::Display for PumpEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PumpEnd::PeerClosed => write!(f, "peer closed"),
            PumpEnd::ReadFailed(e) => write!(f, "read failed: {}", e),
            PumpEnd::WriteFailed(e) => write!(f, "write failed: {}", e),
            PumpEnd::IdleTimeout => write!(f, "idle timeout"),
            PumpEnd::SessionClosed => write!(f, "session closed"),
            PumpEnd::Aborted(e) => write!(f, "aborted: {}", e),
        }
    }
}

/// Last time either direction of a session relayed a frame.
#[derive(Debug)]
pub(crate) struct Activity {
    started: Instant,
    /// Milliseconds after `started`.
    last: AtomicU64,
}

impl Activity {
    pub(crate) fn new() -> Self {
        Self {
            started: Instant::now(),
            last: AtomicU64::new(0),
        }
    }

    pub(crate) fn touch(&self) {
        let elapsed = self.started.elapsed().as_millis() as u64;
        self.last.fetch_max(elapsed, Ordering::Relaxed);
    }

    pub(crate) fn idle_for(&self) -> Duration {
        let last = Duration::from_millis(self.last.load(Ordering::Relaxed));
        self.started.elapsed().saturating_sub(last)
    }
}

/// Terminal reasons for both directions of a finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayOutcome {
    pub downstream_to_upstream: PumpEnd,
    pub upstream_to_downstream: PumpEnd,
}

/// Runs sessions and keeps the registry in sync with them.
#[derive(Debug)]
pub struct RelayEngine {
    registry: Arc<SessionRegistry>,
    idle_timeout: Duration,
}

impl RelayEngine {
    pub fn new(registry: Arc<SessionRegistry>, idle_timeout: Duration) -> Self {
        Self {
            registry,
            idle_timeout,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Relay frames until either direction ends or the session is closed,
    /// then close both sockets.
    pub async fn run(&self, session: ProxySession) -> RelayOutcome {
        let ProxySession {
            id,
            peer_addr,
            downstream,
            upstream,
        } = session;

        let (handle, state) = SessionHandle::new(id, peer_addr);
        if self.registry.register(handle.clone()) {
            metrics::record_session_opened();
        } else {
            tracing::info!(session_id = %id, "Proxy shutting down, closing new session");
            handle.close();
        }
        tracing::info!(session_id = %id, peer_addr = %peer_addr, "Session relaying");

        let (downstream_tx, downstream_rx) = downstream.split();
        let (upstream_tx, upstream_rx) = upstream.split();
        let activity = Arc::new(Activity::new());

        let mut inbound = tokio::spawn(pump(
            downstream_rx,
            upstream_tx,
            frame::to_upstream,
            state.clone(),
            Arc::clone(&activity),
            Direction::DownstreamToUpstream,
            self.idle_timeout,
        ));
        let mut outbound = tokio::spawn(pump(
            upstream_rx,
            downstream_tx,
            frame::to_downstream,
            state,
            activity,
            Direction::UpstreamToDownstream,
            self.idle_timeout,
        ));

        let (inbound_result, outbound_result) = tokio::select! {
            result = &mut inbound => {
                handle.close();
                (result, outbound.await)
            }
            result = &mut outbound => {
                handle.close();
                (inbound.await, result)
            }
        };

        let outcome = RelayOutcome {
            downstream_to_upstream: close_writer::<_, UpstreamMessage>(inbound_result).await,
            upstream_to_downstream: close_writer::<_, DownstreamMessage>(outbound_result).await,
        };

        if self.registry.remove(id).is_some() {
            metrics::record_session_closed();
        }
        tracing::info!(
            session_id = %id,
            peer_addr = %peer_addr,
            downstream_to_upstream = %outcome.downstream_to_upstream,
            upstream_to_downstream = %outcome.upstream_to_downstream,
            "Session closed"
        );
        outcome
    }
}

/// Copy frames from `reader` to `writer` until something ends the loop.
///
/// Returns the writer so the caller can close that socket.
pub(crate) async fn pump<R, W, In, Out, ReadErr>(
    mut reader: R,
    mut writer: W,
    convert: fn(In) -> Option<Out>,
    mut state: watch::Receiver<SessionState>,
    activity: Arc<Activity>,
    direction: Direction,
    idle: Duration,
) -> (W, PumpEnd)
where
    R: Stream<Item = Result<In, ReadErr>> + Unpin,
    W: Sink<Out> + Unpin,
    W::Error: fmt::Display,
    ReadErr: fmt::Display,
{
    loop {
        let remaining = idle.saturating_sub(activity.idle_for());
        let next = tokio::select! {
            biased;
            _ = closed(&mut state) => None,
            next = timeout(remaining, reader.next()) => Some(next),
        };

        let frame = match next {
            None => return (writer, PumpEnd::SessionClosed),
            // The other direction may have moved frames in the meantime.
            Some(Err(_)) if activity.idle_for() < idle => continue,
            Some(Err(_)) => return (writer, PumpEnd::IdleTimeout),
            Some(Ok(None)) => return (writer, PumpEnd::PeerClosed),
            Some(Ok(Some(Err(e)))) => return (writer, PumpEnd::ReadFailed(e.to_string())),
            Some(Ok(Some(Ok(frame)))) => frame,
        };

        let Some(frame) = convert(frame) else {
            continue;
        };

        let sent = tokio::select! {
            biased;
            _ = closed(&mut state) => None,
            sent = timeout(idle, writer.send(frame)) => Some(sent),
        };

        match sent {
            None => return (writer, PumpEnd::SessionClosed),
            Some(Err(_)) => return (writer, PumpEnd::IdleTimeout),
            Some(Ok(Err(e))) => return (writer, PumpEnd::WriteFailed(e.to_string())),
            Some(Ok(Ok(()))) => {
                activity.touch();
                metrics::record_frame(direction.as_str());
                tracing::trace!(direction = direction.as_str(), "Frame relayed");
            }
        }
    }
}

/// Resolves once the session is closed or its handle is gone.
async fn closed(state: &mut watch::Receiver<SessionState>) {
    let _ = state.wait_for(SessionState::is_closed).await;
}

/// Close the writer returned by a finished loop. Errors from an already
/// closed socket are ignored.
async fn close_writer<W, Item>(result: Result<(W, PumpEnd), JoinError>) -> PumpEnd
where
    W: Sink<Item> + Unpin,
{
    match result {
        Ok((mut writer, end)) => {
            let _ = timeout(CLOSE_GRACE, writer.close()).await;
            end
        }
        Err(e) => PumpEnd::Aborted(e.to_string()),
    }
}
