//! AcceptLoop: polls a listener for new clients until told to stop.
//!
//! The core listener never blocks, so the loop decides the pacing: each tick
//! it admits the clients already waiting (at most [`MAX_ACCEPTS_PER_TICK`]),
//! then sleeps for the configured poll interval.  The cap keeps a steady stream
//! of connects from starving the shutdown check.
//!
//! # Error policy
//!
//! | Outcome                         | Effect                              |
//! |---------------------------------|-------------------------------------|
//! | client accepted                 | counted                             |
//! | nothing pending                 | counted as an idle poll             |
//! | recoverable accept error        | counted, logged at `warn`, retried next tick |
//! | listener not listening anymore  | loop ends with [`ServeError`]       |

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use fishnet_core::{AcceptOutcome, ListenerError, PeerInfo, TcpListener};
use thiserror::Error;
use tracing::{debug, warn};

/// Most accepts performed by one [`AcceptLoop::drain_pending`] call.
pub const MAX_ACCEPTS_PER_TICK: usize = 64;

/// Error type for the accept loop.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("listener stopped accepting: {0}")]
    ListenerUnavailable(#[source] ListenerError),
}

/// Anything the loop can pull new connections from.
#[cfg_attr(test, mockall::automock)]
pub trait ConnectionSource {
    /// Admits at most one pending client without blocking.
    fn accept(&mut self) -> Result<AcceptOutcome, ListenerError>;

    /// Number of connections currently held.
    fn active_connections(&self) -> usize;
}

impl ConnectionSource for TcpListener {
    fn accept(&mut self) -> Result<AcceptOutcome, ListenerError> {
        TcpListener::accept(self)
    }

    fn active_connections(&self) -> usize {
        self.connections().len()
    }
}

/// Running counters of the loop.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AcceptStats {
    pub accepted: u64,
    pub idle_polls: u64,
    pub errors: u64,
}

/// What a single poll did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollResult {
    Accepted(PeerInfo),
    Idle,
    Failed,
}

/// The accept loop use case.
pub struct AcceptLoop<S: ConnectionSource> {
    source: S,
    stats: AcceptStats,
}

impl<S: ConnectionSource> AcceptLoop<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            stats: AcceptStats::default(),
        }
    }

    /// Performs one accept attempt and records its outcome.
    ///
    /// # Errors
    ///
    /// Returns [`ServeError::ListenerUnavailable`] if the source reports a
    /// non-recoverable error (e.g. it is no longer listening).
    pub fn poll_once(&mut self) -> Result<PollResult, ServeError> {
        match self.source.accept() {
            Ok(AcceptOutcome::Accepted(peer)) => {
                self.stats.accepted += 1;
                debug!(
                    connection_id = %peer.id,
                    active = self.source.active_connections(),
                    "client admitted"
                );
                Ok(PollResult::Accepted(peer))
            }
            Ok(AcceptOutcome::NoPendingConnection) => {
                self.stats.idle_polls += 1;
                Ok(PollResult::Idle)
            }
            Err(e) if e.is_recoverable() => {
                self.stats.errors += 1;
                warn!(os_code = ?e.os_code(), "accept failed: {e}");
                Ok(PollResult::Failed)
            }
            Err(e) => Err(ServeError::ListenerUnavailable(e)),
        }
    }

    /// Admits clients already waiting.  Returns how many were admitted.
    ///
    /// Stops at the first idle poll or recoverable error, so a persistent
    /// accept failure (e.g. descriptor exhaustion) cannot spin the loop, and
    /// after [`MAX_ACCEPTS_PER_TICK`] clients.
    ///
    /// # Errors
    ///
    /// See [`AcceptLoop::poll_once`].
    pub fn drain_pending(&mut self) -> Result<usize, ServeError> {
        let mut admitted = 0;
        while admitted < MAX_ACCEPTS_PER_TICK {
            match self.poll_once()? {
                PollResult::Accepted(_) => admitted += 1,
                PollResult::Idle | PollResult::Failed => break,
            }
        }
        Ok(admitted)
    }

    /// Polls until `running` is cleared, sleeping `poll_interval` between ticks.
    ///
    /// # Errors
    ///
    /// See [`AcceptLoop::poll_once`].
    pub async fn run(
        &mut self,
        running: &AtomicBool,
        poll_interval: Duration,
    ) -> Result<AcceptStats, ServeError> {
        while running.load(Ordering::Relaxed) {
            self.drain_pending()?;
            tokio::time::sleep(poll_interval).await;
        }
        Ok(self.stats)
    }

    pub fn stats(&self) -> AcceptStats {
        self.stats
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Ends the loop and returns the source, e.g. to close the listener.
    pub fn into_source(self) -> S {
        self.source
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
