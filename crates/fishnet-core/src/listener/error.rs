//! Listener error taxonomy.
//!
//! Every failure carries its kind and, where the OS was involved, the raw
//! platform error code.  Rendering those into human-readable diagnostics is the
//! caller's job; this crate never interprets the codes.

use std::io;
use std::net::SocketAddrV4;

use thiserror::Error;

use super::ListenerState;
use crate::platform::PlatformError;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The process-wide networking subsystem could not be started.
    #[error("networking subsystem startup failed (os error {code})")]
    NetworkingInit { code: i32 },

    /// The OS refused to allocate a socket (e.g. descriptor exhaustion).
    #[error("socket creation failed (os error {code})")]
    SocketCreate {
        code: i32,
        #[source]
        source: io::Error,
    },

    /// The listening socket could not be switched to non-blocking mode.
    #[error("could not make listening socket non-blocking (os error {code})")]
    NonBlockingSetup { code: i32 },

    /// The host is neither the wildcard `0.0.0.0` nor an IPv4 literal.
    #[error("invalid IPv4 address: {host:?}")]
    InvalidAddress { host: String },

    /// `bind` failed (address in use, permission denied, ...).
    #[error("bind failed on {addr} (os error {code})")]
    Bind {
        addr: SocketAddrV4,
        code: i32,
        #[source]
        source: io::Error,
    },

    /// `listen` failed.
    #[error("listen failed on {addr} (os error {code})")]
    Listen {
        addr: SocketAddrV4,
        code: i32,
        #[source]
        source: io::Error,
    },

    /// `accept` failed for a reason other than "no pending connection".
    /// The listener stays usable.
    #[error("accept failed (os error {code})")]
    Accept {
        code: i32,
        #[source]
        source: io::Error,
    },

    /// Releasing the listening socket failed during teardown.
    #[error("closing listening socket failed (os error {code})")]
    Close { code: i32 },

    /// The operation is not valid in the listener's current state.
    #[error("cannot {operation} while listener is {state}")]
    InvalidState {
        operation: &'static str,
        state: ListenerState,
    },
}

/// Field-less discriminant of [`ListenerError`], for matching and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NetworkingInit,
    SocketCreate,
    NonBlockingSetup,
    InvalidAddress,
    Bind,
    Listen,
    Accept,
    Close,
    InvalidState,
}

impl ListenerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NetworkingInit { .. } => ErrorKind::NetworkingInit,
            Self::SocketCreate { .. } => ErrorKind::SocketCreate,
            Self::NonBlockingSetup { .. } => ErrorKind::NonBlockingSetup,
            Self::InvalidAddress { .. } => ErrorKind::InvalidAddress,
            Self::Bind { .. } => ErrorKind::Bind,
            Self::Listen { .. } => ErrorKind::Listen,
            Self::Accept { .. } => ErrorKind::Accept,
            Self::Close { .. } => ErrorKind::Close,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
        }
    }

    /// The platform error code, for kinds that originate in the OS.
    pub fn os_code(&self) -> Option<i32> {
        match self {
            Self::NetworkingInit { code }
            | Self::SocketCreate { code, .. }
            | Self::NonBlockingSetup { code }
            | Self::Bind { code, .. }
            | Self::Listen { code, .. }
            | Self::Accept { code, .. }
            | Self::Close { code } => Some(*code),
            Self::InvalidAddress { .. } | Self::InvalidState { .. } => None,
        }
    }

    /// `true` if the listener can keep being used after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Accept { .. })
    }

    pub(crate) fn accept(source: io::Error) -> Self {
        Self::Accept {
            code: os_code(&source),
            source,
        }
    }

    pub(crate) fn accept_platform(err: PlatformError) -> Self {
        Self::Accept {
            code: err.code,
            source: io::Error::from_raw_os_error(err.code),
        }
    }
}

/// Raw OS code of `err`, or 0 when the error did not come from the OS.
pub(crate) fn os_code(err: &io::Error) -> i32 {
    err.raw_os_error().unwrap_or(0)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
