//! Non-blocking TCP listener.
//!
//! # Lifecycle (for beginners)
//!
//! ```text
//! Uninitialized ──open()──► Binding ──► Listening ──close()──► Closed
//!                              │
//!                              └──(any setup error)──► Failed
//! ```
//!
//! - `Uninitialized`: created with [`TcpListener::new`]; no OS resource yet.
//! - `Binding`: `open()` is starting the subsystem, creating, configuring and
//!   binding the socket.
//! - `Listening`: the socket is bound, listening and non-blocking.  This is the
//!   only state in which [`TcpListener::accept`] may be called.
//! - `Failed`: a setup step failed.  Absorbing: every later operation returns
//!   [`ListenerError::InvalidState`] without touching the OS.
//! - `Closed`: torn down by [`TcpListener::close`] or drop.
//!
//! # Polling
//!
//! The listening socket is non-blocking, so `accept` returns immediately.
//! "Nobody is waiting" is reported as [`AcceptOutcome::NoPendingConnection`],
//! not as an error, so a caller can poll in a loop, on a timer, or after an
//! external readiness notification.

use std::fmt;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use socket2::{Domain, Socket, Type};
use tracing::{debug, info, warn};

use crate::net::{NetworkSubsystem, SocketHandle};
use crate::platform::{self, SocketPlatform};

pub mod error;
pub mod registry;

use error::{os_code, ListenerError};
use registry::{ConnectionId, ConnectionRegistry};

/// Host string that binds every local interface.
pub const WILDCARD_HOST: &str = "0.0.0.0";

// ── Configuration ─────────────────────────────────────────────────────────────

/// Immutable listener settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListenerConfig {
    /// IPv4 literal to bind, or `"0.0.0.0"` for all interfaces.
    #[serde(default = "default_host")]
    pub host: String,
    /// TCP port; `0` lets the OS choose.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Advisory capacity hint for the connection registry.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Length of the OS queue of not-yet-accepted connections.
    #[serde(default = "default_backlog")]
    pub backlog: i32,
}

fn default_host() -> String {
    WILDCARD_HOST.to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_max_connections() -> usize {
    100
}
fn default_backlog() -> i32 {
    16
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_connections: default_max_connections(),
            backlog: default_backlog(),
        }
    }
}

impl ListenerConfig {
    pub fn new(host: impl Into<String>, port: u16, max_connections: usize, backlog: i32) -> Self {
        Self {
            host: host.into(),
            port,
            max_connections,
            backlog,
        }
    }

    /// Resolves `host`/`port` into the address to bind.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::InvalidAddress`] if `host` is not the wildcard
    /// and not a well-formed IPv4 literal.
    pub fn bind_address(&self) -> Result<SocketAddrV4, ListenerError> {
        let ip = if self.host == WILDCARD_HOST {
            Ipv4Addr::UNSPECIFIED
        } else {
            self.host
                .parse::<Ipv4Addr>()
                .map_err(|_| ListenerError::InvalidAddress {
                    host: self.host.clone(),
                })?
        };
        Ok(SocketAddrV4::new(ip, self.port))
    }
}

// ── State and outcomes ────────────────────────────────────────────────────────

/// Where a listener is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerState {
    Uninitialized,
    Binding,
    Listening,
    Failed,
    Closed,
}

impl fmt::Display for ListenerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Binding => "binding",
            Self::Listening => "listening",
            Self::Failed => "failed",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Identity and remote endpoint of a newly accepted client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerInfo {
    /// Registry key of the new connection.
    pub id: ConnectionId,
    /// Remote address and port.
    pub address: SocketAddr,
}

/// Result of one non-blocking accept attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptOutcome {
    /// A client was admitted into the registry.
    Accepted(PeerInfo),
    /// The OS backlog was empty.
    NoPendingConnection,
}

// ── Listener ──────────────────────────────────────────────────────────────────

/// One listening socket plus the registry of the clients it accepted.
pub struct TcpListener {
    config: ListenerConfig,
    platform: Arc<dyn SocketPlatform>,
    state: ListenerState,
    socket: Option<SocketHandle>,
    local_addr: Option<SocketAddr>,
    registry: ConnectionRegistry,
}

impl TcpListener {
    /// Creates an `Uninitialized` listener on the system platform.
    pub fn new(config: ListenerConfig) -> Self {
        Self::with_platform(config, platform::system())
    }

    /// Creates an `Uninitialized` listener on an explicit platform.
    pub fn with_platform(config: ListenerConfig, platform: Arc<dyn SocketPlatform>) -> Self {
        let registry = ConnectionRegistry::with_capacity(config.max_connections);
        Self {
            config,
            platform,
            state: ListenerState::Uninitialized,
            socket: None,
            local_addr: None,
            registry,
        }
    }

    /// Creates a listener and opens it in one step.
    ///
    /// # Errors
    ///
    /// Returns the first [`ListenerError`] hit by [`TcpListener::open`].
    pub fn bind(config: ListenerConfig) -> Result<Self, ListenerError> {
        let mut listener = Self::new(config);
        listener.open()?;
        Ok(listener)
    }

    /// Takes the listener from `Uninitialized` to `Listening`.
    ///
    /// On any error the listener moves to `Failed` and every resource created
    /// so far has already been released.
    ///
    /// # Errors
    ///
    /// - [`ListenerError::NetworkingInit`] – subsystem startup failed.
    /// - [`ListenerError::SocketCreate`] – no socket could be allocated.
    /// - [`ListenerError::NonBlockingSetup`] – the socket stayed blocking.
    /// - [`ListenerError::InvalidAddress`] – `host` is not a valid IPv4 literal.
    /// - [`ListenerError::Bind`] / [`ListenerError::Listen`] – OS refusal.
    /// - [`ListenerError::InvalidState`] – not called on an `Uninitialized` listener.
    pub fn open(&mut self) -> Result<(), ListenerError> {
        if self.state != ListenerState::Uninitialized {
            return Err(self.invalid_state("open"));
        }

        self.transition(ListenerState::Binding);
        match self.establish() {
            Ok((socket, local_addr)) => {
                self.socket = Some(socket);
                self.local_addr = Some(local_addr);
                self.transition(ListenerState::Listening);
                info!(address = %local_addr, backlog = self.config.backlog, "TCP server listening");
                Ok(())
            }
            Err(e) => {
                self.transition(ListenerState::Failed);
                Err(e)
            }
        }
    }

    /// Runs the setup steps in order.  The socket is owned by a
    /// [`SocketHandle`] from the moment it exists, so every `?` below closes it.
    fn establish(&self) -> Result<(SocketHandle, SocketAddr), ListenerError> {
        let subsystem = NetworkSubsystem::start(Arc::clone(&self.platform))
            .map_err(|e| ListenerError::NetworkingInit { code: e.code })?;

        let socket = Socket::new(Domain::IPV4, Type::STREAM, None).map_err(|source| {
            ListenerError::SocketCreate {
                code: os_code(&source),
                source,
            }
        })?;
        let handle = SocketHandle::adopt(socket, subsystem);

        self.platform
            .set_nonblocking(handle.raw())
            .map_err(|e| ListenerError::NonBlockingSetup { code: e.code })?;

        let addr = self.config.bind_address()?;

        handle
            .sock_ref()
            .bind(&SocketAddr::V4(addr).into())
            .map_err(|source| ListenerError::Bind {
                addr,
                code: os_code(&source),
                source,
            })?;

        handle
            .sock_ref()
            .listen(self.config.backlog)
            .map_err(|source| ListenerError::Listen {
                addr,
                code: os_code(&source),
                source,
            })?;

        // With port 0 the OS picks the port; report the real one.
        let local_addr = reported_local_addr(handle.local_addr(), addr);
        Ok((handle, local_addr))
    }

    /// Admits at most one pending client.  Never blocks.
    ///
    /// The accepted socket is explicitly switched to non-blocking mode (Unix
    /// sockets do not inherit the flag from the listener), its peer address is
    /// recorded, and it is appended to the registry.
    ///
    /// # Errors
    ///
    /// - [`ListenerError::InvalidState`] – the listener is not `Listening`.
    /// - [`ListenerError::Accept`] – the OS reported a failure other than
    ///   "would block".  The listener remains usable.
    pub fn accept(&mut self) -> Result<AcceptOutcome, ListenerError> {
        if self.state != ListenerState::Listening {
            return Err(self.invalid_state("accept"));
        }
        let Some(listening) = self.socket.as_ref() else {
            return Err(self.invalid_state("accept"));
        };

        let (client, addr) = match listening.sock_ref().accept() {
            Ok(pair) => pair,
            Err(e) if is_no_pending_error(&e) => return Ok(AcceptOutcome::NoPendingConnection),
            Err(e) => return Err(ListenerError::accept(e)),
        };
        let handle = SocketHandle::adopt(client, Arc::clone(listening.subsystem()));

        self.platform
            .set_nonblocking(handle.raw())
            .map_err(ListenerError::accept_platform)?;

        let peer = match addr.as_socket() {
            Some(peer) => peer,
            None => handle.peer_addr().map_err(ListenerError::accept)?,
        };

        if self.registry.is_at_capacity() {
            debug!(
                active = self.registry.len(),
                max_connections = self.registry.capacity_hint(),
                "accepting past configured connection hint"
            );
        }
        let id = self.registry.insert(handle, peer);
        info!(connection_id = %id, peer = %peer, "client connection accepted");

        Ok(AcceptOutcome::Accepted(PeerInfo { id, address: peer }))
    }

    /// Tears the listener down.
    ///
    /// From `Listening`, closes every registered connection and then the
    /// listening socket, each exactly once.  Calling `close` again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::Close`] if the listening socket could not be
    /// released; the listener is `Closed` regardless.
    pub fn close(&mut self) -> Result<(), ListenerError> {
        match self.state {
            ListenerState::Closed | ListenerState::Failed => return Ok(()),
            ListenerState::Uninitialized | ListenerState::Binding | ListenerState::Listening => {}
        }

        let closed = self.registry.close_all();
        let result = match self.socket.take() {
            Some(socket) => socket
                .close()
                .map_err(|e| ListenerError::Close { code: e.code }),
            None => Ok(()),
        };
        self.transition(ListenerState::Closed);
        debug!(connections_closed = closed, "listener closed");
        result
    }

    pub fn state(&self) -> ListenerState {
        self.state
    }

    pub fn is_listening(&self) -> bool {
        self.state == ListenerState::Listening
    }

    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }

    /// The address actually bound, once `Listening`.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// The listening socket, for registering with an external readiness
    /// mechanism (epoll, kqueue, WSAPoll, ...).
    pub fn listening_handle(&self) -> Option<&SocketHandle> {
        self.socket.as_ref()
    }

    /// The accepted connections, in acceptance order.
    pub fn connections(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Mutable registry access, for removing or closing connections.
    pub fn connections_mut(&mut self) -> &mut ConnectionRegistry {
        &mut self.registry
    }

    fn transition(&mut self, next: ListenerState) {
        debug!(from = %self.state, to = %next, "listener state change");
        self.state = next;
    }

    fn invalid_state(&self, operation: &'static str) -> ListenerError {
        ListenerError::InvalidState {
            operation,
            state: self.state,
        }
    }
}

impl Drop for TcpListener {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("listener teardown failed: {e}");
        }
    }
}

impl fmt::Debug for TcpListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpListener")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("local_addr", &self.local_addr)
            .field("connections", &self.registry.len())
            .finish()
    }
}

/// The bound address from `getsockname`, or `configured` if that failed.
fn reported_local_addr(queried: io::Result<SocketAddr>, configured: SocketAddrV4) -> SocketAddr {
    match queried {
        Ok(local) => local,
        Err(e) => {
            debug!(%configured, "getsockname failed, reporting configured address: {e}");
            SocketAddr::V4(configured)
        }
    }
}

/// `true` for the accept errors that just mean "try again later".
fn is_no_pending_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::mock::MockSocketPlatform;

    fn loopback_config() -> ListenerConfig {
        ListenerConfig::new("127.0.0.1", 0, 8, 4)
    }

    // ── ListenerConfig ────────────────────────────────────────────────────────

    #[test]
    fn test_config_default_matches_documented_values() {
        let cfg = ListenerConfig::default();
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.max_connections, 100);
        assert_eq!(cfg.backlog, 16);
    }

    #[test]
    fn test_bind_address_maps_wildcard_to_unspecified() {
        let addr = ListenerConfig::new("0.0.0.0", 8080, 1, 1).bind_address().unwrap();
        assert_eq!(addr, SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 8080));
    }

    #[test]
    fn test_bind_address_parses_ipv4_literal() {
        let addr = ListenerConfig::new("192.168.1.20", 9000, 1, 1).bind_address().unwrap();
        assert_eq!(addr, "192.168.1.20:9000".parse::<SocketAddrV4>().unwrap());
    }

    #[test]
    fn test_bind_address_rejects_malformed_hosts() {
        for host in ["999.1.1.1", "not-an-ip", "", "::1", "localhost", "1.2.3"] {
            let err = ListenerConfig::new(host, 80, 1, 1).bind_address().unwrap_err();
            assert!(
                matches!(err, ListenerError::InvalidAddress { .. }),
                "{host:?} must be rejected, got {err:?}"
            );
        }
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let cfg: ListenerConfig = toml::from_str("port = 9999").expect("deserialize");
        assert_eq!(cfg.port, 9999);
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.backlog, 16);
    }

    // ── State machine ─────────────────────────────────────────────────────────

    #[test]
    fn test_new_listener_is_uninitialized_and_touches_nothing() {
        let mock = Arc::new(MockSocketPlatform::new());

        let listener = TcpListener::with_platform(loopback_config(), mock.clone());

        assert_eq!(listener.state(), ListenerState::Uninitialized);
        assert_eq!(listener.local_addr(), None);
        assert_eq!(mock.init_count(), 0);
    }

    #[test]
    fn test_open_reaches_listening_with_nonblocking_socket() {
        // Arrange
        let mock = Arc::new(MockSocketPlatform::new());
        let mut listener = TcpListener::with_platform(loopback_config(), mock.clone());

        // Act
        listener.open().expect("open");

        // Assert
        assert!(listener.is_listening());
        let raw = listener.socket.as_ref().unwrap().raw();
        assert_eq!(*mock.nonblocking.lock().unwrap(), vec![raw]);
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }

    #[test]
    fn test_huge_max_connections_still_reaches_listening() {
        // Arrange
        let config = ListenerConfig::new("127.0.0.1", 0, usize::MAX, 4);
        let mut listener = TcpListener::with_platform(config, Arc::new(MockSocketPlatform::new()));

        // Act
        listener.open().expect("open");

        // Assert
        assert!(listener.is_listening());
        assert_eq!(listener.connections().capacity_hint(), usize::MAX);
    }

    #[test]
    fn test_open_twice_is_invalid_state() {
        let mut listener = TcpListener::with_platform(
            loopback_config(),
            Arc::new(MockSocketPlatform::new()),
        );
        listener.open().expect("open");

        let err = listener.open().unwrap_err();

        assert_eq!(err.kind(), error::ErrorKind::InvalidState);
        assert!(listener.is_listening(), "a rejected open must not change state");
    }

    #[test]
    fn test_failed_state_is_absorbing() {
        // Arrange
        let mock = Arc::new(MockSocketPlatform::failing_init());
        let mut listener = TcpListener::with_platform(loopback_config(), mock);
        let _ = listener.open();
        assert_eq!(listener.state(), ListenerState::Failed);

        // Act / Assert
        assert_eq!(listener.open().unwrap_err().kind(), error::ErrorKind::InvalidState);
        assert_eq!(listener.accept().unwrap_err().kind(), error::ErrorKind::InvalidState);
        assert!(listener.close().is_ok());
        assert_eq!(listener.state(), ListenerState::Failed);
    }

    #[test]
    fn test_close_on_uninitialized_moves_to_closed() {
        let mut listener = TcpListener::with_platform(
            loopback_config(),
            Arc::new(MockSocketPlatform::new()),
        );

        listener.close().expect("close");

        assert_eq!(listener.state(), ListenerState::Closed);
        assert_eq!(listener.open().unwrap_err().kind(), error::ErrorKind::InvalidState);
    }

    #[test]
    fn test_close_twice_releases_listening_socket_once() {
        // Arrange
        let mock = Arc::new(MockSocketPlatform::new());
        let mut listener = TcpListener::with_platform(loopback_config(), mock.clone());
        listener.open().expect("open");
        let raw = listener.socket.as_ref().unwrap().raw();

        // Act
        listener.close().expect("first close");
        listener.close().expect("second close");
        drop(listener);

        // Assert
        assert_eq!(mock.close_count(raw), 1);
        assert_eq!(mock.shutdown_count(), 1);
    }

    #[test]
    fn test_reported_local_addr_falls_back_to_configured_address() {
        let configured = "127.0.0.1:9000".parse::<SocketAddrV4>().unwrap();

        let reported = reported_local_addr(Err(io::Error::from_raw_os_error(22)), configured);

        assert_eq!(reported, SocketAddr::V4(configured));
    }

    #[test]
    fn test_reported_local_addr_prefers_queried_address() {
        let configured = "127.0.0.1:0".parse::<SocketAddrV4>().unwrap();
        let bound: SocketAddr = "127.0.0.1:41234".parse().unwrap();

        assert_eq!(reported_local_addr(Ok(bound), configured), bound);
    }

    #[test]
    fn test_is_no_pending_error_classification() {
        assert!(is_no_pending_error(&io::Error::from(io::ErrorKind::WouldBlock)));
        assert!(is_no_pending_error(&io::Error::from(io::ErrorKind::Interrupted)));
        assert!(!is_no_pending_error(&io::Error::from(io::ErrorKind::ConnectionAborted)));
    }
}
