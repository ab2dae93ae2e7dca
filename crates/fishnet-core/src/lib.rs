//! # fishnet-core
//!
//! The foundation layer of the Fishnet TCP server: a non-blocking listening
//! endpoint that works the same way on POSIX and Windows sockets.
//!
//! This crate knows nothing about application protocols.  It opens a listening
//! socket, admits pending clients one at a time without ever blocking the
//! caller, and keeps the accepted sockets in an ordered registry until the
//! consuming layer removes them.
//!
//! # Architecture overview (for beginners)
//!
//! - **`platform`** – The handful of OS calls that differ between Unix and
//!   Windows (subsystem startup, closing a socket, switching a socket to
//!   non-blocking mode, reading the last socket error).  Everything above this
//!   module is written once.
//!
//! - **`net`** – Ownership types built on the platform layer: the
//!   reference-counted [`NetworkSubsystem`] and the [`SocketHandle`] that closes
//!   its OS socket exactly once.
//!
//! - **`listener`** – The [`TcpListener`] state machine, its
//!   [`ConnectionRegistry`], and the [`ListenerError`] taxonomy.
//!
//! ```no_run
//! use fishnet_core::{AcceptOutcome, ListenerConfig, TcpListener};
//!
//! let mut listener = TcpListener::bind(ListenerConfig::new("0.0.0.0", 8080, 100, 16))?;
//! loop {
//!     match listener.accept()? {
//!         AcceptOutcome::Accepted(peer) => println!("client {} from {}", peer.id, peer.address),
//!         AcceptOutcome::NoPendingConnection => break,
//!     }
//! }
//! # Ok::<(), fishnet_core::ListenerError>(())
//! ```

pub mod listener;
pub mod net;
pub mod platform;

// Re-export the most-used types at the crate root so callers can write
// `fishnet_core::TcpListener` instead of `fishnet_core::listener::TcpListener`.
pub use listener::error::{ErrorKind, ListenerError};
pub use listener::registry::{Connection, ConnectionId, ConnectionRegistry};
pub use listener::{AcceptOutcome, ListenerConfig, ListenerState, PeerInfo, TcpListener};
pub use net::{NetworkSubsystem, SocketHandle};
pub use platform::{PlatformError, RawHandle, SocketPlatform, SystemSocketPlatform};
