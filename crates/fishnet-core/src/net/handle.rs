//! Owned socket handle.
//!
//! `SocketHandle` takes a freshly created `socket2::Socket` out of socket2's
//! ownership and into ours, so that the close goes through
//! [`SocketPlatform::close_handle`](crate::platform::SocketPlatform::close_handle).
//!
//! # Exactly-once close
//!
//! - [`SocketHandle::close`] consumes the handle, so it cannot be called twice.
//! - Dropping a handle that was not closed explicitly closes it.
//!
//! Early returns during listener construction therefore release the socket
//! automatically.
//!
//! The handle implements `AsFd` (Unix) / `AsSocket` (Windows) so that
//! [`socket2::SockRef`] can bind, listen, accept and do I/O on it without
//! taking ownership.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use socket2::{SockRef, Socket};
use tracing::warn;

use super::NetworkSubsystem;
use crate::platform::{PlatformError, RawHandle};

/// An open OS socket owned by this crate.
pub struct SocketHandle {
    raw: RawHandle,
    subsystem: Arc<NetworkSubsystem>,
    open: bool,
}

impl SocketHandle {
    /// Takes ownership of `socket`.  It will be closed through `subsystem`'s platform.
    pub fn adopt(socket: Socket, subsystem: Arc<NetworkSubsystem>) -> Self {
        #[cfg(unix)]
        let raw = std::os::fd::IntoRawFd::into_raw_fd(socket);
        #[cfg(target_os = "windows")]
        let raw = std::os::windows::io::IntoRawSocket::into_raw_socket(socket);

        Self {
            raw,
            subsystem,
            open: true,
        }
    }

    /// The raw OS identifier.  Valid only while `self` is alive.
    pub fn raw(&self) -> RawHandle {
        self.raw
    }

    /// The subsystem this socket belongs to.
    pub fn subsystem(&self) -> &Arc<NetworkSubsystem> {
        &self.subsystem
    }

    /// Borrows the socket for socket2 operations (bind, accept, send, recv, ...).
    pub fn sock_ref(&self) -> SockRef<'_> {
        SockRef::from(self)
    }

    /// Local address the socket is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        socket_addr(self.sock_ref().local_addr()?)
    }

    /// Remote address of a connected socket.
    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        socket_addr(self.sock_ref().peer_addr()?)
    }

    /// Closes the socket.
    ///
    /// # Errors
    ///
    /// Returns the [`PlatformError`] from the platform close call.  The handle
    /// is considered released either way.
    pub fn close(mut self) -> Result<(), PlatformError> {
        self.open = false;
        self.subsystem.platform().close_handle(self.raw)
    }
}

impl Drop for SocketHandle {
    fn drop(&mut self) {
        if self.open {
            if let Err(e) = self.subsystem.platform().close_handle(self.raw) {
                warn!(handle = ?self.raw, "failed to close socket on drop: {e}");
            }
        }
    }
}

impl fmt::Debug for SocketHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketHandle").field("raw", &self.raw).finish()
    }
}

#[cfg(unix)]
impl std::os::fd::AsFd for SocketHandle {
    fn as_fd(&self) -> std::os::fd::BorrowedFd<'_> {
        // SAFETY: the descriptor stays open for as long as `self` is borrowed.
        unsafe { std::os::fd::BorrowedFd::borrow_raw(self.raw) }
    }
}

#[cfg(target_os = "windows")]
impl std::os::windows::io::AsSocket for SocketHandle {
    fn as_socket(&self) -> std::os::windows::io::BorrowedSocket<'_> {
        // SAFETY: the socket stays open for as long as `self` is borrowed.
        unsafe { std::os::windows::io::BorrowedSocket::borrow_raw(self.raw) }
    }
}

fn socket_addr(addr: socket2::SockAddr) -> io::Result<SocketAddr> {
    addr.as_socket().ok_or_else(|| {
        io::Error::new(io::ErrorKind::Unsupported, "socket address is not an IP endpoint")
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
