//! Platform socket layer.
//!
//! Isolates the few socket operations whose implementation differs between
//! POSIX and Windows.  The correct implementation is selected at compile time
//! via `#[cfg(...)]` and exposed as [`SystemSocketPlatform`].
//!
//! # Why a trait? (for beginners)
//!
//! The listener never calls `fcntl` or `ioctlsocket` directly.  It talks to a
//! `dyn SocketPlatform`, which means tests can inject the recording
//! [`mock::MockSocketPlatform`] and observe exactly which handles were closed
//! and how often the networking subsystem was started, without patching the OS.
//!
//! | Operation           | Unix                      | Windows                 |
//! |---------------------|---------------------------|-------------------------|
//! | `init_networking`   | no-op                     | `WSAStartup(2.2)`       |
//! | `shutdown_networking` | no-op                   | `WSACleanup`            |
//! | `close_handle`      | `close`                   | `closesocket`           |
//! | `set_nonblocking`   | `fcntl(F_SETFL, O_NONBLOCK)` | `ioctlsocket(FIONBIO)` |
//! | `last_error_code`   | `errno`                   | `WSAGetLastError`       |

use std::sync::Arc;

use thiserror::Error;

pub mod mock;

#[cfg(unix)]
pub mod unix;

#[cfg(target_os = "windows")]
pub mod windows;

/// Opaque OS identifier of a socket.
#[cfg(unix)]
pub type RawHandle = std::os::fd::RawFd;

/// Opaque OS identifier of a socket.
#[cfg(target_os = "windows")]
pub type RawHandle = std::os::windows::io::RawSocket;

/// The platform implementation for the current build target.
#[cfg(unix)]
pub type SystemSocketPlatform = unix::UnixSocketPlatform;

/// The platform implementation for the current build target.
#[cfg(target_os = "windows")]
pub type SystemSocketPlatform = windows::WinsockPlatform;

/// A failed platform call together with the OS error code it produced.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("{operation} failed (os error {code})")]
pub struct PlatformError {
    /// Name of the failing operation, e.g. `"set_nonblocking"`.
    pub operation: &'static str,
    /// Platform-specific error code; never interpreted by this crate.
    pub code: i32,
}

impl PlatformError {
    pub fn new(operation: &'static str, code: i32) -> Self {
        Self { operation, code }
    }
}

/// The OS-specific socket primitives every backend must provide.
pub trait SocketPlatform: Send + Sync {
    /// Starts the process-wide networking subsystem.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError`] if the platform startup call fails.
    fn init_networking(&self) -> Result<(), PlatformError>;

    /// Releases the subsystem; paired with one successful `init_networking`.
    fn shutdown_networking(&self);

    /// Releases the OS resources of `handle`.
    ///
    /// The caller must not close the same handle twice.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError`] carrying the OS error code.
    fn close_handle(&self, handle: RawHandle) -> Result<(), PlatformError>;

    /// Switches `handle` to non-blocking mode.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError`] carrying the OS error code.
    fn set_nonblocking(&self, handle: RawHandle) -> Result<(), PlatformError>;

    /// Code of the most recent failing socket call on the current thread.
    fn last_error_code(&self) -> i32;
}

/// Returns the platform implementation for the current build target.
pub fn system() -> Arc<dyn SocketPlatform> {
    Arc::new(SystemSocketPlatform::default())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
