//! POSIX socket primitives via `libc`.
//!
//! POSIX systems need no networking-subsystem startup, so `init_networking`
//! and `shutdown_networking` are no-ops.  Errors are read from `errno`.

use super::{PlatformError, RawHandle, SocketPlatform};

/// Unix implementation of [`SocketPlatform`].
#[derive(Debug, Default, Clone, Copy)]
pub struct UnixSocketPlatform;

impl UnixSocketPlatform {
    pub fn new() -> Self {
        Self
    }
}

impl SocketPlatform for UnixSocketPlatform {
    fn init_networking(&self) -> Result<(), PlatformError> {
        Ok(())
    }

    fn shutdown_networking(&self) {}

    fn close_handle(&self, handle: RawHandle) -> Result<(), PlatformError> {
        // SAFETY: `handle` is an open descriptor owned by the caller, which
        // guarantees it is not closed twice.
        if unsafe { libc::close(handle) } < 0 {
            return Err(PlatformError::new("close_handle", self.last_error_code()));
        }
        Ok(())
    }

    fn set_nonblocking(&self, handle: RawHandle) -> Result<(), PlatformError> {
        // SAFETY: F_GETFL/F_SETFL only read and write the descriptor's status flags.
        let flags = unsafe { libc::fcntl(handle, libc::F_GETFL, 0) };
        if flags < 0 {
            return Err(PlatformError::new("set_nonblocking", self.last_error_code()));
        }
        if unsafe { libc::fcntl(handle, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
            return Err(PlatformError::new("set_nonblocking", self.last_error_code()));
        }
        Ok(())
    }

    fn last_error_code(&self) -> i32 {
        std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::os::fd::IntoRawFd;

    use socket2::{Domain, Socket, Type};

    use super::*;

    fn raw_stream_socket() -> RawHandle {
        Socket::new(Domain::IPV4, Type::STREAM, None)
            .expect("socket")
            .into_raw_fd()
    }

    #[test]
    fn test_set_nonblocking_sets_o_nonblock_flag() {
        // Arrange
        let platform = UnixSocketPlatform::new();
        let fd = raw_stream_socket();

        // Act
        platform.set_nonblocking(fd).expect("set_nonblocking");

        // Assert
        let flags = unsafe { libc::fcntl(fd, libc::F_GETFL, 0) };
        assert_ne!(flags & libc::O_NONBLOCK, 0, "O_NONBLOCK must be set");
        platform.close_handle(fd).expect("close");
    }

    #[test]
    fn test_close_handle_reports_ebadf_for_invalid_descriptor() {
        let platform = UnixSocketPlatform::new();

        let err = platform.close_handle(-1).unwrap_err();

        assert_eq!(err.operation, "close_handle");
        assert_eq!(err.code, libc::EBADF);
    }

    #[test]
    fn test_set_nonblocking_fails_on_invalid_descriptor() {
        let platform = UnixSocketPlatform::new();

        let err = platform.set_nonblocking(-1).unwrap_err();

        assert_eq!(err.code, libc::EBADF);
    }
}
