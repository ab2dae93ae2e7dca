//! Winsock socket primitives via the `windows` crate.
//!
//! # Winsock startup (for beginners)
//!
//! Every Windows process must call `WSAStartup` before its first socket call
//! and `WSACleanup` once it is done.  The calls are reference counted by the
//! OS, so each successful startup is paired with exactly one cleanup by
//! [`crate::net::NetworkSubsystem`].

#![cfg(target_os = "windows")]

use windows::Win32::Networking::WinSock::{
    closesocket, ioctlsocket, WSACleanup, WSAGetLastError, WSAStartup, FIONBIO, SOCKET, WSADATA,
};

use super::{PlatformError, RawHandle, SocketPlatform};

/// Winsock version 2.2, the only version in use since Windows 95 OSR2.
const WINSOCK_VERSION: u16 = 0x0202;

/// Windows implementation of [`SocketPlatform`].
#[derive(Debug, Default, Clone, Copy)]
pub struct WinsockPlatform;

impl WinsockPlatform {
    pub fn new() -> Self {
        Self
    }
}

impl SocketPlatform for WinsockPlatform {
    fn init_networking(&self) -> Result<(), PlatformError> {
        let mut data = WSADATA::default();
        // SAFETY: `data` is a valid out-pointer for the duration of the call.
        let status = unsafe { WSAStartup(WINSOCK_VERSION, &mut data) };
        if status != 0 {
            // WSAStartup returns its error directly; WSAGetLastError is not usable yet.
            return Err(PlatformError::new("init_networking", status));
        }
        Ok(())
    }

    fn shutdown_networking(&self) {
        // SAFETY: paired with a successful WSAStartup by the caller.
        unsafe {
            WSACleanup();
        }
    }

    fn close_handle(&self, handle: RawHandle) -> Result<(), PlatformError> {
        // SAFETY: `handle` is an open socket owned by the caller.
        if unsafe { closesocket(SOCKET(handle as usize)) } != 0 {
            return Err(PlatformError::new("close_handle", self.last_error_code()));
        }
        Ok(())
    }

    fn set_nonblocking(&self, handle: RawHandle) -> Result<(), PlatformError> {
        let mut mode: u32 = 1;
        // SAFETY: FIONBIO reads a single u32 through `mode`.
        if unsafe { ioctlsocket(SOCKET(handle as usize), FIONBIO, &mut mode) } != 0 {
            return Err(PlatformError::new("set_nonblocking", self.last_error_code()));
        }
        Ok(())
    }

    fn last_error_code(&self) -> i32 {
        // SAFETY: reads thread-local Winsock state only.
        unsafe { WSAGetLastError().0 }
    }
}
