//! Recording socket platform for tests.
//!
//! # Why a mock platform?
//!
//! The listener must close every handle it owns exactly once and pair every
//! subsystem startup with exactly one shutdown.  Neither is observable from
//! the OS after the fact: a closed descriptor number is simply reused.
//!
//! `MockSocketPlatform` forwards each call to the real
//! [`SystemSocketPlatform`] (so sockets really are created and released) and
//! records it in a `Mutex<Vec<...>>` so assertions can inspect what happened
//! and in what order.
//!
//! # Failure switches
//!
//! Set `fail_init` or `fail_nonblocking` before handing the mock to a listener
//! to drive the `NetworkingInit` and `NonBlockingSetup` error paths.
//! `fail_nonblocking` can also be flipped on an already-listening listener
//! with [`MockSocketPlatform::set_fail_nonblocking`] to make the next accepted
//! socket fail its non-blocking setup.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{PlatformError, RawHandle, SocketPlatform, SystemSocketPlatform};

/// Error code reported by simulated failures.
pub const MOCK_ERROR_CODE: i32 = -100;

/// A platform that records calls while delegating to the real OS.
#[derive(Default)]
pub struct MockSocketPlatform {
    inner: SystemSocketPlatform,
    /// Number of successful `init_networking` calls.
    pub init_calls: AtomicUsize,
    /// Number of `shutdown_networking` calls.
    pub shutdown_calls: AtomicUsize,
    /// Every handle passed to `close_handle`, in call order.
    pub closed: Mutex<Vec<RawHandle>>,
    /// Every handle passed to `set_nonblocking`, in call order.
    pub nonblocking: Mutex<Vec<RawHandle>>,
    /// When `true`, `init_networking` fails with [`MOCK_ERROR_CODE`].
    pub fail_init: bool,
    /// While `true`, `set_nonblocking` fails with [`MOCK_ERROR_CODE`].
    pub fail_nonblocking: AtomicBool,
}

impl MockSocketPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_init() -> Self {
        Self {
            fail_init: true,
            ..Self::default()
        }
    }

    pub fn failing_nonblocking() -> Self {
        Self {
            fail_nonblocking: AtomicBool::new(true),
            ..Self::default()
        }
    }

    pub fn set_fail_nonblocking(&self, fail: bool) {
        self.fail_nonblocking.store(fail, Ordering::SeqCst);
    }

    pub fn init_count(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    pub fn shutdown_count(&self) -> usize {
        self.shutdown_calls.load(Ordering::SeqCst)
    }

    pub fn closed_handles(&self) -> Vec<RawHandle> {
        self.closed.lock().unwrap().clone()
    }

    /// How many times `handle` was passed to `close_handle`.
    pub fn close_count(&self, handle: RawHandle) -> usize {
        self.closed.lock().unwrap().iter().filter(|&&h| h == handle).count()
    }
}

impl SocketPlatform for MockSocketPlatform {
    fn init_networking(&self) -> Result<(), PlatformError> {
        if self.fail_init {
            return Err(PlatformError::new("init_networking", MOCK_ERROR_CODE));
        }
        self.inner.init_networking()?;
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn shutdown_networking(&self) {
        self.shutdown_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.shutdown_networking();
    }

    fn close_handle(&self, handle: RawHandle) -> Result<(), PlatformError> {
        self.closed.lock().unwrap().push(handle);
        self.inner.close_handle(handle)
    }

    fn set_nonblocking(&self, handle: RawHandle) -> Result<(), PlatformError> {
        if self.fail_nonblocking.load(Ordering::SeqCst) {
            return Err(PlatformError::new("set_nonblocking", MOCK_ERROR_CODE));
        }
        self.nonblocking.lock().unwrap().push(handle);
        self.inner.set_nonblocking(handle)
    }

    fn last_error_code(&self) -> i32 {
        self.inner.last_error_code()
    }
}
