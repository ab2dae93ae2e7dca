//! Process-wide networking subsystem lifecycle.
//!
//! Instead of relying on ambient global state, each listener starts its own
//! `NetworkSubsystem` and shares it (through an `Arc`) with every socket it
//! creates.  The subsystem is shut down when the last of those owners is
//! dropped, which is always after the last socket has been closed.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::platform::{PlatformError, SocketPlatform};

/// A started networking subsystem.  Dropping the last reference shuts it down.
pub struct NetworkSubsystem {
    platform: Arc<dyn SocketPlatform>,
}

impl NetworkSubsystem {
    /// Starts the subsystem on `platform`.
    ///
    /// # Errors
    ///
    /// Returns the [`PlatformError`] from `init_networking`; in that case
    /// `shutdown_networking` is never called.
    pub fn start(platform: Arc<dyn SocketPlatform>) -> Result<Arc<Self>, PlatformError> {
        platform.init_networking()?;
        debug!("networking subsystem started");
        Ok(Arc::new(Self { platform }))
    }

    /// The platform this subsystem was started on.
    pub fn platform(&self) -> &dyn SocketPlatform {
        self.platform.as_ref()
    }
}

impl Drop for NetworkSubsystem {
    fn drop(&mut self) {
        self.platform.shutdown_networking();
        debug!("networking subsystem shut down");
    }
}

impl fmt::Debug for NetworkSubsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkSubsystem").finish_non_exhaustive()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
