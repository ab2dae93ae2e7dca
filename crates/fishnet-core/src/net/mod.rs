//! Ownership types on top of the platform layer.
//!
//! # Sub-modules
//!
//! - **`subsystem`** – [`NetworkSubsystem`], the explicit, reference-counted
//!   form of the process-wide networking startup/shutdown pair.
//!
//! - **`handle`** – [`SocketHandle`], an owned OS socket that is closed through
//!   the platform layer exactly once, whichever way it goes out of scope.

pub mod handle;
pub mod subsystem;

pub use handle::SocketHandle;
pub use subsystem::NetworkSubsystem;
