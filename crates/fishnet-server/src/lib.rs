//! fishnet-server library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! The server is the first consumer of `fishnet-core`: it loads the listener
//! settings from a TOML file, opens the listener, and polls it for new clients
//! until it is told to stop.  What happens to a client after it is accepted is
//! left to the layers built on top.

/// Application layer: the accept loop use case.
pub mod application;

/// Infrastructure layer: configuration storage.
pub mod infrastructure;
