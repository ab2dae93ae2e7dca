//! Infrastructure layer for the server.
//!
//! Contains OS-facing adapters.  Sockets live in `fishnet-core`; what remains
//! here is file-system storage of the configuration.

pub mod storage;
