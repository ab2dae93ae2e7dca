//! Application layer use cases for the server.
//!
//! - **`accept_loop`** – Polls a [`accept_loop::ConnectionSource`] (normally
//!   the core `TcpListener`) for new clients, keeps counters, and decides which
//!   errors end the loop.  It depends on the trait rather than on the listener
//!   so it can be tested without sockets.

pub mod accept_loop;
