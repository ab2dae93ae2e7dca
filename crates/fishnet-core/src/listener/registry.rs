//! ConnectionRegistry: the accepted client sockets of one listener.
//!
//! Entries are appended only by a successful `TcpListener::accept`, in the
//! order the OS delivered them.  Removing an entry (when the client disconnects
//! or the application is done with it) is the consuming layer's decision; the
//! registry only guarantees that every handle it holds was accepted and has
//! not been removed yet.
//!
//! # Ordering
//!
//! A `Vec` keeps acceptance order, which is what callers iterate in.  Lookups
//! by [`ConnectionId`] are linear; registries are bounded by the configured
//! connection count, so that is fine.

use std::net::SocketAddr;
use std::time::Instant;

use tracing::warn;
use uuid::Uuid;

use crate::net::SocketHandle;
use crate::platform::PlatformError;

/// Upper bound on the slots reserved by [`ConnectionRegistry::with_capacity`].
pub const PREALLOCATED_CONNECTIONS: usize = 64;

/// Unique identifier assigned to each accepted connection.
pub type ConnectionId = Uuid;

/// One accepted client connection.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    peer: SocketAddr,
    accepted_at: Instant,
    handle: SocketHandle,
}

impl Connection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// The remote endpoint captured at accept time.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn accepted_at(&self) -> Instant {
        self.accepted_at
    }

    /// The client socket, for the consuming layer's I/O.
    pub fn handle(&self) -> &SocketHandle {
        &self.handle
    }

    /// Gives up registry bookkeeping and returns the socket.
    pub fn into_handle(self) -> SocketHandle {
        self.handle
    }

    /// Closes the client socket.
    ///
    /// # Errors
    ///
    /// Returns the [`PlatformError`] from the platform close call.
    pub fn close(self) -> Result<(), PlatformError> {
        self.handle.close()
    }
}

/// Ordered collection of accepted connections.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: Vec<Connection>,
    capacity_hint: usize,
}

impl ConnectionRegistry {
    /// Creates an empty registry for about `capacity_hint` connections.
    ///
    /// The hint is advisory: at most [`PREALLOCATED_CONNECTIONS`] slots are
    /// reserved up front and the registry grows past the hint if needed.
    pub fn with_capacity(capacity_hint: usize) -> Self {
        Self {
            connections: Vec::with_capacity(capacity_hint.min(PREALLOCATED_CONNECTIONS)),
            capacity_hint,
        }
    }

    pub fn capacity_hint(&self) -> usize {
        self.capacity_hint
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// `true` once the registry holds at least `capacity_hint` connections.
    pub fn is_at_capacity(&self) -> bool {
        self.capacity_hint > 0 && self.connections.len() >= self.capacity_hint
    }

    /// Iterates connections in acceptance order.
    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.connections.iter()
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.iter().find(|c| c.id == id)
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.get(id).is_some()
    }

    /// Removes a connection and hands ownership of it to the caller.
    ///
    /// Order of the remaining entries is preserved.
    pub fn remove(&mut self, id: ConnectionId) -> Option<Connection> {
        let index = self.connections.iter().position(|c| c.id == id)?;
        Some(self.connections.remove(index))
    }

    /// Removes and closes a connection.  Returns `Ok(false)` if `id` is unknown.
    ///
    /// # Errors
    ///
    /// Returns the [`PlatformError`] from the platform close call; the entry
    /// is removed regardless.
    pub fn close(&mut self, id: ConnectionId) -> Result<bool, PlatformError> {
        match self.remove(id) {
            Some(conn) => conn.close().map(|()| true),
            None => Ok(false),
        }
    }

    /// Closes every connection, each exactly once, leaving the registry empty.
    ///
    /// Returns the number of handles that closed cleanly.  Failures are logged.
    pub fn close_all(&mut self) -> usize {
        let mut closed = 0;
        for conn in self.connections.drain(..) {
            let (id, peer) = (conn.id, conn.peer);
            match conn.close() {
                Ok(()) => closed += 1,
                Err(e) => warn!(connection_id = %id, %peer, "failed to close connection: {e}"),
            }
        }
        closed
    }

    /// Appends a freshly accepted socket and returns its new ID.
    pub(crate) fn insert(&mut self, handle: SocketHandle, peer: SocketAddr) -> ConnectionId {
        let id = Uuid::new_v4();
        self.connections.push(Connection {
            id,
            peer,
            accepted_at: Instant::now(),
            handle,
        });
        id
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use socket2::{Domain, Socket, Type};

    use super::*;
    use crate::net::NetworkSubsystem;
    use crate::platform::mock::MockSocketPlatform;

    fn new_handle(subsystem: &Arc<NetworkSubsystem>) -> SocketHandle {
        let socket = Socket::new(Domain::IPV4, Type::STREAM, None).expect("socket");
        SocketHandle::adopt(socket, Arc::clone(subsystem))
    }

    fn peer(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn setup() -> (Arc<MockSocketPlatform>, Arc<NetworkSubsystem>) {
        let mock = Arc::new(MockSocketPlatform::new());
        let subsystem = NetworkSubsystem::start(mock.clone()).expect("start");
        (mock, subsystem)
    }

    #[test]
    fn test_insert_preserves_acceptance_order() {
        // Arrange
        let (_mock, subsystem) = setup();
        let mut registry = ConnectionRegistry::with_capacity(4);

        // Act
        let first = registry.insert(new_handle(&subsystem), peer(5001));
        let second = registry.insert(new_handle(&subsystem), peer(5002));
        let third = registry.insert(new_handle(&subsystem), peer(5003));

        // Assert
        let ids: Vec<_> = registry.iter().map(Connection::id).collect();
        assert_eq!(ids, vec![first, second, third]);
        assert_eq!(registry.get(second).unwrap().peer(), peer(5002));
    }

    #[test]
    fn test_insert_assigns_distinct_ids() {
        let (_mock, subsystem) = setup();
        let mut registry = ConnectionRegistry::default();

        let a = registry.insert(new_handle(&subsystem), peer(6000));
        let b = registry.insert(new_handle(&subsystem), peer(6000));

        assert_ne!(a, b);
    }

    #[test]
    fn test_remove_hands_ownership_to_caller_without_closing() {
        // Arrange
        let (mock, subsystem) = setup();
        let mut registry = ConnectionRegistry::default();
        let id = registry.insert(new_handle(&subsystem), peer(7000));

        // Act
        let conn = registry.remove(id).expect("present");

        // Assert
        assert!(registry.is_empty());
        assert!(mock.closed_handles().is_empty(), "remove must not close");
        let raw = conn.handle().raw();
        drop(conn);
        assert_eq!(mock.close_count(raw), 1);
    }

    #[test]
    fn test_remove_unknown_id_returns_none() {
        let mut registry = ConnectionRegistry::default();
        assert!(registry.remove(Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_close_by_id_closes_only_that_connection() {
        let (mock, subsystem) = setup();
        let mut registry = ConnectionRegistry::default();
        let keep = registry.insert(new_handle(&subsystem), peer(8001));
        let gone = registry.insert(new_handle(&subsystem), peer(8002));
        let gone_raw = registry.get(gone).unwrap().handle().raw();

        assert_eq!(registry.close(gone), Ok(true));
        assert_eq!(registry.close(gone), Ok(false));

        assert!(registry.contains(keep));
        assert_eq!(mock.closed_handles(), vec![gone_raw]);
    }

    #[test]
    fn test_close_all_closes_each_handle_exactly_once() {
        // Arrange
        let (mock, subsystem) = setup();
        let mut registry = ConnectionRegistry::with_capacity(3);
        for port in 9001..9004 {
            registry.insert(new_handle(&subsystem), peer(port));
        }
        let raws: Vec<_> = registry.iter().map(|c| c.handle().raw()).collect();

        // Act
        let closed = registry.close_all();

        // Assert
        assert_eq!(closed, 3);
        assert!(registry.is_empty());
        assert_eq!(mock.closed_handles(), raws);
    }

    #[test]
    fn test_huge_capacity_hint_does_not_preallocate() {
        // Arrange / Act
        let registry = ConnectionRegistry::with_capacity(usize::MAX);

        // Assert
        assert_eq!(registry.capacity_hint(), usize::MAX);
        assert!(registry.connections.capacity() <= PREALLOCATED_CONNECTIONS);
        assert!(!registry.is_at_capacity());
    }

    #[test]
    fn test_is_at_capacity_follows_hint() {
        let (_mock, subsystem) = setup();
        let mut registry = ConnectionRegistry::with_capacity(1);
        assert!(!registry.is_at_capacity());

        registry.insert(new_handle(&subsystem), peer(9100));
        assert!(registry.is_at_capacity());

        // The hint is advisory; inserts past it still succeed.
        registry.insert(new_handle(&subsystem), peer(9101));
        assert_eq!(registry.len(), 2);
    }
}
