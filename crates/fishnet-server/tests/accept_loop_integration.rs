//! Integration tests for `AcceptLoop` driving a real `TcpListener`.
//!
//! Each test binds an ephemeral loopback port, connects plain
//! `std::net::TcpStream` clients, and checks what the loop admitted.

use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use fishnet_core::{ListenerConfig, ListenerError, ListenerState, TcpListener};
use fishnet_server::application::accept_loop::{AcceptLoop, PollResult, ServeError};

fn loopback_listener() -> TcpListener {
    TcpListener::bind(ListenerConfig::new("127.0.0.1", 0, 100, 16)).expect("bind loopback")
}

fn connect(listener: &TcpListener) -> TcpStream {
    TcpStream::connect(listener.local_addr().expect("listening")).expect("client connect")
}

/// Drains until `expected` clients are admitted or the deadline passes.
fn drain_until(accept_loop: &mut AcceptLoop<TcpListener>, expected: usize) -> usize {
    let start = Instant::now();
    let mut admitted = 0;
    while admitted < expected && start.elapsed() < Duration::from_secs(5) {
        admitted += accept_loop.drain_pending().expect("drain");
        std::thread::sleep(Duration::from_millis(5));
    }
    admitted
}

#[test]
fn test_poll_once_on_idle_listener_reports_idle() {
    let mut accept_loop = AcceptLoop::new(loopback_listener());

    let result = accept_loop.poll_once().expect("poll");

    assert_eq!(result, PollResult::Idle);
    assert_eq!(accept_loop.stats().idle_polls, 1);
}

#[test]
fn test_drain_pending_admits_every_waiting_client() {
    // Arrange
    let mut accept_loop = AcceptLoop::new(loopback_listener());
    let _a = connect(accept_loop.source());
    let _b = connect(accept_loop.source());
    let _c = connect(accept_loop.source());

    // Act
    let admitted = drain_until(&mut accept_loop, 3);

    // Assert
    assert_eq!(admitted, 3);
    assert_eq!(accept_loop.stats().accepted, 3);
    assert_eq!(accept_loop.source().connections().len(), 3);
}

#[test]
fn test_closed_listener_ends_the_loop() {
    let mut listener = loopback_listener();
    listener.close().expect("close");
    let mut accept_loop = AcceptLoop::new(listener);

    let err = accept_loop.poll_once().unwrap_err();

    match err {
        ServeError::ListenerUnavailable(ListenerError::InvalidState { state, .. }) => {
            assert_eq!(state, ListenerState::Closed);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_run_admits_clients_until_flag_is_cleared() {
    // Arrange
    let mut accept_loop = AcceptLoop::new(loopback_listener());
    let _a = connect(accept_loop.source());
    let _b = connect(accept_loop.source());

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        running_clone.store(false, Ordering::Relaxed);
    });

    // Act
    let stats = accept_loop
        .run(&running, Duration::from_millis(5))
        .await
        .expect("run");

    // Assert
    assert_eq!(stats.accepted, 2);
    assert!(stats.idle_polls > 0);

    let mut listener = accept_loop.into_source();
    assert_eq!(listener.connections().len(), 2);
    listener.close().expect("close");
    assert_eq!(listener.state(), ListenerState::Closed);
    assert!(listener.connections().is_empty());
}
