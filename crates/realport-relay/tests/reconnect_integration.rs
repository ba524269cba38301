//! Integration tests for the reconnect loop.
//!
//! The resolver is scripted with `mockall` so each attempt's outcome is
//! chosen by the test; sockets are real loopback connections.
//!
//! ```text
//! attempt 1: resolve fails               → ResolveFailed
//! attempt 2: resolves to 127.0.0.2       → nobody listens there → ConnectFailed
//! attempt 3: resolves to 127.0.0.1       → session, bytes reach the device
//! ```
//!
//! Every attempt resolves the host again; nothing is cached between them.
//! That holds whatever ended the previous session: a remote close, the idle
//! timeout, a failed handshake, a protocol reset or a device error.

use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mockall::{mock, Sequence};
use realport_core::{AddressFamily, SecurityMode, SessionEnd};
use realport_relay::application::{Resolver, SessionReport, PROTOCOL_RESET_MARKER};
use realport_relay::domain::DaemonConfig;
use realport_relay::infrastructure::{AttemptOutcome, ConnectionManager, TlsContext};
use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::Instant;
use tokio_test::io::Builder;

mock! {
    pub Dns {}

    #[async_trait]
    impl Resolver for Dns {
        async fn resolve(&self, host: &str, family: AddressFamily) -> io::Result<IpAddr>;
    }
}

fn config_for(port: u16) -> DaemonConfig {
    let mut config = DaemonConfig::new("/dev/dty/a000s", "ts16.example.net");
    config.endpoint.port = port;
    config.retry_delay = Duration::from_millis(20);
    config
}

fn not_found() -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, "ts16.example.net has no IPv4 address")
}

/// Resolves to loopback once, then fails.  Both expectations must be used
/// exactly once, in order.
fn resolves_once_then_fails() -> MockDns {
    let mut dns = MockDns::new();
    let mut seq = Sequence::new();
    dns.expect_resolve()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(IpAddr::V4(Ipv4Addr::LOCALHOST)));
    dns.expect_resolve()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Err(not_found()));
    dns
}

/// A unit that accepts connections and stays silent until each is closed.
async fn silent_unit() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        loop {
            let (mut socket, _) = listener.accept().await.unwrap();
            tokio::spawn(async move {
                let mut sink = Vec::new();
                let _ = socket.read_to_end(&mut sink).await;
            });
        }
    });
    port
}

fn expect_session(outcome: AttemptOutcome) -> SessionReport {
    match outcome {
        AttemptOutcome::SessionEnded(report) => report,
        other => panic!("expected a session, got {other:?}"),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_recovers_from_resolve_and_connect_failures() {
    // Arrange
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        socket.write_all(b"ready").await.unwrap();
    });

    let mut dns = MockDns::new();
    let mut seq = Sequence::new();
    dns.expect_resolve()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Err(not_found()));
    dns.expect_resolve()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 2))));
    dns.expect_resolve()
        .times(1)
        .in_sequence(&mut seq)
        .withf(|host, family| host == "ts16.example.net" && *family == AddressFamily::V4)
        .returning(|_, _| Ok(IpAddr::V4(Ipv4Addr::LOCALHOST)));

    let (device, mut driver) = duplex(1024);
    let mut manager = ConnectionManager::new(config_for(port), device, Arc::new(dns), None);

    // Act
    let first = manager.run_attempt().await.unwrap();
    let second = manager.run_attempt().await.unwrap();
    let third = manager.run_attempt().await.unwrap();

    // Assert
    assert_eq!(first, AttemptOutcome::ResolveFailed);
    assert_eq!(second, AttemptOutcome::ConnectFailed);
    let AttemptOutcome::SessionEnded(report) = third else {
        panic!("expected a session, got {third:?}");
    };
    assert_eq!(report.end, SessionEnd::RemoteClosed);
    assert_eq!(report.stats.bytes_from_remote, 5);
    assert_eq!(manager.sessions(), 1);

    let mut received = [0u8; 5];
    driver.read_exact(&mut received).await.unwrap();
    assert_eq!(&received, b"ready");
}

#[tokio::test]
async fn test_run_reconnects_after_each_session() {
    // Arrange: every connection gets one numbered greeting, then is closed.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let mut served = 0u8;
        loop {
            let (mut socket, _) = listener.accept().await.unwrap();
            served += 1;
            let greeting = [b'0' + served % 10];
            socket.write_all(&greeting).await.unwrap();
        }
    });

    let mut dns = MockDns::new();
    dns.expect_resolve()
        .times(3..)
        .returning(|_, _| Ok(IpAddr::V4(Ipv4Addr::LOCALHOST)));

    let (device, mut driver) = duplex(1024);
    let mut manager = ConnectionManager::new(config_for(port), device, Arc::new(dns), None);

    // Act: let the manager run until three sessions have delivered their
    // greeting to the device.
    let received = tokio::time::timeout(Duration::from_secs(10), async {
        tokio::select! {
            result = manager.run() => panic!("run returned: {result:?}"),
            bytes = async {
                let mut buf = [0u8; 3];
                driver.read_exact(&mut buf).await.unwrap();
                buf
            } => bytes,
        }
    })
    .await
    .expect("three sessions within ten seconds");

    // Assert
    assert_eq!(&received, b"123");
    assert!(manager.sessions() >= 3);
}

#[tokio::test(start_paused = true)]
async fn test_idle_timeout_then_reconnect() {
    // Arrange: the first connection stays silent, the second greets.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (mut silent, _) = listener.accept().await.unwrap();
        let mut sink = Vec::new();
        let _ = silent.read_to_end(&mut sink).await;
        let (mut greeter, _) = listener.accept().await.unwrap();
        greeter.write_all(b"ok").await.unwrap();
    });

    let mut dns = MockDns::new();
    dns.expect_resolve()
        .times(2)
        .returning(|_, _| Ok(IpAddr::V4(Ipv4Addr::LOCALHOST)));

    let mut config = config_for(port);
    config.idle_timeout = Some(Duration::from_secs(5));
    let (device, mut driver) = duplex(1024);
    let mut manager = ConnectionManager::new(config, device, Arc::new(dns), None);
    let started = Instant::now();

    // Act
    let idle = expect_session(manager.run_attempt().await.unwrap());
    let idle_elapsed = started.elapsed();
    let next = expect_session(manager.run_attempt().await.unwrap());

    // Assert
    assert_eq!(idle.end, SessionEnd::RemoteClosed);
    assert_eq!(idle.stats.idle_trips, 1);
    assert!(idle_elapsed >= Duration::from_secs(5));
    assert!(idle_elapsed < Duration::from_secs(6));
    assert_eq!(next.end, SessionEnd::RemoteClosed);
    assert_eq!(manager.sessions(), 2);
    let mut received = [0u8; 2];
    driver.read_exact(&mut received).await.unwrap();
    assert_eq!(&received, b"ok");
}

#[tokio::test]
async fn test_failed_handshake_is_followed_by_one_fresh_resolve() {
    // Arrange: a plain-text unit where TLS is expected.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let _ = socket.write_all(b"\r\nlogin: ").await;
    });

    let mut config = config_for(port);
    config.security = SecurityMode::EncryptOnly;
    let tls = TlsContext::new(SecurityMode::EncryptOnly, Vec::new()).unwrap();
    let (device, _driver) = duplex(1024);
    let mut manager =
        ConnectionManager::new(config, device, Arc::new(resolves_once_then_fails()), Some(tls));

    // Act
    let first = expect_session(manager.run_attempt().await.unwrap());
    let second = manager.run_attempt().await.unwrap();

    // Assert
    assert!(
        matches!(first.end, SessionEnd::HandshakeFailed { .. }),
        "got {:?}",
        first.end
    );
    assert_eq!(first.stats.bytes_from_remote, 0);
    assert_eq!(second, AttemptOutcome::ResolveFailed);
    assert_eq!(manager.sessions(), 1);
}

#[tokio::test]
async fn test_protocol_reset_is_followed_by_one_fresh_resolve() {
    let port = silent_unit().await;
    let (device, mut driver) = duplex(1024);
    driver.write_all(&[PROTOCOL_RESET_MARKER]).await.unwrap();
    let mut manager = ConnectionManager::new(
        config_for(port),
        device,
        Arc::new(resolves_once_then_fails()),
        None,
    );

    let first = expect_session(manager.run_attempt().await.unwrap());
    let second = manager.run_attempt().await.unwrap();

    assert_eq!(first.end, SessionEnd::ProtocolReset);
    assert_eq!(second, AttemptOutcome::ResolveFailed);
}

#[tokio::test]
async fn test_device_error_is_followed_by_one_fresh_resolve() {
    let port = silent_unit().await;
    let device = Builder::new()
        .read_error(io::Error::new(io::ErrorKind::Other, "Input/output error"))
        .build();
    let mut manager = ConnectionManager::new(
        config_for(port),
        device,
        Arc::new(resolves_once_then_fails()),
        None,
    );

    let first = expect_session(manager.run_attempt().await.unwrap());
    let second = manager.run_attempt().await.unwrap();

    assert!(
        matches!(first.end, SessionEnd::DeviceReadFailed { .. }),
        "got {:?}",
        first.end
    );
    assert_eq!(second, AttemptOutcome::ResolveFailed);
    assert_eq!(manager.sessions(), 1);
}
