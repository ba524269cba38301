//! ConnectionManager: keeps exactly one session to the remote unit alive,
//! forever.
//!
//! Every attempt starts from scratch: resolve the host name, open a socket,
//! connect, run the session.  Whatever goes wrong, the manager pauses and
//! tries again.  The only way out is a [`FatalError`].
//!
//! Connection-phase failures during an outage are logged once and then
//! suppressed for an hour per kind (see [`FailureLog`]), so a unit that is
//! down overnight produces a handful of lines rather than thousands.

use std::convert::Infallible;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use realport_core::{FailureKind, FailureLog};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader, Lines, Stdin};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::session::{run_session, SessionContext};
use super::tls::TlsContext;
use super::transport::{connect_socket, ConnectError};
use crate::application::{HostnameVerifier, PeerVerifier, Resolver, SessionReport};
use crate::domain::DaemonConfig;

/// Conditions that stop the daemon.
#[derive(Debug, Error)]
pub enum FatalError {
    /// The host is out of descriptors or memory; retrying would spin.
    #[error("out of local resources: {0}")]
    SocketExhausted(#[source] ConnectError),
}

/// Result of one resolve/connect/session pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    ResolveFailed,
    ConnectFailed,
    SessionEnded(SessionReport),
}

/// Owns the device and reconnects to the remote unit for ever.
pub struct ConnectionManager<D> {
    config: DaemonConfig,
    device: D,
    resolver: Arc<dyn Resolver>,
    verifier: Arc<dyn PeerVerifier>,
    tls: Option<TlsContext>,
    failures: FailureLog,
    operator: Option<Lines<BufReader<Stdin>>>,
    wait_for_operator: bool,
    sessions: u64,
}

impl<D> ConnectionManager<D>
where
    D: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a manager.  `tls` must be present exactly when the configured
    /// security mode uses TLS.
    pub fn new(
        config: DaemonConfig,
        device: D,
        resolver: Arc<dyn Resolver>,
        tls: Option<TlsContext>,
    ) -> Self {
        let verifier = Arc::new(HostnameVerifier::new(Arc::clone(&resolver)));
        let wait_for_operator = config.interactive;
        Self {
            config,
            device,
            resolver,
            verifier,
            tls,
            failures: FailureLog::new(),
            operator: None,
            wait_for_operator,
            sessions: 0,
        }
    }

    /// Replaces the default host-name peer verifier.
    pub fn with_verifier(mut self, verifier: Arc<dyn PeerVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    /// Number of sessions started so far.
    pub fn sessions(&self) -> u64 {
        self.sessions
    }

    /// Runs attempts for ever, pausing between them.
    ///
    /// # Errors
    ///
    /// Returns only on a [`FatalError`].
    pub async fn run(&mut self) -> Result<Infallible, FatalError> {
        info!(
            endpoint = %self.config.endpoint,
            security = %self.config.security,
            "relay started"
        );
        loop {
            match self.run_attempt().await? {
                AttemptOutcome::SessionEnded(_) => self.pause_after_session().await,
                AttemptOutcome::ResolveFailed | AttemptOutcome::ConnectFailed => {
                    sleep(self.config.retry_delay).await;
                }
            }
        }
    }

    /// Performs exactly one resolve, connect and session pass.
    ///
    /// # Errors
    ///
    /// Returns [`FatalError::SocketExhausted`] when no socket can be created
    /// for lack of resources.  Every other failure is an [`AttemptOutcome`].
    pub async fn run_attempt(&mut self) -> Result<AttemptOutcome, FatalError> {
        let endpoint = self.config.endpoint.clone();

        let ip = match self.resolver.resolve(&endpoint.host, endpoint.family).await {
            Ok(ip) => ip,
            Err(e) => {
                self.report_failure(FailureKind::Resolve, &e);
                return Ok(AttemptOutcome::ResolveFailed);
            }
        };
        let addr = SocketAddr::new(ip, endpoint.port);

        let stream = match connect_socket(addr).await {
            Ok(stream) => stream,
            Err(e) if e.is_resource_exhaustion() => return Err(FatalError::SocketExhausted(e)),
            Err(e @ ConnectError::Socket { .. }) => {
                self.report_failure(FailureKind::SocketAllocation, &e);
                return Ok(AttemptOutcome::ConnectFailed);
            }
            Err(e @ ConnectError::Connect { .. }) => {
                self.report_failure(FailureKind::Connect, &e);
                return Ok(AttemptOutcome::ConnectFailed);
            }
        };
        self.failures.clear();
        self.sessions += 1;

        let span = info_span!("session", id = %Uuid::new_v4(), peer = %addr);
        let ctx = SessionContext {
            config: &self.config,
            tls: self.tls.as_ref(),
            verifier: self.verifier.as_ref(),
        };
        let device = &mut self.device;
        let report = async move {
            info!(event = "connected", host = %ctx.config.endpoint.host, "connected to remote");
            let report = run_session(device, stream, addr, ctx).await;
            log_session_end(&report, ctx.config.verbose);
            report
        }
        .instrument(span)
        .await;

        Ok(AttemptOutcome::SessionEnded(report))
    }

    fn report_failure(&mut self, kind: FailureKind, error: &dyn fmt::Display) {
        let now = Instant::now().into_std();
        if self.failures.should_report(kind, now) {
            warn!(
                event = kind.label(),
                endpoint = %self.config.endpoint,
                error = %error,
                retry_secs = self.config.retry_delay.as_secs(),
                "cannot reach remote; retrying (repeats suppressed for an hour)"
            );
        } else {
            debug!(event = kind.label(), error = %error, "still cannot reach remote");
        }
    }

    /// Waits before the next attempt after a session: for the operator to
    /// press Enter in interactive mode, otherwise the retry delay.  If stdin
    /// closes, interactive waiting is abandoned for good.
    async fn pause_after_session(&mut self) {
        if self.wait_for_operator {
            let lines = self
                .operator
                .get_or_insert_with(|| BufReader::new(tokio::io::stdin()).lines());
            info!("session over; press Enter to reconnect");
            match lines.next_line().await {
                Ok(Some(_)) => return,
                Ok(None) => debug!("stdin closed; reconnecting on a timer from now on"),
                Err(e) => debug!(error = %e, "stdin unreadable; reconnecting on a timer from now on"),
            }
            self.wait_for_operator = false;
            self.operator = None;
        }
        sleep(self.config.retry_delay).await;
    }
}

fn log_session_end(report: &SessionReport, verbose: bool) {
    let stats = &report.stats;
    if report.end.is_error() {
        warn!(
            event = "session_ended",
            reason = %report.end,
            bytes_in = stats.bytes_from_remote,
            bytes_out = stats.bytes_to_remote,
            idle_trips = stats.idle_trips,
            "session ended"
        );
    } else if verbose {
        info!(
            event = "session_ended",
            reason = %report.end,
            bytes_in = stats.bytes_from_remote,
            bytes_out = stats.bytes_to_remote,
            idle_trips = stats.idle_trips,
            "session ended"
        );
    } else {
        debug!(event = "session_ended", reason = %report.end, "session ended");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::resolve::MockResolver;
    use realport_core::SessionEnd;
    use std::net::IpAddr;
    use std::time::Duration;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn loopback() -> IpAddr {
        "127.0.0.1".parse().unwrap()
    }

    fn config_for(port: u16) -> DaemonConfig {
        let mut config = DaemonConfig::new("/dev/null", "ts16.test");
        config.endpoint.port = port;
        config
    }

    #[tokio::test]
    async fn test_resolve_failure_is_retryable_outcome() {
        // Arrange
        let mut resolver = MockResolver::new();
        resolver
            .expect_resolve()
            .times(1)
            .returning(|_, _| Err(io::Error::new(io::ErrorKind::NotFound, "no such host")));
        let (device, _driver) = duplex(64);
        let mut manager = ConnectionManager::new(config_for(771), device, Arc::new(resolver), None);

        // Act
        let outcome = manager.run_attempt().await.unwrap();

        // Assert
        assert_eq!(outcome, AttemptOutcome::ResolveFailed);
        assert_eq!(manager.sessions(), 0);
    }

    #[tokio::test]
    async fn test_refused_connect_is_retryable_outcome() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let mut resolver = MockResolver::new();
        resolver.expect_resolve().returning(|_, _| Ok(loopback()));
        let (device, _driver) = duplex(64);
        let mut manager = ConnectionManager::new(config_for(port), device, Arc::new(resolver), None);

        let outcome = manager.run_attempt().await.unwrap();

        assert_eq!(outcome, AttemptOutcome::ConnectFailed);
    }

    #[tokio::test]
    async fn test_plain_session_relays_and_reports_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"login: ").await.unwrap();
        });
        let mut resolver = MockResolver::new();
        resolver
            .expect_resolve()
            .withf(|host, _| host == "ts16.test")
            .returning(|_, _| Ok(loopback()));
        let (device, mut driver) = duplex(64);
        let mut manager = ConnectionManager::new(config_for(port), device, Arc::new(resolver), None);

        let outcome = manager.run_attempt().await.unwrap();

        server.await.unwrap();
        let AttemptOutcome::SessionEnded(report) = outcome else {
            panic!("expected a session, got {outcome:?}");
        };
        assert_eq!(report.end, SessionEnd::RemoteClosed);
        let mut buf = [0u8; 7];
        driver.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"login: ");
        assert_eq!(manager.sessions(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_retries_every_ten_seconds() {
        // Arrange
        let mut resolver = MockResolver::new();
        resolver
            .expect_resolve()
            .times(4)
            .returning(|_, _| Err(io::Error::new(io::ErrorKind::NotFound, "no such host")));
        let (device, _driver) = duplex(64);
        let mut manager = ConnectionManager::new(config_for(771), device, Arc::new(resolver), None);

        // Act: attempts at 0s, 10s, 20s and 30s fit in 35s.
        let result = tokio::time::timeout(Duration::from_secs(35), manager.run()).await;

        // Assert
        assert!(result.is_err(), "run must never return on its own");
    }

    #[tokio::test]
    async fn test_failure_log_is_cleared_by_a_successful_connect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let _ = listener.accept().await;
        });
        let mut resolver = MockResolver::new();
        resolver.expect_resolve().returning(|_, _| Ok(loopback()));
        let (device, _driver) = duplex(64);
        let mut manager = ConnectionManager::new(config_for(port), device, Arc::new(resolver), None);
        manager
            .failures
            .should_report(FailureKind::Connect, Instant::now().into_std());

        manager.run_attempt().await.unwrap();

        assert!(manager
            .failures
            .should_report(FailureKind::Connect, Instant::now().into_std()));
    }
}
