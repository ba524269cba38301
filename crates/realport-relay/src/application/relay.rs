//! The relay loop: one session's worth of byte shuffling.
//!
//! [`relay`] waits for whichever side becomes readable first, moves what it
//! read to the other side, and returns when the session is over.  It never
//! closes the device and never retries; the caller drops the transport and
//! starts a new connection.
//!
//! # Idle timeout
//!
//! When an idle timeout is configured and the remote has been silent for
//! that long, the socket is shut down in both directions.  The loop does not
//! return at that point: the next read from the shut-down socket reports
//! end-of-stream and the session ends through the normal close path.

use std::io;
use std::time::Duration;

use realport_core::{SendBuffer, SessionEnd};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

/// Bytes moved per read, in either direction.
pub const RELAY_BUFFER_SIZE: usize = 8000;

/// A device packet starting with this byte asks for the connection to be
/// dropped.  The packet itself is not forwarded.
pub const PROTOCOL_RESET_MARKER: u8 = 0xFF;

/// The remote side of a session.
///
/// `shutdown_both` must take effect immediately and without `&mut self`:
/// it is how the idle timeout and the protocol reset force the next read
/// to return end-of-stream.
pub trait Transport: AsyncRead + AsyncWrite + Unpin {
    fn shutdown_both(&self) -> io::Result<()>;
}

/// Per-session relay settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayOptions {
    /// Remote silence after which the socket is shut down.  `None` disables
    /// the check.
    pub idle_timeout: Option<Duration>,
    /// Report orderly disconnects at `info` instead of `debug`.
    pub verbose: bool,
}

/// Counters reported when a session ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub bytes_from_remote: u64,
    pub bytes_to_remote: u64,
    /// How many times the idle timeout shut the socket down.
    pub idle_trips: u32,
}

/// Outcome of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub end: SessionEnd,
    pub stats: SessionStats,
}

impl SessionReport {
    /// A session that ended before any byte was relayed.
    pub fn aborted(end: SessionEnd) -> Self {
        Self {
            end,
            stats: SessionStats::default(),
        }
    }
}

/// What woke the relay loop.
enum Readiness {
    Remote(io::Result<usize>),
    Device(io::Result<usize>),
    IdleDeadline,
}

/// Relays bytes between `device` and `remote` until the session ends.
///
/// Remote data is written to the device with a single write; anything less
/// than a complete write ends the session.  Device data is sent to the
/// remote until fully accepted.
pub async fn relay<D, T>(device: &mut D, remote: &mut T, options: RelayOptions) -> SessionReport
where
    D: AsyncRead + AsyncWrite + Unpin,
    T: Transport,
{
    let mut net_buf = vec![0u8; RELAY_BUFFER_SIZE];
    let mut dev_buf = vec![0u8; RELAY_BUFFER_SIZE];
    let mut outbound = SendBuffer::with_capacity(RELAY_BUFFER_SIZE);
    let mut stats = SessionStats::default();
    let mut last_read = Instant::now();

    loop {
        let mut deadline = idle_deadline_after(last_read, options.idle_timeout);
        if deadline.is_some_and(|at| Instant::now() >= at) {
            warn!(
                event = "idle_timeout",
                timeout_secs = options.idle_timeout.map(|t| t.as_secs()),
                "no data from remote, shutting the connection down"
            );
            if let Err(e) = remote.shutdown_both() {
                debug!(error = %e, "socket shutdown after idle timeout failed");
            }
            last_read = Instant::now();
            stats.idle_trips += 1;
            deadline = idle_deadline_after(last_read, options.idle_timeout);
        }

        let ready = tokio::select! {
            r = remote.read(&mut net_buf) => Readiness::Remote(r),
            r = device.read(&mut dev_buf) => Readiness::Device(r),
            () = idle_deadline(deadline) => Readiness::IdleDeadline,
        };

        match ready {
            Readiness::IdleDeadline => continue,

            Readiness::Remote(Ok(0)) => {
                log_disconnect(options.verbose, "remote closed the connection");
                return SessionReport { end: SessionEnd::RemoteClosed, stats };
            }
            Readiness::Remote(Ok(n)) => {
                last_read = Instant::now();
                stats.bytes_from_remote += n as u64;
                if let Err(end) = write_device(device, &net_buf[..n]).await {
                    return SessionReport { end, stats };
                }
            }
            Readiness::Remote(Err(e)) if is_disconnect(&e) => {
                log_disconnect(options.verbose, &format!("remote disconnected: {e}"));
                return SessionReport { end: SessionEnd::RemoteClosed, stats };
            }
            Readiness::Remote(Err(e)) => {
                warn!(event = "socket_read_failed", error = %e, "read from remote failed");
                let end = SessionEnd::RemoteReadFailed {
                    detail: e.to_string(),
                };
                return SessionReport { end, stats };
            }

            Readiness::Device(Err(e)) => {
                warn!(event = "device_read_failed", error = %e, "read from device failed");
                let end = SessionEnd::DeviceReadFailed {
                    detail: e.to_string(),
                };
                return SessionReport { end, stats };
            }
            // A zero-length device read carries nothing to forward.
            Readiness::Device(Ok(0)) => {}
            Readiness::Device(Ok(n)) => {
                outbound.load(&dev_buf[..n]);
                if outbound.first_byte() == Some(PROTOCOL_RESET_MARKER) {
                    info!(event = "protocol_reset", "driver requested a connection reset");
                    if let Err(e) = remote.shutdown_both() {
                        debug!(error = %e, "socket shutdown after protocol reset failed");
                    }
                    return SessionReport { end: SessionEnd::ProtocolReset, stats };
                }
                if let Err(end) = send_all(remote, &mut outbound).await {
                    warn!(event = end.label(), detail = ?end.detail(), "send to remote failed");
                    // Tell the driver the data went nowhere.
                    if let Err(e) = device.write(&[]).await {
                        debug!(error = %e, "close notice to device failed");
                    }
                    return SessionReport { end, stats };
                }
                stats.bytes_to_remote += n as u64;
            }
        }
    }
}

/// When the idle check next fires.  A timeout too large to add to `from`
/// never fires.
fn idle_deadline_after(from: Instant, timeout: Option<Duration>) -> Option<Instant> {
    timeout.and_then(|timeout| from.checked_add(timeout))
}

async fn idle_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Writes one remote packet to the device in a single call.
async fn write_device<D>(device: &mut D, data: &[u8]) -> Result<(), SessionEnd>
where
    D: AsyncWrite + Unpin,
{
    match device.write(data).await {
        Ok(written) if written == data.len() => Ok(()),
        Ok(written) => {
            warn!(
                event = "device_write_failed",
                written,
                expected = data.len(),
                "short write to device"
            );
            Err(SessionEnd::DeviceWriteFailed {
                detail: format!("short write: {written} of {} bytes", data.len()),
            })
        }
        Err(e) => {
            warn!(event = "device_write_failed", error = %e, "write to device failed");
            Err(SessionEnd::DeviceWriteFailed {
                detail: e.to_string(),
            })
        }
    }
}

/// Offers the unsent remainder of `buf` to the remote until all of it is
/// accepted, then flushes.
async fn send_all<T>(remote: &mut T, buf: &mut SendBuffer) -> Result<(), SessionEnd>
where
    T: Transport,
{
    while !buf.is_drained() {
        match remote.write(buf.remaining()).await {
            Ok(0) => return Err(SessionEnd::RemoteRefused),
            Ok(n) => buf.advance(n),
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted) => {
                tokio::task::yield_now().await;
            }
            Err(e) => {
                return Err(SessionEnd::SendFailed {
                    detail: e.to_string(),
                })
            }
        }
    }
    remote.flush().await.map_err(|e| SessionEnd::SendFailed {
        detail: e.to_string(),
    })
}

/// Errors that mean the peer went away rather than that something broke.
fn is_disconnect(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::BrokenPipe
    )
}

fn log_disconnect(verbose: bool, message: &str) {
    if verbose {
        info!(event = "remote_closed", "{message}");
    } else {
        debug!(event = "remote_closed", "{message}");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
