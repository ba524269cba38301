//! Structured outcomes of connection attempts and relay sessions.

use std::fmt;

/// Connection-phase failures that are retried forever and therefore have
/// their log lines rate limited by [`FailureLog`](super::failure_log::FailureLog).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The remote host name did not resolve to an address of the
    /// configured family.
    Resolve,
    /// A socket could not be created for a reason other than local
    /// resource exhaustion.
    SocketAllocation,
    /// The TCP connect was refused, timed out or was unreachable.
    Connect,
}

impl FailureKind {
    /// Stable name used as the `event` field of log records.
    pub fn label(self) -> &'static str {
        match self {
            Self::Resolve => "resolve_failed",
            Self::SocketAllocation => "socket_failed",
            Self::Connect => "connect_failed",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Why a relay session finished.
///
/// Every variant means the same thing to the connection manager: close the
/// socket, pause, resolve again.  The distinction only matters for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// The remote closed or reset the connection, or the socket was shut
    /// down locally by the idle timeout.
    RemoteClosed,
    /// Reading from the remote failed with an unexpected error.
    RemoteReadFailed { detail: String },
    /// The device did not accept everything read from the remote.
    DeviceWriteFailed { detail: String },
    /// Reading from the device failed.
    DeviceReadFailed { detail: String },
    /// Sending device data to the remote failed.
    SendFailed { detail: String },
    /// The remote accepted zero bytes of a send.
    RemoteRefused,
    /// The driver asked for the connection to be torn down.
    ProtocolReset,
    /// TLS negotiation failed.
    HandshakeFailed { detail: String },
    /// The server certificate does not belong to the configured host.
    PeerCheckFailed { detail: String },
}

impl SessionEnd {
    /// Whether this end should be reported as a failure.  An orderly close
    /// and a driver-requested reset are normal ends.
    pub fn is_error(&self) -> bool {
        !matches!(self, Self::RemoteClosed | Self::ProtocolReset)
    }

    /// Stable name used as the `event` field of log records.
    pub fn label(&self) -> &'static str {
        match self {
            Self::RemoteClosed => "remote_closed",
            Self::RemoteReadFailed { .. } => "socket_read_failed",
            Self::DeviceWriteFailed { .. } => "device_write_failed",
            Self::DeviceReadFailed { .. } => "device_read_failed",
            Self::SendFailed { .. } => "socket_send_failed",
            Self::RemoteRefused => "socket_send_refused",
            Self::ProtocolReset => "protocol_reset",
            Self::HandshakeFailed { .. } => "handshake_failed",
            Self::PeerCheckFailed { .. } => "peer_check_failed",
        }
    }

    /// Diagnostic detail, when the end carries one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::RemoteReadFailed { detail }
            | Self::DeviceWriteFailed { detail }
            | Self::DeviceReadFailed { detail }
            | Self::SendFailed { detail }
            | Self::HandshakeFailed { detail }
            | Self::PeerCheckFailed { detail } => Some(detail),
            Self::RemoteClosed | Self::RemoteRefused | Self::ProtocolReset => None,
        }
    }
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.detail() {
            Some(detail) => write!(f, "{}: {detail}", self.label()),
            None => f.write_str(self.label()),
        }
    }
}
