//! Daemon configuration.
//!
//! [`DaemonConfig`] is built once in `main` from the command line and the
//! optional configuration file, then passed by reference to the connection
//! manager.  It is never mutated afterwards.

use std::path::PathBuf;
use std::time::Duration;

use realport_core::{AddressFamily, Endpoint, LinkConfig, SecurityMode};

/// Pause between a failed resolve or connect and the next attempt, and
/// between sessions when not running interactively.
pub const RETRY_DELAY: Duration = Duration::from_secs(10);

/// How long the initial device open may block before startup is abandoned.
pub const DEVICE_OPEN_WATCHDOG: Duration = Duration::from_secs(5);

/// Largest accepted idle timeout, one week.
pub const MAX_IDLE_TIMEOUT_SECS: u64 = 7 * 24 * 60 * 60;

/// All runtime settings of the daemon.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Path of the local virtual-serial device node.
    pub device: PathBuf,

    /// The remote unit.  The port already reflects the security default
    /// when the operator did not choose one.
    pub endpoint: Endpoint,

    pub security: SecurityMode,

    /// Link parameters pushed to the device once at startup, if given.
    pub link: Option<LinkConfig>,

    /// Close the session when the remote has been silent this long.
    /// `None` disables the idle check entirely.
    pub idle_timeout: Option<Duration>,

    /// Wait for the operator to press Enter between sessions instead of
    /// sleeping for [`RETRY_DELAY`].
    pub interactive: bool,

    /// Report orderly disconnects and other routine events at `info`.
    pub verbose: bool,

    /// Extra PEM trust anchors for server verification.
    pub ca_file: Option<PathBuf>,

    /// Delay used between attempts.  Always [`RETRY_DELAY`] outside tests.
    pub retry_delay: Duration,
}

impl DaemonConfig {
    /// A configuration with defaults for everything but the device and host.
    pub fn new(device: impl Into<PathBuf>, host: impl Into<String>) -> Self {
        let security = SecurityMode::default();
        Self {
            device: device.into(),
            endpoint: Endpoint::new(host, security.default_port(), AddressFamily::V4),
            security,
            link: None,
            idle_timeout: None,
            interactive: false,
            verbose: false,
            ca_file: None,
            retry_delay: RETRY_DELAY,
        }
    }

    /// Converts an idle timeout in whole seconds; zero disables it.
    /// Values above [`MAX_IDLE_TIMEOUT_SECS`] are clamped to it.
    pub fn idle_timeout_from_secs(secs: u64) -> Option<Duration> {
        (secs > 0).then(|| Duration::from_secs(secs.min(MAX_IDLE_TIMEOUT_SECS)))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
