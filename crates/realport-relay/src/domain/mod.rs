//! Domain layer for the relay daemon.
//!
//! Holds the startup configuration only.  Nothing here opens files or
//! sockets except [`file_config::FileConfig::load`], which reads the optional
//! TOML file once before the daemon starts.

pub mod config;
pub mod file_config;

pub use config::{DaemonConfig, DEVICE_OPEN_WATCHDOG, MAX_IDLE_TIMEOUT_SECS, RETRY_DELAY};
pub use file_config::{ConfigError, FileConfig};
