//! realport-relay library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the `drpd` binary in `main.rs` share the same module tree.
//!
//! # What does drpd do?
//!
//! A Digi terminal server exposes its serial ports over the network using
//! the RealPort protocol.  The host side sees each remote port as a local
//! virtual-serial device node.  `drpd` is the bridge between the two: it
//! keeps one TCP (optionally TLS) connection to the unit open and copies
//! bytes between that connection and the device, in both directions,
//! without interpreting them.
//!
//! When the connection drops for any reason the daemon pauses and
//! reconnects, resolving the host name afresh each time.  It exits only when
//! the device cannot be opened, the configuration is invalid, or the host
//! runs out of sockets.
//!
//! # Layers
//!
//! - [`domain`]: the immutable daemon configuration and its TOML file.
//! - [`application`]: the relay engine and the peer identity check, written
//!   against traits.
//! - [`infrastructure`]: device, sockets, TLS, resolver and the reconnect
//!   loop.

/// Domain layer: daemon configuration.
pub mod domain;

/// Application layer: relay engine and peer check.
pub mod application;

/// Infrastructure layer: OS adapters and the connection manager.
pub mod infrastructure;
