//! # realport-core
//!
//! Shared library for the RealPort relay daemon (`drpd`).
//!
//! The daemon keeps one long-lived connection to a Digi RealPort terminal
//! server and relays raw bytes between it and a local virtual-serial device.
//! This crate holds everything about that job that does not touch a socket
//! or a file descriptor, so it can be tested without a network or a device:
//!
//! - **`domain`** – The values fixed at startup: the [`LinkConfig`] pushed to
//!   the device driver, the [`SecurityMode`], the remote [`Endpoint`], and the
//!   [`PeerIdentity`] extracted from a server certificate.
//!
//! - **`diagnostics`** – How failures are described and rate-limited: the
//!   [`FailureLog`] that suppresses repeated connection errors, and the
//!   [`SessionEnd`] reasons a relay session can finish with.
//!
//! - **`buffer`** – The [`SendBuffer`] that tracks the unsent remainder of a
//!   packet while it is offered to the network.

pub mod buffer;
pub mod diagnostics;
pub mod domain;

pub use buffer::SendBuffer;
pub use diagnostics::events::{FailureKind, SessionEnd};
pub use diagnostics::failure_log::{FailureLog, REPEAT_SUPPRESSION};
pub use domain::endpoint::{AddressFamily, Endpoint};
pub use domain::link::{LinkConfig, LinkConfigError};
pub use domain::peer::{AltNameCheck, PeerCheckError, PeerIdentity};
pub use domain::security::{
    SecurityMode, UnknownSecurityMode, DEFAULT_PLAIN_PORT, DEFAULT_SECURE_PORT,
};
