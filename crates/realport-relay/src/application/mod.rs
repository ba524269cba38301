//! Application layer for the relay daemon.
//!
//! Knows *what* a session does: move bytes between the device and the
//! remote, end on the right conditions, and decide whether a server
//! certificate belongs to the configured host.  Sockets, TLS and the device
//! file are supplied by the infrastructure layer through the traits defined
//! here.

pub mod peer_check;
pub mod relay;
pub mod resolve;

pub use peer_check::{ExpectedPeer, HostnameVerifier, PeerVerifier};
pub use relay::{
    relay, RelayOptions, SessionReport, SessionStats, Transport, PROTOCOL_RESET_MARKER,
    RELAY_BUFFER_SIZE,
};
pub use resolve::Resolver;
