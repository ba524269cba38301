//! Infrastructure layer for the relay daemon.
//!
//! Contains the OS-facing adapters: the device node, sockets, TLS, name
//! resolution and the reconnect loop that ties them to the application
//! layer's relay engine.
//!
//! **Dependency rule**: this layer may depend on `application`, `domain` and
//! `realport_core`, but MUST NOT be imported by the `application` or domain
//! layers.
//!
//! # Sub-modules
//!
//! - **`connection_manager`** – resolve, connect, run a session, pause,
//!   repeat.  Owns the device for the life of the process.
//! - **`device`** – non-blocking handle to the virtual-serial device node,
//!   opened under a watchdog.
//! - **`resolver`** – [`SystemResolver`], the production `Resolver`.
//! - **`session`** – one session over a connected socket: optional TLS
//!   handshake and peer check, then the relay.
//! - **`sys`** – the few raw `libc` calls: link ioctl, full socket shutdown.
//! - **`tls`** – rustls client configuration and verification policies.
//! - **`transport`** – socket creation and the plain/TLS stream wrapper.

pub mod connection_manager;
pub mod device;
pub mod resolver;
pub mod session;
pub mod sys;
pub mod tls;
pub mod transport;

pub use connection_manager::{AttemptOutcome, ConnectionManager, FatalError};
pub use device::{DeviceError, DeviceHandle};
pub use resolver::SystemResolver;
pub use session::{run_session, SessionContext};
pub use tls::{load_ca_file, TlsContext, TlsSetupError};
pub use transport::{connect_socket, ConnectError, SessionStream};
