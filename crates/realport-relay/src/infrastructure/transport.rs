//! TCP connection setup and the plain/TLS session stream.

use std::io;
use std::net::SocketAddr;
use std::os::fd::AsRawFd;
use std::pin::Pin;
use std::task::{Context, Poll};

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpSocket, TcpStream};
use tokio_rustls::client::TlsStream;
use tracing::debug;

use super::sys;
use crate::application::Transport;

/// Errors from opening a TCP connection.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The socket itself could not be created.
    #[error("cannot create socket for {addr}: {source}")]
    Socket {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// The connect was refused, timed out, or the network is unreachable.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
}

impl ConnectError {
    /// Socket creation failed because the host ran out of descriptors or
    /// memory.  Retrying cannot help.
    pub fn is_resource_exhaustion(&self) -> bool {
        match self {
            Self::Socket { source, .. } => sys::is_resource_exhaustion(source),
            Self::Connect { .. } => false,
        }
    }
}

/// Opens a TCP connection of the address's family with Nagle disabled.
pub async fn connect_socket(addr: SocketAddr) -> Result<TcpStream, ConnectError> {
    let socket = match addr {
        SocketAddr::V4(_) => TcpSocket::new_v4(),
        SocketAddr::V6(_) => TcpSocket::new_v6(),
    }
    .map_err(|source| ConnectError::Socket { addr, source })?;

    let stream = socket
        .connect(addr)
        .await
        .map_err(|source| ConnectError::Connect { addr, source })?;

    if let Err(e) = stream.set_nodelay(true) {
        debug!(error = %e, "could not disable Nagle on the session socket");
    }
    Ok(stream)
}

impl Transport for TcpStream {
    fn shutdown_both(&self) -> io::Result<()> {
        sys::shutdown_both(self.as_raw_fd())
    }
}

/// The remote side of a session, with or without TLS.
pub enum SessionStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl SessionStream {
    fn tcp(&self) -> &TcpStream {
        match self {
            Self::Plain(s) => s,
            Self::Tls(s) => s.get_ref().0,
        }
    }
}

impl Transport for SessionStream {
    fn shutdown_both(&self) -> io::Result<()> {
        self.tcp().shutdown_both()
    }
}

impl AsyncRead for SessionStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_read(cx, buf),
            Self::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for SessionStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_write(cx, buf),
            Self::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_flush(cx),
            Self::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(s) => Pin::new(s).poll_shutdown(cx),
            Self::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}
