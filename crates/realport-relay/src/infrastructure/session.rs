//! One session over a connected socket.
//!
//! ```text
//! plain:    connected ──────────────────────────────────▶ relaying ─▶ ended
//! secure:   connected ─▶ handshake ─▶ (verify) peer check ─▶ relaying ─▶ ended
//! ```
//!
//! A handshake or peer-check failure ends the session the same way a relay
//! termination does; the caller reconnects in every case.

use std::net::SocketAddr;

use realport_core::{PeerCheckError, PeerIdentity, SessionEnd};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tracing::{debug, info, warn};

use super::tls::TlsContext;
use super::transport::SessionStream;
use crate::application::{
    relay, ExpectedPeer, PeerVerifier, RelayOptions, SessionReport, Transport,
};
use crate::domain::DaemonConfig;

/// Everything a session needs besides the device and the socket.
#[derive(Clone, Copy)]
pub struct SessionContext<'a> {
    pub config: &'a DaemonConfig,
    /// `None` for plain sessions.
    pub tls: Option<&'a TlsContext>,
    pub verifier: &'a dyn PeerVerifier,
}

impl SessionContext<'_> {
    fn relay_options(&self) -> RelayOptions {
        RelayOptions {
            idle_timeout: self.config.idle_timeout,
            verbose: self.config.verbose,
        }
    }
}

/// Drives one session on `stream`, connected to `peer`, until it ends.
///
/// The socket is closed when this returns; the device is not.
pub async fn run_session<D>(
    device: &mut D,
    stream: TcpStream,
    peer: SocketAddr,
    ctx: SessionContext<'_>,
) -> SessionReport
where
    D: AsyncRead + AsyncWrite + Unpin,
{
    let Some(tls) = ctx.tls else {
        let mut remote = SessionStream::Plain(stream);
        return relay(device, &mut remote, ctx.relay_options()).await;
    };

    let host = &ctx.config.endpoint.host;
    let secured = match tls.connect(host, stream).await {
        Ok(secured) => secured,
        Err(e) => {
            warn!(event = "handshake_failed", error = %e, "TLS handshake failed");
            return SessionReport::aborted(SessionEnd::HandshakeFailed {
                detail: e.to_string(),
            });
        }
    };

    if ctx.config.security.verifies_peer() {
        if let Err(e) = check_peer(&secured, peer, ctx).await {
            warn!(event = "peer_check_failed", error = %e, "server identity rejected");
            if let Err(err) = secured.get_ref().0.shutdown_both() {
                debug!(error = %err, "socket shutdown after failed peer check");
            }
            return SessionReport::aborted(SessionEnd::PeerCheckFailed {
                detail: e.to_string(),
            });
        }
        info!(host = %host, "server identity verified");
    }

    let mut remote = SessionStream::Tls(Box::new(secured));
    relay(device, &mut remote, ctx.relay_options()).await
}

async fn check_peer(
    stream: &TlsStream<TcpStream>,
    peer: SocketAddr,
    ctx: SessionContext<'_>,
) -> Result<(), PeerCheckError> {
    let leaf = stream
        .get_ref()
        .1
        .peer_certificates()
        .and_then(|chain| chain.first())
        .ok_or(PeerCheckError::NoCertificate)?;
    let identity = PeerIdentity::from_der(leaf.as_ref())?;
    debug!(
        dns_names = ?identity.dns_names,
        common_name = ?identity.common_name,
        "checking server identity"
    );

    let expected = ExpectedPeer {
        host: ctx.config.endpoint.host.clone(),
        connected: peer.ip(),
        family: ctx.config.endpoint.family,
    };
    ctx.verifier.verify(&identity, &expected).await
}
