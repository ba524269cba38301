//! Server identity check for verified TLS sessions.
//!
//! Runs after the handshake has proven that the certificate chains to a
//! trusted root.  The rules themselves live on
//! [`PeerIdentity`](realport_core::PeerIdentity); this module adds the
//! common-name lookup, which needs a resolver.

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use realport_core::{AddressFamily, AltNameCheck, PeerCheckError, PeerIdentity};

use super::resolve::Resolver;

/// What the certificate is checked against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedPeer {
    /// Host name exactly as configured.
    pub host: String,
    /// Address the socket is actually connected to.
    pub connected: IpAddr,
    pub family: AddressFamily,
}

/// Decides whether a presented identity belongs to the expected peer.
#[async_trait]
pub trait PeerVerifier: Send + Sync {
    async fn verify(
        &self,
        peer: &PeerIdentity,
        expected: &ExpectedPeer,
    ) -> Result<(), PeerCheckError>;
}

/// The default verifier: alternative names first, otherwise the common
/// name must resolve to the connected address.
pub struct HostnameVerifier {
    resolver: Arc<dyn Resolver>,
}

impl HostnameVerifier {
    pub fn new(resolver: Arc<dyn Resolver>) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl PeerVerifier for HostnameVerifier {
    async fn verify(
        &self,
        peer: &PeerIdentity,
        expected: &ExpectedPeer,
    ) -> Result<(), PeerCheckError> {
        match peer.match_alt_names(&expected.host) {
            AltNameCheck::Matched => Ok(()),
            AltNameCheck::Mismatch => Err(PeerCheckError::AltNameMismatch {
                expected: expected.host.clone(),
                presented: peer.dns_names.clone(),
            }),
            AltNameCheck::NoAltNames => {
                let name = peer
                    .common_name
                    .as_deref()
                    .ok_or(PeerCheckError::NoIdentity)?;
                let resolved = self
                    .resolver
                    .resolve(name, expected.family)
                    .await
                    .map_err(|e| PeerCheckError::CommonNameUnresolved {
                        name: name.to_string(),
                        detail: e.to_string(),
                    })?;
                if resolved == expected.connected {
                    Ok(())
                } else {
                    Err(PeerCheckError::AddressMismatch {
                        name: name.to_string(),
                        resolved,
                        connected: expected.connected,
                    })
                }
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
