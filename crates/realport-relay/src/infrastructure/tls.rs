//! TLS client setup for the secure RealPort port.
//!
//! Two verification policies are built here:
//!
//! - **encrypt**: any certificate is accepted.  Handshake signatures are
//!   still checked so the session key is bound to the presented key, but
//!   nothing ties that key to the remote unit.
//! - **verify** (and **mutual**): the certificate must chain to a trusted
//!   root.  A host-name mismatch is *not* a handshake error; whether the
//!   certificate belongs to the configured host is decided after the
//!   handshake by the application's peer check, which also accepts a common
//!   name that resolves to the connected address.
//!
//! The ring provider is used explicitly so no process-wide default provider
//! has to be installed.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use realport_core::SecurityMode;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::{VerifierBuilderError, WebPkiServerVerifier};
use rustls::crypto::{
    verify_tls12_signature, verify_tls13_signature, CryptoProvider, WebPkiSupportedAlgorithms,
};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{CertificateError, ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, info, warn};

/// Errors raised while building the TLS client.  All of them are fatal at
/// startup.
#[derive(Debug, Error)]
pub enum TlsSetupError {
    #[error("cannot read CA file {path}: {source}")]
    CaFile {
        path: PathBuf,
        #[source]
        source: rustls::pki_types::pem::Error,
    },

    #[error("CA file {0} contains no certificates")]
    EmptyCaFile(PathBuf),

    #[error("security mode {0} does not use TLS")]
    NotSecure(SecurityMode),

    #[error("TLS configuration rejected: {0}")]
    Config(#[from] rustls::Error),

    #[error("cannot build certificate verifier: {0}")]
    Verifier(#[from] VerifierBuilderError),
}

/// Client TLS configuration shared by every session of the process.
#[derive(Clone)]
pub struct TlsContext {
    connector: TlsConnector,
    mode: SecurityMode,
}

impl std::fmt::Debug for TlsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsContext").field("mode", &self.mode).finish()
    }
}

fn provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

impl TlsContext {
    /// Builds the client for `mode`.  `extra_roots` are trusted in addition
    /// to the platform store and only matter when the mode verifies peers.
    pub fn new(
        mode: SecurityMode,
        extra_roots: Vec<CertificateDer<'static>>,
    ) -> Result<Self, TlsSetupError> {
        if !mode.is_secure() {
            return Err(TlsSetupError::NotSecure(mode));
        }
        if mode == SecurityMode::MutualAuth {
            warn!("mutual authentication is not implemented; verifying the server only");
        }

        let provider = provider();
        let verifier: Arc<dyn ServerCertVerifier> = if mode.verifies_peer() {
            let roots = trust_anchors(extra_roots);
            let inner =
                WebPkiServerVerifier::builder_with_provider(Arc::new(roots), provider.clone())
                    .build()?;
            Arc::new(ChainOnlyVerifier { inner })
        } else {
            Arc::new(AcceptAnyServer {
                algorithms: provider.signature_verification_algorithms,
            })
        };

        let config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()?
            .dangerous()
            .with_custom_certificate_verifier(verifier)
            .with_no_client_auth();

        Ok(Self {
            connector: TlsConnector::from(Arc::new(config)),
            mode,
        })
    }

    pub fn mode(&self) -> SecurityMode {
        self.mode
    }

    /// Runs the client handshake over `stream`, naming `host` as the server.
    ///
    /// Would-block conditions during the handshake are absorbed by the
    /// runtime; an error here is a hard protocol or system failure.
    pub async fn connect(&self, host: &str, stream: TcpStream) -> io::Result<TlsStream<TcpStream>> {
        let bare = host.trim_start_matches('[').trim_end_matches(']');
        let name = ServerName::try_from(bare.to_string())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let stream = self.connector.connect(name, stream).await?;
        debug!(
            protocol = ?stream.get_ref().1.protocol_version(),
            suite = ?stream.get_ref().1.negotiated_cipher_suite().map(|s| s.suite()),
            "TLS handshake complete"
        );
        Ok(stream)
    }
}

/// Reads every certificate from a PEM file.
pub fn load_ca_file(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsSetupError> {
    let to_err = |source| TlsSetupError::CaFile {
        path: path.to_path_buf(),
        source,
    };
    let certs = CertificateDer::pem_file_iter(path)
        .map_err(to_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(to_err)?;
    if certs.is_empty() {
        return Err(TlsSetupError::EmptyCaFile(path.to_path_buf()));
    }
    Ok(certs)
}

/// Platform roots, or the bundled Mozilla set when the platform has none,
/// plus any operator-supplied anchors.
fn trust_anchors(extra: Vec<CertificateDer<'static>>) -> RootCertStore {
    let mut roots = RootCertStore::empty();

    let native = rustls_native_certs::load_native_certs();
    for err in &native.errors {
        debug!(error = %err, "skipping unreadable platform certificate");
    }
    let (platform, _) = roots.add_parsable_certificates(native.certs);
    if roots.is_empty() {
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        debug!("platform trust store empty, using bundled roots");
    }

    let supplied = extra.len();
    let (added, ignored) = roots.add_parsable_certificates(extra);
    if ignored > 0 {
        warn!(ignored, supplied, "some CA file certificates could not be used");
    }
    info!(platform, extra = added, total = roots.len(), "trust anchors loaded");
    roots
}

/// Chain validation without the host-name check.
#[derive(Debug)]
struct ChainOnlyVerifier {
    inner: Arc<WebPkiServerVerifier>,
}

/// Both the plain and the context-carrying name-mismatch variants.
fn is_name_mismatch(err: &CertificateError) -> bool {
    matches!(
        err,
        CertificateError::NotValidForName | CertificateError::NotValidForNameContext { .. }
    )
}

impl ServerCertVerifier for ChainOnlyVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        match self
            .inner
            .verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)
        {
            Err(rustls::Error::InvalidCertificate(ref err)) if is_name_mismatch(err) => {
                debug!("certificate chain valid; host name left to the peer check");
                Ok(ServerCertVerified::assertion())
            }
            other => other,
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

/// Accepts any server certificate but still checks handshake signatures.
#[derive(Debug)]
struct AcceptAnyServer {
    algorithms: WebPkiSupportedAlgorithms,
}

impl ServerCertVerifier for AcceptAnyServer {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.algorithms.supported_schemes()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
