//! Identity presented by the remote unit's certificate.
//!
//! The TLS layer only checks that the certificate chains to a trusted root.
//! Whether the certificate actually belongs to the host the operator named
//! is decided here and in the relay's peer checker, using two rules:
//!
//! 1. If the certificate carries a subject alternative name extension, one
//!    of its DNS entries must equal the configured host exactly.
//! 2. Otherwise the subject common name is resolved and must yield the
//!    address the socket is connected to.

use thiserror::Error;
use x509_parser::prelude::*;

/// The parts of an X.509 end-entity certificate used for the peer check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerIdentity {
    /// `true` when the certificate has a subject alternative name extension,
    /// even one with no DNS entries.
    pub alt_names_present: bool,
    /// DNS entries of the subject alternative name extension.
    pub dns_names: Vec<String>,
    /// First common name of the subject, if any.
    pub common_name: Option<String>,
}

/// Result of matching the alternative names against a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AltNameCheck {
    /// A DNS entry equals the host.
    Matched,
    /// The extension exists but no DNS entry equals the host.
    Mismatch,
    /// No extension; the common name rule applies.
    NoAltNames,
}

/// Why the remote unit's identity was rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PeerCheckError {
    #[error("server presented no certificate")]
    NoCertificate,

    #[error("server certificate could not be parsed: {0}")]
    BadCertificate(String),

    #[error("no subject alternative name matches {expected:?} (presented {presented:?})")]
    AltNameMismatch {
        expected: String,
        presented: Vec<String>,
    },

    #[error("certificate has neither alternative names nor a common name")]
    NoIdentity,

    #[error("common name {name:?} could not be resolved: {detail}")]
    CommonNameUnresolved { name: String, detail: String },

    #[error("common name {name:?} resolves to {resolved}, but the peer is {connected}")]
    AddressMismatch {
        name: String,
        resolved: std::net::IpAddr,
        connected: std::net::IpAddr,
    },
}

impl PeerIdentity {
    /// Extracts the identity fields from a DER-encoded certificate.
    pub fn from_der(der: &[u8]) -> Result<Self, PeerCheckError> {
        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|e| PeerCheckError::BadCertificate(e.to_string()))?;

        let san = cert
            .subject_alternative_name()
            .map_err(|e| PeerCheckError::BadCertificate(e.to_string()))?;

        let (alt_names_present, dns_names) = match san {
            Some(ext) => {
                let names = ext
                    .value
                    .general_names
                    .iter()
                    .filter_map(|name| match name {
                        GeneralName::DNSName(dns) => Some((*dns).to_string()),
                        _ => None,
                    })
                    .collect();
                (true, names)
            }
            None => (false, Vec::new()),
        };

        let common_name = cert
            .subject()
            .iter_common_name()
            .next()
            .and_then(|cn| cn.as_str().ok())
            .map(str::to_string);

        Ok(Self {
            alt_names_present,
            dns_names,
            common_name,
        })
    }

    /// Applies the alternative-name rule for `host`.
    ///
    /// The comparison is an exact string match: no wildcard expansion and no
    /// case folding.
    pub fn match_alt_names(&self, host: &str) -> AltNameCheck {
        if !self.alt_names_present {
            return AltNameCheck::NoAltNames;
        }
        if self.dns_names.iter().any(|name| name == host) {
            AltNameCheck::Matched
        } else {
            AltNameCheck::Mismatch
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};

    fn cert_der(alt_names: &[&str], common_name: Option<&str>) -> Vec<u8> {
        let mut params = CertificateParams::new(
            alt_names.iter().map(ToString::to_string).collect::<Vec<_>>(),
        )
        .unwrap();
        params.distinguished_name = DistinguishedName::new();
        if let Some(cn) = common_name {
            params.distinguished_name.push(DnType::CommonName, cn);
        }
        let key = KeyPair::generate().unwrap();
        params.self_signed(&key).unwrap().der().to_vec()
    }

    #[test]
    fn test_from_der_collects_dns_alt_names() {
        // Arrange
        let der = cert_der(&["ts16.example.net", "ts16"], Some("Terminal Server"));

        // Act
        let identity = PeerIdentity::from_der(&der).unwrap();

        // Assert
        assert!(identity.alt_names_present);
        assert_eq!(identity.dns_names, vec!["ts16.example.net", "ts16"]);
        assert_eq!(identity.common_name.as_deref(), Some("Terminal Server"));
    }

    #[test]
    fn test_from_der_without_alt_names_keeps_common_name() {
        let der = cert_der(&[], Some("ts16.example.net"));

        let identity = PeerIdentity::from_der(&der).unwrap();

        assert!(!identity.alt_names_present);
        assert!(identity.dns_names.is_empty());
        assert_eq!(identity.common_name.as_deref(), Some("ts16.example.net"));
    }

    #[test]
    fn test_from_der_rejects_garbage() {
        let err = PeerIdentity::from_der(b"not a certificate").unwrap_err();
        assert!(matches!(err, PeerCheckError::BadCertificate(_)));
    }

    #[test]
    fn test_alt_name_match_is_exact() {
        let identity = PeerIdentity {
            alt_names_present: true,
            dns_names: vec!["ts16.example.net".to_string()],
            common_name: None,
        };

        assert_eq!(identity.match_alt_names("ts16.example.net"), AltNameCheck::Matched);
        assert_eq!(identity.match_alt_names("TS16.example.net"), AltNameCheck::Mismatch);
        assert_eq!(identity.match_alt_names("ts16"), AltNameCheck::Mismatch);
    }

    #[test]
    fn test_alt_name_extension_without_dns_entries_is_a_mismatch() {
        // An extension carrying only IP entries still counts as present, so
        // the common name rule must not be consulted.
        let der = cert_der(&["10.0.0.5"], Some("10.0.0.5"));
        let identity = PeerIdentity::from_der(&der).unwrap();

        assert!(identity.alt_names_present);
        assert_eq!(identity.match_alt_names("10.0.0.5"), AltNameCheck::Mismatch);
    }

    #[test]
    fn test_no_extension_defers_to_common_name() {
        let identity = PeerIdentity {
            alt_names_present: false,
            dns_names: Vec::new(),
            common_name: Some("ts16".to_string()),
        };
        assert_eq!(identity.match_alt_names("ts16"), AltNameCheck::NoAltNames);
    }
}
