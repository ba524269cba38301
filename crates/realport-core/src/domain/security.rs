//! Transport security modes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default TCP port of the RealPort service on the remote unit.
pub const DEFAULT_PLAIN_PORT: u16 = 771;

/// Default TCP port of the TLS-wrapped RealPort service.
pub const DEFAULT_SECURE_PORT: u16 = 1027;

/// How the connection to the remote unit is secured.
///
/// Fixed for the whole process lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SecurityMode {
    /// Plain TCP.
    #[default]
    #[serde(rename = "none")]
    None,
    /// TLS without authenticating the server.
    #[serde(rename = "encrypt")]
    EncryptOnly,
    /// TLS with certificate chain validation and a host identity check.
    #[serde(rename = "verify")]
    VerifyServer,
    /// Reserved for mutual authentication.  Accepted in configuration but
    /// behaves exactly like [`SecurityMode::VerifyServer`]; no client
    /// certificate is presented.
    #[serde(rename = "mutual")]
    MutualAuth,
}

/// Returned when a security mode name is not recognised.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown security mode {0:?} (expected none, encrypt, verify or mutual)")]
pub struct UnknownSecurityMode(pub String);

impl SecurityMode {
    /// Whether the connection is wrapped in TLS at all.
    pub fn is_secure(self) -> bool {
        !matches!(self, Self::None)
    }

    /// Whether the server certificate and identity must be validated.
    pub fn verifies_peer(self) -> bool {
        matches!(self, Self::VerifyServer | Self::MutualAuth)
    }

    /// The port used when the operator does not override it.
    pub fn default_port(self) -> u16 {
        if self.is_secure() {
            DEFAULT_SECURE_PORT
        } else {
            DEFAULT_PLAIN_PORT
        }
    }
}

impl FromStr for SecurityMode {
    type Err = UnknownSecurityMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "off" | "plain" => Ok(Self::None),
            "encrypt" | "encrypt-only" => Ok(Self::EncryptOnly),
            "verify" | "verify-server" => Ok(Self::VerifyServer),
            "mutual" | "mutual-auth" => Ok(Self::MutualAuth),
            _ => Err(UnknownSecurityMode(s.to_string())),
        }
    }
}

impl fmt::Display for SecurityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::EncryptOnly => "encrypt",
            Self::VerifyServer => "verify",
            Self::MutualAuth => "mutual",
        })
    }
}
