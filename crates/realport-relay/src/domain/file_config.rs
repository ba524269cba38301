//! Optional TOML configuration file.
//!
//! Every key mirrors a command-line option; anything given on the command
//! line wins.  Example:
//!
//! ```toml
//! [daemon]
//! device = "/dev/dty/a000s"
//! server = "ts16.example.net"
//! encrypt = "verify"
//! link = "115200,20"
//! timeout = 300
//! ca_file = "/etc/drpd/ca.pem"
//! ```
//!
//! Missing keys, and a missing `[daemon]` table, fall back to serde
//! defaults, so an empty file is valid.

use std::path::{Path, PathBuf};

use realport_core::{LinkConfig, SecurityMode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed, or a value failed validation.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level layout of the configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub daemon: DaemonSection,
}

/// The `[daemon]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DaemonSection {
    #[serde(default)]
    pub device: Option<PathBuf>,
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    /// Comma-separated link fields, validated while parsing.
    #[serde(default)]
    pub link: Option<LinkConfig>,
    #[serde(default)]
    pub encrypt: Option<SecurityMode>,
    /// Idle timeout in seconds; `0` disables it.
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub ipv6: bool,
    #[serde(default)]
    pub interactive: bool,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub ca_file: Option<PathBuf>,
}

impl FileConfig {
    /// Reads and parses the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Parse`] if it is not valid TOML for this schema.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_all_defaults() {
        // Arrange / Act
        let cfg = FileConfig::from_toml_str("").unwrap();

        // Assert
        assert_eq!(cfg, FileConfig::default());
    }

    #[test]
    fn test_full_daemon_table_parses() {
        let toml = r#"
            [daemon]
            device = "/dev/dty/a000s"
            server = "ts16.example.net"
            port = 2000
            link = "115200,20"
            encrypt = "verify"
            timeout = 300
            ipv6 = true
            interactive = true
            ca_file = "/etc/drpd/ca.pem"
        "#;

        let cfg = FileConfig::from_toml_str(toml).unwrap().daemon;

        assert_eq!(cfg.device, Some(PathBuf::from("/dev/dty/a000s")));
        assert_eq!(cfg.server.as_deref(), Some("ts16.example.net"));
        assert_eq!(cfg.port, Some(2000));
        assert_eq!(cfg.link.map(|l| l.fields()), Some([115_200, 20, 2400, 360, 46]));
        assert_eq!(cfg.encrypt, Some(SecurityMode::VerifyServer));
        assert_eq!(cfg.timeout, Some(300));
        assert!(cfg.ipv6);
        assert!(cfg.interactive);
        assert!(!cfg.verbose);
    }

    #[test]
    fn test_invalid_link_is_a_parse_error() {
        let err = FileConfig::from_toml_str("[daemon]\nlink = \"9600,60,2400,360,200\"\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("header_size"));
    }

    #[test]
    fn test_unknown_security_mode_is_rejected() {
        let err = FileConfig::from_toml_str("[daemon]\nencrypt = \"tls\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let err = FileConfig::from_toml_str("[daemon]\nspeed = 9600\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = FileConfig::load(Path::new("/nonexistent/drpd.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
