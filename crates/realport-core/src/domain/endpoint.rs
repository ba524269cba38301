//! The remote unit's address as configured by the operator.
//!
//! An [`Endpoint`] holds the *name* of the unit, not its address: the daemon
//! re-resolves it at the start of every connection attempt because the
//! unit's IP may change between sessions.

use std::fmt;
use std::net::IpAddr;

/// Which IP family the daemon resolves and connects with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    #[default]
    V4,
    V6,
}

impl AddressFamily {
    /// Whether `addr` belongs to this family.
    pub fn matches(self, addr: &IpAddr) -> bool {
        match self {
            Self::V4 => addr.is_ipv4(),
            Self::V6 => addr.is_ipv6(),
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::V4 => "IPv4",
            Self::V6 => "IPv6",
        })
    }
}

/// Host name (or address literal), port and family of the remote unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Host name or address literal exactly as the operator gave it.  This
    /// is also the name a server certificate must carry.
    pub host: String,
    pub port: u16,
    pub family: AddressFamily,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16, family: AddressFamily) -> Self {
        Self {
            host: host.into(),
            port,
            family,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') && !self.host.starts_with('[') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_brackets_v6_hosts() {
        let ep = Endpoint::new("fe80::1", 771, AddressFamily::V6);
        assert_eq!(ep.to_string(), "[fe80::1]:771");
        let ep = Endpoint::new("ts16", 771, AddressFamily::V4);
        assert_eq!(ep.to_string(), "ts16:771");
    }
}
