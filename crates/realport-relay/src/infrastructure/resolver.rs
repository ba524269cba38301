//! System name resolution.

use std::io;
use std::net::IpAddr;

use async_trait::async_trait;
use realport_core::AddressFamily;
use tokio::net::lookup_host;

use crate::application::Resolver;

/// Resolves through the platform resolver (`getaddrinfo`).
///
/// Address literals are accepted directly.  A literal of the wrong family is
/// an error rather than a lookup.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl Resolver for SystemResolver {
    async fn resolve(&self, host: &str, family: AddressFamily) -> io::Result<IpAddr> {
        let bare = host.trim_start_matches('[').trim_end_matches(']');
        if let Ok(ip) = bare.parse::<IpAddr>() {
            return if family.matches(&ip) {
                Ok(ip)
            } else {
                Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("{host} is not an {family} address"),
                ))
            };
        }

        lookup_host((bare, 0))
            .await?
            .map(|addr| addr.ip())
            .find(|ip| family.matches(ip))
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("{host} has no {family} address"),
                )
            })
    }
}
