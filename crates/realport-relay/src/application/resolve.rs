//! Name resolution seam.

use std::io;
use std::net::IpAddr;

use async_trait::async_trait;
use realport_core::AddressFamily;

/// Resolves a host name or address literal to one address of a family.
///
/// The system implementation lives in the infrastructure layer; tests
/// script results through the generated `MockResolver`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Returns the first address of `family` for `host`.
    ///
    /// # Errors
    ///
    /// Returns an error when the name does not resolve or has no address of
    /// the requested family.
    async fn resolve(&self, host: &str, family: AddressFamily) -> io::Result<IpAddr>;
}
