//! Domain types fixed for the lifetime of the daemon process.
//!
//! Nothing in here performs I/O.  Parsing and validation happen once at
//! startup; afterwards these values are only read.

pub mod endpoint;
pub mod link;
pub mod peer;
pub mod security;
