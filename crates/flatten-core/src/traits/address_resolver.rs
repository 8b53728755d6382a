// # Address Resolver Trait
//
// Defines the interface for resolving a flatten target to its current
// addresses.
//
// ## Implementations
//
// - hickory-resolver with primary/secondary upstream: `flatten-resolver-hickory` crate

use async_trait::async_trait;
use std::net::IpAddr;

/// Trait for hostname → address resolution
///
/// # Contract
///
/// - An answer with no addresses (NXDOMAIN or an empty NOERROR) is
///   `Ok(vec![])`, not an error.
/// - `Err(Error::Resolution)` only when no upstream could produce an answer,
///   or the answering upstream reported a failure.
/// - No caching between calls: two directives sharing a target resolve twice.
#[async_trait]
pub trait AddressResolver: Send + Sync {
    /// Resolve `hostname` to its IPv4 and IPv6 addresses
    async fn resolve(&self, hostname: &str) -> Result<Vec<IpAddr>, crate::Error>;

    /// Get the resolver name (for logging/debugging)
    fn resolver_name(&self) -> &'static str;
}
