//! Core traits for the flattening pipeline
//!
//! - [`ZoneClient`]: List and write records against the zone management API
//! - [`AddressResolver`]: Resolve flatten targets to addresses

pub mod address_resolver;
pub mod zone_client;

pub use address_resolver::AddressResolver;
pub use zone_client::{DnsRecord, RecordType, WriteMethod, ZoneClient};
