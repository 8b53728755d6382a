// # Zone Client Trait
//
// Defines the interface to the authoritative zone management API.
//
// ## Implementations
//
// - Mail-in-a-Box: `flatten-zone-mailinabox` crate
//
// ## Usage
//
// ```rust,ignore
// use flatten_core::traits::{RecordType, WriteMethod, ZoneClient};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let client = /* ZoneClient implementation */;
//
//     let records = client.list_records().await?;
//     client
//         .write_record(WriteMethod::Replace, "foo.com", RecordType::A, "10.0.0.1")
//         .await?;
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// A single entry from the zone's custom record list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    /// Fully-qualified owner name
    #[serde(rename = "qname")]
    pub source: String,

    /// Record type string (e.g. "TXT", "A", "AAAA")
    #[serde(rename = "rtype")]
    pub record_type: String,

    /// The record's value
    #[serde(rename = "value")]
    pub target: String,

    /// Zone the record belongs to (informational)
    #[serde(default)]
    pub zone: String,
}

impl DnsRecord {
    /// Create a record with an empty zone
    pub fn new(
        source: impl Into<String>,
        record_type: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            record_type: record_type.into(),
            target: target.into(),
            zone: String::new(),
        }
    }
}

/// Address record type written under a parent name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    /// A record (IPv4)
    A,
    /// AAAA record (IPv6)
    Aaaa,
}

impl RecordType {
    /// Classify an address into the record type that holds it
    pub fn for_ip(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => RecordType::A,
            IpAddr::V6(_) => RecordType::Aaaa,
        }
    }

    /// Wire name of the record type
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a write treats the records already present at its destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMethod {
    /// Overwrite whatever exists at the name/type
    Replace,
    /// Add alongside the existing records at the name/type
    Append,
}

impl fmt::Display for WriteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteMethod::Replace => f.write_str("replace"),
            WriteMethod::Append => f.write_str("append"),
        }
    }
}

/// Trait for zone management API clients
///
/// Implementations are single-shot: one HTTP call per method invocation,
/// no retries, no caching. The Reconciler owns ordering, method selection
/// and the failure policy.
#[async_trait]
pub trait ZoneClient: Send + Sync {
    /// List every custom record in the zone
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<DnsRecord>)`: The records in API order
    /// - `Err(Error::Fetch)`: Transport, status or decode failure
    async fn list_records(&self) -> Result<Vec<DnsRecord>, crate::Error>;

    /// Destination URL for a parent name and record type
    ///
    /// Must be a deterministic function of its inputs; the Write Tracker
    /// keys on it.
    fn record_url(&self, parent_name: &str, record_type: RecordType) -> String;

    /// Write a single address value to `parent_name`/`record_type`
    ///
    /// # Returns
    ///
    /// - `Ok(())`: The API accepted the write
    /// - `Err(Error::Write)`: Transport failure or non-success status
    async fn write_record(
        &self,
        method: WriteMethod,
        parent_name: &str,
        record_type: RecordType,
        value: &str,
    ) -> Result<(), crate::Error>;

    /// Get the client name (for logging/debugging)
    fn client_name(&self) -> &'static str;
}
