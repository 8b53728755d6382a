//! Flatten directive extraction
//!
//! A flatten directive is a TXT record whose owner name starts with the
//! marker label. The TXT value names the hostname to mirror, and the owner
//! name minus the marker label is where A/AAAA records get written:
//!
//! ```text
//! _cname_flatten.foo.com.  TXT  "backend.example.net"
//!                ^^^^^^^ parent_name    ^^^^^^^^^^^^^^^^^^^ target_hostname
//! ```

use crate::traits::DnsRecord;
use tracing::{info, warn};

/// Reserved label that marks a TXT record as a flatten directive
pub const DEFAULT_MARKER_LABEL: &str = "_cname_flatten";

/// A declared intent that `parent_name` should mirror `target_hostname`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlattenDirective {
    /// Owner name of the TXT record
    pub source: String,
    /// Hostname whose addresses are mirrored
    pub target_hostname: String,
    /// Name the A/AAAA records are written under
    pub parent_name: String,
}

impl FlattenDirective {
    /// Build a directive from a record, if it is one
    ///
    /// Returns `None` unless the record is a TXT record whose first label is
    /// `marker_label` and whose owner name has at least two labels.
    pub fn from_record(record: &DnsRecord, marker_label: &str) -> Option<Self> {
        if record.record_type != "TXT" {
            return None;
        }

        let labels: Vec<&str> = record.source.split('.').collect();
        if labels[0] != marker_label || labels.len() < 2 {
            return None;
        }

        Some(Self {
            source: record.source.clone(),
            target_hostname: record.target.clone(),
            parent_name: labels[1..].join("."),
        })
    }
}

/// Extract every flatten directive from a zone's record list
///
/// Output follows input order. Duplicates are kept: two directives for the
/// same parent are both processed and the later writes win. A marker record
/// with nothing after the marker label (e.g. `_cname_flatten.`) has no name
/// to write under and is skipped with a warning.
pub fn extract_directives(records: &[DnsRecord], marker_label: &str) -> Vec<FlattenDirective> {
    let mut directives = Vec::new();

    for record in records {
        let Some(directive) = FlattenDirective::from_record(record, marker_label) else {
            continue;
        };

        if directive.parent_name.is_empty() {
            warn!(
                "Skipping flatten directive {}: no parent name after the marker label",
                directive.source
            );
            continue;
        }

        info!(
            "Found flatten directive: {} -> {}",
            directive.source, directive.target_hostname
        );

        // Permitted, but this writes addresses at a bare single-label name
        if !directive.parent_name.contains('.') {
            warn!(
                "Flatten directive {} targets single-label parent '{}'",
                directive.source, directive.parent_name
            );
        }

        directives.push(directive);
    }

    directives
}
