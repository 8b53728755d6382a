// # flatten-core
//
// Core library for TXT-driven CNAME flattening.
//
// A zone without CNAME-at-apex support declares "this name should mirror
// that hostname" with a marker TXT record:
//
//     _cname_flatten.foo.com.  TXT  "backend.example.net"
//
// Each run lists the zone's records, finds these directives, resolves every
// target, and writes the resulting A/AAAA records under the parent name.
//
// ## Architecture Overview
//
// - **ZoneClient**: Trait for listing and writing records via the zone API
// - **AddressResolver**: Trait for resolving flatten targets to addresses
// - **extract_directives**: Pure directive discovery from a record list
// - **WriteTracker**: Per-run replace-vs-append bookkeeping
// - **Reconciler**: Orchestrates one fetch → resolve → write pass
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Pipeline logic is separate from HTTP and DNS I/O
// 2. **Stateless Runs**: Nothing survives a run; state is rebuilt from the live zone
// 3. **Errors as Values**: The Reconciler decides abort-or-continue explicitly
// 4. **Library-First**: The daemon is thin glue around this crate

pub mod config;
pub mod directive;
pub mod engine;
pub mod error;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use config::{EngineConfig, FailurePolicy, FlattenConfig, ResolverConfig, ZoneConfig};
pub use directive::{DEFAULT_MARKER_LABEL, FlattenDirective, extract_directives};
pub use engine::{DirectiveOutcome, Reconciler, RunReport, WriteOutcome};
pub use error::{Error, Result};
pub use state::WriteTracker;
pub use traits::{AddressResolver, DnsRecord, RecordType, WriteMethod, ZoneClient};
