//! Reconciler
//!
//! The Reconciler is responsible for:
//! - Listing the zone's custom records via ZoneClient
//! - Extracting flatten directives
//! - Resolving each directive's target via AddressResolver
//! - Writing every resolved address back under the directive's parent name
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐  list   ┌──────────────┐  directives  ┌──────────────────┐
//! │ ZoneClient  │────────▶│  Reconciler  │─────────────▶│ AddressResolver  │
//! └─────────────┘         └──────────────┘◀─────────────└──────────────────┘
//!        ▲                       │            addresses
//!        │     write (PUT/POST)  │
//!        └───────────────────────┤
//!                                ▼
//!                        ┌──────────────┐
//!                        │ WriteTracker │
//!                        │ (per run)    │
//!                        └──────────────┘
//! ```
//!
//! ## Run Flow
//!
//! 1. List records (failure is fatal for the run)
//! 2. Extract directives (none found is a clean no-op)
//! 3. For each directive in order: resolve, then one write per address
//! 4. Resolution/write failures follow the configured `FailurePolicy`
//!
//! A run is a single sequential pass. Nothing is persisted between runs;
//! each `run()` starts with an empty `WriteTracker`.

use std::net::IpAddr;

use crate::config::{EngineConfig, FailurePolicy};
use crate::directive::{FlattenDirective, extract_directives};
use crate::error::{Error, Result};
use crate::state::WriteTracker;
use crate::traits::{AddressResolver, RecordType, WriteMethod, ZoneClient};
use tracing::{debug, error, info, warn};

/// A single write issued during a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Record type written
    pub record_type: RecordType,
    /// Address written
    pub value: IpAddr,
    /// Replace or append
    pub method: WriteMethod,
}

/// What happened to one directive during a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveOutcome {
    /// The directive processed
    pub directive: FlattenDirective,
    /// Addresses its target resolved to
    pub addresses: Vec<IpAddr>,
    /// Writes that succeeded, in order
    pub writes: Vec<WriteOutcome>,
    /// Error that stopped this directive, if any
    pub error: Option<String>,
}

impl DirectiveOutcome {
    fn new(directive: FlattenDirective) -> Self {
        Self {
            directive,
            addresses: Vec::new(),
            writes: Vec::new(),
            error: None,
        }
    }

    /// Whether this directive failed
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Summary of a completed run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Number of records the zone listing returned
    pub records_listed: usize,
    /// Number of distinct destinations (name and record type) written
    pub destinations_written: usize,
    /// Per-directive outcomes, in processing order
    pub outcomes: Vec<DirectiveOutcome>,
}

impl RunReport {
    /// Number of directives processed
    pub fn directives_found(&self) -> usize {
        self.outcomes.len()
    }

    /// Total writes issued
    pub fn writes_issued(&self) -> usize {
        self.outcomes.iter().map(|o| o.writes.len()).sum()
    }

    /// Writes issued with the given method
    pub fn writes_with(&self, method: WriteMethod) -> usize {
        self.outcomes
            .iter()
            .flat_map(|o| o.writes.iter())
            .filter(|w| w.method == method)
            .count()
    }

    /// Directives that failed
    pub fn failed(&self) -> impl Iterator<Item = &DirectiveOutcome> {
        self.outcomes.iter().filter(|o| o.is_failed())
    }

    /// Whether any directive failed
    pub fn has_failures(&self) -> bool {
        self.failed().next().is_some()
    }
}

/// Flattening reconciler
///
/// Orchestrates one pass of fetch → extract → resolve → write.
///
/// ## Lifecycle
///
/// 1. Create with [`Reconciler::new()`]
/// 2. Call [`Reconciler::run()`] once per trigger (one-shot or scheduled)
///
/// Runs are independent; the reconciler itself holds no run state.
pub struct Reconciler {
    /// Zone management API client
    zone_client: Box<dyn ZoneClient>,

    /// Resolver for flatten targets
    resolver: Box<dyn AddressResolver>,

    /// TXT label that marks a flatten directive
    marker_label: String,

    /// What to do when a directive fails
    on_error: FailurePolicy,
}

impl Reconciler {
    /// Create a new reconciler
    ///
    /// # Parameters
    ///
    /// - `zone_client`: Zone management API client
    /// - `resolver`: Address resolver for flatten targets
    /// - `config`: Engine settings
    pub fn new(
        zone_client: Box<dyn ZoneClient>,
        resolver: Box<dyn AddressResolver>,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            zone_client,
            resolver,
            marker_label: config.marker_label,
            on_error: config.on_error,
        })
    }

    /// Run one reconciliation pass
    ///
    /// # Returns
    ///
    /// - `Ok(RunReport)`: The pass completed (with `FailurePolicy::Continue`,
    ///   possibly with failed directives recorded in the report)
    /// - `Err(Error::Fetch)`: The record listing failed; nothing was written
    /// - `Err(Error::Resolution | Error::Write)`: A directive failed under
    ///   `FailurePolicy::FailFast`; earlier writes remain applied
    pub async fn run(&self) -> Result<RunReport> {
        info!(
            "Starting flatten run (zone client: {}, resolver: {})",
            self.zone_client.client_name(),
            self.resolver.resolver_name()
        );

        let records = self.zone_client.list_records().await.map_err(|e| match e {
            Error::Fetch(_) => e,
            other => Error::fetch(other.to_string()),
        })?;
        info!("Fetched {} custom record(s)", records.len());

        let directives = extract_directives(&records, &self.marker_label);
        let mut report = RunReport {
            records_listed: records.len(),
            destinations_written: 0,
            outcomes: Vec::with_capacity(directives.len()),
        };

        if directives.is_empty() {
            info!("No flatten directives found, nothing to do");
            return Ok(report);
        }

        let mut tracker = WriteTracker::new();

        for directive in directives {
            let mut outcome = DirectiveOutcome::new(directive);

            if let Err(e) = self.apply_directive(&mut tracker, &mut outcome).await {
                match self.on_error {
                    FailurePolicy::FailFast => {
                        error!(
                            "Aborting run: directive {} failed: {}",
                            outcome.directive.source, e
                        );
                        return Err(e);
                    }
                    FailurePolicy::Continue => {
                        error!(
                            "Directive {} failed, continuing: {}",
                            outcome.directive.source, e
                        );
                        outcome.error = Some(e.to_string());
                    }
                }
            }

            report.outcomes.push(outcome);
        }

        report.destinations_written = tracker.len();
        if tracker.is_empty() {
            warn!(
                "{} directive(s) processed but no destination was written",
                report.directives_found()
            );
        }

        info!(
            "Flatten run complete: {} directive(s), {} write(s) to {} destination(s) ({} replace, {} append), {} failed",
            report.directives_found(),
            report.writes_issued(),
            report.destinations_written,
            report.writes_with(WriteMethod::Replace),
            report.writes_with(WriteMethod::Append),
            report.failed().count()
        );

        Ok(report)
    }

    /// Resolve one directive's target and write every address
    async fn apply_directive(
        &self,
        tracker: &mut WriteTracker,
        outcome: &mut DirectiveOutcome,
    ) -> Result<()> {
        let target = outcome.directive.target_hostname.clone();
        let parent = outcome.directive.parent_name.clone();

        let addresses = self.resolver.resolve(&target).await.map_err(|e| match e {
            Error::Resolution { .. } => e,
            other => Error::resolution(&target, other.to_string()),
        })?;
        outcome.addresses = addresses.clone();

        if addresses.is_empty() {
            warn!(
                "{} resolved to no addresses, nothing written for {}",
                target, parent
            );
            return Ok(());
        }
        debug!("{} resolved to {:?}", target, addresses);

        for ip in addresses {
            let record_type = RecordType::for_ip(&ip);
            let url = self.zone_client.record_url(&parent, record_type);
            let method = tracker.method_for(&url);

            info!(
                "Updating {} record for {} -> {} ({}) from {}",
                record_type, parent, ip, method, outcome.directive.source
            );

            self.zone_client
                .write_record(method, &parent, record_type, &ip.to_string())
                .await
                .map_err(|e| match e {
                    Error::Write { .. } => e,
                    other => Error::write(&url, other.to_string()),
                })?;

            tracker.mark_written(url);
            outcome.writes.push(WriteOutcome {
                record_type,
                value: ip,
                method,
            });
        }

        Ok(())
    }
}
