//! Configuration types for the flattening pipeline
//!
//! This module defines all configuration structures used throughout the
//! workspace. Loading them (environment, `.env` file) is the daemon's job.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};

use crate::directive::DEFAULT_MARKER_LABEL;

/// Main flattening configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlattenConfig {
    /// Zone management API configuration
    pub zone: ZoneConfig,

    /// Upstream DNS configuration
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Reconciler settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl FlattenConfig {
    /// Create a configuration for `hostname` with default resolver and engine settings
    pub fn new(
        hostname: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            zone: ZoneConfig::new(hostname, username, password),
            resolver: ResolverConfig::default(),
            engine: EngineConfig::default(),
        }
    }

    /// Validate the configuration
    ///
    /// Credentials are not checked here: missing values surface
    /// as authentication failures from the zone API.
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.resolver.validate()?;
        self.engine.validate()?;
        Ok(())
    }
}

/// Zone management API configuration
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ZoneConfig {
    /// Host serving the management API (no scheme)
    pub hostname: String,

    /// Administrative username
    pub username: String,

    /// Administrative password
    /// ⚠️ NEVER log this value
    pub password: String,

    /// Log intended writes instead of sending them
    #[serde(default)]
    pub dry_run: bool,
}

impl ZoneConfig {
    /// Create a live (non dry-run) zone configuration
    pub fn new(
        hostname: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            username: username.into(),
            password: password.into(),
            dry_run: false,
        }
    }

    /// Enable or disable dry-run mode
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Whether any credential value is missing
    pub fn has_missing_credentials(&self) -> bool {
        self.hostname.is_empty() || self.username.is_empty() || self.password.is_empty()
    }
}

// Custom Debug implementation that hides the password
impl fmt::Debug for ZoneConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZoneConfig")
            .field("hostname", &self.hostname)
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

/// Upstream DNS configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Upstream consulted first
    #[serde(default = "default_primary")]
    pub primary: SocketAddr,

    /// Upstream consulted only when the primary cannot be reached
    #[serde(default = "default_secondary")]
    pub secondary: SocketAddr,

    /// Timeout for reaching the primary (in seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ResolverConfig {
    /// Validate the resolver configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.timeout_secs == 0 {
            return Err(crate::Error::config("DNS timeout must be > 0"));
        }
        if self.primary == self.secondary {
            return Err(crate::Error::config(
                "Primary and secondary DNS upstreams must differ",
            ));
        }
        Ok(())
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            primary: default_primary(),
            secondary: default_secondary(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_primary() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::new(1, 1, 1, 1), 53))
}

fn default_secondary() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::new(8, 8, 8, 8), 53))
}

fn default_timeout_secs() -> u64 {
    10
}

/// What the Reconciler does when a directive fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abort the run on the first resolution or write error
    #[default]
    FailFast,
    /// Log the failed directive and move on to the next one
    Continue,
}

impl std::str::FromStr for FailurePolicy {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "abort" | "fail_fast" | "fail-fast" => Ok(FailurePolicy::FailFast),
            "continue" => Ok(FailurePolicy::Continue),
            other => Err(crate::Error::config(format!(
                "Unknown failure policy '{}'. Valid: abort, continue",
                other
            ))),
        }
    }
}

/// Reconciler configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// First label that marks a TXT record as a flatten directive
    #[serde(default = "default_marker_label")]
    pub marker_label: String,

    /// Failure handling for resolution and write errors
    #[serde(default)]
    pub on_error: FailurePolicy,
}

impl EngineConfig {
    /// Validate the engine configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.marker_label.is_empty() {
            return Err(crate::Error::config("Marker label cannot be empty"));
        }
        if self.marker_label.contains('.') {
            return Err(crate::Error::config(format!(
                "Marker label must be a single label, got '{}'",
                self.marker_label
            )));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            marker_label: default_marker_label(),
            on_error: FailurePolicy::default(),
        }
    }
}

fn default_marker_label() -> String {
    DEFAULT_MARKER_LABEL.to_string()
}
