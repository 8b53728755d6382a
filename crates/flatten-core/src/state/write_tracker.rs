// # Write Tracker
//
// Per-run memory of which destinations have already been written.
//
// ## Purpose
//
// A single target can resolve to several addresses of the same family. The
// first write to a destination must replace whatever stale records the zone
// holds; every later write to the same destination in the same run must
// append, or each address would clobber the previous one.
//
// ## Lifetime
//
// - Created empty by each `Reconciler::run()`
// - Owned by that run only, never shared
// - Dropped when the run ends (nothing persists across runs)

use std::collections::HashSet;

use crate::traits::WriteMethod;

/// Set of destination URLs written during the current run
#[derive(Debug, Default)]
pub struct WriteTracker {
    written: HashSet<String>,
}

impl WriteTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Method to use for the next write to `url`
    pub fn method_for(&self, url: &str) -> WriteMethod {
        if self.written.contains(url) {
            WriteMethod::Append
        } else {
            WriteMethod::Replace
        }
    }

    /// Record a successful write to `url`
    pub fn mark_written(&mut self, url: impl Into<String>) {
        self.written.insert(url.into());
    }

    /// Number of distinct destinations written
    pub fn len(&self) -> usize {
        self.written.len()
    }

    /// Whether nothing has been written yet
    pub fn is_empty(&self) -> bool {
        self.written.is_empty()
    }
}
