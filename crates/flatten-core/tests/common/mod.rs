//! Test doubles and common utilities for reconciler contract tests
//!
//! These doubles record every call so tests can assert on the exact
//! sequence of HTTP-equivalent operations a run performs.

#![allow(dead_code)]

use flatten_core::error::{Error, Result};
use flatten_core::traits::{AddressResolver, DnsRecord, RecordType, WriteMethod, ZoneClient};
use flatten_core::{EngineConfig, FailurePolicy, Reconciler};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const BASE_URL: &str = "https://box.example.com/admin/dns/custom";

/// A write as the zone API would have seen it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedWrite {
    /// "PUT" or "POST"
    pub http_method: &'static str,
    /// Path below the API base, e.g. "foo.com/A"
    pub path: String,
    /// Raw text body
    pub body: String,
}

impl RecordedWrite {
    pub fn put(path: &str, body: &str) -> Self {
        Self {
            http_method: "PUT",
            path: path.to_string(),
            body: body.to_string(),
        }
    }

    pub fn post(path: &str, body: &str) -> Self {
        Self {
            http_method: "POST",
            path: path.to_string(),
            body: body.to_string(),
        }
    }
}

/// A ZoneClient that serves a fixed record list and records writes
#[derive(Clone)]
pub struct MockZoneClient {
    records: Vec<DnsRecord>,
    /// When set, list_records fails with this message
    list_error: Option<String>,
    /// Remaining forced failures per write path
    failing_paths: Arc<Mutex<HashMap<String, usize>>>,
    /// Successful writes, in order
    writes: Arc<Mutex<Vec<RecordedWrite>>>,
    /// Call counter for list_records()
    list_call_count: Arc<AtomicUsize>,
    /// Call counter for write_record(), including failed calls
    write_call_count: Arc<AtomicUsize>,
}

impl MockZoneClient {
    pub fn new(records: Vec<DnsRecord>) -> Self {
        Self {
            records,
            list_error: None,
            failing_paths: Arc::new(Mutex::new(HashMap::new())),
            writes: Arc::new(Mutex::new(Vec::new())),
            list_call_count: Arc::new(AtomicUsize::new(0)),
            write_call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A client whose listing always fails (e.g. HTTP 401)
    pub fn failing_list(message: &str) -> Self {
        let mut client = Self::new(Vec::new());
        client.list_error = Some(message.to_string());
        client
    }

    /// Make the next `times` writes to `path` fail
    pub fn fail_writes_to(&self, path: &str, times: usize) {
        self.failing_paths
            .lock()
            .unwrap()
            .insert(path.to_string(), times);
    }

    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.writes.lock().unwrap().clone()
    }

    pub fn list_call_count(&self) -> usize {
        self.list_call_count.load(Ordering::SeqCst)
    }

    pub fn write_call_count(&self) -> usize {
        self.write_call_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ZoneClient for MockZoneClient {
    async fn list_records(&self) -> Result<Vec<DnsRecord>> {
        self.list_call_count.fetch_add(1, Ordering::SeqCst);
        match &self.list_error {
            Some(message) => Err(Error::fetch(message.clone())),
            None => Ok(self.records.clone()),
        }
    }

    fn record_url(&self, parent_name: &str, record_type: RecordType) -> String {
        format!("{}/{}/{}", BASE_URL, parent_name, record_type)
    }

    async fn write_record(
        &self,
        method: WriteMethod,
        parent_name: &str,
        record_type: RecordType,
        value: &str,
    ) -> Result<()> {
        self.write_call_count.fetch_add(1, Ordering::SeqCst);
        let path = format!("{}/{}", parent_name, record_type);

        {
            let mut failing = self.failing_paths.lock().unwrap();
            if let Some(remaining) = failing.get_mut(&path)
                && *remaining > 0
            {
                *remaining -= 1;
                return Err(Error::write(
                    self.record_url(parent_name, record_type),
                    "HTTP 500 Internal Server Error",
                ));
            }
        }

        let http_method = match method {
            WriteMethod::Replace => "PUT",
            WriteMethod::Append => "POST",
        };
        self.writes.lock().unwrap().push(RecordedWrite {
            http_method,
            path,
            body: value.to_string(),
        });
        Ok(())
    }

    fn client_name(&self) -> &'static str {
        "mock"
    }
}

/// An AddressResolver backed by a fixed answer table
#[derive(Clone, Default)]
pub struct StaticResolver {
    answers: Arc<Mutex<HashMap<String, std::result::Result<Vec<IpAddr>, String>>>>,
    /// Hostnames resolved, in order
    lookups: Arc<Mutex<Vec<String>>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `hostname` with `addresses`
    pub fn with_answer(self, hostname: &str, addresses: &[&str]) -> Self {
        let parsed = addresses.iter().map(|a| a.parse().unwrap()).collect();
        self.answers
            .lock()
            .unwrap()
            .insert(hostname.to_string(), Ok(parsed));
        self
    }

    /// Fail resolution of `hostname`
    pub fn with_failure(self, hostname: &str, message: &str) -> Self {
        self.answers
            .lock()
            .unwrap()
            .insert(hostname.to_string(), Err(message.to_string()));
        self
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl AddressResolver for StaticResolver {
    async fn resolve(&self, hostname: &str) -> Result<Vec<IpAddr>> {
        self.lookups.lock().unwrap().push(hostname.to_string());
        match self.answers.lock().unwrap().get(hostname) {
            Some(Ok(addresses)) => Ok(addresses.clone()),
            Some(Err(message)) => Err(Error::resolution(hostname, message.clone())),
            None => Err(Error::resolution(hostname, "no answer configured")),
        }
    }

    fn resolver_name(&self) -> &'static str {
        "static"
    }
}

pub fn txt(source: &str, target: &str) -> DnsRecord {
    DnsRecord::new(source, "TXT", target)
}

/// Build a reconciler over shared test doubles
pub fn reconciler(
    client: &MockZoneClient,
    resolver: &StaticResolver,
    on_error: FailurePolicy,
) -> Reconciler {
    let config = EngineConfig {
        on_error,
        ..EngineConfig::default()
    };

    Reconciler::new(Box::new(client.clone()), Box::new(resolver.clone()), config)
        .expect("reconciler construction succeeds")
}
