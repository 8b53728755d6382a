// # Mail-in-a-Box Zone Client
//
// This crate provides a ZoneClient implementation for the Mail-in-a-Box
// custom DNS admin API.
//
// ## Behavior
//
// - ✅ One HTTP request per call (list or write)
// - ✅ Full error propagation to the Reconciler (it owns the failure policy)
// - ✅ HTTP timeout configured (30 seconds)
// - ✅ Specific error messages for HTTP status codes (401, 403, 429, 5xx)
// - ✅ Dry-run mode for safe testing
// - ❌ NO retry logic (owned by the schedule: the next run converges)
// - ❌ NO read-back verification after writes
// - ❌ NO caching of the record list
//
// ## Security Requirements
//
// - Password NEVER appears in logs or Debug output
// - Credentials are sent as HTTP basic auth over HTTPS
//
// ## API Reference
//
// - List custom records: GET `/admin/dns/custom` → JSON array of
//   `{"qname", "rtype", "value", "zone"}`
// - Replace records at name/type: PUT `/admin/dns/custom/:qname/:rtype`, raw text body
// - Append a record at name/type: POST `/admin/dns/custom/:qname/:rtype`, raw text body

use async_trait::async_trait;
use flatten_core::config::ZoneConfig;
use flatten_core::traits::{DnsRecord, RecordType, WriteMethod, ZoneClient};
use flatten_core::{Error, Result};
use reqwest::StatusCode;
use std::time::Duration;

/// Path of the custom DNS API below the host
const CUSTOM_DNS_PATH: &str = "/admin/dns/custom";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Most characters of a response body quoted in an error message
const MAX_BODY_EXCERPT: usize = 200;

/// Mail-in-a-Box zone client
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the client will:
/// - Perform the GET listing normally
/// - Log the intended PUT/POST
/// - **NOT** actually modify DNS records
pub struct MailInABoxClient {
    /// Base URL of the custom DNS API, e.g. `https://box.example.com/admin/dns/custom`
    base_url: String,

    /// Admin username
    username: String,

    /// Admin password
    /// ⚠️ NEVER log this value
    password: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: if true, list records but skip writes
    dry_run: bool,
}

// Custom Debug implementation that hides the password
impl std::fmt::Debug for MailInABoxClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailInABoxClient")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl MailInABoxClient {
    /// Create a client for the box at `config.hostname`
    ///
    /// Empty credentials are accepted; the API will reject them with 401,
    /// which surfaces as a fetch error on the first run.
    pub fn from_config(config: &ZoneConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self::with_client(
            client,
            format!("https://{}", config.hostname),
            config.username.clone(),
            config.password.clone(),
            config.dry_run,
        ))
    }

    /// Create a client against an explicit origin (scheme + host + port)
    ///
    /// Used by tests to point the client at a local mock server.
    pub fn with_client(
        client: reqwest::Client,
        origin: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        dry_run: bool,
    ) -> Self {
        let origin = origin.into();
        Self {
            base_url: format!("{}{}", origin.trim_end_matches('/'), CUSTOM_DNS_PATH),
            username: username.into(),
            password: password.into(),
            client,
            dry_run,
        }
    }

    /// Whether writes are skipped
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Turn a non-success response into a readable message
    async fn failure_message(response: reqwest::Response) -> String {
        let status = response.status();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => format!(
                "Authentication failed: check MAILINABOX_USER/MAILINABOX_PASSWORD. Status: {}",
                status
            ),
            StatusCode::TOO_MANY_REQUESTS => {
                format!("Rate limit exceeded. Please retry later. Status: {}", status)
            }
            s if s.is_server_error() => {
                format!("Mail-in-a-Box server error (transient): {} - {}", status, body_excerpt(&error_text))
            }
            _ => format!("Request failed: {} - {}", status, body_excerpt(&error_text)),
        }
    }
}

#[async_trait]
impl ZoneClient for MailInABoxClient {
    /// List every custom DNS record
    ///
    /// # API Call
    ///
    /// ```http
    /// GET /admin/dns/custom
    /// Authorization: Basic <user:password>
    /// ```
    async fn list_records(&self) -> Result<Vec<DnsRecord>> {
        tracing::debug!("Listing custom DNS records from {}", self.base_url);

        let response = self
            .client
            .get(&self.base_url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .map_err(|e| Error::fetch(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::fetch(Self::failure_message(response).await));
        }

        let text = response
            .text()
            .await
            .map_err(|e| Error::fetch(format!("Failed to read response: {}", e)))?;

        let records: Vec<DnsRecord> = serde_json::from_str(&text).map_err(|e| {
            Error::fetch(format!(
                "Failed to parse record list: {}. Response: {}",
                e,
                body_excerpt(&text)
            ))
        })?;

        tracing::debug!("Received {} custom record(s)", records.len());
        Ok(records)
    }

    fn record_url(&self, parent_name: &str, record_type: RecordType) -> String {
        format!("{}/{}/{}", self.base_url, parent_name, record_type)
    }

    /// Write one address to a name/type
    ///
    /// # API Call
    ///
    /// ```http
    /// PUT|POST /admin/dns/custom/foo.com/A
    /// Authorization: Basic <user:password>
    ///
    /// 10.0.0.1
    /// ```
    async fn write_record(
        &self,
        method: WriteMethod,
        parent_name: &str,
        record_type: RecordType,
        value: &str,
    ) -> Result<()> {
        let url = self.record_url(parent_name, record_type);

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send {} to {} with body: {}",
                http_method(method),
                url,
                value
            );
            return Ok(());
        }

        let request = match method {
            WriteMethod::Replace => self.client.put(&url),
            WriteMethod::Append => self.client.post(&url),
        };

        let response = request
            .basic_auth(&self.username, Some(&self.password))
            .body(value.to_string())
            .send()
            .await
            .map_err(|e| Error::write(&url, format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::write(&url, Self::failure_message(response).await));
        }

        tracing::debug!("{} {} accepted", http_method(method), url);
        Ok(())
    }

    fn client_name(&self) -> &'static str {
        "mailinabox"
    }
}

/// Trimmed response body, cut to `MAX_BODY_EXCERPT` characters
fn body_excerpt(text: &str) -> String {
    let text = text.trim();
    match text.char_indices().nth(MAX_BODY_EXCERPT) {
        Some((cut, _)) => format!("{}... ({} bytes total)", &text[..cut], text.len()),
        None => text.to_string(),
    }
}

/// HTTP verb used for a write method
pub fn http_method(method: WriteMethod) -> &'static str {
    match method {
        WriteMethod::Replace => "PUT",
        WriteMethod::Append => "POST",
    }
}
