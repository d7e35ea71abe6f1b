// # Cloudflare DNS Provider
//
// This crate provides the Cloudflare implementation of `DnsProvider`.
//
// The provider is a thin, stateless wrapper over two API calls:
//
// - ✅ One list call per zone, one PUT per stale record
// - ✅ Errors carry the HTTP status and response body back to the engine
// - ✅ HTTP timeout configured (30 seconds)
// - ✅ Status-specific diagnostics (401/403, 404, 409, 429, 5xx)
// - ✅ Dry-run mode for safe testing
// - ❌ NO retry or backoff (a failed update is retried on the next pass)
// - ❌ NO decision about which records to update (owned by the reconciler)
//
// ## Security Requirements
//
// - API tokens NEVER appear in logs or `Debug` output
// - Tokens are passed per call, one per zone
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - List DNS Records: GET `/zones/:zone_id/dns_records`
// - Update DNS Record: PUT `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use ddns_core::traits::{DnsProvider, DnsRecord, ADDRESS_RECORD_TYPE};
use ddns_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Envelope of a Cloudflare list response
#[derive(Debug, Deserialize)]
struct ListResponse {
    result: Vec<CloudflareRecord>,
}

/// A record as Cloudflare serializes it
///
/// Only the fields the reconciler needs; everything else is ignored.
#[derive(Debug, Deserialize)]
struct CloudflareRecord {
    id: String,
    #[serde(rename = "type")]
    record_type: String,
    name: String,
    // Absent on some non-address types, which the reconciler never reads
    #[serde(default)]
    content: String,
    #[serde(default = "automatic_ttl")]
    ttl: u32,
    #[serde(default)]
    proxied: bool,
}

/// Cloudflare's "automatic" TTL
fn automatic_ttl() -> u32 {
    1
}

impl From<CloudflareRecord> for DnsRecord {
    fn from(record: CloudflareRecord) -> Self {
        Self {
            id: record.id,
            record_type: record.record_type,
            name: record.name,
            content: record.content,
            ttl: record.ttl,
            proxied: record.proxied,
        }
    }
}

/// PUT body for an address record
#[derive(Debug, Serialize)]
struct UpdatePayload<'a> {
    #[serde(rename = "type")]
    record_type: &'a str,
    name: &'a str,
    content: &'a str,
    ttl: u32,
    proxied: bool,
}

/// Cloudflare DNS provider
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the provider will:
/// - Perform all list requests
/// - Log the intended PUT payload
/// - **NOT** actually modify DNS records, and report the update as applied
///
/// This allows safe testing without making changes.
pub struct CloudflareProvider {
    /// HTTP client for API requests
    client: reqwest::Client,

    /// API base URL, without trailing slash
    api_base: String,

    /// Dry-run mode: if true, perform list requests but skip PUT updates
    dry_run: bool,
}

// Tokens are passed per call and never stored on the provider
impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("api_base", &self.api_base)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider
    ///
    /// # Parameters
    ///
    /// - `dry_run`: If true, perform list requests but skip PUT updates
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP client cannot be built.
    pub fn new(dry_run: bool) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        if dry_run {
            tracing::warn!("Cloudflare provider running in DRY-RUN mode - no changes will be made");
        }

        Ok(Self {
            client,
            api_base: CLOUDFLARE_API_BASE.to_string(),
            dry_run,
        })
    }

    /// Point the provider at another API base URL
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn records_url(&self, zone_id: &str) -> String {
        format!("{}/zones/{}/dns_records", self.api_base, zone_id)
    }

    /// Turn a non-2xx response into a provider error
    ///
    /// The status is also explained at warn level, since the raw body alone
    /// rarely tells an operator what to fix.
    async fn status_error(response: reqwest::Response, operation: &str) -> Error {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());

        match status.as_u16() {
            401 | 403 => tracing::warn!(
                "Cloudflare {} failed: invalid API token or insufficient permissions ({})",
                operation,
                status
            ),
            404 => tracing::warn!(
                "Cloudflare {} failed: zone or record not found ({})",
                operation,
                status
            ),
            409 => tracing::warn!(
                "Cloudflare {} failed: conflicting change on the record ({})",
                operation,
                status
            ),
            429 => tracing::warn!(
                "Cloudflare {} failed: rate limit exceeded ({})",
                operation,
                status
            ),
            500..=599 => tracing::warn!(
                "Cloudflare {} failed: server error, likely transient ({})",
                operation,
                status
            ),
            _ => {}
        }

        Error::provider(status.as_u16(), body)
    }
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    /// List every record of a zone
    ///
    /// # API Call
    ///
    /// ```http
    /// GET /zones/:zone_id/dns_records
    /// Authorization: Bearer <token>
    /// ```
    async fn list_records(&self, zone_id: &str, api_token: &str) -> Result<Vec<DnsRecord>> {
        tracing::debug!("Listing DNS records of zone {}", zone_id);

        let response = self
            .client
            .get(self.records_url(zone_id))
            .bearer_auth(api_token)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| Error::provider_transport(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::status_error(response, "record listing").await);
        }

        let body: ListResponse = response
            .json()
            .await
            .map_err(|e| Error::provider_transport(format!("Failed to parse response: {}", e)))?;

        Ok(body.result.into_iter().map(DnsRecord::from).collect())
    }

    /// Point an address record at `new_ip`
    ///
    /// # API Call
    ///
    /// ```http
    /// PUT /zones/:zone_id/dns_records/:record_id
    /// Authorization: Bearer <token>
    ///
    /// {"type": "A", "name": "...", "content": "1.2.3.4", "ttl": 1, "proxied": false}
    /// ```
    async fn update_record(
        &self,
        zone_id: &str,
        api_token: &str,
        record: &DnsRecord,
        new_ip: &str,
    ) -> Result<()> {
        let url = format!("{}/{}", self.records_url(zone_id), record.id);
        let payload = UpdatePayload {
            record_type: ADDRESS_RECORD_TYPE,
            name: &record.name,
            content: new_ip,
            ttl: record.ttl,
            proxied: record.proxied,
        };

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send PUT request to {} with payload: {}",
                url,
                serde_json::to_string(&payload)?
            );
            return Ok(());
        }

        let response = self
            .client
            .put(&url)
            .bearer_auth(api_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::provider_transport(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Self::status_error(response, "record update").await);
        }

        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "cloudflare"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer, dry_run: bool) -> CloudflareProvider {
        CloudflareProvider::new(dry_run)
            .unwrap()
            .with_api_base(server.uri())
    }

    fn address_record() -> DnsRecord {
        DnsRecord {
            id: "rec-1".to_string(),
            record_type: "A".to_string(),
            name: "sub.example.com".to_string(),
            content: "1.1.1.1".to_string(),
            ttl: 120,
            proxied: true,
        }
    }

    #[tokio::test]
    async fn list_records_sends_bearer_token_and_parses_result() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/zones/zone-1/dns_records"))
            .and(header("Authorization", "Bearer secret-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "errors": [],
                "result": [
                    {"id": "rec-1", "type": "A", "name": "sub.example.com", "content": "1.1.1.1",
                     "ttl": 120, "proxied": true, "zone_id": "zone-1"},
                    {"id": "rec-2", "type": "TXT", "name": "example.com", "content": "v=spf1 -all",
                     "ttl": 1}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let records = provider(&server, false)
            .list_records("zone-1", "secret-token")
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0], address_record());
        assert_eq!(records[1].record_type, "TXT");
        assert!(!records[1].proxied);
    }

    #[tokio::test]
    async fn list_records_tolerates_records_without_content() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/zones/zone-1/dns_records"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "result": [
                    {"id": "rec-9", "type": "SRV", "name": "_sip._tcp.example.com",
                     "data": {"port": 5060, "target": "sip.example.com"}},
                    {"id": "rec-1", "type": "A", "name": "sub.example.com", "content": "1.1.1.1",
                     "ttl": 120, "proxied": true}
                ]
            })))
            .mount(&server)
            .await;

        let records = provider(&server, false)
            .list_records("zone-1", "secret-token")
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].record_type, "SRV");
        assert_eq!(records[0].content, "");
        assert_eq!(records[1], address_record());
    }

    #[tokio::test]
    async fn list_records_failure_carries_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/zones/zone-1/dns_records"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let err = provider(&server, false)
            .list_records("zone-1", "bad-token")
            .await
            .unwrap_err();

        match err {
            Error::Provider { status, body } => {
                assert_eq!(status, Some(403));
                assert_eq!(body, "forbidden");
            }
            other => panic!("expected provider error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn update_record_echoes_ttl_and_proxied() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/zones/zone-1/dns_records/rec-1"))
            .and(header("Authorization", "Bearer secret-token"))
            .and(body_json(serde_json::json!({
                "type": "A",
                "name": "sub.example.com",
                "content": "2.2.2.2",
                "ttl": 120,
                "proxied": true
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        provider(&server, false)
            .update_record("zone-1", "secret-token", &address_record(), "2.2.2.2")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn update_record_failure_is_a_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let err = provider(&server, false)
            .update_record("zone-1", "token", &address_record(), "2.2.2.2")
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(429));
    }

    #[tokio::test]
    async fn dry_run_skips_put() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let provider = provider(&server, true);
        assert!(provider.is_dry_run());
        provider
            .update_record("zone-1", "token", &address_record(), "2.2.2.2")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unreachable_api_is_a_transport_error() {
        let server = MockServer::start().await;
        let uri = server.uri();
        drop(server);

        let err = CloudflareProvider::new(false)
            .unwrap()
            .with_api_base(uri)
            .list_records("zone-1", "token")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Provider { status: None, .. }));
    }

    #[test]
    fn debug_output_has_no_secrets() {
        let provider = CloudflareProvider::new(false).unwrap();
        let debug_str = format!("{:?}", provider);
        assert!(debug_str.contains("CloudflareProvider"));
        assert!(debug_str.contains(CLOUDFLARE_API_BASE));
    }

    #[test]
    fn provider_name() {
        let provider = CloudflareProvider::new(false).unwrap();
        assert_eq!(provider.provider_name(), "cloudflare");
    }
}
