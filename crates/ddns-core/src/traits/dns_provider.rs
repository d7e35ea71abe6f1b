// # DNS Provider Trait
//
// Defines the interface for reading and writing DNS records via provider APIs.
//
// ## Implementations
//
// - Cloudflare: `ddns-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::DnsProvider;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let provider = /* DnsProvider implementation */;
//
//     for record in provider.list_records("zone-id", "token").await? {
//         if record.is_address() && record.content != "203.0.113.7" {
//             provider.update_record("zone-id", "token", &record, "203.0.113.7").await?;
//         }
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Record type managed by the reconciler
pub const ADDRESS_RECORD_TYPE: &str = "A";

/// A DNS record as returned by the provider
///
/// Copies are read-only and live for one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    /// Provider-specific record ID
    pub id: String,

    /// Record type (`A`, `AAAA`, `CNAME`, ...)
    #[serde(rename = "type")]
    pub record_type: String,

    /// Fully qualified record name
    pub name: String,

    /// Record content, an IP address for address records
    pub content: String,

    /// Time-to-live (1 means automatic on Cloudflare)
    pub ttl: u32,

    /// Whether traffic goes through the provider's edge network
    pub proxied: bool,
}

impl DnsRecord {
    /// Whether this is an IPv4 address record
    pub fn is_address(&self) -> bool {
        self.record_type == ADDRESS_RECORD_TYPE
    }
}

/// Trait for DNS provider implementations
///
/// Implementations are thin HTTP wrappers. Deciding which records need an
/// update is owned by the reconciler.
///
/// # Allowed Capabilities
/// - ✅ Perform HTTP/HTTPS API calls to their endpoints only
/// - ✅ Parse provider-specific responses
///
/// # Forbidden Capabilities
/// - ❌ Implement retry logic or backoff (a failed update is retried next pass)
/// - ❌ Decide whether an update is needed
/// - ❌ Log API tokens
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// List every record of a zone
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<DnsRecord>)`: Records in provider order
    /// - `Err(Error::Provider)`: Non-2xx response or transport failure
    async fn list_records(
        &self,
        zone_id: &str,
        api_token: &str,
    ) -> Result<Vec<DnsRecord>, crate::Error>;

    /// Replace a record's content with a new address
    ///
    /// The replacement keeps the `ttl` and `proxied` values of `record` and
    /// pins the type to [`ADDRESS_RECORD_TYPE`].
    ///
    /// # Returns
    ///
    /// - `Ok(())`: The provider accepted the update
    /// - `Err(Error::Provider)`: Non-2xx response or transport failure
    async fn update_record(
        &self,
        zone_id: &str,
        api_token: &str,
        record: &DnsRecord,
        new_ip: &str,
    ) -> Result<(), crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}
