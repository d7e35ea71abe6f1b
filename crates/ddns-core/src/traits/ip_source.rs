// # IP Resolver Trait
//
// Defines the interface for determining the caller's public IP address.
//
// ## Implementations
//
// - HTTP address-echo service: `ddns-ip-http` crate
// - Static debug override: `ddns-ip-http` crate
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::IpResolver;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let resolver = /* IpResolver implementation */;
//
//     let current_ip = resolver.resolve().await?;
//     println!("public IP: {}", current_ip);
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

/// Trait for IP resolver implementations
///
/// The returned address is the raw, trimmed text reported by the source.
/// No format validation happens here: a malformed value surfaces later as a
/// provider error when it is written to a record.
///
/// # Allowed Capabilities
/// - ✅ One bounded-timeout request per call
///
/// # Forbidden Capabilities
/// - ❌ Retry or poll on its own (the engine owns scheduling)
/// - ❌ Cache the result between calls (every pass must observe a fresh value)
#[async_trait]
pub trait IpResolver: Send + Sync {
    /// Get the current public IP address
    ///
    /// # Returns
    ///
    /// - `Ok(String)`: The current IP address
    /// - `Err(Error::Resolution)`: Service unreachable, non-2xx response, or
    ///   missing debug override
    async fn resolve(&self) -> Result<String, crate::Error>;

    /// Short name for logging
    fn source_name(&self) -> &'static str;
}
