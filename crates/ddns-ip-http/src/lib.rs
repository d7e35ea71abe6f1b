// # Public IP Resolvers
//
// This crate provides the `IpResolver` implementations for the DDNS
// reconciler.
//
// ## Resolvers
//
// - `HttpIpResolver`: asks an address-echo service (e.g. api.ipify.org,
//   icanhazip.com) and returns the trimmed response body
// - `DebugIpResolver`: returns a fixed address without touching the network,
//   for offline runs and tests
//
// ## Architecture
//
// Resolvers are single-shot: one request per `resolve()` call, no caching
// and no background polling. The engine owns the polling interval.

use async_trait::async_trait;
use ddns_core::config::IpSourceConfig;
use ddns_core::traits::IpResolver;
use ddns_core::{Error, Result};

use std::time::Duration;

/// IP resolver backed by an HTTP address-echo service
#[derive(Debug)]
pub struct HttpIpResolver {
    /// URL to fetch the IP from
    url: String,

    /// HTTP client, carries the request timeout
    client: reqwest::Client,
}

impl HttpIpResolver {
    /// Create a new HTTP resolver
    ///
    /// # Parameters
    ///
    /// - `url`: URL returning the caller's IP as plain text (e.g., "https://api.ipify.org")
    /// - `timeout`: Bound on the whole request
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl IpResolver for HttpIpResolver {
    async fn resolve(&self) -> Result<String> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::resolution(format!("Request to {} failed: {}", self.url, e)))?;

        if !response.status().is_success() {
            return Err(Error::resolution(format!(
                "{} returned HTTP {}",
                self.url,
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::resolution(format!("Failed to read response: {}", e)))?;

        // Returned as-is: a malformed value surfaces when it is written to a record
        Ok(body.trim().to_string())
    }

    fn source_name(&self) -> &'static str {
        "http"
    }
}

/// Fixed-address resolver for debug mode
#[derive(Debug, Clone)]
pub struct DebugIpResolver {
    ip: Option<String>,
}

impl DebugIpResolver {
    /// `None` makes every `resolve()` fail
    pub fn new(ip: Option<String>) -> Self {
        Self { ip }
    }
}

#[async_trait]
impl IpResolver for DebugIpResolver {
    async fn resolve(&self) -> Result<String> {
        match &self.ip {
            Some(ip) => {
                tracing::info!("[DEBUG] Using debug IP: {}", ip);
                Ok(ip.clone())
            }
            None => Err(Error::resolution(
                "APP_DEBUG is enabled but DEBUG_IP is not set",
            )),
        }
    }

    fn source_name(&self) -> &'static str {
        "debug"
    }
}

/// Build the resolver selected by `config`
pub fn create(config: &IpSourceConfig) -> Result<Box<dyn IpResolver>> {
    config.validate()?;

    match config {
        IpSourceConfig::Http { url, timeout_secs } => Ok(Box::new(HttpIpResolver::new(
            url.clone(),
            Duration::from_secs(*timeout_secs),
        )?)),
        IpSourceConfig::Debug { ip } => {
            tracing::warn!("Debug mode enabled - the public IP service is not queried");
            Ok(Box::new(DebugIpResolver::new(ip.clone())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn body_is_trimmed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ip"))
            .respond_with(ResponseTemplate::new(200).set_body_string("  203.0.113.7\n"))
            .expect(1)
            .mount(&server)
            .await;

        let resolver =
            HttpIpResolver::new(format!("{}/ip", server.uri()), Duration::from_secs(5)).unwrap();

        assert_eq!(resolver.resolve().await.unwrap(), "203.0.113.7");
    }

    #[tokio::test]
    async fn body_is_not_validated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not-an-ip"))
            .mount(&server)
            .await;

        let resolver = HttpIpResolver::new(server.uri(), Duration::from_secs(5)).unwrap();

        assert_eq!(resolver.resolve().await.unwrap(), "not-an-ip");
    }

    #[tokio::test]
    async fn every_call_hits_the_service() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("203.0.113.7"))
            .expect(2)
            .mount(&server)
            .await;

        let resolver = HttpIpResolver::new(server.uri(), Duration::from_secs(5)).unwrap();
        resolver.resolve().await.unwrap();
        resolver.resolve().await.unwrap();
    }

    #[tokio::test]
    async fn non_success_status_is_a_resolution_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let resolver = HttpIpResolver::new(server.uri(), Duration::from_secs(5)).unwrap();
        let err = resolver.resolve().await.unwrap_err();

        assert!(matches!(err, Error::Resolution(_)));
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn slow_service_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("203.0.113.7")
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let resolver = HttpIpResolver::new(server.uri(), Duration::from_millis(100)).unwrap();

        assert!(matches!(
            resolver.resolve().await.unwrap_err(),
            Error::Resolution(_)
        ));
    }

    #[tokio::test]
    async fn debug_mode_makes_no_network_call() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("198.51.100.1"))
            .expect(0)
            .mount(&server)
            .await;

        let resolver = create(&IpSourceConfig::Debug {
            ip: Some("192.0.2.10".to_string()),
        })
        .unwrap();

        assert_eq!(resolver.resolve().await.unwrap(), "192.0.2.10");
        assert_eq!(resolver.source_name(), "debug");
    }

    #[tokio::test]
    async fn debug_mode_without_ip_fails_each_call() {
        let resolver = DebugIpResolver::new(None);

        assert!(matches!(
            resolver.resolve().await.unwrap_err(),
            Error::Resolution(_)
        ));
        assert!(resolver.resolve().await.is_err());
    }

    #[test]
    fn create_rejects_invalid_http_config() {
        let config = IpSourceConfig::Http {
            url: "ftp://example.com".to_string(),
            timeout_secs: 10,
        };

        assert!(create(&config).is_err());
    }

    #[test]
    fn create_builds_http_resolver() {
        let config = IpSourceConfig::Http {
            url: "https://api.ipify.org".to_string(),
            timeout_secs: 10,
        };

        let resolver = create(&config).unwrap();
        assert_eq!(resolver.source_name(), "http");
    }
}
