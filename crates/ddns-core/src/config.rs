//! Configuration types for the DDNS system
//!
//! Two sources feed the process configuration:
//!
//! - [`DomainsConfig`]: the JSON domains file (`CONFIG_JSON`) declaring which
//!   records of which zones are managed.
//! - [`Settings`]: everything else, read once from the environment.
//!
//! Both are built at startup and never change while the process runs.

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Default poll interval in seconds
pub const DEFAULT_UPDATE_INTERVAL_SECS: u64 = 300;

/// Default timeout for the address-echo service in seconds
pub const DEFAULT_IP_TIMEOUT_SECS: u64 = 10;

/// Default log file location
pub const DEFAULT_LOG_FILE: &str = "/var/log/cloudflare-ddns.log";

/// Default log truncation threshold in KB
pub const DEFAULT_LOG_MAX_SIZE_KB: u64 = 500;

/// Default application name used in notifications
pub const DEFAULT_APP_NAME: &str = "Cloudflare DDNS Updater";

/// Default SMTP port (implicit TLS)
pub const DEFAULT_MAIL_PORT: u16 = 465;

/// Settings for one managed domain
#[derive(Clone, Serialize, Deserialize)]
pub struct DomainConfig {
    /// Cloudflare API token scoped to the zone
    pub api_token: String,

    /// Zone ID the domain lives in
    pub zone_id: String,

    /// Record names or bare labels relative to the domain
    #[serde(default)]
    pub records: Vec<String>,
}

// The token must never reach the logs
impl fmt::Debug for DomainConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainConfig")
            .field("api_token", &"<REDACTED>")
            .field("zone_id", &self.zone_id)
            .field("records", &self.records)
            .finish()
    }
}

/// A domain name together with its settings
#[derive(Debug, Clone)]
pub struct Domain {
    /// Domain name, e.g. `example.com`
    pub name: String,

    /// Settings for the domain
    pub config: DomainConfig,
}

/// Declarative set of managed domains, in file order
#[derive(Debug, Clone, Default)]
pub struct DomainsConfig {
    domains: Vec<Domain>,
}

#[derive(Deserialize)]
struct DomainsFile {
    #[serde(deserialize_with = "ordered_domains")]
    domains: Vec<Domain>,
}

/// Deserialize a JSON object into a list, keeping the key order of the file
fn ordered_domains<'de, D>(deserializer: D) -> std::result::Result<Vec<Domain>, D::Error>
where
    D: Deserializer<'de>,
{
    struct DomainsVisitor;

    impl<'de> Visitor<'de> for DomainsVisitor {
        type Value = Vec<Domain>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of domain name to domain settings")
        }

        fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut domains: Vec<Domain> = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((name, config)) = map.next_entry::<String, DomainConfig>()? {
                if domains.iter().any(|d| d.name == name) {
                    return Err(de::Error::custom(format!("duplicate domain `{}`", name)));
                }
                domains.push(Domain { name, config });
            }
            Ok(domains)
        }
    }

    deserializer.deserialize_map(DomainsVisitor)
}

impl DomainsConfig {
    /// Build a configuration from already-parsed domains
    pub fn new(domains: Vec<Domain>) -> Self {
        Self { domains }
    }

    /// Load and validate the domains file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        Self::from_json(&content).map_err(|e| match e {
            Error::Config(msg) => Error::config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    /// Parse and validate the domains file contents
    pub fn from_json(content: &str) -> Result<Self> {
        let file: DomainsFile = serde_json::from_str(content)
            .map_err(|e| Error::config(format!("Invalid domains file: {}", e)))?;

        let config = Self::new(file.domains);
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.domains.is_empty() {
            return Err(Error::config("No domains configured"));
        }

        let mut seen = HashSet::new();
        for domain in &self.domains {
            if domain.name.trim().is_empty() {
                return Err(Error::config("Domain name cannot be empty"));
            }
            if !seen.insert(domain.name.as_str()) {
                return Err(Error::config(format!("Duplicate domain: {}", domain.name)));
            }
            if domain.config.api_token.is_empty() {
                return Err(Error::config(format!(
                    "api_token cannot be empty for domain {}",
                    domain.name
                )));
            }
            if domain.config.zone_id.is_empty() {
                return Err(Error::config(format!(
                    "zone_id cannot be empty for domain {}",
                    domain.name
                )));
            }
            if domain.config.records.is_empty() {
                tracing::warn!("Domain {} has no records configured", domain.name);
            }
        }

        Ok(())
    }

    /// Iterate domains in configuration order
    pub fn iter(&self) -> impl Iterator<Item = &Domain> {
        self.domains.iter()
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

/// IP source configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IpSourceConfig {
    /// HTTP address-echo service
    Http {
        /// URL returning the caller's address as plain text
        url: String,
        /// Request timeout in seconds
        timeout_secs: u64,
    },

    /// Static override for offline operation and tests
    Debug {
        /// Address to report, missing means every resolve fails
        ip: Option<String>,
    },
}

impl IpSourceConfig {
    /// Validate the IP source configuration
    pub fn validate(&self) -> Result<()> {
        match self {
            IpSourceConfig::Http { url, timeout_secs } => {
                if url.is_empty() {
                    return Err(Error::config(
                        "PUBLIC_IP_SERVICE is required unless APP_DEBUG=true",
                    ));
                }
                if !url.starts_with("https://") && !url.starts_with("http://") {
                    return Err(Error::config(format!(
                        "PUBLIC_IP_SERVICE must use HTTP or HTTPS scheme. Got: {}",
                        url
                    )));
                }
                if *timeout_secs == 0 {
                    return Err(Error::config("PUBLIC_IP_TIMEOUT must be > 0"));
                }
                Ok(())
            }
            // A missing debug IP is reported on every resolve, not at startup
            IpSourceConfig::Debug { .. } => Ok(()),
        }
    }
}

/// How the SMTP connection is secured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailEncryption {
    /// TLS from the first byte (SMTPS, usually port 465)
    Tls,
    /// Plain connection upgraded with STARTTLS (usually port 587)
    StartTls,
}

/// SMTP notification settings
#[derive(Clone)]
pub struct MailSettings {
    pub host: String,
    pub port: u16,
    pub encryption: MailEncryption,
    pub username: String,
    pub password: String,
    pub from_address: String,
    pub from_name: String,
    pub recipient: String,
    /// HTML template path, the built-in template is used when unset
    pub template_path: Option<PathBuf>,
}

impl fmt::Debug for MailSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("encryption", &self.encryption)
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .field("from_address", &self.from_address)
            .field("from_name", &self.from_name)
            .field("recipient", &self.recipient)
            .field("template_path", &self.template_path)
            .finish()
    }
}

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Sleep between two reconciliation passes
    pub poll_interval: Duration,

    /// Capacity of the internal event channel
    ///
    /// When full, new events are dropped with a warning log.
    pub event_channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(DEFAULT_UPDATE_INTERVAL_SECS),
            event_channel_capacity: 1000,
        }
    }
}

/// Log sink configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub path: PathBuf,
    pub max_size_kb: u64,
    pub level: String,
}

/// Process-wide settings read from the environment
#[derive(Debug, Clone)]
pub struct Settings {
    /// Path of the domains file
    pub config_path: PathBuf,
    pub ip_source: IpSourceConfig,
    pub engine: EngineConfig,
    pub log: LogConfig,
    pub app_name: String,
    /// Skip PUT calls and only log them
    pub dry_run: bool,
    /// `None` when no recipient is configured
    pub mail: Option<MailSettings>,
}

impl Settings {
    /// Load settings from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary variable lookup
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let config_path = var("CONFIG_JSON").map(PathBuf::from).ok_or_else(|| {
            Error::config(
                "CONFIG_JSON is required. \
                 Set it via: export CONFIG_JSON=/etc/ddns/config.json",
            )
        })?;

        let debug = var("APP_DEBUG").is_some_and(|v| v.eq_ignore_ascii_case("true"));
        let ip_source = if debug {
            IpSourceConfig::Debug { ip: var("DEBUG_IP") }
        } else {
            IpSourceConfig::Http {
                url: var("PUBLIC_IP_SERVICE").unwrap_or_default(),
                timeout_secs: parse_number(&var, "PUBLIC_IP_TIMEOUT", DEFAULT_IP_TIMEOUT_SECS)?,
            }
        };

        let engine = EngineConfig {
            poll_interval: Duration::from_secs(parse_number(
                &var,
                "UPDATE_INTERVAL",
                DEFAULT_UPDATE_INTERVAL_SECS,
            )?),
            ..EngineConfig::default()
        };

        let log = LogConfig {
            path: var("LOG_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE)),
            max_size_kb: parse_number(&var, "LOG_MAX_SIZE_KB", DEFAULT_LOG_MAX_SIZE_KB)?,
            level: var("DDNS_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        };

        let app_name = var("APP_NAME").unwrap_or_else(|| DEFAULT_APP_NAME.to_string());
        let dry_run = var("DDNS_MODE").is_some_and(|v| v.eq_ignore_ascii_case("dry-run"));
        let mail = mail_settings(&var, &app_name)?;

        let settings = Self {
            config_path,
            ip_source,
            engine,
            log,
            app_name,
            dry_run,
            mail,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        self.ip_source.validate()?;

        if self.engine.poll_interval.is_zero() {
            return Err(Error::config("UPDATE_INTERVAL must be > 0"));
        }

        if self.log.max_size_kb == 0 {
            return Err(Error::config("LOG_MAX_SIZE_KB must be > 0"));
        }

        match self.log.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(Error::config(format!(
                    "DDNS_LOG_LEVEL '{}' is not valid. \
                     Valid levels: trace, debug, info, warn, error",
                    self.log.level
                )));
            }
        }

        Ok(())
    }
}

fn parse_number<V, T>(var: &V, key: &str, default: T) -> Result<T>
where
    V: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match var(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e| Error::config(format!("{} must be a number. Got '{}': {}", key, raw, e))),
        None => Ok(default),
    }
}

fn mail_settings<V>(var: &V, app_name: &str) -> Result<Option<MailSettings>>
where
    V: Fn(&str) -> Option<String>,
{
    let Some(recipient) = var("NOTIFICATION_EMAIL") else {
        return Ok(None);
    };

    let required = |key: &str| {
        var(key).ok_or_else(|| {
            Error::config(format!("{} is required when NOTIFICATION_EMAIL is set", key))
        })
    };

    let host = required("MAIL_HOST")?;
    let username = required("MAIL_USERNAME")?;
    let password = required("MAIL_PASSWORD")?;

    let encryption = match var("MAIL_ENCRYPTION").map(|v| v.to_lowercase()).as_deref() {
        None | Some("tls") | Some("ssl") => MailEncryption::Tls,
        Some("starttls") => MailEncryption::StartTls,
        Some(other) => {
            return Err(Error::config(format!(
                "MAIL_ENCRYPTION '{}' is not supported. Supported: tls, ssl, starttls",
                other
            )));
        }
    };

    Ok(Some(MailSettings {
        port: parse_number(var, "MAIL_PORT", DEFAULT_MAIL_PORT)?,
        from_address: var("MAIL_FROM_ADDRESS").unwrap_or_else(|| username.clone()),
        from_name: var("MAIL_FROM_NAME").unwrap_or_else(|| app_name.to_string()),
        template_path: var("MAIL_TEMPLATE").map(PathBuf::from),
        host,
        encryption,
        username,
        password,
        recipient,
    }))
}
