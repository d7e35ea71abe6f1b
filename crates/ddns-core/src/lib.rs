// # ddns-core
//
// Core library for the Cloudflare DDNS reconciler.
//
// ## Architecture Overview
//
// This library keeps a set of DNS address records pointed at the host's
// current public IPv4 address:
// - **IpResolver**: Trait for determining the current public IP
// - **DnsProvider**: Trait for listing and updating DNS records via provider APIs
// - **Notifier**: Trait for reporting changed records to an operator
// - **reconcile()**: Brings every matched record of every domain to one IP
// - **DdnsEngine**: Poll → reconcile → notify loop
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from implementations
// 2. **Pull-Based**: The IP is polled at a fixed interval, never pushed
// 3. **Stateless Across Restarts**: The first pass after startup always reconciles
// 4. **Library-First**: All core functionality can be used as a library

pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod reconcile;
pub mod traits;

// Re-export core types for convenience
pub use config::{
    Domain, DomainConfig, DomainsConfig, EngineConfig, IpSourceConfig, LogConfig,
    MailEncryption, MailSettings, Settings,
};
pub use engine::{DdnsEngine, EngineEvent, NotificationStatus, PassOutcome};
pub use error::{Error, Result};
pub use logging::LogFile;
pub use reconcile::{matches_target, reconcile, PartialFailure};
pub use traits::{DnsProvider, DnsRecord, IpResolver, Notifier, ADDRESS_RECORD_TYPE};
