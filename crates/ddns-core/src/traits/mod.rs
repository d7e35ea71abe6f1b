//! Core traits for the DDNS system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`IpResolver`]: Determine the current public IP
//! - [`DnsProvider`]: List and update DNS records via provider APIs
//! - [`Notifier`]: Tell an operator which records changed

pub mod ip_source;
pub mod dns_provider;
pub mod notifier;

pub use ip_source::IpResolver;
pub use dns_provider::{DnsProvider, DnsRecord, ADDRESS_RECORD_TYPE};
pub use notifier::Notifier;
