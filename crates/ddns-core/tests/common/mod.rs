//! Test doubles and common utilities for contract tests
//!
//! This module provides in-memory resolvers, a recording DNS provider and a
//! recording notifier. All doubles share their counters through `Arc` so a
//! test can keep a handle after boxing the double into the engine.

#![allow(dead_code)]

use async_trait::async_trait;
use ddns_core::config::{Domain, DomainConfig, DomainsConfig, EngineConfig};
use ddns_core::error::{Error, Result};
use ddns_core::traits::{DnsProvider, DnsRecord, IpResolver, Notifier};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Resolver returning a scripted sequence of results
///
/// The last entry repeats once the script runs out.
#[derive(Clone)]
pub struct ScriptedResolver {
    script: Arc<Mutex<VecDeque<std::result::Result<String, String>>>>,
    last: Arc<Mutex<std::result::Result<String, String>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedResolver {
    /// Always returns `ip`
    pub fn fixed(ip: &str) -> Self {
        Self::new(vec![Ok(ip.to_string())])
    }

    pub fn new(script: Vec<std::result::Result<String, String>>) -> Self {
        let script: VecDeque<_> = script.into();
        let last = script
            .back()
            .cloned()
            .unwrap_or_else(|| Err("empty script".to_string()));

        Self {
            script: Arc::new(Mutex::new(script)),
            last: Arc::new(Mutex::new(last)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IpResolver for ScriptedResolver {
    async fn resolve(&self) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let next = self.script.lock().unwrap().pop_front();
        let result = match next {
            Some(result) => {
                *self.last.lock().unwrap() = result.clone();
                result
            }
            None => self.last.lock().unwrap().clone(),
        };

        result.map_err(Error::resolution)
    }

    fn source_name(&self) -> &'static str {
        "scripted"
    }
}

/// One recorded update call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateCall {
    pub zone_id: String,
    pub record_id: String,
    pub name: String,
    pub content: String,
    pub ttl: u32,
    pub proxied: bool,
}

/// In-memory DNS provider holding records per zone
///
/// Updates are applied to the stored records, so a second pass observes the
/// first pass's writes like a real provider would.
#[derive(Clone, Default)]
pub struct MockDnsProvider {
    zones: Arc<Mutex<HashMap<String, Vec<DnsRecord>>>>,
    list_calls: Arc<Mutex<Vec<String>>>,
    update_calls: Arc<Mutex<Vec<UpdateCall>>>,
    fail_list_for_zone: Arc<Mutex<Option<String>>>,
    fail_update_for_record: Arc<Mutex<Option<String>>>,
}

impl MockDnsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a zone with records
    pub fn with_zone(self, zone_id: &str, records: Vec<DnsRecord>) -> Self {
        self.zones
            .lock()
            .unwrap()
            .insert(zone_id.to_string(), records);
        self
    }

    /// Make `list_records` fail for this zone
    pub fn fail_list(&self, zone_id: &str) {
        *self.fail_list_for_zone.lock().unwrap() = Some(zone_id.to_string());
    }

    /// Make `update_record` fail for this record name
    pub fn fail_update(&self, record_name: &str) {
        *self.fail_update_for_record.lock().unwrap() = Some(record_name.to_string());
    }

    /// Stop failing
    pub fn heal(&self) {
        *self.fail_list_for_zone.lock().unwrap() = None;
        *self.fail_update_for_record.lock().unwrap() = None;
    }

    /// Zones listed, in call order
    pub fn list_calls(&self) -> Vec<String> {
        self.list_calls.lock().unwrap().clone()
    }

    /// Update calls, in call order
    pub fn update_calls(&self) -> Vec<UpdateCall> {
        self.update_calls.lock().unwrap().clone()
    }

    pub fn update_call_count(&self) -> usize {
        self.update_calls.lock().unwrap().len()
    }

    /// Current content of a stored record
    pub fn content_of(&self, zone_id: &str, record_name: &str) -> Option<String> {
        self.zones
            .lock()
            .unwrap()
            .get(zone_id)?
            .iter()
            .find(|r| r.name == record_name)
            .map(|r| r.content.clone())
    }
}

#[async_trait]
impl DnsProvider for MockDnsProvider {
    async fn list_records(&self, zone_id: &str, _api_token: &str) -> Result<Vec<DnsRecord>> {
        self.list_calls.lock().unwrap().push(zone_id.to_string());

        if self.fail_list_for_zone.lock().unwrap().as_deref() == Some(zone_id) {
            return Err(Error::provider(403, r#"{"success":false}"#));
        }

        Ok(self
            .zones
            .lock()
            .unwrap()
            .get(zone_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn update_record(
        &self,
        zone_id: &str,
        _api_token: &str,
        record: &DnsRecord,
        new_ip: &str,
    ) -> Result<()> {
        self.update_calls.lock().unwrap().push(UpdateCall {
            zone_id: zone_id.to_string(),
            record_id: record.id.clone(),
            name: record.name.clone(),
            content: new_ip.to_string(),
            ttl: record.ttl,
            proxied: record.proxied,
        });

        if self.fail_update_for_record.lock().unwrap().as_deref() == Some(record.name.as_str()) {
            return Err(Error::provider(500, "internal error"));
        }

        if let Some(stored) = self
            .zones
            .lock()
            .unwrap()
            .get_mut(zone_id)
            .and_then(|records| records.iter_mut().find(|r| r.id == record.id))
        {
            stored.content = new_ip.to_string();
        }

        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// One recorded notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub old_ip: Option<String>,
    pub new_ip: String,
    pub changed: Vec<String>,
}

/// Notifier recording every call, optionally failing
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifier that records the call, then fails
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, old_ip: Option<&str>, new_ip: &str, changed: &[String]) -> Result<()> {
        self.sent.lock().unwrap().push(Notification {
            old_ip: old_ip.map(str::to_string),
            new_ip: new_ip.to_string(),
            changed: changed.to_vec(),
        });

        if self.fail {
            return Err(Error::notification("connection refused"));
        }
        Ok(())
    }
}

/// Build an `A` record
pub fn a_record(id: &str, name: &str, content: &str) -> DnsRecord {
    record(id, "A", name, content)
}

pub fn record(id: &str, record_type: &str, name: &str, content: &str) -> DnsRecord {
    DnsRecord {
        id: id.to_string(),
        record_type: record_type.to_string(),
        name: name.to_string(),
        content: content.to_string(),
        ttl: 1,
        proxied: false,
    }
}

/// Build a domain entry
pub fn domain(name: &str, zone_id: &str, records: &[&str]) -> Domain {
    Domain {
        name: name.to_string(),
        config: DomainConfig {
            api_token: format!("token-{}", zone_id),
            zone_id: zone_id.to_string(),
            records: records.iter().map(|r| r.to_string()).collect(),
        },
    }
}

pub fn domains(entries: Vec<Domain>) -> DomainsConfig {
    DomainsConfig::new(entries)
}

/// Engine settings for tests: short interval, roomy event channel
pub fn test_engine_config(poll_interval: Duration) -> EngineConfig {
    EngineConfig {
        poll_interval,
        event_channel_capacity: 100,
    }
}
