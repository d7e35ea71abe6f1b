//! Reconciliation of live DNS records against the current public IP
//!
//! For every configured domain the reconciler:
//!
//! 1. Lists the zone's records once (one list call per zone, however many
//!    targets the domain declares)
//! 2. Ignores every record that is not an address (`A`) record
//! 3. Matches each record against the domain's targets, first match wins
//! 4. Updates matched records whose content differs from the current IP
//!
//! Targets without a live record are ignored, so records can be created
//! out-of-band after the configuration is written.

use crate::config::{Domain, DomainsConfig};
use crate::error::Error;
use crate::traits::{DnsProvider, DnsRecord};
use tracing::{debug, info};

/// A pass that stopped on its first failing provider call
///
/// Updates confirmed before the failure are kept in `changed`; nothing is
/// rolled back.
#[derive(Debug)]
pub struct PartialFailure {
    /// Records updated before the failure, in update order
    pub changed: Vec<String>,

    /// The failure, wrapped with its domain and zone
    pub error: Error,
}

/// Check whether `target` designates `record_name` within `domain`
///
/// A target matches when it equals the record name, or when it is a bare
/// label such that `target + "." + domain == record_name`.
pub fn matches_target(target: &str, domain: &str, record_name: &str) -> bool {
    target == record_name
        || record_name
            .strip_suffix(domain)
            .and_then(|prefix| prefix.strip_suffix('.'))
            == Some(target)
}

/// Bring every matched address record of every domain to `current_ip`
///
/// # Returns
///
/// - `Ok(Vec<String>)`: Names of the records actually changed, in the order
///   they were discovered (domain order, then provider order)
/// - `Err(PartialFailure)`: A list or update call failed; the pass stops there
pub async fn reconcile(
    provider: &dyn DnsProvider,
    current_ip: &str,
    config: &DomainsConfig,
) -> Result<Vec<String>, PartialFailure> {
    let mut changed = Vec::new();

    for domain in config.iter() {
        if let Err(error) = reconcile_domain(provider, current_ip, domain, &mut changed).await {
            return Err(PartialFailure {
                changed,
                error: error.in_zone(&domain.name, &domain.config.zone_id),
            });
        }
    }

    Ok(changed)
}

async fn reconcile_domain(
    provider: &dyn DnsProvider,
    current_ip: &str,
    domain: &Domain,
    changed: &mut Vec<String>,
) -> Result<(), Error> {
    let zone_id = &domain.config.zone_id;
    let token = &domain.config.api_token;

    let records = provider.list_records(zone_id, token).await?;
    debug!(
        "Zone {} of {} returned {} record(s)",
        zone_id,
        domain.name,
        records.len()
    );

    for record in records.iter().filter(|r| r.is_address()) {
        if !is_target(domain, record) {
            continue;
        }

        if record.content == current_ip {
            debug!("{} already points to {}", record.name, current_ip);
            continue;
        }

        provider
            .update_record(zone_id, token, record, current_ip)
            .await?;
        info!(
            "[{}] {} updated from {} to {}",
            zone_id, record.name, record.content, current_ip
        );
        changed.push(record.name.clone());
    }

    Ok(())
}

fn is_target(domain: &Domain, record: &DnsRecord) -> bool {
    domain
        .config
        .records
        .iter()
        .any(|target| matches_target(target, &domain.name, &record.name))
}
