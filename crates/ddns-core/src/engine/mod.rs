//! Core DDNS engine
//!
//! The DdnsEngine is responsible for:
//! - Polling the public IP via IpResolver at a fixed interval
//! - Reconciling DNS records when the IP differs from the last confirmed one
//! - Notifying the operator about changed records
//! - Keeping the log file under its size threshold
//!
//! ## Architecture
//!
//! ```text
//!   sleep(poll_interval) <──────────────────────────────┐
//!          │                                             │
//!          ▼                                             │
//!   IpResolver::resolve() ── same as last_ip ────────────┤
//!          │ differs                                     │
//!          ▼                                             │
//!   reconcile(DnsProvider, ip, domains) ── failure ──────┤
//!          │ changed records                             │
//!          ▼                                             │
//!   Notifier::notify() (only if something changed) ──────┘
//! ```
//!
//! ## Pass Flow
//!
//! `Idle → Polling → (Unchanged | Reconciling → Notifying) → Idle`
//!
//! 1. Enforce the log size limit
//! 2. Resolve the current IP
//! 3. If equal to the last confirmed IP, stop here
//! 4. Reconcile every configured domain
//! 5. If records changed, notify
//! 6. Hand the confirmed IP back to the loop
//!
//! Every failure inside a pass is logged and swallowed; the loop only ends on
//! a shutdown signal.

use crate::config::{DomainsConfig, EngineConfig};
use crate::error::{Error, Result};
use crate::logging::LogFile;
use crate::reconcile::{reconcile, PartialFailure};
use crate::traits::{DnsProvider, IpResolver, Notifier};
use std::future::Future;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Events emitted by the DdnsEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Engine started
    Started {
        domains_count: usize,
    },

    /// Resolved IP equals the last confirmed IP
    IpUnchanged {
        ip: String,
    },

    /// Resolved IP differs from the last confirmed IP
    IpChanged {
        previous_ip: Option<String>,
        new_ip: String,
    },

    /// All domains were reconciled
    Reconciled {
        new_ip: String,
        changed: Vec<String>,
    },

    /// Notification sent for changed records
    NotificationSent {
        changed: Vec<String>,
    },

    /// Notification failed (DNS work is kept)
    NotificationFailed {
        error: String,
    },

    /// Pass failed before completing
    PassFailed {
        error: String,
        changed: Vec<String>,
    },

    /// Engine stopped
    Stopped {
        reason: String,
    },
}

/// What happened to the notification step of a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationStatus {
    /// No record changed, nothing to report
    NotNeeded,
    /// No notifier configured
    Disabled,
    Sent,
    Failed,
}

/// Result of one reconciliation pass
#[derive(Debug)]
pub enum PassOutcome {
    /// The IP did not change since the last confirmed pass
    Unchanged {
        ip: String,
    },

    /// Every domain was reconciled against the new IP
    Reconciled {
        previous_ip: Option<String>,
        new_ip: String,
        changed: Vec<String>,
        notification: NotificationStatus,
    },

    /// Resolution or a provider call failed
    ///
    /// `changed` lists updates confirmed before the failure.
    Failed {
        error: Error,
        changed: Vec<String>,
    },
}

impl PassOutcome {
    /// IP the loop should remember as `last_ip`
    ///
    /// `None` for failed passes, so the next pass reconciles again.
    pub fn confirmed_ip(&self) -> Option<&str> {
        match self {
            PassOutcome::Unchanged { ip } => Some(ip),
            PassOutcome::Reconciled { new_ip, .. } => Some(new_ip),
            PassOutcome::Failed { .. } => None,
        }
    }
}

/// Core DDNS engine
///
/// The engine drives the poll → reconcile → notify loop.
///
/// ## Lifecycle
///
/// 1. Create with [`DdnsEngine::new()`]
/// 2. Optionally attach a log file with [`DdnsEngine::with_log_file()`]
/// 3. Start with [`DdnsEngine::run()`]
/// 4. Engine runs until SIGINT/SIGTERM
///
/// ## Threading
///
/// One pass runs to completion before the next sleep starts. There is no
/// overlap between passes and no per-domain parallelism, and a hung HTTP
/// call (bounded by its timeout) blocks the whole pass.
///
/// ## State
///
/// The last confirmed IP lives in the loop, not in the engine: it is passed
/// into [`DdnsEngine::run_pass()`] and read back from the returned
/// [`PassOutcome`]. It is lost on restart, which costs one redundant pass.
pub struct DdnsEngine {
    /// Public IP source
    resolver: Box<dyn IpResolver>,

    /// DNS provider for listing and updating records
    provider: Box<dyn DnsProvider>,

    /// Change notifier, `None` when notifications are disabled
    notifier: Option<Box<dyn Notifier>>,

    /// Domains to reconcile
    domains: DomainsConfig,

    /// Sleep between passes
    poll_interval: Duration,

    /// Log file to keep under its size threshold
    log_file: Option<LogFile>,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl DdnsEngine {
    /// Create a new DDNS engine
    ///
    /// # Parameters
    ///
    /// - `resolver`: IP resolver implementation
    /// - `provider`: DNS provider implementation
    /// - `notifier`: Notifier implementation, `None` disables notifications
    /// - `domains`: Domains to reconcile
    /// - `config`: Engine settings
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        resolver: Box<dyn IpResolver>,
        provider: Box<dyn DnsProvider>,
        notifier: Option<Box<dyn Notifier>>,
        domains: DomainsConfig,
        config: EngineConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        domains.validate()?;

        if config.poll_interval.is_zero() {
            return Err(Error::config("Poll interval must be > 0"));
        }
        if config.event_channel_capacity == 0 {
            return Err(Error::config("Event channel capacity must be > 0"));
        }

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let engine = Self {
            resolver,
            provider,
            notifier,
            domains,
            poll_interval: config.poll_interval,
            log_file: None,
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Keep `log_file` under its threshold before each pass
    pub fn with_log_file(mut self, log_file: LogFile) -> Self {
        self.log_file = Some(log_file);
        self
    }

    /// Run the engine
    ///
    /// Passes run forever at the configured interval until SIGINT or SIGTERM
    /// arrives.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Clean shutdown
    /// - `Err(Error)`: Signal handlers could not be installed
    pub async fn run(&self) -> Result<()> {
        self.run_with_shutdown(None).await
    }

    /// Run the engine with an optional shutdown signal
    ///
    /// # Parameters
    ///
    /// - `shutdown_rx`: Stops the loop when it fires (or its sender is
    ///   dropped). `None` falls back to SIGINT/SIGTERM.
    pub async fn run_with_shutdown(
        &self,
        shutdown_rx: Option<oneshot::Receiver<()>>,
    ) -> Result<()> {
        match shutdown_rx {
            Some(rx) => {
                self.run_until(async {
                    let _ = rx.await;
                })
                .await
            }
            None => self.run_until(shutdown_signal()?).await,
        }
        Ok(())
    }

    async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        info!(
            "DDNS engine started: {} domain(s), interval {:?}, provider {}, resolver {}",
            self.domains.len(),
            self.poll_interval,
            self.provider.provider_name(),
            self.resolver.source_name()
        );
        self.emit_event(EngineEvent::Started {
            domains_count: self.domains.len(),
        });

        let mut last_ip: Option<String> = None;

        loop {
            let outcome = self.run_pass(last_ip.as_deref()).await;
            if let Some(ip) = outcome.confirmed_ip() {
                last_ip = Some(ip.to_string());
            }

            // An in-flight pass is never cancelled, shutdown is only observed while idle
            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    self.emit_event(EngineEvent::Stopped {
                        reason: "Shutdown signal".to_string(),
                    });
                    break;
                }
            }
        }

        info!("DDNS engine stopped");
    }

    /// Run one reconciliation pass
    ///
    /// # Parameters
    ///
    /// - `last_ip`: The last confirmed IP, `None` after startup
    ///
    /// # Returns
    ///
    /// The pass outcome; [`PassOutcome::confirmed_ip()`] is the next `last_ip`.
    pub async fn run_pass(&self, last_ip: Option<&str>) -> PassOutcome {
        self.enforce_log_limit();

        let current_ip = match self.resolver.resolve().await {
            Ok(ip) => ip,
            Err(e) => {
                error!("Failed to resolve public IP: {}", e);
                return self.failed(e, Vec::new());
            }
        };

        if last_ip == Some(current_ip.as_str()) {
            info!("IP unchanged ({})", current_ip);
            self.emit_event(EngineEvent::IpUnchanged { ip: current_ip.clone() });
            return PassOutcome::Unchanged { ip: current_ip };
        }

        info!(
            "IP detected: {} (previous: {})",
            current_ip,
            last_ip.unwrap_or("N/A")
        );
        self.emit_event(EngineEvent::IpChanged {
            previous_ip: last_ip.map(str::to_string),
            new_ip: current_ip.clone(),
        });

        match reconcile(self.provider.as_ref(), &current_ip, &self.domains).await {
            Ok(changed) => {
                if changed.is_empty() {
                    info!("All records already point to {}", current_ip);
                } else {
                    info!("{} record(s) updated: {}", changed.len(), changed.join(", "));
                }
                self.emit_event(EngineEvent::Reconciled {
                    new_ip: current_ip.clone(),
                    changed: changed.clone(),
                });

                let notification = self.notify(last_ip, &current_ip, &changed).await;

                PassOutcome::Reconciled {
                    previous_ip: last_ip.map(str::to_string),
                    new_ip: current_ip,
                    changed,
                    notification,
                }
            }
            Err(PartialFailure { changed, error }) => {
                error!(
                    "Reconciliation failed after {} confirmed update(s): {}",
                    changed.len(),
                    error
                );
                // Confirmed updates are real DNS changes, report them anyway
                self.notify(last_ip, &current_ip, &changed).await;
                self.failed(error, changed)
            }
        }
    }

    /// Send the change notification, isolating any failure
    async fn notify(
        &self,
        old_ip: Option<&str>,
        new_ip: &str,
        changed: &[String],
    ) -> NotificationStatus {
        if changed.is_empty() {
            return NotificationStatus::NotNeeded;
        }

        let Some(notifier) = &self.notifier else {
            debug!("Notifications disabled, skipping");
            return NotificationStatus::Disabled;
        };

        match notifier.notify(old_ip, new_ip, changed).await {
            Ok(()) => {
                info!("Change notification sent ({} record(s))", changed.len());
                self.emit_event(EngineEvent::NotificationSent {
                    changed: changed.to_vec(),
                });
                NotificationStatus::Sent
            }
            Err(e) => {
                error!("Failed to send change notification: {}", e);
                self.emit_event(EngineEvent::NotificationFailed {
                    error: e.to_string(),
                });
                NotificationStatus::Failed
            }
        }
    }

    fn failed(&self, error: Error, changed: Vec<String>) -> PassOutcome {
        self.emit_event(EngineEvent::PassFailed {
            error: error.to_string(),
            changed: changed.clone(),
        });
        PassOutcome::Failed { error, changed }
    }

    fn enforce_log_limit(&self) {
        let Some(log_file) = &self.log_file else {
            return;
        };

        match log_file.enforce_limit() {
            Ok(true) => info!(
                "Log file cleared automatically (reached {} KB)",
                log_file.max_size_kb()
            ),
            Ok(false) => {}
            Err(e) => error!(
                "Could not check or clear log file {}: {}",
                log_file.path().display(),
                e
            ),
        }
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        // Never block a pass on a slow event consumer
        if self.event_tx.try_send(event).is_err() {
            warn!(
                "Event channel full, dropping event. \
                 Consider increasing event_channel_capacity."
            );
        }
    }
}

/// Wait for SIGTERM or SIGINT
#[cfg(unix)]
fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| Error::config(format!("Failed to setup SIGTERM handler: {}", e)))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| Error::config(format!("Failed to setup SIGINT handler: {}", e)))?;

    Ok(async move {
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = sigint.recv() => info!("Received SIGINT"),
        }
    })
}

/// Wait for CTRL-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    Ok(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to wait for CTRL-C: {}", e);
            std::future::pending::<()>().await;
        }
    })
}
