// # Notifier Trait
//
// Defines the interface for telling an operator that records changed.
//
// ## Implementations
//
// - SMTP email: `ddns-notify-smtp` crate

use async_trait::async_trait;

/// Trait for change notification implementations
///
/// A failing notifier never undoes DNS work: the engine logs the error and
/// moves on.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send one notification for a reconciliation pass
    ///
    /// # Parameters
    ///
    /// - `old_ip`: Previously confirmed IP, `None` on the first pass
    /// - `new_ip`: IP the records now point to
    /// - `changed`: Names of the updated records, in update order
    async fn notify(
        &self,
        old_ip: Option<&str>,
        new_ip: &str,
        changed: &[String],
    ) -> Result<(), crate::Error>;
}
