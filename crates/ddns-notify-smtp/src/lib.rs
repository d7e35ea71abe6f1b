// # SMTP Notifier
//
// This crate provides the email implementation of `Notifier`.
//
// One HTML message is sent per pass that changed at least one record. The
// body comes from a template with three placeholders:
//
// - `{{old_ip}}`: previously confirmed IP, `N/A` on the first pass
// - `{{new_ip}}`: IP the records now point to
// - `{{domains_list}}`: one `<li>name</li>` line per changed record
//
// ## Security Requirements
//
// - The SMTP password NEVER appears in logs
// - Connections are always encrypted (implicit TLS or STARTTLS)

use async_trait::async_trait;
use ddns_core::config::{MailEncryption, MailSettings};
use ddns_core::traits::Notifier;
use ddns_core::{Error, Result};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::borrow::Cow;
use std::path::PathBuf;
use std::time::Duration;

/// Template used when no `MAIL_TEMPLATE` is configured
pub const DEFAULT_TEMPLATE: &str = include_str!("../templates/email.html");

/// Bound on every SMTP command
const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Shown in place of the previous IP on the first pass
const UNKNOWN_IP: &str = "N/A";

/// Fill the template placeholders
pub fn render(template: &str, old_ip: Option<&str>, new_ip: &str, changed: &[String]) -> String {
    let domains_list = changed
        .iter()
        .map(|name| format!("<li>{}</li>", name))
        .collect::<Vec<_>>()
        .join("\n");

    template
        .replace("{{old_ip}}", old_ip.unwrap_or(UNKNOWN_IP))
        .replace("{{new_ip}}", new_ip)
        .replace("{{domains_list}}", &domains_list)
}

/// Builds notification messages, independent of any transport
#[derive(Debug, Clone)]
pub struct MessageComposer {
    from: Mailbox,
    to: Mailbox,
    subject: String,
    template_path: Option<PathBuf>,
}

impl MessageComposer {
    /// Create a composer from mail settings
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the sender or recipient is not a
    /// valid email address.
    pub fn new(settings: &MailSettings, app_name: &str) -> Result<Self> {
        let from_address: Address = settings.from_address.parse().map_err(|e| {
            Error::config(format!(
                "MAIL_FROM_ADDRESS '{}' is not a valid address: {}",
                settings.from_address, e
            ))
        })?;
        let to_address: Address = settings.recipient.parse().map_err(|e| {
            Error::config(format!(
                "NOTIFICATION_EMAIL '{}' is not a valid address: {}",
                settings.recipient, e
            ))
        })?;

        Ok(Self {
            from: Mailbox::new(Some(settings.from_name.clone()), from_address),
            to: Mailbox::new(None, to_address),
            subject: format!("[{}] IP change detected", app_name),
            template_path: settings.template_path.clone(),
        })
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Read the template
    ///
    /// Custom templates are read on every call so edits apply without a
    /// restart.
    pub async fn load_template(&self) -> Result<Cow<'static, str>> {
        match &self.template_path {
            None => Ok(Cow::Borrowed(DEFAULT_TEMPLATE)),
            Some(path) => tokio::fs::read_to_string(path).await.map(Cow::Owned).map_err(|e| {
                Error::notification(format!(
                    "Cannot read email template {}: {}",
                    path.display(),
                    e
                ))
            }),
        }
    }

    /// Build the HTML message for one pass
    pub fn compose(
        &self,
        template: &str,
        old_ip: Option<&str>,
        new_ip: &str,
        changed: &[String],
    ) -> Result<Message> {
        Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(self.subject.as_str())
            .header(ContentType::TEXT_HTML)
            .body(render(template, old_ip, new_ip, changed))
            .map_err(|e| Error::notification(format!("Failed to build email: {}", e)))
    }
}

/// Email notifier over authenticated SMTP
pub struct SmtpNotifier {
    composer: MessageComposer,
    transport: AsyncSmtpTransport<Tokio1Executor>,
    host: String,
}

impl SmtpNotifier {
    /// Create a new SMTP notifier
    ///
    /// No connection is opened here; the first notification connects.
    ///
    /// # Parameters
    ///
    /// - `settings`: Server, credentials, sender and recipient
    /// - `app_name`: Subject prefix
    pub fn new(settings: &MailSettings, app_name: &str) -> Result<Self> {
        let composer = MessageComposer::new(settings, app_name)?;

        let builder = match settings.encryption {
            MailEncryption::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host),
            MailEncryption::StartTls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
            }
        }
        .map_err(|e| Error::config(format!("Invalid MAIL_HOST '{}': {}", settings.host, e)))?;

        let transport = builder
            .port(settings.port)
            .credentials(Credentials::new(
                settings.username.clone(),
                settings.password.clone(),
            ))
            .timeout(Some(SMTP_TIMEOUT))
            .build();

        tracing::info!(
            "Email notifications enabled: {} via {}:{} ({:?})",
            settings.recipient,
            settings.host,
            settings.port,
            settings.encryption
        );

        Ok(Self {
            composer,
            transport,
            host: settings.host.clone(),
        })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify(&self, old_ip: Option<&str>, new_ip: &str, changed: &[String]) -> Result<()> {
        let template = self.composer.load_template().await?;
        let message = self.composer.compose(&template, old_ip, new_ip, changed)?;

        self.transport
            .send(message)
            .await
            .map_err(|e| {
                Error::notification(format!("SMTP delivery via {} failed: {}", self.host, e))
            })?;

        tracing::debug!("Notification email accepted by {}", self.host);
        Ok(())
    }
}
