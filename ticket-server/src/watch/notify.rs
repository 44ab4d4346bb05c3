//! Alert delivery.

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{info, warn};

use super::alert::Alert;

/// Errors from delivering an alert.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("invalid email address {address:?}: {source}")]
    Address {
        address: String,
        source: lettre::address::AddressError,
    },

    #[error("failed to build email: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Something that can tell the user about an alert.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    async fn notify(&self, alert: &Alert) -> Result<(), NotifyError>;
}

/// Writes alerts to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn notify(&self, alert: &Alert) -> Result<(), NotifyError> {
        for seat in &alert.seats {
            info!(
                watch = %alert.watch_id,
                train = %seat.train,
                class = seat.class.label(),
                available = %seat.availability,
                depart = %seat.depart_time,
                "tickets available"
            );
        }
        Ok(())
    }
}

/// SMTP settings for email alerts.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Sender address.
    pub from: String,
}

impl SmtpConfig {
    pub fn new(host: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 465,
            username: None,
            password: None,
            from: from.into(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }
}

/// Emails alerts to the address on the watch.
///
/// Watches without an email address are skipped silently.
pub struct EmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl EmailNotifier {
    /// Port 465 uses implicit TLS; any other port upgrades with STARTTLS.
    pub fn new(config: &SmtpConfig) -> Result<Self, NotifyError> {
        let from = parse_mailbox(&config.from)?;

        let builder = if config.port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
        };
        let mut builder = builder.port(config.port);

        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    fn message(&self, to: Mailbox, alert: &Alert) -> Result<Message, NotifyError> {
        Ok(Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(alert.subject())
            .header(ContentType::TEXT_PLAIN)
            .body(alert.body())?)
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn notify(&self, alert: &Alert) -> Result<(), NotifyError> {
        let Some(address) = alert.spec.email.as_deref() else {
            return Ok(());
        };
        let to = parse_mailbox(address)?;
        let message = self.message(to, alert)?;

        self.transport.send(message).await?;
        info!(watch = %alert.watch_id, to = address, "alert email sent");
        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, NotifyError> {
    address.parse::<Mailbox>().map_err(|source| NotifyError::Address {
        address: address.to_string(),
        source,
    })
}

/// Deliver an alert through every notifier. Failures are logged, not returned.
pub async fn dispatch(notifiers: &[std::sync::Arc<dyn Notifier>], alert: &Alert) -> usize {
    let mut delivered = 0;
    for notifier in notifiers {
        match notifier.notify(alert).await {
            Ok(()) => delivered += 1,
            Err(e) => warn!(
                watch = %alert.watch_id,
                notifier = notifier.name(),
                error = %e,
                "failed to deliver alert"
            ),
        }
    }
    delivered
}
