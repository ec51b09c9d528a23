//! Transition alerts.
//!
//! A transition fans out to two independent channels: one bulk email with every
//! recipient on BCC, and one chat message per chat identifier. Delivery is best
//! effort; the stored observation is authoritative whatever happens here.

pub mod email;
pub mod telegram;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

use crate::config::Config;
use crate::db::{NotFoundError, Store};
use crate::models::{WanReport, WanStatus};

pub use email::MailRelayChannel;
pub use telegram::TelegramChannel;

/// Delivery failure on a single channel
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("{channel} request failed: {source}")]
    Request {
        channel: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{channel} rejected message: HTTP {status}: {body}")]
    Rejected {
        channel: &'static str,
        status: u16,
        body: String,
    },
    #[error("{channel} delivery failed for {failed} of {total} recipients")]
    Partial {
        channel: &'static str,
        failed: usize,
        total: usize,
    },
    #[error("alert template failed to render: {0}")]
    Render(#[from] tera::Error),
}

/// A WAN transition worth telling people about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub identity: String,
    pub label: String,
    pub status: WanStatus,
    pub since: DateTime<Utc>,
}

impl Alert {
    /// Human-readable one-liner used as chat text and email subject
    pub fn message(&self) -> String {
        format!("{} Gateway's {} is {}", self.identity, self.label, self.status)
    }
}

impl From<&WanReport> for Alert {
    fn from(report: &WanReport) -> Self {
        Self {
            identity: report.identity.clone(),
            label: report.label.clone(),
            status: report.status,
            since: report.since,
        }
    }
}

/// Outbound alert transport
#[async_trait]
pub trait AlertChannel: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, alert: &Alert, recipients: &[String]) -> Result<(), ChannelError>;
}

/// What happened on one channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ChannelOutcome {
    Skipped,
    Delivered { recipients: usize },
    Failed { reason: String },
}

/// Per-channel outcome of one notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationReport {
    pub message: String,
    pub email: ChannelOutcome,
    pub chat: ChannelOutcome,
}

/// Resolved alert audience for a device
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Recipients {
    pub emails: Vec<String>,
    pub chats: Vec<String>,
}

/// Notifier resolves recipients from the device directory and dispatches alerts
pub struct Notifier {
    store: Store,
    email: Option<Arc<dyn AlertChannel>>,
    chat: Option<Arc<dyn AlertChannel>>,
    fallback_chat_ids: Vec<String>,
}

impl Notifier {
    pub fn new(
        store: Store,
        email: Option<Arc<dyn AlertChannel>>,
        chat: Option<Arc<dyn AlertChannel>>,
        fallback_chat_ids: Vec<String>,
    ) -> Self {
        Self {
            store,
            email,
            chat,
            fallback_chat_ids,
        }
    }

    /// Build the channels the configuration enables
    pub fn from_config(store: Store, cfg: &Config) -> anyhow::Result<Self> {
        let email: Option<Arc<dyn AlertChannel>> = match &cfg.mail_api_url {
            Some(url) => {
                tracing::info!("Email alerts enabled via {}", url);
                Some(Arc::new(MailRelayChannel::new(
                    url.clone(),
                    cfg.mail_api_token.clone(),
                    cfg.mail_from.clone(),
                )?))
            }
            None => {
                tracing::warn!("MAIL_API_URL not set - email alerts disabled");
                None
            }
        };

        let chat: Option<Arc<dyn AlertChannel>> = match &cfg.telegram_bot_token {
            Some(token) => {
                tracing::info!("Telegram alerts enabled");
                Some(Arc::new(TelegramChannel::new(cfg.telegram_api_base.clone(), token.clone())?))
            }
            None => {
                tracing::warn!("TELEGRAM_BOT_TOKEN not set - chat alerts disabled");
                None
            }
        };

        Ok(Self::new(store, email, chat, cfg.alert_chat_ids.clone()))
    }

    /// Look up who should hear about a device. Never fails: unknown devices and
    /// lookup errors only lose the device-specific recipients.
    pub async fn resolve_recipients(&self, identity: &str) -> Recipients {
        let (emails, device_chats) = match self.store.get_device(identity).await {
            Ok(device) => (device.email_ids, device.telegram_ids),
            Err(e) if e.downcast_ref::<NotFoundError>().is_some() => {
                tracing::warn!("No device record for {}; alerting fallback chats only", identity);
                (Vec::new(), Vec::new())
            }
            Err(e) => {
                tracing::error!("Failed to load recipients for {}: {}", identity, e);
                (Vec::new(), Vec::new())
            }
        };

        Recipients {
            emails: dedup(emails),
            chats: dedup(device_chats.into_iter().chain(self.fallback_chat_ids.iter().cloned())),
        }
    }

    /// Dispatch an alert on every channel concurrently
    pub async fn notify(&self, alert: &Alert) -> NotificationReport {
        let recipients = self.resolve_recipients(&alert.identity).await;

        let (email, chat) = tokio::join!(
            dispatch(self.email.as_ref(), alert, &recipients.emails),
            dispatch(self.chat.as_ref(), alert, &recipients.chats),
        );

        NotificationReport {
            message: alert.message(),
            email,
            chat,
        }
    }
}

async fn dispatch(
    channel: Option<&Arc<dyn AlertChannel>>,
    alert: &Alert,
    recipients: &[String],
) -> ChannelOutcome {
    let Some(channel) = channel else {
        return ChannelOutcome::Skipped;
    };
    if recipients.is_empty() {
        tracing::debug!("No {} recipients for {}", channel.name(), alert.identity);
        return ChannelOutcome::Skipped;
    }

    match channel.send(alert, recipients).await {
        Ok(()) => {
            tracing::info!(
                "{} alert sent to {} recipient(s): {}",
                channel.name(),
                recipients.len(),
                alert.message()
            );
            ChannelOutcome::Delivered {
                recipients: recipients.len(),
            }
        }
        Err(e) => {
            tracing::warn!("{} alert failed for {}: {}", channel.name(), alert.identity, e);
            ChannelOutcome::Failed {
                reason: e.to_string(),
            }
        }
    }
}

fn dedup(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
