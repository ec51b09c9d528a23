use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tera::{Context, Tera};

use super::{Alert, AlertChannel, ChannelError};
use crate::models::WanStatus;

const CHANNEL: &str = "email";
const ALERT_TEMPLATE: &str = "alert.html";

const ALERT_HTML: &str = r#"<div>
  <h1>{{ message }}</h1>
  <p>The WAN status has changed to <strong style="color: {{ color }}">{{ status }}</strong> since {{ since }}.</p>
</div>
"#;

#[derive(Serialize)]
struct MailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    bcc: &'a [String],
    subject: String,
    html: String,
}

/// Sends alert emails through an HTTP mail relay. One message per alert, with every
/// recipient on BCC so addresses stay hidden from each other.
pub struct MailRelayChannel {
    client: Client,
    api_url: String,
    api_token: String,
    from: String,
    templates: Tera,
}

impl MailRelayChannel {
    pub fn new(api_url: String, api_token: String, from: String) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;

        let mut templates = Tera::default();
        templates.add_raw_template(ALERT_TEMPLATE, ALERT_HTML)?;

        Ok(Self {
            client,
            api_url,
            api_token,
            from,
            templates,
        })
    }

    fn render(&self, alert: &Alert) -> Result<String, ChannelError> {
        let mut ctx = Context::new();
        ctx.insert("message", &alert.message());
        ctx.insert("status", alert.status.as_str());
        ctx.insert("color", match alert.status {
            WanStatus::Up => "#1a7f37",
            WanStatus::Down => "#cf222e",
        });
        ctx.insert("since", &alert.since.format("%d/%m/%Y, %I:%M:%S %p").to_string());
        Ok(self.templates.render(ALERT_TEMPLATE, &ctx)?)
    }
}

#[async_trait]
impl AlertChannel for MailRelayChannel {
    fn name(&self) -> &'static str {
        CHANNEL
    }

    async fn send(&self, alert: &Alert, recipients: &[String]) -> Result<(), ChannelError> {
        let body = MailRequest {
            from: &self.from,
            to: [&self.from],
            bcc: recipients,
            subject: alert.message(),
            html: self.render(alert)?,
        };

        let mut req = self.client.post(&self.api_url).json(&body);
        if !self.api_token.is_empty() {
            req = req.bearer_auth(&self.api_token);
        }

        let resp = req
            .send()
            .await
            .map_err(|source| ChannelError::Request { channel: CHANNEL, source })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ChannelError::Rejected { channel: CHANNEL, status, body });
        }
        Ok(())
    }
}
