use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::{Alert, AlertChannel, ChannelError};

const CHANNEL: &str = "telegram";

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

/// Telegram Bot API channel, one message per chat
pub struct TelegramChannel {
    client: Client,
    api_base: String,
    bot_token: String,
}

impl TelegramChannel {
    pub fn new(api_base: String, bot_token: String) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token,
        })
    }

    async fn send_one(&self, chat_id: &str, text: &str) -> Result<(), ChannelError> {
        let resp = self
            .client
            .post(format!("{}/bot{}/sendMessage", self.api_base, self.bot_token))
            .json(&SendMessage { chat_id, text })
            .send()
            .await
            // the request URL carries the bot token
            .map_err(|source| ChannelError::Request { channel: CHANNEL, source: source.without_url() })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ChannelError::Rejected { channel: CHANNEL, status, body });
        }
        Ok(())
    }
}

#[async_trait]
impl AlertChannel for TelegramChannel {
    fn name(&self) -> &'static str {
        CHANNEL
    }

    async fn send(&self, alert: &Alert, recipients: &[String]) -> Result<(), ChannelError> {
        let text = alert.message();
        let mut failed = 0;

        for chat_id in recipients {
            if let Err(e) = self.send_one(chat_id, &text).await {
                tracing::warn!("Telegram message to chat {} failed: {}", chat_id, e);
                failed += 1;
            }
        }

        if failed > 0 {
            return Err(ChannelError::Partial {
                channel: CHANNEL,
                failed,
                total: recipients.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WanStatus;
    use chrono::Utc;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn alert() -> Alert {
        Alert {
            identity: "GW-1".into(),
            label: "WAN3".into(),
            status: WanStatus::Up,
            since: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_one_message_per_chat() {
        let server = MockServer::start().await;
        for chat in ["-1001", "42"] {
            Mock::given(method("POST"))
                .and(path("/botTOKEN/sendMessage"))
                .and(body_partial_json(json!({"chat_id": chat, "text": "GW-1 Gateway's WAN3 is up"})))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
                .expect(1)
                .mount(&server)
                .await;
        }

        let channel = TelegramChannel::new(server.uri(), "TOKEN".into()).unwrap();
        channel.send(&alert(), &["-1001".into(), "42".into()]).await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_chat_does_not_stop_others() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"chat_id": "bad"})))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({"ok": false, "description": "chat not found"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"chat_id": "good"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let channel = TelegramChannel::new(server.uri(), "TOKEN".into()).unwrap();
        let err = channel.send(&alert(), &["bad".into(), "good".into()]).await.unwrap_err();
        assert!(matches!(err, ChannelError::Partial { failed: 1, total: 2, .. }));
    }

    #[tokio::test]
    async fn test_transport_error_hides_bot_token() {
        // nothing listens on port 1
        let channel = TelegramChannel::new("http://127.0.0.1:1".into(), "123456:SECRET-BOT-TOKEN".into()).unwrap();

        let err = channel.send_one("-1001", "hello").await.unwrap_err();
        assert!(matches!(err, ChannelError::Request { .. }));
        let rendered = format!("{} {:?}", err, err);
        assert!(!rendered.contains("SECRET-BOT-TOKEN"), "token leaked: {}", rendered);
    }
}
