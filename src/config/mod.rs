use std::env;
use std::time::Duration;

use crate::models::RouterEndpoint;

/// Config holds all application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    pub db_max_connections: u32,
    pub listen_addr: String,
    /// Router whose active session listing decides reachability for global sweeps
    pub session_router: Option<RouterEndpoint>,
    pub router_timeout_secs: u64,
    pub sweep_concurrency: usize,
    pub poll_interval_secs: u64,
    pub mail_api_url: Option<String>,
    pub mail_api_token: String,
    pub mail_from: String,
    pub telegram_api_base: String,
    pub telegram_bot_token: Option<String>,
    /// Operator chats that receive every alert
    pub alert_chat_ids: Vec<String>,
}

impl Config {
    /// Load configuration from environment variables (and `.env`, if present) with defaults
    pub fn load() -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", path.display());
        }

        let session_router = get_env_opt("SESSION_ROUTER_HOST").map(|host| {
            RouterEndpoint::new(
                host,
                get_env("SESSION_ROUTER_PORT", "80").parse().unwrap_or(80),
                get_env("SESSION_ROUTER_USER", "admin"),
                get_env("SESSION_ROUTER_PASS", ""),
            )
        });

        Self {
            db_path: get_env("DB_PATH", "/data/wan-health.db"),
            db_max_connections: get_env("DB_MAX_CONNECTIONS", "5")
                .parse()
                .unwrap_or(5),
            listen_addr: get_env("LISTEN_ADDR", "0.0.0.0:8080"),
            session_router,
            router_timeout_secs: get_env("ROUTER_TIMEOUT_SECS", "5")
                .parse()
                .unwrap_or(5),
            sweep_concurrency: get_env("SWEEP_CONCURRENCY", "16")
                .parse()
                .unwrap_or(16),
            poll_interval_secs: get_env("POLL_INTERVAL_SECS", "10")
                .parse()
                .unwrap_or(10),
            mail_api_url: get_env_opt("MAIL_API_URL"),
            mail_api_token: get_env("MAIL_API_TOKEN", ""),
            mail_from: get_env("MAIL_FROM", "alerts@localhost"),
            telegram_api_base: get_env("TELEGRAM_API_BASE", "https://api.telegram.org"),
            telegram_bot_token: get_env_opt("TELEGRAM_BOT_TOKEN"),
            alert_chat_ids: split_list(&get_env("ALERT_CHAT_IDS", "")),
        }
    }

    pub fn router_timeout(&self) -> Duration {
        Duration::from_secs(self.router_timeout_secs.max(1))
    }
}

fn get_env(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Unset and blank variables both mean "not configured"
fn get_env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("-1001, 42,,  "), vec!["-1001", "42"]);
        assert!(split_list("").is_empty());
    }
}
