use std::time::Duration;

use serde::Deserialize;

use crate::bot::DispatcherConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    /// Redis connection string. Unset = in-process store.
    pub redis_url: Option<String>,
    /// Slack bot token. Unset = chat posts are skipped, votes still work.
    pub slack_token: Option<String>,
    pub slack_channel: String,
    pub bot_name: String,
    /// Slack user id of the bot itself; its messages are never parsed.
    pub bot_user_id: Option<String>,
    pub approval_ttl_secs: u64,
    pub post_timeout_secs: u64,
    pub queue_capacity: usize,
    pub sweep_interval_secs: u64,
    /// Comma-separated list of webhook URLs notified on approval events.
    pub webhook_urls: Vec<String>,
    pub webhook_secret: Option<String>,
    /// Required on `/api/v1` as `X-Admin-Key` or `Authorization: Bearer`.
    pub admin_key: Option<String>,
}

impl Config {
    pub fn approval_ttl(&self) -> Duration {
        Duration::from_secs(self.approval_ttl_secs)
    }

    pub fn post_timeout(&self) -> Duration {
        Duration::from_secs(self.post_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    pub fn dispatcher(&self) -> DispatcherConfig {
        DispatcherConfig {
            channel: self.slack_channel.clone(),
            bot_name: self.bot_name.clone(),
            bot_user_id: self.bot_user_id.clone(),
            post_timeout: self.post_timeout(),
            queue_capacity: self.queue_capacity,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    let approval_ttl_secs = env_parse("PROMOGATE_APPROVAL_TTL_SECS", 24 * 60 * 60);
    if approval_ttl_secs == 0 {
        anyhow::bail!("PROMOGATE_APPROVAL_TTL_SECS must be greater than 0");
    }

    let slack_token = env_opt("PROMOGATE_SLACK_TOKEN");
    if slack_token.is_none() {
        eprintln!("⚠️  PROMOGATE_SLACK_TOKEN is not set, approvals will not be announced in chat.");
    }

    let admin_key = env_opt("PROMOGATE_ADMIN_KEY");
    if admin_key.is_none() {
        eprintln!("⚠️  PROMOGATE_ADMIN_KEY is not set, the management API and chat ingress will refuse all requests.");
    }

    Ok(Config {
        port: env_parse("PROMOGATE_PORT", 8500),
        redis_url: env_opt("PROMOGATE_REDIS_URL"),
        slack_token,
        slack_channel: env_opt("PROMOGATE_SLACK_CHANNEL").unwrap_or_else(|| "general".into()),
        bot_name: env_opt("PROMOGATE_BOT_NAME").unwrap_or_else(|| "promogate".into()),
        bot_user_id: env_opt("PROMOGATE_BOT_USER_ID"),
        approval_ttl_secs,
        post_timeout_secs: env_parse("PROMOGATE_POST_TIMEOUT_SECS", 10),
        queue_capacity: env_parse("PROMOGATE_QUEUE_CAPACITY", 100),
        sweep_interval_secs: env_parse("PROMOGATE_SWEEP_INTERVAL_SECS", 60),
        webhook_urls: std::env::var("PROMOGATE_WEBHOOK_URLS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        webhook_secret: env_opt("PROMOGATE_WEBHOOK_SECRET"),
        admin_key,
    })
}
