use std::time::Duration;

use crate::channel::stomp::Heartbeat;
use crate::channel::ChannelConfig;
use crate::jobs::PollConfig;

#[derive(Debug, Clone)]
pub struct Config {
    /// REST base, e.g. `http://localhost:8080/api`.
    pub api_url: String,
    /// Raw STOMP WebSocket endpoint (no SockJS framing).
    pub ws_url: String,
    pub token: Option<String>,
    /// User key for the push destination. Set via STOREFRONT_USER.
    pub user: Option<String>,
    pub poll_interval: Duration,
    pub page_size: u32,
    pub reconnect_delay: Duration,
    /// Heart-beat offered in both directions.
    pub heartbeat: Duration,
    /// Push destination template; `{user}` is substituted.
    pub destination: String,
}

impl Config {
    pub fn channel_config(&self) -> ChannelConfig {
        ChannelConfig {
            url: self.ws_url.clone(),
            destination: self.destination.clone(),
            reconnect_delay: self.reconnect_delay,
            heartbeat: Heartbeat::new(self.heartbeat, self.heartbeat),
        }
    }

    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            interval: self.poll_interval,
            page_size: self.page_size,
        }
    }
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    let api_url = std::env::var("STOREFRONT_API_URL")
        .unwrap_or_else(|_| "http://localhost:8080/api".into());
    let ws_url = std::env::var("STOREFRONT_WS_URL")
        .unwrap_or_else(|_| "ws://localhost:8080/ws/websocket".into());

    check_url("STOREFRONT_API_URL", &api_url, &["http", "https"])?;
    check_url("STOREFRONT_WS_URL", &ws_url, &["ws", "wss"])?;

    Ok(Config {
        api_url: api_url.trim_end_matches('/').to_string(),
        ws_url,
        token: std::env::var("STOREFRONT_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty()),
        user: std::env::var("STOREFRONT_USER")
            .ok()
            .filter(|u| !u.trim().is_empty()),
        poll_interval: Duration::from_secs(
            std::env::var("STOREFRONT_POLL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|&s: &u64| s > 0)
                .unwrap_or(10),
        ),
        page_size: std::env::var("STOREFRONT_PAGE_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|&s: &u32| s > 0)
            .unwrap_or(20),
        reconnect_delay: Duration::from_millis(
            std::env::var("STOREFRONT_RECONNECT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5000),
        ),
        heartbeat: Duration::from_millis(
            std::env::var("STOREFRONT_HEARTBEAT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4000),
        ),
        destination: std::env::var("STOREFRONT_DESTINATION")
            .unwrap_or_else(|_| "/user/{user}/queue/notifications".into()),
    })
}

fn check_url(var: &str, value: &str, schemes: &[&str]) -> anyhow::Result<()> {
    let parsed = url::Url::parse(value)
        .map_err(|e| anyhow::anyhow!("{} is not a valid URL ({}): {}", var, value, e))?;
    if !schemes.contains(&parsed.scheme()) {
        anyhow::bail!(
            "{} must use one of {:?}, got {}",
            var,
            schemes,
            parsed.scheme()
        );
    }
    Ok(())
}
