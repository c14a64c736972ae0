use anyhow::{bail, Context, Result};
use reqwest::Url;
use serde::Deserialize;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;

/// Environment variable that overrides `api.access_token`.
pub const ACCESS_TOKEN_ENV: &str = "BOATSWAIN_ACCESS_TOKEN";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub bot: BotConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_scheme")]
    pub scheme: String,
    pub host: String,
    #[serde(default = "default_token_param")]
    pub token_param: String,
    #[serde(default)]
    pub access_token: String,
    pub subscriptions_endpoint: String,
    pub subscribe_endpoint: String,
    /// May contain a `{chat_id}` placeholder; otherwise the chat id is
    /// appended as the last path segment.
    pub send_endpoint: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BotConfig {
    /// Public URL the platform delivers notifications to.
    pub webhook_url: String,
    /// Local endpoint the webhook server binds, e.g. `http://0.0.0.0:8080/msg`.
    pub listen: String,
    pub phrase: String,
    pub reply: String,
}

/// Socket address and route path parsed from `bot.listen`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenEndpoint {
    pub addr: SocketAddr,
    pub path: String,
}

fn default_scheme() -> String {
    "https".to_string()
}

fn default_token_param() -> String {
    "access_token".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config = Self::parse(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        if let Ok(token) = std::env::var(ACCESS_TOKEN_ENV) {
            if !token.is_empty() {
                config.api.access_token = token;
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse without environment overrides or validation.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config")
    }

    pub fn validate(&self) -> Result<()> {
        let required = [
            ("api.host", &self.api.host),
            ("api.token_param", &self.api.token_param),
            ("api.access_token", &self.api.access_token),
            ("api.subscriptions_endpoint", &self.api.subscriptions_endpoint),
            ("api.subscribe_endpoint", &self.api.subscribe_endpoint),
            ("api.send_endpoint", &self.api.send_endpoint),
            ("bot.webhook_url", &self.bot.webhook_url),
            ("bot.phrase", &self.bot.phrase),
            ("bot.reply", &self.bot.reply),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                bail!("Missing required config value: {}", name);
            }
        }

        self.listen_endpoint()?;
        Ok(())
    }

    pub fn listen_endpoint(&self) -> Result<ListenEndpoint> {
        parse_listen(&self.bot.listen)
    }
}

fn parse_listen(raw: &str) -> Result<ListenEndpoint> {
    let url = Url::parse(raw).with_context(|| format!("Invalid bot.listen URL: {}", raw))?;
    let host = url
        .host_str()
        .with_context(|| format!("bot.listen has no host: {}", raw))?;
    let port = url
        .port_or_known_default()
        .with_context(|| format!("bot.listen has no port: {}", raw))?;

    // Url keeps the brackets around IPv6 literals
    let host = host.trim_start_matches('[').trim_end_matches(']');
    let addr = (host, port)
        .to_socket_addrs()
        .with_context(|| format!("Failed to resolve bot.listen host: {}", host))?
        .next()
        .with_context(|| format!("bot.listen resolved to no address: {}", raw))?;

    // Url percent-encodes braces, so only `:` and `*` segments can reach the
    // router as captures or wildcards
    let path = url.path();
    if let Some(segment) = path
        .split('/')
        .find(|seg| seg.starts_with(':') || seg.starts_with('*'))
    {
        bail!(
            "bot.listen path segment {:?} is not allowed in {}",
            segment,
            raw
        );
    }

    Ok(ListenEndpoint {
        addr,
        path: path.to_string(),
    })
}
