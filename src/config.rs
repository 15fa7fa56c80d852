//! Gateway configuration via CLI args and environment variables.

use std::path::PathBuf;

use clap::Parser;
use url::Url;

/// Rate-limiting forwarding gateway for a webhook delivery API.
#[derive(Parser, Debug, Clone)]
#[command(name = "webhook-gateway", version, about)]
pub struct Config {
    /// Bind address.
    #[arg(long, default_value = "0.0.0.0", env = "GATEWAY_HOST")]
    pub host: String,

    /// Bind port.
    #[arg(long, default_value_t = 8080, env = "GATEWAY_PORT")]
    pub port: u16,

    /// Base URL of the upstream webhook API.
    #[arg(long, default_value = "https://discord.com", env = "GATEWAY_UPSTREAM")]
    pub upstream: Url,

    /// Per-request timeout for upstream calls, in seconds.
    #[arg(long, default_value_t = 30, env = "GATEWAY_UPSTREAM_TIMEOUT")]
    pub upstream_timeout: u64,

    /// Blocklist file, read at startup and rewritten on automated blocks.
    #[arg(long, default_value = "blocklist.json", env = "GATEWAY_BLOCKLIST")]
    pub blocklist_path: PathBuf,

    /// Promote webhooks that keep violating rate limits to the blocklist.
    #[arg(long, env = "GATEWAY_AUTO_BLOCK")]
    pub auto_block: bool,

    /// Trust X-Forwarded-For when resolving client addresses.
    #[arg(long, env = "GATEWAY_TRUST_PROXY")]
    pub trust_proxy: bool,

    /// Log level.
    #[arg(long, default_value = "info", env = "GATEWAY_LOG_LEVEL")]
    pub log_level: String,

    /// Log format: "text" or "json".
    #[arg(long, default_value = "text", env = "GATEWAY_LOG_FORMAT")]
    pub log_format: String,
}

impl Config {
    /// Parses configuration from CLI args and env vars.
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}
