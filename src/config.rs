use clap::{Args, Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    #[command(flatten)]
    pub client: ClientConfig,

    /// JSON file holding the session cookies
    #[arg(long, env = "NEXTAUTH_COOKIE_FILE", default_value = ".nextauth-cookies.json")]
    pub cookie_file: PathBuf,

    /// Execution context: `browser` signs out on unrecoverable auth failures, `server` reports them
    #[arg(long, env = "NEXTAUTH_CONTEXT", value_enum, default_value_t = ContextKind::Browser)]
    pub context: ContextKind,

    #[command(flatten)]
    pub telemetry: TelemetryConfig,

    #[command(flatten)]
    pub request: RequestArgs,
}

#[derive(Clone, Debug, Args)]
pub struct ClientConfig {
    /// Base URL of the API
    #[arg(long, env = "NEXTAUTH_BASE_URL", default_value = "http://localhost:3333")]
    pub base_url: String,

    /// Per-request timeout in seconds, the refresh call included
    #[arg(long, env = "NEXTAUTH_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// How many times one request may be replayed after an expired token before giving up (at least 1)
    #[arg(long, env = "NEXTAUTH_MAX_REPLAYS", default_value_t = 2, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_replays: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3333".to_string(),
            request_timeout_secs: 30,
            max_replays: 2,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ContextKind {
    Browser,
    Server,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug, Default, Args)]
pub struct TelemetryConfig {
    /// Log output format
    #[arg(long, env = "NEXTAUTH_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// OTLP collector endpoint; traces and metrics are exported only when set
    #[arg(long, env = "NEXTAUTH_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,
}

#[derive(Clone, Debug, Args)]
pub struct RequestArgs {
    /// HTTP method
    #[arg(default_value = "GET")]
    pub method: String,

    /// Path relative to the base URL
    #[arg(default_value = "/me")]
    pub path: String,

    /// JSON request body
    #[arg(long)]
    pub data: Option<String>,

    /// Seed the cookie jar with this access token before the request
    #[arg(long, requires = "refresh_token")]
    pub token: Option<String>,

    /// Seed the cookie jar with this refresh token before the request
    #[arg(long, requires = "token")]
    pub refresh_token: Option<String>,
}

impl Config {
    pub fn load() -> Self {
        Self::parse()
    }
}
