use std::{
    env,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    str::FromStr,
    time::Duration,
};

use reqwest::Url;

use crate::{
    error::ConfigError,
    generation::{
        GenerationDefaults,
        fallback::{DEFAULT_RETRY_BACKOFF, DEFAULT_RETRY_BUDGET},
        upstream::DEFAULT_UPSTREAM_TIMEOUT,
    },
};

pub const DEFAULT_UPSTREAM_URL: &str = "https://kwir03xxq01508-8000.proxy.runpod.net/generate/";
const DEFAULT_PORT: u16 = 5000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub upstream_url: Url,
    pub backend_url: Option<Url>,
    pub upstream_timeout: Duration,
    pub retry_budget: u32,
    pub retry_backoff: Duration,
    /// Whether upstream calls honour `HTTP_PROXY`/`HTTPS_PROXY`.
    pub system_proxy: bool,
    pub defaults: GenerationDefaults,
}

/// Loads `.env.local` and then `.env`; variables already set always win.
pub fn load_dotenv() {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::dotenv();
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let listen_addr = match (lookup("SERVER_ADDR"), lookup("PORT")) {
            (Some(addr), _) => parse_value("SERVER_ADDR", addr)?,
            (None, Some(port)) => SocketAddr::new(
                IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                parse_value("PORT", port)?,
            ),
            (None, None) => SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_PORT),
        };

        let upstream_url = parse_url(
            "UPSTREAM_URL",
            &lookup("UPSTREAM_URL").unwrap_or_else(|| DEFAULT_UPSTREAM_URL.to_string()),
        )?;
        let backend_url = lookup("BACKEND_URL")
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| parse_url("BACKEND_URL", &raw))
            .transpose()?;

        let upstream_timeout = optional(&lookup, "UPSTREAM_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_UPSTREAM_TIMEOUT);
        let retry_budget = optional(&lookup, "RETRY_BUDGET")?.unwrap_or(DEFAULT_RETRY_BUDGET);
        let retry_backoff = optional(&lookup, "RETRY_BACKOFF_MS")?
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_RETRY_BACKOFF);
        let system_proxy = optional(&lookup, "UPSTREAM_SYSTEM_PROXY")?.unwrap_or(true);

        let builtin = GenerationDefaults::default();
        let defaults = GenerationDefaults {
            max_length: optional(&lookup, "DEFAULT_MAX_LENGTH")?.unwrap_or(builtin.max_length),
            temperature: optional(&lookup, "DEFAULT_TEMPERATURE")?.unwrap_or(builtin.temperature),
            top_p: optional(&lookup, "DEFAULT_TOP_P")?.unwrap_or(builtin.top_p),
        };

        Ok(Self {
            listen_addr,
            upstream_url,
            backend_url,
            upstream_timeout,
            retry_budget,
            retry_backoff,
            system_proxy,
            defaults,
        })
    }
}

fn optional<F, T>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(name).map(|raw| parse_value(name, raw)).transpose()
}

fn parse_value<T: FromStr>(name: &'static str, raw: String) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue { name, value: raw })
}

/// Parses an absolute `http`/`https` URL; `name` identifies the source in errors.
pub fn parse_url(name: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|e| ConfigError::InvalidUrl {
        name,
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::InvalidUrl {
            name,
            reason: format!("unsupported scheme {other:?}"),
        }),
    }
}
