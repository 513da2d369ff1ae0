/*
 * Responsibility
 * - 環境変数や設定の読み込み (PORT, VALKEY_URL, session cookie, limits)
 * - 設定値のバリデーション (不足・不正なら起動失敗)
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,

    // None => in-process store (development only)
    pub valkey_url: Option<String>,

    pub session_cookie_name: String,
    pub session_key_prefix: String,
    pub session_lookup_timeout: Duration,

    pub request_body_limit_bytes: usize,
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    // Split out so tests can feed values without touching process env.
    pub(crate) fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port: u16 = parse_or("PORT", get("PORT"), 3000)?;

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = get("APP_ENV")
            .map(|v| AppEnv::parse(&v))
            .unwrap_or(AppEnv::Development);

        let valkey_url = get("VALKEY_URL")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        if valkey_url.is_none() && app_env.is_production() {
            return Err(ConfigError::Missing("VALKEY_URL"));
        }

        let session_cookie_name = non_empty_or(
            "SESSION_COOKIE_NAME",
            get("SESSION_COOKIE_NAME"),
            "porter",
        )?;

        let session_key_prefix =
            non_empty_or("SESSION_KEY_PREFIX", get("SESSION_KEY_PREFIX"), "session")?;

        let session_lookup_timeout = Duration::from_millis(parse_or(
            "SESSION_LOOKUP_TIMEOUT_MS",
            get("SESSION_LOOKUP_TIMEOUT_MS"),
            2000u64,
        )?);

        let request_body_limit_bytes = parse_or(
            "REQUEST_BODY_LIMIT_BYTES",
            get("REQUEST_BODY_LIMIT_BYTES"),
            1024 * 1024usize,
        )?;

        let request_timeout = Duration::from_secs(parse_or(
            "REQUEST_TIMEOUT_SECONDS",
            get("REQUEST_TIMEOUT_SECONDS"),
            30u64,
        )?);

        if session_lookup_timeout.is_zero() {
            return Err(ConfigError::Invalid("SESSION_LOOKUP_TIMEOUT_MS"));
        }
        if request_timeout.is_zero() {
            return Err(ConfigError::Invalid("REQUEST_TIMEOUT_SECONDS"));
        }

        Ok(Self {
            addr,
            app_env,
            valkey_url,
            session_cookie_name,
            session_key_prefix,
            session_lookup_timeout,
            request_body_limit_bytes,
            request_timeout,
        })
    }
}

// Unset => default. Set but unparsable => startup error (no silent fallback).
fn parse_or<T: FromStr>(
    key: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        Some(v) => v.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

fn non_empty_or(
    key: &'static str,
    raw: Option<String>,
    default: &str,
) -> Result<String, ConfigError> {
    match raw.map(|v| v.trim().to_string()) {
        Some(v) if v.is_empty() => Err(ConfigError::Invalid(key)),
        Some(v) => Ok(v),
        None => Ok(default.to_string()),
    }
}
