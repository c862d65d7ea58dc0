use std::collections::HashSet;
use std::env;
use std::time::Duration;

use crate::db::BUSY_TIMEOUT;

/// Gates applied to launcher checks before the license itself is consulted.
#[derive(Debug, Clone, Default)]
pub struct CheckPolicy {
    /// Deny every check (`KILL_SWITCH=1`).
    pub kill_switch: bool,
    /// Device ids that are always denied.
    pub blocked_machines: HashSet<String>,
    /// When set, launchers reporting any other version are denied.
    pub required_version: Option<String>,
    /// How long a launcher may cache an allowed decision.
    pub ttl_seconds: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Requests per minute per IP on `/check` (0 = unlimited).
    pub check_rpm: u32,
    /// Requests per minute per IP on admin routes (0 = unlimited).
    pub admin_rpm: u32,
    /// Key limits on proxy-supplied client addresses instead of the peer.
    pub trust_proxy_headers: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            check_rpm: 30,
            admin_rpm: 60,
            trust_proxy_headers: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    /// Wait on SQLite's write lock per attempt (`DB_BUSY_TIMEOUT_MS`).
    pub db_busy_timeout: Duration,
    pub dev_mode: bool,
    pub admin_tokens: Vec<String>,
    pub check_policy: CheckPolicy,
    pub rate_limit: RateLimitConfig,
}

/// Split a token list on newlines, commas, semicolons, tabs or spaces.
pub fn parse_token_list(raw: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.split(|c: char| matches!(c, ',' | '\n' | ';' | '\r' | '\t' | ' '))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.to_string()))
        .map(String::from)
        .collect()
}

fn parse_csv_set(raw: &str) -> HashSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let dev_mode = var("LAUNCHKEY_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let host = var("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port: u16 = var("PORT").and_then(|p| p.parse().ok()).unwrap_or(3000);

        let check_policy = CheckPolicy {
            kill_switch: var("KILL_SWITCH").is_some_and(|v| v.trim() == "1"),
            blocked_machines: var("BLOCKED_MACHINES")
                .map(|raw| parse_csv_set(&raw))
                .unwrap_or_default(),
            required_version: var("APP_VERSION")
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            ttl_seconds: var("CHECK_TTL_SECONDS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(60),
        };

        let defaults = RateLimitConfig::default();
        let rate_limit = RateLimitConfig {
            check_rpm: var("RATE_LIMIT_CHECK_RPM")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.check_rpm),
            admin_rpm: var("RATE_LIMIT_ADMIN_RPM")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.admin_rpm),
            trust_proxy_headers: var("TRUST_PROXY_HEADERS").is_some_and(|v| v.trim() == "1"),
        };

        Self {
            host,
            port,
            database_path: var("DATABASE_PATH").unwrap_or_else(|| "launchkey.db".to_string()),
            db_busy_timeout: var("DB_BUSY_TIMEOUT_MS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(BUSY_TIMEOUT),
            dev_mode,
            admin_tokens: load_admin_tokens(&var),
            check_policy,
            rate_limit,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Admin tokens come from `ADMIN_TOKENS_FILE` when it names a readable file,
/// otherwise from `ADMIN_TOKENS`.
fn load_admin_tokens(var: &impl Fn(&str) -> Option<String>) -> Vec<String> {
    if let Some(path) = var("ADMIN_TOKENS_FILE") {
        match std::fs::read_to_string(&path) {
            Ok(raw) => return parse_token_list(&raw),
            Err(e) => {
                tracing::warn!("Cannot read ADMIN_TOKENS_FILE {}: {}", path, e);
            }
        }
    }
    var("ADMIN_TOKENS")
        .map(|raw| parse_token_list(&raw))
        .unwrap_or_default()
}
