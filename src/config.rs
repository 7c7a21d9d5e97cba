// src/config.rs
use log::LevelFilter;
use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Memory,
    Scylla,
}

/// Application configuration derived from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: IpAddr,
    pub port: u16,
    pub store: StoreKind,
    pub scylla_node: String,
    /// How often the Scylla store re-reads asset collections for live feeds.
    pub asset_poll: Duration,
    pub jwt_secret: String,
    pub log_level: LevelFilter,
}

fn str_or(value: Option<String>, default: &str) -> String {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_or<T: FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|s| s.trim().parse().ok()).unwrap_or(default)
}

fn env_str(name: &str, default: &str) -> String {
    str_or(env::var(name).ok(), default)
}

fn env_parse<T: FromStr>(name: &str, default: T) -> T {
    parse_or(env::var(name).ok(), default)
}

fn parse_store(value: &str) -> StoreKind {
    match value.to_lowercase().as_str() {
        "scylla" | "scylladb" => StoreKind::Scylla,
        _ => StoreKind::Memory,
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        AppConfig {
            bind: env_parse("DASHBOARD_BIND", IpAddr::V4(Ipv4Addr::LOCALHOST)),
            port: env_parse("DASHBOARD_PORT", 3030),
            store: parse_store(&env_str("DASHBOARD_STORE", "memory")),
            scylla_node: env_str("SCYLLA_NODE", "127.0.0.1:9042"),
            asset_poll: Duration::from_millis(env_parse("ASSET_POLL_MS", 1000u64).max(50)),
            jwt_secret: env_str("JWT_SECRET", "your_secret_key"),
            log_level: env_parse("LOG_LEVEL", LevelFilter::Info),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_kind_defaults_to_memory() {
        assert_eq!(parse_store("scylla"), StoreKind::Scylla);
        assert_eq!(parse_store("ScyllaDB"), StoreKind::Scylla);
        assert_eq!(parse_store("memory"), StoreKind::Memory);
        assert_eq!(parse_store("postgres"), StoreKind::Memory);
    }

    #[test]
    fn unset_or_garbage_values_fall_back() {
        assert_eq!(parse_or(None, 3030u16), 3030);
        assert_eq!(parse_or(Some("not-a-port".into()), 3030u16), 3030);
        assert_eq!(parse_or(Some(" 8080 ".into()), 3030u16), 8080);
        assert_eq!(
            parse_or(Some("debug".into()), LevelFilter::Info),
            LevelFilter::Debug
        );
        assert_eq!(str_or(None, "x"), "x");
        assert_eq!(str_or(Some("   ".into()), "x"), "x");
        assert_eq!(str_or(Some(" node:9042 ".into()), "x"), "node:9042");
    }
}
