// config.rs
// Runtime configuration read from the environment (after dotenvy loads .env).

use std::{env, net::SocketAddr, time::Duration};

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub mongodb_uri: String,
    pub mongodb_db: String,
    pub users_file: String,
    pub qr_decode_timeout: Duration,
    pub log_level: String,
    pub log_json: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes `env::var`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let bind_addr = get("BIND_ADDR", "0.0.0.0:8080");
        let bind_addr = bind_addr
            .parse::<SocketAddr>()
            .with_context(|| format!("invalid BIND_ADDR '{bind_addr}'"))?;

        let timeout_ms = get("QR_DECODE_TIMEOUT_MS", "5000");
        let timeout_ms = timeout_ms
            .parse::<u64>()
            .with_context(|| format!("invalid QR_DECODE_TIMEOUT_MS '{timeout_ms}'"))?;

        Ok(Config {
            bind_addr,
            mongodb_uri: get("MONGODB_URI", "mongodb://localhost:27017"),
            mongodb_db: get("MONGODB_DB", "authdesk"),
            users_file: get("USERS_FILE", "./data/users.json"),
            qr_decode_timeout: Duration::from_millis(timeout_ms),
            log_level: get("LOG_LEVEL", "info"),
            log_json: get("LOG_FORMAT", "text").eq_ignore_ascii_case("json"),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.mongodb_uri, "mongodb://localhost:27017");
        assert_eq!(config.mongodb_db, "authdesk");
        assert_eq!(config.qr_decode_timeout, Duration::from_secs(5));
        assert!(!config.log_json);
    }

    #[test]
    fn overrides_are_applied() {
        let config = Config::from_lookup(lookup(&[
            ("BIND_ADDR", "127.0.0.1:9000"),
            ("MONGODB_DB", "console"),
            ("QR_DECODE_TIMEOUT_MS", "250"),
            ("LOG_FORMAT", "JSON"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:9000");
        assert_eq!(config.mongodb_db, "console");
        assert_eq!(config.qr_decode_timeout, Duration::from_millis(250));
        assert!(config.log_json);
    }

    #[test]
    fn malformed_numbers_fail() {
        assert!(Config::from_lookup(lookup(&[("QR_DECODE_TIMEOUT_MS", "soon")])).is_err());
        assert!(Config::from_lookup(lookup(&[("BIND_ADDR", "nowhere")])).is_err());
    }
}
