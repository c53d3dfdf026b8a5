//! Process configuration, read from the environment once at startup.
//!
//! User-facing reminder settings live in the db instead (see `ReminderSettings`).

use std::{env, net::SocketAddr, path::PathBuf};

use thiserror::Error;

use crate::store::DEFAULT_DB_PATH;

pub const DEFAULT_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_STATIC_DIR: &str = "static";
pub const DEFAULT_LOG_DIRECTIVES: &str = "info,ademain=debug,tower_http=info";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid ADEMAIN_ADDR {value:?}: {source}")]
    Addr {
        value: String,
        source: std::net::AddrParseError,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub static_dir: PathBuf,
    pub seed_tutorial: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let addr_text = lookup("ADEMAIN_ADDR").unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let addr = addr_text
            .parse()
            .map_err(|source| ConfigError::Addr { value: addr_text.clone(), source })?;

        Ok(Self {
            addr,
            db_path: lookup("ADEMAIN_DB_PATH")
                .unwrap_or_else(|| DEFAULT_DB_PATH.to_string())
                .into(),
            static_dir: lookup("ADEMAIN_STATIC_DIR")
                .unwrap_or_else(|| DEFAULT_STATIC_DIR.to_string())
                .into(),
            // on unless explicitly turned off
            seed_tutorial: lookup("ADEMAIN_SEED_TUTORIAL")
                .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off"))
                .unwrap_or(true),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_in(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = Config::from_lookup(lookup_in(&[])).unwrap();
        assert_eq!(config.addr.to_string(), DEFAULT_ADDR);
        assert_eq!(config.db_path, PathBuf::from("data/db.json"));
        assert_eq!(config.static_dir, PathBuf::from("static"));
        assert!(config.seed_tutorial);
    }

    #[test]
    fn tutorial_seeding_can_be_turned_off() {
        let off = Config::from_lookup(lookup_in(&[("ADEMAIN_SEED_TUTORIAL", "false")])).unwrap();
        assert!(!off.seed_tutorial);
        let on = Config::from_lookup(lookup_in(&[("ADEMAIN_SEED_TUTORIAL", "1")])).unwrap();
        assert!(on.seed_tutorial);
    }

    #[test]
    fn reads_overrides() {
        let config = Config::from_lookup(lookup_in(&[
            ("ADEMAIN_ADDR", "0.0.0.0:8080"),
            ("ADEMAIN_DB_PATH", "/tmp/ademain.json"),
        ]))
        .unwrap();
        assert_eq!(config.addr.port(), 8080);
        assert_eq!(config.db_path, PathBuf::from("/tmp/ademain.json"));
    }

    #[test]
    fn rejects_bad_address() {
        let err = Config::from_lookup(lookup_in(&[("ADEMAIN_ADDR", "localhost")])).unwrap_err();
        assert!(err.to_string().contains("localhost"));
    }
}
