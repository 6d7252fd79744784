// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults, and the [`AppConfig`] loaded once
//! at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `SHARING_ENCRYPTION_KEY` | 64 hex chars (32-byte AES-256 key) | Required |
//! | `HOST` | Server bind IP address (IPv4 or IPv6) | `0.0.0.0` |
//! | `PORT` | Server bind port | `9601` |
//! | `APP_HOST` | Base URL of the viewer app used in share links | `http://localhost:5173` |
//! | `DATA_DIR` | Directory holding the share database | `/data` |
//! | `STORE_BACKEND` | `redb` or `memory` | `redb` |
//! | `SECRETS_API_URL` | Secret vault base URL | Unset: secret shares disabled |
//! | `DOCUMENTS_API_URL` | Document store base URL | Unset: document shares disabled |
//! | `MAIL_RELAY_URL` | HTTP mail relay endpoint | Unset: notifications only logged |
//! | `MAIL_FROM` | Sender address for notifications | `noreply@example.com` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::crypto::{CipherError, EncryptionKey};

pub const ENCRYPTION_KEY_ENV: &str = "SHARING_ENCRYPTION_KEY";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const APP_HOST_ENV: &str = "APP_HOST";

/// Directory for the redb database file.
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const STORE_BACKEND_ENV: &str = "STORE_BACKEND";
pub const SECRETS_API_URL_ENV: &str = "SECRETS_API_URL";
pub const DOCUMENTS_API_URL_ENV: &str = "DOCUMENTS_API_URL";
pub const MAIL_RELAY_URL_ENV: &str = "MAIL_RELAY_URL";
pub const MAIL_FROM_ENV: &str = "MAIL_FROM";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 9601;
pub const DEFAULT_APP_HOST: &str = "http://localhost:5173";
pub const DEFAULT_DATA_DIR: &str = "/data";
pub const DEFAULT_MAIL_FROM: &str = "noreply@example.com";
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

/// File name of the share database inside `DATA_DIR`.
pub const DATABASE_FILE: &str = "sharing.redb";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{ENCRYPTION_KEY_ENV} is not set; refusing to start without a payload key")]
    MissingEncryptionKey,

    #[error("{ENCRYPTION_KEY_ENV} is invalid: {0}")]
    InvalidEncryptionKey(#[from] CipherError),

    #[error("invalid {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Redb,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub encryption_key: EncryptionKey,
    pub bind_addr: SocketAddr,
    pub app_host: String,
    pub data_dir: PathBuf,
    pub store_backend: StoreBackend,
    pub secrets_api_url: Option<String>,
    pub documents_api_url: Option<String>,
    pub mail_relay_url: Option<String>,
    pub mail_from: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from any variable source. Blank values count
    /// as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let encryption_key = get(ENCRYPTION_KEY_ENV)
            .ok_or(ConfigError::MissingEncryptionKey)
            .and_then(|raw| EncryptionKey::from_hex(&raw).map_err(ConfigError::from))?;

        let host = get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match get(PORT_ENV) {
            Some(raw) => raw.parse::<u16>().map_err(|_| ConfigError::InvalidValue {
                name: PORT_ENV,
                value: raw,
            })?,
            None => DEFAULT_PORT,
        };
        let ip = host.parse::<IpAddr>().map_err(|_| ConfigError::InvalidValue {
            name: HOST_ENV,
            value: host.clone(),
        })?;
        let bind_addr = SocketAddr::new(ip, port);

        let store_backend = match get(STORE_BACKEND_ENV).as_deref() {
            None | Some("redb") => StoreBackend::Redb,
            Some("memory") => StoreBackend::Memory,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    name: STORE_BACKEND_ENV,
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            encryption_key,
            bind_addr,
            app_host: get(APP_HOST_ENV).unwrap_or_else(|| DEFAULT_APP_HOST.to_string()),
            data_dir: PathBuf::from(get(DATA_DIR_ENV).unwrap_or_else(|| DEFAULT_DATA_DIR.to_string())),
            store_backend,
            secrets_api_url: get(SECRETS_API_URL_ENV),
            documents_api_url: get(DOCUMENTS_API_URL_ENV),
            mail_relay_url: get(MAIL_RELAY_URL_ENV),
            mail_from: get(MAIL_FROM_ENV).unwrap_or_else(|| DEFAULT_MAIL_FROM.to_string()),
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }
}

/// Log format is needed before the rest of the configuration is parsed, so
/// startup errors are logged in the right shape.
pub fn log_format_from_env() -> LogFormat {
    parse_log_format(std::env::var(LOG_FORMAT_ENV).ok().as_deref())
}

/// Anything other than `json` falls back to pretty output.
pub fn parse_log_format(raw: Option<&str>) -> LogFormat {
    match raw.map(str::trim) {
        Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
        _ => LogFormat::Pretty,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    fn key() -> String {
        "0f".repeat(32)
    }

    #[test]
    fn defaults_apply() {
        let config = load(&[(ENCRYPTION_KEY_ENV, &key())]).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:9601".parse().unwrap());
        assert_eq!(config.app_host, DEFAULT_APP_HOST);
        assert_eq!(config.database_path(), PathBuf::from("/data/sharing.redb"));
        assert_eq!(config.store_backend, StoreBackend::Redb);
        assert_eq!(config.mail_from, DEFAULT_MAIL_FROM);
        assert!(config.secrets_api_url.is_none());
        assert!(config.mail_relay_url.is_none());
    }

    #[test]
    fn missing_or_bad_key_is_fatal() {
        assert!(matches!(load(&[]), Err(ConfigError::MissingEncryptionKey)));
        assert!(matches!(
            load(&[(ENCRYPTION_KEY_ENV, "  ")]),
            Err(ConfigError::MissingEncryptionKey)
        ));
        assert!(matches!(
            load(&[(ENCRYPTION_KEY_ENV, "abcd")]),
            Err(ConfigError::InvalidEncryptionKey(CipherError::InvalidKeyLength(2)))
        ));
        assert!(matches!(
            load(&[(ENCRYPTION_KEY_ENV, &"zz".repeat(32))]),
            Err(ConfigError::InvalidEncryptionKey(CipherError::InvalidKeyEncoding))
        ));
    }

    #[test]
    fn overrides_are_read() {
        let config = load(&[
            (ENCRYPTION_KEY_ENV, &key()),
            (HOST_ENV, "127.0.0.1"),
            (PORT_ENV, "8088"),
            (STORE_BACKEND_ENV, "memory"),
            (SECRETS_API_URL_ENV, "http://vault:9300"),
        ])
        .unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:8088".parse().unwrap());
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.secrets_api_url.as_deref(), Some("http://vault:9300"));
    }

    #[test]
    fn ipv6_host_is_accepted() {
        let config = load(&[(ENCRYPTION_KEY_ENV, &key()), (HOST_ENV, "::")]).unwrap();
        assert_eq!(config.bind_addr, "[::]:9601".parse().unwrap());

        let config = load(&[
            (ENCRYPTION_KEY_ENV, &key()),
            (HOST_ENV, "::1"),
            (PORT_ENV, "8088"),
        ])
        .unwrap();
        assert_eq!(config.bind_addr, "[::1]:8088".parse().unwrap());
    }

    #[test]
    fn log_format_parsing() {
        assert_eq!(parse_log_format(None), LogFormat::Pretty);
        assert_eq!(parse_log_format(Some(" json ")), LogFormat::Json);
        assert_eq!(parse_log_format(Some("JSON")), LogFormat::Json);
        assert_eq!(parse_log_format(Some("pretty")), LogFormat::Pretty);
        assert_eq!(parse_log_format(Some("xml")), LogFormat::Pretty);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            load(&[(ENCRYPTION_KEY_ENV, &key()), (PORT_ENV, "http")]),
            Err(ConfigError::InvalidValue { name: PORT_ENV, .. })
        ));
        assert!(matches!(
            load(&[(ENCRYPTION_KEY_ENV, &key()), (STORE_BACKEND_ENV, "postgres")]),
            Err(ConfigError::InvalidValue { name: STORE_BACKEND_ENV, .. })
        ));
        assert!(matches!(
            load(&[(ENCRYPTION_KEY_ENV, &key()), (HOST_ENV, "localhost")]),
            Err(ConfigError::InvalidValue { name: HOST_ENV, .. })
        ));
    }
}
