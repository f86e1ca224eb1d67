// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is read from the environment once at startup into
//! [`EngineConfig`]. Malformed values fail startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `TRADER_NETWORK` | Network preset | `base` |
//! | `TRADER_RPC_ENDPOINTS` | Comma-separated read endpoints, `url[;priority=N][;weight=N][;stall_ms=N]` | Preset public RPCs |
//! | `TRADER_SIGNING_RPC` | Dedicated broadcast endpoint | First read endpoint |
//! | `TRADER_RPC_QUORUM` | Weighted quorum for reads | `1` |
//! | `TRADER_RPC_TIMEOUT_MS` | Per-request timeout | `10000` |
//! | `TRADER_DATA_DIR` | Directory holding the encrypted key blob | `./data` |
//! | `TRADER_REFRESH_SECS` | Balance/price refresh interval | `15` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::blockchain::rpc::{EndpointConfig, DEFAULT_REQUEST_TIMEOUT};
use crate::blockchain::{ensure_supported_network, NetworkConfig};
use crate::error::EngineError;
use crate::session::DEFAULT_REFRESH_INTERVAL;

pub const NETWORK_ENV: &str = "TRADER_NETWORK";
pub const RPC_ENDPOINTS_ENV: &str = "TRADER_RPC_ENDPOINTS";
pub const SIGNING_RPC_ENV: &str = "TRADER_SIGNING_RPC";
pub const RPC_QUORUM_ENV: &str = "TRADER_RPC_QUORUM";
pub const RPC_TIMEOUT_ENV: &str = "TRADER_RPC_TIMEOUT_MS";
/// Directory holding `trader_wallet.enc`.
pub const DATA_DIR_ENV: &str = "TRADER_DATA_DIR";
pub const REFRESH_SECS_ENV: &str = "TRADER_REFRESH_SECS";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var}: {message}")]
    Invalid { var: &'static str, message: String },
}

impl ConfigError {
    fn invalid(var: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            var,
            message: message.into(),
        }
    }
}

impl From<ConfigError> for EngineError {
    fn from(e: ConfigError) -> Self {
        EngineError::Config(e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

/// Fully parsed startup configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub network: NetworkConfig,
    pub endpoints: Vec<EndpointConfig>,
    pub signing_url: Url,
    pub quorum: u32,
    pub request_timeout: Duration,
    pub data_dir: PathBuf,
    pub refresh_interval: Duration,
    pub bind: SocketAddr,
    pub log_format: LogFormat,
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Parse from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let network = ensure_supported_network(var(NETWORK_ENV).as_deref())
            .map_err(|e| ConfigError::invalid(NETWORK_ENV, e))?;

        let endpoints = match var(RPC_ENDPOINTS_ENV) {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .enumerate()
                .map(|(i, entry)| EndpointConfig::parse(entry, i as u32))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| ConfigError::invalid(RPC_ENDPOINTS_ENV, e))?,
            None => network
                .default_rpc_urls
                .iter()
                .enumerate()
                .map(|(i, url)| EndpointConfig::parse(url, i as u32))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| ConfigError::invalid(RPC_ENDPOINTS_ENV, e))?,
        };
        let Some(first) = endpoints.first() else {
            return Err(ConfigError::invalid(RPC_ENDPOINTS_ENV, "no endpoints given"));
        };

        let signing_url = match var(SIGNING_RPC_ENV) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|e| ConfigError::invalid(SIGNING_RPC_ENV, format!("{e}")))?,
            None => first.url.clone(),
        };

        let quorum = parse_number(&var, RPC_QUORUM_ENV)?.unwrap_or(1u32);
        let request_timeout = parse_number(&var, RPC_TIMEOUT_ENV)?
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT);
        let refresh_interval = match parse_number::<u64, _>(&var, REFRESH_SECS_ENV)? {
            Some(0) => return Err(ConfigError::invalid(REFRESH_SECS_ENV, "must be positive")),
            Some(secs) => Duration::from_secs(secs),
            None => DEFAULT_REFRESH_INTERVAL,
        };

        let data_dir = var(DATA_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

        let host = var(HOST_ENV).unwrap_or_else(|| "0.0.0.0".to_string());
        let port: u16 = parse_number(&var, PORT_ENV)?.unwrap_or(8080);
        let bind = format!("{host}:{port}")
            .parse()
            .map_err(|e| ConfigError::invalid(HOST_ENV, format!("{e}")))?;

        let log_format = match var(LOG_FORMAT_ENV).map(|v| v.to_ascii_lowercase()).as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::invalid(
                    LOG_FORMAT_ENV,
                    format!("unknown format `{other}`"),
                ))
            }
        };

        Ok(Self {
            network,
            endpoints,
            signing_url,
            quorum,
            request_timeout,
            data_dir,
            refresh_interval,
            bind,
            log_format,
        })
    }
}

fn parse_number<T, V>(var: &V, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    V: Fn(&str) -> Option<String>,
{
    var(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e: T::Err| ConfigError::invalid(key, format!("`{raw}`: {e}")))
        })
        .transpose()
}
