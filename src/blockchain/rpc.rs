// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JSON-RPC endpoint pool.
//!
//! Reads go through [`RpcPool::read`], which starts with the preferred
//! endpoint and falls through to the next one whenever the current one
//! errors or stalls past its `stall_timeout`. Slow endpoints keep racing
//! until the pool-wide request timeout, so a late answer can still win.
//! A read is satisfied once endpoints whose weights sum to the quorum have
//! returned the same value.
//!
//! Broadcasting never uses the pool: [`signing_provider`] binds a single
//! endpoint so nonces and ordering come from one source of truth.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use alloy::{
    network::EthereumWallet,
    providers::{DynProvider, Provider, ProviderBuilder, RootProvider},
    rpc::client::RpcClient,
    signers::local::PrivateKeySigner,
    transports::http::Http,
};
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::time::{error::Elapsed, Instant};
use url::Url;

use crate::error::{EngineError, EngineResult};

/// Default time to wait on an endpoint before also trying the next one.
pub const DEFAULT_STALL_TIMEOUT: Duration = Duration::from_millis(750);

/// Default hard cap on a single endpoint request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Static description of one read endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    pub url: Url,
    /// Lower is preferred.
    pub priority: u32,
    pub stall_timeout: Duration,
    pub weight: u32,
}

impl EndpointConfig {
    pub fn new(url: Url, priority: u32) -> Self {
        Self {
            url,
            priority,
            stall_timeout: DEFAULT_STALL_TIMEOUT,
            weight: 1,
        }
    }

    /// Parse `url[;priority=N][;weight=N][;stall_ms=N]`.
    ///
    /// `default_priority` applies when no priority is given, so list order
    /// decides preference by default.
    pub fn parse(raw: &str, default_priority: u32) -> Result<Self, String> {
        let mut parts = raw.split(';').map(str::trim);
        let url_str = parts.next().unwrap_or_default();
        let url: Url = url_str
            .parse()
            .map_err(|e: url::ParseError| format!("invalid RPC URL `{url_str}`: {e}"))?;

        let mut config = Self::new(url, default_priority);
        for option in parts.filter(|p| !p.is_empty()) {
            let (key, value) = option
                .split_once('=')
                .ok_or_else(|| format!("malformed endpoint option `{option}`"))?;
            let value: u64 = value
                .trim()
                .parse()
                .map_err(|_| format!("endpoint option `{key}` must be an integer"))?;
            let key = key.trim();
            let narrow = || {
                u32::try_from(value)
                    .map_err(|_| format!("endpoint option `{key}` is out of range: {value}"))
            };
            match key {
                "priority" => config.priority = narrow()?,
                "weight" if value > 0 => config.weight = narrow()?,
                "weight" => return Err("endpoint weight must be positive".to_string()),
                "stall_ms" => config.stall_timeout = Duration::from_millis(value),
                other => return Err(format!("unknown endpoint option `{other}`")),
            }
        }
        Ok(config)
    }
}

/// A connected read endpoint.
#[derive(Debug, Clone)]
pub struct RpcEndpoint {
    config: EndpointConfig,
    provider: RootProvider,
}

impl RpcEndpoint {
    /// Build the HTTP transport. No network I/O happens here.
    pub fn connect(config: EndpointConfig, request_timeout: Duration) -> EngineResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| EngineError::Config(format!("failed to build RPC client: {e}")))?;
        let http = Http::with_client(client, config.url.clone());
        let provider = RootProvider::new(RpcClient::new(http, false));
        Ok(Self { config, provider })
    }

    pub fn provider(&self) -> &RootProvider {
        &self.provider
    }

    pub fn url(&self) -> &Url {
        &self.config.url
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }
}

/// Weighted, priority-ordered set of read endpoints.
#[derive(Debug)]
pub struct RpcPool {
    endpoints: Vec<RpcEndpoint>,
    quorum: u32,
    request_timeout: Duration,
}

impl RpcPool {
    pub fn new(
        configs: Vec<EndpointConfig>,
        quorum: u32,
        request_timeout: Duration,
    ) -> EngineResult<Self> {
        if configs.is_empty() {
            return Err(EngineError::Config("no RPC endpoints configured".to_string()));
        }
        let total_weight: u32 = configs.iter().map(|c| c.weight).sum();
        if quorum == 0 || quorum > total_weight {
            return Err(EngineError::Config(format!(
                "quorum {quorum} must be between 1 and the total endpoint weight {total_weight}"
            )));
        }

        let mut endpoints = configs
            .into_iter()
            .map(|c| RpcEndpoint::connect(c, request_timeout))
            .collect::<EngineResult<Vec<_>>>()?;
        endpoints.sort_by(|a, b| {
            a.config
                .priority
                .cmp(&b.config.priority)
                .then(b.config.weight.cmp(&a.config.weight))
        });

        Ok(Self {
            endpoints,
            quorum,
            request_timeout,
        })
    }

    pub fn endpoints(&self) -> &[RpcEndpoint] {
        &self.endpoints
    }

    /// Run a read across the pool until the quorum agrees.
    ///
    /// The future returned by `call` must own what it needs (clone the
    /// provider out of the endpoint) since endpoints are raced concurrently.
    pub async fn read<T, E, F, Fut>(&self, label: &'static str, call: F) -> EngineResult<T>
    where
        T: Clone + PartialEq,
        E: Display,
        F: Fn(&RpcEndpoint) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut in_flight = FuturesUnordered::new();
        let mut tallies: Vec<(T, u32)> = Vec::new();
        let mut launched = 0usize;
        let mut last_error: Option<String> = None;

        let stall = tokio::time::sleep(Duration::ZERO);
        tokio::pin!(stall);

        loop {
            tokio::select! {
                biased;

                Some((index, outcome)) = in_flight.next(), if !in_flight.is_empty() => {
                    // The stream's item type is only fixed by the push below.
                    let index: usize = index;
                    let outcome: Result<Result<T, E>, Elapsed> = outcome;
                    let endpoint: &RpcEndpoint = &self.endpoints[index];
                    match outcome {
                        Ok(Ok(value)) => {
                            let weight = endpoint.config.weight;
                            let agreed = match tallies.iter_mut().find(|(v, _)| *v == value) {
                                Some((_, w)) => {
                                    *w = w.saturating_add(weight);
                                    *w
                                }
                                None => {
                                    tallies.push((value.clone(), weight));
                                    weight
                                }
                            };
                            if agreed >= self.quorum {
                                return Ok(value);
                            }
                        }
                        Ok(Err(e)) => {
                            tracing::warn!(
                                endpoint = %endpoint.url(),
                                call = label,
                                error = %e,
                                "RPC read failed, falling through"
                            );
                            last_error = Some(e.to_string());
                        }
                        Err(_) => {
                            tracing::warn!(
                                endpoint = %endpoint.url(),
                                call = label,
                                timeout_ms = self.request_timeout.as_millis() as u64,
                                "RPC read timed out"
                            );
                            last_error = Some(format!(
                                "{} timed out",
                                endpoint.url()
                            ));
                        }
                    }
                    // Answered without quorum or failed: bring in the next endpoint now.
                    stall.as_mut().reset(Instant::now());
                }

                _ = &mut stall, if launched < self.endpoints.len() => {
                    let index = launched;
                    launched += 1;
                    let endpoint = &self.endpoints[index];
                    let request = call(endpoint);
                    let timeout = self.request_timeout;
                    in_flight.push(async move {
                        (index, tokio::time::timeout(timeout, request).await)
                    });
                    stall.as_mut().reset(Instant::now() + endpoint.config.stall_timeout);
                }

                else => break,
            }
        }

        Err(EngineError::NetworkUnavailable(format!(
            "{label}: {}",
            last_error.unwrap_or_else(|| "no endpoint reached quorum".to_string())
        )))
    }
}

/// Provider bound to a single endpoint that signs with `signer`.
pub fn signing_provider(url: Url, signer: PrivateKeySigner) -> DynProvider {
    ProviderBuilder::new()
        .wallet(EthereumWallet::from(signer))
        .connect_http(url)
        .erased()
}
