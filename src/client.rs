//! Work source abstraction and the getwork JSON-RPC client
//!
//! The miner only needs two operations from a server: hand out a work
//! template and accept a solved header. [`WorkSource`] captures exactly that;
//! [`GetworkClient`] implements it over HTTP with the JSON-RPC 1.0 `getwork`
//! method.

use crate::header::BlockHeader;
use crate::types::WorkTemplate;
use crate::utils::ExponentialBackoff;
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Length of the `data` hex in a classic getwork result, header plus SHA-256 padding
pub const GETWORK_DATA_HEX_LEN: usize = 256;

/// SHA-256 padding of an 80-byte header in getwork word order
///
/// Servers that hand out 128-byte work expect it back on submission.
pub const GETWORK_PADDING: &str = "000000800000000000000000000000000000000000000000000000000000000000000000000000000000000080020000";

/// Source of mining work
#[async_trait]
pub trait WorkSource: Send + Sync {
    /// Fetch a fresh work template
    async fn fetch(&self) -> Result<WorkTemplate>;

    /// Submit a solved header, returning whether the server accepted it
    async fn submit(&self, solution_hex: &str) -> Result<bool>;
}

/// Basic-auth credentials for the RPC endpoint
#[derive(Clone, PartialEq, Eq)]
pub struct RpcCredentials {
    pub user: String,
    pub password: String,
}

impl RpcCredentials {
    /// Create new credentials
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for RpcCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcCredentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Exponential backoff configuration
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub max_retries: usize,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
            max_retries: 10,
        }
    }
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

/// JSON-RPC `getwork` client
#[derive(Debug)]
pub struct GetworkClient {
    client: Client,
    url: Url,
    credentials: Option<RpcCredentials>,
    backoff_config: BackoffConfig,
    next_id: AtomicU64,
    padded_work: AtomicBool,
}

impl GetworkClient {
    /// Create a new getwork client
    pub fn new(
        url: impl AsRef<str>,
        credentials: Option<RpcCredentials>,
        timeout: Duration,
    ) -> Result<Self> {
        let url = Url::parse(url.as_ref())
            .map_err(|e| Error::config(format!("Invalid RPC URL: {}", e)))?;

        let client = ClientBuilder::new()
            .timeout(timeout)
            .build()
            .map_err(Error::from)?;

        Ok(Self {
            client,
            url,
            credentials,
            backoff_config: BackoffConfig::default(),
            next_id: AtomicU64::new(1),
            padded_work: AtomicBool::new(false),
        })
    }

    /// Set custom backoff configuration
    pub fn with_backoff_config(mut self, config: BackoffConfig) -> Self {
        self.backoff_config = config;
        self
    }

    /// RPC endpoint
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Call a JSON-RPC method, retrying transient failures
    async fn call_with_retry(&self, method: &str, params: &[&str]) -> Result<serde_json::Value> {
        let mut backoff = ExponentialBackoff::new(
            self.backoff_config.initial_delay,
            self.backoff_config.max_delay,
            self.backoff_config.multiplier,
        );

        loop {
            match self.call(method, params).await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && (backoff.attempt() as usize) < self.backoff_config.max_retries => {
                    let delay = backoff.next_delay_with_jitter();
                    warn!(
                        "RPC {} failed: {}. Retrying in {:?} (attempt {}/{})",
                        method,
                        e,
                        delay,
                        backoff.attempt(),
                        self.backoff_config.max_retries
                    );
                    sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Perform a single JSON-RPC call
    async fn call(&self, method: &str, params: &[&str]) -> Result<serde_json::Value> {
        let request = RpcRequest {
            jsonrpc: "1.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params: params.to_vec(),
        };

        let mut builder = self.client.post(self.url.clone()).json(&request);
        if let Some(credentials) = &self.credentials {
            builder = builder.basic_auth(&credentials.user, Some(&credentials.password));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| transport_error(method, e))?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(Error::rpc(format!("Authentication rejected: HTTP {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| transport_error(method, e))?;
        match serde_json::from_str::<RpcResponse>(&body) {
            Ok(envelope) => parse_envelope(envelope),
            Err(_) if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS => {
                Err(Error::network(format!("Server returned HTTP {}", status)))
            }
            Err(e) if status.is_success() => {
                Err(Error::rpc(format!("Malformed JSON-RPC response: {}", e)))
            }
            Err(_) => Err(Error::rpc(format!("Unexpected HTTP status {}", status))),
        }
    }
}

/// Map a reqwest failure, keeping request timeouts distinct
fn transport_error(method: &str, e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::timeout(format!("RPC {}", method))
    } else {
        Error::from(e)
    }
}

/// Extract the `result` of a JSON-RPC envelope, surfacing its `error`
fn parse_envelope(envelope: RpcResponse) -> Result<serde_json::Value> {
    match (envelope.error, envelope.result) {
        (Some(error), _) if !error.is_null() => {
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            Err(Error::rpc(message))
        }
        (_, Some(result)) if !result.is_null() => Ok(result),
        _ => Err(Error::rpc("JSON-RPC response has neither result nor error")),
    }
}

/// Reduce a getwork result to a template, dropping SHA-256 padding if present
///
/// Returns the template and whether the server sent padded work.
fn template_from_result(result: serde_json::Value) -> Result<(WorkTemplate, bool)> {
    let mut template: WorkTemplate = serde_json::from_value(result)
        .map_err(|e| Error::rpc(format!("Malformed getwork result: {}", e)))?;

    let padded = template.data.len() == GETWORK_DATA_HEX_LEN;
    if padded {
        if !template.data.is_ascii() {
            return Err(Error::format("Work data contains non-ASCII characters"));
        }
        template.data.truncate(BlockHeader::HEX_LEN);
    }
    Ok((template, padded))
}

#[async_trait]
impl WorkSource for GetworkClient {
    #[instrument(skip_all)]
    async fn fetch(&self) -> Result<WorkTemplate> {
        debug!("Requesting work from {}", self.url);
        let result = self.call_with_retry("getwork", &[]).await?;
        let (template, padded) = template_from_result(result)?;
        self.padded_work.store(padded, Ordering::Relaxed);

        debug!(work_target = %template.target, padded, "Received work template");
        Ok(template)
    }

    #[instrument(skip_all)]
    async fn submit(&self, solution_hex: &str) -> Result<bool> {
        let mut payload = solution_hex.to_string();
        if self.padded_work.load(Ordering::Relaxed) && payload.len() == BlockHeader::HEX_LEN {
            payload.push_str(GETWORK_PADDING);
        }

        debug!("Submitting solution {}", payload);
        let result = self.call_with_retry("getwork", &[payload.as_str()]).await?;
        let accepted = result
            .as_bool()
            .ok_or_else(|| Error::rpc(format!("Unexpected submit result: {}", result)))?;

        if accepted {
            info!("Solution accepted by server");
        } else {
            warn!("Solution rejected by server");
        }
        Ok(accepted)
    }
}
