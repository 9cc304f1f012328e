//! HTTP transport
//!
//! The engine talks to the network through [`HttpTransport`]. Transport
//! failures never surface as errors; they become [`FetchResponse`] variants the
//! classifier decides on.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

use crate::FetchResponse;

/// Errors building a transport
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("Invalid header {0}: {1}")]
    InvalidHeader(String, String),
}

/// Something that can GET a URI
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// GET `uri`, giving up after `timeout`
    async fn get(&self, uri: &str, timeout: Duration) -> FetchResponse;
}

/// User agents for rotation
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/135.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:137.0) Gecko/20100101 Firefox/137.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14.7; rv:137.0) Gecko/20100101 Firefox/137.0",
];

/// Pick a random user agent
pub fn random_user_agent() -> &'static str {
    use rand::Rng;
    let idx = rand::thread_rng().gen_range(0..USER_AGENTS.len());
    USER_AGENTS[idx]
}

/// Header carrying the marketplace API key
pub const API_KEY_HEADER: &str = "X-API-KEY";

/// Client settings for [`ReqwestTransport`]
#[derive(Debug, Clone, Default)]
pub struct TransportConfig {
    /// Sent as `X-API-KEY` on every request
    pub api_key: Option<String>,
    /// Fixed user agent (random per client otherwise)
    pub user_agent: Option<String>,
    /// Extra default headers
    pub headers: Vec<(String, String)>,
}

impl TransportConfig {
    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.api_key = Some(api_key.to_string());
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

fn header_pair(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), TransportError> {
    let header_name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| TransportError::InvalidHeader(name.to_string(), e.to_string()))?;
    let header_value = HeaderValue::from_str(value)
        .map_err(|e| TransportError::InvalidHeader(name.to_string(), e.to_string()))?;
    Ok((header_name, header_value))
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &config.api_key {
            let (name, value) = header_pair(API_KEY_HEADER, api_key)?;
            headers.insert(name, value);
        }
        for (name, value) in &config.headers {
            let (name, value) = header_pair(name, value)?;
            headers.insert(name, value);
        }

        let user_agent = config
            .user_agent
            .clone()
            .unwrap_or_else(|| random_user_agent().to_string());

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(user_agent)
            .build()
            .map_err(|e| TransportError::ClientBuild(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, uri: &str, timeout: Duration) -> FetchResponse {
        let response = match self.client.get(uri).timeout(timeout).send().await {
            Ok(response) => response,
            Err(e) if e.is_builder() => return FetchResponse::NoRequest(e.to_string()),
            Err(e) => return FetchResponse::NoResponse(e.to_string()),
        };

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_lowercase(), v.to_string()))
            })
            .collect();

        match response.text().await {
            Ok(body) => FetchResponse::Http {
                status,
                headers,
                body,
            },
            Err(e) => FetchResponse::NoResponse(e.to_string()),
        }
    }
}
