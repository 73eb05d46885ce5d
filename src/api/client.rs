use super::constants::{self, headers};
use super::transport::{Method, RestError, RestRequest, RestTransport};
use crate::config::{ApiSettings, ClientConfig};
use crate::debug_log::{self, DebugLog};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::{Duration, Instant};

/// HTTP transport for the REST backend with connection pooling
#[derive(Clone)]
pub struct HttpTransport {
    base_url: String,
    http_client: reqwest::Client,
    log: DebugLog,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let settings = ApiSettings {
            base_url: base_url.into(),
            ..ApiSettings::default()
        };
        Self::from_settings(&settings)
    }

    pub fn from_settings(settings: &ApiSettings) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .pool_max_idle_per_host(constants::POOL_MAX_IDLE_PER_HOST)
            .pool_idle_timeout(Duration::from_secs(constants::POOL_IDLE_TIMEOUT_SECS))
            .timeout(Duration::from_secs(settings.timeout_secs))
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .user_agent(settings.user_agent.as_str())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self::with_custom_client(settings.base_url.clone(), http_client))
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let mut transport = Self::from_settings(&config.api)?;
        transport.log = DebugLog::from_settings(debug_log::HTTP, &config.logging);
        Ok(transport)
    }

    /// Create a transport with custom HTTP client configuration
    pub fn with_custom_client(base_url: impl Into<String>, http_client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into(),
            http_client,
            log: DebugLog::disabled(debug_log::HTTP),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get shared HTTP client for making requests (cheap clone)
    pub fn http_client(&self) -> reqwest::Client {
        self.http_client.clone()
    }

    async fn parse_response(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let text = response.text().await.context("Failed to read response body")?;

        if !status.is_success() {
            let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
            return Err(RestError::new(Some(status.as_u16()), body).into());
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).context("Failed to parse JSON response")
    }
}

#[async_trait]
impl RestTransport for HttpTransport {
    async fn send(&self, request: RestRequest) -> Result<Value> {
        let url = constants::resource_endpoint(&self.base_url, &request.path);
        let correlation_id = uuid::Uuid::new_v4().to_string();

        self.log.event(
            "request",
            json!({
                "method": request.method.as_str(),
                "url": url,
                "params": request.params,
                "correlation_id": correlation_id
            }),
        );

        let builder = match request.method {
            Method::Get => self.http_client.get(&url),
            Method::Post => self.http_client.post(&url),
            Method::Put => self.http_client.put(&url),
            Method::Delete => self.http_client.delete(&url),
        };

        let mut builder = builder
            .header("Accept", headers::CONTENT_TYPE_JSON)
            .header(headers::X_CORRELATION_ID, &correlation_id)
            .query(&request.params);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let request_start = Instant::now();
        let response = builder
            .send()
            .await
            .with_context(|| format!("{} {} failed", request.method, url))?;

        self.log.event(
            "response",
            json!({
                "status": response.status().as_u16(),
                "duration_ms": request_start.elapsed().as_millis() as u64,
                "correlation_id": correlation_id
            }),
        );

        Self::parse_response(response).await
    }
}
