//! REST transport abstraction
//!
//! Factories only see [`RestTransport`]; the HTTP client and test doubles implement it.

use async_trait::async_trait;
use anyhow::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => super::constants::methods::GET,
            Method::Post => super::constants::methods::POST,
            Method::Put => super::constants::methods::PUT,
            Method::Delete => super::constants::methods::DELETE,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One REST call: a path relative to the API base plus query parameters and body
#[derive(Debug, Clone, PartialEq)]
pub struct RestRequest {
    pub method: Method,
    pub path: String,
    pub params: HashMap<String, String>,
    pub body: Option<Value>,
}

impl RestRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: HashMap::new(),
            body: None,
        }
    }

    pub fn with_params(mut self, params: HashMap<String, String>) -> Self {
        self.params = params;
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// Error response from the server, downcastable from `anyhow::Error`
#[derive(Debug, Clone, PartialEq)]
pub struct RestError {
    pub status: Option<u16>,
    pub body: Value,
}

impl RestError {
    pub fn new(status: Option<u16>, body: Value) -> Self {
        Self { status, body }
    }
}

impl fmt::Display for RestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "REST request failed with status {}: {}", status, self.body),
            None => write!(f, "REST request failed: {}", self.body),
        }
    }
}

impl std::error::Error for RestError {}

#[async_trait]
pub trait RestTransport: Send + Sync {
    /// Send `request` and return the decoded JSON response
    async fn send(&self, request: RestRequest) -> Result<Value>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rest_error_display_and_downcast() {
        let err: anyhow::Error = RestError::new(Some(404), json!({"message": "not found"})).into();
        assert!(err.to_string().contains("404"));
        let rest = err.downcast_ref::<RestError>().unwrap();
        assert_eq!(rest.status, Some(404));
    }

    #[test]
    fn test_request_builder() {
        let mut params = HashMap::new();
        params.insert("town".to_string(), "Ennis".to_string());
        let request = RestRequest::new(Method::Post, "address")
            .with_params(params)
            .with_body(json!({"town": "Ennis"}));

        assert_eq!(request.method.to_string(), "POST");
        assert_eq!(request.params.len(), 1);
        assert!(request.body.is_some());
    }
}
