//! API constants for the canvassing REST backend

/// Standard headers
pub mod headers {
    /// Content type for JSON requests
    pub const CONTENT_TYPE_JSON: &str = "application/json";

    /// Correlation header attached to every request
    pub const X_CORRELATION_ID: &str = "X-Correlation-Id";
}

/// HTTP methods for resource actions
pub mod methods {
    pub const GET: &str = "GET";
    pub const POST: &str = "POST";
    pub const PUT: &str = "PUT";
    pub const DELETE: &str = "DELETE";
}

/// Connection pool tuning
pub const POOL_MAX_IDLE_PER_HOST: usize = 10;
pub const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

/// Build full resource endpoint URL
pub fn resource_endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}
