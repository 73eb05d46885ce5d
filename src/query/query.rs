//! Reusable REST query
//!
//! A resource name plus flat key/value parameters, rendered into a URL or handed to the
//! transport as a parameter map.

use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub resource: String,
    pub params: HashMap<String, String>,
}

impl Query {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            params: HashMap::new(),
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn params(mut self, params: HashMap<String, String>) -> Self {
        self.params.extend(params);
        self
    }

    /// Clone and modify - useful for variations of a base query
    pub fn with_param(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.clone().param(key, value)
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Full URL with parameters in key order
    pub fn to_url(&self, base_url: &str) -> String {
        let mut url = format!("{}/{}", base_url.trim_end_matches('/'), self.resource);

        let mut keys: Vec<&String> = self.params.keys().collect();
        keys.sort();
        let params: Vec<String> = keys
            .into_iter()
            .map(|key| format!("{}={}", urlencoding::encode(key), urlencoding::encode(&self.params[key])))
            .collect();

        if !params.is_empty() {
            url.push('?');
            url.push_str(&params.join("&"));
        }

        url
    }

    /// Query parameters as a HashMap for use with HTTP client
    pub fn to_query_params(&self) -> HashMap<String, String> {
        self.params.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_query_url() {
        let query = Query::new("canvass");
        assert_eq!(query.to_url("http://localhost:4000/api/"), "http://localhost:4000/api/canvass");
    }

    #[test]
    fn test_query_url_sorted_and_encoded() {
        let query = Query::new("address")
            .param("town", "Ennis")
            .param("addrLine1|addrLine2", "main st")
            .param("or", "town=Ennis,county=Clare");

        assert_eq!(
            query.to_url("http://host/api"),
            "http://host/api/address?addrLine1%7CaddrLine2=main%20st&or=town%3DEnnis%2Ccounty%3DClare&town=Ennis"
        );
    }

    #[test]
    fn test_query_with_modifications() {
        let base = Query::new("survey").param("name", "poll");
        let variant = base.with_param("limit", "10");

        assert_eq!(base.params.len(), 1);
        assert_eq!(variant.to_query_params().get("limit"), Some(&"10".to_string()));
        assert_eq!(variant.resource, "survey");
    }
}
