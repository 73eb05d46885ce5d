//! REST resource configuration and call conventions

use crate::api::Method;
use anyhow::{Result, anyhow};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

pub const GET: &str = "get";
pub const QUERY: &str = "query";
pub const SAVE: &str = "save";
pub const SAVE_MANY: &str = "saveMany";
pub const UPDATE: &str = "update";
pub const REMOVE: &str = "remove";

static URL_PARAM: Lazy<Result<Regex, regex::Error>> = Lazy::new(|| Regex::new(r":([A-Za-z_][A-Za-z0-9_]*)"));

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceAction {
    pub method: Method,
    /// Replaces the resource URL template for this action
    pub url: Option<String>,
    /// Whether the response is a JSON array
    pub is_array: bool,
}

impl ResourceAction {
    pub fn new(method: Method, is_array: bool) -> Self {
        Self { method, url: None, is_array }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// URL template plus named actions for one REST resource
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceConfig {
    pub url: String,
    pub actions: HashMap<String, ResourceAction>,
}

impl ResourceConfig {
    /// Resource with the standard actions
    pub fn new(url: impl Into<String>) -> Self {
        let actions = [
            (GET, ResourceAction::new(Method::Get, false)),
            (QUERY, ResourceAction::new(Method::Get, true)),
            (SAVE, ResourceAction::new(Method::Post, false)),
            (SAVE_MANY, ResourceAction::new(Method::Post, true)),
            (UPDATE, ResourceAction::new(Method::Put, false)),
            (REMOVE, ResourceAction::new(Method::Delete, false)),
        ]
        .into_iter()
        .map(|(name, action)| (name.to_string(), action))
        .collect();

        Self { url: url.into(), actions }
    }

    pub fn with_action(mut self, name: impl Into<String>, action: ResourceAction) -> Self {
        self.actions.insert(name.into(), action);
        self
    }

    pub fn action(&self, name: &str) -> Result<&ResourceAction> {
        self.actions
            .get(name)
            .ok_or_else(|| anyhow!("Resource '{}' has no action '{}'", self.url, name))
    }

    /// Path and remaining query params for `action`
    pub fn request_path(&self, action: &ResourceAction, params: &HashMap<String, String>) -> Result<(String, HashMap<String, String>)> {
        expand_url(action.url.as_deref().unwrap_or(&self.url), params)
    }
}

/// Fill `:name` placeholders from `params`. Placeholders without a value are dropped along
/// with their path segment; unused params are returned for the query string.
pub fn expand_url(template: &str, params: &HashMap<String, String>) -> Result<(String, HashMap<String, String>)> {
    let pattern = URL_PARAM
        .as_ref()
        .map_err(|e| anyhow!("Invalid URL placeholder pattern: {}", e))?;
    let mut remaining = params.clone();
    let filled = pattern.replace_all(template, |caps: &regex::Captures<'_>| match remaining.remove(&caps[1]) {
        Some(value) => urlencoding::encode(&value).into_owned(),
        None => String::new(),
    });

    let leading = if filled.starts_with('/') { "/" } else { "" };
    let path = filled.split('/').filter(|s| !s.is_empty()).collect::<Vec<_>>().join("/");
    Ok((format!("{}{}", leading, path), remaining))
}

/// Optional success and failure callbacks for a REST call. The call's `Result` is always
/// returned as well.
pub struct Callbacks<'a, T> {
    on_success: Option<Box<dyn FnOnce(&T) + Send + 'a>>,
    on_failure: Option<Box<dyn FnOnce(&anyhow::Error) + Send + 'a>>,
}

impl<'a, T> Callbacks<'a, T> {
    pub fn new() -> Self {
        Self {
            on_success: None,
            on_failure: None,
        }
    }

    pub fn on_success(mut self, f: impl FnOnce(&T) + Send + 'a) -> Self {
        self.on_success = Some(Box::new(f));
        self
    }

    pub fn on_failure(mut self, f: impl FnOnce(&anyhow::Error) + Send + 'a) -> Self {
        self.on_failure = Some(Box::new(f));
        self
    }

    /// Run the matching callback and hand the result back
    pub fn resolve(self, result: Result<T>) -> Result<T> {
        match &result {
            Ok(value) => {
                if let Some(on_success) = self.on_success {
                    on_success(value);
                }
            }
            Err(err) => {
                if let Some(on_failure) = self.on_failure {
                    on_failure(err);
                }
            }
        }
        result
    }
}

impl<T> Default for Callbacks<'_, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Callbacks<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_success", &self.on_success.is_some())
            .field("on_failure", &self.on_failure.is_some())
            .finish()
    }
}

/// Parameters, body and callbacks of a resource call; every part is optional
#[derive(Debug, Default)]
pub struct ResourceCall<'a> {
    pub params: HashMap<String, String>,
    pub body: Option<Value>,
    pub callbacks: Callbacks<'a, Value>,
}

impl<'a> ResourceCall<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn params(mut self, params: HashMap<String, String>) -> Self {
        self.params.extend(params);
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn on_success(mut self, f: impl FnOnce(&Value) + Send + 'a) -> Self {
        self.callbacks = self.callbacks.on_success(f);
        self
    }

    pub fn on_failure(mut self, f: impl FnOnce(&anyhow::Error) + Send + 'a) -> Self {
        self.callbacks = self.callbacks.on_failure(f);
        self
    }
}
