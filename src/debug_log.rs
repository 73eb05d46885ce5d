//! Per-component debug logging
//!
//! Each logical component (store, schema, resource list, factory, response pipeline,
//! http) owns a `DebugLog` that can be switched on or off independently. Output goes
//! through the `log` facade as structured JSON events.

use crate::config::LoggingSettings;
use log::{debug, warn};
use serde_json::{Value, json};
use std::fmt::Display;

pub const STORE: &str = "store";
pub const SCHEMA: &str = "schema";
pub const RESOURCE_LIST: &str = "resource_list";
pub const FACTORY: &str = "factory";
pub const RESPONSE: &str = "response";
pub const HTTP: &str = "http";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebugLog {
    component: String,
    enabled: bool,
}

impl DebugLog {
    pub fn new(component: impl Into<String>, enabled: bool) -> Self {
        Self {
            component: component.into(),
            enabled,
        }
    }

    pub fn from_settings(component: &str, settings: &LoggingSettings) -> Self {
        Self::new(component, settings.is_enabled(component))
    }

    /// A logger that stays quiet until enabled
    pub fn disabled(component: impl Into<String>) -> Self {
        Self::new(component, false)
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn debug(&self, message: impl Display) {
        if self.enabled {
            debug!("[{}] {}", self.component, message);
        }
    }

    /// Log a structured event with arbitrary details
    pub fn event(&self, event: &str, details: Value) {
        if !self.enabled {
            return;
        }

        let log_data = json!({
            "event": event,
            "component": self.component,
            "details": details,
            "timestamp": chrono::Utc::now().to_rfc3339()
        });

        debug!("{}", log_data);
    }

    /// Warnings are emitted regardless of the toggle
    pub fn warn(&self, message: impl Display) {
        warn!("[{}] {}", self.component, message);
    }
}
