//! Factory registry used to resolve references between entity types

use crate::debug_log::{self, DebugLog};
use crate::resource_list::ResourceList;
use crate::schema::{ReadArgs, Schema};
use crate::store::StoreFlags;
use anyhow::{Result, anyhow};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Operations every entity factory exposes to the read and store pipeline
pub trait EntityFactory: Send + Sync {
    fn name(&self) -> &str;

    fn schema(&self) -> &Arc<Schema>;

    /// Property holding an entity's id in server payloads
    fn id_field(&self) -> &str {
        "_id"
    }

    /// Logger for responses stored through this factory
    fn response_log(&self) -> DebugLog {
        DebugLog::disabled(debug_log::RESPONSE)
    }

    /// Normalise a raw payload (object or array) through the factory's schema
    fn read_rsp_object(&self, payload: &Value, args: &ReadArgs<'_>) -> Result<Value>;

    /// Merge `data` into the stored object `id`
    fn set_obj(&self, id: &str, data: Value, flags: StoreFlags) -> Result<Option<Value>>;

    /// Replace the entries of the stored list `id`
    fn set_list(&self, id: &str, list: Vec<Value>, flags: StoreFlags, title: Option<&str>) -> Result<ResourceList>;

    fn duplicate_obj(&self, new_id: &str, src_id: &str, flags: StoreFlags) -> Result<Value>;

    fn duplicate_list(&self, new_id: &str, src_id: &str, flags: StoreFlags, title: Option<&str>) -> Result<ResourceList>;
}

#[derive(Clone, Default)]
pub struct FactoryRegistry {
    factories: HashMap<String, Arc<dyn EntityFactory>>,
}

impl FactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` under its name, replacing any previous one
    pub fn register(&mut self, factory: Arc<dyn EntityFactory>) -> Option<Arc<dyn EntityFactory>> {
        self.factories.insert(factory.name().to_string(), factory)
    }

    pub fn with(mut self, factory: Arc<dyn EntityFactory>) -> Self {
        self.register(factory);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn EntityFactory>> {
        self.factories.get(name)
    }

    pub fn require(&self, name: &str) -> Result<&Arc<dyn EntityFactory>> {
        self.get(name).ok_or_else(|| anyhow!("Unknown factory '{}'", name))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for FactoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryRegistry").field("factories", &self.names()).finish()
    }
}
