use super::keyed::KeyedStore;
use crate::config::LoggingSettings;
use crate::debug_log::{self, DebugLog};
use crate::resource_list::ResourceList;
use anyhow::{Result, anyhow};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};

/// Application-wide cache of entity objects and resource lists.
///
/// Keys are built by the owning factory as `schema tag + local id`, so several entity
/// types can share one store without collisions.
#[derive(Debug)]
pub struct Store {
    objects: KeyedStore<Value>,
    lists: KeyedStore<ResourceList>,
}

/// The store as threaded through factories
pub type SharedStore = Arc<Mutex<Store>>;

impl Store {
    pub fn new() -> Self {
        Self {
            objects: KeyedStore::new("object"),
            lists: KeyedStore::new("list"),
        }
    }

    pub fn with_logging(settings: &LoggingSettings) -> Self {
        let log = DebugLog::from_settings(debug_log::STORE, settings);
        Self {
            objects: KeyedStore::new("object").with_log(log.clone()),
            lists: KeyedStore::new("list").with_log(log),
        }
    }

    pub fn shared(self) -> SharedStore {
        Arc::new(Mutex::new(self))
    }

    pub fn objects(&self) -> &KeyedStore<Value> {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> &mut KeyedStore<Value> {
        &mut self.objects
    }

    pub fn lists(&self) -> &KeyedStore<ResourceList> {
        &self.lists
    }

    pub fn lists_mut(&mut self) -> &mut KeyedStore<ResourceList> {
        &mut self.lists
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

pub fn lock(store: &SharedStore) -> Result<MutexGuard<'_, Store>> {
    store.lock().map_err(|_| anyhow!("store lock poisoned"))
}
