//! String keyed in-memory store with create/overwrite/existing policies

use super::flags::StoreFlags;
use crate::debug_log::{self, DebugLog};
use anyhow::{Result, anyhow, bail};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::ops::{Deref, DerefMut};

/// Shallow merge used by [`KeyedStore::set`]
pub trait Merge {
    fn merge(&mut self, data: Self);
}

impl Merge for Value {
    /// Object properties of `data` are copied onto `self`; any other shape replaces it
    fn merge(&mut self, data: Value) {
        match (self, data) {
            (Value::Object(target), Value::Object(source)) => {
                for (key, value) in source {
                    target.insert(key, value);
                }
            }
            (target, data) => *target = data,
        }
    }
}

/// Value stored by [`KeyedStore::create`] when `EMPTY_OBJ` is set
pub trait Empty {
    fn empty() -> Self;
}

impl Empty for Value {
    fn empty() -> Self {
        Value::Object(Map::new())
    }
}

/// Handle to a stored entry: the entry itself, or a detached copy when `COPY_GET` was requested
pub enum StoreRef<'a, T> {
    Stored(&'a mut T),
    Copy(T),
}

impl<T: Clone> StoreRef<'_, T> {
    pub fn is_copy(&self) -> bool {
        matches!(self, Self::Copy(_))
    }

    pub fn into_owned(self) -> T {
        match self {
            Self::Stored(entry) => entry.clone(),
            Self::Copy(copy) => copy,
        }
    }
}

impl<T> Deref for StoreRef<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        match self {
            Self::Stored(entry) => entry,
            Self::Copy(copy) => copy,
        }
    }
}

impl<T> DerefMut for StoreRef<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        match self {
            Self::Stored(entry) => entry,
            Self::Copy(copy) => copy,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for StoreRef<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stored(entry) => f.debug_tuple("Stored").field(entry).finish(),
            Self::Copy(copy) => f.debug_tuple("Copy").field(copy).finish(),
        }
    }
}

/// Outcome of [`KeyedStore::delete`]
#[derive(Debug, Clone, PartialEq)]
pub enum Deleted<T> {
    NotFound,
    Deleted,
    /// The removed value, returned when `COPY_GET` was requested
    Copy(T),
}

impl<T> Deleted<T> {
    pub fn is_deleted(&self) -> bool {
        !matches!(self, Self::NotFound)
    }

    pub fn into_copy(self) -> Option<T> {
        match self {
            Self::Copy(value) => Some(value),
            _ => None,
        }
    }
}

pub struct KeyedStore<T> {
    name: String,
    entries: HashMap<String, T>,
    log: DebugLog,
}

impl<T> KeyedStore<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: HashMap::new(),
            log: DebugLog::disabled(debug_log::STORE),
        }
    }

    pub fn with_log(mut self, log: DebugLog) -> Self {
        self.log = log;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    /// Read-only access that never creates or copies
    pub fn peek(&self, key: &str) -> Option<&T> {
        self.entries.get(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<T: Clone + Empty> KeyedStore<T> {
    fn emit(entry: &mut T, flags: StoreFlags) -> StoreRef<'_, T> {
        if flags.do_copy_get() {
            StoreRef::Copy(entry.clone())
        } else {
            StoreRef::Stored(entry)
        }
    }

    /// Create `key`; an existing entry is reset with `CREATE_INIT`, rejected with `CREATE`,
    /// and returned untouched otherwise
    pub fn create<F>(&mut self, key: &str, flags: StoreFlags, ctor: F) -> Result<StoreRef<'_, T>>
    where
        F: FnOnce() -> T,
    {
        let exists = self.entries.contains_key(key);

        if !exists || flags.do_create_init() {
            let value = if flags.do_empty_obj() { T::empty() } else { ctor() };
            self.log.event(
                "create",
                json!({"store": self.name, "key": key, "reset": exists, "flags": format!("{:?}", flags)}),
            );
            self.entries.insert(key.to_string(), value);
        } else if flags.do_create() {
            bail!("{} '{}' already exists", self.name, key);
        }

        let entry = self
            .entries
            .get_mut(key)
            .ok_or_else(|| anyhow!("{} '{}' does not exist", self.name, key))?;
        Ok(Self::emit(entry, flags))
    }

    /// Look up `key`, creating an empty entry when absent and creation is allowed
    pub fn get(&mut self, key: &str, flags: StoreFlags) -> Result<Option<StoreRef<'_, T>>> {
        self.get_with(key, flags, T::empty)
    }

    /// Look up `key`, creating it with `ctor` when absent and creation is allowed
    pub fn get_with<F>(&mut self, key: &str, flags: StoreFlags, ctor: F) -> Result<Option<StoreRef<'_, T>>>
    where
        F: FnOnce() -> T,
    {
        if !self.entries.contains_key(key) {
            if flags.do_create_any() {
                return self.create(key, flags, ctor).map(Some);
            }
            return Ok(None);
        }

        Ok(self.entries.get_mut(key).map(|entry| Self::emit(entry, flags)))
    }

    /// Copy `src_key` to `new_key`, running `preset(destination, source)` on the result.
    /// An existing destination needs `EXISTING` (kept) or `OVERWRITE` (replaced).
    pub fn duplicate<P>(&mut self, new_key: &str, src_key: &str, flags: StoreFlags, preset: P) -> Result<StoreRef<'_, T>>
    where
        P: FnOnce(&mut T, &T),
    {
        let source = self
            .entries
            .get(src_key)
            .cloned()
            .ok_or_else(|| anyhow!("{} '{}' source does not exist", self.name, src_key))?;

        self.log.event(
            "duplicate",
            json!({"store": self.name, "from": src_key, "to": new_key, "flags": format!("{:?}", flags)}),
        );

        match self.entries.entry(new_key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if flags.do_existing() {
                    preset(occupied.get_mut(), &source);
                } else if flags.do_overwrite() {
                    let mut copy = source.clone();
                    preset(&mut copy, &source);
                    occupied.insert(copy);
                } else {
                    bail!("{} '{}' already exists, duplicate needs EXISTING or OVERWRITE", self.name, new_key);
                }
                Ok(Self::emit(occupied.into_mut(), flags))
            }
            Entry::Vacant(vacant) => {
                let mut copy = source.clone();
                preset(&mut copy, &source);
                Ok(Self::emit(vacant.insert(copy), flags))
            }
        }
    }

    pub fn delete(&mut self, key: &str, flags: StoreFlags) -> Deleted<T> {
        match self.entries.remove(key) {
            Some(value) => {
                self.log.event("delete", json!({"store": self.name, "key": key}));
                if flags.do_copy_get() {
                    Deleted::Copy(value)
                } else {
                    Deleted::Deleted
                }
            }
            None => Deleted::NotFound,
        }
    }
}

impl<T: Clone + Empty + Merge> KeyedStore<T> {
    /// Merge `data` into `key`, creating it first when absent and creation is allowed.
    /// Returns `None` when the entry does not exist and may not be created.
    pub fn set<F>(&mut self, key: &str, data: T, flags: StoreFlags, ctor: F) -> Result<Option<StoreRef<'_, T>>>
    where
        F: FnOnce() -> T,
    {
        if !self.entries.contains_key(key) {
            if !flags.do_create_any() {
                self.log.warn(format!("{} '{}' does not exist, nothing set", self.name, key));
                return Ok(None);
            }
            self.create(key, flags, ctor)?;
        }

        let entry = self
            .entries
            .get_mut(key)
            .ok_or_else(|| anyhow!("{} '{}' does not exist", self.name, key))?;
        entry.merge(data);
        Ok(Some(Self::emit(entry, flags)))
    }
}

impl<T: fmt::Debug> fmt::Debug for KeyedStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedStore")
            .field("name", &self.name)
            .field("entries", &self.entries)
            .finish()
    }
}

impl<T> Default for KeyedStore<T> {
    fn default() -> Self {
        Self::new("store")
    }
}
