//! Reading raw server payloads into schema shaped objects

use super::{ModelProp, Schema};
use crate::factory::FactoryRegistry;
use anyhow::{Result, bail};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Post-read conversion applied to every property that was present in the payload
pub type ConvertFn = Arc<dyn Fn(&ModelProp, Value) -> Value + Send + Sync>;

/// Options for `Schema::read` and `Schema::read_property`
#[derive(Clone, Default)]
pub struct ReadArgs<'a> {
    /// Object(s) to populate; a fresh object is created when absent
    pub obj: Option<Value>,
    /// Model property ids to read, all when `None`
    pub schema_read_ids: Option<Vec<u32>>,
    /// Treat `schema_read_ids` as ids to skip
    pub schema_exclude: bool,
    /// Model property ids removed from the result
    pub schema_prune_ids: Vec<u32>,
    /// Payload property name to read for a model name
    pub from_prop: HashMap<String, String>,
    pub convert: Option<ConvertFn>,
    /// Factories for embedded references; references pass through untouched without one
    pub factories: Option<&'a FactoryRegistry>,
}

impl<'a> ReadArgs<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_obj(mut self, obj: Value) -> Self {
        self.obj = Some(obj);
        self
    }

    pub fn read_ids(mut self, ids: &[u32]) -> Self {
        self.schema_read_ids = Some(ids.to_vec());
        self.schema_exclude = false;
        self
    }

    pub fn exclude_ids(mut self, ids: &[u32]) -> Self {
        self.schema_read_ids = Some(ids.to_vec());
        self.schema_exclude = true;
        self
    }

    pub fn prune_ids(mut self, ids: &[u32]) -> Self {
        self.schema_prune_ids = ids.to_vec();
        self
    }

    pub fn from_prop(mut self, model_name: impl Into<String>, source: impl Into<String>) -> Self {
        self.from_prop.insert(model_name.into(), source.into());
        self
    }

    pub fn with_convert(mut self, convert: ConvertFn) -> Self {
        self.convert = Some(convert);
        self
    }

    pub fn with_factories(mut self, factories: &'a FactoryRegistry) -> Self {
        self.factories = Some(factories);
        self
    }

    fn selects(&self, id: u32) -> bool {
        match &self.schema_read_ids {
            None => true,
            Some(ids) => ids.contains(&id) != self.schema_exclude,
        }
    }

    /// Args used when delegating an embedded reference to its factory
    fn nested(&self) -> ReadArgs<'a> {
        ReadArgs {
            factories: self.factories,
            ..ReadArgs::default()
        }
    }
}

impl fmt::Debug for ReadArgs<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadArgs")
            .field("obj", &self.obj)
            .field("schema_read_ids", &self.schema_read_ids)
            .field("schema_exclude", &self.schema_exclude)
            .field("schema_prune_ids", &self.schema_prune_ids)
            .field("from_prop", &self.from_prop)
            .field("convert", &self.convert.is_some())
            .field("factories", &self.factories.is_some())
            .finish()
    }
}

fn contains_objects(value: &Value) -> bool {
    match value {
        Value::Object(_) => true,
        Value::Array(items) => items.iter().any(Value::is_object),
        _ => false,
    }
}

impl Schema {
    /// Read a payload; arrays are read element-wise, aligned with an `obj` array when one
    /// is supplied
    pub fn read(&self, payload: &Value, args: &ReadArgs<'_>) -> Result<Value> {
        let Value::Array(items) = payload else {
            return self.read_property(payload, args);
        };

        let existing = match &args.obj {
            None => Vec::new(),
            Some(Value::Array(objs)) => objs.clone(),
            Some(_) => bail!("Schema '{}': an array payload needs an array of objects to read into", self.name()),
        };

        let mut results = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let item_args = ReadArgs {
                obj: existing.get(index).cloned(),
                ..args.clone()
            };
            results.push(self.read_property(item, &item_args)?);
        }

        self.trace("read", json!({"count": results.len()}));
        Ok(Value::Array(results))
    }

    /// Read every selected model property of a single payload object
    pub fn read_property(&self, payload: &Value, args: &ReadArgs<'_>) -> Result<Value> {
        let mut obj = match &args.obj {
            None => Map::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(other) => bail!("Schema '{}': cannot read into non-object {}", self.name(), other),
        };

        for prop in self.model_props().iter().filter(|p| args.selects(p.id)) {
            let source = args
                .from_prop
                .get(&prop.model_name)
                .map(String::as_str)
                .unwrap_or(prop.model_name.as_str());

            let Some(raw) = crate::value::lookup(payload, prop.model_path.as_deref(), source) else {
                obj.remove(&prop.model_name);
                continue;
            };

            let mut value = match (&prop.factory, args.factories) {
                (Some(factory), Some(registry)) if contains_objects(raw) => {
                    registry.require(factory)?.read_rsp_object(raw, &args.nested())?
                }
                _ => raw.clone(),
            };

            if let Some(convert) = &args.convert {
                value = convert(prop, value);
            }

            obj.insert(prop.model_name.clone(), value);
        }

        for id in &args.schema_prune_ids {
            if let Some(prop) = self.get_model_prop(*id) {
                obj.remove(&prop.model_name);
            }
        }

        Ok(Value::Object(obj))
    }
}
