//! Storing server responses
//!
//! A response is normalised before it is stored: embedded sub-documents are stored by their
//! own factories first and replaced in the parent by their ids, then the parent is stored as
//! an object or a list under its primary key and copied to any secondary keys.

use super::registry::{EntityFactory, FactoryRegistry};
use crate::resource_list::ResourceList;
use crate::schema::ReadArgs;
use crate::store::StoreFlags;
use anyhow::{Result, bail};
use futures::future::try_join_all;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// What a response was stored as
#[derive(Debug, Clone)]
pub enum Stored {
    List(ResourceList),
    Obj(Value),
}

impl Stored {
    pub fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }

    pub fn as_list(&self) -> Option<&ResourceList> {
        match self {
            Self::List(list) => Some(list),
            Self::Obj(_) => None,
        }
    }

    pub fn as_obj(&self) -> Option<&Value> {
        match self {
            Self::Obj(obj) => Some(obj),
            Self::List(_) => None,
        }
    }
}

/// Embedded documents held in `property`, stored by `factory`
#[derive(Debug, Clone, Default)]
pub struct SubDocArgs {
    pub factory: String,
    pub property: String,
    pub obj_id: Vec<String>,
    pub flags: StoreFlags,
    pub sub_objs: Vec<SubDocArgs>,
}

impl SubDocArgs {
    pub fn new(factory: impl Into<String>, property: impl Into<String>, obj_id: &[&str], flags: StoreFlags) -> Self {
        Self {
            factory: factory.into(),
            property: property.into(),
            obj_id: obj_id.iter().map(|id| id.to_string()).collect(),
            flags,
            sub_objs: Vec::new(),
        }
    }

    pub fn with_sub_obj(mut self, sub: SubDocArgs) -> Self {
        self.sub_objs.push(sub);
        self
    }

    fn store_args(&self) -> StoreRspArgs {
        StoreRspArgs {
            obj_id: self.obj_id.clone(),
            flags: self.flags,
            title: None,
            sub_objs: self.sub_objs.clone(),
            next: None,
        }
    }
}

/// Keys, flags and sub-document specs for storing one response. The first id is the
/// primary key; the stored result is copied to the others.
#[derive(Default)]
pub struct StoreRspArgs {
    pub obj_id: Vec<String>,
    pub flags: StoreFlags,
    pub title: Option<String>,
    pub sub_objs: Vec<SubDocArgs>,
    pub next: Option<Box<dyn FnOnce(&Stored) + Send>>,
}

impl StoreRspArgs {
    pub fn new(obj_id: &[&str], flags: StoreFlags) -> Self {
        Self {
            obj_id: obj_id.iter().map(|id| id.to_string()).collect(),
            flags,
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_sub_obj(mut self, sub: SubDocArgs) -> Self {
        self.sub_objs.push(sub);
        self
    }

    pub fn then(mut self, next: impl FnOnce(&Stored) + Send + 'static) -> Self {
        self.next = Some(Box::new(next));
        self
    }
}

impl fmt::Debug for StoreRspArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreRspArgs")
            .field("obj_id", &self.obj_id)
            .field("flags", &self.flags)
            .field("title", &self.title)
            .field("sub_objs", &self.sub_objs)
            .field("next", &self.next.is_some())
            .finish()
    }
}

/// Sub-documents pulled out of a payload and read by their factory
struct SubDocBatch<'a> {
    sub: &'a SubDocArgs,
    factory: Arc<dyn EntityFactory>,
    docs: Value,
}

fn validate(args: &StoreRspArgs, registry: &FactoryRegistry) -> Result<()> {
    if args.obj_id.is_empty() {
        bail!("No id to store the response under");
    }
    let mut seen = HashSet::new();
    for sub in &args.sub_objs {
        registry.require(&sub.factory)?;
        if sub.obj_id.is_empty() {
            bail!("No id to store sub-documents '{}' under", sub.property);
        }
        if !seen.insert(sub.property.as_str()) {
            bail!("Sub-document property '{}' specified more than once", sub.property);
        }
    }
    Ok(())
}

fn parents(payload: &Value) -> Vec<&Value> {
    match payload {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}

/// Collect the embedded documents of `sub.property` and read them through their factory.
/// References below this level are left raw for the nested specs. `None` when every
/// reference is already an id.
fn extract_sub_docs<'a>(
    payload: &Value,
    sub: &'a SubDocArgs,
    registry: &FactoryRegistry,
) -> Result<Option<SubDocBatch<'a>>> {
    let factory = registry.require(&sub.factory)?.clone();

    let mut docs = Vec::new();
    let mut as_list = payload.is_array();
    for parent in parents(payload) {
        match parent.get(&sub.property) {
            Some(doc @ Value::Object(_)) => docs.push(doc.clone()),
            Some(Value::Array(items)) => {
                as_list = true;
                docs.extend(items.iter().filter(|item| item.is_object()).cloned());
            }
            _ => {}
        }
    }
    if docs.is_empty() {
        return Ok(None);
    }

    let raw = if as_list {
        Value::Array(docs)
    } else {
        docs.swap_remove(0)
    };
    let read = factory.read_rsp_object(&raw, &ReadArgs::new())?;
    let docs = keep_ids(raw, read, factory.id_field());
    Ok(Some(SubDocBatch { sub, factory, docs }))
}

/// Carry ids dropped by the read back onto the read documents
fn keep_ids(raw: Value, mut read: Value, id_field: &str) -> Value {
    match (raw, &mut read) {
        (Value::Array(raw_items), Value::Array(read_items)) => {
            for (raw, read) in raw_items.into_iter().zip(read_items.iter_mut()) {
                copy_id(&raw, read, id_field);
            }
        }
        (raw, read) => copy_id(&raw, read, id_field),
    }
    read
}

fn copy_id(raw: &Value, read: &mut Value, id_field: &str) {
    if let (Some(id), Value::Object(map)) = (raw.get(id_field), read) {
        map.entry(id_field.to_string()).or_insert_with(|| id.clone());
    }
}

/// Replace embedded documents in `property` with their ids. Fails on an embedded
/// document without an id.
fn link_sub_docs(payload: &mut Value, property: &str, id_field: &str) -> Result<()> {
    let to_id = |doc: &Value| -> Result<Value> {
        match doc {
            Value::Object(map) => match map.get(id_field) {
                Some(id) if !id.is_null() => Ok(id.clone()),
                _ => bail!("Embedded '{}' document has no '{}' to link by", property, id_field),
            },
            other => Ok(other.clone()),
        }
    };

    let parents: Vec<&mut Value> = match payload {
        Value::Array(items) => items.iter_mut().collect(),
        other => vec![other],
    };
    for parent in parents {
        if let Some(embedded) = parent.get_mut(property) {
            let linked = match &*embedded {
                Value::Array(items) => Value::Array(items.iter().map(to_id).collect::<Result<_>>()?),
                single => to_id(single)?,
            };
            *embedded = linked;
        }
    }
    Ok(())
}

/// Store the normalised parent under the primary key, then copy it to the other keys
fn store_primary(factory: &dyn EntityFactory, payload: Value, args: StoreRspArgs) -> Result<Stored> {
    let StoreRspArgs { obj_id, flags, title, next, .. } = args;
    let Some((primary, secondary)) = obj_id.split_first() else {
        bail!("No id to store the response under");
    };

    let as_list = if flags.do_store_list() {
        true
    } else if flags.do_store_obj() {
        if payload.is_array() {
            bail!("Cannot store an array response as a single {} object", factory.name());
        }
        false
    } else {
        payload.is_array()
    };

    let dup_flags = if flags.intersects(StoreFlags::EXISTING | StoreFlags::OVERWRITE) {
        flags
    } else {
        flags | StoreFlags::OVERWRITE
    };

    let stored = if as_list {
        let entries = match payload {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            single => vec![single],
        };
        let list = factory.set_list(primary, entries, flags, title.as_deref())?;
        for id in secondary {
            factory.duplicate_list(id, primary, dup_flags, title.as_deref())?;
        }
        Stored::List(list)
    } else {
        let Some(obj) = factory.set_obj(primary, payload, flags)? else {
            bail!("{} object '{}' does not exist", factory.name(), primary);
        };
        for id in secondary {
            factory.duplicate_obj(id, primary, dup_flags)?;
        }
        Stored::Obj(obj)
    };

    factory.response_log().event(
        "stored",
        json!({
            "factory": factory.name(),
            "shape": if stored.is_list() { "list" } else { "object" },
            "keys": obj_id,
        }),
    );

    if let Some(next) = next {
        next(&stored);
    }
    Ok(stored)
}

/// Store a read server response. Sub-documents are stored first, depth first, and their
/// parents then reference them by id.
pub fn store_server_rsp(
    factory: &dyn EntityFactory,
    mut payload: Value,
    args: StoreRspArgs,
    registry: &FactoryRegistry,
) -> Result<Stored> {
    validate(&args, registry)?;

    for sub in &args.sub_objs {
        let Some(batch) = extract_sub_docs(&payload, sub, registry)? else {
            continue;
        };
        store_server_rsp(batch.factory.as_ref(), batch.docs, sub.store_args(), registry)?;
        link_sub_docs(&mut payload, &sub.property, batch.factory.id_field())?;
    }

    store_primary(factory, payload, args)
}

/// Like [`store_server_rsp`], with the sub-document stores of one level awaited together
pub async fn store_server_rsp_joined(
    factory: &dyn EntityFactory,
    mut payload: Value,
    args: StoreRspArgs,
    registry: &FactoryRegistry,
) -> Result<Stored> {
    validate(&args, registry)?;

    let mut batches = Vec::new();
    for sub in &args.sub_objs {
        if let Some(batch) = extract_sub_docs(&payload, sub, registry)? {
            batches.push(batch);
        }
    }

    let stores = batches.iter().map(|batch| async move {
        store_server_rsp(batch.factory.as_ref(), batch.docs.clone(), batch.sub.store_args(), registry)
    });
    try_join_all(stores).await?;

    for batch in batches {
        link_sub_docs(&mut payload, &batch.sub.property, batch.factory.id_field())?;
    }

    store_primary(factory, payload, args)
}
