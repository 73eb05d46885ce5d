//! Entity schema metadata
//!
//! A [`Schema`] pairs an ordered list of UI facing [`SchemaField`]s with the persisted
//! [`ModelProp`]s they map onto. Field order is significant: it drives display order,
//! sort option ids and comparator lookups.

pub mod models;
pub mod read;

pub use models::{FieldType, FilterTest, FilterTransform, ModelProp, SchemaField};
pub use read::{ConvertFn, ReadArgs};

use crate::debug_log::{self, DebugLog};
use crate::sort::{self, SortOption};
use anyhow::{Result, anyhow, bail};
use serde_json::{Map, Value, json};
use std::borrow::Cow;
use std::collections::HashMap;
use std::collections::HashSet;

/// How `Schema::get_filter` initialises each dialog key
pub enum FilterInit<'a> {
    Constant(Value),
    Lookup(&'a HashMap<String, Value>),
    With(&'a dyn Fn(&str) -> Value),
}

#[derive(Debug, Clone, Default)]
pub struct Schema {
    name: String,
    tag: String,
    fields: Vec<SchemaField>,
    model_props: Vec<ModelProp>,
    log: DebugLog,
}

impl Schema {
    pub fn new(name: impl Into<String>, tag: impl Into<String>, model_props: Vec<ModelProp>) -> Result<Self> {
        let name = name.into();
        let mut seen = HashSet::new();
        for prop in &model_props {
            if !seen.insert(prop.id) {
                bail!("Schema '{}' has duplicate model property id {}", name, prop.id);
            }
        }

        Ok(Self {
            name,
            tag: tag.into(),
            fields: Vec::new(),
            model_props,
            log: DebugLog::disabled(debug_log::SCHEMA),
        })
    }

    pub fn with_log(mut self, log: DebugLog) -> Self {
        self.log = log;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn fields(&self) -> &[SchemaField] {
        &self.fields
    }

    pub fn model_props(&self) -> &[ModelProp] {
        &self.model_props
    }

    pub(crate) fn log(&self) -> &DebugLog {
        &self.log
    }

    /// Register a field and return its index
    pub fn add_field(&mut self, mut field: SchemaField) -> Result<usize> {
        if field.model.is_empty() {
            bail!("Field '{}' of schema '{}' maps to no model properties", field.dialog, self.name);
        }
        if let Some(missing) = field.model.iter().find(|m| self.model_prop_by_name(m).is_none()) {
            bail!(
                "Field '{}' of schema '{}' references unknown model property '{}'",
                field.dialog,
                self.name,
                missing
            );
        }
        if self.field_index(&field.dialog).is_some() {
            bail!("Schema '{}' already has a field '{}'", self.name, field.dialog);
        }

        field.id = self.tag.clone();
        self.fields.push(field);
        Ok(self.fields.len() - 1)
    }

    /// Builder form of `add_field`
    pub fn with_field(mut self, field: SchemaField) -> Result<Self> {
        self.add_field(field)?;
        Ok(self)
    }

    pub fn field(&self, index: usize) -> Result<&SchemaField> {
        self.fields
            .get(index)
            .ok_or_else(|| anyhow!("Schema '{}' has no field {}", self.name, index))
    }

    pub fn get_field(&self, index: usize) -> Option<&SchemaField> {
        self.fields.get(index)
    }

    pub fn field_index(&self, dialog: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.dialog == dialog)
    }

    pub fn field_by_dialog(&self, dialog: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.dialog == dialog)
    }

    pub fn for_each_field<F>(&self, mut f: F)
    where
        F: FnMut(usize, &SchemaField),
    {
        for (index, field) in self.fields.iter().enumerate() {
            f(index, field);
        }
    }

    pub fn get_model_prop(&self, id: u32) -> Option<&ModelProp> {
        self.model_props.iter().find(|p| p.id == id)
    }

    pub fn model_prop_by_name(&self, model_name: &str) -> Option<&ModelProp> {
        self.model_props.iter().find(|p| p.model_name == model_name)
    }

    /// `value` of model property `model_name`, with embedded references replaced by the
    /// text of their reference field
    pub fn resolved<'a>(&self, model_name: &str, value: &'a Value) -> Cow<'a, Value> {
        self.model_prop_by_name(model_name)
            .and_then(|prop| prop.resolve_ref(value))
            .map_or(Cow::Borrowed(value), Cow::Owned)
    }

    pub fn for_each_model_prop<F>(&self, mut f: F)
    where
        F: FnMut(&ModelProp),
    {
        for prop in &self.model_props {
            f(prop);
        }
    }

    pub fn dialog_keys(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.dialog.as_str()).collect()
    }

    /// Storage key for a local id
    pub fn key(&self, local_id: &str) -> String {
        format!("{}{}", self.tag, local_id)
    }

    /// Fresh object with every model property at its default value
    pub fn get_object(&self) -> Value {
        let obj: Map<String, Value> = self
            .model_props
            .iter()
            .map(|p| (p.model_name.clone(), p.dflt_value.clone()))
            .collect();
        Value::Object(obj)
    }

    /// Human readable rendering of `obj` using the field display labels
    pub fn stringify(&self, obj: &Value) -> String {
        let parts: Vec<String> = self
            .fields
            .iter()
            .map(|field| {
                let values: Vec<String> = field
                    .model
                    .iter()
                    .filter_map(|name| field.value_of(obj, name).map(|v| self.resolved(name, v)))
                    .filter(|v| !v.is_null())
                    .map(|v| crate::value::as_text(&v).into_owned())
                    .collect();
                format!("{}: {}", field.display, values.join(" "))
            })
            .collect();
        format!("{} {{{}}}", self.name, parts.join(", "))
    }

    /// Filter object keyed by dialog key
    pub fn get_filter(&self, init: FilterInit<'_>) -> Map<String, Value> {
        self.fields
            .iter()
            .map(|field| {
                let value = match &init {
                    FilterInit::Constant(value) => value.clone(),
                    FilterInit::Lookup(lookup) => lookup.get(&field.dialog).cloned().unwrap_or(Value::Null),
                    FilterInit::With(f) => f(&field.dialog),
                };
                (field.dialog.clone(), value)
            })
            .collect()
    }

    /// One sort option per field plus the index option
    pub fn sort_options(&self) -> Vec<SortOption> {
        sort::build_sort_options(self)
    }

    pub(crate) fn trace(&self, event: &str, details: Value) {
        self.log.event(event, json!({"schema": self.name, "details": details}));
    }
}
