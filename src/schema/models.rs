//! Schema metadata models

use super::Schema;
use crate::value;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Value types of model properties and schema fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    String,
    Date,
    Boolean,
    Number,
    Object,
    ObjectId,
    Array(Box<FieldType>),
}

impl FieldType {
    pub fn array_of(element: FieldType) -> Self {
        Self::Array(Box::new(element))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Self::Array(_))
    }

    /// Element type for arrays, the type itself otherwise
    pub fn element(&self) -> &FieldType {
        match self {
            Self::Array(inner) => inner.element(),
            other => other,
        }
    }

    pub fn default_value(&self) -> Value {
        match self {
            Self::String => Value::String(String::new()),
            Self::Boolean => Value::Bool(false),
            Self::Array(_) => Value::Array(Vec::new()),
            _ => Value::Null,
        }
    }
}

/// Normalises a value before it is matched against a filter
#[derive(Clone)]
pub struct FilterTransform(Arc<dyn Fn(&Value) -> Value + Send + Sync>);

/// Custom match of an entry value against a filter value
#[derive(Clone)]
pub struct FilterTest(Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>);

impl FilterTransform {
    pub fn new(f: impl Fn(&Value) -> Value + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn apply(&self, value: &Value) -> Value {
        (self.0)(value)
    }
}

impl FilterTest {
    pub fn new(f: impl Fn(&Value, &Value) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn test(&self, entry_value: &Value, filter_value: &Value) -> bool {
        (self.0)(entry_value, filter_value)
    }
}

impl fmt::Debug for FilterTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FilterTransform")
    }
}

impl fmt::Debug for FilterTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FilterTest")
    }
}

/// Raw persisted field of an entity
#[derive(Debug, Clone)]
pub struct ModelProp {
    /// Stable key joining schema fields to model properties
    pub id: u32,
    pub model_name: String,
    /// Dot path in the payload to the object holding this property
    pub model_path: Option<String>,
    /// Factory owning the referenced entity, for reference properties
    pub factory: Option<String>,
    pub dflt_value: Value,
    pub field_type: FieldType,
    pub filter_transform: Option<FilterTransform>,
    pub filter_test: Option<FilterTest>,
    pub ref_schema: Option<Arc<Schema>>,
    pub ref_field: Option<usize>,
}

impl ModelProp {
    pub fn new(id: u32, model_name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            id,
            model_name: model_name.into(),
            model_path: None,
            factory: None,
            dflt_value: field_type.default_value(),
            field_type,
            filter_transform: None,
            filter_test: None,
            ref_schema: None,
            ref_field: None,
        }
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.dflt_value = value;
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.model_path = Some(path.into());
        self
    }

    /// Mark as a reference to entities owned by `factory`
    pub fn with_factory(mut self, factory: impl Into<String>) -> Self {
        self.factory = Some(factory.into());
        self
    }

    /// Resolve embedded documents of this property through field `field` of `schema`
    pub fn with_ref(mut self, schema: Arc<Schema>, field: usize) -> Self {
        self.ref_schema = Some(schema);
        self.ref_field = Some(field);
        self
    }

    pub fn with_filter_transform(mut self, transform: FilterTransform) -> Self {
        self.filter_transform = Some(transform);
        self
    }

    pub fn with_filter_test(mut self, test: FilterTest) -> Self {
        self.filter_test = Some(test);
        self
    }

    pub fn is_reference(&self) -> bool {
        self.factory.is_some()
    }

    /// Text of the reference field for an embedded document (or array of them). `None`
    /// for plain ids and when no reference schema is set.
    pub fn resolve_ref(&self, embedded: &Value) -> Option<Value> {
        let field = self.ref_schema.as_ref()?.get_field(self.ref_field?)?;
        let text = |doc: &Value| -> String {
            if !doc.is_object() {
                return value::as_text(doc).into_owned();
            }
            field
                .values(doc)
                .into_iter()
                .flatten()
                .filter(|v| !v.is_null())
                .map(|v| value::as_text(v).into_owned())
                .collect::<Vec<_>>()
                .join(" ")
        };

        match embedded {
            Value::Object(_) => Some(Value::String(text(embedded))),
            Value::Array(items) if items.iter().any(Value::is_object) => {
                Some(Value::String(items.iter().map(text).collect::<Vec<_>>().join(", ")))
            }
            _ => None,
        }
    }
}

/// UI facing field, mapping a dialog key onto one or more model properties
#[derive(Debug, Clone)]
pub struct SchemaField {
    pub dialog: String,
    pub display: String,
    /// Model property names, in comparison order
    pub model: Vec<String>,
    pub field_type: FieldType,
    /// Dot path prefix into a nested object
    pub path: Option<String>,
    /// Tag of the owning schema, stamped by `Schema::add_field`
    pub id: String,
    pub filter_transform: Option<FilterTransform>,
    pub filter_test: Option<FilterTest>,
}

impl SchemaField {
    pub fn new(dialog: impl Into<String>, display: impl Into<String>, model: &[&str], field_type: FieldType) -> Self {
        Self {
            dialog: dialog.into(),
            display: display.into(),
            model: model.iter().map(|m| m.to_string()).collect(),
            field_type,
            path: None,
            id: String::new(),
            filter_transform: None,
            filter_test: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_filter_transform(mut self, transform: FilterTransform) -> Self {
        self.filter_transform = Some(transform);
        self
    }

    pub fn with_filter_test(mut self, test: FilterTest) -> Self {
        self.filter_test = Some(test);
        self
    }

    pub fn is_composite(&self) -> bool {
        self.model.len() > 1
    }

    /// Value of one of this field's model properties on `obj`
    pub fn value_of<'a>(&self, obj: &'a Value, model_name: &str) -> Option<&'a Value> {
        value::lookup(obj, self.path.as_deref(), model_name)
    }

    /// Values of every model property on `obj`, in model order
    pub fn values<'a>(&self, obj: &'a Value) -> Vec<Option<&'a Value>> {
        self.model.iter().map(|name| self.value_of(obj, name)).collect()
    }

    /// Query/wire key for a model name, including the path prefix
    pub fn qualified_name(&self, model_name: &str) -> String {
        match &self.path {
            Some(path) => format!("{}.{}", path, model_name),
            None => model_name.to_string(),
        }
    }
}
