//! Resource filters and generic array filtering
//!
//! A [`ResourceFilter`] holds the current criteria for one schema, keyed by dialog field.
//! [`get_filtered_array`] runs the three filtering stages: blank removal, the entity
//! filter, then an optional extra predicate.

use crate::query::{QueryBuilder, QueryParams};
use crate::schema::{FilterTest, FilterTransform, Schema, SchemaField};
use crate::value::{as_text, is_blank, is_null_or_undefined};
use anyhow::{Result, bail};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Per-entity filter over a set of entries
pub type EntityFilterFn = Arc<dyn Fn(&Schema, &[Value], &Map<String, Value>) -> Vec<Value> + Send + Sync>;

/// Replaces generic filtering entirely when registered on a filter
pub type CustomFilterFn = Arc<dyn Fn(&ResourceFilter, &[Value]) -> Vec<Value> + Send + Sync>;

#[derive(Clone)]
pub struct ResourceFilter {
    schema: Arc<Schema>,
    filter_by: Map<String, Value>,
    last_filter: Option<Map<String, Value>>,
    allow_blank: bool,
    custom_function: Option<CustomFilterFn>,
}

impl ResourceFilter {
    /// Filter for `schema`, taking initial criteria from the dialog keys present in `base`
    pub fn new(schema: Arc<Schema>, base: Option<&Map<String, Value>>) -> Self {
        let filter_by = match base {
            Some(base) => schema
                .dialog_keys()
                .into_iter()
                .filter_map(|key| base.get(key).map(|v| (key.to_string(), v.clone())))
                .collect(),
            None => Map::new(),
        };

        Self {
            schema,
            filter_by,
            last_filter: None,
            allow_blank: true,
            custom_function: None,
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn filter_by(&self) -> &Map<String, Value> {
        &self.filter_by
    }

    pub fn set_filter_by(&mut self, key: &str, value: Value) -> Result<()> {
        if self.schema.field_index(key).is_none() {
            bail!("Schema '{}' has no dialog field '{}' to filter by", self.schema.name(), key);
        }
        self.filter_by.insert(key.to_string(), value);
        Ok(())
    }

    /// Replace all criteria
    pub fn set_filter(&mut self, filter_by: Map<String, Value>) -> Result<()> {
        if let Some(key) = filter_by.keys().find(|k| self.schema.field_index(k).is_none()) {
            bail!("Schema '{}' has no dialog field '{}' to filter by", self.schema.name(), key);
        }
        self.filter_by = filter_by;
        Ok(())
    }

    pub fn clear_filter(&mut self) {
        self.filter_by.clear();
    }

    /// True when no criterion has a value
    pub fn is_empty(&self) -> bool {
        self.filter_by.values().all(|v| is_blank(Some(v)))
    }

    pub fn last_filter(&self) -> Option<&Map<String, Value>> {
        self.last_filter.as_ref()
    }

    pub(crate) fn remember(&mut self) {
        self.last_filter = Some(self.filter_by.clone());
    }

    pub fn allow_blank(&self) -> bool {
        self.allow_blank
    }

    pub fn set_allow_blank(&mut self, allow_blank: bool) {
        self.allow_blank = allow_blank;
    }

    pub fn custom_function(&self) -> Option<&CustomFilterFn> {
        self.custom_function.as_ref()
    }

    pub fn set_custom_function(&mut self, custom: Option<CustomFilterFn>) {
        self.custom_function = custom;
    }

    /// Query parameters for the current criteria
    pub fn to_query(&self, builder: &QueryBuilder) -> QueryParams {
        builder.build_query_from(self.schema.fields(), &self.filter_by)
    }
}

impl fmt::Debug for ResourceFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceFilter")
            .field("schema", &self.schema.name())
            .field("filter_by", &self.filter_by)
            .field("last_filter", &self.last_filter)
            .field("allow_blank", &self.allow_blank)
            .field("custom_function", &self.custom_function.is_some())
            .finish()
    }
}

impl Default for ResourceFilter {
    fn default() -> Self {
        Self::new(Arc::new(Schema::default()), None)
    }
}

fn transform_for<'a>(schema: &'a Schema, field: &'a SchemaField, model_name: &str) -> Option<&'a FilterTransform> {
    field
        .filter_transform
        .as_ref()
        .or_else(|| schema.model_prop_by_name(model_name)?.filter_transform.as_ref())
}

fn test_for<'a>(schema: &'a Schema, field: &'a SchemaField, model_name: &str) -> Option<&'a FilterTest> {
    field
        .filter_test
        .as_ref()
        .or_else(|| schema.model_prop_by_name(model_name)?.filter_test.as_ref())
}

fn field_matches(schema: &Schema, field: &SchemaField, entry: &Value, filter_value: &Value) -> bool {
    field.model.iter().any(|name| {
        let value = match field.value_of(entry, name) {
            Some(value) if !is_null_or_undefined(Some(value)) => schema.resolved(name, value),
            _ => return false,
        };
        let value = value.as_ref();

        if let Some(test) = test_for(schema, field, name) {
            return test.test(value, filter_value);
        }

        let (value, wanted) = match transform_for(schema, field, name) {
            Some(transform) => (transform.apply(value), transform.apply(filter_value)),
            None => (value.clone(), filter_value.clone()),
        };
        as_text(&value).to_lowercase().contains(&as_text(&wanted).to_lowercase())
    })
}

/// True when every criterion with a value matches at least one of its field's model values
pub fn matches_filter(schema: &Schema, entry: &Value, filter_by: &Map<String, Value>) -> bool {
    let mut tested = 0;
    let mut matched = 0;

    for field in schema.fields() {
        let Some(filter_value) = filter_by.get(&field.dialog) else {
            continue;
        };
        if is_blank(Some(filter_value)) {
            continue;
        }
        tested += 1;
        if field_matches(schema, field, entry, filter_value) {
            matched += 1;
        }
    }

    matched == tested
}

/// Case-insensitive substring match, OR across a field's model values and AND across fields
pub fn default_entity_filter(schema: &Schema, entries: &[Value], filter_by: &Map<String, Value>) -> Vec<Value> {
    entries
        .iter()
        .filter(|entry| matches_filter(schema, entry, filter_by))
        .cloned()
        .collect()
}

/// True when every model value of every field is empty
pub fn is_blank_entry(schema: &Schema, entry: &Value) -> bool {
    schema
        .fields()
        .iter()
        .all(|field| field.values(entry).into_iter().all(is_blank))
}

/// Filter `entries` with `filter`'s criteria. Each stage only runs when the previous one
/// left something over.
pub fn get_filtered_array(
    filter: &ResourceFilter,
    entries: &[Value],
    entity_filter: Option<&EntityFilterFn>,
    extra: Option<&dyn Fn(&Value) -> bool>,
) -> Vec<Value> {
    let schema: &Schema = filter.schema();

    let mut result: Vec<Value> = if filter.allow_blank() {
        entries.to_vec()
    } else {
        entries.iter().filter(|e| !is_blank_entry(schema, e)).cloned().collect()
    };

    if !result.is_empty() {
        result = match entity_filter {
            Some(entity_filter) => entity_filter(schema, &result, filter.filter_by()),
            None => default_entity_filter(schema, &result, filter.filter_by()),
        };
    }

    if let Some(extra) = extra {
        if !result.is_empty() {
            result.retain(|entry| extra(entry));
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldType, ModelProp};
    use serde_json::json;

    fn schema() -> Arc<Schema> {
        let props = vec![
            ModelProp::new(1, "addrLine1", FieldType::String),
            ModelProp::new(2, "addrLine2", FieldType::String),
            ModelProp::new(3, "town", FieldType::String),
            ModelProp::new(4, "phone", FieldType::String)
                .with_filter_transform(FilterTransform::new(|v| json!(as_text(v).replace(' ', "")))),
        ];
        let schema = Schema::new("address", "addr", props)
            .and_then(|s| s.with_field(SchemaField::new("addr", "Address", &["addrLine1", "addrLine2"], FieldType::String)))
            .and_then(|s| s.with_field(SchemaField::new("town", "Town", &["town"], FieldType::String)))
            .and_then(|s| s.with_field(SchemaField::new("phone", "Phone", &["phone"], FieldType::String)))
            .unwrap();
        Arc::new(schema)
    }

    fn entries() -> Vec<Value> {
        vec![
            json!({"addrLine1": "1 Main St", "addrLine2": "Old Quarter", "town": "Ennis"}),
            json!({"addrLine1": "2 High St", "addrLine2": "", "town": "Galway", "phone": "061 123"}),
            json!({"addrLine1": "3 Quay Rd", "addrLine2": "Main Square", "town": "Ennistymon"}),
            json!({"addrLine1": "", "addrLine2": "", "town": ""}),
        ]
    }

    fn filter_of(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_embedded_reference_matches_on_reference_field() {
        let town = Schema::new("town", "twn", vec![ModelProp::new(1, "name", FieldType::String)])
            .and_then(|s| s.with_field(SchemaField::new("name", "Name", &["name"], FieldType::String)))
            .unwrap();
        let props = vec![
            ModelProp::new(1, "name", FieldType::String),
            ModelProp::new(2, "town", FieldType::ObjectId).with_ref(Arc::new(town), 0),
        ];
        let schema = Schema::new("canvass", "cnv", props)
            .and_then(|s| s.with_field(SchemaField::new("town", "Town", &["town"], FieldType::ObjectId)))
            .unwrap();

        let entries = vec![
            json!({"name": "a", "town": {"_id": "t1", "name": "Ennis"}}),
            json!({"name": "b", "town": {"_id": "t2", "name": "Galway"}}),
            json!({"name": "c", "town": "t1"}),
        ];
        let filtered = default_entity_filter(&schema, &entries, &filter_of(json!({"town": "ennis"})));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0]["name"], json!("a"));

        let by_id = default_entity_filter(&schema, &entries, &filter_of(json!({"town": "t1"})));
        assert_eq!(by_id.len(), 1);
        assert_eq!(by_id[0]["name"], json!("c"));
    }

    #[test]
    fn test_new_copies_only_dialog_keys() {
        let base = filter_of(json!({"town": "Ennis", "unknown": 1}));
        let filter = ResourceFilter::new(schema(), Some(&base));
        assert_eq!(filter.filter_by(), &filter_of(json!({"town": "Ennis"})));
        assert!(filter.allow_blank());
    }

    #[test]
    fn test_set_filter_by_validates_key() {
        let mut filter = ResourceFilter::new(schema(), None);
        assert!(filter.set_filter_by("town", json!("x")).is_ok());
        assert!(filter.set_filter_by("county", json!("x")).is_err());
        assert!(filter.set_filter(filter_of(json!({"nope": 1}))).is_err());
    }

    #[test]
    fn test_or_within_field_and_across_fields() {
        let schema = schema();
        let any_main = filter_of(json!({"addr": "MAIN"}));
        let filtered = default_entity_filter(&schema, &entries(), &any_main);
        assert_eq!(filtered.len(), 2);

        let main_in_ennis = filter_of(json!({"addr": "main", "town": "ennis"}));
        let filtered = default_entity_filter(&schema, &entries(), &main_in_ennis);
        assert_eq!(filtered.len(), 2);

        let main_in_galway = filter_of(json!({"addr": "main", "town": "galway"}));
        assert!(default_entity_filter(&schema, &entries(), &main_in_galway).is_empty());
    }

    #[test]
    fn test_filter_is_idempotent() {
        let schema = schema();
        let criteria = filter_of(json!({"town": "enn"}));
        let once = default_entity_filter(&schema, &entries(), &criteria);
        let twice = default_entity_filter(&schema, &once, &criteria);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_transform_from_model_prop() {
        let schema = schema();
        let criteria = filter_of(json!({"phone": "061123"}));
        let filtered = default_entity_filter(&schema, &entries(), &criteria);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0]["town"], json!("Galway"));
    }

    #[test]
    fn test_field_test_takes_precedence() {
        let props = vec![ModelProp::new(1, "count", FieldType::Number)];
        let schema = Schema::new("tally", "tl", props)
            .and_then(|s| {
                s.with_field(
                    SchemaField::new("count", "Count", &["count"], FieldType::Number)
                        .with_filter_test(FilterTest::new(|entry, wanted| {
                            crate::value::as_number(entry) >= crate::value::as_number(wanted)
                        })),
                )
            })
            .unwrap();
        let items = vec![json!({"count": 2}), json!({"count": 12})];
        let filtered = default_entity_filter(&schema, &items, &filter_of(json!({"count": 10})));
        assert_eq!(filtered, vec![json!({"count": 12})]);
    }

    #[test]
    fn test_empty_filter_and_blank_removal() {
        let mut filter = ResourceFilter::new(schema(), None);
        assert!(filter.is_empty());
        assert_eq!(get_filtered_array(&filter, &entries(), None, None).len(), 4);

        filter.set_allow_blank(false);
        assert_eq!(get_filtered_array(&filter, &entries(), None, None).len(), 3);
    }

    #[test]
    fn test_stages_and_extra_predicate() {
        let mut filter = ResourceFilter::new(schema(), None);
        filter.set_filter_by("town", json!("enn")).unwrap();

        let only_main: &dyn Fn(&Value) -> bool = &|e| as_text(&e["addrLine1"]).contains("Main");
        let filtered = get_filtered_array(&filter, &entries(), None, Some(only_main));
        assert_eq!(filtered.len(), 1);

        let custom: EntityFilterFn = Arc::new(|_schema: &Schema, entries: &[Value], _filter: &Map<String, Value>| {
            entries.iter().take(1).cloned().collect()
        });
        let filtered = get_filtered_array(&filter, &entries(), Some(&custom), None);
        assert_eq!(filtered.len(), 1);
    }

    #[test]
    fn test_to_query() {
        let mut filter = ResourceFilter::new(schema(), None);
        filter.set_filter_by("addr", json!("main")).unwrap();
        let params = filter.to_query(&QueryBuilder::new());
        assert_eq!(params.get("addrLine1|addrLine2"), Some(&"main".to_string()));
    }
}
