//! Builds query parameters from schema fields and filter values

use super::ops::MultiOp;
use super::query::Query;
use crate::config::QuerySettings;
use crate::schema::SchemaField;
use crate::value::as_text;
use serde_json::{Map, Value};
use std::collections::HashMap;

pub type QueryParams = HashMap<String, String>;

#[derive(Debug, Clone, PartialEq)]
pub struct QueryBuilder {
    join: String,
    pair_separator: String,
    assign: String,
}

impl Default for QueryBuilder {
    fn default() -> Self {
        Self::from_config(&QuerySettings::default())
    }
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(settings: &QuerySettings) -> Self {
        Self {
            join: settings.join.clone(),
            pair_separator: settings.pair_separator.clone(),
            assign: settings.assign.clone(),
        }
    }

    pub fn with_join(mut self, join: impl Into<String>) -> Self {
        self.join = join.into();
        self
    }

    pub fn join(&self) -> &str {
        &self.join
    }

    /// Parameter key of a field; composite fields join their model names for OR matching
    pub fn field_key(&self, field: &SchemaField) -> String {
        field
            .model
            .iter()
            .map(|name| field.qualified_name(name))
            .collect::<Vec<_>>()
            .join(&self.join)
    }

    /// One parameter per field with a defined, non-null value from `lookup`
    pub fn build_query<'a, I, F>(&self, fields: I, lookup: F) -> QueryParams
    where
        I: IntoIterator<Item = &'a SchemaField>,
        F: Fn(&str) -> Option<Value>,
    {
        fields
            .into_iter()
            .filter_map(|field| match lookup(&field.dialog) {
                None | Some(Value::Null) => None,
                Some(value) => Some((self.field_key(field), as_text(&value).into_owned())),
            })
            .collect()
    }

    /// `build_query` over a filter object keyed by dialog key
    pub fn build_query_from<'a, I>(&self, fields: I, filter: &Map<String, Value>) -> QueryParams
    where
        I: IntoIterator<Item = &'a SchemaField>,
    {
        self.build_query(fields, |key| filter.get(key).cloned())
    }

    /// Append `field=value` to the multi-value parameter `key`
    pub fn add_multi_value(&self, params: &mut QueryParams, key: &str, field: &str, value: &Value) {
        let pair = format!("{}{}{}", field, self.assign, as_text(value));
        params
            .entry(key.to_string())
            .and_modify(|existing| {
                existing.push_str(&self.pair_separator);
                existing.push_str(&pair);
            })
            .or_insert(pair);
    }

    /// Single `or`/`and`/`nor` parameter accumulating every field with a value
    pub fn build_multi_value_query<'a, I, F>(&self, op: MultiOp, fields: I, lookup: F) -> QueryParams
    where
        I: IntoIterator<Item = &'a SchemaField>,
        F: Fn(&str) -> Option<Value>,
    {
        let mut params = QueryParams::new();
        for field in fields {
            match lookup(&field.dialog) {
                None | Some(Value::Null) => continue,
                Some(value) => self.add_multi_value(&mut params, op.key(), &self.field_key(field), &value),
            }
        }
        params
    }

    /// Query for `resource` with the params built from `filter`
    pub fn query_for<'a, I>(&self, resource: &str, fields: I, filter: &Map<String, Value>) -> Query
    where
        I: IntoIterator<Item = &'a SchemaField>,
    {
        Query::new(resource).params(self.build_query_from(fields, filter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldType;
    use serde_json::json;

    fn fields() -> Vec<SchemaField> {
        vec![
            SchemaField::new("addr", "Address", &["addrLine1", "addrLine2"], FieldType::String),
            SchemaField::new("town", "Town", &["town"], FieldType::String),
            SchemaField::new("county", "County", &["county"], FieldType::String).with_path("region"),
        ]
    }

    #[test]
    fn test_single_valued_query() {
        let builder = QueryBuilder::new();
        let fields = fields();
        let filter = json!({"addr": "Main", "town": null, "county": "Clare"});
        let filter = filter.as_object().unwrap();

        let params = builder.build_query_from(&fields, filter);
        assert_eq!(params.len(), 2);
        assert_eq!(params.get("addrLine1|addrLine2"), Some(&"Main".to_string()));
        assert_eq!(params.get("region.county"), Some(&"Clare".to_string()));
    }

    #[test]
    fn test_lookup_function_and_custom_join() {
        let builder = QueryBuilder::new().with_join("~");
        let fields = fields();
        let params = builder.build_query(&fields, |key| (key == "addr").then(|| json!(12)));

        assert_eq!(params.len(), 1);
        assert_eq!(params.get("addrLine1~addrLine2"), Some(&"12".to_string()));
    }

    #[test]
    fn test_multi_value_query() {
        let builder = QueryBuilder::new();
        let fields = fields();
        let params = builder.build_multi_value_query(MultiOp::Or, &fields, |key| match key {
            "town" => Some(json!("Ennis")),
            "county" => Some(json!("Clare")),
            _ => None,
        });

        assert_eq!(params.len(), 1);
        assert_eq!(params.get("or"), Some(&"town=Ennis,region.county=Clare".to_string()));
    }

    #[test]
    fn test_query_for_resource() {
        let builder = QueryBuilder::from_config(&QuerySettings::default());
        let fields = fields();
        let filter = json!({"town": "Ennis"});
        let query = builder.query_for("address", &fields, filter.as_object().unwrap());

        assert_eq!(query.resource, "address");
        assert_eq!(query.params.get("town"), Some(&"Ennis".to_string()));
    }
}
