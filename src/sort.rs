//! Sort options and comparator resolution

use crate::compare;
use crate::schema::Schema;
use crate::value::as_number;
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

pub type CompareFn = Arc<dyn Fn(&Value, &Value) -> Ordering + Send + Sync>;

/// Picks a comparator for a sort key out of the available options
pub type SortResolver = Arc<dyn Fn(&[SortOption], &str) -> Option<CompareFn> + Send + Sync>;

/// Property stamped on fetched entries with their 1-based arrival order
pub const INDEX_PROPERTY: &str = "index";

const DESCENDING_PREFIX: char = '-';

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortField {
    /// Schema field index
    Field(usize),
    /// Arrival order
    Index,
}

#[derive(Clone, PartialEq, Eq)]
pub struct SortOption {
    pub id: String,
    pub name: String,
    pub field: SortField,
}

impl fmt::Debug for SortOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SortOption({} '{}' {:?})", self.id, self.name, self.field)
    }
}

pub fn build_sort_options(schema: &Schema) -> Vec<SortOption> {
    let mut options: Vec<SortOption> = schema
        .fields()
        .iter()
        .enumerate()
        .map(|(index, field)| SortOption {
            id: format!("{}{}", schema.tag(), index),
            name: field.display.clone(),
            field: SortField::Field(index),
        })
        .collect();
    options.push(SortOption {
        id: format!("{}idx", schema.tag()),
        name: "Index".to_string(),
        field: SortField::Index,
    });
    options
}

pub fn is_descending_sort_order(sort_by: &str) -> bool {
    sort_by.starts_with(DESCENDING_PREFIX)
}

/// Option id and direction of a sort key
pub fn split_sort_by(sort_by: &str) -> (&str, bool) {
    match sort_by.strip_prefix(DESCENDING_PREFIX) {
        Some(id) => (id, true),
        None => (sort_by, false),
    }
}

/// Sort key for an option id in the given direction
pub fn sort_key(id: &str, descending: bool) -> String {
    if descending {
        format!("{}{}", DESCENDING_PREFIX, id)
    } else {
        id.to_string()
    }
}

pub fn compare_index(a: &Value, b: &Value) -> Ordering {
    compare::compare_numbers(a.get(INDEX_PROPERTY), b.get(INDEX_PROPERTY))
}

/// Resolver choosing a comparator by the type of the option's field
pub fn default_sort_resolver(schema: Arc<Schema>) -> SortResolver {
    Arc::new(move |options: &[SortOption], sort_by: &str| {
        let (id, descending) = split_sort_by(sort_by);
        let option = options.iter().find(|o| o.id == id)?;
        match option.field {
            SortField::Index => Some(Arc::new(compare_index) as CompareFn),
            SortField::Field(index) => compare::field_comparator(schema.clone(), index, descending).ok(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldType, ModelProp, SchemaField};
    use serde_json::json;

    fn schema() -> Arc<Schema> {
        let props = vec![
            ModelProp::new(1, "name", FieldType::String),
            ModelProp::new(2, "age", FieldType::Number),
        ];
        let schema = Schema::new("person", "per", props)
            .and_then(|s| s.with_field(SchemaField::new("name", "Name", &["name"], FieldType::String)))
            .and_then(|s| s.with_field(SchemaField::new("age", "Age", &["age"], FieldType::Number)))
            .unwrap();
        Arc::new(schema)
    }

    #[test]
    fn test_sort_options() {
        let options = schema().sort_options();
        let ids: Vec<&str> = options.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["per0", "per1", "peridx"]);
        assert_eq!(options[1].name, "Age");
        assert_eq!(options[2].field, SortField::Index);
    }

    #[test]
    fn test_sort_key_direction() {
        assert!(is_descending_sort_order("-per0"));
        assert!(!is_descending_sort_order("per0"));
        assert_eq!(split_sort_by("-per1"), ("per1", true));
        assert_eq!(sort_key("per1", true), "-per1");
        assert_eq!(sort_key("per1", false), "per1");
    }

    #[test]
    fn test_default_resolver() {
        let schema = schema();
        let options = schema.sort_options();
        let resolve = default_sort_resolver(schema.clone());

        let by_age = resolve(&options, "per1").unwrap();
        assert_eq!(by_age(&json!({"age": 2}), &json!({"age": 10})), Ordering::Less);

        let by_index = resolve(&options, "-peridx").unwrap();
        assert_eq!(by_index(&json!({"index": 3}), &json!({"index": 1})), Ordering::Greater);

        assert!(resolve(&options, "nope").is_none());
    }
}
