//! Field comparison functions used for sorting
//!
//! Every comparison puts null/undefined values before defined ones. Field-aware variants
//! walk a schema field's model list (inside its `path`) and stop at the first difference.

use crate::schema::{FieldType, Schema};
use crate::sort::CompareFn;
use crate::value::{self, as_number, as_text, is_null_or_undefined, parse_date};
use anyhow::Result;
use serde_json::Value;
use std::cmp::Ordering;
use std::sync::Arc;

fn compare_nulls(a: Option<&Value>, b: Option<&Value>) -> Option<Ordering> {
    match (is_null_or_undefined(a), is_null_or_undefined(b)) {
        (true, true) => Some(Ordering::Equal),
        (true, false) => Some(Ordering::Less),
        (false, true) => Some(Ordering::Greater),
        (false, false) => None,
    }
}

pub fn compare_strings(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    if let Some(order) = compare_nulls(a, b) {
        return order;
    }
    match (a, b) {
        (Some(a), Some(b)) => as_text(a).cmp(&as_text(b)),
        _ => Ordering::Equal,
    }
}

/// Numeric values (including numeric strings) order before anything non-numeric, which
/// falls back to text order
pub fn compare_numbers(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    if let Some(order) = compare_nulls(a, b) {
        return order;
    }
    let numeric = |v: &Value| as_number(v).filter(|n| !n.is_nan());
    match (a, b) {
        (Some(a), Some(b)) => match (numeric(a), numeric(b)) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => as_text(a).cmp(&as_text(b)),
        },
        _ => Ordering::Equal,
    }
}

/// `false` sorts before `true`
pub fn compare_boolean(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    if let Some(order) = compare_nulls(a, b) {
        return order;
    }
    match (a, b) {
        (Some(a), Some(b)) => value::as_bool(a).cmp(&value::as_bool(b)),
        _ => Ordering::Equal,
    }
}

/// Compare by timestamp. Invalid dates sort after valid ones in ascending order and
/// before them when `descending` is set, so they end up last once a descending sort
/// reverses the list.
pub fn compare_dates(a: Option<&Value>, b: Option<&Value>, descending: bool) -> Ordering {
    if let Some(order) = compare_nulls(a, b) {
        return order;
    }
    let invalid_last = if descending { Ordering::Less } else { Ordering::Greater };
    match (a.and_then(parse_date), b.and_then(parse_date)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (None, Some(_)) => invalid_last,
        (Some(_), None) => invalid_last.reverse(),
        (None, None) => Ordering::Equal,
    }
}

/// Compare two values of the given type
pub fn compare_values(field_type: &FieldType, a: Option<&Value>, b: Option<&Value>, descending: bool) -> Ordering {
    match field_type.element() {
        FieldType::Number => compare_numbers(a, b),
        FieldType::Boolean => compare_boolean(a, b),
        FieldType::Date => compare_dates(a, b, descending),
        _ => compare_strings(a, b),
    }
}

fn compare_field_with<F>(schema: &Schema, index: usize, a: &Value, b: &Value, cmp: F) -> Result<Ordering>
where
    F: Fn(Option<&Value>, Option<&Value>) -> Ordering,
{
    let field = schema.field(index)?;
    let order = field
        .model
        .iter()
        .map(|name| {
            let x = field.value_of(a, name).map(|v| schema.resolved(name, v));
            let y = field.value_of(b, name).map(|v| schema.resolved(name, v));
            cmp(x.as_deref(), y.as_deref())
        })
        .find(|order| order.is_ne())
        .unwrap_or(Ordering::Equal);
    Ok(order)
}

pub fn compare_string_fields(schema: &Schema, index: usize, a: &Value, b: &Value) -> Result<Ordering> {
    compare_field_with(schema, index, a, b, compare_strings)
}

pub fn compare_number_fields(schema: &Schema, index: usize, a: &Value, b: &Value) -> Result<Ordering> {
    compare_field_with(schema, index, a, b, compare_numbers)
}

pub fn compare_boolean_fields(schema: &Schema, index: usize, a: &Value, b: &Value) -> Result<Ordering> {
    compare_field_with(schema, index, a, b, compare_boolean)
}

pub fn compare_date_fields(schema: &Schema, index: usize, a: &Value, b: &Value, descending: bool) -> Result<Ordering> {
    compare_field_with(schema, index, a, b, |x, y| compare_dates(x, y, descending))
}

/// Compare using the comparison that matches the field's type
pub fn compare_fields(schema: &Schema, index: usize, a: &Value, b: &Value, descending: bool) -> Result<Ordering> {
    let field_type = schema.field(index)?.field_type.clone();
    compare_field_with(schema, index, a, b, |x, y| compare_values(&field_type, x, y, descending))
}

/// Comparator closure for a field, validated up front
pub fn field_comparator(schema: Arc<Schema>, index: usize, descending: bool) -> Result<CompareFn> {
    let field = schema.field(index)?.clone();
    Ok(Arc::new(move |a: &Value, b: &Value| {
        field
            .model
            .iter()
            .map(|name| {
                let x = field.value_of(a, name).map(|v| schema.resolved(name, v));
                let y = field.value_of(b, name).map(|v| schema.resolved(name, v));
                compare_values(&field.field_type, x.as_deref(), y.as_deref(), descending)
            })
            .find(|order| order.is_ne())
            .unwrap_or(Ordering::Equal)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ModelProp, SchemaField};
    use serde_json::json;

    fn schema() -> Schema {
        let props = vec![
            ModelProp::new(1, "last", FieldType::String),
            ModelProp::new(2, "first", FieldType::String),
            ModelProp::new(3, "when", FieldType::Date),
            ModelProp::new(4, "score", FieldType::Number).with_path("stats"),
        ];
        let mut schema = Schema::new("entry", "ent", props).unwrap();
        schema
            .add_field(SchemaField::new("name", "Name", &["last", "first"], FieldType::String))
            .unwrap();
        schema
            .add_field(SchemaField::new("when", "When", &["when"], FieldType::Date))
            .unwrap();
        schema
            .add_field(SchemaField::new("score", "Score", &["score"], FieldType::Number).with_path("stats"))
            .unwrap();
        schema
    }

    #[test]
    fn test_nulls_sort_first() {
        let defined = json!("a");
        let null = json!(null);
        for cmp in [compare_strings, compare_numbers, compare_boolean] {
            assert_eq!(cmp(None, Some(&defined)), Ordering::Less);
            assert_eq!(cmp(Some(&null), Some(&defined)), Ordering::Less);
            assert_eq!(cmp(Some(&defined), None), Ordering::Greater);
            assert_eq!(cmp(None, Some(&null)), Ordering::Equal);
        }
        assert_eq!(compare_dates(None, Some(&json!("2024-01-01")), true), Ordering::Less);
    }

    #[test]
    fn test_antisymmetry() {
        let pairs = [
            (json!("apple"), json!("banana")),
            (json!(3), json!(12)),
            (json!(false), json!(true)),
        ];
        for (a, b) in &pairs {
            for cmp in [compare_strings, compare_numbers, compare_boolean] {
                assert_eq!(cmp(Some(a), Some(b)), cmp(Some(b), Some(a)).reverse());
                assert_eq!(cmp(Some(a), Some(a)), Ordering::Equal);
            }
        }
        assert_eq!(compare_numbers(Some(&json!(3)), Some(&json!(12))), Ordering::Less);
        assert_eq!(compare_boolean(Some(&json!(false)), Some(&json!(true))), Ordering::Less);
    }

    #[test]
    fn test_mixed_numbers_are_totally_ordered() {
        let values = [json!(2), json!("10"), json!("1x"), json!("abc"), json!(-1.5), json!("NaN")];
        let cmp = |a: &Value, b: &Value| compare_numbers(Some(a), Some(b));

        for a in &values {
            for b in &values {
                assert_eq!(cmp(a, b), cmp(b, a).reverse());
                for c in &values {
                    if cmp(a, b) != Ordering::Greater && cmp(b, c) != Ordering::Greater {
                        assert_ne!(cmp(a, c), Ordering::Greater, "{} <= {} <= {}", a, b, c);
                    }
                }
            }
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(cmp);
        assert_eq!(sorted, vec![json!(-1.5), json!(2), json!("10"), json!("1x"), json!("NaN"), json!("abc")]);
    }

    #[test]
    fn test_embedded_reference_sorts_by_reference_field() {
        let town = Schema::new("town", "twn", vec![ModelProp::new(1, "name", FieldType::String)])
            .and_then(|s| s.with_field(SchemaField::new("name", "Name", &["name"], FieldType::String)))
            .unwrap();
        let props = vec![ModelProp::new(1, "town", FieldType::ObjectId).with_ref(Arc::new(town), 0)];
        let schema = Schema::new("canvass", "cnv", props)
            .and_then(|s| s.with_field(SchemaField::new("town", "Town", &["town"], FieldType::ObjectId)))
            .unwrap();

        let ennis = json!({"town": {"_id": "t9", "name": "Ennis"}});
        let galway = json!({"town": {"_id": "t1", "name": "Galway"}});
        assert_eq!(compare_fields(&schema, 0, &ennis, &galway, false).unwrap(), Ordering::Less);

        let cmp = field_comparator(Arc::new(schema), 0, false).unwrap();
        assert_eq!(cmp(&galway, &ennis), Ordering::Greater);
    }

    #[test]
    fn test_composite_fields_short_circuit() {
        let schema = schema();
        let a = json!({"last": "Smith", "first": "Ann"});
        let b = json!({"last": "Smith", "first": "Bob"});
        let c = json!({"last": "Jones", "first": "Zed"});

        assert_eq!(compare_string_fields(&schema, 0, &a, &b).unwrap(), Ordering::Less);
        assert_eq!(compare_string_fields(&schema, 0, &c, &a).unwrap(), Ordering::Less);
        assert_eq!(compare_string_fields(&schema, 0, &a, &a).unwrap(), Ordering::Equal);
        assert!(compare_string_fields(&schema, 9, &a, &b).is_err());
    }

    #[test]
    fn test_number_fields_with_path() {
        let schema = schema();
        let a = json!({"stats": {"score": 9}});
        let b = json!({"stats": {"score": 10}});
        assert_eq!(compare_number_fields(&schema, 2, &a, &b).unwrap(), Ordering::Less);
        assert_eq!(compare_fields(&schema, 2, &b, &a, false).unwrap(), Ordering::Greater);
    }

    #[test]
    fn test_invalid_dates_end_last_both_directions() {
        let schema = Arc::new(schema());
        let valid_early = json!({"when": "2023-01-01"});
        let valid_late = json!({"when": "2024-06-01"});
        let invalid = json!({"when": "someday"});

        for descending in [false, true] {
            let cmp = field_comparator(schema.clone(), 1, descending).unwrap();
            let mut entries = vec![invalid.clone(), valid_late.clone(), valid_early.clone()];
            entries.sort_by(|a, b| cmp(a, b));
            if descending {
                entries.reverse();
            }
            assert_eq!(entries.last(), Some(&invalid), "descending = {}", descending);
        }

        assert_eq!(
            compare_date_fields(&schema, 1, &valid_early, &valid_late, false).unwrap(),
            Ordering::Less
        );
    }
}
