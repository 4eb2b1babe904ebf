//! Filter evaluation and value ordering over JSON documents.

use regex::RegexBuilder;
use serde_json::Value;
use std::cmp::Ordering;
use strata_data::{Condition, DataError, Document, Filter, Sort, SortOrder};

/// Resolve a dotted path (`"author.name"`) inside a document.
pub fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = document.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

pub fn matches(filter: &Filter, document: &Document) -> Result<bool, DataError> {
    for condition in filter.conditions() {
        if !matches_condition(condition, document)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn matches_condition(condition: &Condition, document: &Document) -> Result<bool, DataError> {
    let result = match condition {
        Condition::Eq(field, expected) => match lookup(document, field) {
            None => expected.is_null(),
            Some(actual) => loosely_equal(actual, expected),
        },
        Condition::NotEq(field, expected) => match lookup(document, field) {
            None => !expected.is_null(),
            Some(actual) => !loosely_equal(actual, expected),
        },
        Condition::Gt(field, bound) => compare_field(document, field, bound, |o| o == Ordering::Greater),
        Condition::Gte(field, bound) => compare_field(document, field, bound, |o| o != Ordering::Less),
        Condition::Lt(field, bound) => compare_field(document, field, bound, |o| o == Ordering::Less),
        Condition::Lte(field, bound) => compare_field(document, field, bound, |o| o != Ordering::Greater),
        Condition::In(field, candidates) => {
            let actual = lookup(document, field).unwrap_or(&Value::Null);
            candidates.iter().any(|c| loosely_equal(actual, c))
        }
        Condition::IsNull(field) => lookup(document, field).map_or(true, Value::is_null),
        Condition::IsNotNull(field) => lookup(document, field).is_some_and(|v| !v.is_null()),
        Condition::Matches {
            field,
            pattern,
            case_insensitive,
        } => {
            let re = RegexBuilder::new(pattern)
                .case_insensitive(*case_insensitive)
                .build()
                .map_err(|e| DataError::InvalidQuery(e.to_string()))?;
            match lookup(document, field) {
                Some(Value::String(s)) => re.is_match(s),
                Some(Value::Array(items)) => items
                    .iter()
                    .any(|v| v.as_str().is_some_and(|s| re.is_match(s))),
                _ => false,
            }
        }
        Condition::Or(alternatives) => {
            for alternative in alternatives {
                if matches(alternative, document)? {
                    return Ok(true);
                }
            }
            false
        }
    };
    Ok(result)
}

/// Equality where an array field matches if any element equals the value.
fn loosely_equal(actual: &Value, expected: &Value) -> bool {
    if values_equal(actual, expected) {
        return true;
    }
    match actual {
        Value::Array(items) if !expected.is_array() => items.iter().any(|v| values_equal(v, expected)),
        _ => false,
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn compare_field(document: &Document, field: &str, bound: &Value, accept: impl Fn(Ordering) -> bool) -> bool {
    match lookup(document, field) {
        Some(actual) if same_kind(actual, bound) => accept(compare_values(actual, bound)),
        _ => false,
    }
}

fn same_kind(a: &Value, b: &Value) -> bool {
    type_rank(a) == type_rank(b)
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Object(_) => 3,
        Value::Array(_) => 4,
        Value::Bool(_) => 5,
    }
}

/// Total order over JSON values: null < numbers < strings < objects < arrays < booleans.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (l, r) in x.iter().zip(y.iter()) {
                let ord = compare_values(l, r);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

pub fn sort_documents(documents: &mut [Document], sort: &Sort) {
    if sort.is_empty() {
        return;
    }
    documents.sort_by(|a, b| {
        for (field, order) in sort.keys() {
            let left = lookup(a, field).unwrap_or(&Value::Null);
            let right = lookup(b, field).unwrap_or(&Value::Null);
            let ord = compare_values(left, right);
            let ord = match order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

pub fn project(document: &Document, fields: &[String], id_field: &str) -> Document {
    document
        .iter()
        .filter(|(k, _)| k.as_str() == id_field || fields.iter().any(|f| f == *k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_null_matches_missing_field() {
        let d = doc(json!({ "name": "a" }));
        assert!(matches(&Filter::new().where_null("deletedAt"), &d).unwrap());
        assert!(matches(&Filter::new().where_eq("deletedAt", Value::Null), &d).unwrap());
        assert!(!matches(&Filter::new().where_not_null("deletedAt"), &d).unwrap());
    }

    #[test]
    fn test_comparisons_require_same_kind() {
        let d = doc(json!({ "stock": 5, "name": "b" }));
        assert!(matches(&Filter::new().where_gt("stock", 4), &d).unwrap());
        assert!(matches(&Filter::new().where_lte("stock", 5.0), &d).unwrap());
        assert!(!matches(&Filter::new().where_gt("stock", "4"), &d).unwrap());
        assert!(matches(&Filter::new().where_lt("name", "c"), &d).unwrap());
    }

    #[test]
    fn test_or_and_regex() {
        let d = doc(json!({ "name": "Desk Lamp", "tags": ["office", "light"] }));
        let f = Filter::new().or(vec![
            Filter::new().where_contains("sku", "lamp", true),
            Filter::new().where_contains("name", "lamp", true),
        ]);
        assert!(matches(&f, &d).unwrap());
        assert!(!matches(&Filter::new().where_contains("name", "lamp", false), &d).unwrap());
        assert!(matches(&Filter::new().where_eq("tags", "light"), &d).unwrap());
        assert!(!matches(&Filter::new().or(vec![]), &d).unwrap());
    }

    #[test]
    fn test_invalid_pattern_is_an_error() {
        let d = doc(json!({ "name": "x" }));
        let err = matches(&Filter::new().where_matches("name", "(", false), &d).unwrap_err();
        assert!(matches!(err, DataError::InvalidQuery(_)));
    }

    #[test]
    fn test_dotted_lookup_and_sort() {
        let mut docs = vec![
            doc(json!({ "id": "1", "meta": { "rank": 2 } })),
            doc(json!({ "id": "2", "meta": { "rank": 1 } })),
            doc(json!({ "id": "3" })),
        ];
        sort_documents(&mut docs, &Sort::asc("meta.rank"));
        let ids: Vec<_> = docs.iter().map(|d| d["id"].clone()).collect();
        assert_eq!(ids, vec![json!("3"), json!("2"), json!("1")]);
    }
}
