use crate::entity::Document;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A fluent filter builder. All conditions are conjoined; use [`Filter::or`]
/// for disjunctions.
///
/// # Example
///
/// ```ignore
/// let f = Filter::new()
///     .where_eq("status", "active")
///     .where_gt("stock", 0)
///     .or(vec![
///         Filter::new().where_contains("name", "lamp", true),
///         Filter::new().where_contains("sku", "lamp", true),
///     ]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    conditions: Vec<Condition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Condition {
    Eq(String, Value),
    NotEq(String, Value),
    Gt(String, Value),
    Gte(String, Value),
    Lt(String, Value),
    Lte(String, Value),
    In(String, Vec<Value>),
    /// Field absent or null.
    IsNull(String),
    IsNotNull(String),
    /// Regular-expression match on a string field.
    Matches {
        field: String,
        pattern: String,
        case_insensitive: bool,
    },
    Or(Vec<Filter>),
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Equality on every key of the document.
    pub fn from_document(document: &Document) -> Self {
        document
            .iter()
            .fold(Self::new(), |f, (k, v)| f.where_eq(k, v.clone()))
    }

    pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.conditions
            .push(Condition::Eq(field.to_string(), value.into()));
        self
    }

    pub fn where_not_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.conditions
            .push(Condition::NotEq(field.to_string(), value.into()));
        self
    }

    pub fn where_gt(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.conditions
            .push(Condition::Gt(field.to_string(), value.into()));
        self
    }

    pub fn where_gte(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.conditions
            .push(Condition::Gte(field.to_string(), value.into()));
        self
    }

    pub fn where_lt(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.conditions
            .push(Condition::Lt(field.to_string(), value.into()));
        self
    }

    pub fn where_lte(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.conditions
            .push(Condition::Lte(field.to_string(), value.into()));
        self
    }

    pub fn where_in<V: Into<Value>>(mut self, field: &str, values: impl IntoIterator<Item = V>) -> Self {
        self.conditions.push(Condition::In(
            field.to_string(),
            values.into_iter().map(Into::into).collect(),
        ));
        self
    }

    pub fn where_null(mut self, field: &str) -> Self {
        self.conditions.push(Condition::IsNull(field.to_string()));
        self
    }

    pub fn where_not_null(mut self, field: &str) -> Self {
        self.conditions.push(Condition::IsNotNull(field.to_string()));
        self
    }

    pub fn where_matches(mut self, field: &str, pattern: &str, case_insensitive: bool) -> Self {
        self.conditions.push(Condition::Matches {
            field: field.to_string(),
            pattern: pattern.to_string(),
            case_insensitive,
        });
        self
    }

    /// Substring match; `term` is escaped so it is matched literally.
    pub fn where_contains(self, field: &str, term: &str, case_insensitive: bool) -> Self {
        self.where_matches(field, &regex::escape(term), case_insensitive)
    }

    pub fn or(mut self, alternatives: Vec<Filter>) -> Self {
        self.conditions.push(Condition::Or(alternatives));
        self
    }

    /// Conjoin every condition of `other` onto this filter.
    pub fn and(mut self, other: Filter) -> Self {
        self.conditions.extend(other.conditions);
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Whether any top-level condition constrains `field`.
    pub fn mentions(&self, field: &str) -> bool {
        self.conditions.iter().any(|c| c.field() == Some(field))
    }
}

impl Condition {
    pub fn field(&self) -> Option<&str> {
        match self {
            Condition::Eq(f, _)
            | Condition::NotEq(f, _)
            | Condition::Gt(f, _)
            | Condition::Gte(f, _)
            | Condition::Lt(f, _)
            | Condition::Lte(f, _)
            | Condition::In(f, _)
            | Condition::IsNull(f)
            | Condition::IsNotNull(f) => Some(f),
            Condition::Matches { field, .. } => Some(field),
            Condition::Or(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// An ordered list of sort keys.
///
/// Serializes as its string form: comma-separated field names, descending
/// keys prefixed with `-` (e.g. `"-createdAt,name"`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Sort(Vec<(String, SortOrder)>);

impl Sort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn asc(field: &str) -> Self {
        Self::new().then_asc(field)
    }

    pub fn desc(field: &str) -> Self {
        Self::new().then_desc(field)
    }

    pub fn then_asc(mut self, field: &str) -> Self {
        self.0.push((field.to_string(), SortOrder::Asc));
        self
    }

    pub fn then_desc(mut self, field: &str) -> Self {
        self.0.push((field.to_string(), SortOrder::Desc));
        self
    }

    /// Parse `"-createdAt,name"` style sort strings. Blank segments are ignored.
    pub fn parse(input: &str) -> Self {
        let keys = input
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty() && *s != "-" && *s != "+")
            .map(|s| match s.strip_prefix('-') {
                Some(field) => (field.to_string(), SortOrder::Desc),
                None => (s.trim_start_matches('+').to_string(), SortOrder::Asc),
            })
            .collect();
        Sort(keys)
    }

    pub fn keys(&self) -> &[(String, SortOrder)] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, order)| match order {
                SortOrder::Asc => field.clone(),
                SortOrder::Desc => format!("-{field}"),
            })
            .collect();
        f.write_str(&parts.join(","))
    }
}

impl From<String> for Sort {
    fn from(value: String) -> Self {
        Sort::parse(&value)
    }
}

impl From<&str> for Sort {
    fn from(value: &str) -> Self {
        Sort::parse(value)
    }
}

impl From<Sort> for String {
    fn from(value: Sort) -> Self {
        value.to_string()
    }
}

/// Read options passed to the store alongside a filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub sort: Option<Sort>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    /// Fields to keep; the id field is always kept.
    pub projection: Option<Vec<String>>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sort(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn project<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.projection = Some(fields.into_iter().map(Into::into).collect());
        self
    }
}
