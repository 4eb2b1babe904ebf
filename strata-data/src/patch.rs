use crate::entity::Document;
use serde_json::Value;

/// A partial update: fields to set, fields to remove and numeric fields to
/// increment. Stores apply the three parts in that order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    pub set: Document,
    pub unset: Vec<String>,
    pub inc: Vec<(String, i64)>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    /// A patch that sets every field of `document`.
    pub fn from_document(document: Document) -> Self {
        Self {
            set: document,
            ..Self::default()
        }
    }

    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.set.insert(field.to_string(), value.into());
        self
    }

    pub fn unset(mut self, field: &str) -> Self {
        self.unset.push(field.to_string());
        self
    }

    pub fn inc(mut self, field: &str, by: i64) -> Self {
        self.inc.push((field.to_string(), by));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.unset.is_empty() && self.inc.is_empty()
    }

    /// Apply this patch to a document in place.
    pub fn apply(&self, document: &mut Document) {
        for (field, value) in &self.set {
            document.insert(field.clone(), value.clone());
        }
        for field in &self.unset {
            document.remove(field);
        }
        for (field, by) in &self.inc {
            let current = document.get(field).and_then(Value::as_i64).unwrap_or(0);
            document.insert(field.clone(), Value::from(current.saturating_add(*by)));
        }
    }
}
