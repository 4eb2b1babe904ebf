use crate::error::DataError;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A stored record: a JSON object keyed by field name.
pub type Document = serde_json::Map<String, Value>;

/// Field names the data layer writes by convention.
pub mod fields {
    pub const CREATED_AT: &str = "createdAt";
    pub const UPDATED_AT: &str = "updatedAt";
    pub const DELETED_AT: &str = "deletedAt";
    pub const DELETED_BY: &str = "deletedBy";
    pub const CREATED_BY: &str = "createdBy";
    pub const UPDATED_BY: &str = "updatedBy";
}

/// Trait representing a stored entity with a collection name, an identity
/// field and the soft-delete marker.
///
/// Entities travel through the data layer as [`Document`]s, so the
/// serialized field names must match the ones referenced in configuration
/// (slug source, unique fields, search fields) and the [`fields`] constants.
///
/// # Example
///
/// ```ignore
/// #[derive(Clone, Serialize, Deserialize)]
/// #[serde(rename_all = "camelCase")]
/// struct Product {
///     id: String,
///     name: String,
///     sku: String,
///     deleted_at: Option<DateTime<Utc>>,
/// }
///
/// impl Entity for Product {
///     type Id = String;
///     fn collection_name() -> &'static str { "products" }
///     fn unique_fields() -> &'static [&'static str] { &["sku"] }
///     fn id(&self) -> &String { &self.id }
///     fn deleted_at(&self) -> Option<DateTime<Utc>> { self.deleted_at }
/// }
/// ```
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + Unpin + 'static {
    type Id: Serialize + Clone + ToString + Send + Sync + 'static;

    fn collection_name() -> &'static str;

    fn id_field() -> &'static str {
        "id"
    }

    /// Fields whose values must not repeat across live records.
    fn unique_fields() -> &'static [&'static str] {
        &[]
    }

    fn id(&self) -> &Self::Id;

    fn deleted_at(&self) -> Option<DateTime<Utc>>;

    fn is_deleted(&self) -> bool {
        self.deleted_at().is_some()
    }
}

/// A relation field that holds either the referenced record's id or, once
/// expanded, the referenced record itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Ref<T> {
    Id(String),
    Expanded(T),
}

impl<T> Ref<T> {
    pub fn as_id(&self) -> Option<&str> {
        match self {
            Ref::Id(id) => Some(id),
            Ref::Expanded(_) => None,
        }
    }

    pub fn as_expanded(&self) -> Option<&T> {
        match self {
            Ref::Id(_) => None,
            Ref::Expanded(value) => Some(value),
        }
    }

    pub fn is_expanded(&self) -> bool {
        matches!(self, Ref::Expanded(_))
    }
}

/// Serialize a value into a [`Document`]. Fails for values that do not
/// serialize to a JSON object.
pub fn to_document<T: Serialize>(value: &T) -> Result<Document, DataError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(DataError::Other(format!(
            "expected an object, got `{other}`"
        ))),
    }
}

pub fn from_document<T: DeserializeOwned>(document: Document) -> Result<T, DataError> {
    Ok(serde_json::from_value(Value::Object(document))?)
}

/// The current instant in the fixed-width form timestamps are stored in,
/// so that string ordering matches chronological ordering.
pub fn now_value() -> Value {
    Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
}
