use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;
use strata_data::DataError;

/// The operation family an unexpected persistence failure is reported under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorFamily {
    Database,
    BulkUpdate,
    BulkDelete,
    BatchCreate,
    BatchUpdate,
    BatchDelete,
    BatchRestore,
}

impl ErrorFamily {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorFamily::Database => "DATABASE_ERROR",
            ErrorFamily::BulkUpdate => "BULK_UPDATE_ERROR",
            ErrorFamily::BulkDelete => "BULK_DELETE_ERROR",
            ErrorFamily::BatchCreate => "BATCH_CREATE_ERROR",
            ErrorFamily::BatchUpdate => "BATCH_UPDATE_ERROR",
            ErrorFamily::BatchDelete => "BATCH_DELETE_ERROR",
            ErrorFamily::BatchRestore => "BATCH_RESTORE_ERROR",
        }
    }
}

/// Every failure a service operation can report.
///
/// Domain errors (`NotFound`, `UniqueField`, `Validation`, ...) are raised
/// deliberately and travel unchanged; anything else coming out of the data
/// layer is folded into `Database` with its message preserved.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceError {
    NotFound(String),
    UniqueField { field: String, value: Value },
    /// `field` is `None` for whole-document validators and hooks.
    Validation { field: Option<String>, message: String },
    OperationNotSupported(String),
    PipelineNotFound(String),
    Export(String),
    /// The slug collision loop ran out of attempts.
    SlugExhausted { base: String, attempts: u32 },
    Database { family: ErrorFamily, message: String },
}

impl ServiceError {
    pub fn not_found(what: impl Into<String>) -> Self {
        ServiceError::NotFound(what.into())
    }

    pub fn validation(field: Option<&str>, message: impl Into<String>) -> Self {
        ServiceError::Validation {
            field: field.map(str::to_string),
            message: message.into(),
        }
    }

    /// The symbolic code callers match on.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => "NOT_FOUND",
            ServiceError::UniqueField { .. } => "UNIQUE_FIELD_ERROR",
            ServiceError::Validation { .. } => "VALIDATION_ERROR",
            ServiceError::OperationNotSupported(_) => "OPERATION_NOT_SUPPORTED",
            ServiceError::PipelineNotFound(_) => "PIPELINE_NOT_FOUND",
            ServiceError::Export(_) => "EXPORT_ERROR",
            ServiceError::SlugExhausted { .. } => "SLUG_EXHAUSTED",
            ServiceError::Database { family, .. } => family.code(),
        }
    }

    /// Re-tag a wrapped persistence failure with the operation family that
    /// produced it. Domain errors are returned unchanged.
    pub fn within(self, family: ErrorFamily) -> Self {
        match self {
            ServiceError::Database { message, .. } => ServiceError::Database { family, message },
            other => other,
        }
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::NotFound(what) => write!(f, "{what} not found"),
            ServiceError::UniqueField { field, value } => {
                write!(f, "Duplicate value `{value}` for unique field `{field}`")
            }
            ServiceError::Validation {
                field: Some(field),
                message,
            } => write!(f, "Validation failed for `{field}`: {message}"),
            ServiceError::Validation { field: None, message } => {
                write!(f, "Validation failed: {message}")
            }
            ServiceError::OperationNotSupported(msg) => write!(f, "Operation not supported: {msg}"),
            ServiceError::PipelineNotFound(name) => write!(f, "Aggregation pipeline `{name}` not found"),
            ServiceError::Export(msg) => write!(f, "Export error: {msg}"),
            ServiceError::SlugExhausted { base, attempts } => write!(
                f,
                "No unique slug for `{base}` after {attempts} attempts"
            ),
            ServiceError::Database { message, .. } => write!(f, "Database error: {message}"),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<DataError> for ServiceError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::NotFound(what) => ServiceError::NotFound(what),
            other => {
                tracing::warn!(error = %other, "wrapping data layer failure");
                ServiceError::Database {
                    family: ErrorFamily::Database,
                    message: other.to_string(),
                }
            }
        }
    }
}

impl Serialize for ServiceError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("code", self.code())?;
        map.serialize_entry("message", &self.to_string())?;
        match self {
            ServiceError::UniqueField { field, value } => {
                map.serialize_entry("field", field)?;
                map.serialize_entry("value", value)?;
            }
            ServiceError::Validation { field: Some(field), .. } => {
                map.serialize_entry("field", field)?;
            }
            _ => {}
        }
        map.end()
    }
}
