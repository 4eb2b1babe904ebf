use crate::error::ServiceError;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use strata_data::PageMeta;

/// Uniform result of every public service operation.
///
/// Exactly one branch is populated. `meta` is only present on paginated
/// list reads.
///
/// Serializes as `{"success": true, "data": ..., "meta": ...}` or
/// `{"success": false, "error": {"code": ..., "message": ...}}`.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope<D> {
    Success { data: D, meta: Option<PageMeta> },
    Failure { error: ServiceError },
}

impl<D> Envelope<D> {
    pub fn ok(data: D) -> Self {
        Envelope::Success { data, meta: None }
    }

    pub fn with_meta(data: D, meta: PageMeta) -> Self {
        Envelope::Success {
            data,
            meta: Some(meta),
        }
    }

    pub fn fail(error: ServiceError) -> Self {
        Envelope::Failure { error }
    }

    pub fn from_result(result: Result<D, ServiceError>) -> Self {
        match result {
            Ok(data) => Envelope::ok(data),
            Err(error) => Envelope::fail(error),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Envelope::Success { .. })
    }

    pub fn data(&self) -> Option<&D> {
        match self {
            Envelope::Success { data, .. } => Some(data),
            Envelope::Failure { .. } => None,
        }
    }

    pub fn meta(&self) -> Option<&PageMeta> {
        match self {
            Envelope::Success { meta, .. } => meta.as_ref(),
            Envelope::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&ServiceError> {
        match self {
            Envelope::Success { .. } => None,
            Envelope::Failure { error } => Some(error),
        }
    }

    pub fn into_result(self) -> Result<D, ServiceError> {
        match self {
            Envelope::Success { data, .. } => Ok(data),
            Envelope::Failure { error } => Err(error),
        }
    }

    pub fn map<E>(self, f: impl FnOnce(D) -> E) -> Envelope<E> {
        match self {
            Envelope::Success { data, meta } => Envelope::Success { data: f(data), meta },
            Envelope::Failure { error } => Envelope::Failure { error },
        }
    }
}

impl<D> From<Result<D, ServiceError>> for Envelope<D> {
    fn from(result: Result<D, ServiceError>) -> Self {
        Envelope::from_result(result)
    }
}

impl<D: Serialize> Serialize for Envelope<D> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        match self {
            Envelope::Success { data, meta } => {
                map.serialize_entry("success", &true)?;
                map.serialize_entry("data", data)?;
                if let Some(meta) = meta {
                    map.serialize_entry("meta", meta)?;
                }
            }
            Envelope::Failure { error } => {
                map.serialize_entry("success", &false)?;
                map.serialize_entry("error", error)?;
            }
        }
        map.end()
    }
}
