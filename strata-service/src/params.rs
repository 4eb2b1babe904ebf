use serde::{Deserialize, Serialize};
use serde_json::Value;
use strata_data::{Document, Filter, Sort};

/// Parameters of a list read.
///
/// `query` keys become equality conditions (or custom filters, when one is
/// registered under the key); keys outside the configured allowed fields are
/// dropped. Serialized form is the cache key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FindAllParams {
    pub query: Document,
    pub search: Option<String>,
    pub sort: Option<Sort>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub paginate: bool,
    pub include_deleted: bool,
    pub expand: Option<bool>,
}

impl Default for FindAllParams {
    fn default() -> Self {
        Self {
            query: Document::new(),
            search: None,
            sort: None,
            page: None,
            limit: None,
            paginate: true,
            include_deleted: false,
            expand: None,
        }
    }
}

impl FindAllParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(mut self, query: Document) -> Self {
        self.query = query;
        self
    }

    pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.query.insert(field.to_string(), value.into());
        self
    }

    pub fn search(mut self, term: &str) -> Self {
        self.search = Some(term.to_string());
        self
    }

    pub fn sort(mut self, sort: impl Into<Sort>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    pub fn page(mut self, page: u64) -> Self {
        self.page = Some(page);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Return every match with `total`/`results` metadata only.
    pub fn unpaginated(mut self) -> Self {
        self.paginate = false;
        self
    }

    pub fn include_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }

    pub fn expand(mut self, expand: bool) -> Self {
        self.expand = Some(expand);
        self
    }
}

/// Options of a single-record read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadOptions {
    pub include_deleted: bool,
    /// Overrides the configured default expansion for this call.
    pub expand: Option<bool>,
}

impl ReadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }

    pub fn expand(mut self, expand: bool) -> Self {
        self.expand = Some(expand);
        self
    }
}

/// One member of a batch update.
#[derive(Debug, Clone)]
pub struct BatchUpdate {
    pub filter: Filter,
    pub data: Document,
    /// Run the configured validators on `data` first.
    pub validate: bool,
}

impl BatchUpdate {
    pub fn new(filter: Filter, data: Document) -> Self {
        Self {
            filter,
            data,
            validate: true,
        }
    }

    pub fn unvalidated(mut self) -> Self {
        self.validate = false;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchCreateOptions {
    /// Stop at the first failed insert instead of skipping it.
    pub ordered: bool,
    /// Run unique-field checks and validators on every item.
    pub validate: bool,
}

impl Default for BatchCreateOptions {
    fn default() -> Self {
        Self {
            ordered: true,
            validate: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Created {
    pub created: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Modified {
    pub modified: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Deleted {
    pub deleted: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Restored {
    pub restored: u64,
}
