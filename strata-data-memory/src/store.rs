use crate::matcher::{matches, project, sort_documents};
use crate::pipeline;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use strata_data::{DataError, Document, DocumentStore, Filter, FindOptions, Patch, Stage};
use tokio::sync::RwLock;
use uuid::Uuid;

type Collections = HashMap<String, Vec<Document>>;

/// An in-process [`DocumentStore`].
///
/// Collections are insertion-ordered vectors guarded by a single async
/// `RwLock`; every operation holds the lock for its whole duration, which
/// gives each single-document write the atomicity the contract requires.
///
/// Cloning is cheap and clones share the same data.
#[derive(Clone)]
pub struct MemoryStore {
    collections: Arc<RwLock<Collections>>,
    id_field: Arc<str>,
    reads: Arc<AtomicU64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_id_field("id")
    }

    /// Use `id_field` as the identity key assigned on insert.
    pub fn with_id_field(id_field: &str) -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
            id_field: Arc::from(id_field),
            reads: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Number of read operations (`find`, `find_one`, `count`, `aggregate`)
    /// served so far.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    /// Every document of a collection, soft-deleted ones included.
    pub async fn dump(&self, collection: &str) -> Vec<Document> {
        self.collections
            .read()
            .await
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    fn count_read(&self) {
        self.reads.fetch_add(1, Ordering::SeqCst);
    }

    fn insert_into(&self, rows: &mut Vec<Document>, mut document: Document) -> Result<Document, DataError> {
        let id_field = self.id_field.as_ref();
        let id = match document.get(id_field) {
            Some(id) if !id.is_null() => id.clone(),
            _ => {
                let id = Value::String(Uuid::new_v4().to_string());
                document.insert(id_field.to_string(), id.clone());
                id
            }
        };
        if rows.iter().any(|r| r.get(id_field) == Some(&id)) {
            return Err(DataError::Conflict(format!("duplicate {id_field} `{id}`")));
        }
        rows.push(document.clone());
        Ok(document)
    }

    fn select(&self, rows: &[Document], filter: &Filter, options: &FindOptions) -> Result<Vec<Document>, DataError> {
        let mut found = Vec::new();
        for row in rows {
            if matches(filter, row)? {
                found.push(row.clone());
            }
        }
        if let Some(sort) = &options.sort {
            sort_documents(&mut found, sort);
        }
        let skip = options.skip.unwrap_or(0) as usize;
        let limit = options.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        let id_field = self.id_field.as_ref();
        Ok(found
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|d| match &options.projection {
                Some(fields) => project(&d, fields, id_field),
                None => d,
            })
            .collect())
    }

    /// Evaluate the filter against every row before any row is touched, so a
    /// failing condition leaves the collection unchanged.
    fn hits(rows: &[Document], filter: &Filter) -> Result<Vec<bool>, DataError> {
        rows.iter().map(|row| matches(filter, row)).collect()
    }

    fn position(rows: &[Document], filter: &Filter) -> Result<Option<usize>, DataError> {
        for (i, row) in rows.iter().enumerate() {
            if matches(filter, row)? {
                return Ok(Some(i));
            }
        }
        Ok(None)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore for MemoryStore {
    async fn insert_one(&self, collection: &str, document: Document) -> Result<Document, DataError> {
        let mut guard = self.collections.write().await;
        let rows = guard.entry(collection.to_string()).or_default();
        self.insert_into(rows, document)
    }

    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
        ordered: bool,
    ) -> Result<Vec<Document>, DataError> {
        let mut guard = self.collections.write().await;
        let rows = guard.entry(collection.to_string()).or_default();
        let mut stored = Vec::with_capacity(documents.len());
        for document in documents {
            match self.insert_into(rows, document) {
                Ok(doc) => stored.push(doc),
                Err(err) if ordered => return Err(err),
                Err(err) => tracing::warn!(collection, error = %err, "skipping failed insert"),
            }
        }
        Ok(stored)
    }

    async fn find(&self, collection: &str, filter: &Filter, options: &FindOptions) -> Result<Vec<Document>, DataError> {
        self.count_read();
        let guard = self.collections.read().await;
        match guard.get(collection) {
            Some(rows) => self.select(rows, filter, options),
            None => Ok(Vec::new()),
        }
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> Result<Option<Document>, DataError> {
        self.count_read();
        let guard = self.collections.read().await;
        let Some(rows) = guard.get(collection) else {
            return Ok(None);
        };
        let options = FindOptions {
            limit: Some(1),
            ..options.clone()
        };
        Ok(self.select(rows, filter, &options)?.into_iter().next())
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: &Filter,
        patch: &Patch,
    ) -> Result<Option<Document>, DataError> {
        let mut guard = self.collections.write().await;
        let Some(rows) = guard.get_mut(collection) else {
            return Ok(None);
        };
        match Self::position(rows, filter)? {
            Some(i) => {
                patch.apply(&mut rows[i]);
                Ok(Some(rows[i].clone()))
            }
            None => Ok(None),
        }
    }

    async fn update_many(&self, collection: &str, filter: &Filter, patch: &Patch) -> Result<u64, DataError> {
        let mut guard = self.collections.write().await;
        let Some(rows) = guard.get_mut(collection) else {
            return Ok(0);
        };
        let hits = Self::hits(rows, filter)?;
        let mut modified = 0;
        for (row, hit) in rows.iter_mut().zip(hits) {
            if hit {
                let before = row.clone();
                patch.apply(row);
                if *row != before {
                    modified += 1;
                }
            }
        }
        Ok(modified)
    }

    async fn find_one_and_delete(&self, collection: &str, filter: &Filter) -> Result<Option<Document>, DataError> {
        let mut guard = self.collections.write().await;
        let Some(rows) = guard.get_mut(collection) else {
            return Ok(None);
        };
        Ok(Self::position(rows, filter)?.map(|i| rows.remove(i)))
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64, DataError> {
        let mut guard = self.collections.write().await;
        let Some(rows) = guard.get_mut(collection) else {
            return Ok(0);
        };
        let hits = Self::hits(rows, filter)?;
        let before = rows.len();
        let mut hits = hits.into_iter();
        rows.retain(|_| !hits.next().unwrap_or(false));
        Ok((before - rows.len()) as u64)
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, DataError> {
        self.count_read();
        let guard = self.collections.read().await;
        let Some(rows) = guard.get(collection) else {
            return Ok(0);
        };
        let mut n = 0;
        for row in rows {
            if matches(filter, row)? {
                n += 1;
            }
        }
        Ok(n)
    }

    async fn aggregate(&self, collection: &str, stages: &[Stage]) -> Result<Vec<Document>, DataError> {
        self.count_read();
        let rows = self
            .collections
            .read()
            .await
            .get(collection)
            .cloned()
            .unwrap_or_default();
        pipeline::run(rows, stages, &self.id_field)
    }
}
