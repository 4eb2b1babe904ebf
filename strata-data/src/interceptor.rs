//! Write interceptors run by [`Repository`](crate::Repository) around every
//! persisted write.
//!
//! Interceptors form an explicit, ordered pipeline: `before_*` runs on the
//! outgoing document or patch in list order, then the store is called, then
//! `after_write` runs on the stored result in list order.
//!
//! Multi-record writes (`update_many`, `delete_many`, `restore_many`) only
//! run the `before_update` stage, since the store reports counts rather than
//! the affected documents.

use crate::context::Context;
use crate::entity::{fields, Document};
use crate::error::DataError;
use crate::patch::Patch;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Insert,
    Update,
    SoftDelete,
    HardDelete,
    Restore,
}

/// What an interceptor knows about the write it wraps.
pub struct WriteContext<'a> {
    pub collection: &'static str,
    pub kind: WriteKind,
    pub ctx: &'a Context,
}

/// Caller-supplied interceptor, registered with [`Interceptor::Custom`].
pub trait WriteInterceptor: Send + Sync {
    fn before_insert(&self, _wctx: &WriteContext<'_>, _document: &mut Document) -> Result<(), DataError> {
        Ok(())
    }

    fn before_update(&self, _wctx: &WriteContext<'_>, _patch: &mut Patch) -> Result<(), DataError> {
        Ok(())
    }

    fn after_write(&self, _wctx: &WriteContext<'_>, _document: &Document) {}
}

/// Built-in interceptor variants.
#[derive(Clone)]
pub enum Interceptor {
    /// Stamps `createdBy` on insert and `updatedBy` on every write.
    Audit,
    /// Sets `field` to 0 on insert and increments it on every update.
    Versioning { field: String },
    /// Records a snapshot of every written document.
    History(HistoryLog),
    Custom(Arc<dyn WriteInterceptor>),
}

impl Interceptor {
    pub fn versioning(field: &str) -> Self {
        Interceptor::Versioning {
            field: field.to_string(),
        }
    }

    pub fn custom(interceptor: impl WriteInterceptor + 'static) -> Self {
        Interceptor::Custom(Arc::new(interceptor))
    }

    pub(crate) fn before_insert(
        &self,
        wctx: &WriteContext<'_>,
        document: &mut Document,
    ) -> Result<(), DataError> {
        match self {
            Interceptor::Audit => {
                let actor = actor_value(wctx.ctx);
                document.insert(fields::CREATED_BY.to_string(), actor.clone());
                document.insert(fields::UPDATED_BY.to_string(), actor);
                Ok(())
            }
            Interceptor::Versioning { field } => {
                document.insert(field.clone(), Value::from(0));
                Ok(())
            }
            Interceptor::History(_) => Ok(()),
            Interceptor::Custom(inner) => inner.before_insert(wctx, document),
        }
    }

    pub(crate) fn before_update(&self, wctx: &WriteContext<'_>, patch: &mut Patch) -> Result<(), DataError> {
        match self {
            Interceptor::Audit => {
                patch
                    .set
                    .insert(fields::UPDATED_BY.to_string(), actor_value(wctx.ctx));
                Ok(())
            }
            Interceptor::Versioning { field } => {
                patch.inc.push((field.clone(), 1));
                Ok(())
            }
            Interceptor::History(_) => Ok(()),
            Interceptor::Custom(inner) => inner.before_update(wctx, patch),
        }
    }

    pub(crate) fn after_write(&self, wctx: &WriteContext<'_>, id_field: &str, document: &Document) {
        match self {
            Interceptor::History(log) => log.record(wctx, id_field, document),
            Interceptor::Custom(inner) => inner.after_write(wctx, document),
            Interceptor::Audit | Interceptor::Versioning { .. } => {}
        }
    }
}

fn actor_value(ctx: &Context) -> Value {
    ctx.actor()
        .map(|a| Value::String(a.to_string()))
        .unwrap_or(Value::Null)
}

#[derive(Debug, Clone)]
pub struct Snapshot {
    pub kind: WriteKind,
    pub actor: Option<String>,
    pub recorded_at: DateTime<Utc>,
    pub document: Document,
}

/// In-process history of written documents, keyed by `collection:id`.
#[derive(Clone, Default)]
pub struct HistoryLog {
    entries: Arc<DashMap<String, Vec<Snapshot>>>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, wctx: &WriteContext<'_>, id_field: &str, document: &Document) {
        let Some(id) = document.get(id_field) else {
            return;
        };
        let key = history_key(wctx.collection, id);
        self.entries.entry(key).or_default().push(Snapshot {
            kind: wctx.kind,
            actor: wctx.ctx.actor.clone(),
            recorded_at: Utc::now(),
            document: document.clone(),
        });
    }

    /// Snapshots for one record, oldest first.
    pub fn snapshots(&self, collection: &str, id: &Value) -> Vec<Snapshot> {
        self.entries
            .get(&history_key(collection, id))
            .map(|e| e.value().clone())
            .unwrap_or_default()
    }
}

fn history_key(collection: &str, id: &Value) -> String {
    match id {
        Value::String(s) => format!("{collection}:{s}"),
        other => format!("{collection}:{other}"),
    }
}
