//! # strata-data: entity, query and repository layer
//!
//! Defines the [`Entity`] capability set, the [`Filter`] query builder, the
//! [`DocumentStore`] contract a persistence engine implements, and the
//! generic [`Repository`] that enforces soft-delete visibility and runs the
//! write [`Interceptor`] pipeline.

pub mod aggregate;
pub mod context;
pub mod entity;
pub mod error;
pub mod interceptor;
pub mod page;
pub mod patch;
pub mod query;
pub mod repository;
pub mod store;

pub use aggregate::{Accumulator, Stage};
pub use context::Context;
pub use entity::{fields, from_document, now_value, to_document, Document, Entity, Ref};
pub use error::DataError;
pub use interceptor::{HistoryLog, Interceptor, Snapshot, WriteContext, WriteInterceptor, WriteKind};
pub use page::{PageMeta, Pageable};
pub use patch::Patch;
pub use query::{Condition, Filter, FindOptions, Sort, SortOrder};
pub use repository::Repository;
pub use store::DocumentStore;

pub mod prelude {
    //! Re-exports of the most commonly used data types.
    pub use crate::{
        Context, Document, DocumentStore, Entity, Filter, FindOptions, Interceptor, Patch, Ref,
        Repository, Sort, Stage,
    };
}
