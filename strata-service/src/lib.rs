//! # strata-service: policy-enforcing CRUD over a strata repository
//!
//! [`Service`] wraps one [`Repository`](strata_data::Repository) and runs
//! every operation through a fixed pipeline of hooks, unique-field checks,
//! validation, slug assignment, persistence and expansion. Results come back
//! as an [`Envelope`], never as a bare error.
//!
//! Configuration is supplied as [`ServiceOptions`] and resolved once, at
//! construction, into an immutable [`ServiceConfig`].

mod aggregate;
mod batch;
pub mod config;
pub mod envelope;
pub mod error;
pub mod export;
pub mod hooks;
pub mod params;
mod service;
pub mod slug;
pub mod validation;

pub use config::{
    AggregationOptions, CacheOptions, ExpandField, ExpandOptions, FilterOptions, PaginationOptions,
    SearchOptions, ServiceConfig, ServiceOptions, SlugOptions, ValidationOptions,
};
pub use envelope::Envelope;
pub use error::{ErrorFamily, ServiceError};
pub use export::{Export, ExportFormat, ExportOptions};
pub use hooks::{Hooks, NoHooks};
pub use params::{
    BatchCreateOptions, BatchUpdate, Created, Deleted, FindAllParams, Modified, ReadOptions, Restored,
};
pub use service::Service;
pub use validation::{DocumentValidator, FieldValidator};

/// Re-export for implementing [`Hooks`], [`FieldValidator`] and
/// [`DocumentValidator`] without a direct dependency.
pub use async_trait::async_trait;

pub mod prelude {
    //! Re-exports of the most commonly used service types.
    pub use crate::{
        async_trait, BatchUpdate, Envelope, FindAllParams, Hooks, ReadOptions, Service, ServiceError,
        ServiceOptions,
    };
}
