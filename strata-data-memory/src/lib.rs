//! # strata-data-memory: in-process document store for Strata
//!
//! [`MemoryStore`] implements the [`DocumentStore`](strata_data::DocumentStore)
//! contract over JSON documents held in memory: equality, comparison,
//! null, regex and `Or` filters; sorting over dotted paths; skip/limit
//! paging; projection; and the aggregation stages defined in
//! [`strata_data::Stage`].
//!
//! It is the reference backend for tests and single-process deployments.
//!
//! ```ignore
//! use strata_data::Repository;
//! use strata_data_memory::MemoryStore;
//!
//! let store = MemoryStore::new();
//! let repo = Repository::<Product, _>::new(store.clone());
//! ```

pub mod matcher;
pub mod pipeline;
pub mod store;

pub use store::MemoryStore;
