//! Strata: a generic data-access layer over document stores.
//!
//! This facade crate re-exports the Strata sub-crates through a single
//! dependency with feature flags. Import everything you need with:
//!
//! ```ignore
//! use strata::prelude::*;
//! ```
//!
//! # Feature flags
//!
//! | Feature   | Default | Crate                                  |
//! |-----------|---------|----------------------------------------|
//! | `service` | **yes** | `strata-service`                       |
//! | `memory`  | **yes** | `strata-data-memory`                   |
//! | `cache`   | **yes** | `strata-cache`, enabled by `service`   |
//! | `full`    | no      | All of the above                       |
//!
//! `strata-data` (entities, filters, the store contract and the repository)
//! is always available.

pub extern crate strata_data;

// Re-export everything from strata-data at the top level for convenience.
pub use strata_data::*;

#[cfg(feature = "service")]
pub use strata_service;

#[cfg(feature = "memory")]
pub use strata_data_memory;

#[cfg(feature = "cache")]
pub use strata_cache;

/// Unified prelude. Import everything with `use strata::prelude::*`.
///
/// Includes the data prelude plus types from all enabled feature crates.
pub mod prelude {
    pub use strata_data::prelude::*;

    #[cfg(feature = "service")]
    pub use strata_service::prelude::*;

    #[cfg(feature = "memory")]
    pub use strata_data_memory::MemoryStore;

    #[cfg(feature = "cache")]
    pub use strata_cache::TtlCache;
}
