use crate::error::ServiceError;
use async_trait::async_trait;
use strata_data::{Context, Document, Entity};

/// Lifecycle callbacks around single-record writes.
///
/// `before_*` hooks can rewrite the incoming data or abort the operation by
/// returning an error; nothing is persisted in that case. `after_*` hooks see
/// the stored record. Every method defaults to a no-op, so implementors only
/// override what they need.
///
/// Bulk and batch operations do not run hooks.
///
/// # Example
///
/// ```ignore
/// struct Normalize;
///
/// #[async_trait]
/// impl Hooks<Product> for Normalize {
///     async fn before_create(&self, _ctx: &Context, data: &mut Document) -> Result<(), ServiceError> {
///         if let Some(Value::String(sku)) = data.get_mut("sku") {
///             *sku = sku.to_uppercase();
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Hooks<T: Entity>: Send + Sync {
    async fn before_create(&self, _ctx: &Context, _data: &mut Document) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn after_create(&self, _ctx: &Context, _record: &T) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn before_update(
        &self,
        _ctx: &Context,
        _existing: &T,
        _data: &mut Document,
    ) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn after_update(&self, _ctx: &Context, _record: &T) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn before_delete(&self, _ctx: &Context, _existing: &T) -> Result<(), ServiceError> {
        Ok(())
    }

    async fn after_delete(&self, _ctx: &Context, _record: &T) -> Result<(), ServiceError> {
        Ok(())
    }
}

/// The hook set used when none is configured.
pub struct NoHooks;

impl<T: Entity> Hooks<T> for NoHooks {}
