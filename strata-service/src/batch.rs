//! Bulk and batch operations.
//!
//! A bulk operation applies one filter/data pair across every matching
//! record. A batch runs several independent members concurrently and sums
//! their counts. Either reports only the aggregate count: if any member
//! fails, the whole call fails and earlier members' effects stay in place.
//!
//! Hooks do not run here; validation runs per item where requested.

use crate::envelope::Envelope;
use crate::error::{ErrorFamily, ServiceError};
use crate::params::{BatchCreateOptions, BatchUpdate, Created, Deleted, Modified, Restored};
use crate::service::Service;
use crate::slug::unique_slug;
use futures_util::future::try_join_all;
use serde_json::Value;
use std::collections::HashSet;
use strata_data::{Context, Document, DocumentStore, Entity, Filter, Patch};

impl<T: Entity, S: DocumentStore> Service<T, S> {
    /// Apply `data` to every live record matching `filter`.
    pub async fn bulk_update(&self, ctx: &Context, filter: &Filter, mut data: Document) -> Envelope<Modified> {
        self.enter("bulk_update", ctx);
        Self::strip_identity(&mut data);
        let result = async {
            self.validate(ctx, &data).await?;
            let modified = self
                .repository
                .update_many(ctx, filter, Patch::from_document(data))
                .await?;
            Ok::<_, ServiceError>(Modified { modified })
        }
        .await;
        Envelope::from_result(result.map_err(|e| e.within(ErrorFamily::BulkUpdate)))
    }

    /// Delete every live record matching `filter`, softly unless soft delete
    /// is disabled.
    pub async fn bulk_delete(&self, ctx: &Context, filter: &Filter) -> Envelope<Deleted> {
        self.enter("bulk_delete", ctx);
        let result = self
            .repository
            .delete_many(ctx, filter, self.config.soft_delete)
            .await
            .map(|deleted| Deleted { deleted })
            .map_err(|e| ServiceError::from(e).within(ErrorFamily::BulkDelete));
        Envelope::from_result(result)
    }

    /// Insert `items` in one store call.
    ///
    /// Slugs are assigned item by item so that two items with the same
    /// source value receive distinct slugs. With `options.validate`, unique
    /// fields are also checked across the items themselves.
    pub async fn batch_create(
        &self,
        ctx: &Context,
        items: Vec<Document>,
        options: BatchCreateOptions,
    ) -> Envelope<Created> {
        self.enter("batch_create", ctx);
        let result = self.try_batch_create(ctx, items, options).await;
        Envelope::from_result(result.map_err(|e| e.within(ErrorFamily::BatchCreate)))
    }

    async fn try_batch_create(
        &self,
        ctx: &Context,
        items: Vec<Document>,
        options: BatchCreateOptions,
    ) -> Result<Created, ServiceError> {
        let mut seen: HashSet<(String, String)> = HashSet::new();
        let mut slugs: HashSet<String> = HashSet::new();
        let mut prepared = Vec::with_capacity(items.len());

        for mut data in items {
            if options.validate {
                self.check_unique(&data, None).await?;
                for field in self.unique_fields.iter() {
                    let Some(value) = data.get(field).filter(|v| !v.is_null()) else {
                        continue;
                    };
                    if !seen.insert((field.clone(), value.to_string())) {
                        return Err(ServiceError::UniqueField {
                            field: field.clone(),
                            value: value.clone(),
                        });
                    }
                }
                self.validate(ctx, &data).await?;
            }
            self.assign_batch_slug(&mut data, &mut slugs).await?;
            prepared.push(data);
        }

        let created = self
            .repository
            .create_many(ctx, prepared, options.ordered)
            .await?;
        Ok(Created {
            created: created.len() as u64,
        })
    }

    async fn assign_batch_slug(&self, data: &mut Document, taken: &mut HashSet<String>) -> Result<(), ServiceError> {
        let slug = &self.config.slug;
        if !slug.enabled {
            return Ok(());
        }
        let Some(source) = data.get(&slug.source_field).and_then(Value::as_str).map(str::to_string) else {
            return Ok(());
        };
        let in_batch = &*taken;
        let assigned = unique_slug(slug, &source, |candidate| async move {
            if in_batch.contains(&candidate) {
                return Ok(true);
            }
            self.slug_taken(candidate, None).await
        })
        .await?;
        if let Some(value) = assigned {
            taken.insert(value.clone());
            data.insert(slug.target_field.clone(), Value::String(value));
        }
        Ok(())
    }

    /// Run every update concurrently and sum the modified counts.
    pub async fn batch_update(&self, ctx: &Context, updates: Vec<BatchUpdate>) -> Envelope<Modified> {
        self.enter("batch_update", ctx);
        let members = updates.into_iter().map(|update| async move {
            let BatchUpdate { filter, mut data, validate } = update;
            Self::strip_identity(&mut data);
            if validate {
                self.validate(ctx, &data).await?;
            }
            let modified = self
                .repository
                .update_many(ctx, &filter, Patch::from_document(data))
                .await?;
            Ok::<u64, ServiceError>(modified)
        });
        let result = try_join_all(members)
            .await
            .map(|counts| Modified {
                modified: counts.into_iter().sum(),
            })
            .map_err(|e| e.within(ErrorFamily::BatchUpdate));
        Envelope::from_result(result)
    }

    /// Run every delete concurrently and sum the deleted counts.
    pub async fn batch_delete(&self, ctx: &Context, filters: Vec<Filter>) -> Envelope<Deleted> {
        self.enter("batch_delete", ctx);
        let soft = self.config.soft_delete;
        let members = filters.iter().map(|filter| self.repository.delete_many(ctx, filter, soft));
        let result = try_join_all(members)
            .await
            .map(|counts| Deleted {
                deleted: counts.into_iter().sum(),
            })
            .map_err(|e| ServiceError::from(e).within(ErrorFamily::BatchDelete));
        Envelope::from_result(result)
    }

    /// Run every restore concurrently and sum the restored counts.
    pub async fn batch_restore(&self, ctx: &Context, filters: Vec<Filter>) -> Envelope<Restored> {
        self.enter("batch_restore", ctx);
        if let Err(err) = self.ensure_soft_delete("batch restore") {
            return Envelope::fail(err);
        }
        let members = filters.iter().map(|filter| self.repository.restore_many(ctx, filter));
        let result = try_join_all(members)
            .await
            .map(|counts| Restored {
                restored: counts.into_iter().sum(),
            })
            .map_err(|e| ServiceError::from(e).within(ErrorFamily::BatchRestore));
        Envelope::from_result(result)
    }
}
