use crate::config::{ExpandField, ServiceConfig, ServiceOptions};
use crate::envelope::Envelope;
use crate::error::ServiceError;
use crate::params::{FindAllParams, ReadOptions};
use crate::slug::unique_slug;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use strata_cache::TtlCache;
use strata_data::{
    fields, from_document, to_document, Context, DataError, Document, DocumentStore, Entity,
    Filter, FindOptions, PageMeta, Pageable, Patch, Repository,
};
use tracing::{debug, trace, warn};

/// Policy-enforcing CRUD facade over one [`Repository`].
///
/// Every public operation returns an [`Envelope`]; failures never escape as
/// `Err`. Write operations run a fixed stage order:
///
/// - create: `before_create` hook, unique-field check, validation, slug,
///   persist, `after_create` hook, expansion;
/// - update: load (404), `before_update` hook, unique-field check excluding
///   the record itself, validation, slug if the source field changed,
///   persist (404 if the record vanished), `after_update` hook, expansion;
/// - delete: load (404), `before_delete` hook, soft or hard delete,
///   `after_delete` hook, expansion.
///
/// The first failing stage aborts the rest.
///
/// Reads go through an in-process TTL cache when caching is enabled. Writes
/// never invalidate it; use [`Service::clear_cache`].
///
/// # Example
///
/// ```ignore
/// let service = Service::new(
///     Repository::<Product, _>::new(MemoryStore::new()),
///     ServiceOptions::new().slug(SlugOptions::from_field("name", "slug")),
/// );
/// let created = service.create(&ctx, doc).await;
/// ```
pub struct Service<T: Entity, S: DocumentStore> {
    pub(crate) repository: Repository<T, S>,
    pub(crate) config: Arc<ServiceConfig<T>>,
    pub(crate) unique_fields: Arc<[String]>,
    pub(crate) cache: TtlCache<String, Bytes>,
}

impl<T: Entity, S: DocumentStore> Clone for Service<T, S> {
    fn clone(&self) -> Self {
        Self {
            repository: self.repository.clone(),
            config: self.config.clone(),
            unique_fields: self.unique_fields.clone(),
            cache: self.cache.clone(),
        }
    }
}

pub(crate) fn id_value<I: Serialize>(id: &I) -> Result<Value, ServiceError> {
    Ok(serde_json::to_value(id).map_err(DataError::from)?)
}

impl<T: Entity, S: DocumentStore> Service<T, S> {
    /// Resolve `options` and read the entity's unique-field set. Both are
    /// fixed for the lifetime of the service.
    pub fn new(repository: Repository<T, S>, options: ServiceOptions<T>) -> Self {
        let config = options.resolve();
        let unique_fields: Arc<[String]> = T::unique_fields().iter().map(|f| f.to_string()).collect();
        let cache = TtlCache::new(config.cache.ttl);
        Self {
            repository,
            config: Arc::new(config),
            unique_fields,
            cache,
        }
    }

    pub fn repository(&self) -> &Repository<T, S> {
        &self.repository
    }

    pub fn config(&self) -> &ServiceConfig<T> {
        &self.config
    }

    pub fn unique_fields(&self) -> &[String] {
        &self.unique_fields
    }

    /// Drop every cached read.
    pub fn clear_cache(&self) {
        debug!(collection = T::collection_name(), "clearing read cache");
        self.cache.clear();
    }

    pub(crate) fn enter(&self, operation: &'static str, ctx: &Context) {
        debug!(
            collection = T::collection_name(),
            operation,
            actor = ?ctx.actor(),
            "service call"
        );
    }

    pub(crate) fn not_found(&self) -> ServiceError {
        ServiceError::not_found(T::collection_name())
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// List records matching `params`, with `total`/`results` metadata and
    /// page fields when paginated.
    pub async fn find_all(&self, ctx: &Context, params: &FindAllParams) -> Envelope<Vec<T>> {
        self.enter("find_all", ctx);
        match self.cached_find_all(params).await {
            Ok((records, meta)) => Envelope::with_meta(records, meta),
            Err(err) => Envelope::fail(err),
        }
    }

    pub async fn find_one(&self, ctx: &Context, filter: &Filter, options: &ReadOptions) -> Envelope<T> {
        self.enter("find_one", ctx);
        Envelope::from_result(self.try_find_one(filter, options).await)
    }

    pub async fn find_by_id(&self, ctx: &Context, id: &T::Id, options: &ReadOptions) -> Envelope<T> {
        self.enter("find_by_id", ctx);
        Envelope::from_result(self.try_find_by_id(id, options).await)
    }

    pub async fn count(&self, ctx: &Context, filter: &Filter, include_deleted: bool) -> Envelope<u64> {
        self.enter("count", ctx);
        let result = self.repository.count_documents(filter, include_deleted).await;
        Envelope::from_result(result.map_err(ServiceError::from))
    }

    pub async fn exists(&self, ctx: &Context, filter: &Filter, include_deleted: bool) -> Envelope<bool> {
        self.enter("exists", ctx);
        let result = self.repository.exists(filter, include_deleted).await;
        Envelope::from_result(result.map_err(ServiceError::from))
    }

    pub(crate) async fn cached_find_all(
        &self,
        params: &FindAllParams,
    ) -> Result<(Vec<T>, PageMeta), ServiceError> {
        let mut keyed = params.clone();
        for field in &self.config.cache.ignored_fields {
            keyed.query.remove(field);
        }
        let key = self.cache_key("find_all", &keyed)?;
        self.cached(key, || self.compute_find_all(params)).await
    }

    async fn compute_find_all(&self, params: &FindAllParams) -> Result<(Vec<T>, PageMeta), ServiceError> {
        let filter = self.build_filter(&params.query, params.search.as_deref());
        let sort = params
            .sort
            .clone()
            .unwrap_or_else(|| self.config.filter.default_sort.clone());

        let total = self
            .repository
            .count_documents(&Filter::new(), params.include_deleted)
            .await?;
        let results = self
            .repository
            .count_documents(&filter, params.include_deleted)
            .await?;

        let pageable = params.paginate.then(|| {
            let defaults = &self.config.pagination;
            Pageable::clamped(
                params.page.unwrap_or(defaults.default_page),
                params.limit.unwrap_or(defaults.default_limit),
                defaults.max_limit,
            )
        });
        let mut options = FindOptions::new().sort(sort);
        if let Some(pageable) = &pageable {
            options = options.skip(pageable.offset()).limit(pageable.limit);
        }

        let records = self
            .repository
            .find_all(&filter, &options, params.include_deleted)
            .await?;
        let records = self.expand_all(records, params.expand).await?;

        let meta = match pageable {
            Some(pageable) => PageMeta::paginated(total, results, &pageable, records.len() as u64),
            None => PageMeta::unpaginated(total, results),
        };
        Ok((records, meta))
    }

    /// Caller query (allowed fields and custom filters applied) AND the
    /// search term as an OR of substring matches over the searched fields.
    pub(crate) fn build_filter(&self, query: &Document, search: Option<&str>) -> Filter {
        let config = &self.config.filter;
        let mut filter = Filter::new();
        for (key, value) in query {
            if let Some(custom) = config.custom_filters.get(key) {
                filter = filter.and(custom(value));
                continue;
            }
            if !config.allowed_fields.is_empty() && !config.allowed_fields.iter().any(|f| f == key) {
                trace!(field = %key, "ignoring filter on field outside allowed set");
                continue;
            }
            filter = filter.where_eq(key, value.clone());
        }

        let search_config = &self.config.search;
        if let Some(term) = search.map(str::trim).filter(|t| !t.is_empty()) {
            if search_config.enabled {
                let alternatives: Vec<Filter> = search_config
                    .searched_fields()
                    .into_iter()
                    .map(|field| Filter::new().where_contains(field, term, !search_config.case_sensitive))
                    .collect();
                if !alternatives.is_empty() {
                    filter = filter.or(alternatives);
                }
            }
        }
        filter
    }

    async fn try_find_one(&self, filter: &Filter, options: &ReadOptions) -> Result<T, ServiceError> {
        let key = self.cache_key("find_one", &(filter, options))?;
        self.cached(key, || async {
            let record = self
                .repository
                .find_one(filter, &FindOptions::new(), options.include_deleted)
                .await?
                .ok_or_else(|| self.not_found())?;
            self.maybe_expand(record, options.expand).await
        })
        .await
    }

    async fn try_find_by_id(&self, id: &T::Id, options: &ReadOptions) -> Result<T, ServiceError> {
        let key = self.cache_key("find_by_id", &(id, options))?;
        self.cached(key, || async {
            let record = self
                .repository
                .find_by_id(id, options.include_deleted)
                .await?
                .ok_or_else(|| self.not_found())?;
            self.maybe_expand(record, options.expand).await
        })
        .await
    }

    // -----------------------------------------------------------------------
    // Cache
    // -----------------------------------------------------------------------

    fn cache_key(&self, operation: &str, args: &impl Serialize) -> Result<String, ServiceError> {
        let args = serde_json::to_string(args).map_err(DataError::from)?;
        Ok(format!("{}:{operation}:{args}", T::collection_name()))
    }

    /// Return the cached value for `key`, or run `compute` and cache its
    /// successful result. Errors are never cached.
    async fn cached<V, F, Fut>(&self, key: String, compute: F) -> Result<V, ServiceError>
    where
        V: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, ServiceError>>,
    {
        if !self.config.cache.enabled {
            return compute().await;
        }
        if let Some(bytes) = self.cache.get(&key) {
            match serde_json::from_slice(&bytes) {
                Ok(value) => {
                    trace!(key = %key, "cache hit");
                    return Ok(value);
                }
                Err(err) => warn!(key = %key, error = %err, "discarding unreadable cache entry"),
            }
        }
        trace!(key = %key, "cache miss");
        let value = compute().await?;
        match serde_json::to_vec(&value) {
            Ok(bytes) => self.cache.insert(key, Bytes::from(bytes)),
            Err(err) => warn!(key = %key, error = %err, "result not cacheable"),
        }
        Ok(value)
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    pub async fn create(&self, ctx: &Context, data: Document) -> Envelope<T> {
        self.enter("create", ctx);
        Envelope::from_result(self.try_create(ctx, data).await)
    }

    pub(crate) async fn try_create(&self, ctx: &Context, mut data: Document) -> Result<T, ServiceError> {
        let hooks = &self.config.hooks;
        hooks.before_create(ctx, &mut data).await?;
        self.check_unique(&data, None).await?;
        self.validate(ctx, &data).await?;
        self.assign_slug(&mut data, None).await?;
        let created = self.repository.create(ctx, data).await?;
        hooks.after_create(ctx, &created).await?;
        self.maybe_expand(created, None).await
    }

    /// Update the first visible record matching `filter` with `data`.
    pub async fn update(&self, ctx: &Context, filter: &Filter, data: Document) -> Envelope<T> {
        self.enter("update", ctx);
        Envelope::from_result(self.try_update(ctx, filter, data).await)
    }

    pub async fn update_by_id(&self, ctx: &Context, id: &T::Id, data: Document) -> Envelope<T> {
        self.enter("update_by_id", ctx);
        let result = match Repository::<T, S>::id_filter(id) {
            Ok(filter) => self.try_update(ctx, &filter, data).await,
            Err(err) => Err(err.into()),
        };
        Envelope::from_result(result)
    }

    async fn try_update(&self, ctx: &Context, filter: &Filter, mut data: Document) -> Result<T, ServiceError> {
        let existing = self
            .repository
            .find_one(filter, &FindOptions::new(), false)
            .await?
            .ok_or_else(|| self.not_found())?;

        let hooks = &self.config.hooks;
        hooks.before_update(ctx, &existing, &mut data).await?;
        Self::strip_identity(&mut data);
        self.check_unique(&data, Some(existing.id())).await?;
        self.validate(ctx, &data).await?;
        if self.slug_source_changed(&existing, &data)? {
            self.assign_slug(&mut data, Some(existing.id())).await?;
        }

        let updated = self
            .repository
            .update_by_id(ctx, existing.id(), Patch::from_document(data), false)
            .await?
            .ok_or_else(|| self.not_found())?;
        hooks.after_update(ctx, &updated).await?;
        self.maybe_expand(updated, None).await
    }

    /// Delete the first visible record matching `filter`, softly unless soft
    /// delete is disabled.
    pub async fn delete(&self, ctx: &Context, filter: &Filter) -> Envelope<T> {
        self.enter("delete", ctx);
        Envelope::from_result(self.try_delete(ctx, filter).await)
    }

    pub async fn delete_by_id(&self, ctx: &Context, id: &T::Id) -> Envelope<T> {
        self.enter("delete_by_id", ctx);
        let result = match Repository::<T, S>::id_filter(id) {
            Ok(filter) => self.try_delete(ctx, &filter).await,
            Err(err) => Err(err.into()),
        };
        Envelope::from_result(result)
    }

    async fn try_delete(&self, ctx: &Context, filter: &Filter) -> Result<T, ServiceError> {
        let existing = self
            .repository
            .find_one(filter, &FindOptions::new(), false)
            .await?
            .ok_or_else(|| self.not_found())?;

        let hooks = &self.config.hooks;
        hooks.before_delete(ctx, &existing).await?;
        let deleted = self
            .repository
            .delete_by_id(ctx, existing.id(), self.config.soft_delete)
            .await?
            .ok_or_else(|| self.not_found())?;
        hooks.after_delete(ctx, &deleted).await?;
        self.maybe_expand(deleted, None).await
    }

    /// Clear the soft-delete markers of the first soft-deleted record
    /// matching `filter`.
    pub async fn restore(&self, ctx: &Context, filter: &Filter) -> Envelope<T> {
        self.enter("restore", ctx);
        Envelope::from_result(self.try_restore(ctx, filter).await)
    }

    pub async fn restore_by_id(&self, ctx: &Context, id: &T::Id) -> Envelope<T> {
        self.enter("restore_by_id", ctx);
        let result = match Repository::<T, S>::id_filter(id) {
            Ok(filter) => self.try_restore(ctx, &filter).await,
            Err(err) => Err(err.into()),
        };
        Envelope::from_result(result)
    }

    async fn try_restore(&self, ctx: &Context, filter: &Filter) -> Result<T, ServiceError> {
        self.ensure_soft_delete("restore")?;
        let target = self
            .repository
            .find_deleted(filter)
            .await?
            .ok_or_else(|| self.not_found())?;
        // A live record may have taken one of its unique values meanwhile
        self.check_unique(&to_document(&target)?, Some(target.id())).await?;
        let restored = self
            .repository
            .restore_by_id(ctx, target.id())
            .await?
            .ok_or_else(|| self.not_found())?;
        self.maybe_expand(restored, None).await
    }

    pub(crate) fn ensure_soft_delete(&self, operation: &str) -> Result<(), ServiceError> {
        if self.config.soft_delete {
            Ok(())
        } else {
            Err(ServiceError::OperationNotSupported(format!(
                "{operation} on `{}`: soft delete is disabled",
                T::collection_name()
            )))
        }
    }

    /// Copy a live record into a new one through the create pipeline.
    ///
    /// Identity, timestamps, audit and soft-delete fields are dropped, then
    /// `overrides` are applied on top of the copy.
    pub async fn clone_record(&self, ctx: &Context, id: &T::Id, overrides: Document) -> Envelope<T> {
        self.enter("clone", ctx);
        Envelope::from_result(self.try_clone(ctx, id, overrides).await)
    }

    async fn try_clone(&self, ctx: &Context, id: &T::Id, overrides: Document) -> Result<T, ServiceError> {
        let source = self
            .repository
            .find_by_id(id, false)
            .await?
            .ok_or_else(|| self.not_found())?;
        let mut data = to_document(&source)?;
        for field in [
            T::id_field(),
            fields::CREATED_AT,
            fields::UPDATED_AT,
            fields::DELETED_AT,
            fields::DELETED_BY,
            fields::CREATED_BY,
            fields::UPDATED_BY,
        ] {
            data.remove(field);
        }
        data.extend(overrides);
        self.try_create(ctx, data).await
    }

    // -----------------------------------------------------------------------
    // Pipeline stages
    // -----------------------------------------------------------------------

    /// Drop the fields an update may never overwrite: the id and the
    /// creation timestamp.
    pub(crate) fn strip_identity(data: &mut Document) {
        data.remove(T::id_field());
        data.remove(fields::CREATED_AT);
    }

    /// Reject `data` when it sets a unique field to a value a live record
    /// (other than `exclude`) already holds.
    pub(crate) async fn check_unique(&self, data: &Document, exclude: Option<&T::Id>) -> Result<(), ServiceError> {
        for field in self.unique_fields.iter() {
            let Some(value) = data.get(field).filter(|v| !v.is_null()) else {
                continue;
            };
            let mut filter = Filter::new().where_eq(field, value.clone());
            if let Some(id) = exclude {
                filter = filter.where_not_eq(T::id_field(), id_value(id)?);
            }
            if self.repository.exists(&filter, false).await? {
                return Err(ServiceError::UniqueField {
                    field: field.clone(),
                    value: value.clone(),
                });
            }
        }
        Ok(())
    }

    /// Pre-document validator, per-field validators for fields present in
    /// `data`, post-document validator.
    pub(crate) async fn validate(&self, ctx: &Context, data: &Document) -> Result<(), ServiceError> {
        let validation = &self.config.validation;
        if let Some(pre) = &validation.pre {
            pre.validate(ctx, data)
                .await
                .map_err(|message| ServiceError::validation(None, message))?;
        }
        for (field, validator) in &validation.fields {
            let Some(value) = data.get(field) else {
                continue;
            };
            if !validator.validate(ctx, value, data).await {
                return Err(ServiceError::validation(
                    Some(field.as_str()),
                    format!("invalid value `{value}`"),
                ));
            }
        }
        if let Some(post) = &validation.post {
            post.validate(ctx, data)
                .await
                .map_err(|message| ServiceError::validation(None, message))?;
        }
        Ok(())
    }

    async fn assign_slug(&self, data: &mut Document, exclude: Option<&T::Id>) -> Result<(), ServiceError> {
        let slug = &self.config.slug;
        if !slug.enabled {
            return Ok(());
        }
        let Some(source) = data.get(&slug.source_field).and_then(Value::as_str).map(str::to_string) else {
            return Ok(());
        };
        let exclude = exclude.map(|id| id_value(id)).transpose()?;
        let assigned = unique_slug(slug, &source, |candidate| self.slug_taken(candidate, exclude.clone())).await?;
        if let Some(value) = assigned {
            data.insert(slug.target_field.clone(), Value::String(value));
        }
        Ok(())
    }

    /// Whether any record, soft-deleted ones included, already holds `candidate`.
    pub(crate) async fn slug_taken(&self, candidate: String, exclude: Option<Value>) -> Result<bool, ServiceError> {
        let mut filter = Filter::new().where_eq(&self.config.slug.target_field, candidate);
        if let Some(id) = exclude {
            filter = filter.where_not_eq(T::id_field(), id);
        }
        Ok(self.repository.exists(&filter, true).await?)
    }

    fn slug_source_changed(&self, existing: &T, data: &Document) -> Result<bool, ServiceError> {
        let slug = &self.config.slug;
        if !slug.enabled {
            return Ok(false);
        }
        let Some(incoming) = data.get(&slug.source_field) else {
            return Ok(false);
        };
        let current = to_document(existing)?;
        Ok(current.get(&slug.source_field) != Some(incoming))
    }

    // -----------------------------------------------------------------------
    // Expansion
    // -----------------------------------------------------------------------

    fn should_expand(&self, expand: Option<bool>) -> bool {
        let config = &self.config.expand;
        !config.fields.is_empty() && expand.unwrap_or(config.default_expand)
    }

    async fn maybe_expand(&self, record: T, expand: Option<bool>) -> Result<T, ServiceError> {
        if !self.should_expand(expand) {
            return Ok(record);
        }
        let document = self.expand_document(to_document(&record)?).await?;
        Ok(from_document(document)?)
    }

    async fn expand_all(&self, records: Vec<T>, expand: Option<bool>) -> Result<Vec<T>, ServiceError> {
        if !self.should_expand(expand) {
            return Ok(records);
        }
        let mut expanded = Vec::with_capacity(records.len());
        for record in records {
            expanded.push(self.maybe_expand(record, expand).await?);
        }
        Ok(expanded)
    }

    /// Replace each configured relation id (or array of ids) with the live
    /// referenced record. Ids that resolve to nothing are left in place.
    async fn expand_document(&self, mut document: Document) -> Result<Document, ServiceError> {
        for relation in &self.config.expand.fields {
            let Some(value) = document.get(&relation.field).cloned() else {
                continue;
            };
            let expanded = match value {
                Value::Array(items) => {
                    let mut out = Vec::with_capacity(items.len());
                    for item in items {
                        out.push(self.expand_one(relation, item).await?);
                    }
                    Value::Array(out)
                }
                other => self.expand_one(relation, other).await?,
            };
            document.insert(relation.field.clone(), expanded);
        }
        Ok(document)
    }

    async fn expand_one(&self, relation: &ExpandField, id: Value) -> Result<Value, ServiceError> {
        if !(id.is_string() || id.is_number()) {
            return Ok(id);
        }
        let filter = Filter::new().where_eq(&relation.id_field, id.clone());
        let found = self
            .repository
            .find_related(&relation.collection, &filter, false)
            .await?;
        Ok(found.map(Value::Object).unwrap_or(id))
    }
}
