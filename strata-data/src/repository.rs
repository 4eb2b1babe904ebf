use crate::aggregate::Stage;
use crate::context::Context;
use crate::entity::{fields, from_document, now_value, Document, Entity};
use crate::error::DataError;
use crate::interceptor::{Interceptor, WriteContext, WriteKind};
use crate::patch::Patch;
use crate::query::{Filter, FindOptions};
use crate::store::DocumentStore;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;

/// The only component that issues persistence operations for an entity.
///
/// Every read, update and delete excludes soft-deleted records unless
/// `include_deleted` is passed; `restore*` targets only soft-deleted records.
/// `aggregate` is a raw pass-through with no visibility filtering.
///
/// # Example
///
/// ```ignore
/// let repo = Repository::<Product, _>::new(MemoryStore::new())
///     .intercept(Interceptor::Audit);
/// let product = repo.create(&ctx, doc).await?;
/// ```
pub struct Repository<T, S> {
    store: S,
    interceptors: Arc<Vec<Interceptor>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T, S: Clone> Clone for Repository<T, S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            interceptors: self.interceptors.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Entity, S: DocumentStore> Repository<T, S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            interceptors: Arc::new(Vec::new()),
            _marker: PhantomData,
        }
    }

    /// Append an interceptor to the write pipeline.
    pub fn intercept(mut self, interceptor: Interceptor) -> Self {
        Arc::make_mut(&mut self.interceptors).push(interceptor);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn collection(&self) -> &'static str {
        T::collection_name()
    }

    /// Equality filter on the entity's id field.
    pub fn id_filter(id: &T::Id) -> Result<Filter, DataError> {
        Ok(Filter::new().where_eq(T::id_field(), serde_json::to_value(id)?))
    }

    fn visible(filter: &Filter, include_deleted: bool) -> Filter {
        if include_deleted {
            filter.clone()
        } else {
            filter.clone().where_null(fields::DELETED_AT)
        }
    }

    fn prepare_insert(&self, ctx: &Context, mut document: Document) -> Result<Document, DataError> {
        let now = now_value();
        document.insert(fields::CREATED_AT.to_string(), now.clone());
        document.insert(fields::UPDATED_AT.to_string(), now);
        let wctx = self.write_context(ctx, WriteKind::Insert);
        for interceptor in self.interceptors.iter() {
            interceptor.before_insert(&wctx, &mut document)?;
        }
        Ok(document)
    }

    fn prepare_update(&self, ctx: &Context, kind: WriteKind, mut patch: Patch) -> Result<Patch, DataError> {
        patch.set.insert(fields::UPDATED_AT.to_string(), now_value());
        let wctx = self.write_context(ctx, kind);
        for interceptor in self.interceptors.iter() {
            interceptor.before_update(&wctx, &mut patch)?;
        }
        Ok(patch)
    }

    fn finish(&self, ctx: &Context, kind: WriteKind, document: Document) -> Result<T, DataError> {
        let wctx = self.write_context(ctx, kind);
        for interceptor in self.interceptors.iter() {
            interceptor.after_write(&wctx, T::id_field(), &document);
        }
        from_document(document)
    }

    fn write_context<'a>(&self, ctx: &'a Context, kind: WriteKind) -> WriteContext<'a> {
        WriteContext {
            collection: T::collection_name(),
            kind,
            ctx,
        }
    }

    pub async fn create(&self, ctx: &Context, document: Document) -> Result<T, DataError> {
        let document = self.prepare_insert(ctx, document)?;
        let stored = self.store.insert_one(T::collection_name(), document).await?;
        self.finish(ctx, WriteKind::Insert, stored)
    }

    pub async fn create_many(
        &self,
        ctx: &Context,
        documents: Vec<Document>,
        ordered: bool,
    ) -> Result<Vec<T>, DataError> {
        let documents = documents
            .into_iter()
            .map(|d| self.prepare_insert(ctx, d))
            .collect::<Result<Vec<_>, _>>()?;
        let stored = self
            .store
            .insert_many(T::collection_name(), documents, ordered)
            .await?;
        stored
            .into_iter()
            .map(|d| self.finish(ctx, WriteKind::Insert, d))
            .collect()
    }

    pub async fn find_all(
        &self,
        filter: &Filter,
        options: &FindOptions,
        include_deleted: bool,
    ) -> Result<Vec<T>, DataError> {
        let filter = Self::visible(filter, include_deleted);
        self.store
            .find(T::collection_name(), &filter, options)
            .await?
            .into_iter()
            .map(from_document)
            .collect()
    }

    pub async fn find_one(
        &self,
        filter: &Filter,
        options: &FindOptions,
        include_deleted: bool,
    ) -> Result<Option<T>, DataError> {
        let filter = Self::visible(filter, include_deleted);
        self.store
            .find_one(T::collection_name(), &filter, options)
            .await?
            .map(from_document)
            .transpose()
    }

    pub async fn find_by_id(&self, id: &T::Id, include_deleted: bool) -> Result<Option<T>, DataError> {
        self.find_one(&Self::id_filter(id)?, &FindOptions::default(), include_deleted)
            .await
    }

    /// First soft-deleted record matching `filter`, the one `restore` would target.
    pub async fn find_deleted(&self, filter: &Filter) -> Result<Option<T>, DataError> {
        let filter = filter.clone().where_not_null(fields::DELETED_AT);
        self.store
            .find_one(T::collection_name(), &filter, &FindOptions::default())
            .await?
            .map(from_document)
            .transpose()
    }

    /// Look up a raw document in another collection, e.g. to expand a
    /// reference. The same soft-delete visibility rule applies there.
    pub async fn find_related(
        &self,
        collection: &str,
        filter: &Filter,
        include_deleted: bool,
    ) -> Result<Option<Document>, DataError> {
        let filter = Self::visible(filter, include_deleted);
        self.store.find_one(collection, &filter, &FindOptions::default()).await
    }

    pub async fn update(
        &self,
        ctx: &Context,
        filter: &Filter,
        patch: Patch,
        include_deleted: bool,
    ) -> Result<Option<T>, DataError> {
        let filter = Self::visible(filter, include_deleted);
        let patch = self.prepare_update(ctx, WriteKind::Update, patch)?;
        match self
            .store
            .find_one_and_update(T::collection_name(), &filter, &patch)
            .await?
        {
            Some(doc) => self.finish(ctx, WriteKind::Update, doc).map(Some),
            None => Ok(None),
        }
    }

    pub async fn update_by_id(
        &self,
        ctx: &Context,
        id: &T::Id,
        patch: Patch,
        include_deleted: bool,
    ) -> Result<Option<T>, DataError> {
        self.update(ctx, &Self::id_filter(id)?, patch, include_deleted)
            .await
    }

    /// Update every non-deleted record matching `filter`.
    pub async fn update_many(&self, ctx: &Context, filter: &Filter, patch: Patch) -> Result<u64, DataError> {
        let filter = Self::visible(filter, false);
        let patch = self.prepare_update(ctx, WriteKind::Update, patch)?;
        self.store
            .update_many(T::collection_name(), &filter, &patch)
            .await
    }

    fn soft_delete_patch(ctx: &Context) -> Patch {
        Patch::new()
            .set(fields::DELETED_AT, now_value())
            .set(
                fields::DELETED_BY,
                ctx.actor().map(Value::from).unwrap_or(Value::Null),
            )
    }

    fn restore_patch() -> Patch {
        Patch::new()
            .set(fields::DELETED_AT, Value::Null)
            .set(fields::DELETED_BY, Value::Null)
    }

    /// Delete the first visible record matching `filter`. The soft path marks
    /// `deletedAt`; the hard path removes the record from the store.
    pub async fn delete(&self, ctx: &Context, filter: &Filter, soft_delete: bool) -> Result<Option<T>, DataError> {
        let filter = Self::visible(filter, false);
        if soft_delete {
            let patch = self.prepare_update(ctx, WriteKind::SoftDelete, Self::soft_delete_patch(ctx))?;
            match self
                .store
                .find_one_and_update(T::collection_name(), &filter, &patch)
                .await?
            {
                Some(doc) => self.finish(ctx, WriteKind::SoftDelete, doc).map(Some),
                None => Ok(None),
            }
        } else {
            match self
                .store
                .find_one_and_delete(T::collection_name(), &filter)
                .await?
            {
                Some(doc) => self.finish(ctx, WriteKind::HardDelete, doc).map(Some),
                None => Ok(None),
            }
        }
    }

    pub async fn delete_by_id(&self, ctx: &Context, id: &T::Id, soft_delete: bool) -> Result<Option<T>, DataError> {
        self.delete(ctx, &Self::id_filter(id)?, soft_delete).await
    }

    pub async fn delete_many(&self, ctx: &Context, filter: &Filter, soft_delete: bool) -> Result<u64, DataError> {
        let filter = Self::visible(filter, false);
        if soft_delete {
            let patch = self.prepare_update(ctx, WriteKind::SoftDelete, Self::soft_delete_patch(ctx))?;
            self.store
                .update_many(T::collection_name(), &filter, &patch)
                .await
        } else {
            self.store.delete_many(T::collection_name(), &filter).await
        }
    }

    /// Clear the soft-delete markers of the first soft-deleted record matching `filter`.
    pub async fn restore(&self, ctx: &Context, filter: &Filter) -> Result<Option<T>, DataError> {
        let filter = filter.clone().where_not_null(fields::DELETED_AT);
        let patch = self.prepare_update(ctx, WriteKind::Restore, Self::restore_patch())?;
        match self
            .store
            .find_one_and_update(T::collection_name(), &filter, &patch)
            .await?
        {
            Some(doc) => self.finish(ctx, WriteKind::Restore, doc).map(Some),
            None => Ok(None),
        }
    }

    pub async fn restore_by_id(&self, ctx: &Context, id: &T::Id) -> Result<Option<T>, DataError> {
        self.restore(ctx, &Self::id_filter(id)?).await
    }

    pub async fn restore_many(&self, ctx: &Context, filter: &Filter) -> Result<u64, DataError> {
        let filter = filter.clone().where_not_null(fields::DELETED_AT);
        let patch = self.prepare_update(ctx, WriteKind::Restore, Self::restore_patch())?;
        self.store
            .update_many(T::collection_name(), &filter, &patch)
            .await
    }

    pub async fn count_documents(&self, filter: &Filter, include_deleted: bool) -> Result<u64, DataError> {
        let filter = Self::visible(filter, include_deleted);
        self.store.count(T::collection_name(), &filter).await
    }

    pub async fn exists(&self, filter: &Filter, include_deleted: bool) -> Result<bool, DataError> {
        let filter = Self::visible(filter, include_deleted);
        let found = self
            .store
            .find_one(T::collection_name(), &filter, &FindOptions::new().project(Vec::<String>::new()))
            .await?;
        Ok(found.is_some())
    }

    /// Run raw pipeline stages. Soft-deleted records are not filtered out;
    /// pipelines must match on `deletedAt` themselves.
    pub async fn aggregate(&self, stages: &[Stage]) -> Result<Vec<Document>, DataError> {
        self.store.aggregate(T::collection_name(), stages).await
    }
}
