use crate::aggregate::Stage;
use crate::entity::Document;
use crate::error::DataError;
use crate::patch::Patch;
use crate::query::{Filter, FindOptions};
use std::future::Future;

/// The storage-access contract a persistence engine must satisfy.
///
/// Every method addresses a named collection. Single-document writes are
/// expected to be atomic; nothing here implies multi-document transactions.
///
/// Uses RPITIT (return-position `impl Trait` in traits), no `async-trait` needed.
pub trait DocumentStore: Clone + Send + Sync + 'static {
    /// Insert one document and return it as stored. The store assigns an
    /// identity when the document carries none.
    fn insert_one(
        &self,
        collection: &str,
        document: Document,
    ) -> impl Future<Output = Result<Document, DataError>> + Send;

    /// Insert several documents. With `ordered`, the first failure aborts the
    /// remaining inserts and is returned; otherwise failures are skipped and
    /// the successfully stored documents are returned.
    fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
        ordered: bool,
    ) -> impl Future<Output = Result<Vec<Document>, DataError>> + Send;

    fn find(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> impl Future<Output = Result<Vec<Document>, DataError>> + Send;

    fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> impl Future<Output = Result<Option<Document>, DataError>> + Send;

    /// Apply `patch` to the first matching document and return it updated.
    fn find_one_and_update(
        &self,
        collection: &str,
        filter: &Filter,
        patch: &Patch,
    ) -> impl Future<Output = Result<Option<Document>, DataError>> + Send;

    /// Apply `patch` to every matching document, returning how many changed.
    fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        patch: &Patch,
    ) -> impl Future<Output = Result<u64, DataError>> + Send;

    fn find_one_and_delete(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> impl Future<Output = Result<Option<Document>, DataError>> + Send;

    fn delete_many(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> impl Future<Output = Result<u64, DataError>> + Send;

    fn count(
        &self,
        collection: &str,
        filter: &Filter,
    ) -> impl Future<Output = Result<u64, DataError>> + Send;

    fn aggregate(
        &self,
        collection: &str,
        stages: &[Stage],
    ) -> impl Future<Output = Result<Vec<Document>, DataError>> + Send;
}
