use crate::envelope::Envelope;
use crate::error::ServiceError;
use crate::service::Service;
use strata_data::{Context, Document, DocumentStore, Entity};

impl<T: Entity, S: DocumentStore> Service<T, S> {
    /// Build the pipeline registered under `name` from `params`, run it and
    /// add the configured virtual fields to every row.
    ///
    /// Pipelines see soft-deleted records; match on `deletedAt` inside the
    /// pipeline to exclude them.
    pub async fn aggregate(&self, ctx: &Context, name: &str, params: &Document) -> Envelope<Vec<Document>> {
        self.enter("aggregate", ctx);
        Envelope::from_result(self.try_aggregate(name, params).await)
    }

    async fn try_aggregate(&self, name: &str, params: &Document) -> Result<Vec<Document>, ServiceError> {
        let build = self
            .config
            .aggregation
            .pipelines
            .get(name)
            .ok_or_else(|| ServiceError::PipelineNotFound(name.to_string()))?;
        let stages = build(params);
        tracing::trace!(pipeline = name, stages = stages.len(), "running aggregation");
        let rows = self.repository.aggregate(&stages).await?;
        Ok(rows.into_iter().map(|row| self.with_virtual_fields(row)).collect())
    }

    pub(crate) fn with_virtual_fields(&self, mut row: Document) -> Document {
        for (name, compute) in &self.config.aggregation.virtual_fields {
            let value = compute(&row);
            row.insert(name.clone(), value);
        }
        row
    }
}
