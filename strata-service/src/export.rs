use crate::envelope::Envelope;
use crate::error::ServiceError;
use crate::params::FindAllParams;
use crate::service::Service;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use strata_data::{to_document, Context, Document, DocumentStore, Entity};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportFormat {
    /// Structured rows.
    #[default]
    Rows,
    /// Delimited text with a header row.
    Delimited { delimiter: u8 },
}

impl ExportFormat {
    pub fn csv() -> Self {
        ExportFormat::Delimited { delimiter: b',' }
    }
}

/// Field selection and output format of an export. `include` and `exclude`
/// are mutually exclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportOptions {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub format: ExportFormat,
}

impl ExportOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.include = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn exclude<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.exclude = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn format(mut self, format: ExportFormat) -> Self {
        self.format = format;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Export {
    Rows(Vec<Document>),
    Text(String),
}

impl<T: Entity, S: DocumentStore> Service<T, S> {
    /// Every record matching `params` (pagination ignored), projected and
    /// rendered per `options`. Virtual fields are added before projection.
    pub async fn export(&self, ctx: &Context, params: &FindAllParams, options: &ExportOptions) -> Envelope<Export> {
        self.enter("export", ctx);
        Envelope::from_result(self.try_export(params, options).await)
    }

    async fn try_export(&self, params: &FindAllParams, options: &ExportOptions) -> Result<Export, ServiceError> {
        if !options.include.is_empty() && !options.exclude.is_empty() {
            return Err(ServiceError::Export(
                "include and exclude field lists are mutually exclusive".into(),
            ));
        }

        let params = params.clone().unpaginated();
        let (records, _) = self.cached_find_all(&params).await?;
        let mut rows = Vec::with_capacity(records.len());
        for record in &records {
            let row = self.with_virtual_fields(to_document(record)?);
            rows.push(project(row, options));
        }

        match options.format {
            ExportFormat::Rows => Ok(Export::Rows(rows)),
            ExportFormat::Delimited { delimiter } => {
                let header = if options.include.is_empty() {
                    rows.iter()
                        .flat_map(|row| row.keys().cloned())
                        .collect::<BTreeSet<_>>()
                        .into_iter()
                        .collect()
                } else {
                    options.include.clone()
                };
                render_delimited(&header, &rows, delimiter).map(Export::Text)
            }
        }
    }
}

fn project(row: Document, options: &ExportOptions) -> Document {
    if !options.include.is_empty() {
        let mut out = Document::new();
        for field in &options.include {
            if let Some(value) = row.get(field) {
                out.insert(field.clone(), value.clone());
            }
        }
        out
    } else {
        row.into_iter()
            .filter(|(k, _)| !options.exclude.contains(k))
            .collect()
    }
}

fn render_delimited(header: &[String], rows: &[Document], delimiter: u8) -> Result<String, ServiceError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());
    writer.write_record(header).map_err(export_error)?;
    for row in rows {
        writer
            .write_record(header.iter().map(|field| cell(row.get(field))))
            .map_err(export_error)?;
    }
    let bytes = writer.into_inner().map_err(export_error)?;
    String::from_utf8(bytes).map_err(export_error)
}

fn export_error(err: impl std::fmt::Display) -> ServiceError {
    ServiceError::Export(err.to_string())
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
