use async_trait::async_trait;
use serde_json::Value;
use strata_data::{Context, Document};

/// Validates one field of incoming data. Runs only when the field is
/// present in the input.
///
/// Plain closures `Fn(&Value) -> bool` implement this trait.
#[async_trait]
pub trait FieldValidator: Send + Sync {
    async fn validate(&self, ctx: &Context, value: &Value, data: &Document) -> bool;
}

#[async_trait]
impl<F> FieldValidator for F
where
    F: Fn(&Value) -> bool + Send + Sync,
{
    async fn validate(&self, _ctx: &Context, value: &Value, _data: &Document) -> bool {
        self(value)
    }
}

/// Validates the whole incoming document; the error string becomes the
/// validation message.
///
/// Plain closures `Fn(&Document) -> Result<(), String>` implement this trait.
#[async_trait]
pub trait DocumentValidator: Send + Sync {
    async fn validate(&self, ctx: &Context, data: &Document) -> Result<(), String>;
}

#[async_trait]
impl<F> DocumentValidator for F
where
    F: Fn(&Document) -> Result<(), String> + Send + Sync,
{
    async fn validate(&self, _ctx: &Context, data: &Document) -> Result<(), String> {
        self(data)
    }
}
