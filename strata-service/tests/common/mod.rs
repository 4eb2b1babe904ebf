#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strata_data::{Document, Entity, Ref, Repository};
use strata_data_memory::MemoryStore;
use strata_service::{Service, ServiceOptions};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Entity for Category {
    type Id = String;

    fn collection_name() -> &'static str {
        "categories"
    }

    fn id(&self) -> &String {
        &self.id
    }

    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub price: Option<i64>,
    #[serde(default)]
    pub category: Option<Ref<Category>>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted_by: Option<String>,
}

impl Entity for Product {
    type Id = String;

    fn collection_name() -> &'static str {
        "products"
    }

    fn unique_fields() -> &'static [&'static str] {
        &["sku"]
    }

    fn id(&self) -> &String {
        &self.id
    }

    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }
}

pub fn doc(value: Value) -> Document {
    value.as_object().cloned().expect("object literal")
}

/// A service over a fresh store, plus a handle on that store.
pub fn service(options: ServiceOptions<Product>) -> (Service<Product, MemoryStore>, MemoryStore) {
    let store = MemoryStore::new();
    let service = Service::new(Repository::new(store.clone()), options);
    (service, store)
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
