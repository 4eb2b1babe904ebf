mod common;

use common::{doc, init_tracing, service, Product};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use strata_data::{Context, Document, Filter};
use strata_service::{
    async_trait, Hooks, ReadOptions, ServiceError, ServiceOptions, ValidationOptions,
};

#[tokio::test]
async fn test_create_then_find_by_id() {
    init_tracing();
    let (service, _) = service(ServiceOptions::new());
    let ctx = Context::as_actor("alice");

    let created = service
        .create(&ctx, doc(json!({ "name": "Anvil", "sku": "AN-1", "price": 120 })))
        .await
        .into_result()
        .unwrap();
    assert_eq!(created.name, "Anvil");
    assert!(created.created_at.is_some());

    let found = service
        .find_by_id(&ctx, &created.id, &ReadOptions::new())
        .await
        .into_result()
        .unwrap();
    assert_eq!(found, created);
}

#[tokio::test]
async fn test_missing_record_is_not_found() {
    let (service, _) = service(ServiceOptions::new());
    let ctx = Context::anonymous();
    let env = service
        .find_by_id(&ctx, &"nope".to_string(), &ReadOptions::new())
        .await;
    assert_eq!(env.error().map(ServiceError::code), Some("NOT_FOUND"));

    let env = service.update_by_id(&ctx, &"nope".to_string(), doc(json!({ "price": 1 }))).await;
    assert_eq!(env.error().map(ServiceError::code), Some("NOT_FOUND"));

    let env = service.delete_by_id(&ctx, &"nope".to_string()).await;
    assert_eq!(env.error().map(ServiceError::code), Some("NOT_FOUND"));
}

#[tokio::test]
async fn test_update_changes_fields_and_keeps_identity() {
    let (service, _) = service(ServiceOptions::new());
    let ctx = Context::anonymous();
    let created = service
        .create(&ctx, doc(json!({ "name": "Bolt", "price": 2 })))
        .await
        .into_result()
        .unwrap();

    let updated = service
        .update_by_id(&ctx, &created.id, doc(json!({ "price": 3, "id": "hijacked" })))
        .await
        .into_result()
        .unwrap();
    assert_eq!(updated.id, created.id);
    assert_eq!(updated.price, Some(3));
    assert_eq!(updated.name, "Bolt");

    let by_filter = service
        .update(&ctx, &Filter::new().where_eq("name", "Bolt"), doc(json!({ "price": 4 })))
        .await
        .into_result()
        .unwrap();
    assert_eq!(by_filter.price, Some(4));
}

#[tokio::test]
async fn test_unique_field_rejects_duplicates_but_not_self() {
    let (service, _) = service(ServiceOptions::new());
    let ctx = Context::anonymous();
    let first = service
        .create(&ctx, doc(json!({ "name": "A", "sku": "SKU-1" })))
        .await
        .into_result()
        .unwrap();
    let second = service
        .create(&ctx, doc(json!({ "name": "B", "sku": "SKU-2" })))
        .await
        .into_result()
        .unwrap();

    let dup = service.create(&ctx, doc(json!({ "name": "C", "sku": "SKU-1" }))).await;
    match dup.error() {
        Some(ServiceError::UniqueField { field, value }) => {
            assert_eq!(field, "sku");
            assert_eq!(value, &json!("SKU-1"));
        }
        other => panic!("expected unique field error, got {other:?}"),
    }

    // Re-sending its own value is not a collision
    let same = service
        .update_by_id(&ctx, &first.id, doc(json!({ "sku": "SKU-1", "price": 9 })))
        .await;
    assert!(same.is_success());

    let taken = service
        .update_by_id(&ctx, &second.id, doc(json!({ "sku": "SKU-1" })))
        .await;
    assert_eq!(taken.error().map(ServiceError::code), Some("UNIQUE_FIELD_ERROR"));
}

#[tokio::test]
async fn test_soft_delete_hides_and_restore_reveals() {
    let (service, store) = service(ServiceOptions::new());
    let ctx = Context::as_actor("bob");
    let created = service
        .create(&ctx, doc(json!({ "name": "Chisel" })))
        .await
        .into_result()
        .unwrap();

    let deleted = service.delete_by_id(&ctx, &created.id).await.into_result().unwrap();
    assert!(deleted.deleted_at.is_some());
    assert_eq!(deleted.deleted_by.as_deref(), Some("bob"));
    assert_eq!(store.dump("products").await.len(), 1);

    let hidden = service.find_by_id(&ctx, &created.id, &ReadOptions::new()).await;
    assert_eq!(hidden.error().map(ServiceError::code), Some("NOT_FOUND"));

    let visible = service
        .find_by_id(&ctx, &created.id, &ReadOptions::new().include_deleted())
        .await
        .into_result()
        .unwrap();
    assert!(visible.deleted_at.is_some());

    // Deleting again finds nothing live
    let again = service.delete_by_id(&ctx, &created.id).await;
    assert_eq!(again.error().map(ServiceError::code), Some("NOT_FOUND"));

    let restored = service.restore_by_id(&ctx, &created.id).await.into_result().unwrap();
    assert!(restored.deleted_at.is_none());
    assert!(service
        .find_by_id(&ctx, &created.id, &ReadOptions::new())
        .await
        .is_success());

    let twice = service.restore_by_id(&ctx, &created.id).await;
    assert_eq!(twice.error().map(ServiceError::code), Some("NOT_FOUND"));
}

#[tokio::test]
async fn test_restore_rejects_unique_value_taken_meanwhile() {
    let (service, _) = service(ServiceOptions::new());
    let ctx = Context::anonymous();
    let original = service
        .create(&ctx, doc(json!({ "name": "Chisel", "sku": "CH-1" })))
        .await
        .into_result()
        .unwrap();
    service.delete_by_id(&ctx, &original.id).await.into_result().unwrap();
    let successor = service
        .create(&ctx, doc(json!({ "name": "Chisel v2", "sku": "CH-1" })))
        .await
        .into_result()
        .unwrap();

    let env = service.restore_by_id(&ctx, &original.id).await;
    assert_eq!(env.error().map(ServiceError::code), Some("UNIQUE_FIELD_ERROR"));
    let live = service
        .count(&ctx, &Filter::new().where_eq("sku", "CH-1"), false)
        .await
        .into_result()
        .unwrap();
    assert_eq!(live, 1);

    // Once the value is free again the record comes back
    service.delete_by_id(&ctx, &successor.id).await.into_result().unwrap();
    let restored = service
        .restore(&ctx, &Filter::new().where_eq("name", "Chisel"))
        .await
        .into_result()
        .unwrap();
    assert_eq!(restored.id, original.id);
    assert!(restored.deleted_at.is_none());
}

#[tokio::test]
async fn test_hard_delete_when_soft_delete_disabled() {
    let (service, store) = service(ServiceOptions::new().soft_delete(false));
    let ctx = Context::anonymous();
    let created = service
        .create(&ctx, doc(json!({ "name": "Drill" })))
        .await
        .into_result()
        .unwrap();
    assert!(service.delete_by_id(&ctx, &created.id).await.is_success());
    assert!(store.dump("products").await.is_empty());

    let restore = service.restore(&ctx, &Filter::new()).await;
    assert_eq!(restore.error().map(ServiceError::code), Some("OPERATION_NOT_SUPPORTED"));
}

#[tokio::test]
async fn test_count_and_exists() {
    let (service, _) = service(ServiceOptions::new());
    let ctx = Context::anonymous();
    for name in ["a", "b", "c"] {
        service.create(&ctx, doc(json!({ "name": name }))).await;
    }
    service.delete(&ctx, &Filter::new().where_eq("name", "a")).await;

    assert_eq!(service.count(&ctx, &Filter::new(), false).await.into_result().unwrap(), 2);
    assert_eq!(service.count(&ctx, &Filter::new(), true).await.into_result().unwrap(), 3);
    let by_a = Filter::new().where_eq("name", "a");
    assert!(!service.exists(&ctx, &by_a, false).await.into_result().unwrap());
    assert!(service.exists(&ctx, &by_a, true).await.into_result().unwrap());
}

struct Recorder {
    log: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    fn push(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }
}

#[async_trait]
impl Hooks<Product> for Recorder {
    async fn before_create(&self, _ctx: &Context, data: &mut Document) -> Result<(), ServiceError> {
        self.push("before_create".into());
        if let Some(Value::String(sku)) = data.get_mut("sku") {
            *sku = sku.to_uppercase();
        }
        if data.get("name") == Some(&json!("forbidden")) {
            return Err(ServiceError::validation(Some("name"), "reserved"));
        }
        Ok(())
    }

    async fn after_create(&self, _ctx: &Context, record: &Product) -> Result<(), ServiceError> {
        self.push(format!("after_create:{}", record.name));
        Ok(())
    }

    async fn before_update(&self, _ctx: &Context, existing: &Product, _data: &mut Document) -> Result<(), ServiceError> {
        self.push(format!("before_update:{}", existing.price.unwrap_or_default()));
        Ok(())
    }

    async fn after_update(&self, _ctx: &Context, record: &Product) -> Result<(), ServiceError> {
        self.push(format!("after_update:{}", record.price.unwrap_or_default()));
        Ok(())
    }

    async fn before_delete(&self, _ctx: &Context, _existing: &Product) -> Result<(), ServiceError> {
        self.push("before_delete".into());
        Ok(())
    }

    async fn after_delete(&self, _ctx: &Context, record: &Product) -> Result<(), ServiceError> {
        self.push(format!("after_delete:{}", record.deleted_at.is_some()));
        Ok(())
    }
}

#[tokio::test]
async fn test_hooks_run_in_pipeline_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let (service, store) = service(ServiceOptions::new().hooks(Recorder { log: log.clone() }));
    let ctx = Context::anonymous();

    let created = service
        .create(&ctx, doc(json!({ "name": "Saw", "sku": "sa-1", "price": 1 })))
        .await
        .into_result()
        .unwrap();
    assert_eq!(created.sku.as_deref(), Some("SA-1"));
    service
        .update_by_id(&ctx, &created.id, doc(json!({ "price": 2 })))
        .await
        .into_result()
        .unwrap();
    service.delete_by_id(&ctx, &created.id).await.into_result().unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "before_create",
            "after_create:Saw",
            "before_update:1",
            "after_update:2",
            "before_delete",
            "after_delete:true",
        ]
    );

    let rejected = service.create(&ctx, doc(json!({ "name": "forbidden" }))).await;
    assert_eq!(rejected.error().map(ServiceError::code), Some("VALIDATION_ERROR"));
    assert_eq!(store.dump("products").await.len(), 1);
}

#[tokio::test]
async fn test_validators_reject_input() {
    let validation = ValidationOptions::new()
        .field("price", |v: &Value| v.as_i64().is_some_and(|p| p >= 0))
        .pre(|d: &Document| {
            if d.contains_key("name") || d.contains_key("price") {
                Ok(())
            } else {
                Err("empty update".to_string())
            }
        })
        .post(|d: &Document| match d.get("name").and_then(Value::as_str) {
            Some(name) if name.len() > 20 => Err("name too long".to_string()),
            _ => Ok(()),
        });
    let (service, store) = service(ServiceOptions::new().validation(validation));
    let ctx = Context::anonymous();

    let negative = service
        .create(&ctx, doc(json!({ "name": "Plane", "price": -1 })))
        .await;
    match negative.error() {
        Some(ServiceError::Validation { field, .. }) => assert_eq!(field.as_deref(), Some("price")),
        other => panic!("expected validation error, got {other:?}"),
    }

    let long = service
        .create(&ctx, doc(json!({ "name": "a name that is far too long" })))
        .await;
    assert_eq!(long.error().map(ServiceError::code), Some("VALIDATION_ERROR"));

    let ok = service
        .create(&ctx, doc(json!({ "name": "Plane", "price": 10 })))
        .await
        .into_result()
        .unwrap();
    let empty = service.update_by_id(&ctx, &ok.id, doc(json!({ "sku": "P-1" }))).await;
    assert_eq!(empty.error().map(ServiceError::code), Some("VALIDATION_ERROR"));
    assert_eq!(store.dump("products").await.len(), 1);
}

#[tokio::test]
async fn test_clone_copies_fields_and_applies_overrides() {
    let (service, _) = service(ServiceOptions::new());
    let ctx = Context::anonymous();
    let source = service
        .create(&ctx, doc(json!({ "name": "Vise", "sku": "V-1", "price": 30 })))
        .await
        .into_result()
        .unwrap();

    // Cloning verbatim collides on the unique sku
    let collision = service.clone_record(&ctx, &source.id, Document::new()).await;
    assert_eq!(collision.error().map(ServiceError::code), Some("UNIQUE_FIELD_ERROR"));

    let copy = service
        .clone_record(&ctx, &source.id, doc(json!({ "sku": "V-2" })))
        .await
        .into_result()
        .unwrap();
    assert_ne!(copy.id, source.id);
    assert_eq!(copy.name, "Vise");
    assert_eq!(copy.price, Some(30));
    assert_eq!(copy.sku.as_deref(), Some("V-2"));
}

#[tokio::test]
async fn test_envelope_serialization() {
    let (service, _) = service(ServiceOptions::new());
    let ctx = Context::anonymous();
    let env = service.find_by_id(&ctx, &"missing".to_string(), &ReadOptions::new()).await;
    let json = serde_json::to_value(&env).unwrap();
    assert_eq!(json["success"], json!(false));
    assert_eq!(json["error"]["code"], json!("NOT_FOUND"));
}
