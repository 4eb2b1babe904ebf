mod common;

use common::{doc, service};
use serde_json::{json, Value};
use strata_data::{Context, Filter};
use strata_service::{
    BatchCreateOptions, BatchUpdate, FindAllParams, ServiceError, ServiceOptions, ValidationOptions,
};

fn positive_price() -> ValidationOptions {
    ValidationOptions::new().field("price", |v: &Value| v.as_i64().is_some_and(|p| p > 0))
}

fn broken_filter() -> Filter {
    // Unbalanced group: the store rejects the pattern when evaluating it
    Filter::new().where_matches("name", "(", false)
}

#[tokio::test]
async fn test_bulk_update_counts_live_matches() {
    let (service, store) = service(ServiceOptions::new());
    let ctx = Context::anonymous();
    let created = service
        .batch_create(
            &ctx,
            vec![
                doc(json!({ "name": "a", "price": 1 })),
                doc(json!({ "name": "b", "price": 1 })),
                doc(json!({ "name": "c", "price": 2 })),
            ],
            BatchCreateOptions::default(),
        )
        .await
        .into_result()
        .unwrap();
    assert_eq!(created.created, 3);
    service.delete(&ctx, &Filter::new().where_eq("name", "b")).await.into_result().unwrap();

    let modified = service
        .bulk_update(&ctx, &Filter::new().where_eq("price", 1), doc(json!({ "price": 7 })))
        .await
        .into_result()
        .unwrap();
    assert_eq!(modified.modified, 1);

    let rows = store.dump("products").await;
    let b = rows.iter().find(|r| r["name"] == json!("b")).unwrap();
    assert_eq!(b["price"], json!(1));
}

#[tokio::test]
async fn test_bulk_and_batch_updates_keep_record_identity() {
    let (service, store) = service(ServiceOptions::new());
    let ctx = Context::anonymous();
    let mut ids = Vec::new();
    for name in ["a", "b"] {
        let created = service
            .create(&ctx, doc(json!({ "name": name, "price": 1 })))
            .await
            .into_result()
            .unwrap();
        ids.push(created.id);
    }
    let created_at = store.dump("products").await[0]["createdAt"].clone();

    let modified = service
        .bulk_update(
            &ctx,
            &Filter::new(),
            doc(json!({ "id": "same", "createdAt": "1970-01-01T00:00:00Z", "price": 2 })),
        )
        .await
        .into_result()
        .unwrap();
    assert_eq!(modified.modified, 2);
    service
        .batch_update(
            &ctx,
            vec![BatchUpdate::new(Filter::new(), doc(json!({ "id": "same2", "price": 3 })))],
        )
        .await
        .into_result()
        .unwrap();

    let rows = store.dump("products").await;
    let mut stored: Vec<String> = rows.iter().map(|r| r["id"].as_str().unwrap().to_string()).collect();
    stored.sort();
    ids.sort();
    assert_eq!(stored, ids);
    assert_eq!(rows[0]["createdAt"], created_at);
    assert!(rows.iter().all(|r| r["price"] == json!(3)));
}

#[tokio::test]
async fn test_bulk_update_validates_data() {
    let (service, _) = service(ServiceOptions::new().validation(positive_price()));
    let ctx = Context::anonymous();
    service.create(&ctx, doc(json!({ "name": "a", "price": 1 }))).await.into_result().unwrap();

    let env = service
        .bulk_update(&ctx, &Filter::new(), doc(json!({ "price": -3 })))
        .await;
    assert_eq!(env.error().map(ServiceError::code), Some("VALIDATION_ERROR"));
}

#[tokio::test]
async fn test_bulk_and_batch_failures_carry_their_family() {
    let (service, _) = service(ServiceOptions::new());
    let ctx = Context::anonymous();
    service.create(&ctx, doc(json!({ "name": "a" }))).await.into_result().unwrap();

    let env = service.bulk_update(&ctx, &broken_filter(), doc(json!({ "price": 1 }))).await;
    assert_eq!(env.error().map(ServiceError::code), Some("BULK_UPDATE_ERROR"));

    let env = service.bulk_delete(&ctx, &broken_filter()).await;
    assert_eq!(env.error().map(ServiceError::code), Some("BULK_DELETE_ERROR"));

    let env = service
        .batch_update(&ctx, vec![BatchUpdate::new(broken_filter(), doc(json!({ "price": 1 })))])
        .await;
    assert_eq!(env.error().map(ServiceError::code), Some("BATCH_UPDATE_ERROR"));

    let env = service.batch_delete(&ctx, vec![broken_filter()]).await;
    assert_eq!(env.error().map(ServiceError::code), Some("BATCH_DELETE_ERROR"));

    service.delete(&ctx, &Filter::new()).await.into_result().unwrap();
    let env = service.batch_restore(&ctx, vec![broken_filter()]).await;
    assert_eq!(env.error().map(ServiceError::code), Some("BATCH_RESTORE_ERROR"));

    let env = service
        .find_all(&ctx, &FindAllParams::new().include_deleted())
        .await;
    assert!(env.is_success());
}

#[tokio::test]
async fn test_bulk_delete_soft_and_hard() {
    let (soft, soft_store) = service(ServiceOptions::new());
    let (hard, hard_store) = service(ServiceOptions::new().soft_delete(false));
    let ctx = Context::anonymous();
    for svc in [&soft, &hard] {
        for name in ["a", "b", "c"] {
            svc.create(&ctx, doc(json!({ "name": name }))).await.into_result().unwrap();
        }
    }

    let filter = Filter::new().where_in("name", ["a", "b"]);
    assert_eq!(soft.bulk_delete(&ctx, &filter).await.into_result().unwrap().deleted, 2);
    assert_eq!(hard.bulk_delete(&ctx, &filter).await.into_result().unwrap().deleted, 2);

    assert_eq!(soft_store.dump("products").await.len(), 3);
    assert_eq!(hard_store.dump("products").await.len(), 1);
    assert_eq!(soft.count(&ctx, &Filter::new(), false).await.into_result().unwrap(), 1);

    // Already deleted records are not counted twice
    assert_eq!(soft.bulk_delete(&ctx, &filter).await.into_result().unwrap().deleted, 0);
}

#[tokio::test]
async fn test_batch_update_sums_members() {
    let (service, _) = service(ServiceOptions::new().validation(positive_price()));
    let ctx = Context::anonymous();
    for (name, price) in [("a", 1), ("b", 1), ("c", 2)] {
        service
            .create(&ctx, doc(json!({ "name": name, "price": price })))
            .await
            .into_result()
            .unwrap();
    }

    let modified = service
        .batch_update(
            &ctx,
            vec![
                BatchUpdate::new(Filter::new().where_eq("price", 1), doc(json!({ "price": 9 }))),
                BatchUpdate::new(Filter::new().where_eq("name", "c"), doc(json!({ "price": 8 }))),
            ],
        )
        .await
        .into_result()
        .unwrap();
    assert_eq!(modified.modified, 3);

    let invalid = service
        .batch_update(
            &ctx,
            vec![BatchUpdate::new(Filter::new(), doc(json!({ "price": 0 })))],
        )
        .await;
    assert_eq!(invalid.error().map(ServiceError::code), Some("VALIDATION_ERROR"));

    let unchecked = service
        .batch_update(
            &ctx,
            vec![BatchUpdate::new(Filter::new().where_eq("name", "a"), doc(json!({ "price": 0 }))).unvalidated()],
        )
        .await
        .into_result()
        .unwrap();
    assert_eq!(unchecked.modified, 1);
}

#[tokio::test]
async fn test_batch_delete_and_restore() {
    let (service, _) = service(ServiceOptions::new());
    let ctx = Context::anonymous();
    for name in ["a", "b", "c", "d"] {
        service.create(&ctx, doc(json!({ "name": name }))).await.into_result().unwrap();
    }

    let deleted = service
        .batch_delete(
            &ctx,
            vec![
                Filter::new().where_eq("name", "a"),
                Filter::new().where_in("name", ["b", "c"]),
            ],
        )
        .await
        .into_result()
        .unwrap();
    assert_eq!(deleted.deleted, 3);

    let restored = service
        .batch_restore(
            &ctx,
            vec![
                Filter::new().where_eq("name", "a"),
                Filter::new().where_eq("name", "d"),
            ],
        )
        .await
        .into_result()
        .unwrap();
    assert_eq!(restored.restored, 1);
    assert_eq!(service.count(&ctx, &Filter::new(), false).await.into_result().unwrap(), 2);
}

#[tokio::test]
async fn test_batch_restore_requires_soft_delete() {
    let (service, _) = service(ServiceOptions::new().soft_delete(false));
    let env = service
        .batch_restore(&Context::anonymous(), vec![Filter::new()])
        .await;
    assert_eq!(env.error().map(ServiceError::code), Some("OPERATION_NOT_SUPPORTED"));
}

#[tokio::test]
async fn test_batch_create_checks_unique_fields() {
    let (service, store) = service(ServiceOptions::new());
    let ctx = Context::anonymous();
    service
        .create(&ctx, doc(json!({ "name": "a", "sku": "A-1" })))
        .await
        .into_result()
        .unwrap();

    let against_store = service
        .batch_create(
            &ctx,
            vec![doc(json!({ "name": "b", "sku": "B-1" })), doc(json!({ "name": "c", "sku": "A-1" }))],
            BatchCreateOptions::default(),
        )
        .await;
    assert_eq!(against_store.error().map(ServiceError::code), Some("UNIQUE_FIELD_ERROR"));

    let within_batch = service
        .batch_create(
            &ctx,
            vec![doc(json!({ "name": "b", "sku": "B-1" })), doc(json!({ "name": "c", "sku": "B-1" }))],
            BatchCreateOptions::default(),
        )
        .await;
    assert_eq!(within_batch.error().map(ServiceError::code), Some("UNIQUE_FIELD_ERROR"));

    // Nothing is written when validation fails
    assert_eq!(store.dump("products").await.len(), 1);
}

#[tokio::test]
async fn test_batch_create_ordering_on_store_failure() {
    let (service, store) = service(ServiceOptions::new());
    let ctx = Context::anonymous();
    let items = || {
        vec![
            doc(json!({ "id": "p1", "name": "a" })),
            doc(json!({ "id": "p1", "name": "dup" })),
            doc(json!({ "id": "p2", "name": "b" })),
        ]
    };

    let ordered = service.batch_create(&ctx, items(), BatchCreateOptions::default()).await;
    assert_eq!(ordered.error().map(ServiceError::code), Some("BATCH_CREATE_ERROR"));
    assert_eq!(store.dump("products").await.len(), 1);

    let (service, store) = common::service(ServiceOptions::new());
    let unordered = service
        .batch_create(
            &ctx,
            items(),
            BatchCreateOptions {
                ordered: false,
                ..Default::default()
            },
        )
        .await
        .into_result()
        .unwrap();
    assert_eq!(unordered.created, 2);
    assert_eq!(store.dump("products").await.len(), 2);
}
