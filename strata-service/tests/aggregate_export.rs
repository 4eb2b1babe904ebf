mod common;

use common::{doc, service, Product};
use serde_json::{json, Value};
use strata_data::{Context, Document, Filter, Sort, Stage};
use strata_service::{
    AggregationOptions, Export, ExportFormat, ExportOptions, FindAllParams, ServiceError, ServiceOptions,
};

fn aggregation() -> AggregationOptions {
    AggregationOptions::new()
        .pipeline("by_category", |params: &Document| {
            let mut stages = vec![Stage::Match(Filter::new().where_null("deletedAt"))];
            if let Some(min) = params.get("minPrice") {
                stages.push(Stage::Match(Filter::new().where_gte("price", min.clone())));
            }
            stages.push(Stage::group_by("category").count("items").sum("value", "price").build());
            stages.push(Stage::Sort(Sort::asc("_id")));
            stages
        })
        .virtual_field("label", |row: &Document| {
            row.get("name")
                .or_else(|| row.get("_id"))
                .and_then(Value::as_str)
                .map(|s| Value::String(s.to_uppercase()))
                .unwrap_or(Value::Null)
        })
}

async fn stocked() -> strata_service::Service<Product, strata_data_memory::MemoryStore> {
    let (service, _) = service(ServiceOptions::new().aggregation(aggregation()));
    let ctx = Context::anonymous();
    for (name, category, price) in [
        ("Anvil", "heavy", 120),
        ("Bolt, M8", "small", 2),
        ("Chisel", "small", 15),
        ("Drill", "heavy", 80),
    ] {
        service
            .create(&ctx, doc(json!({ "name": name, "category": category, "price": price })))
            .await
            .into_result()
            .unwrap();
    }
    service.delete(&ctx, &Filter::new().where_eq("name", "Drill")).await.into_result().unwrap();
    service
}

#[tokio::test]
async fn test_named_pipeline_with_virtual_fields() {
    let service = stocked().await;
    let ctx = Context::anonymous();

    let rows = service
        .aggregate(&ctx, "by_category", &Document::new())
        .await
        .into_result()
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["_id"], json!("heavy"));
    assert_eq!(rows[0]["items"], json!(1));
    assert_eq!(rows[0]["value"].as_f64(), Some(120.0));
    assert_eq!(rows[0]["label"], json!("HEAVY"));
    assert_eq!(rows[1]["_id"], json!("small"));
    assert_eq!(rows[1]["items"], json!(2));
    assert_eq!(rows[1]["value"].as_f64(), Some(17.0));

    let params = doc(json!({ "minPrice": 10 }));
    let filtered = service
        .aggregate(&ctx, "by_category", &params)
        .await
        .into_result()
        .unwrap();
    assert_eq!(filtered[1]["items"], json!(1));
}

#[tokio::test]
async fn test_unknown_pipeline() {
    let service = stocked().await;
    let env = service
        .aggregate(&Context::anonymous(), "missing", &Document::new())
        .await;
    match env.error() {
        Some(ServiceError::PipelineNotFound(name)) => assert_eq!(name, "missing"),
        other => panic!("expected missing pipeline, got {other:?}"),
    }
    assert_eq!(env.error().map(ServiceError::code), Some("PIPELINE_NOT_FOUND"));
}

#[tokio::test]
async fn test_csv_export_with_included_fields() {
    let service = stocked().await;
    let options = ExportOptions::new()
        .include(["name", "price", "label"])
        .format(ExportFormat::csv());
    let export = service
        .export(&Context::anonymous(), &FindAllParams::new().sort("name").limit(1), &options)
        .await
        .into_result()
        .unwrap();

    // Pagination is ignored and the deleted record stays hidden
    assert_eq!(
        export,
        Export::Text("name,price,label\nAnvil,120,ANVIL\n\"Bolt, M8\",2,\"BOLT, M8\"\nChisel,15,CHISEL\n".into())
    );
}

#[tokio::test]
async fn test_row_export_with_excluded_fields() {
    let service = stocked().await;
    let options = ExportOptions::new().exclude(["id", "createdAt", "updatedAt", "deletedAt", "deletedBy"]);
    let params = FindAllParams::new().where_eq("category", "small").sort("name");
    let export = service
        .export(&Context::anonymous(), &params, &options)
        .await
        .into_result()
        .unwrap();

    let Export::Rows(rows) = export else {
        panic!("expected rows");
    };
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| !r.contains_key("id") && !r.contains_key("createdAt")));
    assert_eq!(rows[0]["label"], json!("BOLT, M8"));
    assert_eq!(rows[1]["price"], json!(15));
}

#[tokio::test]
async fn test_export_rejects_include_with_exclude() {
    let service = stocked().await;
    let options = ExportOptions::new().include(["name"]).exclude(["price"]);
    let env = service
        .export(&Context::anonymous(), &FindAllParams::new(), &options)
        .await;
    assert_eq!(env.error().map(ServiceError::code), Some("EXPORT_ERROR"));
}

#[tokio::test]
async fn test_tab_delimited_export_uses_union_header() {
    let service = stocked().await;
    let options = ExportOptions::new()
        .exclude(["id", "createdAt", "updatedAt", "deletedAt", "deletedBy", "sku", "slug", "label"])
        .format(ExportFormat::Delimited { delimiter: b'\t' });
    let export = service
        .export(&Context::anonymous(), &FindAllParams::new().sort("-price"), &options)
        .await
        .into_result()
        .unwrap();
    assert_eq!(
        export,
        Export::Text("category\tname\tprice\nheavy\tAnvil\t120\nsmall\tChisel\t15\nsmall\tBolt, M8\t2\n".into())
    );
}
