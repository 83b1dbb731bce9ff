use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use serde_json::Value;
use surveycat::{
    Index,
    UnifiedRecord,
    embedding::HashingEmbedder,
    index_builder::{BuildOptions, build_index},
    record::{LayerMeta, SourceKind, TableMeta},
    server::{CatalogContext, router},
};
use tower::ServiceExt;

fn categories() -> Vec<String> {
    vec!["marine_mammals".into(), "reptiles".into()]
}

fn record(
    kind: SourceKind,
    path: &str,
    name: &str,
    mammals: &str,
    reptiles: &str,
) -> UnifiedRecord {
    let mut record = UnifiedRecord::new(kind, path, name);
    for (category, value) in [("marine_mammals", mammals), ("reptiles", reptiles)] {
        if !value.is_empty() {
            record.categories.insert(category.into(), value.into());
        }
    }
    record
}

fn context() -> std::sync::Arc<CatalogContext> {
    let records = vec![
        record(
            SourceKind::Table(TableMeta::default()),
            "/surveys/aerial/dugong_counts.csv",
            "dugong_counts.csv",
            "dugong",
            "",
        ),
        record(
            SourceKind::Shapefile(LayerMeta::default()),
            "/surveys/beach/turtle_nests.shp",
            "turtle_nests.shp",
            "",
            "green turtle, turtle",
        ),
        record(
            SourceKind::Table(TableMeta::default()),
            "/surveys/archive/dolphin_sightings.csv",
            "dolphin_sightings.csv",
            "dolphin",
            "",
        ),
    ];

    let embedder = HashingEmbedder::new(256).unwrap();
    let categories = categories();
    let built = build_index(
        None,
        records,
        &BuildOptions {
            categories: &categories,
            embedder: &embedder,
            batch_size: 8,
            show_progress: false,
        },
    )
    .unwrap();
    CatalogContext::new(Index::from_built(built).unwrap(), Box::new(embedder))
}

async fn get(uri: &str) -> (StatusCode, Value) {
    let response = router(context())
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn names(body: &Value) -> Vec<&str> {
    body["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["file_name"].as_str().unwrap())
        .collect()
}

#[tokio::test]
async fn filters_lists_categories_and_options() {
    let (status, body) = get("/api/filters").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["categories"], serde_json::json!(["marine_mammals", "reptiles"]));
    assert_eq!(
        body["options"]["reptiles"],
        serde_json::json!(["green turtle", "turtle"])
    );
    assert_eq!(body["options"]["type"], serde_json::json!(["shapefile", "table"]));
}

#[tokio::test]
async fn stats_counts_types_and_categories() {
    let (status, body) = get("/api/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_files"], 3);
    assert_eq!(body["by_type"]["table"], 2);
    assert_eq!(body["by_category"]["marine_mammals"], 2);
    assert_eq!(body["by_category"]["reptiles"], 1);
}

#[tokio::test]
async fn search_without_query_lists_alphabetically() {
    let (status, body) = get("/api/search").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_matches"], 3);
    assert_eq!(body["showing"], 3);
    assert_eq!(
        names(&body),
        ["dolphin_sightings.csv", "dugong_counts.csv", "turtle_nests.shp"]
    );
    assert!(body["results"][0].get("score").is_none());
}

#[tokio::test]
async fn search_applies_filters_and_limit() {
    let (_, body) = get("/api/search?file_type=table&exclude=archive").await;
    assert_eq!(names(&body), ["dugong_counts.csv"]);
    assert_eq!(body["results"][0]["marine_mammals"], "dugong");
    assert!(body["results"][0].get("reptiles").is_none());

    let (_, body) = get("/api/search?reptiles=TURTLE").await;
    assert_eq!(names(&body), ["turtle_nests.shp"]);

    let (_, body) = get("/api/search?q=dugong&limit=1").await;
    assert_eq!(body["total_matches"], 3);
    assert_eq!(body["showing"], 1);
    assert_eq!(names(&body), ["dugong_counts.csv"]);
    assert!(body["results"][0]["score"].is_f64());
}

#[tokio::test]
async fn bad_pattern_is_reported_in_body() {
    let (status, body) = get("/api/search?include=%5B").await;
    assert_eq!(status, StatusCode::OK);
    let message = body["error"].as_str().unwrap();
    assert!(message.starts_with("Include regex error"), "{message}");
}

#[tokio::test]
async fn bad_limit_is_rejected() {
    let (status, body) = get("/api/search?limit=abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("abc"));
}
