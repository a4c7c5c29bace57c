use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use certvault::http::{app, AppState};
use certvault::ledger::SqliteLedger;
use certvault::ops::Orchestrator;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const TOKEN: &str = "test-admin-token";

async fn setup_app() -> Router {
    let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    let ledger = Arc::new(SqliteLedger::new(pool.clone()));
    let ops = Arc::new(Orchestrator::new(
        pool.clone(),
        ledger,
        "The Sportify Society",
        500,
    ));
    app(AppState {
        pool,
        ops,
        admin_token: Arc::new(TOKEN.to_string()),
    })
}

async fn body_json(resp: axum::response::Response) -> Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn admin_post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn admin_routes_require_bearer_token() {
    let app = setup_app().await;

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/admin/certificates")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(resp).await;
    assert_eq!(body["error"]["code"], "unauthorized");

    let resp = app
        .oneshot(
            Request::builder()
                .uri("/api/admin/certificates")
                .header(header::AUTHORIZATION, "Bearer wrong")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn created_certificate_is_publicly_verifiable() {
    let app = setup_app().await;

    let resp = app
        .clone()
        .oneshot(admin_post(
            "/api/admin/certificates",
            json!({
                "id": "SPT-100",
                "studentName": "Jane Doe",
                "event": "Annual Regatta",
                "position": "Winner",
                "date": "2025-01-01"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    // No token needed for verification.
    let resp = app
        .oneshot(
            Request::builder()
                .uri("/api/verify/SPT-100")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["studentName"], "Jane Doe");
    assert_eq!(body["issuedBy"], "The Sportify Society");
    assert_eq!(body["batchId"], Value::Null);
}

#[tokio::test]
async fn verify_unknown_id_returns_not_found_body() {
    let app = setup_app().await;
    let resp = app
        .oneshot(
            Request::builder()
                .uri("/api/verify/NOPE-999")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body = body_json(resp).await;
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn generate_then_undo_batch_over_http() {
    let app = setup_app().await;

    let resp = app
        .clone()
        .oneshot(admin_post(
            "/api/admin/batches/generate",
            json!({
                "prefix": "SPT-2025-",
                "start": 1,
                "count": 2,
                "event": "Annual Regatta",
                "date": "2025-01-01"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = body_json(resp).await;
    assert_eq!(body["written"], 2);
    let batch_id = body["batchId"].as_str().unwrap().to_string();

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/admin/batches/{batch_id}"))
                .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["deleted"], 2);

    let resp = app
        .oneshot(
            Request::builder()
                .uri("/api/verify/SPT-2025-001")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn generate_with_zero_count_is_rejected() {
    let app = setup_app().await;
    let resp = app
        .oneshot(admin_post(
            "/api/admin/batches/generate",
            json!({
                "prefix": "SPT-",
                "start": 1,
                "count": 0,
                "event": "Regatta",
                "date": "2025-01-01"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(resp).await;
    assert_eq!(body["error"]["code"], "validation_error");
}

#[tokio::test]
async fn csv_import_reports_written_count() {
    let app = setup_app().await;
    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/admin/batches/import?filename=roster.csv")
                .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
                .header(header::CONTENT_TYPE, "text/csv")
                .body(Body::from(
                    "id,name,event\nSPT-001,Jane Doe,Regatta\nSPT-002,Bob,Regatta\n",
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = body_json(resp).await;
    assert_eq!(body["written"], 2);

    let resp = app
        .oneshot(
            Request::builder()
                .uri("/api/verify/SPT-002")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn bulk_edit_updates_only_staged_fields() {
    let app = setup_app().await;

    app.clone()
        .oneshot(admin_post(
            "/api/admin/certificates",
            json!({ "id": "SPT-A", "studentName": "Alice", "event": "Regatta" }),
        ))
        .await
        .unwrap();

    let resp = app
        .clone()
        .oneshot(admin_post(
            "/api/admin/certificates/bulk-edit",
            json!({ "SPT-A": { "position": "Captain" } }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["updated"], 1);

    let resp = app
        .oneshot(
            Request::builder()
                .uri("/api/verify/SPT-A")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = body_json(resp).await;
    assert_eq!(body["position"], "Captain");
    assert_eq!(body["studentName"], "Alice");
}

#[tokio::test]
async fn events_listing_filters_by_type() {
    let app = setup_app().await;

    for (title, event_type) in [("MindMuse", "featured"), ("Actletics", "past")] {
        let resp = app
            .clone()
            .oneshot(admin_post(
                "/api/admin/events",
                json!({
                    "title": title,
                    "date": "1 Dec - 8 Dec, 2025",
                    "tags": ["Sports"],
                    "eventType": event_type
                }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/events?type=featured")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    let events = body.as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["title"], "MindMuse");

    let resp = app
        .oneshot(
            Request::builder()
                .uri("/api/events?type=bogus")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}
