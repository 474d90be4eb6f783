//! HTTP surface for the cohort pipeline.
//!
//! Exposes a [`cohort_orchestrator::CohortService`] over JSON endpoints under
//! `/v1`. Errors come back as `{"error": "..."}` with a status derived from
//! the pipeline error kind.

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::AppState;
pub use router::build_router;
pub use server::CohortServer;

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use cohort_orchestrator::{
        CohortService, FieldValue, FileType, InMemoryGateway, PipelineConfig, RawRecord,
        ReferenceData,
    };
    use serde_json::{json, Value};
    use tower::util::ServiceExt;

    use super::*;

    fn person(key: i64, family: Option<&str>) -> RawRecord {
        let mut r = RawRecord::new();
        r.insert("nhs_number".into(), FieldValue::Int(key));
        r.insert("given_name".into(), FieldValue::text("Ann"));
        r.insert("primary_care_provider".into(), FieldValue::text("GP002"));
        r.insert("eligibility".into(), FieldValue::Bool(true));
        r.insert("postcode".into(), FieldValue::text("LS1 4AP"));
        if let Some(family) = family {
            r.insert("family_name".into(), FieldValue::text(family));
        }
        r
    }

    fn app() -> Router {
        let gateway = InMemoryGateway::new();
        gateway
            .register(
                "/in/cohort.json",
                FileType::Json,
                vec![person(11, Some("Smith")), person(12, None)],
            )
            .unwrap();
        gateway
            .register("/in/copy.json", FileType::Json, vec![person(11, Some("Smith")), person(12, None)])
            .unwrap();
        let service = CohortService::in_memory(
            Arc::new(gateway),
            PipelineConfig::default(),
            ReferenceData::seeded(),
        )
        .unwrap();
        build_router(Arc::new(service))
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn process(app: &Router) -> Value {
        let (status, report) = call(
            app,
            "POST",
            "/v1/orchestration/process",
            Some(json!({ "file_path": "/in/cohort.json", "file_type": "json" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{report}");
        report
    }

    #[tokio::test]
    async fn health_endpoint() {
        let (status, body) = call(&app(), "GET", "/v1/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["pending_distribution"], 0);
    }

    #[tokio::test]
    async fn process_and_query_status() {
        let app = app();
        let report = process(&app).await;
        assert_eq!(report["records_processed"], 2);
        assert_eq!(report["records_failed"], 1);
        assert_eq!(report["is_complete"], true);
        let file_id = report["file_id"].as_u64().unwrap();

        let (status, file) = call(&app, "GET", &format!("/v1/orchestration/files/{file_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(file["current_stage"], "complete");
        assert_eq!(file["records_distributed"], 1);

        let (status, record) = call(
            &app,
            "GET",
            &format!("/v1/orchestration/files/{file_id}/records/12"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(record["has_validation_errors"], true);

        let (status, body) = call(&app, "GET", "/v1/orchestration/files/99", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("99"));

        let (status, _) = call(
            &app,
            "GET",
            &format!("/v1/orchestration/files/{file_id}/records/abc"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn process_rejects_bad_requests() {
        let app = app();
        let (status, body) = call(
            &app,
            "POST",
            "/v1/orchestration/process",
            Some(json!({ "file_path": "/in/cohort.json", "file_type": "xlsx" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Unsupported file type: xlsx");

        let (status, _) = call(
            &app,
            "POST",
            "/v1/orchestration/process",
            Some(json!({ "file_path": "/in/missing.json", "file_type": "json" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        process(&app).await;
        let (status, _) = call(
            &app,
            "POST",
            "/v1/orchestration/process",
            Some(json!({ "file_path": "/in/copy.json", "file_type": "json" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn validation_endpoints() {
        let app = app();
        process(&app).await;

        let (status, body) = call(
            &app,
            "POST",
            "/v1/validation/participant",
            Some(json!({ "nhs_number": 11 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["passed"], true);
        assert_eq!(body["results"].as_array().unwrap().len(), 5);
        assert_eq!(body["results"][0]["rule_name"], "primary_care_provider_exists");

        let (status, body) = call(
            &app,
            "POST",
            "/v1/validation/participant",
            Some(json!({ "nhs_number": 11, "rules": ["name_present"] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["results"].as_array().unwrap().len(), 1);

        let (status, _) = call(
            &app,
            "POST",
            "/v1/validation/participant",
            Some(json!({ "nhs_number": 404 })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = call(
            &app,
            "POST",
            "/v1/validation/batch",
            Some(json!({ "nhs_numbers": [404, 11] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 2);
        assert_eq!(body["passed"], 1);
        assert_eq!(body["results"]["404"]["passed"], false);
        assert_eq!(body["results"]["11"]["passed"], true);

        let (status, _) = call(
            &app,
            "POST",
            "/v1/validation/batch",
            Some(json!({ "nhs_numbers": [] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn transformation_endpoints() {
        let app = app();
        process(&app).await;

        let (status, body) = call(
            &app,
            "POST",
            "/v1/transformation/participant",
            Some(json!({ "nhs_number": 11 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outbound"]["demographic"]["post_code"], "LS14AP");
        assert_eq!(body["inbound"]["demographic"]["post_code"], "LS1 4AP");

        let (status, body) = call(
            &app,
            "POST",
            "/v1/transformation/batch",
            Some(json!({ "nhs_numbers": [11, 404] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["summary"]["successful"], 1);
        assert_eq!(body["summary"]["failed"], 1);
    }

    #[tokio::test]
    async fn distribution_extract_and_replay() {
        let app = app();
        let records: Vec<Value> = (1..=5).map(|n| json!({ "nhs_number": n })).collect();
        let (status, body) = call(
            &app,
            "POST",
            "/v1/distribution/records",
            Some(json!({ "records": records })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["ids"], json!([1, 2, 3, 4, 5]));

        let (status, extraction) = call(
            &app,
            "POST",
            "/v1/distribution/extract",
            Some(json!({ "limit": 3 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(extraction["count"], 3);
        let ids: Vec<_> = extraction["records"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["id"].as_u64().unwrap())
            .collect();
        assert_eq!(ids, [1, 2, 3]);

        let request_id = extraction["request_id"].as_str().unwrap();
        let (status, replay) = call(
            &app,
            "POST",
            "/v1/distribution/replay",
            Some(json!({ "request_id": request_id })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(replay["records"], extraction["records"]);

        let (_, health) = call(&app, "GET", "/v1/health", None).await;
        assert_eq!(health["pending_distribution"], 2);

        let (status, rest) = call(&app, "POST", "/v1/distribution/extract", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(rest["count"], 2);

        let (status, _) = call(
            &app,
            "POST",
            "/v1/distribution/replay",
            Some(json!({ "request_id": "01890a5d-ac96-774b-bcce-b302099a8057" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(
            &app,
            "POST",
            "/v1/distribution/replay",
            Some(json!({ "request_id": "not-a-uuid" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(
            &app,
            "POST",
            "/v1/distribution/extract",
            Some(json!({ "limit": 0 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn exceptions_create_list_resolve() {
        let app = app();
        let batch: Vec<Value> = (0..3)
            .map(|n| json!({ "key": 77, "rule_name": format!("rule_{n}"), "is_fatal": true }))
            .collect();
        let (status, body) = call(
            &app,
            "POST",
            "/v1/exceptions",
            Some(json!({ "exceptions": batch })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["count"], 3);

        let (status, body) = call(
            &app,
            "POST",
            "/v1/exceptions/resolve",
            Some(json!({ "nhs_number": 77 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["resolved"], 3);

        let (status, entries) = call(&app, "GET", "/v1/exceptions/77", None).await;
        assert_eq!(status, StatusCode::OK);
        let entries = entries.as_array().unwrap();
        assert_eq!(entries.len(), 3);
        assert!(entries
            .iter()
            .all(|e| e["date_resolved"] == body["resolved_at"]));

        let (status, body) = call(
            &app,
            "POST",
            "/v1/exceptions/resolve",
            Some(json!({ "nhs_number": 77 })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "No unresolved exceptions found for NHS number 77");

        let (status, _) = call(
            &app,
            "POST",
            "/v1/exceptions",
            Some(json!({ "exceptions": [] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
