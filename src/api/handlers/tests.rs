use anyhow::Result;
use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{HeaderMap, Request, StatusCode, header::ALLOW},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use crate::{
    actions::test_support::{FakeBackend, Harness, ProviderReply, session_in, superadmin},
    api::{ApiState, SessionResolver, router},
    auth::Session,
    models::Role,
    rpc::AppRouter,
    service::ServiceError,
};

/// Resolves every request to the same session, if any.
struct StaticSessions(Option<Session>);

#[async_trait]
impl SessionResolver for StaticSessions {
    async fn resolve(&self, _headers: &HeaderMap) -> Result<Option<Session>> {
        Ok(self.0.clone())
    }
}

struct FailingSessions;

#[async_trait]
impl SessionResolver for FailingSessions {
    async fn resolve(&self, _headers: &HeaderMap) -> Result<Option<Session>> {
        Err(anyhow::anyhow!("pool timed out"))
    }
}

fn app(harness: &Harness, sessions: Arc<dyn SessionResolver>) -> Router {
    router(ApiState {
        router: AppRouter::new(harness.backends()),
        sessions,
    })
}

fn app_as(harness: &Harness, session: Option<Session>) -> Router {
    app(harness, Arc::new(StaticSessions(session)))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, headers, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn query_with_encoded_input() {
    let harness = Harness::new();
    let org_id = Uuid::new_v4();
    let app = app_as(&harness, Some(session_in(org_id, Role::Member)));

    let (status, _, body) = send(
        app,
        get("/rpc/patient.list?input=%7B%22search%22%3A%22%20ada%20%22%7D"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"][0]["firstName"], json!("Ada"));
    assert_eq!(
        harness.backend.patient_queries().first().and_then(|q| q.search.clone()),
        Some("ada".to_string())
    );
}

#[tokio::test]
async fn mutation_returns_result() {
    let harness = Harness::new();
    let org_id = Uuid::new_v4();
    let app = app_as(&harness, Some(session_in(org_id, Role::Member)));

    let (status, _, body) = send(
        app,
        post("/rpc/campaign.create", &json!({"name": "Flu shots", "orgId": "spoofed"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["orgId"], json!(org_id.to_string()));
    assert_eq!(body["result"]["status"], json!("draft"));
    assert_eq!(harness.revalidator.paths(), vec!["/campaigns".to_string()]);
}

#[tokio::test]
async fn unknown_procedure_is_404() {
    let harness = Harness::new();
    let (status, _, body) = send(app_as(&harness, None), get("/rpc/billing.list")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], json!("No procedure named billing.list"));
}

#[tokio::test]
async fn wrong_verb_is_405() {
    let harness = Harness::new();
    let session = Some(session_in(Uuid::new_v4(), Role::Member));

    let (status, headers, _) = send(app_as(&harness, session.clone()), get("/rpc/patient.create")).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(headers.get(ALLOW).and_then(|v| v.to_str().ok()), Some("POST"));

    let (status, headers, _) =
        send(app_as(&harness, session), post("/rpc/patient.list", &json!({}))).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(headers.get(ALLOW).and_then(|v| v.to_str().ok()), Some("GET"));

    assert!(harness.backend.operations().is_empty());
}

#[tokio::test]
async fn missing_session_is_401() {
    let harness = Harness::new();
    let (status, _, body) = send(app_as(&harness, None), get("/rpc/campaign.list")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], json!("Unauthenticated"));
}

#[tokio::test]
async fn auth_failures_are_403() {
    let harness = Harness::new();

    let (status, _, _) = send(
        app_as(&harness, Some(session_in(Uuid::new_v4(), Role::Member))),
        get("/rpc/dashboard.getDashboardStats"),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, body) = send(app_as(&harness, Some(superadmin())), get("/rpc/patient.list")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], json!("No active organization"));
}

#[tokio::test]
async fn validation_errors_are_422_with_fields() {
    let harness = Harness::new();
    let app = app_as(&harness, Some(session_in(Uuid::new_v4(), Role::Member)));

    let (status, _, body) = send(
        app,
        post(
            "/rpc/patient.create",
            &json!({"dob": "31/12/1990", "primaryPhone": "call me"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let fields: Vec<&str> = body["fields"]
        .as_array()
        .map(|fields| fields.iter().filter_map(|f| f["field"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(fields, vec!["dob", "primaryPhone"]);
}

#[tokio::test]
async fn malformed_json_is_422() {
    let harness = Harness::new();
    let app = app_as(&harness, Some(session_in(Uuid::new_v4(), Role::Member)));

    let request = Request::builder()
        .method("POST")
        .uri("/rpc/campaign.create")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _, body) = send(app, request).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["fields"][0]["field"], json!("input"));
}

#[tokio::test]
async fn service_failure_is_400_with_message_only() {
    let harness = Harness::with_backend(FakeBackend::failing(ServiceError::with_code(
        "Campaign not found",
        "not_found",
    )));
    let app = app_as(&harness, Some(session_in(Uuid::new_v4(), Role::Member)));

    let (status, _, body) = send(
        app,
        get(&format!(
            "/rpc/campaign.get?input=%7B%22id%22%3A%22{}%22%7D",
            Uuid::new_v4()
        )),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Campaign not found"}));
}

#[tokio::test]
async fn provider_failure_is_502() {
    let harness = Harness::new().with_invitations(ProviderReply::Nothing);
    let app = app_as(&harness, Some(session_in(Uuid::new_v4(), Role::Admin)));

    let (status, _, body) = send(
        app,
        post(
            "/rpc/organization.inviteMember",
            &json!({"emailAddress": "rn@clinic.org", "role": "member"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], json!("Failed to create invitation"));
}

#[tokio::test]
async fn session_lookup_failure_is_500() {
    let harness = Harness::new();
    let (status, _, body) = send(app(&harness, Arc::new(FailingSessions)), get("/rpc/call.list")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], json!("Internal server error"));
}

#[tokio::test]
async fn health_and_openapi_are_public() {
    let harness = Harness::new();

    let (status, headers, body) = send(app_as(&harness, None), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers.contains_key("X-App"));
    assert_eq!(body["name"], json!(env!("CARGO_PKG_NAME")));

    let (status, _, body) = send(app_as(&harness, None), get("/api-docs/openapi.json")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/rpc/{procedure}"].is_object());
}

#[tokio::test]
async fn authentication_runs_before_input_decoding() {
    let harness = Harness::new();
    let malformed = || {
        Request::builder()
            .method("POST")
            .uri("/rpc/patient.create")
            .body(Body::from("{not json"))
            .unwrap()
    };

    let (status, _, body) = send(app_as(&harness, None), malformed()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], json!("Unauthenticated"));

    let (status, _, _) = send(
        app_as(&harness, Some(session_in(Uuid::new_v4(), Role::Member))),
        get("/rpc/dashboard.getDashboardStats?input=%7Bnope"),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    assert!(harness.backend.operations().is_empty());
}

#[tokio::test]
async fn routing_runs_before_session_lookup() {
    let harness = Harness::new();

    let (status, _, body) = send(app(&harness, Arc::new(FailingSessions)), get("/rpc/billing.nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], json!("No procedure named billing.nope"));

    let (status, headers, _) = send(
        app(&harness, Arc::new(FailingSessions)),
        post("/rpc/call.list", &json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(headers.get(ALLOW).and_then(|v| v.to_str().ok()), Some("GET"));
}
