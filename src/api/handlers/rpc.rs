//! `namespace.method` over HTTP.
//!
//! Queries take their input as a JSON-encoded `input` query parameter, mutations
//! as the request body. An empty input reads as `null`.

use axum::{
    Json,
    body::Bytes,
    extract::{Extension, Path, Query},
    http::{HeaderMap, HeaderValue, StatusCode, header::ALLOW},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, instrument};
use utoipa::{IntoParams, ToSchema};

use crate::{
    actions::{ActionError, FieldError},
    api::ApiState,
    rpc::{AppRouter, ProcedureKind, RpcError},
};

#[derive(Debug, Deserialize, IntoParams)]
pub struct QueryInput {
    /// JSON-encoded procedure input.
    input: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RpcResponse {
    #[schema(value_type = Object)]
    result: Value,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<Vec<FieldError>>,
}

impl ErrorBody {
    fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            fields: None,
        }
    }
}

/// Undecoded input as it arrived on the wire.
enum RawInput<'a> {
    Query(Option<&'a str>),
    Body(&'a [u8]),
}

impl RawInput<'_> {
    fn decode(self) -> Result<Value, RpcError> {
        let raw = match self {
            Self::Query(raw) => raw.map(str::as_bytes).unwrap_or_default(),
            Self::Body(raw) => raw,
        };
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(raw).map_err(|_| {
            RpcError::Action(ActionError::Validation(vec![FieldError::new(
                "input",
                "Expected JSON",
            )]))
        })
    }
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody::new("Internal server error")),
    )
        .into_response()
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        match self {
            Self::NotFound(_) => {
                (StatusCode::NOT_FOUND, Json(ErrorBody::new(self.to_string()))).into_response()
            }
            Self::MethodNotAllowed { kind, .. } => {
                let allow = match kind {
                    ProcedureKind::Query => "GET",
                    ProcedureKind::Mutation => "POST",
                };
                (
                    StatusCode::METHOD_NOT_ALLOWED,
                    [(ALLOW, HeaderValue::from_static(allow))],
                    Json(ErrorBody::new(self.to_string())),
                )
                    .into_response()
            }
            Self::Session => internal_error(),
            Self::Action(err) => action_error_response(err),
        }
    }
}

fn action_error_response(err: ActionError) -> Response {
    let status = match &err {
        ActionError::Unauthenticated => StatusCode::UNAUTHORIZED,
        ActionError::NoOrganization | ActionError::Forbidden => StatusCode::FORBIDDEN,
        ActionError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ActionError::Service(_) => StatusCode::BAD_REQUEST,
        ActionError::Integration(_) => StatusCode::BAD_GATEWAY,
    };
    let message = err.to_string();
    let body = match err {
        ActionError::Validation(fields) => ErrorBody {
            error: message,
            fields: Some(fields),
        },
        _ => ErrorBody::new(message),
    };
    (status, Json(body)).into_response()
}

/// Route, then authenticate and authorize, then decode and run.
async fn run(
    state: &ApiState,
    headers: &HeaderMap,
    path: &str,
    kind: ProcedureKind,
    input: RawInput<'_>,
) -> Result<Value, RpcError> {
    let procedure = AppRouter::route(path, kind)?;

    let session = state.sessions.resolve(headers).await.map_err(|err| {
        error!("Failed to resolve session: {err:#}");
        RpcError::Session
    })?;
    procedure
        .access
        .check(session.as_ref())
        .map_err(ActionError::from)?;

    let input = input.decode()?;
    state.router.invoke(procedure, session, input).await
}

fn respond(result: Result<Value, RpcError>) -> Response {
    match result {
        Ok(result) => (StatusCode::OK, Json(RpcResponse { result })).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/rpc/{procedure}",
    params(
        ("procedure" = String, Path, description = "Procedure path, e.g. `patient.list`"),
        QueryInput
    ),
    responses(
        (status = 200, description = "Procedure output", body = RpcResponse),
        (status = 401, description = "No valid session", body = ErrorBody),
        (status = 403, description = "Not allowed or no active organization", body = ErrorBody),
        (status = 404, description = "Unknown procedure", body = ErrorBody),
        (status = 405, description = "Procedure is a mutation", body = ErrorBody),
        (status = 422, description = "Invalid input", body = ErrorBody),
        (status = 400, description = "Service failure", body = ErrorBody)
    ),
    tag = "rpc"
)]
#[instrument(skip_all, fields(procedure = %procedure))]
pub async fn query(
    Path(procedure): Path<String>,
    Query(params): Query<QueryInput>,
    headers: HeaderMap,
    state: Extension<ApiState>,
) -> Response {
    let input = RawInput::Query(params.input.as_deref());
    respond(run(&state, &headers, &procedure, ProcedureKind::Query, input).await)
}

#[utoipa::path(
    post,
    path = "/rpc/{procedure}",
    params(
        ("procedure" = String, Path, description = "Procedure path, e.g. `patient.create`")
    ),
    request_body(content = Value, description = "Procedure input", content_type = "application/json"),
    responses(
        (status = 200, description = "Procedure output", body = RpcResponse),
        (status = 401, description = "No valid session", body = ErrorBody),
        (status = 403, description = "Not allowed or no active organization", body = ErrorBody),
        (status = 404, description = "Unknown procedure", body = ErrorBody),
        (status = 405, description = "Procedure is a query", body = ErrorBody),
        (status = 422, description = "Invalid input", body = ErrorBody),
        (status = 400, description = "Service failure", body = ErrorBody),
        (status = 502, description = "Auth provider failure", body = ErrorBody)
    ),
    tag = "rpc"
)]
#[instrument(skip_all, fields(procedure = %procedure))]
pub async fn mutation(
    Path(procedure): Path<String>,
    headers: HeaderMap,
    state: Extension<ApiState>,
    body: Bytes,
) -> Response {
    let input = RawInput::Body(&body[..]);
    respond(run(&state, &headers, &procedure, ProcedureKind::Mutation, input).await)
}
