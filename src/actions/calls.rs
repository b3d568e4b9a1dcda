//! Call history for the session's organization. Read-only.

use serde_json::Value;
use tracing::instrument;

use super::{ActionContext, ActionError, settle, validation::Payload};
use crate::{
    auth::require_org,
    models::{Call, CallQuery},
};

const DEFAULT_LIMIT: u32 = 50;

/// # Errors
/// Auth, validation or service failures as `ActionError`.
#[instrument(skip_all, fields(action = "call.list"))]
pub async fn list_calls(ctx: &ActionContext, input: Value) -> Result<Vec<Call>, ActionError> {
    let scope = require_org(ctx.session())?;

    let mut payload = Payload::new(&input);
    let run_id = payload.optional_uuid("runId");
    let limit = payload.u32_in("limit", 1..=100, DEFAULT_LIMIT);
    payload.finish()?;

    settle(
        "call.list",
        ctx.services()
            .calls
            .list_calls(scope.org_id, CallQuery { run_id, limit })
            .await,
    )
}

/// # Errors
/// Auth, validation or service failures as `ActionError`.
#[instrument(skip_all, fields(action = "call.get"))]
pub async fn get_call(ctx: &ActionContext, input: Value) -> Result<Call, ActionError> {
    let scope = require_org(ctx.session())?;

    let mut payload = Payload::new(&input);
    let id = payload.required_uuid("id");
    payload.finish()?;

    settle("call.get", ctx.services().calls.get_call(scope.org_id, id).await)
}
