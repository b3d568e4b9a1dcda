//! Run actions: start a campaign run for a set of patients, inspect or cancel it.

use serde_json::Value;
use tracing::{info, instrument};

use super::{ActionContext, ActionError, campaigns::CAMPAIGNS_VIEW, settle, validation::Payload};
use crate::{
    auth::require_org,
    models::{NewRun, Run},
};

pub const RUNS_VIEW: &str = "/runs";

/// # Errors
/// Auth, validation or service failures as `ActionError`.
#[instrument(skip_all, fields(action = "run.create"))]
pub async fn create_run(ctx: &ActionContext, input: Value) -> Result<Run, ActionError> {
    let scope = require_org(ctx.session())?;

    let mut payload = Payload::new(&input);
    let campaign_id = payload.required_uuid("campaignId");
    let patient_ids = payload.uuid_list("patientIds");
    payload.finish()?;

    let run = NewRun {
        org_id: scope.org_id,
        campaign_id,
        patient_ids,
    };
    let created = settle("run.create", ctx.services().runs.create_run(run).await)?;
    info!(run_id = %created.id, total_calls = created.total_calls, "run created");

    ctx.revalidate(RUNS_VIEW);
    ctx.revalidate(&format!("{CAMPAIGNS_VIEW}/{campaign_id}"));
    Ok(created)
}

/// # Errors
/// Auth, validation or service failures as `ActionError`.
#[instrument(skip_all, fields(action = "run.list"))]
pub async fn list_runs(ctx: &ActionContext, input: Value) -> Result<Vec<Run>, ActionError> {
    let scope = require_org(ctx.session())?;

    let mut payload = Payload::new(&input);
    let campaign_id = payload.optional_uuid("campaignId");
    payload.finish()?;

    settle(
        "run.list",
        ctx.services().runs.list_runs(scope.org_id, campaign_id).await,
    )
}

/// # Errors
/// Auth, validation or service failures as `ActionError`.
#[instrument(skip_all, fields(action = "run.get"))]
pub async fn get_run(ctx: &ActionContext, input: Value) -> Result<Run, ActionError> {
    let scope = require_org(ctx.session())?;

    let mut payload = Payload::new(&input);
    let id = payload.required_uuid("id");
    payload.finish()?;

    settle("run.get", ctx.services().runs.get_run(scope.org_id, id).await)
}

/// # Errors
/// Auth, validation or service failures as `ActionError`.
#[instrument(skip_all, fields(action = "run.cancel"))]
pub async fn cancel_run(ctx: &ActionContext, input: Value) -> Result<Run, ActionError> {
    let scope = require_org(ctx.session())?;

    let mut payload = Payload::new(&input);
    let id = payload.required_uuid("id");
    payload.finish()?;

    let cancelled = settle(
        "run.cancel",
        ctx.services().runs.cancel_run(scope.org_id, id).await,
    )?;
    ctx.revalidate(RUNS_VIEW);
    ctx.revalidate(&format!("{RUNS_VIEW}/{id}"));
    ctx.revalidate(&format!("{CAMPAIGNS_VIEW}/{}", cancelled.campaign_id));
    Ok(cancelled)
}
