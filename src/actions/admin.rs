//! Platform-wide actions, superadmin only. None of them mutate, so none revalidate.

use serde_json::Value;
use tracing::instrument;

use super::{ActionContext, ActionError, settle, validation::Payload};
use crate::{
    auth::require_super_admin,
    models::{Call, DashboardStats, Organization},
};

const DEFAULT_RECENT_CALLS: u32 = 20;

/// # Errors
/// Auth or service failures as `ActionError`.
#[instrument(skip_all, fields(action = "dashboard.getDashboardStats"))]
pub async fn get_dashboard_stats(
    ctx: &ActionContext,
    input: Value,
) -> Result<DashboardStats, ActionError> {
    require_super_admin(ctx.session())?;
    Payload::new(&input).finish()?;

    settle(
        "dashboard.getDashboardStats",
        ctx.services().admin.dashboard_stats().await,
    )
}

/// Most recent calls across every organization.
///
/// # Errors
/// Auth, validation or service failures as `ActionError`.
#[instrument(skip_all, fields(action = "admin.getRecentCalls"))]
pub async fn get_recent_calls(ctx: &ActionContext, input: Value) -> Result<Vec<Call>, ActionError> {
    require_super_admin(ctx.session())?;

    let mut payload = Payload::new(&input);
    let limit = payload.u32_in("limit", 1..=100, DEFAULT_RECENT_CALLS);
    payload.finish()?;

    settle(
        "admin.getRecentCalls",
        ctx.services().admin.recent_calls(limit).await,
    )
}

/// # Errors
/// Auth or service failures as `ActionError`.
#[instrument(skip_all, fields(action = "admin.listOrganizations"))]
pub async fn list_organizations(
    ctx: &ActionContext,
    input: Value,
) -> Result<Vec<Organization>, ActionError> {
    require_super_admin(ctx.session())?;
    Payload::new(&input).finish()?;

    settle(
        "admin.listOrganizations",
        ctx.services().admin.list_organizations().await,
    )
}
