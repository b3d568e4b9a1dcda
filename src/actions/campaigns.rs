//! Campaign actions.

use serde_json::Value;
use tracing::instrument;

use super::{ActionContext, ActionError, settle, validation::Payload};
use crate::{
    auth::require_org,
    models::{Campaign, CampaignStatus, NewCampaign},
};

pub const CAMPAIGNS_VIEW: &str = "/campaigns";

const NAME_MAX: usize = 120;
const DESCRIPTION_MAX: usize = 2000;
const STATUSES: &str = "draft, active, paused, archived";

/// # Errors
/// Auth, validation or service failures as `ActionError`.
#[instrument(skip_all, fields(action = "campaign.create"))]
pub async fn create_campaign(ctx: &ActionContext, input: Value) -> Result<Campaign, ActionError> {
    let scope = require_org(ctx.session())?;

    let mut payload = Payload::new(&input);
    let name = payload.required_string("name", NAME_MAX);
    let description = payload.optional_string("description", DESCRIPTION_MAX);
    let status = payload.optional_enum("status", CampaignStatus::parse, STATUSES);
    payload.finish()?;

    let campaign = NewCampaign {
        org_id: scope.org_id,
        name,
        description: description.unwrap_or_default(),
        status: status.unwrap_or_default(),
    };
    let created = settle(
        "campaign.create",
        ctx.services().campaigns.create_campaign(campaign).await,
    )?;
    ctx.revalidate(CAMPAIGNS_VIEW);
    Ok(created)
}

/// # Errors
/// Auth or service failures as `ActionError`.
#[instrument(skip_all, fields(action = "campaign.list"))]
pub async fn list_campaigns(ctx: &ActionContext, input: Value) -> Result<Vec<Campaign>, ActionError> {
    let scope = require_org(ctx.session())?;
    Payload::new(&input).finish()?;

    settle(
        "campaign.list",
        ctx.services().campaigns.list_campaigns(scope.org_id).await,
    )
}

/// # Errors
/// Auth, validation or service failures as `ActionError`.
#[instrument(skip_all, fields(action = "campaign.get"))]
pub async fn get_campaign(ctx: &ActionContext, input: Value) -> Result<Campaign, ActionError> {
    let scope = require_org(ctx.session())?;

    let mut payload = Payload::new(&input);
    let id = payload.required_uuid("id");
    payload.finish()?;

    settle(
        "campaign.get",
        ctx.services().campaigns.get_campaign(scope.org_id, id).await,
    )
}

/// # Errors
/// Auth, validation or service failures as `ActionError`.
#[instrument(skip_all, fields(action = "campaign.updateStatus"))]
pub async fn update_campaign_status(
    ctx: &ActionContext,
    input: Value,
) -> Result<Campaign, ActionError> {
    let scope = require_org(ctx.session())?;

    let mut payload = Payload::new(&input);
    let id = payload.required_uuid("id");
    let status = payload.required_enum("status", CampaignStatus::parse, STATUSES);
    payload.finish()?;

    let updated = settle(
        "campaign.updateStatus",
        ctx.services()
            .campaigns
            .update_campaign_status(scope.org_id, id, status)
            .await,
    )?;
    ctx.revalidate(CAMPAIGNS_VIEW);
    ctx.revalidate(&format!("{CAMPAIGNS_VIEW}/{id}"));
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        actions::{
            FieldError,
            test_support::{Harness, session_in},
        },
        models::Role,
    };
    use serde_json::json;
    use uuid::Uuid;

    #[tokio::test]
    async fn create_defaults_to_draft() {
        let harness = Harness::new();
        let org_id = Uuid::new_v4();
        let ctx = harness.context(Some(session_in(org_id, Role::Member)));

        let created = create_campaign(&ctx, json!({"name": "  Flu shots  "})).await;

        assert_eq!(created.map(|c| c.status), Ok(CampaignStatus::Draft));
        assert_eq!(
            harness.backend.new_campaigns(),
            vec![NewCampaign {
                org_id,
                name: "Flu shots".to_string(),
                description: String::new(),
                status: CampaignStatus::Draft,
            }]
        );
        assert_eq!(harness.revalidator.paths(), vec![CAMPAIGNS_VIEW.to_string()]);
    }

    #[tokio::test]
    async fn create_requires_name() {
        let harness = Harness::new();
        let ctx = harness.context(Some(session_in(Uuid::new_v4(), Role::Member)));

        let result = create_campaign(&ctx, json!({"description": "no name", "status": "live"})).await;

        assert_eq!(
            result,
            Err(ActionError::Validation(vec![
                FieldError::new("name", "Required"),
                FieldError::new("status", format!("Expected one of: {STATUSES}")),
            ]))
        );
        assert!(harness.backend.operations().is_empty());
    }

    #[tokio::test]
    async fn update_status_revalidates_list_and_detail() {
        let harness = Harness::new();
        let ctx = harness.context(Some(session_in(Uuid::new_v4(), Role::Admin)));
        let id = Uuid::new_v4();

        let updated =
            update_campaign_status(&ctx, json!({"id": id.to_string(), "status": "paused"})).await;

        assert_eq!(updated.map(|c| c.status), Ok(CampaignStatus::Paused));
        assert_eq!(
            harness.revalidator.paths(),
            vec![CAMPAIGNS_VIEW.to_string(), format!("/campaigns/{id}")]
        );
    }

    #[tokio::test]
    async fn update_status_requires_status() {
        let harness = Harness::new();
        let ctx = harness.context(Some(session_in(Uuid::new_v4(), Role::Admin)));

        let result = update_campaign_status(&ctx, json!({"id": Uuid::new_v4().to_string()})).await;

        assert_eq!(
            result,
            Err(ActionError::Validation(vec![FieldError::new("status", "Required")]))
        );
    }

    #[tokio::test]
    async fn list_is_scoped_to_session_org() {
        let harness = Harness::new();
        let org_id = Uuid::new_v4();
        let ctx = harness.context(Some(session_in(org_id, Role::Member)));

        assert_eq!(list_campaigns(&ctx, json!({"orgId": "other"})).await, Ok(Vec::new()));
        assert_eq!(harness.backend.org_ids(), vec![org_id]);
        assert!(harness.revalidator.paths().is_empty());
    }
}
