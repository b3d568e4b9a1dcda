use async_trait::async_trait;
use uuid::Uuid;

use super::{PgBackend, database_failure, found};
use crate::{
    models::{Campaign, CampaignStatus, NewCampaign},
    service::{CampaignService, ServiceResult},
};

#[async_trait]
impl CampaignService for PgBackend {
    async fn create_campaign(&self, campaign: NewCampaign) -> ServiceResult<Campaign> {
        match sqlx::query_as::<_, Campaign>(
            r"
            INSERT INTO campaigns (org_id, name, description, status)
            VALUES ($1, $2, $3, $4)
            RETURNING id, org_id, name, description, status, iso8601(created_at) AS created_at
            ",
        )
        .bind(campaign.org_id)
        .bind(&campaign.name)
        .bind(&campaign.description)
        .bind(campaign.status)
        .fetch_one(self.pool())
        .await
        {
            Ok(row) => ServiceResult::Success(row),
            Err(err) => database_failure("Failed to create campaign", &err),
        }
    }

    async fn list_campaigns(&self, org_id: Uuid) -> ServiceResult<Vec<Campaign>> {
        match sqlx::query_as::<_, Campaign>(
            r"
            SELECT id, org_id, name, description, status, iso8601(created_at) AS created_at
            FROM campaigns
            WHERE org_id = $1
            ORDER BY created_at DESC
            ",
        )
        .bind(org_id)
        .fetch_all(self.pool())
        .await
        {
            Ok(rows) => ServiceResult::Success(rows),
            Err(err) => database_failure("Failed to list campaigns", &err),
        }
    }

    async fn get_campaign(&self, org_id: Uuid, campaign_id: Uuid) -> ServiceResult<Campaign> {
        let result = sqlx::query_as::<_, Campaign>(
            r"
            SELECT id, org_id, name, description, status, iso8601(created_at) AS created_at
            FROM campaigns
            WHERE org_id = $1 AND id = $2
            ",
        )
        .bind(org_id)
        .bind(campaign_id)
        .fetch_optional(self.pool())
        .await;
        found(result, "Campaign", "Failed to load campaign")
    }

    async fn update_campaign_status(
        &self,
        org_id: Uuid,
        campaign_id: Uuid,
        status: CampaignStatus,
    ) -> ServiceResult<Campaign> {
        let result = sqlx::query_as::<_, Campaign>(
            r"
            UPDATE campaigns SET status = $3
            WHERE org_id = $1 AND id = $2
            RETURNING id, org_id, name, description, status, iso8601(created_at) AS created_at
            ",
        )
        .bind(org_id)
        .bind(campaign_id)
        .bind(status)
        .fetch_optional(self.pool())
        .await;
        found(result, "Campaign", "Failed to update campaign")
    }
}
