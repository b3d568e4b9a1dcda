use async_trait::async_trait;
use uuid::Uuid;

use super::{PgBackend, calls::CALL_COLUMNS, database_failure, found};
use crate::{
    models::{Call, DashboardStats, Member, Organization},
    service::{AdminService, OrganizationService, ServiceResult},
};

#[async_trait]
impl OrganizationService for PgBackend {
    async fn get_organization(&self, org_id: Uuid) -> ServiceResult<Organization> {
        let result = sqlx::query_as::<_, Organization>(
            r"
            SELECT id, name, iso8601(created_at) AS created_at
            FROM organizations
            WHERE id = $1
            ",
        )
        .bind(org_id)
        .fetch_optional(self.pool())
        .await;
        found(result, "Organization", "Failed to load organization")
    }

    async fn list_members(&self, org_id: Uuid) -> ServiceResult<Vec<Member>> {
        match sqlx::query_as::<_, Member>(
            r"
            SELECT m.user_id, u.email, m.role, iso8601(m.created_at) AS joined_at
            FROM org_memberships m
            JOIN users u ON u.id = m.user_id
            WHERE m.org_id = $1
            ORDER BY m.created_at
            ",
        )
        .bind(org_id)
        .fetch_all(self.pool())
        .await
        {
            Ok(rows) => ServiceResult::Success(rows),
            Err(err) => database_failure("Failed to list members", &err),
        }
    }
}

// Superadmin reads span every tenant, so nothing here is scoped by org.
#[async_trait]
impl AdminService for PgBackend {
    async fn dashboard_stats(&self) -> ServiceResult<DashboardStats> {
        match sqlx::query_as::<_, DashboardStats>(
            r"
            SELECT
                (SELECT COUNT(*) FROM organizations) AS organizations,
                (SELECT COUNT(*) FROM patients WHERE deleted_at IS NULL) AS patients,
                (SELECT COUNT(*) FROM campaigns) AS campaigns,
                (SELECT COUNT(*) FROM runs) AS runs,
                (SELECT COUNT(*) FROM calls) AS calls,
                (SELECT COUNT(*) FROM calls WHERE status = 'completed') AS completed_calls
            ",
        )
        .fetch_one(self.pool())
        .await
        {
            Ok(stats) => ServiceResult::Success(stats),
            Err(err) => database_failure("Failed to load dashboard stats", &err),
        }
    }

    async fn recent_calls(&self, limit: u32) -> ServiceResult<Vec<Call>> {
        let sql = format!("SELECT {CALL_COLUMNS} FROM calls ORDER BY created_at DESC LIMIT $1");
        match sqlx::query_as::<_, Call>(&sql)
            .bind(i64::from(limit))
            .fetch_all(self.pool())
            .await
        {
            Ok(rows) => ServiceResult::Success(rows),
            Err(err) => database_failure("Failed to load recent calls", &err),
        }
    }

    async fn list_organizations(&self) -> ServiceResult<Vec<Organization>> {
        match sqlx::query_as::<_, Organization>(
            "SELECT id, name, iso8601(created_at) AS created_at FROM organizations ORDER BY name",
        )
        .fetch_all(self.pool())
        .await
        {
            Ok(rows) => ServiceResult::Success(rows),
            Err(err) => database_failure("Failed to list organizations", &err),
        }
    }
}
