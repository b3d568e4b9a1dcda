use async_trait::async_trait;
use uuid::Uuid;

use super::{PgBackend, database_failure, found};
use crate::{
    models::{Call, CallQuery},
    service::{CallService, ServiceResult},
};

pub(super) const CALL_COLUMNS: &str = r"
    id, org_id, run_id, patient_id, status, duration_seconds, summary,
    iso8601(created_at) AS created_at
";

#[async_trait]
impl CallService for PgBackend {
    async fn list_calls(&self, org_id: Uuid, query: CallQuery) -> ServiceResult<Vec<Call>> {
        let sql = format!(
            r"
            SELECT {CALL_COLUMNS}
            FROM calls
            WHERE org_id = $1 AND ($2::uuid IS NULL OR run_id = $2)
            ORDER BY created_at DESC
            LIMIT $3
            "
        );
        match sqlx::query_as::<_, Call>(&sql)
            .bind(org_id)
            .bind(query.run_id)
            .bind(i64::from(query.limit))
            .fetch_all(self.pool())
            .await
        {
            Ok(rows) => ServiceResult::Success(rows),
            Err(err) => database_failure("Failed to list calls", &err),
        }
    }

    async fn get_call(&self, org_id: Uuid, call_id: Uuid) -> ServiceResult<Call> {
        let sql = format!("SELECT {CALL_COLUMNS} FROM calls WHERE org_id = $1 AND id = $2");
        let result = sqlx::query_as::<_, Call>(&sql)
            .bind(org_id)
            .bind(call_id)
            .fetch_optional(self.pool())
            .await;
        found(result, "Call", "Failed to load call")
    }
}
