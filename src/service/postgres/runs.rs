use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use super::{CONFLICT_CODE, PgBackend, database_failure, found, is_foreign_key_violation};
use crate::{
    models::{CampaignStatus, NewRun, Run, RunStatus},
    service::{RunService, ServiceError, ServiceResult},
};

const RUN_COLUMNS: &str = r"
    r.id, r.org_id, r.campaign_id, r.status,
    (SELECT COUNT(*) FROM calls c WHERE c.run_id = r.id) AS total_calls,
    iso8601(r.created_at) AS created_at
";

#[async_trait]
impl RunService for PgBackend {
    /// Creates the run and one queued call per patient in a single transaction.
    /// The campaign must be in the caller's org and not archived; every patient id
    /// must resolve to a live patient of the same org.
    async fn create_run(&self, run: NewRun) -> ServiceResult<Run> {
        match insert_run(self, &run).await {
            Ok(result) => result,
            Err(err) if is_foreign_key_violation(&err) => {
                ServiceResult::Failure(ServiceError::not_found("Campaign"))
            }
            Err(err) => database_failure("Failed to create run", &err),
        }
    }

    async fn list_runs(&self, org_id: Uuid, campaign_id: Option<Uuid>) -> ServiceResult<Vec<Run>> {
        let query = format!(
            r"
            SELECT {RUN_COLUMNS}
            FROM runs r
            WHERE r.org_id = $1 AND ($2::uuid IS NULL OR r.campaign_id = $2)
            ORDER BY r.created_at DESC
            "
        );
        match sqlx::query_as::<_, Run>(&query)
            .bind(org_id)
            .bind(campaign_id)
            .fetch_all(self.pool())
            .await
        {
            Ok(rows) => ServiceResult::Success(rows),
            Err(err) => database_failure("Failed to list runs", &err),
        }
    }

    async fn get_run(&self, org_id: Uuid, run_id: Uuid) -> ServiceResult<Run> {
        let query = format!(
            r"
            SELECT {RUN_COLUMNS}
            FROM runs r
            WHERE r.org_id = $1 AND r.id = $2
            "
        );
        let result = sqlx::query_as::<_, Run>(&query)
            .bind(org_id)
            .bind(run_id)
            .fetch_optional(self.pool())
            .await;
        found(result, "Run", "Failed to load run")
    }

    async fn cancel_run(&self, org_id: Uuid, run_id: Uuid) -> ServiceResult<Run> {
        match cancel(self, org_id, run_id).await {
            Ok(result) => result,
            Err(err) => database_failure("Failed to cancel run", &err),
        }
    }
}

async fn insert_run(backend: &PgBackend, run: &NewRun) -> Result<ServiceResult<Run>, sqlx::Error> {
    let mut tx = backend.pool().begin().await?;

    let campaign_status = sqlx::query_scalar::<_, CampaignStatus>(
        "SELECT status FROM campaigns WHERE org_id = $1 AND id = $2 FOR SHARE",
    )
    .bind(run.org_id)
    .bind(run.campaign_id)
    .fetch_optional(&mut *tx)
    .await?;

    match campaign_status {
        None => return Ok(ServiceResult::Failure(ServiceError::not_found("Campaign"))),
        Some(CampaignStatus::Archived) => {
            return Ok(ServiceResult::Failure(ServiceError::with_code(
                "Archived campaigns cannot be run.",
                CONFLICT_CODE,
            )));
        }
        Some(_) => {}
    }

    if !run.patient_ids.is_empty() {
        let matched: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*) FROM patients
            WHERE org_id = $1 AND id = ANY($2) AND deleted_at IS NULL
            ",
        )
        .bind(run.org_id)
        .bind(&run.patient_ids)
        .fetch_one(&mut *tx)
        .await?;

        if usize::try_from(matched).ok() != Some(run.patient_ids.len()) {
            return Ok(ServiceResult::Failure(ServiceError::not_found("Patient")));
        }
    }

    let row = sqlx::query(
        r"
        INSERT INTO runs (org_id, campaign_id, status)
        VALUES ($1, $2, 'pending')
        RETURNING id, iso8601(created_at) AS created_at
        ",
    )
    .bind(run.org_id)
    .bind(run.campaign_id)
    .fetch_one(&mut *tx)
    .await?;
    let run_id: Uuid = row.get("id");
    let created_at: String = row.get("created_at");

    let inserted = sqlx::query(
        r"
        INSERT INTO calls (org_id, run_id, patient_id, status)
        SELECT $1, $2, patient_id, 'queued'
        FROM unnest($3::uuid[]) AS patient_id
        ",
    )
    .bind(run.org_id)
    .bind(run_id)
    .bind(&run.patient_ids)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(ServiceResult::Success(Run {
        id: run_id,
        org_id: run.org_id,
        campaign_id: run.campaign_id,
        status: RunStatus::Pending,
        total_calls: i64::try_from(inserted.rows_affected()).unwrap_or(i64::MAX),
        created_at,
    }))
}

async fn cancel(
    backend: &PgBackend,
    org_id: Uuid,
    run_id: Uuid,
) -> Result<ServiceResult<Run>, sqlx::Error> {
    let mut tx = backend.pool().begin().await?;

    let status = sqlx::query_scalar::<_, RunStatus>(
        "SELECT status FROM runs WHERE org_id = $1 AND id = $2 FOR UPDATE",
    )
    .bind(org_id)
    .bind(run_id)
    .fetch_optional(&mut *tx)
    .await?;

    match status {
        None => return Ok(ServiceResult::Failure(ServiceError::not_found("Run"))),
        Some(status) if status.is_terminal() => {
            return Ok(ServiceResult::Failure(ServiceError::with_code(
                "Run has already finished.",
                CONFLICT_CODE,
            )));
        }
        Some(_) => {}
    }

    sqlx::query("UPDATE runs SET status = 'cancelled' WHERE id = $1")
        .bind(run_id)
        .execute(&mut *tx)
        .await?;
    // Queued calls of a cancelled run are never dialed.
    sqlx::query("UPDATE calls SET status = 'failed' WHERE run_id = $1 AND status = 'queued'")
        .bind(run_id)
        .execute(&mut *tx)
        .await?;

    let query = format!("SELECT {RUN_COLUMNS} FROM runs r WHERE r.id = $1");
    let run = sqlx::query_as::<_, Run>(&query)
        .bind(run_id)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(ServiceResult::Success(run))
}
