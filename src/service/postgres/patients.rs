use async_trait::async_trait;
use uuid::Uuid;

use super::{PgBackend, database_failure, found, like_pattern};
use crate::{
    models::{NewPatient, Patient, PatientChanges, PatientQuery},
    service::{PatientService, ServiceResult},
};

const PATIENT_COLUMNS: &str = r"
    id, org_id, first_name, last_name, dob, primary_phone, secondary_phone, emr_id_in_org,
    iso8601(created_at) AS created_at, iso8601(updated_at) AS updated_at
";

#[async_trait]
impl PatientService for PgBackend {
    async fn create_patient(&self, patient: NewPatient) -> ServiceResult<Patient> {
        let query = format!(
            r"
            INSERT INTO patients
                (org_id, first_name, last_name, dob, primary_phone, secondary_phone, emr_id_in_org)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {PATIENT_COLUMNS}
            "
        );
        match sqlx::query_as::<_, Patient>(&query)
            .bind(patient.org_id)
            .bind(&patient.first_name)
            .bind(&patient.last_name)
            .bind(&patient.dob)
            .bind(&patient.primary_phone)
            .bind(&patient.secondary_phone)
            .bind(&patient.emr_id_in_org)
            .fetch_one(self.pool())
            .await
        {
            Ok(row) => ServiceResult::Success(row),
            Err(err) => database_failure("Failed to create patient", &err),
        }
    }

    async fn update_patient(
        &self,
        org_id: Uuid,
        patient_id: Uuid,
        changes: PatientChanges,
    ) -> ServiceResult<Patient> {
        let query = format!(
            r"
            UPDATE patients SET
                first_name = COALESCE($3, first_name),
                last_name = COALESCE($4, last_name),
                dob = COALESCE($5, dob),
                primary_phone = COALESCE($6, primary_phone),
                secondary_phone = COALESCE($7, secondary_phone),
                emr_id_in_org = COALESCE($8, emr_id_in_org),
                updated_at = NOW()
            WHERE org_id = $1 AND id = $2 AND deleted_at IS NULL
            RETURNING {PATIENT_COLUMNS}
            "
        );
        let result = sqlx::query_as::<_, Patient>(&query)
            .bind(org_id)
            .bind(patient_id)
            .bind(changes.first_name)
            .bind(changes.last_name)
            .bind(changes.dob)
            .bind(changes.primary_phone)
            .bind(changes.secondary_phone)
            .bind(changes.emr_id_in_org)
            .fetch_optional(self.pool())
            .await;
        found(result, "Patient", "Failed to update patient")
    }

    async fn delete_patient(&self, org_id: Uuid, patient_id: Uuid) -> ServiceResult<Uuid> {
        let result = sqlx::query_scalar::<_, Uuid>(
            r"
            UPDATE patients SET deleted_at = NOW(), updated_at = NOW()
            WHERE org_id = $1 AND id = $2 AND deleted_at IS NULL
            RETURNING id
            ",
        )
        .bind(org_id)
        .bind(patient_id)
        .fetch_optional(self.pool())
        .await;
        found(result, "Patient", "Failed to delete patient")
    }

    async fn get_patient(&self, org_id: Uuid, patient_id: Uuid) -> ServiceResult<Patient> {
        let query = format!(
            r"
            SELECT {PATIENT_COLUMNS}
            FROM patients
            WHERE org_id = $1 AND id = $2 AND deleted_at IS NULL
            "
        );
        let result = sqlx::query_as::<_, Patient>(&query)
            .bind(org_id)
            .bind(patient_id)
            .fetch_optional(self.pool())
            .await;
        found(result, "Patient", "Failed to load patient")
    }

    async fn list_patients(
        &self,
        org_id: Uuid,
        query: PatientQuery,
    ) -> ServiceResult<Vec<Patient>> {
        let sql = format!(
            r"
            SELECT {PATIENT_COLUMNS}
            FROM patients
            WHERE org_id = $1
              AND deleted_at IS NULL
              AND (
                $2::text IS NULL
                OR first_name ILIKE $2
                OR last_name ILIKE $2
                OR primary_phone ILIKE $2
                OR emr_id_in_org ILIKE $2
              )
            ORDER BY last_name, first_name, created_at
            LIMIT $3 OFFSET $4
            "
        );
        match sqlx::query_as::<_, Patient>(&sql)
            .bind(org_id)
            .bind(query.search.as_deref().map(like_pattern))
            .bind(i64::from(query.limit))
            .bind(i64::from(query.offset))
            .fetch_all(self.pool())
            .await
        {
            Ok(rows) => ServiceResult::Success(rows),
            Err(err) => database_failure("Failed to list patients", &err),
        }
    }
}
