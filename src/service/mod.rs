//! Service layer contracts.
//!
//! Every service call returns a [`ServiceResult`]: either the data or a
//! [`ServiceError`] carrying a human readable message and an optional code.
//! The traits are object safe so actions can run against Postgres in
//! production and against recording fakes in tests.

use async_trait::async_trait;
use serde::{Serialize, Serializer, ser::SerializeStruct};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::{
    Call, CallQuery, Campaign, CampaignStatus, DashboardStats, Member, NewCampaign, NewPatient,
    NewRun, Organization, Patient, PatientChanges, PatientQuery, Run,
};

pub mod postgres;

/// Failure half of the envelope.
///
/// `message` is safe to show to the caller; `code` is for logs and metrics only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct ServiceError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ServiceError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    #[must_use]
    pub fn with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: Some(code.into()),
        }
    }

    #[must_use]
    pub fn not_found(what: &str) -> Self {
        Self::with_code(format!("{what} not found"), "not_found")
    }
}

/// Tagged success/error envelope returned by every service operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceResult<T> {
    Success(T),
    Failure(ServiceError),
}

/// Returns `true` for the failure variant.
pub fn is_error<T>(result: &ServiceResult<T>) -> bool {
    matches!(result, ServiceResult::Failure(_))
}

impl<T> ServiceResult<T> {
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure(ServiceError::new(message))
    }

    /// Converts into a plain `Result` for `?` propagation.
    ///
    /// # Errors
    /// Returns the envelope's `ServiceError` for the failure variant.
    pub fn into_result(self) -> Result<T, ServiceError> {
        match self {
            Self::Success(data) => Ok(data),
            Self::Failure(err) => Err(err),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ServiceResult<U> {
        match self {
            Self::Success(data) => ServiceResult::Success(f(data)),
            Self::Failure(err) => ServiceResult::Failure(err),
        }
    }
}

impl<T> From<Result<T, ServiceError>> for ServiceResult<T> {
    fn from(result: Result<T, ServiceError>) -> Self {
        match result {
            Ok(data) => Self::Success(data),
            Err(err) => Self::Failure(err),
        }
    }
}

// Wire shape: `{ "ok": true, "data": .. }` or `{ "ok": false, "error": .. }`.
impl<T: Serialize> Serialize for ServiceResult<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ServiceResult", 2)?;
        match self {
            Self::Success(data) => {
                state.serialize_field("ok", &true)?;
                state.serialize_field("data", data)?;
            }
            Self::Failure(err) => {
                state.serialize_field("ok", &false)?;
                state.serialize_field("error", err)?;
            }
        }
        state.end()
    }
}

#[async_trait]
pub trait PatientService: Send + Sync {
    async fn create_patient(&self, patient: NewPatient) -> ServiceResult<Patient>;
    async fn update_patient(
        &self,
        org_id: Uuid,
        patient_id: Uuid,
        changes: PatientChanges,
    ) -> ServiceResult<Patient>;
    async fn delete_patient(&self, org_id: Uuid, patient_id: Uuid) -> ServiceResult<Uuid>;
    async fn get_patient(&self, org_id: Uuid, patient_id: Uuid) -> ServiceResult<Patient>;
    async fn list_patients(&self, org_id: Uuid, query: PatientQuery)
        -> ServiceResult<Vec<Patient>>;
}

#[async_trait]
pub trait CampaignService: Send + Sync {
    async fn create_campaign(&self, campaign: NewCampaign) -> ServiceResult<Campaign>;
    async fn list_campaigns(&self, org_id: Uuid) -> ServiceResult<Vec<Campaign>>;
    async fn get_campaign(&self, org_id: Uuid, campaign_id: Uuid) -> ServiceResult<Campaign>;
    async fn update_campaign_status(
        &self,
        org_id: Uuid,
        campaign_id: Uuid,
        status: CampaignStatus,
    ) -> ServiceResult<Campaign>;
}

#[async_trait]
pub trait RunService: Send + Sync {
    async fn create_run(&self, run: NewRun) -> ServiceResult<Run>;
    async fn list_runs(&self, org_id: Uuid, campaign_id: Option<Uuid>) -> ServiceResult<Vec<Run>>;
    async fn get_run(&self, org_id: Uuid, run_id: Uuid) -> ServiceResult<Run>;
    async fn cancel_run(&self, org_id: Uuid, run_id: Uuid) -> ServiceResult<Run>;
}

#[async_trait]
pub trait CallService: Send + Sync {
    async fn list_calls(&self, org_id: Uuid, query: CallQuery) -> ServiceResult<Vec<Call>>;
    async fn get_call(&self, org_id: Uuid, call_id: Uuid) -> ServiceResult<Call>;
}

#[async_trait]
pub trait OrganizationService: Send + Sync {
    async fn get_organization(&self, org_id: Uuid) -> ServiceResult<Organization>;
    async fn list_members(&self, org_id: Uuid) -> ServiceResult<Vec<Member>>;
}

/// Platform-wide reads reserved for superadmins.
#[async_trait]
pub trait AdminService: Send + Sync {
    async fn dashboard_stats(&self) -> ServiceResult<DashboardStats>;
    async fn recent_calls(&self, limit: u32) -> ServiceResult<Vec<Call>>;
    async fn list_organizations(&self) -> ServiceResult<Vec<Organization>>;
}

/// Handles to every service, cloned cheaply into each action context.
#[derive(Clone)]
pub struct Services {
    pub patients: Arc<dyn PatientService>,
    pub campaigns: Arc<dyn CampaignService>,
    pub runs: Arc<dyn RunService>,
    pub calls: Arc<dyn CallService>,
    pub organizations: Arc<dyn OrganizationService>,
    pub admin: Arc<dyn AdminService>,
}

impl Services {
    /// Wire every service to one backend implementing all of them.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: PatientService
            + CampaignService
            + RunService
            + CallService
            + OrganizationService
            + AdminService
            + 'static,
    {
        Self {
            patients: backend.clone(),
            campaigns: backend.clone(),
            runs: backend.clone(),
            calls: backend.clone(),
            organizations: backend.clone(),
            admin: backend,
        }
    }
}
