//! Recording fakes for action and router tests.
//!
//! `FakeBackend` implements every service trait in memory, records which
//! operations ran (and with which org ids and payloads), and can be switched
//! to fail every call with a fixed `ServiceError`.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

use super::{ActionContext, Backends};
use crate::{
    auth::Session,
    invitations::{InvitationProvider, InvitationRequest},
    models::{
        Call, CallQuery, CallStatus, Campaign, CampaignStatus, DashboardStats, Invitation, Member,
        NewCampaign, NewPatient, NewRun, Organization, Patient, PatientChanges, PatientQuery, Role,
        Run, RunStatus,
    },
    revalidate::Revalidator,
    service::{
        AdminService, CallService, CampaignService, OrganizationService, PatientService,
        RunService, ServiceError, ServiceResult, Services,
    },
};

pub(crate) const TIMESTAMP: &str = "2024-05-01T09:30:00Z";

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
pub(crate) struct FakeBackend {
    operations: Mutex<Vec<&'static str>>,
    org_ids: Mutex<Vec<Uuid>>,
    new_patients: Mutex<Vec<NewPatient>>,
    patient_changes: Mutex<Vec<PatientChanges>>,
    patient_queries: Mutex<Vec<PatientQuery>>,
    new_campaigns: Mutex<Vec<NewCampaign>>,
    new_runs: Mutex<Vec<NewRun>>,
    call_queries: Mutex<Vec<CallQuery>>,
    recent_limits: Mutex<Vec<u32>>,
    failure: Mutex<Option<ServiceError>>,
    recent_calls: Vec<Call>,
}

impl FakeBackend {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn failing(error: ServiceError) -> Arc<Self> {
        let backend = Self::default();
        *lock(&backend.failure) = Some(error);
        Arc::new(backend)
    }

    pub(crate) fn with_recent_calls(calls: Vec<Call>) -> Arc<Self> {
        Arc::new(Self {
            recent_calls: calls,
            ..Self::default()
        })
    }

    pub(crate) fn operations(&self) -> Vec<&'static str> {
        lock(&self.operations).clone()
    }

    pub(crate) fn org_ids(&self) -> Vec<Uuid> {
        lock(&self.org_ids).clone()
    }

    pub(crate) fn new_patients(&self) -> Vec<NewPatient> {
        lock(&self.new_patients).clone()
    }

    pub(crate) fn patient_changes(&self) -> Vec<PatientChanges> {
        lock(&self.patient_changes).clone()
    }

    pub(crate) fn patient_queries(&self) -> Vec<PatientQuery> {
        lock(&self.patient_queries).clone()
    }

    pub(crate) fn new_campaigns(&self) -> Vec<NewCampaign> {
        lock(&self.new_campaigns).clone()
    }

    pub(crate) fn new_runs(&self) -> Vec<NewRun> {
        lock(&self.new_runs).clone()
    }

    pub(crate) fn call_queries(&self) -> Vec<CallQuery> {
        lock(&self.call_queries).clone()
    }

    pub(crate) fn recent_limits(&self) -> Vec<u32> {
        lock(&self.recent_limits).clone()
    }

    fn respond<T>(&self, operation: &'static str, data: impl FnOnce() -> T) -> ServiceResult<T> {
        lock(&self.operations).push(operation);
        match lock(&self.failure).clone() {
            Some(error) => ServiceResult::Failure(error),
            None => ServiceResult::Success(data()),
        }
    }

    fn scoped(&self, org_id: Uuid) {
        lock(&self.org_ids).push(org_id);
    }
}

pub(crate) fn patient(id: Uuid, org_id: Uuid, first_name: &str) -> Patient {
    Patient {
        id,
        org_id,
        first_name: first_name.to_string(),
        last_name: String::new(),
        dob: String::new(),
        primary_phone: String::new(),
        secondary_phone: String::new(),
        emr_id_in_org: String::new(),
        created_at: TIMESTAMP.to_string(),
        updated_at: TIMESTAMP.to_string(),
    }
}

pub(crate) fn campaign(id: Uuid, org_id: Uuid, name: &str, status: CampaignStatus) -> Campaign {
    Campaign {
        id,
        org_id,
        name: name.to_string(),
        description: String::new(),
        status,
        created_at: TIMESTAMP.to_string(),
    }
}

pub(crate) fn run(id: Uuid, org_id: Uuid, campaign_id: Uuid, status: RunStatus) -> Run {
    Run {
        id,
        org_id,
        campaign_id,
        status,
        total_calls: 0,
        created_at: TIMESTAMP.to_string(),
    }
}

pub(crate) fn call(org_id: Uuid, status: CallStatus) -> Call {
    Call {
        id: Uuid::new_v4(),
        org_id,
        run_id: None,
        patient_id: Uuid::new_v4(),
        status,
        duration_seconds: Some(42),
        summary: None,
        created_at: TIMESTAMP.to_string(),
    }
}

#[async_trait]
impl PatientService for FakeBackend {
    async fn create_patient(&self, new: NewPatient) -> ServiceResult<Patient> {
        self.scoped(new.org_id);
        lock(&self.new_patients).push(new.clone());
        self.respond("create_patient", || Patient {
            last_name: new.last_name,
            dob: new.dob,
            primary_phone: new.primary_phone,
            secondary_phone: new.secondary_phone,
            emr_id_in_org: new.emr_id_in_org,
            ..patient(Uuid::new_v4(), new.org_id, &new.first_name)
        })
    }

    async fn update_patient(
        &self,
        org_id: Uuid,
        patient_id: Uuid,
        changes: PatientChanges,
    ) -> ServiceResult<Patient> {
        self.scoped(org_id);
        lock(&self.patient_changes).push(changes.clone());
        self.respond("update_patient", || {
            patient(
                patient_id,
                org_id,
                changes.first_name.as_deref().unwrap_or("unchanged"),
            )
        })
    }

    async fn delete_patient(&self, org_id: Uuid, patient_id: Uuid) -> ServiceResult<Uuid> {
        self.scoped(org_id);
        self.respond("delete_patient", || patient_id)
    }

    async fn get_patient(&self, org_id: Uuid, patient_id: Uuid) -> ServiceResult<Patient> {
        self.scoped(org_id);
        self.respond("get_patient", || patient(patient_id, org_id, "Ada"))
    }

    async fn list_patients(&self, org_id: Uuid, query: PatientQuery) -> ServiceResult<Vec<Patient>> {
        self.scoped(org_id);
        lock(&self.patient_queries).push(query);
        self.respond("list_patients", || vec![patient(Uuid::new_v4(), org_id, "Ada")])
    }
}

#[async_trait]
impl CampaignService for FakeBackend {
    async fn create_campaign(&self, new: NewCampaign) -> ServiceResult<Campaign> {
        self.scoped(new.org_id);
        lock(&self.new_campaigns).push(new.clone());
        self.respond("create_campaign", || {
            campaign(Uuid::new_v4(), new.org_id, &new.name, new.status)
        })
    }

    async fn list_campaigns(&self, org_id: Uuid) -> ServiceResult<Vec<Campaign>> {
        self.scoped(org_id);
        self.respond("list_campaigns", Vec::new)
    }

    async fn get_campaign(&self, org_id: Uuid, campaign_id: Uuid) -> ServiceResult<Campaign> {
        self.scoped(org_id);
        self.respond("get_campaign", || {
            campaign(campaign_id, org_id, "Flu shots", CampaignStatus::Active)
        })
    }

    async fn update_campaign_status(
        &self,
        org_id: Uuid,
        campaign_id: Uuid,
        status: CampaignStatus,
    ) -> ServiceResult<Campaign> {
        self.scoped(org_id);
        self.respond("update_campaign_status", || {
            campaign(campaign_id, org_id, "Flu shots", status)
        })
    }
}

#[async_trait]
impl RunService for FakeBackend {
    async fn create_run(&self, new: NewRun) -> ServiceResult<Run> {
        self.scoped(new.org_id);
        lock(&self.new_runs).push(new.clone());
        self.respond("create_run", || Run {
            total_calls: i64::try_from(new.patient_ids.len()).unwrap_or_default(),
            ..run(Uuid::new_v4(), new.org_id, new.campaign_id, RunStatus::Pending)
        })
    }

    async fn list_runs(&self, org_id: Uuid, _campaign_id: Option<Uuid>) -> ServiceResult<Vec<Run>> {
        self.scoped(org_id);
        self.respond("list_runs", Vec::new)
    }

    async fn get_run(&self, org_id: Uuid, run_id: Uuid) -> ServiceResult<Run> {
        self.scoped(org_id);
        self.respond("get_run", || {
            run(run_id, org_id, Uuid::nil(), RunStatus::Running)
        })
    }

    async fn cancel_run(&self, org_id: Uuid, run_id: Uuid) -> ServiceResult<Run> {
        self.scoped(org_id);
        self.respond("cancel_run", || {
            run(run_id, org_id, Uuid::nil(), RunStatus::Cancelled)
        })
    }
}

#[async_trait]
impl CallService for FakeBackend {
    async fn list_calls(&self, org_id: Uuid, query: CallQuery) -> ServiceResult<Vec<Call>> {
        self.scoped(org_id);
        lock(&self.call_queries).push(query);
        self.respond("list_calls", || vec![call(org_id, CallStatus::Completed)])
    }

    async fn get_call(&self, org_id: Uuid, call_id: Uuid) -> ServiceResult<Call> {
        self.scoped(org_id);
        self.respond("get_call", || Call {
            id: call_id,
            ..call(org_id, CallStatus::Voicemail)
        })
    }
}

#[async_trait]
impl OrganizationService for FakeBackend {
    async fn get_organization(&self, org_id: Uuid) -> ServiceResult<Organization> {
        self.scoped(org_id);
        self.respond("get_organization", || Organization {
            id: org_id,
            name: "Riverside Clinic".to_string(),
            created_at: TIMESTAMP.to_string(),
        })
    }

    async fn list_members(&self, org_id: Uuid) -> ServiceResult<Vec<Member>> {
        self.scoped(org_id);
        self.respond("list_members", || {
            vec![Member {
                user_id: Uuid::new_v4(),
                email: "admin@riverside.org".to_string(),
                role: Role::Admin,
                joined_at: TIMESTAMP.to_string(),
            }]
        })
    }
}

#[async_trait]
impl AdminService for FakeBackend {
    async fn dashboard_stats(&self) -> ServiceResult<DashboardStats> {
        self.respond("dashboard_stats", || DashboardStats {
            organizations: 2,
            patients: 40,
            campaigns: 3,
            runs: 5,
            calls: 120,
            completed_calls: 97,
        })
    }

    async fn recent_calls(&self, limit: u32) -> ServiceResult<Vec<Call>> {
        lock(&self.recent_limits).push(limit);
        let calls = self.recent_calls.clone();
        self.respond("recent_calls", || calls)
    }

    async fn list_organizations(&self) -> ServiceResult<Vec<Organization>> {
        self.respond("list_organizations", Vec::new)
    }
}

#[derive(Default)]
pub(crate) struct RecordingRevalidator {
    paths: Mutex<Vec<String>>,
}

impl RecordingRevalidator {
    pub(crate) fn paths(&self) -> Vec<String> {
        lock(&self.paths).clone()
    }
}

impl Revalidator for RecordingRevalidator {
    fn revalidate_path(&self, path: &str) {
        lock(&self.paths).push(path.to_string());
    }
}

/// What the fake invitation provider answers with.
#[derive(Clone, Copy, Default)]
pub(crate) enum ProviderReply {
    #[default]
    Invitation,
    Nothing,
    Error,
}

#[derive(Default)]
pub(crate) struct FakeInvitations {
    reply: ProviderReply,
    requests: Mutex<Vec<InvitationRequest>>,
}

impl FakeInvitations {
    pub(crate) fn replying(reply: ProviderReply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn requests(&self) -> Vec<InvitationRequest> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl InvitationProvider for FakeInvitations {
    async fn create_invitation(&self, request: &InvitationRequest) -> Result<Option<Invitation>> {
        lock(&self.requests).push(request.clone());
        match self.reply {
            ProviderReply::Invitation => Ok(Some(Invitation {
                id: "inv_1".to_string(),
                organization_id: request.organization_id,
                email_address: request.email_address.clone(),
                role: request.role,
                status: "pending".to_string(),
            })),
            ProviderReply::Nothing => Ok(None),
            ProviderReply::Error => Err(anyhow!("connection refused")),
        }
    }
}

/// Test harness bundling the fakes behind an action context.
pub(crate) struct Harness {
    pub(crate) backend: Arc<FakeBackend>,
    pub(crate) revalidator: Arc<RecordingRevalidator>,
    pub(crate) invitations: Arc<FakeInvitations>,
}

impl Harness {
    pub(crate) fn new() -> Self {
        Self::with_backend(FakeBackend::new())
    }

    pub(crate) fn with_backend(backend: Arc<FakeBackend>) -> Self {
        Self {
            backend,
            revalidator: Arc::new(RecordingRevalidator::default()),
            invitations: FakeInvitations::replying(ProviderReply::Invitation),
        }
    }

    pub(crate) fn with_invitations(mut self, reply: ProviderReply) -> Self {
        self.invitations = FakeInvitations::replying(reply);
        self
    }

    pub(crate) fn backends(&self) -> Backends {
        Backends {
            services: Services::from_backend(self.backend.clone()),
            revalidator: self.revalidator.clone(),
            invitations: self.invitations.clone(),
        }
    }

    pub(crate) fn context(&self, session: Option<Session>) -> ActionContext {
        ActionContext::new(session, self.backends())
    }
}

pub(crate) fn session_in(org_id: Uuid, role: Role) -> Session {
    Session {
        user_id: Uuid::new_v4(),
        email: "staff@riverside.org".to_string(),
        org_id: Some(org_id),
        role,
    }
}

pub(crate) fn superadmin() -> Session {
    Session {
        user_id: Uuid::new_v4(),
        email: "root@careline.dev".to_string(),
        org_id: None,
        role: Role::Superadmin,
    }
}
