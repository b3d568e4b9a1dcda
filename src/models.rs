//! Row types shared by the service layer, the actions and the RPC responses.
//!
//! Field names serialize in `camelCase` because the web client consumes them
//! as-is. Timestamps are rendered by Postgres as UTC ISO-8601 strings.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    pub id: Uuid,
    pub org_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub dob: String,
    pub primary_phone: String,
    pub secondary_phone: String,
    pub emr_id_in_org: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Patient payload handed to the service layer on create.
///
/// Every identifying field is a plain `String`: absent input has already been
/// coalesced to `""` by the action, so the service never sees a missing value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPatient {
    pub org_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub dob: String,
    pub primary_phone: String,
    pub secondary_phone: String,
    pub emr_id_in_org: String,
}

/// Partial patient update; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub dob: Option<String>,
    pub primary_phone: Option<String>,
    pub secondary_phone: Option<String>,
    pub emr_id_in_org: Option<String>,
}

impl PatientChanges {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.dob.is_none()
            && self.primary_phone.is_none()
            && self.secondary_phone.is_none()
            && self.emr_id_in_org.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientQuery {
    pub search: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, ToSchema, PartialEq, Eq, Default,
)]
#[sqlx(type_name = "campaign_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    #[default]
    Draft,
    Active,
    Paused,
    Archived,
}

impl CampaignStatus {
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(Self::Draft),
            "active" => Some(Self::Active),
            "paused" => Some(Self::Paused),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: Uuid,
    pub org_id: Uuid,
    pub name: String,
    pub description: String,
    pub status: CampaignStatus,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCampaign {
    pub org_id: Uuid,
    pub name: String,
    pub description: String,
    pub status: CampaignStatus,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, ToSchema, PartialEq, Eq)]
#[sqlx(type_name = "run_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    /// Runs in a terminal state can no longer be cancelled.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    pub id: Uuid,
    pub org_id: Uuid,
    pub campaign_id: Uuid,
    pub status: RunStatus,
    pub total_calls: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRun {
    pub org_id: Uuid,
    pub campaign_id: Uuid,
    pub patient_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, ToSchema, PartialEq, Eq)]
#[sqlx(type_name = "call_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
    NoAnswer,
    Voicemail,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Call {
    pub id: Uuid,
    pub org_id: Uuid,
    pub run_id: Option<Uuid>,
    pub patient_id: Uuid,
    pub status: CallStatus,
    pub duration_seconds: Option<i32>,
    pub summary: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallQuery {
    pub run_id: Option<Uuid>,
    pub limit: u32,
}

/// Roles an organization member can hold, plus the platform-wide `superadmin`.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, ToSchema, PartialEq, Eq, Default,
)]
#[sqlx(type_name = "member_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Member,
    Admin,
    Superadmin,
}

impl Role {
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "member" => Some(Self::Member),
            "admin" => Some(Self::Admin),
            "superadmin" => Some(Self::Superadmin),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::Admin => "admin",
            Self::Superadmin => "superadmin",
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub joined_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Invitation {
    pub id: String,
    pub organization_id: Uuid,
    pub email_address: String,
    pub role: Role,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub organizations: i64,
    pub patients: i64,
    pub campaigns: i64,
    pub runs: i64,
    pub calls: i64,
    pub completed_calls: i64,
}
