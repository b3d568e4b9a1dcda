//! Patient actions.
//!
//! Creation coalesces every absent identifying field to `""` before it reaches
//! the service layer, so once stored an absent value and an empty one look the
//! same. Updates are partial and never coalesce.

use serde_json::Value;
use tracing::instrument;
use uuid::Uuid;

use super::{
    ActionContext, ActionError, settle,
    validation::{Payload, valid_date, valid_phone},
};
use crate::{
    auth::require_org,
    models::{NewPatient, Patient, PatientChanges, PatientQuery},
};

pub const PATIENTS_VIEW: &str = "/patients";

const NAME_MAX: usize = 100;
const PHONE_MAX: usize = 32;
const DOB_MAX: usize = 10;
const EMR_ID_MAX: usize = 64;
const SEARCH_MAX: usize = 100;
const LIST_LIMIT_DEFAULT: u32 = 50;
const LIST_LIMIT_MAX: u32 = 100;

fn patient_view(id: Uuid) -> String {
    format!("{PATIENTS_VIEW}/{id}")
}

/// The identifying fields shared by create and update payloads.
struct PatientFields {
    first_name: Option<String>,
    last_name: Option<String>,
    dob: Option<String>,
    primary_phone: Option<String>,
    secondary_phone: Option<String>,
    emr_id_in_org: Option<String>,
}

fn read_patient_fields(payload: &mut Payload<'_>) -> PatientFields {
    PatientFields {
        first_name: payload.optional_string("firstName", NAME_MAX),
        last_name: payload.optional_string("lastName", NAME_MAX),
        dob: payload.optional_matching("dob", DOB_MAX, valid_date, "Expected a YYYY-MM-DD date"),
        primary_phone: payload.optional_matching(
            "primaryPhone",
            PHONE_MAX,
            valid_phone,
            "Invalid phone number",
        ),
        secondary_phone: payload.optional_matching(
            "secondaryPhone",
            PHONE_MAX,
            valid_phone,
            "Invalid phone number",
        ),
        emr_id_in_org: payload.optional_string("emrIdInOrg", EMR_ID_MAX),
    }
}

/// Create a patient in the caller's organization.
///
/// Any `orgId` in the payload is ignored; the session's organization is used.
///
/// # Errors
/// Auth, validation or service failures as `ActionError`.
#[instrument(skip_all, fields(action = "patient.create"))]
pub async fn create_patient(ctx: &ActionContext, input: Value) -> Result<Patient, ActionError> {
    let scope = require_org(ctx.session())?;

    let mut payload = Payload::new(&input);
    let fields = read_patient_fields(&mut payload);
    payload.finish()?;

    // Absent fields are stored as "" (indistinguishable from empty input).
    let patient = NewPatient {
        org_id: scope.org_id,
        first_name: fields.first_name.unwrap_or_default(),
        last_name: fields.last_name.unwrap_or_default(),
        dob: fields.dob.unwrap_or_default(),
        primary_phone: fields.primary_phone.unwrap_or_default(),
        secondary_phone: fields.secondary_phone.unwrap_or_default(),
        emr_id_in_org: fields.emr_id_in_org.unwrap_or_default(),
    };

    let created = settle(
        "patient.create",
        ctx.services().patients.create_patient(patient).await,
    )?;
    ctx.revalidate(PATIENTS_VIEW);
    Ok(created)
}

/// Apply a partial update to a patient of the caller's organization.
///
/// # Errors
/// Auth, validation or service failures as `ActionError`.
#[instrument(skip_all, fields(action = "patient.update"))]
pub async fn update_patient(ctx: &ActionContext, input: Value) -> Result<Patient, ActionError> {
    let scope = require_org(ctx.session())?;

    let mut payload = Payload::new(&input);
    let id = payload.required_uuid("id");
    let fields = read_patient_fields(&mut payload);
    let changes = PatientChanges {
        first_name: fields.first_name,
        last_name: fields.last_name,
        dob: fields.dob,
        primary_phone: fields.primary_phone,
        secondary_phone: fields.secondary_phone,
        emr_id_in_org: fields.emr_id_in_org,
    };
    if changes.is_empty() {
        payload.fail("input", "No updates provided");
    }
    payload.finish()?;

    let updated = settle(
        "patient.update",
        ctx.services()
            .patients
            .update_patient(scope.org_id, id, changes)
            .await,
    )?;
    ctx.revalidate(PATIENTS_VIEW);
    ctx.revalidate(&patient_view(id));
    Ok(updated)
}

/// Soft-delete a patient; returns the deleted id.
///
/// # Errors
/// Auth, validation or service failures as `ActionError`.
#[instrument(skip_all, fields(action = "patient.delete"))]
pub async fn delete_patient(ctx: &ActionContext, input: Value) -> Result<Uuid, ActionError> {
    let scope = require_org(ctx.session())?;

    let mut payload = Payload::new(&input);
    let id = payload.required_uuid("id");
    payload.finish()?;

    let deleted = settle(
        "patient.delete",
        ctx.services().patients.delete_patient(scope.org_id, id).await,
    )?;
    ctx.revalidate(PATIENTS_VIEW);
    ctx.revalidate(&patient_view(id));
    Ok(deleted)
}

/// # Errors
/// Auth, validation or service failures as `ActionError`.
#[instrument(skip_all, fields(action = "patient.get"))]
pub async fn get_patient(ctx: &ActionContext, input: Value) -> Result<Patient, ActionError> {
    let scope = require_org(ctx.session())?;

    let mut payload = Payload::new(&input);
    let id = payload.required_uuid("id");
    payload.finish()?;

    settle(
        "patient.get",
        ctx.services().patients.get_patient(scope.org_id, id).await,
    )
}

/// List patients, optionally filtered by a name/phone/EMR id search.
///
/// # Errors
/// Auth, validation or service failures as `ActionError`.
#[instrument(skip_all, fields(action = "patient.list"))]
pub async fn list_patients(ctx: &ActionContext, input: Value) -> Result<Vec<Patient>, ActionError> {
    let scope = require_org(ctx.session())?;

    let mut payload = Payload::new(&input);
    let search = payload
        .optional_string("search", SEARCH_MAX)
        .filter(|term| !term.is_empty());
    let limit = payload.u32_in("limit", 1..=LIST_LIMIT_MAX, LIST_LIMIT_DEFAULT);
    let offset = payload.u32_in("offset", 0..=u32::MAX, 0);
    payload.finish()?;

    let query = PatientQuery {
        search,
        limit,
        offset,
    };
    settle(
        "patient.list",
        ctx.services().patients.list_patients(scope.org_id, query).await,
    )
}
