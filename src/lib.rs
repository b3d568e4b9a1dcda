//! # Careline (Healthcare Outreach Operations)
//!
//! `careline` is the backend for organizations that run outbound call campaigns
//! to their patients. It exposes a typed remote-procedure API whose procedures
//! are thin server actions over a service layer.
//!
//! ## Tenant Model
//!
//! Organizations are the tenant boundary. Patients, campaigns, runs and calls
//! all belong to exactly one organization. The organization id used for any
//! write is always taken from the caller's session, never from the payload.
//!
//! ## Server Actions
//!
//! Every procedure runs the same pipeline:
//!
//! 1. Authorize (`auth::require_org`, `auth::require_org_admin`,
//!    `auth::require_super_admin`).
//! 2. Validate the untyped payload, rejecting it whole with every offending field.
//! 3. Normalize, inject server-resolved ids and call the service layer.
//! 4. Translate the `ServiceResult`; mutations then mark dependent views stale.
//!
//! ## Remote Procedures
//!
//! Procedures are addressed as `namespace.method` (`patient.create`,
//! `dashboard.getDashboardStats`, ...). The namespace set is fixed at build time.
//! Queries are served on `GET /rpc/{procedure}` and mutations on `POST /rpc/{procedure}`.

pub mod actions;
pub mod api;
pub mod auth;
pub mod cli;
pub mod invitations;
pub mod models;
pub mod revalidate;
pub mod rpc;
pub mod service;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
