//! Caller identity and capability checks.
//!
//! The session is resolved once at the transport edge (see `api::session`) and
//! then threaded explicitly through every action; nothing here reads global
//! state. The checks are pure reads and must run before validation or any
//! service call.

use serde::Serialize;
use uuid::Uuid;

use crate::models::Role;

/// Authenticated caller as seen by the actions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: Uuid,
    pub email: String,
    /// Organization the session is currently acting in, if the user belongs to one.
    pub org_id: Option<Uuid>,
    pub role: Role,
}

impl Session {
    #[must_use]
    pub fn is_super_admin(&self) -> bool {
        self.role == Role::Superadmin
    }
}

/// Organization resolved from the session; the only org id writes may use.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrgScope {
    pub org_id: Uuid,
    pub role: Role,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Unauthenticated")]
    Unauthenticated,
    #[error("No active organization")]
    NoOrganization,
    #[error("Forbidden")]
    Forbidden,
}

/// Resolve the caller's organization.
///
/// # Errors
/// `Unauthenticated` without a session, `NoOrganization` when the session has
/// no organization membership.
pub fn require_org(session: Option<&Session>) -> Result<OrgScope, AuthError> {
    let session = session.ok_or(AuthError::Unauthenticated)?;
    let org_id = session.org_id.ok_or(AuthError::NoOrganization)?;
    Ok(OrgScope {
        org_id,
        role: session.role,
    })
}

/// Resolve the caller's organization and require an elevated role in it.
///
/// # Errors
/// Same as [`require_org`], plus `Forbidden` for plain members.
pub fn require_org_admin(session: Option<&Session>) -> Result<OrgScope, AuthError> {
    let scope = require_org(session)?;
    match scope.role {
        Role::Admin | Role::Superadmin => Ok(scope),
        Role::Member => Err(AuthError::Forbidden),
    }
}

/// Require the platform-wide `superadmin` role.
///
/// # Errors
/// `Unauthenticated` without a session, `Forbidden` for any other role.
pub fn require_super_admin(session: Option<&Session>) -> Result<&Session, AuthError> {
    let session = session.ok_or(AuthError::Unauthenticated)?;
    if session.is_super_admin() {
        Ok(session)
    } else {
        Err(AuthError::Forbidden)
    }
}

/// Capability a procedure demands of its caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Org,
    OrgAdmin,
    SuperAdmin,
}

impl Access {
    /// Run the matching `require_*` check without keeping its output.
    ///
    /// # Errors
    /// Whatever the underlying check returns.
    pub fn check(self, session: Option<&Session>) -> Result<(), AuthError> {
        match self {
            Self::Org => require_org(session).map(drop),
            Self::OrgAdmin => require_org_admin(session).map(drop),
            Self::SuperAdmin => require_super_admin(session).map(drop),
        }
    }
}
