//! Organization actions: profile, members and invitations.

use serde_json::Value;
use tracing::{error, info, instrument};

use super::{ActionContext, ActionError, settle, validation::{Payload, valid_email}};
use crate::{
    auth::{require_org, require_org_admin},
    invitations::InvitationRequest,
    models::{Invitation, Member, Organization, Role},
};

pub const MEMBERS_VIEW: &str = "/organization/members";

const EMAIL_MAX: usize = 254;
const ROLES: &str = "member, admin, superadmin";
const INVITATION_FAILED: &str = "Failed to create invitation";

/// # Errors
/// Auth or service failures as `ActionError`.
#[instrument(skip_all, fields(action = "organization.get"))]
pub async fn get_organization(
    ctx: &ActionContext,
    input: Value,
) -> Result<Organization, ActionError> {
    let scope = require_org(ctx.session())?;
    Payload::new(&input).finish()?;

    settle(
        "organization.get",
        ctx.services().organizations.get_organization(scope.org_id).await,
    )
}

/// # Errors
/// Auth or service failures as `ActionError`.
#[instrument(skip_all, fields(action = "organization.listMembers"))]
pub async fn list_members(ctx: &ActionContext, input: Value) -> Result<Vec<Member>, ActionError> {
    let scope = require_org(ctx.session())?;
    Payload::new(&input).finish()?;

    settle(
        "organization.listMembers",
        ctx.services().organizations.list_members(scope.org_id).await,
    )
}

/// Invite an address into the caller's organization through the auth provider.
///
/// Only org admins may invite, and only a superadmin may hand out `superadmin`.
///
/// # Errors
/// Auth and validation failures, or `Integration` when the provider fails or
/// returns no invitation.
#[instrument(skip_all, fields(action = "organization.inviteMember"))]
pub async fn invite_member(ctx: &ActionContext, input: Value) -> Result<Invitation, ActionError> {
    let scope = require_org_admin(ctx.session())?;

    let mut payload = Payload::new(&input);
    let email_address = payload.required_string("emailAddress", EMAIL_MAX);
    if !email_address.is_empty() && !valid_email(&email_address) {
        payload.fail("emailAddress", "Invalid email address");
    }
    let role = payload.required_enum("role", Role::parse, ROLES);
    payload.finish()?;

    if role == Role::Superadmin && scope.role != Role::Superadmin {
        return Err(ActionError::Forbidden);
    }

    let request = InvitationRequest {
        organization_id: scope.org_id,
        email_address: email_address.to_lowercase(),
        role,
    };
    let invitation = match ctx.invitations().create_invitation(&request).await {
        Ok(Some(invitation)) => invitation,
        Ok(None) => {
            error!("auth provider returned no invitation");
            return Err(ActionError::Integration(INVITATION_FAILED.to_string()));
        }
        Err(err) => {
            error!("auth provider invitation failed: {err:#}");
            return Err(ActionError::Integration(INVITATION_FAILED.to_string()));
        }
    };
    info!(invitation_id = %invitation.id, role = role.as_str(), "invitation created");

    ctx.revalidate(MEMBERS_VIEW);
    Ok(invitation)
}
