//! Server actions: one async function per use case.
//!
//! Every action takes the explicit [`ActionContext`] and an untyped JSON payload
//! and runs the same strictly sequential pipeline:
//!
//! 1) Authorize through `crate::auth`; failures stop here.
//! 2) Validate the payload with [`validation::Payload`]; all bad fields are
//!    reported together and nothing is partially applied.
//! 3) Normalize, inject the session's org id and call the service layer.
//! 4) Translate the `ServiceResult`: failures become [`ActionError::Service`]
//!    carrying only the message; mutations then revalidate dependent views.

use serde::Serialize;
use std::sync::Arc;
use tracing::warn;
use utoipa::ToSchema;

use crate::{
    auth::{AuthError, Session},
    invitations::InvitationProvider,
    revalidate::Revalidator,
    service::{ServiceError, ServiceResult, Services},
};

pub mod admin;
pub mod calls;
pub mod campaigns;
pub mod organization;
pub mod patients;
pub mod runs;
pub mod validation;

#[cfg(test)]
pub(crate) mod test_support;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error("Unauthenticated")]
    Unauthenticated,
    #[error("No active organization")]
    NoOrganization,
    #[error("Forbidden")]
    Forbidden,
    #[error("Invalid input: {}", field_names(.0))]
    Validation(Vec<FieldError>),
    /// Service-layer failure; displays exactly the envelope's message.
    #[error("{0}")]
    Service(String),
    #[error("{0}")]
    Integration(String),
}

fn field_names(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|error| error.field.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<AuthError> for ActionError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Unauthenticated => Self::Unauthenticated,
            AuthError::NoOrganization => Self::NoOrganization,
            AuthError::Forbidden => Self::Forbidden,
        }
    }
}

impl From<ServiceError> for ActionError {
    fn from(err: ServiceError) -> Self {
        Self::Service(err.message)
    }
}

/// Process-wide collaborators shared by every action invocation.
#[derive(Clone)]
pub struct Backends {
    pub services: Services,
    pub revalidator: Arc<dyn Revalidator>,
    pub invitations: Arc<dyn InvitationProvider>,
}

/// Everything one action invocation may touch: the caller's session and the backends.
#[derive(Clone)]
pub struct ActionContext {
    session: Option<Session>,
    backends: Backends,
}

impl ActionContext {
    #[must_use]
    pub fn new(session: Option<Session>, backends: Backends) -> Self {
        Self { session, backends }
    }

    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    #[must_use]
    pub fn services(&self) -> &Services {
        &self.backends.services
    }

    #[must_use]
    pub fn invitations(&self) -> &dyn InvitationProvider {
        self.backends.invitations.as_ref()
    }

    fn revalidate(&self, path: &str) {
        self.backends.revalidator.revalidate_path(path);
    }
}

/// Stage 4: unwrap the envelope, logging the code that the caller never sees.
fn settle<T>(action: &'static str, result: ServiceResult<T>) -> Result<T, ActionError> {
    result.into_result().map_err(|err| {
        warn!(
            action,
            code = err.code.as_deref().unwrap_or("none"),
            "service call failed: {}",
            err.message
        );
        ActionError::from(err)
    })
}
