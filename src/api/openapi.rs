use std::fmt::Write as _;
use utoipa::{
    OpenApi,
    openapi::{Contact, License},
};

use super::handlers::{
    health::{self, Health},
    rpc::{self, ErrorBody, RpcResponse},
};
use crate::{
    actions::FieldError,
    models::{
        Call, CallStatus, Campaign, CampaignStatus, DashboardStats, Invitation, Member,
        Organization, Patient, Role, Run, RunStatus,
    },
    rpc::procedures,
};

#[derive(OpenApi)]
#[openapi(
    paths(health::health, rpc::query, rpc::mutation),
    components(schemas(
        Health,
        RpcResponse,
        ErrorBody,
        FieldError,
        Organization,
        Patient,
        Campaign,
        CampaignStatus,
        Run,
        RunStatus,
        Call,
        CallStatus,
        Member,
        Role,
        Invitation,
        DashboardStats,
    )),
    tags(
        (name = "health", description = "Liveness and build information"),
        (name = "rpc", description = "Remote procedures addressed as namespace.method")
    )
)]
struct ApiDoc;

/// `OpenAPI` document for the HTTP surface, with Cargo metadata as info.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    doc.info.title = env!("CARGO_PKG_NAME").to_string();
    doc.info.version = env!("CARGO_PKG_VERSION").to_string();
    doc.info.description = Some(description());
    doc.info.contact = cargo_contact();
    doc.info.license = optional_str(env!("CARGO_PKG_LICENSE")).map(|identifier| {
        let mut license = License::new(identifier);
        license.identifier = Some(identifier.to_string());
        license
    });
    doc
}

/// Package description followed by the procedure table.
fn description() -> String {
    let mut text = optional_str(env!("CARGO_PKG_DESCRIPTION"))
        .unwrap_or_default()
        .to_string();
    text.push_str("\n\nProcedures:\n");
    for (path, kind) in procedures() {
        let _ = writeln!(text, "- `{path}` ({kind})");
    }
    text
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let primary = env!("CARGO_PKG_AUTHORS").split(';').next().map(str::trim)?;
    let (name, email) = match primary.split_once('<') {
        Some((name, email)) => (name.trim(), email.trim_end_matches('>').trim()),
        None => (primary, ""),
    };
    if name.is_empty() && email.is_empty() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = optional_str(name).map(str::to_string);
    contact.email = optional_str(email).map(str::to_string);
    Some(contact)
}

fn optional_str(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_info_from_cargo() {
        let doc = openapi();
        assert_eq!(doc.info.title, env!("CARGO_PKG_NAME"));
        assert_eq!(doc.info.version, env!("CARGO_PKG_VERSION"));

        let contact = doc.info.contact;
        assert_eq!(
            contact.as_ref().and_then(|c| c.name.as_deref()),
            Some("Team Careline")
        );
        assert_eq!(
            contact.as_ref().and_then(|c| c.email.as_deref()),
            Some("team@careline.dev")
        );
        assert_eq!(
            doc.info.license.map(|license| license.name),
            Some("BSD-3-Clause".to_string())
        );
    }

    #[test]
    fn documents_rpc_paths_and_procedures() {
        let doc = openapi();
        assert!(doc.paths.paths.contains_key("/rpc/{procedure}"));
        assert!(doc.paths.paths.contains_key("/health"));

        let description = doc.info.description.unwrap_or_default();
        assert!(description.contains("- `patient.create` (mutation)"));
        assert!(description.contains("- `dashboard.getDashboardStats` (query)"));
    }

    #[test]
    fn schemas_are_registered() {
        let doc = openapi();
        let schemas = doc.components.map(|c| c.schemas).unwrap_or_default();
        for name in ["Patient", "Campaign", "ErrorBody", "FieldError", "Invitation"] {
            assert!(schemas.contains_key(name), "{name}");
        }
    }
}
