//! Organization invitations through the external auth provider.
//!
//! The provider owns users and invitation emails; careline only asks it to
//! invite an address into an organization with a role. A successful response
//! without an invitation body is treated as "provider returned nothing".

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;
use uuid::Uuid;

use crate::{
    APP_USER_AGENT,
    models::{Invitation, Role},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvitationRequest {
    pub organization_id: Uuid,
    pub email_address: String,
    pub role: Role,
}

#[async_trait]
pub trait InvitationProvider: Send + Sync {
    /// Ask the provider to create an invitation.
    ///
    /// `Ok(None)` means the provider accepted the call but returned no record.
    async fn create_invitation(&self, request: &InvitationRequest) -> Result<Option<Invitation>>;
}

#[derive(Serialize)]
struct InvitationBody<'a> {
    email_address: &'a str,
    role: &'a str,
}

#[derive(Deserialize)]
struct ProviderInvitation {
    id: String,
    email_address: String,
    role: Role,
    #[serde(default = "pending")]
    status: String,
}

fn pending() -> String {
    "pending".to_string()
}

/// HTTP client for the auth provider's invitation endpoint.
#[derive(Debug, Clone)]
pub struct HttpInvitationProvider {
    base_url: Url,
    secret_key: SecretString,
    client: Client,
}

impl HttpInvitationProvider {
    /// # Errors
    /// Returns an error if the base URL is invalid or the HTTP client cannot be built.
    pub fn new(base_url: &str, secret_key: SecretString) -> Result<Self> {
        let base_url =
            Url::parse(base_url).with_context(|| format!("Invalid auth provider URL: {base_url}"))?;
        if base_url.cannot_be_a_base() {
            return Err(anyhow!("Auth provider URL must be absolute: {base_url}"));
        }
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build auth provider HTTP client")?;
        Ok(Self {
            base_url,
            secret_key,
            client,
        })
    }

    fn invitations_url(&self, organization_id: Uuid) -> Result<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Url::parse(&format!(
            "{base}/v1/organizations/{organization_id}/invitations"
        ))
        .context("Failed to build invitation URL")
    }
}

#[async_trait]
impl InvitationProvider for HttpInvitationProvider {
    #[instrument(skip_all, fields(organization_id = %request.organization_id))]
    async fn create_invitation(&self, request: &InvitationRequest) -> Result<Option<Invitation>> {
        let url = self.invitations_url(request.organization_id)?;
        let response = self
            .client
            .post(url)
            .bearer_auth(self.secret_key.expose_secret())
            .json(&InvitationBody {
                email_address: &request.email_address,
                role: request.role.as_str(),
            })
            .send()
            .await
            .context("Auth provider request failed")?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Auth provider responded with {status}"));
        }

        let body = response
            .text()
            .await
            .context("Failed to read auth provider response")?;
        debug!("auth provider responded with {} bytes", body.len());

        parse_invitation(&body, request.organization_id)
    }
}

fn parse_invitation(body: &str, organization_id: Uuid) -> Result<Option<Invitation>> {
    if body.trim().is_empty() {
        return Ok(None);
    }
    let parsed: Option<ProviderInvitation> =
        serde_json::from_str(body).context("Invalid auth provider response")?;
    Ok(parsed.map(|invitation| Invitation {
        id: invitation.id,
        organization_id,
        email_address: invitation.email_address,
        role: invitation.role,
        status: invitation.status,
    }))
}
