//! Session resolution at the transport edge.
//!
//! The auth provider issues opaque session tokens. Clients present them as
//! `Authorization: Bearer <token>` or in the `careline_session` cookie; only
//! the SHA-256 hash is stored in `user_sessions`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::http::{
    HeaderMap,
    header::{AUTHORIZATION, COOKIE},
};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tracing::{Instrument, info_span};
use uuid::Uuid;

use crate::{auth::Session, models::Role};

pub const SESSION_COOKIE_NAME: &str = "careline_session";

#[async_trait]
pub trait SessionResolver: Send + Sync {
    /// `Ok(None)` when the request carries no valid session.
    async fn resolve(&self, headers: &HeaderMap) -> Result<Option<Session>>;
}

pub struct PgSessionResolver {
    pool: PgPool,
}

impl PgSessionResolver {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    user_id: Uuid,
    email: String,
    is_superadmin: bool,
    active_org_id: Option<Uuid>,
    member_org_id: Option<Uuid>,
    member_role: Option<Role>,
}

impl SessionRow {
    /// Superadmins may act in their active org without a membership row;
    /// everyone else needs one and takes its role as-is.
    fn into_session(self) -> Session {
        if self.is_superadmin {
            return Session {
                user_id: self.user_id,
                email: self.email,
                org_id: self.active_org_id,
                role: Role::Superadmin,
            };
        }
        Session {
            user_id: self.user_id,
            email: self.email,
            org_id: self.member_org_id,
            role: self.member_role.unwrap_or_default(),
        }
    }
}

#[async_trait]
impl SessionResolver for PgSessionResolver {
    async fn resolve(&self, headers: &HeaderMap) -> Result<Option<Session>> {
        let Some(token) = extract_session_token(headers) else {
            return Ok(None);
        };

        let query = r"
            SELECT u.id AS user_id, u.email, u.is_superadmin, s.active_org_id,
                   m.org_id AS member_org_id, m.role AS member_role
            FROM user_sessions s
            JOIN users u ON u.id = s.user_id
            LEFT JOIN org_memberships m ON m.user_id = s.user_id AND m.org_id = s.active_org_id
            WHERE s.session_hash = $1
              AND s.expires_at > NOW()
            LIMIT 1
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query_as::<_, SessionRow>(query)
            .bind(hash_session_token(&token))
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup session")?;

        Ok(row.map(SessionRow::into_session))
    }
}

pub(crate) fn hash_session_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

/// Bearer header first, then the session cookie.
pub(crate) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    let cookies = headers.get(COOKIE)?.to_str().ok()?;
    cookies.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key.trim() == SESSION_COOKIE_NAME && !value.trim().is_empty())
            .then(|| value.trim().to_string())
    })
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
