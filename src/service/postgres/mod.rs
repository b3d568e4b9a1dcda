//! Postgres-backed implementation of the service traits.
//!
//! Every query is scoped by `org_id` except the superadmin reads in
//! `organizations.rs`. Database failures are logged here with their detail and
//! surfaced to callers only as a short message with the `database` code.
//! Soft-deleted patients (`deleted_at IS NOT NULL`) are invisible to every query.

use sqlx::PgPool;
use tracing::error;

use super::{ServiceError, ServiceResult};

mod calls;
mod campaigns;
mod organizations;
mod patients;
mod runs;

const DATABASE_ERROR_CODE: &str = "database";
const CONFLICT_CODE: &str = "conflict";

/// Service backend sharing one connection pool across all service traits.
#[derive(Clone, Debug)]
pub struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Logs a database error and converts it into an opaque failure envelope.
fn database_failure<T>(context: &'static str, err: &sqlx::Error) -> ServiceResult<T> {
    error!("{context}: {err}");
    ServiceResult::Failure(ServiceError::with_code(context, DATABASE_ERROR_CODE))
}

/// Maps a query that may match nothing into the envelope.
fn found<T>(
    result: Result<Option<T>, sqlx::Error>,
    what: &str,
    context: &'static str,
) -> ServiceResult<T> {
    match result {
        Ok(Some(row)) => ServiceResult::Success(row),
        Ok(None) => ServiceResult::Failure(ServiceError::not_found(what)),
        Err(err) => database_failure(context, &err),
    }
}

/// Wraps a search term for `ILIKE`, escaping the pattern metacharacters.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23503"),
        _ => false,
    }
}
