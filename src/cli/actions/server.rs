use crate::{
    api::{self, ServerConfig},
    cli::telemetry,
};
use anyhow::Result;
use secrecy::SecretString;
use std::fmt::Write as _;
use tracing::info;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub db_max_connections: u32,
    pub frontend_base_url: String,
    pub auth_provider_url: String,
    pub auth_provider_secret_key: SecretString,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable, the auth provider URL is
/// invalid, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let result = api::new(ServerConfig {
        port: args.port,
        dsn: args.dsn,
        db_max_connections: args.db_max_connections,
        frontend_base_url: args.frontend_base_url,
        auth_provider_url: args.auth_provider_url,
        auth_provider_secret_key: args.auth_provider_secret_key,
    })
    .await;

    telemetry::shutdown_tracer();
    result
}

fn log_startup_args(args: &Args) {
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("dsn", redact_dsn(&args.dsn)),
        ("db_max_connections", args.db_max_connections.to_string()),
        ("frontend_base_url", args.frontend_base_url.clone()),
        ("auth_provider_url", args.auth_provider_url.clone()),
    ];
    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "careline {} - {}\n\nStartup configuration:",
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ = write!(message, "\n  {key}:{padding} {value}");
    }
    info!("{message}");
}

fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}

fn short_commit(hash: &str) -> &str {
    let trimmed = hash.trim();
    trimmed.get(..7).unwrap_or(trimmed)
}
