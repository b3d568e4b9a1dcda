//! Maps validated CLI matches to the action to run.

use crate::cli::{
    actions::{Action, server::Args},
    commands::{
        ARG_DB_MAX_CONNECTIONS, ARG_DSN, ARG_FRONTEND_BASE_URL, ARG_PORT, provider,
    },
};
use anyhow::{Context, Result};

/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .context("missing required argument: --dsn")?;
    let db_max_connections = matches
        .get_one::<u32>(ARG_DB_MAX_CONNECTIONS)
        .copied()
        .unwrap_or(5);
    let frontend_base_url = matches
        .get_one::<String>(ARG_FRONTEND_BASE_URL)
        .cloned()
        .context("missing required argument: --frontend-base-url")?;
    let provider = provider::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        db_max_connections,
        frontend_base_url,
        auth_provider_url: provider.url,
        auth_provider_secret_key: provider.secret_key,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;
    use secrecy::ExposeSecret;

    #[test]
    fn builds_server_action() {
        temp_env::with_vars([("CARELINE_PORT", None::<&str>)], || {
            let matches = commands::new().get_matches_from(vec![
                "careline",
                "--dsn",
                "postgres://localhost/careline",
                "--auth-provider-url",
                "https://api.auth.tld",
                "--auth-provider-secret-key",
                "sk_test",
                "--frontend-base-url",
                "https://app.careline.dev",
            ]);

            let action = handler(&matches);
            assert!(action.is_ok());
            let Ok(Action::Server(args)) = action else {
                return;
            };
            assert_eq!(args.port, 8080);
            assert_eq!(args.dsn, "postgres://localhost/careline");
            assert_eq!(args.frontend_base_url, "https://app.careline.dev");
            assert_eq!(args.auth_provider_url, "https://api.auth.tld");
            assert_eq!(args.auth_provider_secret_key.expose_secret(), "sk_test");
        });
    }
}
