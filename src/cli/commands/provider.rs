//! Auth provider connection: where invitations are sent and the key to send them with.

use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_AUTH_PROVIDER_URL: &str = "auth-provider-url";
pub const ARG_AUTH_PROVIDER_SECRET_KEY: &str = "auth-provider-secret-key";

#[derive(Debug)]
pub struct Options {
    pub url: String,
    pub secret_key: SecretString,
}

impl Options {
    /// # Errors
    /// Returns an error if a required argument is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let url = matches
            .get_one::<String>(ARG_AUTH_PROVIDER_URL)
            .cloned()
            .context("missing required argument: --auth-provider-url")?;
        let secret_key = matches
            .get_one::<String>(ARG_AUTH_PROVIDER_SECRET_KEY)
            .cloned()
            .map(SecretString::from)
            .context("missing required argument: --auth-provider-secret-key")?;
        Ok(Self { url, secret_key })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_AUTH_PROVIDER_URL)
                .long(ARG_AUTH_PROVIDER_URL)
                .help("Auth provider API base URL, example: https://api.auth.tld")
                .env("CARELINE_AUTH_PROVIDER_URL")
                .required(true),
        )
        .arg(
            Arg::new(ARG_AUTH_PROVIDER_SECRET_KEY)
                .long(ARG_AUTH_PROVIDER_SECRET_KEY)
                .help("Auth provider secret key used for invitations")
                .env("CARELINE_AUTH_PROVIDER_SECRET_KEY")
                .hide_env_values(true)
                .required(true),
        )
}
