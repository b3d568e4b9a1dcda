//! `-v` / `CARELINE_LOG_LEVEL`: how much of the request and action logs to print.
//!
//! The value is a count (`-vv`) or a level name in `CARELINE_LOG_LEVEL`; both
//! land on the same scale that `cli::start` turns into the subscriber's level.

use clap::{Arg, ArgAction, Command, builder::ValueParser};

pub const ARG_VERBOSITY: &str = "verbosity";

/// Level names in verbosity order; the index is the `-v` count.
const LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

fn parse_level(level: &str) -> Result<u8, String> {
    let level = level.trim();
    if let Ok(count) = level.parse::<u8>() {
        return if usize::from(count) < LEVELS.len() {
            Ok(count)
        } else {
            Err(format!("verbosity must be 0..={}", LEVELS.len() - 1))
        };
    }

    LEVELS
        .iter()
        .position(|name| name.eq_ignore_ascii_case(level))
        .and_then(|index| u8::try_from(index).ok())
        .ok_or_else(|| format!("unknown log level '{level}', expected one of {}", LEVELS.join(", ")))
}

#[must_use]
pub fn validator_log_level() -> ValueParser {
    ValueParser::from(parse_level)
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Log more: -v warnings, -vv procedure calls and startup config, -vvv SQL-level debug")
            .env("CARELINE_LOG_LEVEL")
            .global(true)
            .action(ArgAction::Count)
            .value_parser(validator_log_level()),
    )
}
