use anyhow::Result;
use clap::{Arg, ArgMatches, Command};

use crate::policy::SessionLimit;

pub const ARG_SESSION_LIMIT: &str = "session-limit";

const DEFAULT_SESSION_LIMIT: u32 = 2;

#[derive(Debug, Clone, Copy)]
pub struct Options {
    pub session_limit: SessionLimit,
}

impl Options {
    /// Parse policy arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the session limit is zero.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let limit = matches
            .get_one::<u32>(ARG_SESSION_LIMIT)
            .copied()
            .unwrap_or(DEFAULT_SESSION_LIMIT);

        Ok(Self {
            session_limit: SessionLimit::new(limit)?,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_SESSION_LIMIT)
            .short('l')
            .long(ARG_SESSION_LIMIT)
            .help("Default maximum number of concurrent active sessions per principal")
            .default_value("2")
            .env("SESSIONGATE_SESSION_LIMIT")
            .value_parser(clap::value_parser!(u32).range(1..)),
    )
}
