use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_ADMIN_TOKEN: &str = "admin-token";

#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Bearer token for the session listing and termination routes. Without
    /// one those routes reject every request.
    pub admin_token: Option<SecretString>,
}

impl Options {
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        Self {
            admin_token: matches
                .get_one::<String>(ARG_ADMIN_TOKEN)
                .filter(|token| !token.trim().is_empty())
                .map(|token| SecretString::from(token.clone())),
        }
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_ADMIN_TOKEN)
            .long(ARG_ADMIN_TOKEN)
            .help("Bearer token required to list or terminate sessions")
            .env("SESSIONGATE_ADMIN_TOKEN")
            .hide_env_values(true),
    )
}
