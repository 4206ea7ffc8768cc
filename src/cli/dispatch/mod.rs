//! Maps validated CLI arguments to the action to execute.

use crate::cli::actions::{
    server::{Args, RegistryBackend},
    Action,
};
use crate::cli::commands::{admin, policy, registry};
use crate::registry::AnalyticsConfig;
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);

    let policy_opts = policy::Options::parse(matches)?;

    let registry = match registry::Options::parse(matches)? {
        registry::Options::Postgres { dsn } => RegistryBackend::Postgres { dsn },
        registry::Options::Analytics {
            count_url,
            search_url,
            username,
            password,
        } => RegistryBackend::Analytics(AnalyticsConfig::new(
            count_url, search_url, username, password,
        )),
    };

    Ok(Action::Server(Args {
        port,
        session_limit: policy_opts.session_limit,
        registry,
        admin_token: admin::Options::parse(matches).admin_token,
    }))
}
