use anyhow::{Context, Result};
use clap::{Arg, ArgGroup, ArgMatches, Command};
use secrecy::SecretString;
use url::Url;

pub const ARG_DSN: &str = "dsn";
pub const ARG_ANALYTICS_COUNT_URL: &str = "analytics-count-url";
pub const ARG_ANALYTICS_SEARCH_URL: &str = "analytics-search-url";
pub const ARG_ANALYTICS_USERNAME: &str = "analytics-username";
pub const ARG_ANALYTICS_PASSWORD: &str = "analytics-password";

const GROUP_REGISTRY: &str = "registry";

/// Session registry backend selected on the command line.
#[derive(Debug, Clone)]
pub enum Options {
    Postgres {
        dsn: String,
    },
    Analytics {
        count_url: Url,
        search_url: Url,
        username: String,
        password: SecretString,
    },
}

impl Options {
    /// Parse registry arguments from matches.
    ///
    /// # Errors
    /// Returns an error if required arguments are missing or a URL is invalid.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
        };

        if let Some(dsn) = get_non_empty(ARG_DSN) {
            return Ok(Self::Postgres { dsn });
        }

        let read_required = |id: &str| -> Result<String> {
            get_non_empty(id).ok_or_else(|| anyhow::anyhow!("missing required argument: --{id}"))
        };

        let count_url = Url::parse(&read_required(ARG_ANALYTICS_COUNT_URL)?)
            .with_context(|| format!("invalid --{ARG_ANALYTICS_COUNT_URL}"))?;
        let search_url = Url::parse(&read_required(ARG_ANALYTICS_SEARCH_URL)?)
            .with_context(|| format!("invalid --{ARG_ANALYTICS_SEARCH_URL}"))?;

        Ok(Self::Analytics {
            count_url,
            search_url,
            username: read_required(ARG_ANALYTICS_USERNAME)?,
            password: SecretString::from(read_required(ARG_ANALYTICS_PASSWORD)?),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_DSN)
                .short('d')
                .long(ARG_DSN)
                .help("PostgreSQL connection string for the active_sessions table")
                .env("SESSIONGATE_DSN"),
        )
        .arg(
            Arg::new(ARG_ANALYTICS_COUNT_URL)
                .long(ARG_ANALYTICS_COUNT_URL)
                .help("Analytics endpoint returning the active session count")
                .env("SESSIONGATE_ANALYTICS_COUNT_URL")
                .requires_all([
                    ARG_ANALYTICS_SEARCH_URL,
                    ARG_ANALYTICS_USERNAME,
                    ARG_ANALYTICS_PASSWORD,
                ]),
        )
        .arg(
            Arg::new(ARG_ANALYTICS_SEARCH_URL)
                .long(ARG_ANALYTICS_SEARCH_URL)
                .help("Analytics endpoint listing active sessions")
                .env("SESSIONGATE_ANALYTICS_SEARCH_URL")
                .requires(ARG_ANALYTICS_COUNT_URL),
        )
        .arg(
            Arg::new(ARG_ANALYTICS_USERNAME)
                .long(ARG_ANALYTICS_USERNAME)
                .help("Analytics basic auth username")
                .env("SESSIONGATE_ANALYTICS_USERNAME")
                .requires(ARG_ANALYTICS_COUNT_URL),
        )
        .arg(
            Arg::new(ARG_ANALYTICS_PASSWORD)
                .long(ARG_ANALYTICS_PASSWORD)
                .help("Analytics basic auth password")
                .env("SESSIONGATE_ANALYTICS_PASSWORD")
                .hide_env_values(true)
                .requires(ARG_ANALYTICS_COUNT_URL),
        )
        .group(
            ArgGroup::new(GROUP_REGISTRY)
                .args([ARG_DSN, ARG_ANALYTICS_COUNT_URL])
                .required(true)
                .multiple(false),
        )
}
