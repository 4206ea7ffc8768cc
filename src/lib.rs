//! # Sessiongate (session-limit policy gate)
//!
//! `sessiongate` decides, in the middle of a multi-step authentication flow,
//! whether a principal already holds the maximum number of concurrent active
//! sessions. When it does, the flow is diverted through a remediation step
//! (typically terminating old sessions) before the regular step-up challenge
//! continues. The login is not failed.
//!
//! ## Components
//!
//! - [`registry`]: read-only session registry clients (`count_active_sessions`)
//!   backed by an analytics endpoint, `PostgreSQL`, or memory.
//! - [`policy`]: the session-limit evaluator. A principal is within limit only
//!   while `count < limit`, which leaves room for the session being established.
//! - [`flow`]: the step flow controller. Steps are driven through an injected
//!   executor and branch on outcome-keyed continuations.
//! - [`api`]: HTTP policy-decision surface exposing the combined
//!   "is within session limit" call.
//!
//! ## Concurrency
//!
//! Each authentication attempt owns its [`context::AuthenticationContext`]; the
//! controller holds no per-attempt state. The gate is only as strong as the
//! registry's own serialisation of session creation: read-then-act is not
//! atomic, so concurrent logins for the same principal may transiently exceed
//! the limit.

pub mod api;
pub mod cli;
pub mod context;
pub mod flow;
pub mod policy;
pub mod registry;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
