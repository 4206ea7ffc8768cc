//! Session-limit policy.
//!
//! The policy has a single setting, `sessionLimit`. It arrives either typed
//! ([`SessionLimitPolicy`], validated on construction) or as an entry of an
//! untyped attribute map (authentication context, JSON flow definitions, HTTP
//! requests), in which case it is parsed on every evaluation and rejected with
//! [`PolicyError::InvalidConfiguration`] when missing or not a positive integer.

use std::{collections::BTreeMap, fmt, num::NonZeroU32};

use crate::{context::AuthenticationContext, registry::RegistryError};

mod evaluator;

pub use evaluator::SessionLimitEvaluator;

/// Attribute key holding the session limit.
pub const SESSION_LIMIT_ATTRIBUTE: &str = "sessionLimit";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("Invalid session limit configuration: {0}")]
    InvalidConfiguration(String),
    #[error(transparent)]
    RegistryUnavailable(#[from] RegistryError),
}

/// Maximum number of concurrent active sessions, always at least one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct SessionLimit(NonZeroU32);

impl SessionLimit {
    /// # Errors
    /// Returns `PolicyError::InvalidConfiguration` if `limit` is zero.
    pub fn new(limit: u32) -> Result<Self, PolicyError> {
        NonZeroU32::new(limit).map(Self).ok_or_else(|| {
            PolicyError::InvalidConfiguration("session limit must be positive".to_string())
        })
    }

    /// Parse the runtime form of the setting.
    ///
    /// # Errors
    /// Returns `PolicyError::InvalidConfiguration` if the value is missing,
    /// not an integer, or not positive.
    pub fn parse(value: Option<&str>) -> Result<Self, PolicyError> {
        let value = value.ok_or_else(|| {
            PolicyError::InvalidConfiguration(format!("missing {SESSION_LIMIT_ATTRIBUTE}"))
        })?;

        let parsed: i64 = value.parse().map_err(|_| {
            PolicyError::InvalidConfiguration(format!(
                "{SESSION_LIMIT_ATTRIBUTE} is not an integer: {value:?}"
            ))
        })?;

        if parsed <= 0 {
            return Err(PolicyError::InvalidConfiguration(format!(
                "{SESSION_LIMIT_ATTRIBUTE} must be positive, got {parsed}"
            )));
        }

        u32::try_from(parsed)
            .map_err(|_| {
                PolicyError::InvalidConfiguration(format!(
                    "{SESSION_LIMIT_ATTRIBUTE} is too large: {parsed}"
                ))
            })
            .and_then(Self::new)
    }

    #[must_use]
    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for SessionLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Typed policy configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionLimitPolicy {
    pub session_limit: SessionLimit,
}

impl SessionLimitPolicy {
    #[must_use]
    pub fn new(session_limit: SessionLimit) -> Self {
        Self { session_limit }
    }

    /// Attribute map form, as written into the authentication context.
    #[must_use]
    pub fn to_attributes(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(
            SESSION_LIMIT_ATTRIBUTE.to_string(),
            self.session_limit.to_string(),
        )])
    }

    pub fn apply_to(&self, context: &mut AuthenticationContext) {
        context.set_attribute(SESSION_LIMIT_ATTRIBUTE, self.session_limit.to_string());
    }
}

/// Outcome of comparing the active session count to the limit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    WithinLimit,
    OverLimit,
}

impl Verdict {
    /// The check runs before the new session exists, so one slot must remain.
    #[must_use]
    pub fn from_counts(active_sessions: u64, limit: SessionLimit) -> Self {
        if active_sessions < u64::from(limit.get()) {
            Self::WithinLimit
        } else {
            Self::OverLimit
        }
    }

    #[must_use]
    pub fn is_within_limit(self) -> bool {
        matches!(self, Self::WithinLimit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_is_strictly_less_than() -> Result<(), PolicyError> {
        for limit in 1..=10_u32 {
            let session_limit = SessionLimit::new(limit)?;
            for count in 0..=12_u64 {
                assert_eq!(
                    Verdict::from_counts(count, session_limit).is_within_limit(),
                    count < u64::from(limit),
                    "limit={limit} count={count}"
                );
            }
        }
        Ok(())
    }

    #[test]
    fn verdict_observed_limit_two() -> Result<(), PolicyError> {
        let limit = SessionLimit::new(2)?;
        assert_eq!(Verdict::from_counts(0, limit), Verdict::WithinLimit);
        assert_eq!(Verdict::from_counts(1, limit), Verdict::WithinLimit);
        assert_eq!(Verdict::from_counts(2, limit), Verdict::OverLimit);
        Ok(())
    }

    #[test]
    fn parse_accepts_positive_integers() -> Result<(), PolicyError> {
        assert_eq!(SessionLimit::parse(Some("2"))?.get(), 2);
        assert_eq!(SessionLimit::parse(Some("1"))?.get(), 1);
        Ok(())
    }

    #[test]
    fn parse_rejects_invalid_values() {
        let values = [
            None,
            Some(""),
            Some("two"),
            Some("0"),
            Some("-1"),
            Some("2.5"),
            Some(" 2"),
            Some("99999999999"),
        ];
        for value in values {
            assert!(
                matches!(
                    SessionLimit::parse(value),
                    Err(PolicyError::InvalidConfiguration(_))
                ),
                "value={value:?}"
            );
        }
    }

    #[test]
    fn zero_limit_is_rejected() {
        assert!(matches!(
            SessionLimit::new(0),
            Err(PolicyError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn policy_attributes() -> Result<(), PolicyError> {
        let policy = SessionLimitPolicy::new(SessionLimit::new(3)?);
        let attributes = policy.to_attributes();
        assert_eq!(
            attributes.get(SESSION_LIMIT_ATTRIBUTE).map(String::as_str),
            Some("3")
        );
        Ok(())
    }
}
