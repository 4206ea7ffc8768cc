use std::{collections::HashMap, fmt, sync::Arc};
use tracing::{debug, instrument};

use super::{PolicyError, SessionLimit, Verdict, SESSION_LIMIT_ATTRIBUTE};
use crate::{
    context::{AuthenticationContext, PrincipalId},
    registry::SessionRegistry,
};

/// Combines the configured limit with a fresh registry count.
///
/// Holds no per-principal state; every call reads the registry.
#[derive(Clone)]
pub struct SessionLimitEvaluator {
    registry: Arc<dyn SessionRegistry>,
}

impl fmt::Debug for SessionLimitEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionLimitEvaluator").finish_non_exhaustive()
    }
}

impl SessionLimitEvaluator {
    #[must_use]
    pub fn new(registry: Arc<dyn SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Evaluate the limit stored in the context attributes.
    ///
    /// # Errors
    /// Returns `PolicyError::InvalidConfiguration` if `sessionLimit` is missing
    /// or invalid (the registry is not queried), or
    /// `PolicyError::RegistryUnavailable` if the count cannot be read.
    pub async fn evaluate(&self, context: &AuthenticationContext) -> Result<Verdict, PolicyError> {
        let limit = SessionLimit::parse(context.attribute(SESSION_LIMIT_ATTRIBUTE))?;
        self.evaluate_limit(context.principal(), limit).await
    }

    /// Evaluate an already validated limit for `principal`.
    ///
    /// # Errors
    /// Returns `PolicyError::RegistryUnavailable` if the count cannot be read.
    #[instrument(skip(self))]
    pub async fn evaluate_limit(
        &self,
        principal: &PrincipalId,
        limit: SessionLimit,
    ) -> Result<Verdict, PolicyError> {
        let count = self.registry.count_active_sessions(principal).await?;

        debug!("Active session count: {} and session limit: {}", count, limit);

        Ok(Verdict::from_counts(count, limit))
    }

    /// Combined "is within session limit" entry point taking a small
    /// configuration map (currently only `sessionLimit`).
    ///
    /// # Errors
    /// Same as [`Self::evaluate`].
    pub async fn is_within_session_limit(
        &self,
        context: &AuthenticationContext,
        attributes: &HashMap<String, String>,
    ) -> Result<bool, PolicyError> {
        let limit = SessionLimit::parse(
            attributes
                .get(SESSION_LIMIT_ATTRIBUTE)
                .map(String::as_str),
        )?;

        Ok(self
            .evaluate_limit(context.principal(), limit)
            .await?
            .is_within_limit())
    }
}
