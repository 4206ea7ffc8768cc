//! Attempt-scoped authentication state.
//!
//! An [`AuthenticationContext`] is created when an authentication attempt
//! starts and dropped when it concludes. It is owned by the flow controller for
//! that attempt only; nothing in it is shared with concurrent attempts.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt};
use ulid::Ulid;
use utoipa::ToSchema;

use crate::flow::{Execution, FlowState, StepId};

/// User store assumed when the principal does not name one.
pub const DEFAULT_USER_STORE_DOMAIN: &str = "PRIMARY";
/// Tenant assumed when the principal does not name one.
pub const DEFAULT_TENANT_DOMAIN: &str = "carbon.super";

// USERSTORE/username@tenant, both qualifiers optional. The tenant is the last
// `@` segment so e-mail style usernames keep their own `@`.
const QUALIFIED_USER_PATTERN: &str =
    r"^(?:(?P<store>[^/]+)/)?(?P<user>.+?)(?:@(?P<tenant>[^@/]+))?$";

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    #[error("Principal identifier must not be empty")]
    EmptyPrincipal,
}

/// Opaque identifier of the authenticating subject.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "String", into = "String")]
pub struct PrincipalId(String);

impl PrincipalId {
    /// Build a principal identifier.
    ///
    /// # Errors
    /// Returns `ContextError::EmptyPrincipal` if the identifier is empty or blank.
    pub fn new(id: impl Into<String>) -> Result<Self, ContextError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ContextError::EmptyPrincipal);
        }
        Ok(Self(id))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split the identifier into user store, username and tenant.
    #[must_use]
    pub fn qualified(&self) -> QualifiedUser {
        let captures = Regex::new(QUALIFIED_USER_PATTERN)
            .ok()
            .and_then(|re| re.captures(&self.0));

        let Some(captures) = captures else {
            return QualifiedUser {
                user_store_domain: DEFAULT_USER_STORE_DOMAIN.to_string(),
                username: self.0.clone(),
                tenant_domain: DEFAULT_TENANT_DOMAIN.to_string(),
            };
        };

        QualifiedUser {
            user_store_domain: captures
                .name("store")
                .map_or(DEFAULT_USER_STORE_DOMAIN, |m| m.as_str())
                .to_string(),
            username: captures
                .name("user")
                .map_or(self.0.as_str(), |m| m.as_str())
                .to_string(),
            tenant_domain: captures
                .name("tenant")
                .map_or(DEFAULT_TENANT_DOMAIN, |m| m.as_str())
                .to_string(),
        }
    }
}

impl TryFrom<String> for PrincipalId {
    type Error = ContextError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PrincipalId> for String {
    fn from(value: PrincipalId) -> Self {
        value.0
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Principal identity split into the parts session stores index on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QualifiedUser {
    pub user_store_domain: String,
    pub username: String,
    pub tenant_domain: String,
}

/// Mutable record carried through one authentication attempt.
#[derive(Debug)]
pub struct AuthenticationContext {
    attempt_id: Ulid,
    principal: PrincipalId,
    attributes: HashMap<String, String>,
    pub(crate) execution: Execution,
}

impl AuthenticationContext {
    #[must_use]
    pub fn new(principal: PrincipalId) -> Self {
        Self {
            attempt_id: Ulid::new(),
            principal,
            attributes: HashMap::new(),
            execution: Execution::default(),
        }
    }

    /// Id used to correlate log lines of one attempt.
    #[must_use]
    pub fn attempt_id(&self) -> Ulid {
        self.attempt_id
    }

    #[must_use]
    pub fn principal(&self) -> &PrincipalId {
        &self.principal
    }

    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn attributes(&self) -> &HashMap<String, String> {
        &self.attributes
    }

    /// Steps executed so far in this attempt, in execution order.
    #[must_use]
    pub fn executed_steps(&self) -> &[StepId] {
        &self.execution.executed
    }

    #[must_use]
    pub fn flow_state(&self) -> &FlowState {
        &self.execution.state
    }
}
