//! Session registry clients.
//!
//! The registry is an external store of active sessions. The gate only reads
//! from it: [`SessionRegistry`] answers how many sessions a principal holds
//! right now and lists them. Removing a session is a separate capability,
//! [`SessionTerminator`], so read-only backends cannot be asked to write.
//!
//! Same-principal consistency (counts linearizable with session creation and
//! termination) is owned by the backing store, not by these clients.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::context::PrincipalId;

pub mod analytics;
pub mod memory;
pub mod postgres;
#[cfg(test)]
pub(crate) mod test_support;

pub use analytics::{AnalyticsConfig, AnalyticsRegistry};
pub use memory::MemorySessionRegistry;
pub use postgres::PgSessionRegistry;

/// Maximum number of session records returned by a listing.
pub const SESSION_LIST_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Session registry unavailable: {0}")]
    Unavailable(String),
}

/// One active session as reported by the registry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ActiveSession {
    #[serde(rename = "sessionID")]
    pub session_id: String,
    pub timestamp: String,
    #[serde(rename = "userAgent")]
    pub user_agent: String,
    #[serde(rename = "ipAddress")]
    pub ip_address: String,
    #[serde(rename = "serviceProvider")]
    pub service_provider: String,
}

/// Read-only view of the active session store.
#[async_trait]
pub trait SessionRegistry: Send + Sync {
    /// Number of active sessions held by `principal` at call time.
    ///
    /// An unknown principal has zero sessions.
    async fn count_active_sessions(&self, principal: &PrincipalId) -> Result<u64, RegistryError>;

    /// Active sessions held by `principal`, at most [`SESSION_LIST_LIMIT`].
    async fn active_sessions(
        &self,
        principal: &PrincipalId,
    ) -> Result<Vec<ActiveSession>, RegistryError>;

    /// Cheap reachability probe used by health checks.
    async fn ping(&self) -> Result<(), RegistryError>;
}

/// Removes sessions from the store.
#[async_trait]
pub trait SessionTerminator: Send + Sync {
    /// Terminate one session. Returns `false` when the id is empty or unknown.
    async fn terminate_session(&self, session_id: &str) -> Result<bool, RegistryError>;
}
