//! In-process session registry.
//!
//! Session creation and termination take the write lock, so reads observe them
//! in a single total order per registry.

use async_trait::async_trait;
use std::{
    collections::HashMap,
    time::{SystemTime, UNIX_EPOCH},
};
use tokio::sync::RwLock;
use ulid::Ulid;

use super::{ActiveSession, RegistryError, SessionRegistry, SessionTerminator, SESSION_LIST_LIMIT};
use crate::context::PrincipalId;

#[derive(Debug, Default)]
pub struct MemorySessionRegistry {
    sessions: RwLock<HashMap<PrincipalId, Vec<ActiveSession>>>,
}

impl MemorySessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new active session and return its id.
    pub async fn open_session(
        &self,
        principal: &PrincipalId,
        user_agent: &str,
        ip_address: &str,
        service_provider: &str,
    ) -> String {
        let session_id = Ulid::new().to_string();
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();

        let session = ActiveSession {
            session_id: session_id.clone(),
            timestamp: timestamp.to_string(),
            user_agent: user_agent.to_string(),
            ip_address: ip_address.to_string(),
            service_provider: service_provider.to_string(),
        };

        self.sessions
            .write()
            .await
            .entry(principal.clone())
            .or_default()
            .push(session);

        session_id
    }
}

#[async_trait]
impl SessionRegistry for MemorySessionRegistry {
    async fn count_active_sessions(&self, principal: &PrincipalId) -> Result<u64, RegistryError> {
        let sessions = self.sessions.read().await;
        let count = sessions.get(principal).map_or(0, Vec::len);
        Ok(u64::try_from(count).unwrap_or(u64::MAX))
    }

    async fn active_sessions(
        &self,
        principal: &PrincipalId,
    ) -> Result<Vec<ActiveSession>, RegistryError> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(principal)
            .map(|list| list.iter().rev().take(SESSION_LIST_LIMIT).cloned().collect())
            .unwrap_or_default())
    }

    async fn ping(&self) -> Result<(), RegistryError> {
        Ok(())
    }
}

#[async_trait]
impl SessionTerminator for MemorySessionRegistry {
    async fn terminate_session(&self, session_id: &str) -> Result<bool, RegistryError> {
        if session_id.trim().is_empty() {
            return Ok(false);
        }

        let mut sessions = self.sessions.write().await;
        for list in sessions.values_mut() {
            if let Some(index) = list.iter().position(|s| s.session_id == session_id) {
                list.remove(index);
                return Ok(true);
            }
        }

        Ok(false)
    }
}
