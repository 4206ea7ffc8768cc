//! Registry doubles shared by unit tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{ActiveSession, RegistryError, SessionRegistry};
use crate::context::PrincipalId;

/// Registry reporting a fixed count and recording how often it was asked.
#[derive(Debug, Default)]
pub(crate) struct FixedCountRegistry {
    count: u64,
    unavailable: bool,
    calls: AtomicUsize,
}

impl FixedCountRegistry {
    pub(crate) fn with_count(count: u64) -> Self {
        Self {
            count,
            ..Self::default()
        }
    }

    pub(crate) fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionRegistry for FixedCountRegistry {
    async fn count_active_sessions(&self, _principal: &PrincipalId) -> Result<u64, RegistryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(RegistryError::Unavailable("connection refused".to_string()));
        }
        Ok(self.count)
    }

    async fn active_sessions(
        &self,
        _principal: &PrincipalId,
    ) -> Result<Vec<ActiveSession>, RegistryError> {
        if self.unavailable {
            return Err(RegistryError::Unavailable("connection refused".to_string()));
        }
        Ok(Vec::new())
    }

    async fn ping(&self) -> Result<(), RegistryError> {
        if self.unavailable {
            return Err(RegistryError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }
}
