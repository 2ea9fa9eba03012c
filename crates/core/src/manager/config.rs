use std::time::Duration;

use zrata_domain::ManagerSettings;

/// Runtime options for [`CacheManager`](super::CacheManager)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Upper bound on waiting for another caller's computation
    pub wait_timeout: Option<Duration>,
}

impl ManagerConfig {
    #[must_use]
    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = Some(timeout);
        self
    }
}

impl From<&ManagerSettings> for ManagerConfig {
    fn from(settings: &ManagerSettings) -> Self {
        Self { wait_timeout: settings.wait_timeout() }
    }
}
