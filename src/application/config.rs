use std::time::Duration;

/// Largest page a history query may request.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Tunables for [`LedgerService`](super::LedgerService).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on waiting for account locks. `None` waits indefinitely.
    pub lock_timeout: Option<Duration>,
    /// Page size used when a history query does not specify one.
    pub default_page_size: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_timeout: None,
            default_page_size: 10,
        }
    }
}

impl EngineConfig {
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }

    /// Clamped into `1..=MAX_PAGE_SIZE`.
    pub fn with_default_page_size(mut self, page_size: u32) -> Self {
        self.default_page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }
}
