//! Service configuration.

use std::time::Duration;

use nebula_history_store::{Page, SqliteConfig};

/// Configuration for the [`History`](crate::History) service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryConfig {
    /// Upper bound on any single storage call. Reads are cut off at this
    /// bound; appends carry it into the store (see [`HistoryConfig::sqlite`]).
    pub store_timeout: Duration,
    /// Page size used when a request names none.
    pub default_page_size: u32,
    /// Requested page sizes above this are clamped.
    pub max_page_size: u32,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_secs(5),
            default_page_size: 50,
            max_page_size: 1000,
        }
    }
}

impl HistoryConfig {
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn with_page_sizes(mut self, default: u32, max: u32) -> Self {
        self.default_page_size = default;
        self.max_page_size = max;
        self
    }

    /// SQLite settings whose append deadline is `store_timeout`.
    pub fn sqlite(&self) -> SqliteConfig {
        SqliteConfig::default().with_busy_timeout(self.store_timeout)
    }

    /// Resolve a requested window into a page the store will accept.
    pub fn page(&self, offset: u64, size: Option<u32>) -> Page {
        let limit = size
            .unwrap_or(self.default_page_size)
            .min(self.max_page_size);
        Page::new(offset, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HistoryConfig::default();
        assert_eq!(config.store_timeout, Duration::from_secs(5));
        assert_eq!(config.page(0, None), Page::new(0, 50));
    }

    #[test]
    fn test_store_timeout_bounds_sqlite_appends() {
        let config = HistoryConfig::default().with_store_timeout(Duration::from_millis(250));
        assert_eq!(config.sqlite().busy_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_oversized_page_is_clamped() {
        let config = HistoryConfig::default().with_page_sizes(10, 100);
        assert_eq!(config.page(20, Some(5_000)), Page::new(20, 100));
        assert_eq!(config.page(20, Some(7)), Page::new(20, 7));
    }
}
