use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a store and the tables it opens
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Root directory of the store (default: ./segdb)
    pub dir: PathBuf,

    /// Number of memtable rows that triggers a flush to a new segment (default: 100)
    pub memtable_limit: usize,

    /// Sleep between two commit validation attempts (default: 1ms)
    pub commit_retry_interval: Duration,

    /// Validation attempts before a commit gives up with a conflict (default: 10_000)
    pub max_commit_attempts: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./segdb"),
            memtable_limit: 100,
            commit_retry_interval: Duration::from_millis(1),
            max_commit_attempts: 10_000,
        }
    }
}

impl StoreConfig {
    /// Create a new config with the given directory
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Default::default()
        }
    }

    /// Set the memtable flush threshold, in rows
    pub fn memtable_limit(mut self, rows: usize) -> Self {
        self.memtable_limit = rows.max(1);
        self
    }

    /// Set the sleep between commit validation attempts
    pub fn commit_retry_interval(mut self, interval: Duration) -> Self {
        self.commit_retry_interval = interval;
        self
    }

    /// Set the maximum number of commit validation attempts
    pub fn max_commit_attempts(mut self, attempts: u32) -> Self {
        self.max_commit_attempts = attempts.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.dir, PathBuf::from("./segdb"));
        assert_eq!(config.memtable_limit, 100);
        assert_eq!(config.commit_retry_interval, Duration::from_millis(1));
        assert_eq!(config.max_commit_attempts, 10_000);
    }

    #[test]
    fn test_config_builder() {
        let config = StoreConfig::new("/tmp/test")
            .memtable_limit(8)
            .commit_retry_interval(Duration::from_micros(250))
            .max_commit_attempts(3);

        assert_eq!(config.dir, PathBuf::from("/tmp/test"));
        assert_eq!(config.memtable_limit, 8);
        assert_eq!(config.commit_retry_interval, Duration::from_micros(250));
        assert_eq!(config.max_commit_attempts, 3);
    }

    #[test]
    fn test_zero_limits_are_clamped() {
        let config = StoreConfig::default()
            .memtable_limit(0)
            .max_commit_attempts(0);
        assert_eq!(config.memtable_limit, 1);
        assert_eq!(config.max_commit_attempts, 1);
    }
}
