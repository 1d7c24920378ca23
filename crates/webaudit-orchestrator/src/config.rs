//! Orchestrator tuning

use std::time::Duration;
use webaudit_common::Config;
use webaudit_engine::ScanMode;

/// Batch and concurrency settings for one orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Engine tuning profile applied at the start of every batch
    pub mode: ScanMode,
    /// URLs accessed in parallel per sub-batch
    pub access_sub_batch_size: usize,
    /// Pause between access sub-batches
    pub access_pause: Duration,
    /// Concurrent spider/active scans within a batch
    pub max_concurrent_scans: usize,
    /// Wait before the next batch after a failed one
    pub batch_cooldown: Duration,
    /// Upper bound on waiting for the passive scan queue to drain
    pub passive_settle_max_wait: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            mode: ScanMode::Normal,
            access_sub_batch_size: 3,
            access_pause: Duration::from_millis(500),
            max_concurrent_scans: 2,
            batch_cooldown: Duration::from_secs(2),
            passive_settle_max_wait: Duration::from_secs(60),
        }
    }
}

impl OrchestratorConfig {
    pub fn with_mode(mut self, mode: ScanMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_max_concurrent_scans(mut self, n: usize) -> Self {
        self.max_concurrent_scans = n;
        self
    }
}

impl From<&Config> for OrchestratorConfig {
    fn from(config: &Config) -> Self {
        let scan = &config.scan;
        Self {
            mode: ScanMode::parse(&config.engine.mode),
            access_sub_batch_size: scan.access_sub_batch_size.max(1),
            access_pause: Duration::from_millis(scan.access_pause_ms),
            max_concurrent_scans: scan.max_concurrent_scans.max(1),
            batch_cooldown: Duration::from_millis(scan.batch_cooldown_ms),
            passive_settle_max_wait: Duration::from_secs(scan.passive_settle_max_wait_seconds),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_common_config() {
        let config = Config::builder().mode("fast").max_concurrent_scans(3).build();
        let orch = OrchestratorConfig::from(&config);
        assert_eq!(orch.mode, ScanMode::Fast);
        assert_eq!(orch.max_concurrent_scans, 3);
        assert_eq!(orch.access_sub_batch_size, 3);
        assert_eq!(orch.access_pause, Duration::from_millis(500));
    }
}
