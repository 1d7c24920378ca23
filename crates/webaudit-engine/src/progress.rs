//! Progress polling with stuck-scan detection
//!
//! Some low-intensity scan profiles plateau in reported progress while
//! still doing real work. A two-tier threshold separates scans that never
//! got going (abandon early) from scans that did meaningful work before
//! stalling (stop waiting, keep the results).

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};
use webaudit_core::{Result, ScanTermination};

/// Termination thresholds for a progress poll loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StuckScanPolicy {
    /// Unchanged polls tolerated while progress is below `significant_progress`
    pub low_threshold: u32,
    /// Unchanged polls tolerated once progress is significant
    pub high_threshold: u32,
    /// Percent at which a scan counts as having made significant progress
    pub significant_progress: u8,
    /// Hard cap on polls
    pub max_attempts: u32,
}

impl Default for StuckScanPolicy {
    fn default() -> Self {
        Self {
            low_threshold: 6,
            high_threshold: 12,
            significant_progress: 30,
            max_attempts: 36,
        }
    }
}

impl StuckScanPolicy {
    /// Policy that only stops on completion or when attempts run out
    pub fn timeout_only(max_attempts: u32) -> Self {
        Self {
            low_threshold: u32::MAX,
            high_threshold: u32::MAX,
            significant_progress: 100,
            max_attempts,
        }
    }

    /// Number of polls that fit into `budget` at `interval`, at least one
    pub fn attempts_for(budget: Duration, interval: Duration) -> u32 {
        if interval.is_zero() {
            return 1;
        }
        let attempts = budget.as_millis() / interval.as_millis().max(1);
        attempts.clamp(1, u32::MAX as u128) as u32
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

/// Mutable state threaded through a poll loop
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    policy: StuckScanPolicy,
    stuck_counter: u32,
    last_progress: Option<u8>,
    significant_progress: bool,
    polls: u32,
}

impl ProgressTracker {
    pub fn new(policy: StuckScanPolicy) -> Self {
        Self {
            policy,
            stuck_counter: 0,
            last_progress: None,
            significant_progress: false,
            polls: 0,
        }
    }

    /// Record one progress sample and decide whether polling should stop.
    pub fn observe(&mut self, progress: u8) -> Option<ScanTermination> {
        let progress = progress.min(100);
        self.polls += 1;

        if progress >= 100 {
            self.last_progress = Some(100);
            return Some(ScanTermination::Completed);
        }

        if progress >= self.policy.significant_progress {
            self.significant_progress = true;
        }

        if self.last_progress == Some(progress) {
            self.stuck_counter += 1;
        } else {
            self.stuck_counter = 0;
            self.last_progress = Some(progress);
        }

        if self.stuck_counter > self.policy.low_threshold && !self.significant_progress {
            return Some(ScanTermination::AbandonedEarly);
        }
        if self.stuck_counter > self.policy.high_threshold && self.significant_progress {
            return Some(ScanTermination::StalledAfterProgress);
        }
        if self.polls >= self.policy.max_attempts {
            return Some(ScanTermination::TimedOut);
        }
        None
    }

    /// Sample taken when the status call itself failed: counts as a poll
    /// with unchanged progress.
    pub fn observe_unavailable(&mut self) -> Option<ScanTermination> {
        let last = self.last_progress.unwrap_or(0);
        self.observe(last)
    }

    pub fn stuck_counter(&self) -> u32 {
        self.stuck_counter
    }

    pub fn has_significant_progress(&self) -> bool {
        self.significant_progress
    }

    pub fn last_progress(&self) -> u8 {
        self.last_progress.unwrap_or(0)
    }

    pub fn polls(&self) -> u32 {
        self.polls
    }
}

/// How a poll loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSummary {
    pub termination: ScanTermination,
    pub progress: u8,
    pub polls: u32,
}

/// Poll `fetch` every `interval` until the tracker decides to stop.
///
/// Never fails: status errors count as unchanged progress, so a dead
/// scan runs into the stuck or attempt limits.
pub async fn poll_progress<F, Fut>(
    label: &str,
    policy: StuckScanPolicy,
    interval: Duration,
    mut fetch: F,
) -> PollSummary
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<u8>>,
{
    let mut tracker = ProgressTracker::new(policy);

    loop {
        let decision = match fetch().await {
            Ok(progress) => {
                debug!(
                    "{} progress {}% (stuck {}, poll {})",
                    label,
                    progress,
                    tracker.stuck_counter(),
                    tracker.polls() + 1
                );
                tracker.observe(progress)
            }
            Err(e) => {
                debug!("{} status unavailable: {}", label, e);
                tracker.observe_unavailable()
            }
        };

        if let Some(termination) = decision {
            match termination {
                ScanTermination::Completed => {
                    debug!("{} completed after {} polls", label, tracker.polls())
                }
                ScanTermination::AbandonedEarly => warn!(
                    "{} stuck at {}% without significant progress; abandoning (low-confidence result)",
                    label,
                    tracker.last_progress()
                ),
                ScanTermination::StalledAfterProgress => warn!(
                    "{} stalled at {}% after significant progress; collecting results",
                    label,
                    tracker.last_progress()
                ),
                ScanTermination::TimedOut => warn!(
                    "{} timed out at {}% after {} polls; collecting partial results",
                    label,
                    tracker.last_progress(),
                    tracker.polls()
                ),
            }
            return PollSummary {
                termination,
                progress: tracker.last_progress(),
                polls: tracker.polls(),
            };
        }

        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use webaudit_core::Error;

    fn policy() -> StuckScanPolicy {
        StuckScanPolicy {
            low_threshold: 3,
            high_threshold: 6,
            significant_progress: 30,
            max_attempts: 100,
        }
    }

    fn run(tracker: &mut ProgressTracker, samples: &[u8]) -> Option<ScanTermination> {
        for &sample in samples {
            if let Some(t) = tracker.observe(sample) {
                return Some(t);
            }
        }
        None
    }

    #[test]
    fn test_increasing_to_completion() {
        let mut tracker = ProgressTracker::new(policy());
        let result = run(&mut tracker, &[0, 10, 25, 50, 75, 100]);
        assert_eq!(result, Some(ScanTermination::Completed));
        assert_eq!(tracker.polls(), 6);
    }

    #[test]
    fn test_plateau_without_significant_progress_abandons() {
        let mut tracker = ProgressTracker::new(policy());
        // 1 initial sample + 4 unchanged polls exceeds the low threshold of 3
        let result = run(&mut tracker, &[10, 10, 10, 10, 10]);
        assert_eq!(result, Some(ScanTermination::AbandonedEarly));
        assert!(!tracker.has_significant_progress());
    }

    #[test]
    fn test_plateau_at_45_uses_high_threshold() {
        let mut tracker = ProgressTracker::new(policy());
        // past the low threshold: still running
        assert_eq!(run(&mut tracker, &[20, 45, 45, 45, 45, 45]), None);
        assert!(tracker.has_significant_progress());
        assert!(tracker.stuck_counter() > policy().low_threshold);

        let result = run(&mut tracker, &[45, 45, 45]);
        assert_eq!(result, Some(ScanTermination::StalledAfterProgress));
        assert_eq!(tracker.last_progress(), 45);
    }

    #[test]
    fn test_progress_resets_stuck_counter() {
        let mut tracker = ProgressTracker::new(policy());
        assert_eq!(run(&mut tracker, &[5, 5, 5, 6, 6, 6, 7]), None);
        assert_eq!(tracker.stuck_counter(), 0);
    }

    #[test]
    fn test_attempts_exhausted() {
        let mut tracker = ProgressTracker::new(policy().with_max_attempts(4));
        let result = run(&mut tracker, &[1, 2, 3, 4, 5]);
        assert_eq!(result, Some(ScanTermination::TimedOut));
        assert_eq!(tracker.polls(), 4);
    }

    #[test]
    fn test_timeout_only_policy_ignores_plateaus() {
        let mut tracker = ProgressTracker::new(StuckScanPolicy::timeout_only(50));
        let samples = vec![10u8; 40];
        assert_eq!(run(&mut tracker, &samples), None);
    }

    #[test]
    fn test_attempts_for_budget() {
        let attempts =
            StuckScanPolicy::attempts_for(Duration::from_secs(180), Duration::from_secs(5));
        assert_eq!(attempts, 36);
        assert_eq!(StuckScanPolicy::attempts_for(Duration::from_secs(1), Duration::ZERO), 1);
        assert_eq!(
            StuckScanPolicy::attempts_for(Duration::from_millis(10), Duration::from_secs(5)),
            1
        );
    }

    #[tokio::test]
    async fn test_poll_loop_plateau_returns_result() {
        let mut samples: VecDeque<u8> = vec![10, 30, 45].into_iter().collect();
        samples.extend(std::iter::repeat(45).take(20));

        let summary = poll_progress("ascan 1", policy(), Duration::from_millis(1), || {
            let next = samples.pop_front().unwrap_or(45);
            async move { Ok(next) }
        })
        .await;

        assert_eq!(summary.termination, ScanTermination::StalledAfterProgress);
        assert_eq!(summary.progress, 45);
    }

    #[tokio::test]
    async fn test_poll_loop_completes() {
        let mut samples: VecDeque<u8> = (0..=10).map(|i| i * 10).collect();

        let summary = poll_progress("ascan 2", policy(), Duration::from_millis(1), || {
            let next = samples.pop_front().unwrap_or(100);
            async move { Ok(next) }
        })
        .await;

        assert_eq!(summary.termination, ScanTermination::Completed);
        assert_eq!(summary.progress, 100);
        assert_eq!(summary.polls, 11);
    }

    #[tokio::test]
    async fn test_poll_loop_survives_status_errors() {
        let summary = poll_progress("ascan 3", policy(), Duration::from_millis(1), || async {
            Err(Error::Transport("connection reset".into()))
        })
        .await;

        assert_eq!(summary.termination, ScanTermination::AbandonedEarly);
        assert_eq!(summary.progress, 0);
    }
}
