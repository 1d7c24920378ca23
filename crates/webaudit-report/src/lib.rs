//! WebAudit Result Processor
//!
//! Turns raw per-URL engine outcomes into an [`AuditReport`]:
//! - Lift findings into scored [`Issue`]s (effort, impact)
//! - Deduplicate across batches by `id ?? title`
//! - Partition issues by website origin
//! - Compute the overall score, grade and top vulnerabilities
//! - Derive prioritized recommendations

pub mod aggregate;
pub mod effort;
pub mod grouping;
pub mod merge;
pub mod recommendations;
pub mod summary;
pub mod types;

pub use aggregate::IssueAggregator;
pub use effort::resolve_effort;
pub use grouping::group_by_website;
pub use merge::merge_reports;
pub use recommendations::recommend;
pub use summary::{grade_for, security_score, summarize};
pub use types::{
    AuditReport, EffortDistribution, Grade, Issue, Priority, Recommendation, RiskDistribution,
    RunMetadata, SiteSummary, Summary, TopVulnerability, WebsiteReport,
};

use webaudit_core::UrlOutcome;

/// Build a report from collected URL outcomes.
///
/// `target` is the overall scan target, used for issues that carry no
/// concrete affected URL.
pub fn build_report(
    outcomes: &[UrlOutcome],
    target: Option<&str>,
    metadata: RunMetadata,
) -> AuditReport {
    let mut aggregator = IssueAggregator::new();
    aggregator.ingest_outcomes(outcomes);
    AuditReport::from_issues(aggregator.into_issues(), target, metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use webaudit_core::{Confidence, FindingInstance, RawFinding, Risk, UrlOutcome, UrlState};

    fn outcome(url: &str, findings: Vec<RawFinding>) -> UrlOutcome {
        let mut outcome = UrlOutcome::failed(url, UrlState::Collected, "");
        outcome.success = true;
        outcome.error = None;
        outcome.findings = findings;
        outcome
    }

    fn sql_injection() -> RawFinding {
        RawFinding::builder("SQL Injection")
            .id("40018")
            .risk(Risk::High)
            .confidence(Confidence::High)
            .instance(FindingInstance::new("https://a.example/x").with_parameter("id"))
            .instance(FindingInstance::new("https://a.example/y").with_parameter("id"))
            .build()
    }

    #[test]
    fn test_single_high_finding_end_to_end() {
        let outcomes = vec![outcome("https://a.example/", vec![sql_injection()])];
        let report = build_report(&outcomes, Some("https://a.example/"), RunMetadata::new("normal"));

        assert_eq!(report.issues.len(), 1);
        let issue = &report.issues[0];
        assert_eq!(issue.occurrences, 2);
        assert_eq!(issue.impact_score, 9);
        assert_eq!(issue.effort, webaudit_core::Effort::High);
        assert_eq!(issue.affected_urls.len(), 2);

        assert_eq!(report.websites.len(), 1);
        let site = &report.websites[0];
        assert_eq!(site.origin, "https://a.example");
        assert_eq!(site.summary.risk_distribution.high, 1);

        assert_eq!(report.summary.overall_security_score, 80);
        assert_eq!(report.summary.grade, Grade::B);
        assert_eq!(report.summary.critical_findings.len(), 1);
        assert_eq!(report.recommendations[0].priority, Priority::Critical);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["issues"][0]["effort"], "High");
        assert_eq!(json["issues"][0]["impactScore"], 9);
        assert_eq!(json["websites"][0]["summary"]["riskDistribution"]["high"], 1);
    }

    #[test]
    fn test_aggregating_same_outcomes_twice_is_idempotent() {
        let outcomes = vec![outcome("https://a.example/", vec![sql_injection()])];
        let once = build_report(&outcomes, None, RunMetadata::new("normal"));

        let doubled: Vec<UrlOutcome> = outcomes.iter().chain(outcomes.iter()).cloned().collect();
        let twice = build_report(&doubled, None, RunMetadata::new("normal"));

        assert_eq!(once.issues[0].affected_urls, twice.issues[0].affected_urls);
        assert_eq!(once.issues[0].occurrences, twice.issues[0].occurrences);
        assert_eq!(once.summary.overall_security_score, twice.summary.overall_security_score);
    }

    #[test]
    fn test_empty_outcomes_give_perfect_score() {
        let report = build_report(&[], None, RunMetadata::new("fast"));
        assert!(report.issues.is_empty());
        assert!(report.websites.is_empty());
        assert_eq!(report.summary.overall_security_score, 100);
        assert_eq!(report.summary.grade, Grade::A);
        assert!(report.recommendations.is_empty());
    }
}
