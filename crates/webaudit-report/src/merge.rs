//! Merging partial reports

use crate::aggregate::IssueAggregator;
use crate::types::{AuditReport, RunMetadata};

/// Fold partial reports (e.g. one per batch) into a single report.
///
/// Issues merge by key as in [`IssueAggregator`]; websites, summary and
/// recommendations are recomputed and metadata counters summed. Returns
/// `None` when there is nothing to merge.
pub fn merge_reports(partials: &[AuditReport]) -> Option<AuditReport> {
    let (first, rest) = partials.split_first()?;

    let mut aggregator = IssueAggregator::new();
    let mut metadata: RunMetadata = first.metadata.clone();
    let target = partials.iter().find_map(|p| p.target.clone());

    for issue in &first.issues {
        aggregator.ingest_issue(issue);
    }
    for partial in rest {
        for issue in &partial.issues {
            aggregator.ingest_issue(issue);
        }
        metadata.absorb(&partial.metadata);
    }

    Some(AuditReport::from_issues(
        aggregator.into_issues(),
        target.as_deref(),
        metadata,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_report;
    use webaudit_core::{Confidence, FindingInstance, RawFinding, Risk, UrlOutcome, UrlState};

    fn partial(urls: &[&str], successful: usize) -> AuditReport {
        let mut builder = RawFinding::builder("X-Frame-Options Header Not Set")
            .id("10020")
            .risk(Risk::Medium)
            .confidence(Confidence::Medium);
        for url in urls {
            builder = builder.instance(FindingInstance::new(*url));
        }
        let mut outcome = UrlOutcome::failed(urls[0], UrlState::Collected, "");
        outcome.success = true;
        outcome.findings = vec![builder.build()];

        let mut metadata = RunMetadata::new("normal");
        metadata.total_batches = 1;
        metadata.successful_batches = 1;
        metadata.total_scans = successful;
        metadata.successful_scans = successful;
        build_report(&[outcome], None, metadata)
    }

    #[test]
    fn test_merge_partials() {
        let a = partial(&["https://a.example/", "https://a.example/login"], 2);
        let b = partial(&["https://a.example/login", "https://b.example/"], 1);

        let merged = merge_reports(&[a, b]).unwrap();
        assert_eq!(merged.issues.len(), 1);
        assert_eq!(merged.issues[0].affected_urls.len(), 3);
        assert_eq!(merged.issues[0].occurrences, 3);
        assert_eq!(merged.websites.len(), 2);
        assert_eq!(merged.metadata.total_batches, 2);
        assert_eq!(merged.metadata.successful_scans, 3);
        assert_eq!(merged.summary.overall_security_score, 90);
    }

    #[test]
    fn test_merge_is_idempotent_for_same_partial() {
        let a = partial(&["https://a.example/"], 1);
        let merged = merge_reports(&[a.clone(), a.clone()]).unwrap();
        assert_eq!(merged.issues, a.issues);
    }

    #[test]
    fn test_merge_nothing() {
        assert!(merge_reports(&[]).is_none());
    }
}
