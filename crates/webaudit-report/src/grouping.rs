//! Website grouping
//!
//! Membership is decided by exact equality of the normalized origin
//! (`scheme://host[:port]`). An issue seen on several origins is attached
//! to each, keeping only that origin's URLs and instances.

use std::collections::BTreeMap;

use tracing::debug;
use webaudit_core::origin_of;

use crate::types::{Issue, SiteSummary, WebsiteReport};

/// Partition issues into one report per origin, sorted by origin.
///
/// Issues without any resolvable URL go to `fallback_target`'s origin when
/// given; otherwise they only appear in the global issue list.
pub fn group_by_website(issues: &[Issue], fallback_target: Option<&str>) -> Vec<WebsiteReport> {
    let fallback_origin = fallback_target.and_then(origin_of);
    let mut sites: BTreeMap<String, Vec<Issue>> = BTreeMap::new();

    for issue in issues {
        let mut per_origin: BTreeMap<String, Issue> = BTreeMap::new();

        for url in &issue.affected_urls {
            let Some(origin) = origin_of(url) else {
                continue;
            };
            let copy = per_origin
                .entry(origin)
                .or_insert_with(|| issue.without_instances());
            if !copy.affected_urls.contains(url) {
                copy.affected_urls.push(url.clone());
            }
        }

        if per_origin.is_empty() {
            match &fallback_origin {
                Some(origin) => {
                    per_origin.insert(origin.clone(), issue.clone());
                }
                None => {
                    debug!(
                        "Issue '{}' has no resolvable URL and no fallback target; kept out of site grouping",
                        issue.title
                    );
                    continue;
                }
            }
        } else {
            for (origin, copy) in per_origin.iter_mut() {
                copy.instances = issue
                    .instances
                    .iter()
                    .filter(|i| origin_of(&i.url).as_deref() == Some(origin.as_str()))
                    .cloned()
                    .collect();
                copy.occurrences = (copy.instances.len() as u32).max(1);
            }
        }

        for (origin, copy) in per_origin {
            sites.entry(origin).or_default().push(copy);
        }
    }

    sites
        .into_iter()
        .map(|(origin, issues)| WebsiteReport {
            summary: SiteSummary::from_issues(&issues),
            origin,
            issues,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use webaudit_core::{Confidence, FindingInstance, RawFinding, Risk, UrlOutcome, UrlState};

    use crate::aggregate::IssueAggregator;
    use crate::{build_report, RunMetadata};

    fn issues(findings: &[RawFinding]) -> Vec<Issue> {
        let mut agg = IssueAggregator::new();
        for f in findings {
            agg.ingest_finding(f);
        }
        agg.into_issues()
    }

    #[test]
    fn test_issue_split_across_origins() {
        let finding = RawFinding::builder("CSP Header Not Set")
            .id("10038")
            .risk(Risk::Medium)
            .confidence(Confidence::High)
            .instance(FindingInstance::new("https://a.example/"))
            .instance(FindingInstance::new("https://a.example/about"))
            .instance(FindingInstance::new("https://b.example/"))
            .build();
        let sites = group_by_website(&issues(&[finding]), None);

        assert_eq!(sites.len(), 2);
        assert_eq!(sites[0].origin, "https://a.example");
        assert_eq!(sites[0].issues[0].affected_urls.len(), 2);
        assert_eq!(sites[0].issues[0].occurrences, 2);
        assert_eq!(sites[1].origin, "https://b.example");
        assert_eq!(sites[1].issues[0].affected_urls, vec!["https://b.example/"]);
        assert_eq!(sites[1].summary.risk_distribution.medium, 1);
    }

    #[test]
    fn test_every_issue_belongs_to_its_site() {
        let findings = vec![
            RawFinding::builder("A")
                .instance(FindingInstance::new("http://a.example:8080/x"))
                .build(),
            RawFinding::builder("B")
                .instance(FindingInstance::new("http://a.example/x"))
                .instance(FindingInstance::new("https://c.example/y"))
                .build(),
        ];
        let sites = group_by_website(&issues(&findings), None);

        assert_eq!(sites.len(), 3);
        for site in &sites {
            for issue in &site.issues {
                assert!(issue
                    .affected_urls
                    .iter()
                    .any(|u| origin_of(u).as_deref() == Some(site.origin.as_str())));
            }
        }
    }

    #[test]
    fn test_fallback_target_for_urlless_issue() {
        let finding = RawFinding::builder("Unclassified High risk alerts").risk(Risk::High).build();
        let all = issues(&[finding]);

        let sites = group_by_website(&all, Some("https://t.example/start"));
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].origin, "https://t.example");

        assert!(group_by_website(&all, None).is_empty());

        let mut outcome = UrlOutcome::failed("https://t.example/start", UrlState::Collected, "");
        outcome.success = true;
        outcome.error = None;
        outcome.findings = vec![RawFinding::builder("Unclassified High risk alerts").risk(Risk::High).build()];
        let report = build_report(&[outcome], None, RunMetadata::new("normal"));
        assert_eq!(report.summary.total_issues, 1);
        assert_eq!(report.summary.risk_distribution.high, 1);
        assert_eq!(report.issues.len(), 1);
        assert!(report.websites.is_empty());
    }

    #[test]
    fn test_site_risk_score_is_mean_impact() {
        let findings = vec![
            RawFinding::builder("High one")
                .risk(Risk::High)
                .confidence(Confidence::High)
                .instance(FindingInstance::new("https://a.example/"))
                .build(),
            RawFinding::builder("Low one")
                .risk(Risk::Low)
                .confidence(Confidence::High)
                .instance(FindingInstance::new("https://a.example/"))
                .build(),
        ];
        let sites = group_by_website(&issues(&findings), None);
        assert_eq!(sites[0].summary.total_issues, 2);
        assert!((sites[0].summary.risk_score - 6.0).abs() < f64::EPSILON);
    }
}
