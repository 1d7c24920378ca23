//! Prioritized recommendations derived from a run summary

use crate::types::{Priority, Recommendation, Summary};

const MAX_RECOMMENDATIONS: usize = 10;
const SPECIFIC_RECOMMENDATIONS: usize = 3;
const LOW_ISSUE_THRESHOLD: usize = 10;
const REVIEW_SCORE_THRESHOLD: u8 = 60;

/// Derive recommendations, most urgent first
pub fn recommend(summary: &Summary) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();
    let dist = &summary.risk_distribution;

    if dist.high > 0 {
        recommendations.push(Recommendation {
            priority: Priority::Critical,
            title: String::from("Fix high-risk vulnerabilities immediately"),
            description: format!(
                "{} high-risk issue(s) were found. These can lead to data breaches or full \
                 compromise and should be remediated before any other work.",
                dist.high
            ),
            vulnerability: None,
        });
    }

    if summary.overall_security_score < REVIEW_SCORE_THRESHOLD {
        recommendations.push(Recommendation {
            priority: Priority::High,
            title: String::from("Conduct a comprehensive security review"),
            description: format!(
                "The overall security score is {} (grade {}). Review authentication, input \
                 handling and server configuration across all audited sites.",
                summary.overall_security_score, summary.grade
            ),
            vulnerability: None,
        });
    }

    for vuln in summary.top_vulnerabilities.iter().take(SPECIFIC_RECOMMENDATIONS) {
        let description = if vuln.solution.is_empty() {
            format!(
                "Found {} time(s) across {} URL(s). Estimated remediation effort: {}.",
                vuln.occurrences, vuln.affected_url_count, vuln.effort
            )
        } else {
            format!(
                "{} (found {} time(s); estimated effort: {})",
                vuln.solution, vuln.occurrences, vuln.effort
            )
        };
        recommendations.push(Recommendation {
            priority: Priority::from(vuln.risk),
            title: format!("Address {}", vuln.title),
            description,
            vulnerability: Some(vuln.title.clone()),
        });
    }

    let minor = dist.low + dist.informational;
    if minor > LOW_ISSUE_THRESHOLD {
        recommendations.push(Recommendation {
            priority: Priority::Medium,
            title: String::from("Implement security headers"),
            description: format!(
                "{} low or informational issues were found. Most are resolved by a consistent \
                 set of security headers (CSP, HSTS, X-Frame-Options, X-Content-Type-Options) \
                 and secure cookie attributes.",
                minor
            ),
            vulnerability: None,
        });
    }

    recommendations.truncate(MAX_RECOMMENDATIONS);
    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::summarize;
    use crate::types::Issue;
    use webaudit_core::{Confidence, RawFinding, Risk};

    fn issues(specs: &[(&str, Risk)]) -> Vec<Issue> {
        specs
            .iter()
            .map(|(title, risk)| {
                Issue::from_finding(
                    &RawFinding::builder(*title)
                        .risk(*risk)
                        .confidence(Confidence::High)
                        .solution("Apply the fix.")
                        .build(),
                )
            })
            .collect()
    }

    #[test]
    fn test_clean_run_has_no_recommendations() {
        assert!(recommend(&summarize(&[])).is_empty());
    }

    #[test]
    fn test_high_risk_and_low_score() {
        let summary = summarize(&issues(&[
            ("SQL Injection", Risk::High),
            ("Path Traversal", Risk::High),
            ("CSP Header Not Set", Risk::Medium),
        ]));
        let recs = recommend(&summary);

        assert_eq!(recs[0].priority, Priority::Critical);
        assert_eq!(recs[1].priority, Priority::High);
        assert_eq!(recs[1].title, "Conduct a comprehensive security review");
        assert_eq!(recs.len(), 5);
        assert_eq!(recs[2].vulnerability.as_deref(), Some("SQL Injection"));
        assert_eq!(recs[4].priority, Priority::Medium);
    }

    #[test]
    fn test_many_low_issues_trigger_headers() {
        let specs: Vec<(String, Risk)> = (0..11).map(|n| (format!("Info {}", n), Risk::Informational)).collect();
        let refs: Vec<(&str, Risk)> = specs.iter().map(|(t, r)| (t.as_str(), *r)).collect();
        let recs = recommend(&summarize(&issues(&refs)));

        assert!(recs.iter().any(|r| r.title == "Implement security headers"));
        assert_eq!(recs.len(), 4);
        assert!(recs.len() <= MAX_RECOMMENDATIONS);
    }
}
