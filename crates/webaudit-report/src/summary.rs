//! Global summary: score, grade and top vulnerabilities

use std::collections::HashMap;

use webaudit_core::Risk;

use crate::types::{EffortDistribution, Grade, Issue, RiskDistribution, Summary, TopVulnerability};

const TOP_VULNERABILITIES: usize = 10;

/// `max(0, 100 - 20*high - 10*medium - 5*low)`
pub fn security_score(dist: &RiskDistribution) -> u8 {
    let penalty = 20 * dist.high as i64 + 10 * dist.medium as i64 + 5 * dist.low as i64;
    (100 - penalty).clamp(0, 100) as u8
}

pub fn grade_for(score: u8) -> Grade {
    match score {
        90..=u8::MAX => Grade::A,
        80..=89 => Grade::B,
        70..=79 => Grade::C,
        60..=69 => Grade::D,
        _ => Grade::F,
    }
}

/// Group issues by title; the highest-impact variant supplies risk,
/// effort and solution.
pub fn group_by_title(issues: &[Issue]) -> Vec<TopVulnerability> {
    let mut order: Vec<&str> = Vec::new();
    let mut grouped: HashMap<&str, TopVulnerability> = HashMap::new();

    for issue in issues {
        match grouped.get_mut(issue.title.as_str()) {
            Some(top) => {
                top.occurrences += issue.occurrences;
                top.affected_url_count += issue.affected_urls.len();
                if issue.impact_score > top.impact_score {
                    top.impact_score = issue.impact_score;
                    top.risk = issue.risk;
                    top.effort = issue.effort;
                    top.solution = issue.solution.clone();
                }
            }
            None => {
                order.push(&issue.title);
                grouped.insert(
                    &issue.title,
                    TopVulnerability {
                        title: issue.title.clone(),
                        risk: issue.risk,
                        effort: issue.effort,
                        impact_score: issue.impact_score,
                        occurrences: issue.occurrences,
                        affected_url_count: issue.affected_urls.len(),
                        solution: issue.solution.clone(),
                    },
                );
            }
        }
    }

    let mut vulnerabilities: Vec<TopVulnerability> = order
        .into_iter()
        .filter_map(|title| grouped.remove(title))
        .collect();
    // Stable sort: ties keep first-seen order
    vulnerabilities.sort_by(|a, b| {
        b.impact_score
            .cmp(&a.impact_score)
            .then(b.risk.cmp(&a.risk))
    });
    vulnerabilities
}

/// Summarize deduplicated issues
pub fn summarize(issues: &[Issue]) -> Summary {
    let risk_distribution = RiskDistribution::from_issues(issues);
    let overall_security_score = security_score(&risk_distribution);
    let grouped = group_by_title(issues);

    let critical_findings = grouped
        .iter()
        .filter(|v| v.risk == Risk::High)
        .cloned()
        .collect();
    let top_vulnerabilities = grouped.into_iter().take(TOP_VULNERABILITIES).collect();

    Summary {
        total_issues: issues.len(),
        risk_distribution,
        effort_distribution: EffortDistribution::from_issues(issues),
        overall_security_score,
        grade: grade_for(overall_security_score),
        top_vulnerabilities,
        critical_findings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webaudit_core::{Confidence, RawFinding};

    fn issue(title: &str, risk: Risk, confidence: Confidence) -> Issue {
        Issue::from_finding(&RawFinding::builder(title).risk(risk).confidence(confidence).build())
    }

    #[test]
    fn test_score_formula() {
        let dist = RiskDistribution { high: 1, medium: 1, low: 2, informational: 7 };
        assert_eq!(security_score(&dist), 60);
        assert_eq!(security_score(&RiskDistribution::default()), 100);
    }

    #[test]
    fn test_score_never_negative() {
        for high in [0usize, 1, 5, 50, 10_000] {
            for medium in [0usize, 3, 100] {
                let dist = RiskDistribution { high, medium, low: 40, informational: 0 };
                assert!(security_score(&dist) <= 100);
            }
        }
        let dist = RiskDistribution { high: 10_000, medium: 0, low: 0, informational: 0 };
        assert_eq!(security_score(&dist), 0);
    }

    #[test]
    fn test_grade_thresholds() {
        assert_eq!(grade_for(100), Grade::A);
        assert_eq!(grade_for(90), Grade::A);
        assert_eq!(grade_for(89), Grade::B);
        assert_eq!(grade_for(80), Grade::B);
        assert_eq!(grade_for(70), Grade::C);
        assert_eq!(grade_for(60), Grade::D);
        assert_eq!(grade_for(59), Grade::F);
        assert_eq!(grade_for(0), Grade::F);
    }

    #[test]
    fn test_group_by_title_keeps_highest_impact_variant() {
        let mut low = issue("Cookie Issue", Risk::Low, Confidence::Low);
        low.id = String::from("1");
        let mut high = issue("Cookie Issue", Risk::Medium, Confidence::High);
        high.id = String::from("2");
        high.occurrences = 3;

        let grouped = group_by_title(&[low, high]);
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].risk, Risk::Medium);
        assert_eq!(grouped[0].impact_score, 6);
        assert_eq!(grouped[0].occurrences, 4);
    }

    #[test]
    fn test_top_ten_sorted_by_impact() {
        let mut issues: Vec<Issue> = (0..12)
            .map(|n| issue(&format!("Low {}", n), Risk::Low, Confidence::Medium))
            .collect();
        issues.push(issue("SQL Injection", Risk::High, Confidence::High));

        let summary = summarize(&issues);
        assert_eq!(summary.top_vulnerabilities.len(), 10);
        assert_eq!(summary.top_vulnerabilities[0].title, "SQL Injection");
        assert_eq!(summary.critical_findings.len(), 1);
        assert_eq!(summary.total_issues, 13);
        assert_eq!(summary.overall_security_score, 20);
        assert_eq!(summary.grade, Grade::F);
    }
}
