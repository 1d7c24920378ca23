//! Cross-batch issue aggregation
//!
//! Issues are keyed by `id ?? title`. The first sighting creates the
//! issue; later sightings only add URLs and instances it has not seen.

use std::collections::{HashMap, HashSet};

use tracing::debug;
use webaudit_core::{normalize_url, FindingInstance, RawFinding, UrlOutcome};

use crate::types::Issue;

/// (issue key, normalized url, method, parameter)
type InstanceKey = (String, String, String, String);

/// Incremental key → issue map
#[derive(Debug, Default)]
pub struct IssueAggregator {
    issues: HashMap<String, Issue>,
    order: Vec<String>,
    seen_urls: HashSet<(String, String)>,
    seen_instances: HashSet<InstanceKey>,
}

impl IssueAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Issue> {
        self.issues.get(key)
    }

    /// Ingest every finding of every outcome
    pub fn ingest_outcomes<'a>(&mut self, outcomes: impl IntoIterator<Item = &'a UrlOutcome>) {
        for outcome in outcomes {
            self.ingest_outcome(outcome);
        }
    }

    pub fn ingest_outcome(&mut self, outcome: &UrlOutcome) {
        for finding in &outcome.findings {
            self.ingest_finding(finding);
        }
    }

    /// Merge one raw finding
    pub fn ingest_finding(&mut self, finding: &RawFinding) {
        let key = finding.key().to_string();
        match self.issues.get_mut(&key) {
            Some(existing) => merge_details(existing, finding),
            None => {
                self.order.push(key.clone());
                self.issues.insert(key.clone(), Issue::from_finding(finding));
            }
        }

        for instance in &finding.instances {
            self.add_instance(&key, instance);
        }
    }

    /// Merge an already-built issue, e.g. from a partial report
    pub fn ingest_issue(&mut self, issue: &Issue) {
        let key = issue.id.clone();
        match self.issues.get_mut(&key) {
            Some(existing) => {
                for reference in &issue.references {
                    if !existing.references.contains(reference) {
                        existing.references.push(reference.clone());
                    }
                }
            }
            None => {
                self.order.push(key.clone());
                self.issues.insert(key.clone(), issue.without_instances());
            }
        }

        for instance in &issue.instances {
            self.add_instance(&key, instance);
        }
        for url in &issue.affected_urls {
            self.add_url(&key, url);
        }
    }

    fn add_instance(&mut self, key: &str, instance: &FindingInstance) {
        let url = normalize_url(&instance.url);
        let instance_key = (
            key.to_string(),
            url.clone(),
            instance.method.to_ascii_uppercase(),
            instance.parameter.clone(),
        );

        if self.seen_instances.insert(instance_key) {
            if let Some(issue) = self.issues.get_mut(key) {
                issue.instances.push(FindingInstance {
                    url: url.clone(),
                    ..instance.clone()
                });
                issue.occurrences = (issue.instances.len() as u32).max(1);
            }
        }
        self.add_url(key, &url);
    }

    fn add_url(&mut self, key: &str, url: &str) {
        let url = normalize_url(url);
        if url.is_empty() {
            return;
        }
        if self.seen_urls.insert((key.to_string(), url.clone())) {
            if let Some(issue) = self.issues.get_mut(key) {
                issue.affected_urls.push(url);
            }
        }
    }

    /// Materialize issues in first-seen order
    pub fn into_issues(mut self) -> Vec<Issue> {
        let issues: Vec<Issue> = self
            .order
            .iter()
            .filter_map(|key| self.issues.remove(key))
            .collect();
        debug!("Aggregated {} unique issues", issues.len());
        issues
    }
}

/// Fill gaps in an existing issue from a later sighting. Risk, confidence
/// and scores of the first sighting are kept.
fn merge_details(existing: &mut Issue, finding: &RawFinding) {
    if existing.description.is_empty() && !finding.description.is_empty() {
        existing.description = finding.description.clone();
    }
    if existing.solution.is_empty() && !finding.solution.is_empty() {
        existing.solution = finding.solution.clone();
    }
    if existing.cwe_id.is_none() {
        existing.cwe_id = finding.cwe_id;
    }
    if existing.wasc_id.is_none() {
        existing.wasc_id = finding.wasc_id;
    }
    for reference in &finding.references {
        if !existing.references.contains(reference) {
            existing.references.push(reference.clone());
        }
    }
}
