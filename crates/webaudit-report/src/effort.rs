//! Remediation effort resolution
//!
//! Resolution order: exact alert name, then name heuristics, then the
//! default for the risk level.

use webaudit_core::{Effort, Risk};

/// Known alert names and their remediation effort (matched case-insensitively)
const EFFORT_TABLE: &[(&str, Effort)] = &[
    ("SQL Injection", Effort::High),
    ("SQL Injection - MySQL", Effort::High),
    ("SQL Injection - PostgreSQL", Effort::High),
    ("Cross Site Scripting (Reflected)", Effort::High),
    ("Cross Site Scripting (Persistent)", Effort::High),
    ("Cross Site Scripting (DOM Based)", Effort::High),
    ("Remote OS Command Injection", Effort::High),
    ("Path Traversal", Effort::High),
    ("Remote File Inclusion", Effort::High),
    ("Server Side Request Forgery", Effort::High),
    ("Server Side Template Injection", Effort::High),
    ("External Redirect", Effort::Medium),
    ("Absence of Anti-CSRF Tokens", Effort::Medium),
    ("Content Security Policy (CSP) Header Not Set", Effort::Medium),
    ("Vulnerable JS Library", Effort::Medium),
    ("Cross-Domain Misconfiguration", Effort::Medium),
    ("Application Error Disclosure", Effort::Low),
    ("Cookie No HttpOnly Flag", Effort::Low),
    ("Cookie Without Secure Flag", Effort::Low),
    ("Cookie without SameSite Attribute", Effort::Low),
    ("Strict-Transport-Security Header Not Set", Effort::Low),
    ("X-Content-Type-Options Header Missing", Effort::Low),
    ("Timestamp Disclosure - Unix", Effort::Low),
];

/// Resolve the remediation effort for an alert name
pub fn resolve_effort(name: &str, risk: Risk) -> Effort {
    exact_effort(name)
        .or_else(|| heuristic_effort(name))
        .unwrap_or_else(|| risk.default_effort())
}

fn exact_effort(name: &str) -> Option<Effort> {
    let name = name.trim();
    EFFORT_TABLE
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(name))
        .map(|(_, effort)| *effort)
}

fn heuristic_effort(name: &str) -> Option<Effort> {
    let name = name.to_ascii_lowercase();
    let has = |needle: &str| name.contains(needle);

    if has("xss") || has("cross site scripting") || has("cross-site scripting") {
        Some(Effort::High)
    } else if has("injection") {
        Some(Effort::High)
    } else if has("header") && (has("missing") || has("not set")) {
        Some(Effort::Low)
    } else if has("cookie") {
        Some(Effort::Low)
    } else if has("information disclosure") || has("leaks") {
        Some(Effort::Low)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_table_wins() {
        assert_eq!(resolve_effort("sql injection", Risk::Low), Effort::High);
        assert_eq!(resolve_effort("External Redirect", Risk::High), Effort::Medium);
    }

    #[test]
    fn test_missing_header_heuristic_beats_risk_default() {
        assert!(exact_effort("X-Frame-Options Header Not Set").is_none());
        assert_eq!(
            resolve_effort("X-Frame-Options Header Not Set", Risk::Medium),
            Effort::Low
        );
    }

    #[test]
    fn test_heuristics() {
        assert_eq!(resolve_effort("Stored XSS in comments", Risk::Low), Effort::High);
        assert_eq!(resolve_effort("LDAP Injection", Risk::Medium), Effort::High);
        assert_eq!(resolve_effort("Loosely Scoped Cookie", Risk::Medium), Effort::Low);
        assert_eq!(
            resolve_effort("Server Leaks Information via \"X-Powered-By\"", Risk::Medium),
            Effort::Low
        );
        assert_eq!(
            resolve_effort("Information Disclosure - Suspicious Comments", Risk::Medium),
            Effort::Low
        );
    }

    #[test]
    fn test_risk_default() {
        assert_eq!(resolve_effort("Buffer Overflow", Risk::High), Effort::High);
        assert_eq!(resolve_effort("Buffer Overflow", Risk::Medium), Effort::Medium);
        assert_eq!(resolve_effort("Buffer Overflow", Risk::Informational), Effort::Low);
    }
}
