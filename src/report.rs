//! Validator report normalisation: raw validator output → [`ValidationReport`].
//!
//! External structural validators (veraPDF and friends) each speak their own
//! schema and severity vocabulary. This module translates one raw JSON report
//! into the internal issue taxonomy using a configured [`SeverityMap`], so
//! the scorer never depends on validator internals beyond the classified
//! issue list.
//!
//! ## Severity resolution order
//!
//! 1. `(clause, test)` override — individual tests within a clause can carry
//!    a different weight than the clause default
//! 2. exact clause match
//! 3. parent clause (`7.18.5` falls back to `7.18`, then `7`)
//! 4. the validator's native severity word (`ERROR`, `WARNING`, …)
//! 5. [`Severity::Minor`]
//!
//! Unknown rule clauses are retained at `Minor` rather than dropped, keeping
//! issue totals consistent with the source report's failed-check count.

use crate::error::RemediateError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Issue severity, a closed ordered set.
///
/// Ordering is total and ascending: `Minor < Moderate < Serious < Critical`.
/// The scorer weighs `Critical` heaviest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Minor inconvenience for assistive-technology users.
    Minor,
    /// Significant but workable issue.
    Moderate,
    /// Major barrier for users.
    Serious,
    /// Blocks accessibility completely (e.g. figure without alt-text).
    Critical,
}

impl Severity {
    /// All severities, most severe first.
    pub const ALL: [Severity; 4] = [
        Severity::Critical,
        Severity::Serious,
        Severity::Moderate,
        Severity::Minor,
    ];
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Critical => "critical",
            Severity::Serious => "serious",
            Severity::Moderate => "moderate",
            Severity::Minor => "minor",
        };
        f.write_str(s)
    }
}

/// A single classified validation issue. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Rule clause identifier in the compliance model (e.g. `"7.18.6"`).
    pub clause: String,
    /// Test number within the clause, when the validator reports one.
    pub test_number: Option<u32>,
    /// Free-text description of the failure.
    pub description: String,
    /// Classified severity (via [`SeverityMap`]).
    pub severity: Severity,
    /// Location context from the validator, when available.
    pub location: Option<String>,
}

/// Normalised result of one validation pass.
///
/// Produced fresh by each pass; never mutated, only superseded by the next
/// pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub passed_rules: u32,
    pub failed_rules: u32,
    pub passed_checks: u32,
    pub failed_checks: u32,
    /// Issues in source-report order.
    pub issues: Vec<Issue>,
}

impl ValidationReport {
    /// Count issues per severity. Every severity is present in the result,
    /// zero-valued when absent, so callers can index unconditionally.
    pub fn issues_by_severity(&self) -> BTreeMap<Severity, usize> {
        let mut counts: BTreeMap<Severity, usize> =
            Severity::ALL.iter().map(|s| (*s, 0)).collect();
        for issue in &self.issues {
            *counts.entry(issue.severity).or_insert(0) += 1;
        }
        counts
    }
}

// ── Severity mapping ─────────────────────────────────────────────────────

/// A `(clause, test)` severity override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestOverride {
    pub clause: String,
    pub test: u32,
    pub severity: Severity,
}

/// Translation table from a validator's vocabulary to the internal severity
/// set. Configuration, not hard-coded per validator version: shells can load
/// one from JSON per validator release.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeverityMap {
    /// Native severity words (case-insensitive), e.g. `"ERROR" → serious`.
    native: BTreeMap<String, Severity>,
    /// Clause-level severities.
    clauses: BTreeMap<String, Severity>,
    /// Test-level overrides, consulted before clause severities.
    overrides: Vec<TestOverride>,
}

impl SeverityMap {
    /// Empty map: everything resolves through the native vocabulary or to
    /// `Minor`.
    pub fn empty() -> Self {
        Self {
            native: BTreeMap::new(),
            clauses: BTreeMap::new(),
            overrides: Vec::new(),
        }
    }

    /// The built-in PDF/UA (ISO 14289-1) table.
    ///
    /// Clause weights reflect impact on assistive technology: document
    /// structure and figure alt-text block screen readers outright, content
    /// organisation clauses are workable barriers.
    pub fn pdfua() -> Self {
        use Severity::*;
        let clauses: BTreeMap<String, Severity> = [
            ("6.1", Critical),  // Conformance
            ("6.2", Critical),  // MarkInfo
            ("7.1", Serious),   // General structure
            ("7.2", Serious),   // Language specification
            ("7.3", Serious),   // Embedded files
            ("7.4", Moderate),  // Headings
            ("7.5", Moderate),  // Tables
            ("7.6", Moderate),  // Lists
            ("7.7", Moderate),  // Math
            ("7.8", Moderate),  // Page layout
            ("7.9", Moderate),  // Notes
            ("7.10", Moderate), // References
            ("7.11", Moderate), // Bibliographic entries
            ("7.12", Moderate), // Quotes
            ("7.13", Moderate), // Optional content
            ("7.14", Moderate), // Ruby
            ("7.15", Moderate), // Warichu
            ("7.16", Moderate), // TOC
            ("7.17", Moderate), // Indices
            ("7.18", Serious),  // Annotations
            ("7.18.1", Serious),
            ("7.18.4", Moderate), // Widget annotations
            ("7.18.5", Serious),  // Link annotations
            ("7.18.6", Critical), // Figure alt-text
            ("7.18.7", Serious),  // Form fields
            ("7.19", Moderate),   // Actions
            ("7.20", Moderate),   // XObjects
            ("7.21", Serious),    // Fonts
            ("7.21.7", Serious),  // Font Unicode mapping
        ]
        .into_iter()
        .map(|(c, s)| (c.to_string(), s))
        .collect();

        let overrides = [
            ("7.1", 1, Critical),  // Artifact/tagged content mixing
            ("7.1", 2, Critical),  // Tagged inside artifact
            ("7.1", 3, Critical),  // Content tagged or artifact
            ("7.1", 8, Serious),   // XMP metadata
            ("7.1", 10, Moderate), // DisplayDocTitle
            ("7.1", 11, Critical), // StructTreeRoot
            ("7.2", 2, Moderate),  // Outline language
            ("7.2", 34, Serious),  // Page content language
            ("7.18.3", 1, Moderate), // Tabs key
            ("7.18.5", 1, Serious),  // Link tagging
            ("7.18.5", 2, Serious),  // Link alt-text
        ]
        .into_iter()
        .map(|(clause, test, severity)| TestOverride {
            clause: clause.to_string(),
            test,
            severity,
        })
        .collect();

        let native = [("error", Severity::Serious), ("warning", Severity::Minor)]
            .into_iter()
            .map(|(w, s)| (w.to_string(), s))
            .collect();

        Self {
            native,
            clauses,
            overrides,
        }
    }

    /// Resolve a severity for one failure record.
    pub fn resolve(
        &self,
        clause: &str,
        test: Option<u32>,
        native: Option<&str>,
    ) -> Severity {
        if let Some(test) = test {
            if let Some(o) = self
                .overrides
                .iter()
                .find(|o| o.clause == clause && o.test == test)
            {
                return o.severity;
            }
        }

        if let Some(s) = self.clauses.get(clause) {
            return *s;
        }

        // Walk up parent clauses: "7.18.5" → "7.18" → "7"
        let mut parts: Vec<&str> = clause.split('.').collect();
        while parts.len() > 1 {
            parts.pop();
            if let Some(s) = self.clauses.get(&parts.join(".")) {
                return *s;
            }
        }

        if let Some(word) = native {
            if let Some(s) = self.native.get(&word.to_ascii_lowercase()) {
                return *s;
            }
        }

        Severity::Minor
    }
}

impl Default for SeverityMap {
    fn default() -> Self {
        Self::pdfua()
    }
}

// ── Parsing ──────────────────────────────────────────────────────────────

/// Parse a raw validator report into a [`ValidationReport`].
///
/// The raw value must carry the four summary counters (snake_case or
/// camelCase, at the top level or under a `summary` object) and may carry a
/// `failures` array of failure records. Missing counters are a
/// [`RemediateError::MalformedReport`]; missing `failures` means a clean
/// report.
pub fn parse_report(
    raw: &serde_json::Value,
    map: &SeverityMap,
) -> Result<ValidationReport, RemediateError> {
    let summary = raw.get("summary").unwrap_or(raw);

    let passed_rules = read_counter(summary, "passed_rules", "passedRules")?;
    let failed_rules = read_counter(summary, "failed_rules", "failedRules")?;
    let passed_checks = read_counter(summary, "passed_checks", "passedChecks")?;
    let failed_checks = read_counter(summary, "failed_checks", "failedChecks")?;

    let mut issues = Vec::new();
    if let Some(failures) = raw.get("failures").and_then(|v| v.as_array()) {
        for failure in failures {
            let clause = failure
                .get("clause")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            let test_number = read_test_number(failure);
            let description = failure
                .get("description")
                .or_else(|| failure.get("message"))
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            let native = failure.get("severity").and_then(|v| v.as_str());
            let location = failure
                .get("checks")
                .and_then(|v| v.as_array())
                .and_then(|checks| checks.first())
                .and_then(|c| c.get("context"))
                .and_then(|v| v.as_str())
                .map(str::to_string);

            let severity = map.resolve(&clause, test_number, native);
            issues.push(Issue {
                clause,
                test_number,
                description,
                severity,
                location,
            });
        }
    }

    Ok(ValidationReport {
        passed_rules,
        failed_rules,
        passed_checks,
        failed_checks,
        issues,
    })
}

/// Read a required counter, accepting both naming conventions.
fn read_counter(
    summary: &serde_json::Value,
    snake: &str,
    camel: &str,
) -> Result<u32, RemediateError> {
    summary
        .get(snake)
        .or_else(|| summary.get(camel))
        .and_then(|v| v.as_u64())
        .map(|v| v as u32)
        .ok_or_else(|| RemediateError::MalformedReport {
            detail: format!("missing required counter '{snake}'"),
        })
}

/// Test numbers arrive as JSON numbers or strings depending on the validator
/// version.
fn read_test_number(failure: &serde_json::Value) -> Option<u32> {
    let v = failure.get("test_number").or_else(|| failure.get("testNumber"))?;
    match v {
        serde_json::Value::Number(n) => n.as_u64().map(|n| n as u32),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn severity_ordering_is_total() {
        assert!(Severity::Critical > Severity::Serious);
        assert!(Severity::Serious > Severity::Moderate);
        assert!(Severity::Moderate > Severity::Minor);
    }

    #[test]
    fn resolve_prefers_test_override() {
        let map = SeverityMap::pdfua();
        // Clause 7.1 defaults to serious, but test 10 (DisplayDocTitle) is moderate
        assert_eq!(map.resolve("7.1", Some(10), None), Severity::Moderate);
        assert_eq!(map.resolve("7.1", Some(99), None), Severity::Serious);
        assert_eq!(map.resolve("7.1", None, None), Severity::Serious);
    }

    #[test]
    fn resolve_walks_parent_clauses() {
        let map = SeverityMap::pdfua();
        // 7.18.2 is not in the table; parent 7.18 is serious
        assert_eq!(map.resolve("7.18.2", None, None), Severity::Serious);
    }

    #[test]
    fn resolve_falls_back_to_native_vocabulary() {
        let map = SeverityMap::pdfua();
        assert_eq!(map.resolve("99.9", None, Some("ERROR")), Severity::Serious);
        assert_eq!(map.resolve("99.9", None, Some("warning")), Severity::Minor);
    }

    #[test]
    fn resolve_unknown_defaults_to_minor() {
        let map = SeverityMap::pdfua();
        assert_eq!(map.resolve("99.9", None, None), Severity::Minor);
        assert_eq!(map.resolve("99.9", Some(1), Some("weird")), Severity::Minor);
    }

    #[test]
    fn parse_accepts_camel_case_summary() {
        let raw = json!({
            "summary": {
                "passedRules": 90, "failedRules": 2,
                "passedChecks": 1200, "failedChecks": 7
            },
            "failures": [
                { "clause": "7.18.6", "testNumber": "1",
                  "description": "Figure without Alt", "severity": "ERROR",
                  "checks": [{ "context": "root/pages[3]" }] }
            ]
        });
        let report = parse_report(&raw, &SeverityMap::pdfua()).unwrap();
        assert_eq!(report.passed_rules, 90);
        assert_eq!(report.failed_checks, 7);
        assert_eq!(report.issues.len(), 1);
        let issue = &report.issues[0];
        assert_eq!(issue.severity, Severity::Critical);
        assert_eq!(issue.test_number, Some(1));
        assert_eq!(issue.location.as_deref(), Some("root/pages[3]"));
    }

    #[test]
    fn parse_rejects_missing_counters() {
        let raw = json!({ "summary": { "passed_rules": 10 } });
        let err = parse_report(&raw, &SeverityMap::pdfua()).unwrap_err();
        assert!(err.to_string().contains("failed_rules"), "got: {err}");
    }

    #[test]
    fn parse_retains_unknown_clauses_as_minor() {
        let raw = json!({
            "passed_rules": 1, "failed_rules": 1,
            "passed_checks": 1, "failed_checks": 1,
            "failures": [
                { "clause": "42.1", "description": "mystery rule" }
            ]
        });
        let report = parse_report(&raw, &SeverityMap::pdfua()).unwrap();
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].severity, Severity::Minor);
    }

    #[test]
    fn issues_by_severity_counts_every_level() {
        let report = ValidationReport {
            passed_rules: 0,
            failed_rules: 3,
            passed_checks: 0,
            failed_checks: 3,
            issues: vec![
                Issue {
                    clause: "6.2".into(),
                    test_number: None,
                    description: String::new(),
                    severity: Severity::Critical,
                    location: None,
                },
                Issue {
                    clause: "7.2".into(),
                    test_number: None,
                    description: String::new(),
                    severity: Severity::Serious,
                    location: None,
                },
                Issue {
                    clause: "7.2".into(),
                    test_number: None,
                    description: String::new(),
                    severity: Severity::Serious,
                    location: None,
                },
            ],
        };
        let counts = report.issues_by_severity();
        assert_eq!(counts[&Severity::Critical], 1);
        assert_eq!(counts[&Severity::Serious], 2);
        assert_eq!(counts[&Severity::Moderate], 0);
        assert_eq!(counts[&Severity::Minor], 0);
    }
}
