//! Compliance scoring: [`ValidationReport`] → [`ScoreResult`].
//!
//! The score is a pure function of the classified issue list and the
//! configured [`ScorePolicy`] — same report, same policy, same score, always.
//! Penalty weights and grade thresholds live in the policy rather than
//! scattered literals so the mapping is testable independently and
//! reproducible from the report alone.

use crate::report::{Severity, ValidationReport};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Letter grade, a step function of the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        };
        f.write_str(s)
    }
}

/// Per-occurrence score penalties, heaviest first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SeverityPenalties {
    pub critical: u32,
    pub serious: u32,
    pub moderate: u32,
    pub minor: u32,
}

impl SeverityPenalties {
    pub fn penalty(&self, severity: Severity) -> u32 {
        match severity {
            Severity::Critical => self.critical,
            Severity::Serious => self.serious,
            Severity::Moderate => self.moderate,
            Severity::Minor => self.minor,
        }
    }
}

impl Default for SeverityPenalties {
    fn default() -> Self {
        Self {
            critical: 10,
            serious: 6,
            moderate: 2,
            minor: 1,
        }
    }
}

/// Score thresholds for each letter grade (inclusive lower bounds).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GradeScale {
    pub a: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
}

impl GradeScale {
    pub fn grade(&self, score: u8) -> Grade {
        if score >= self.a {
            Grade::A
        } else if score >= self.b {
            Grade::B
        } else if score >= self.c {
            Grade::C
        } else if score >= self.d {
            Grade::D
        } else {
            Grade::F
        }
    }
}

impl Default for GradeScale {
    fn default() -> Self {
        Self {
            a: 90,
            b: 80,
            c: 70,
            d: 60,
        }
    }
}

/// The scoring configuration: penalties plus grade thresholds.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ScorePolicy {
    pub penalties: SeverityPenalties,
    pub grades: GradeScale,
}

/// Result of scoring one validation report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreResult {
    /// 0–100, higher is better.
    pub score: u8,
    pub grade: Grade,
    /// True iff zero critical and zero serious issues remain.
    pub compliant: bool,
    /// Issue counts per severity; every severity is present.
    pub issues_by_severity: BTreeMap<Severity, usize>,
}

impl ScoreResult {
    /// Compact single-line rendering for logs: `82/100 (B), compliant=false,
    /// critical=0 serious=2 moderate=1 minor=0`.
    pub fn summary(&self) -> String {
        let mut s = format!(
            "{}/100 ({}), compliant={}",
            self.score, self.grade, self.compliant
        );
        for sev in Severity::ALL {
            s.push_str(&format!(
                " {}={}",
                sev,
                self.issues_by_severity.get(&sev).copied().unwrap_or(0)
            ));
        }
        s
    }
}

/// Score a validation report.
///
/// Starts at 100, subtracts the configured penalty per issue occurrence, and
/// floors at 0. `compliant` requires the report to be free of critical and
/// serious issues — a high score alone is not enough.
pub fn score(report: &ValidationReport, policy: &ScorePolicy) -> ScoreResult {
    let issues_by_severity = report.issues_by_severity();

    let total_penalty: u32 = report
        .issues
        .iter()
        .map(|i| policy.penalties.penalty(i.severity))
        .sum();

    let score = 100u32.saturating_sub(total_penalty).min(100) as u8;
    let compliant = issues_by_severity[&Severity::Critical] == 0
        && issues_by_severity[&Severity::Serious] == 0;

    ScoreResult {
        score,
        grade: policy.grades.grade(score),
        compliant,
        issues_by_severity,
    }
}
