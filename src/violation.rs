// SPDX-License-Identifier: PMPL-1.0-or-later
//! Violation representation and severity-based aggregation
//!
//! Everything here is a plain serializable value - a [`ScanOutcome`]
//! crosses the execution-context boundary as JSON and is validated back
//! into the tagged union exactly once, at [`ScanOutcome::from_value`].

use crate::{RelayError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Impact severity of a violation, ranked critical first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Critical,
    Serious,
    Moderate,
    Minor,
    /// Engine supplied no impact or one we do not recognize
    Unknown,
}

impl Impact {
    /// Sort rank: critical(1) through minor(4), unknown last
    pub fn rank(&self) -> u8 {
        match self {
            Impact::Critical => 1,
            Impact::Serious => 2,
            Impact::Moderate => 3,
            Impact::Minor => 4,
            Impact::Unknown => 5,
        }
    }

    /// The four known impacts in dashboard display order
    pub fn known() -> [Impact; 4] {
        [
            Impact::Critical,
            Impact::Serious,
            Impact::Moderate,
            Impact::Minor,
        ]
    }

    /// Lenient parse of an engine-supplied impact string
    pub fn from_engine(raw: Option<&str>) -> Impact {
        match raw.map(|s| s.to_ascii_lowercase()).as_deref() {
            Some("critical") => Impact::Critical,
            Some("serious") => Impact::Serious,
            Some("moderate") => Impact::Moderate,
            Some("minor") => Impact::Minor,
            _ => Impact::Unknown,
        }
    }
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Impact::Critical => "critical",
            Impact::Serious => "serious",
            Impact::Moderate => "moderate",
            Impact::Minor => "minor",
            Impact::Unknown => "unknown",
        };
        write!(f, "{}", label)
    }
}

/// One advisory check message attached to a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckMessage {
    pub message: String,
}

/// A document node affected by a violation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationNode {
    /// HTML snippet of the offending element
    pub html: String,
    /// Selector path; the first entry is the primary selector (entries
    /// past the first address shadow/iframe contexts)
    pub target: Vec<String>,
    /// Merged advisory checks, "any" conditions before "all" conditions,
    /// engine order preserved within each list
    pub checks: Vec<CheckMessage>,
}

impl ViolationNode {
    /// The primary selector, if the engine supplied one
    pub fn primary_selector(&self) -> Option<&str> {
        self.target.first().map(|s| s.as_str())
    }

    /// Joined selector path for display
    pub fn selector_path(&self) -> String {
        self.target.join(", ")
    }
}

/// A rule failure with severity and affected nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Rule identifier (e.g. "color-contrast")
    pub id: String,
    /// Severity classification
    pub impact: Impact,
    /// Short human-readable title
    pub help: String,
    /// Longer description of the rule
    pub description: String,
    /// Documentation link
    pub help_url: String,
    /// Affected nodes, engine order preserved
    pub nodes: Vec<ViolationNode>,
}

/// Result of one audit, as it crosses the context boundary
///
/// Serializes as `{"status": "success", ...}` or
/// `{"status": "failure", "message": ...}` so the receiving side can
/// validate the shape once and consume a closed variant thereafter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ScanOutcome {
    Success {
        /// Page URL reported by the engine, if any
        url: Option<String>,
        /// When the scan completed
        timestamp: DateTime<Utc>,
        violations: Vec<Violation>,
        incomplete: Vec<Violation>,
    },
    Failure {
        message: String,
    },
}

impl ScanOutcome {
    /// Failure with a plain message (only serializable fields survive the
    /// boundary, so this is the one error shape)
    pub fn failure(message: impl Into<String>) -> Self {
        ScanOutcome::Failure {
            message: message.into(),
        }
    }

    /// Validate an untyped pipeline payload into the tagged union.
    ///
    /// This is the single shape check at the boundary; payloads matching
    /// neither variant are reported as [`RelayError::MalformedOutcome`]
    /// rather than propagated as an unhandled fault.
    pub fn from_value(value: serde_json::Value) -> Result<ScanOutcome> {
        serde_json::from_value(value).map_err(|_| RelayError::MalformedOutcome)
    }

    /// Whether this outcome is a success
    pub fn is_success(&self) -> bool {
        matches!(self, ScanOutcome::Success { .. })
    }
}

/// Impact filter applied to a sorted violation list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactFilter {
    /// Show the complete sorted list
    All,
    /// Show only violations with exactly this impact
    Only(Impact),
}

impl Default for ImpactFilter {
    fn default() -> Self {
        ImpactFilter::All
    }
}

impl fmt::Display for ImpactFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImpactFilter::All => write!(f, "all"),
            ImpactFilter::Only(impact) => write!(f, "{}", impact),
        }
    }
}

/// An impact-sorted collection of violations with aggregation methods
///
/// The invariant held here: violations are always ordered by impact rank,
/// and violations of equal impact retain their engine-supplied relative
/// order (stable sort).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViolationSet {
    violations: Vec<Violation>,
}

impl ViolationSet {
    /// Empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from an engine-ordered list, sorting by impact rank
    pub fn from_unsorted(mut violations: Vec<Violation>) -> Self {
        violations.sort_by_key(|v| v.impact.rank());
        Self { violations }
    }

    /// The sorted violations
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Violations matching a filter, in sorted order
    pub fn filtered(&self, filter: ImpactFilter) -> Vec<&Violation> {
        match filter {
            ImpactFilter::All => self.violations.iter().collect(),
            ImpactFilter::Only(impact) => self
                .violations
                .iter()
                .filter(|v| v.impact == impact)
                .collect(),
        }
    }

    /// Count per known impact, dashboard display order, zero counts
    /// omitted. Unknown-impact violations are counted in [`len`] but
    /// never appear here.
    ///
    /// [`len`]: ViolationSet::len
    pub fn summary_counts(&self) -> Vec<(Impact, usize)> {
        Impact::known()
            .iter()
            .filter_map(|impact| {
                let count = self.violations.iter().filter(|v| v.impact == *impact).count();
                (count > 0).then_some((*impact, count))
            })
            .collect()
    }

    /// Total count, unknown impacts included
    pub fn len(&self) -> usize {
        self.violations.len()
    }

    /// Is empty
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }
}

impl<'a> IntoIterator for &'a ViolationSet {
    type Item = &'a Violation;
    type IntoIter = std::slice::Iter<'a, Violation>;

    fn into_iter(self) -> Self::IntoIter {
        self.violations.iter()
    }
}
