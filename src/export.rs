// SPDX-License-Identifier: PMPL-1.0-or-later
//! Audit export
//!
//! Serializes a reduced projection of a successful audit - page URL,
//! timestamp, and per violation the rule id, impact, help text, help URL,
//! and per node the HTML snippet and selector path - as a pretty-printed
//! JSON artifact. Engine-internal fields beyond this projection are
//! deliberately excluded so the exported format stays stable even if the
//! engine's schema changes.

use crate::violation::{Impact, ScanOutcome, Violation};
use crate::{RelayError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Exported audit report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportReport {
    /// Page that was audited
    pub url: Option<String>,
    /// When the audit completed
    pub timestamp: DateTime<Utc>,
    pub violations: Vec<ExportViolation>,
}

/// Projection of one violation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportViolation {
    pub rule: String,
    pub impact: Impact,
    pub description: String,
    #[serde(rename = "helpUrl")]
    pub help_url: String,
    pub nodes: Vec<ExportNode>,
}

/// Projection of one affected node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportNode {
    pub html: String,
    pub target: Vec<String>,
}

impl ExportReport {
    /// Build the projection from a successful outcome. A `Failure` has
    /// nothing to export and is reported as
    /// [`RelayError::ScanExecution`].
    pub fn from_outcome(outcome: &ScanOutcome) -> Result<ExportReport> {
        match outcome {
            ScanOutcome::Success {
                url,
                timestamp,
                violations,
                ..
            } => Ok(ExportReport {
                url: url.clone(),
                timestamp: *timestamp,
                violations: violations.iter().map(project).collect(),
            }),
            ScanOutcome::Failure { message } => {
                Err(RelayError::ScanExecution(message.clone()))
            }
        }
    }

    /// Deterministic artifact name from the audit's ISO-8601 timestamp
    pub fn filename(&self) -> String {
        format!(
            "accessibility-audit-{}.json",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
        )
    }

    /// Pretty-printed JSON body
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the artifact into a directory, returning its path
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.filename());
        std::fs::write(&path, self.to_json_pretty()?)?;
        debug!(path = %path.display(), "export written");
        Ok(path)
    }
}

fn project(violation: &Violation) -> ExportViolation {
    ExportViolation {
        rule: violation.id.clone(),
        impact: violation.impact,
        description: violation.help.clone(),
        help_url: violation.help_url.clone(),
        nodes: violation
            .nodes
            .iter()
            .map(|node| ExportNode {
                html: node.html.clone(),
                target: node.target.clone(),
            })
            .collect(),
    }
}
