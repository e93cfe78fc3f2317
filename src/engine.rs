// SPDX-License-Identifier: PMPL-1.0-or-later
//! Scanning engine seam and the scan invoker
//!
//! The scanning engine is an external collaborator: it evaluates
//! accessibility rules against the inspected document and resolves one
//! raw result or one rejection. This module owns the contract for
//! invoking it and normalizing its output; the rule set itself is a
//! black box.
//!
//! [`invoke`] runs inside the inspected document's execution context, so
//! everything it returns must be a plain serializable value. All failure
//! paths are converted to [`ScanOutcome::Failure`] before crossing back -
//! nothing here panics across the boundary.

use crate::config::AuditConfiguration;
use crate::violation::{CheckMessage, Impact, ScanOutcome, Violation, ViolationNode};
use crate::{RelayError, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// The scanning engine as seen by the invoker.
///
/// `run` must resolve with raw results or reject with an error; the
/// invoker never calls anything else on the engine and never mutates the
/// document itself.
#[async_trait]
pub trait ScanEngine: Send + Sync {
    async fn run(&self, config: &AuditConfiguration) -> Result<RawEngineResults>;
}

/// Raw engine output, exactly as the engine reports it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawEngineResults {
    /// URL of the scanned page
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub violations: Vec<RawViolation>,
    #[serde(default)]
    pub incomplete: Vec<RawViolation>,
}

/// Engine-shaped violation entry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawViolation {
    pub id: String,
    /// Engine impact string; absent or unrecognized maps to unknown
    #[serde(default)]
    pub impact: Option<String>,
    #[serde(default)]
    pub help: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "helpUrl")]
    pub help_url: String,
    #[serde(default)]
    pub nodes: Vec<RawNode>,
}

/// Engine-shaped node entry with its two check lists
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawNode {
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub target: Vec<String>,
    /// Checks where any condition may hold
    #[serde(default)]
    pub any: Vec<RawCheck>,
    /// Checks where all conditions must hold
    #[serde(default)]
    pub all: Vec<RawCheck>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawCheck {
    #[serde(default)]
    pub message: String,
}

impl RawViolation {
    /// Normalize into the relay's violation shape
    pub fn normalize(self) -> Violation {
        Violation {
            impact: Impact::from_engine(self.impact.as_deref()),
            id: self.id,
            help: self.help,
            description: self.description,
            help_url: self.help_url,
            nodes: self.nodes.into_iter().map(RawNode::normalize).collect(),
        }
    }
}

impl RawNode {
    /// Merge the `any` and `all` check lists into one flat advisory list,
    /// order preserved, `any` before `all`.
    pub fn normalize(self) -> ViolationNode {
        let checks = self
            .any
            .into_iter()
            .chain(self.all)
            .map(|c| CheckMessage { message: c.message })
            .collect();
        ViolationNode {
            html: self.html,
            target: self.target,
            checks,
        }
    }
}

impl ScanOutcome {
    /// Build a success outcome from raw engine results, stamping the
    /// completion time.
    pub fn from_raw(raw: RawEngineResults) -> ScanOutcome {
        ScanOutcome::Success {
            url: raw.url,
            timestamp: Utc::now(),
            violations: raw.violations.into_iter().map(RawViolation::normalize).collect(),
            incomplete: raw.incomplete.into_iter().map(RawViolation::normalize).collect(),
        }
    }
}

/// Invoke the scanning engine with a fixed configuration.
///
/// Fails fast with `Failure { message: "engine not available" }` when the
/// engine is absent from this execution context, and maps any engine
/// rejection to a `Failure` carrying only the error text (no live
/// references, no backtraces).
pub async fn invoke(engine: Option<&dyn ScanEngine>, config: &AuditConfiguration) -> ScanOutcome {
    let Some(engine) = engine else {
        return ScanOutcome::failure(RelayError::EngineUnavailable.to_string());
    };

    match engine.run(config).await {
        Ok(raw) => {
            debug!(
                violations = raw.violations.len(),
                incomplete = raw.incomplete.len(),
                "scan resolved"
            );
            ScanOutcome::from_raw(raw)
        }
        Err(err) => ScanOutcome::failure(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedEngine(Option<RawEngineResults>);

    #[async_trait]
    impl ScanEngine for FixedEngine {
        async fn run(&self, _config: &AuditConfiguration) -> Result<RawEngineResults> {
            match &self.0 {
                Some(raw) => Ok(raw.clone()),
                None => Err(RelayError::ScanExecution("engine rejected".to_string())),
            }
        }
    }

    #[tokio::test]
    async fn test_absent_engine_fails_fast() {
        let outcome = invoke(None, &AuditConfiguration::wcag_aa()).await;
        assert_eq!(outcome, ScanOutcome::failure("engine not available"));
    }

    #[tokio::test]
    async fn test_engine_rejection_maps_to_failure_text() {
        let engine = FixedEngine(None);
        let outcome = invoke(Some(&engine), &AuditConfiguration::wcag_aa()).await;
        assert_eq!(outcome, ScanOutcome::failure("scan failed: engine rejected"));
    }

    #[tokio::test]
    async fn test_success_normalizes_and_serializes() {
        let raw = RawEngineResults {
            url: Some("https://example.test/".to_string()),
            violations: vec![RawViolation {
                id: "link-name".to_string(),
                impact: Some("serious".to_string()),
                ..Default::default()
            }],
            incomplete: vec![],
        };
        let engine = FixedEngine(Some(raw));
        let outcome = invoke(Some(&engine), &AuditConfiguration::curated()).await;

        match &outcome {
            ScanOutcome::Success { url, violations, .. } => {
                assert_eq!(url.as_deref(), Some("https://example.test/"));
                assert_eq!(violations[0].impact, Impact::Serious);
            }
            other => panic!("expected success, got {:?}", other),
        }
        // Must survive the context boundary as JSON.
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(ScanOutcome::from_value(value).unwrap(), outcome);
    }

    #[test]
    fn test_check_merge_any_before_all() {
        let node = RawNode {
            html: "<a></a>".to_string(),
            target: vec!["a".to_string()],
            any: vec![
                RawCheck { message: "any-1".to_string() },
                RawCheck { message: "any-2".to_string() },
            ],
            all: vec![RawCheck { message: "all-1".to_string() }],
        };
        let messages: Vec<String> = node
            .normalize()
            .checks
            .into_iter()
            .map(|c| c.message)
            .collect();
        assert_eq!(messages, vec!["any-1", "any-2", "all-1"]);
    }

    #[test]
    fn test_missing_impact_normalizes_to_unknown() {
        let violation = RawViolation {
            id: "mystery".to_string(),
            impact: None,
            ..Default::default()
        }
        .normalize();
        assert_eq!(violation.impact, Impact::Unknown);
    }
}
