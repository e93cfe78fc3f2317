// SPDX-License-Identifier: PMPL-1.0-or-later
//! Audit configuration values
//!
//! An [`AuditConfiguration`] is an immutable, serializable value handed to
//! the scanning engine as-is. Two presets exist in practice - a broad
//! WCAG-tag preset and a curated rule-list preset - and both are plain
//! instances of this type, never hardcoded logic elsewhere.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which rules the engine should evaluate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "values", rename_all = "lowercase")]
pub enum RuleSelection {
    /// Run every rule carrying one of these tags (e.g. `wcag2aa`)
    Tags(Vec<String>),
    /// Run exactly these rules by id
    Rules(Vec<String>),
}

/// Per-rule enable/disable override
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleOverride {
    pub enabled: bool,
}

/// Result categories the engine should report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultType {
    Violations,
    Incomplete,
}

/// Immutable configuration for one audit run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditConfiguration {
    /// Rule selection (tag filter or explicit rule list)
    pub rule_selection: RuleSelection,
    /// Per-rule overrides applied on top of the selection
    pub rule_overrides: BTreeMap<String, RuleOverride>,
    /// Whether the engine should descend into iframes
    pub include_iframes: bool,
    /// Which result categories to collect
    pub result_types: Vec<ResultType>,
}

impl AuditConfiguration {
    /// Broad WCAG 2.x AA preset: every rule tagged `wcag2aa`, with the
    /// `target-size` rule explicitly enabled since the engine ships it
    /// disabled by default.
    pub fn wcag_aa() -> Self {
        let mut overrides = BTreeMap::new();
        overrides.insert("target-size".to_string(), RuleOverride { enabled: true });
        Self {
            rule_selection: RuleSelection::Tags(vec!["wcag2aa".to_string()]),
            rule_overrides: overrides,
            include_iframes: true,
            result_types: vec![ResultType::Violations],
        }
    }

    /// Curated preset: a fixed list of high-signal rules, collecting both
    /// violations and incomplete results.
    pub fn curated() -> Self {
        let rules = [
            "target-size",
            "button-name",
            "link-name",
            "color-contrast",
            "aria-allowed-attr",
            "aria-hidden-focus",
            "aria-required-attr",
            "landmark-one-main",
        ];
        let mut overrides = BTreeMap::new();
        overrides.insert("target-size".to_string(), RuleOverride { enabled: true });
        Self {
            rule_selection: RuleSelection::Rules(
                rules.iter().map(|r| r.to_string()).collect(),
            ),
            rule_overrides: overrides,
            include_iframes: true,
            result_types: vec![ResultType::Violations, ResultType::Incomplete],
        }
    }

    /// Set a per-rule override
    pub fn with_override(mut self, rule_id: &str, enabled: bool) -> Self {
        self.rule_overrides
            .insert(rule_id.to_string(), RuleOverride { enabled });
        self
    }

    /// Whether incomplete results were requested
    pub fn wants_incomplete(&self) -> bool {
        self.result_types.contains(&ResultType::Incomplete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wcag_aa_preset() {
        let config = AuditConfiguration::wcag_aa();
        assert_eq!(
            config.rule_selection,
            RuleSelection::Tags(vec!["wcag2aa".to_string()])
        );
        assert!(config.include_iframes);
        assert!(config.rule_overrides["target-size"].enabled);
        assert!(!config.wants_incomplete());
    }

    #[test]
    fn test_curated_preset() {
        let config = AuditConfiguration::curated();
        match &config.rule_selection {
            RuleSelection::Rules(rules) => {
                assert_eq!(rules.len(), 8);
                assert!(rules.contains(&"color-contrast".to_string()));
            }
            other => panic!("expected rule list, got {:?}", other),
        }
        assert!(config.wants_incomplete());
    }

    #[test]
    fn test_config_round_trips_as_json() {
        let config = AuditConfiguration::curated();
        let json = serde_json::to_string(&config).unwrap();
        let back: AuditConfiguration = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_with_override() {
        let config = AuditConfiguration::wcag_aa().with_override("color-contrast", false);
        assert!(!config.rule_overrides["color-contrast"].enabled);
    }
}
