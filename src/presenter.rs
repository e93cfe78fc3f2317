// SPDX-License-Identifier: PMPL-1.0-or-later
//! Results presenter
//!
//! Subscribes to completion events, normalizes and sorts violations by
//! impact, and produces filterable grouped views. Two independent
//! surfaces exist - the panel style and the popup style - each with its
//! own [`AuditSession`] state but one shared aggregation and filtering
//! contract.
//!
//! The presenter never panics on pipeline input: a payload matching
//! neither outcome shape renders a generic failure state, and a
//! completion tagged with a request other than the presenter's latest
//! one is dropped (stale-result guard).

use crate::bus::Message;
use crate::coordinator::AuditRequest;
use crate::violation::{Impact, ImpactFilter, ScanOutcome, ViolationSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

/// Which UI surface this presenter drives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    /// Devtools-panel style: summary dashboard plus a flat sorted list
    Panel,
    /// Popup style: sections grouped by severity with counted headers
    Popup,
}

/// Presenter-local state for the current audit
///
/// Created empty at load, replaced wholesale on each completed audit,
/// never partially mutated mid-audit.
#[derive(Debug, Clone, Default)]
pub struct AuditSession {
    /// Outcome of the last completed audit
    pub last_outcome: Option<ScanOutcome>,
    /// All violations from the last success, impact-sorted
    pub all_violations: ViolationSet,
    /// Currently active filter
    pub active_filter: ImpactFilter,
}

/// Presenter lifecycle status
#[derive(Debug, Clone, PartialEq, Eq)]
enum Status {
    Idle,
    Running,
    Failed(String),
    Complete,
}

/// One summary dashboard entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryCard {
    pub impact: Impact,
    pub count: usize,
}

/// One affected node in a rendered group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeEntry {
    /// HTML snippet of the offending element
    pub html: String,
    /// Joined selector path for display
    pub selector_path: String,
    /// Raw selector path, handed to the inspection bridge on request
    pub target: Vec<String>,
    /// Merged advisory check messages
    pub checks: Vec<String>,
}

/// One violation as a collapsible group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationGroup {
    pub rule_id: String,
    pub impact: Impact,
    pub title: String,
    pub node_count: usize,
    pub description: String,
    pub help_url: String,
    pub nodes: Vec<NodeEntry>,
}

/// Rendered results state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsView {
    /// Human status line ("Found N total violations.")
    pub status_line: String,
    /// Per-impact dashboard counts, zero counts omitted
    pub summary: Vec<SummaryCard>,
    /// Active filter
    pub filter: ImpactFilter,
    /// Groups passing the filter, in sorted order
    pub groups: Vec<ViolationGroup>,
    /// Set when the filter matched nothing: show an explicit message,
    /// not an empty list
    pub empty_filter: Option<Impact>,
    /// Whether export is offered
    pub export_available: bool,
}

/// What a surface should currently show
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionView {
    /// Nothing run yet
    Idle,
    /// Audit in flight; start control disabled
    Running,
    /// Fatal audit error; start control re-enabled
    Error { message: String },
    /// Audit succeeded with zero violations; filter and export hidden
    Clean,
    /// Audit succeeded with violations
    Results(ResultsView),
}

/// Presenter for one UI surface
#[derive(Debug)]
pub struct Presenter {
    surface: Surface,
    session: AuditSession,
    status: Status,
    latest_request: Option<Uuid>,
}

impl Presenter {
    /// New presenter with empty session state
    pub fn new(surface: Surface) -> Self {
        Self {
            surface,
            session: AuditSession::default(),
            status: Status::Idle,
            latest_request: None,
        }
    }

    /// Current session state
    pub fn session(&self) -> &AuditSession {
        &self.session
    }

    /// Whether the start control is armed
    pub fn start_enabled(&self) -> bool {
        self.status != Status::Running
    }

    /// Record that this surface issued a start request: previous results,
    /// summary, filter state, and export availability are cleared before
    /// the request goes out.
    pub fn begin_audit(&mut self, request: &AuditRequest) {
        self.session = AuditSession::default();
        self.status = Status::Running;
        self.latest_request = Some(request.id);
        debug!(id = %request.id, "audit begun, session cleared");
    }

    /// Feed a bus message; only completions are of interest here
    pub fn on_message(&mut self, message: &Message) {
        if let Message::Complete { request, payload } = message {
            self.on_audit_complete(request, payload.clone());
        }
    }

    /// Handle a completed audit.
    ///
    /// Stale-result guard: if this surface has issued a start request,
    /// completions tagged with any other request id are ignored rather
    /// than appended or replaced.
    pub fn on_audit_complete(&mut self, request: &AuditRequest, outcome: ScanOutcome) {
        if let Some(latest) = self.latest_request {
            if latest != request.id {
                warn!(id = %request.id, "stale completion ignored");
                return;
            }
        }
        self.apply(outcome);
    }

    /// Handle a completion whose payload has not yet been validated.
    /// Malformed payloads produce a generic failure state, never a panic.
    pub fn on_raw_complete(&mut self, request: &AuditRequest, value: serde_json::Value) {
        match ScanOutcome::from_value(value) {
            Ok(outcome) => self.on_audit_complete(request, outcome),
            Err(err) => self.on_audit_complete(request, ScanOutcome::failure(err.to_string())),
        }
    }

    fn apply(&mut self, outcome: ScanOutcome) {
        match outcome {
            ScanOutcome::Failure { ref message } => {
                // Error state clears any previous list and filter and
                // re-arms the start control.
                self.session = AuditSession::default();
                self.session.last_outcome = Some(outcome.clone());
                self.status = Status::Failed(message.clone());
            }
            ScanOutcome::Success { ref violations, .. } => {
                self.session = AuditSession {
                    last_outcome: Some(outcome.clone()),
                    all_violations: ViolationSet::from_unsorted(violations.clone()),
                    active_filter: ImpactFilter::All,
                };
                self.status = Status::Complete;
            }
        }
    }

    /// Change the active filter. Filtering never re-sorts or re-fetches;
    /// `All` restores the cached sorted list as-is.
    pub fn set_filter(&mut self, filter: ImpactFilter) {
        self.session.active_filter = filter;
    }

    /// Compute the view for the current state and filter
    pub fn view(&self) -> SessionView {
        match &self.status {
            Status::Idle => SessionView::Idle,
            Status::Running => SessionView::Running,
            Status::Failed(message) => SessionView::Error {
                message: message.clone(),
            },
            Status::Complete => {
                if self.session.all_violations.is_empty() {
                    return SessionView::Clean;
                }
                let filter = self.session.active_filter;
                let filtered = self.session.all_violations.filtered(filter);
                let empty_filter = match filter {
                    ImpactFilter::Only(impact) if filtered.is_empty() => Some(impact),
                    _ => None,
                };
                SessionView::Results(ResultsView {
                    status_line: format!(
                        "Found {} total violations.",
                        self.session.all_violations.len()
                    ),
                    summary: self
                        .session
                        .all_violations
                        .summary_counts()
                        .into_iter()
                        .map(|(impact, count)| SummaryCard { impact, count })
                        .collect(),
                    filter,
                    groups: filtered.into_iter().map(to_group).collect(),
                    empty_filter,
                    export_available: true,
                })
            }
        }
    }

    /// Render the current view as terminal-friendly markdown
    pub fn render(&self) -> String {
        match self.view() {
            SessionView::Idle => "Run an audit to see results.".to_string(),
            SessionView::Running => "Running audit...".to_string(),
            SessionView::Error { message } => format!("Audit failed: {}", message),
            SessionView::Clean => "✅ No accessibility violations found!".to_string(),
            SessionView::Results(results) => match self.surface {
                Surface::Panel => render_panel(&results),
                Surface::Popup => render_popup(&results),
            },
        }
    }
}

fn to_group(violation: &crate::violation::Violation) -> ViolationGroup {
    ViolationGroup {
        rule_id: violation.id.clone(),
        impact: violation.impact,
        title: violation.help.clone(),
        node_count: violation.nodes.len(),
        description: violation.description.clone(),
        help_url: violation.help_url.clone(),
        nodes: violation
            .nodes
            .iter()
            .map(|node| NodeEntry {
                html: node.html.clone(),
                selector_path: node.selector_path(),
                target: node.target.clone(),
                checks: node.checks.iter().map(|c| c.message.clone()).collect(),
            })
            .collect(),
    }
}

/// Escape engine-supplied text so rendered surfaces never emit raw markup
pub fn escape_html(unsafe_text: &str) -> String {
    unsafe_text
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#039;")
}

/// Panel surface: status line, summary dashboard, flat sorted groups
fn render_panel(results: &ResultsView) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", results.status_line));

    out.push_str("| Impact | Count |\n|--------|-------|\n");
    for card in &results.summary {
        out.push_str(&format!("| {} | {} |\n", card.impact, card.count));
    }
    out.push('\n');

    if let Some(impact) = results.empty_filter {
        out.push_str(&format!("No {} violations found.\n", impact));
        return out;
    }

    for group in &results.groups {
        out.push_str(&format!(
            "## [{}] {} ({} {})\n\n",
            group.impact,
            escape_html(&group.title),
            group.node_count,
            if group.node_count == 1 { "node" } else { "nodes" }
        ));
        out.push_str(&format!(
            "{} ([learn more]({}))\n\n",
            escape_html(&group.description),
            group.help_url
        ));
        for node in &group.nodes {
            out.push_str(&format!("- HTML: `{}`\n", escape_html(&node.html)));
            out.push_str(&format!("  Selector: `{}`\n", escape_html(&node.selector_path)));
            for check in &node.checks {
                out.push_str(&format!("  - Fix: {}\n", escape_html(check)));
            }
        }
        out.push('\n');
    }
    out
}

/// Popup surface: sections grouped by severity with counted headers
fn render_popup(results: &ResultsView) -> String {
    let mut out = String::new();
    out.push_str(&format!("Audit completed. {}\n\n", results.status_line));

    if let Some(impact) = results.empty_filter {
        out.push_str(&format!("No {} violations found.\n", impact));
        return out;
    }

    // Groups arrive impact-sorted, so contiguous runs share an impact.
    let mut current: Option<Impact> = None;
    for group in &results.groups {
        if current != Some(group.impact) {
            current = Some(group.impact);
            let count = results
                .groups
                .iter()
                .filter(|g| g.impact == group.impact)
                .count();
            out.push_str(&format!("## {} ({})\n\n", capitalize(&group.impact.to_string()), count));
        }
        out.push_str(&format!(
            "### {}: {} [docs]({})\n",
            group.rule_id,
            escape_html(&group.title),
            group.help_url
        ));
        out.push_str(&format!("{}\n", escape_html(&group.description)));
        for node in &group.nodes {
            out.push_str(&format!(
                "    Selector: {}\n    HTML: {}\n",
                escape_html(&node.selector_path),
                escape_html(&node.html)
            ));
        }
        out.push('\n');
    }
    out
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
