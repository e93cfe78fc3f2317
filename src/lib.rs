// SPDX-License-Identifier: PMPL-1.0-or-later
//! Audit Relay - Accessibility Audit Orchestration and Results Pipeline
//!
//! This crate coordinates accessibility audits of a live document: it
//! sequences injection of a scanning engine into the inspected document,
//! triggers the scan, and relays the structured result across isolated
//! execution contexts (a privileged coordinator, a panel surface, and a
//! popup surface) for display, filtering, and export.
//!
//! ## Architecture
//!
//! Data flows one direction per audit cycle:
//!
//! ```text
//! Presenter --(start)--> Coordinator --(inject)--> Scan Invoker
//!     ^                                                 |
//!     +------(broadcast ScanOutcome)--- Coordinator <---+
//! ```
//!
//! - [`coordinator::Coordinator`] owns the one-audit-at-a-time lifecycle
//!   per inspected tab and never blocks its caller.
//! - [`engine::invoke`] is the scan invoker that runs against the engine
//!   seam and always returns a serializable [`violation::ScanOutcome`].
//! - [`presenter::Presenter`] normalizes, sorts, filters, and renders
//!   violations; two independent surfaces share one contract.
//! - [`inspect::InspectionBridge`] dispatches element-inspection requests
//!   with selector values neutralized against injection.
//!
//! Everything that crosses the [`bus::MessageBus`] is a plain serializable
//! value; nothing is allowed to panic across that boundary.

pub mod bus;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod export;
pub mod inspect;
pub mod presenter;
pub mod violation;

pub use bus::{Message, MessageBus, Subscription};
pub use config::{AuditConfiguration, ResultType, RuleSelection};
pub use coordinator::{
    AuditPhase, AuditRequest, Coordinator, InjectionPayload, Injector, StartDisposition, TabId,
};
pub use engine::{invoke, RawEngineResults, ScanEngine};
pub use export::ExportReport;
pub use inspect::{ElementHost, InspectionBridge};
pub use presenter::{Presenter, SessionView, Surface};
pub use violation::{Impact, ImpactFilter, ScanOutcome, Violation, ViolationNode, ViolationSet};

use thiserror::Error;

/// Errors from audit relay operations
#[derive(Error, Debug)]
pub enum RelayError {
    /// The scanning engine was not present in the inspected document.
    #[error("engine not available")]
    EngineUnavailable,

    /// The host refused or failed to inject code into the target.
    #[error("injection failed: {0}")]
    Injection(String),

    /// The engine was invoked but rejected or threw.
    #[error("scan failed: {0}")]
    ScanExecution(String),

    /// The inspected document changed mid-scan.
    #[error("target changed mid-scan: {0}")]
    NavigationRace(String),

    /// A pipeline payload matched neither known outcome shape.
    #[error("malformed scan outcome")]
    MalformedOutcome,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RelayError>;
