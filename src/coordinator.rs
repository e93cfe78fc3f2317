// SPDX-License-Identifier: PMPL-1.0-or-later
//! Injection coordinator
//!
//! Runs in the privileged context that can inject code into inspected
//! tabs. Per tab, an audit walks a fixed state machine:
//!
//! ```text
//! Idle -> InjectingEngine -> InjectingInvoker -> AwaitingResult -> Idle
//! ```
//!
//! Every failure edge returns to `Idle` and publishes a completion with a
//! `Failure` payload; nothing escapes the async boundary as a panic or an
//! unhandled error. The coordinator holds no scan-result state - it is
//! purely a pipeline stage between the start request and the broadcast
//! completion.
//!
//! Concurrency policy: a second start request for a tab that already has
//! an audit in flight is rejected with
//! [`StartDisposition::AlreadyRunning`]. Requests for different tabs are
//! independent and run concurrently.

use crate::bus::{Message, MessageBus};
use crate::config::AuditConfiguration;
use crate::violation::ScanOutcome;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Identifier of an inspected tab
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TabId(pub u32);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One audit request, tagging every completion with its origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRequest {
    /// Unique request id, used by presenters to drop stale completions
    pub id: Uuid,
    /// Target tab
    pub tab: TabId,
}

impl AuditRequest {
    /// New request for a target tab
    pub fn new(tab: TabId) -> Self {
        Self {
            id: Uuid::new_v4(),
            tab,
        }
    }
}

/// What the host is asked to inject
#[derive(Debug, Clone)]
pub enum InjectionPayload {
    /// The scanning engine's library code
    EngineLibrary,
    /// The scan invoker function, parameterized by configuration
    Invoker(AuditConfiguration),
}

/// Host capability to inject code into an inspected tab.
///
/// Used twice per audit: once for the engine library, once for the
/// invoker. A rejected injection (tab closed, permission denied) comes
/// back as `Err`; an invoker that ran but produced an erroring outcome
/// comes back as `Ok` with a `Failure`-shaped value. The two are kept
/// distinct so the coordinator can report the right cause.
#[async_trait]
pub trait Injector: Send + Sync {
    async fn inject(&self, tab: TabId, payload: InjectionPayload) -> Result<serde_json::Value>;
}

/// Per-tab audit lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuditPhase {
    /// No audit in flight
    Idle,
    /// Injecting the scanning engine library
    InjectingEngine,
    /// Injecting and starting the scan invoker
    InjectingInvoker,
    /// Invoker pending; waiting to extract its resolved value
    AwaitingResult,
}

/// Outcome of a start request, returned immediately
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartDisposition {
    /// Audit accepted; completion arrives later on the bus
    Started,
    /// This tab already has an audit in flight; request rejected
    AlreadyRunning,
}

/// Coordinates the one-request-at-a-time audit lifecycle per tab
#[derive(Clone)]
pub struct Coordinator {
    injector: Arc<dyn Injector>,
    bus: MessageBus,
    config: AuditConfiguration,
    tabs: Arc<Mutex<HashMap<TabId, AuditPhase>>>,
}

impl Coordinator {
    /// Create a coordinator with a fixed audit configuration
    pub fn new(injector: Arc<dyn Injector>, bus: MessageBus, config: AuditConfiguration) -> Self {
        Self {
            injector,
            bus,
            config,
            tabs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Current phase for a tab
    pub async fn phase(&self, tab: TabId) -> AuditPhase {
        self.tabs
            .lock()
            .await
            .get(&tab)
            .copied()
            .unwrap_or(AuditPhase::Idle)
    }

    /// Start an audit for a request's target tab.
    ///
    /// Returns immediately; the audit runs on a spawned task and the
    /// resulting [`ScanOutcome`] is broadcast as [`Message::Complete`]
    /// tagged with `request`. A tab in any non-idle phase rejects the
    /// request.
    pub async fn start(&self, request: AuditRequest) -> StartDisposition {
        {
            let mut tabs = self.tabs.lock().await;
            let phase = tabs.get(&request.tab).copied().unwrap_or(AuditPhase::Idle);
            if phase != AuditPhase::Idle {
                debug!(tab = %request.tab, ?phase, "start rejected, audit in flight");
                return StartDisposition::AlreadyRunning;
            }
            tabs.insert(request.tab, AuditPhase::InjectingEngine);
        }

        info!(tab = %request.tab, id = %request.id, "audit started");
        let coordinator = self.clone();
        tokio::spawn(async move {
            let payload = coordinator.execute(&request).await;
            coordinator.set_phase(request.tab, AuditPhase::Idle).await;
            coordinator.bus.send(Message::Complete { request, payload });
        });
        StartDisposition::Started
    }

    /// Subscribe to the bus and serve start requests until it closes.
    ///
    /// The subscription is established before this returns, so a start
    /// message sent after `serve` is called cannot be missed.
    pub fn serve(&self) -> JoinHandle<()> {
        let mut subscription = self.bus.subscribe();
        let coordinator = self.clone();
        tokio::spawn(async move {
            while let Some(message) = subscription.recv().await {
                if let Message::Start { request } = message {
                    if coordinator.start(request).await == StartDisposition::AlreadyRunning {
                        warn!(tab = %request.tab, "duplicate start request ignored");
                    }
                }
            }
        })
    }

    /// Run one audit through the state machine, converting every failure
    /// into a `Failure` payload.
    async fn execute(&self, request: &AuditRequest) -> ScanOutcome {
        if let Err(err) = self
            .injector
            .inject(request.tab, InjectionPayload::EngineLibrary)
            .await
        {
            warn!(tab = %request.tab, %err, "engine library injection failed");
            return ScanOutcome::failure(err.to_string());
        }
        debug!(tab = %request.tab, "engine library injected");

        self.set_phase(request.tab, AuditPhase::InjectingInvoker).await;
        let injector = Arc::clone(&self.injector);
        let config = self.config.clone();
        let tab = request.tab;
        let pending = tokio::spawn(async move {
            injector
                .inject(tab, InjectionPayload::Invoker(config))
                .await
        });

        // The injection call is running and has returned a pending
        // handle; extracting its resolved value is the AwaitingResult
        // phase.
        self.set_phase(request.tab, AuditPhase::AwaitingResult).await;
        let value = match pending.await {
            Ok(Ok(value)) => value,
            Ok(Err(err)) => {
                warn!(tab = %request.tab, %err, "invoker did not resolve");
                return ScanOutcome::failure(err.to_string());
            }
            Err(err) => {
                warn!(tab = %request.tab, %err, "invoker task aborted");
                return ScanOutcome::failure(err.to_string());
            }
        };

        match ScanOutcome::from_value(value) {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(tab = %request.tab, %err, "invoker resolved with unrecognized payload");
                ScanOutcome::failure(err.to_string())
            }
        }
    }

    async fn set_phase(&self, tab: TabId, phase: AuditPhase) {
        self.tabs.lock().await.insert(tab, phase);
        debug!(tab = %tab, ?phase, "phase transition");
    }
}
