// SPDX-License-Identifier: PMPL-1.0-or-later
//! Coordinator pipeline integration tests
//!
//! Exercises the full start -> inject -> invoke -> broadcast cycle with a
//! scripted host injector, including every failure edge of the state
//! machine and the per-tab concurrency policy.

use async_trait::async_trait;
use audit_relay::presenter::{Presenter, SessionView, Surface};
use audit_relay::{
    AuditConfiguration, AuditPhase, AuditRequest, Coordinator, InjectionPayload, Injector,
    Message, MessageBus, RelayError, ScanOutcome, StartDisposition, TabId,
};
use std::sync::{Arc, Mutex, OnceLock};
use tokio::time::{sleep, Duration};

/// Host injector scripted per payload kind
struct ScriptedInjector {
    /// Simulated injection latency
    delay: Duration,
    /// Error for the engine-library injection, if any
    library_error: Option<String>,
    /// Resolved value or rejection for the invoker injection
    invoker_result: Result<serde_json::Value, String>,
}

impl ScriptedInjector {
    fn resolving(value: serde_json::Value) -> Self {
        Self {
            delay: Duration::ZERO,
            library_error: None,
            invoker_result: Ok(value),
        }
    }
}

#[async_trait]
impl Injector for ScriptedInjector {
    async fn inject(
        &self,
        _tab: TabId,
        payload: InjectionPayload,
    ) -> audit_relay::Result<serde_json::Value> {
        sleep(self.delay).await;
        match payload {
            InjectionPayload::EngineLibrary => match &self.library_error {
                Some(message) => Err(RelayError::Injection(message.clone())),
                None => Ok(serde_json::Value::Null),
            },
            InjectionPayload::Invoker(_) => match &self.invoker_result {
                Ok(value) => Ok(value.clone()),
                Err(message) => Err(RelayError::NavigationRace(message.clone())),
            },
        }
    }
}

fn success_payload() -> serde_json::Value {
    serde_json::json!({
        "status": "success",
        "url": "https://example.test/",
        "timestamp": "2025-06-01T12:00:00Z",
        "violations": [],
        "incomplete": []
    })
}

fn coordinator(injector: ScriptedInjector, bus: &MessageBus) -> Coordinator {
    Coordinator::new(
        Arc::new(injector),
        bus.clone(),
        AuditConfiguration::wcag_aa(),
    )
}

async fn next_complete(
    subscription: &mut audit_relay::Subscription,
) -> (AuditRequest, ScanOutcome) {
    loop {
        match subscription.recv().await.expect("bus closed") {
            Message::Complete { request, payload } => return (request, payload),
            Message::Start { .. } => continue,
        }
    }
}

#[tokio::test]
async fn test_successful_audit_broadcasts_tagged_completion() {
    let bus = MessageBus::default();
    let coordinator = coordinator(ScriptedInjector::resolving(success_payload()), &bus);

    // Listener established before the request is issued.
    let mut subscription = bus.subscribe();
    let request = AuditRequest::new(TabId(1));
    assert_eq!(coordinator.start(request).await, StartDisposition::Started);

    let (completed, payload) = next_complete(&mut subscription).await;
    assert_eq!(completed, request);
    assert!(payload.is_success());
    assert_eq!(coordinator.phase(TabId(1)).await, AuditPhase::Idle);
}

#[tokio::test]
async fn test_library_injection_failure_returns_to_idle() {
    let bus = MessageBus::default();
    let coordinator = coordinator(
        ScriptedInjector {
            delay: Duration::ZERO,
            library_error: Some("permission denied".to_string()),
            invoker_result: Ok(success_payload()),
        },
        &bus,
    );

    let mut subscription = bus.subscribe();
    coordinator.start(AuditRequest::new(TabId(2))).await;

    let (_, payload) = next_complete(&mut subscription).await;
    assert_eq!(
        payload,
        ScanOutcome::failure("injection failed: permission denied")
    );
    assert_eq!(coordinator.phase(TabId(2)).await, AuditPhase::Idle);
}

#[tokio::test]
async fn test_invoker_rejection_becomes_failure_payload() {
    let bus = MessageBus::default();
    let coordinator = coordinator(
        ScriptedInjector {
            delay: Duration::ZERO,
            library_error: None,
            invoker_result: Err("tab navigated away".to_string()),
        },
        &bus,
    );

    let mut subscription = bus.subscribe();
    coordinator.start(AuditRequest::new(TabId(3))).await;

    let (_, payload) = next_complete(&mut subscription).await;
    assert_eq!(
        payload,
        ScanOutcome::failure("target changed mid-scan: tab navigated away")
    );
}

#[tokio::test]
async fn test_malformed_invoker_value_becomes_generic_failure() {
    let bus = MessageBus::default();
    let coordinator = coordinator(
        ScriptedInjector::resolving(serde_json::json!({"neither": "shape"})),
        &bus,
    );

    let mut subscription = bus.subscribe();
    coordinator.start(AuditRequest::new(TabId(4))).await;

    let (_, payload) = next_complete(&mut subscription).await;
    assert_eq!(payload, ScanOutcome::failure("malformed scan outcome"));
}

#[tokio::test]
async fn test_second_start_for_same_tab_is_rejected() {
    let bus = MessageBus::default();
    let coordinator = coordinator(
        ScriptedInjector {
            delay: Duration::from_millis(50),
            library_error: None,
            invoker_result: Ok(success_payload()),
        },
        &bus,
    );

    let mut subscription = bus.subscribe();
    let tab = TabId(5);
    assert_eq!(
        coordinator.start(AuditRequest::new(tab)).await,
        StartDisposition::Started
    );
    assert_ne!(coordinator.phase(tab).await, AuditPhase::Idle);
    assert_eq!(
        coordinator.start(AuditRequest::new(tab)).await,
        StartDisposition::AlreadyRunning
    );

    // Exactly one completion arrives for the tab.
    let (first, _) = next_complete(&mut subscription).await;
    assert_eq!(first.tab, tab);
    sleep(Duration::from_millis(20)).await;
    let mut drained = subscription.try_recv();
    while let Some(Message::Start { .. }) = drained {
        drained = subscription.try_recv();
    }
    assert_eq!(drained, None);

    // After completion the tab accepts a new request.
    assert_eq!(
        coordinator.start(AuditRequest::new(tab)).await,
        StartDisposition::Started
    );
}

#[tokio::test]
async fn test_different_tabs_run_concurrently() {
    let bus = MessageBus::default();
    let coordinator = coordinator(
        ScriptedInjector {
            delay: Duration::from_millis(20),
            library_error: None,
            invoker_result: Ok(success_payload()),
        },
        &bus,
    );

    let mut subscription = bus.subscribe();
    assert_eq!(
        coordinator.start(AuditRequest::new(TabId(6))).await,
        StartDisposition::Started
    );
    assert_eq!(
        coordinator.start(AuditRequest::new(TabId(7))).await,
        StartDisposition::Started
    );

    let (first, _) = next_complete(&mut subscription).await;
    let (second, _) = next_complete(&mut subscription).await;
    let mut tabs = [first.tab, second.tab];
    tabs.sort_by_key(|t| t.0);
    assert_eq!(tabs, [TabId(6), TabId(7)]);
}

#[tokio::test]
async fn test_presenter_updates_from_bus_subscription() {
    let bus = MessageBus::default();
    let coordinator = coordinator(ScriptedInjector::resolving(success_payload()), &bus);
    let _serve = coordinator.serve();

    // Listener established before the start request goes out.
    let mut presenter = Presenter::new(Surface::Panel);
    let mut subscription = bus.subscribe();
    let request = AuditRequest::new(TabId(9));
    presenter.begin_audit(&request);
    assert!(!presenter.start_enabled());
    bus.send(Message::Start { request });

    loop {
        let message = subscription.recv().await.expect("bus closed");
        presenter.on_message(&message);
        if matches!(message, Message::Complete { .. }) {
            break;
        }
    }

    assert_eq!(presenter.view(), SessionView::Clean);
    assert!(presenter.start_enabled());
}

/// Waits inside the invoker injection until the coordinator reports
/// `AwaitingResult`, proving the call is still pending when that phase
/// is recorded.
struct WaitingInjector {
    coordinator: OnceLock<Coordinator>,
    observed: Mutex<Option<AuditPhase>>,
}

#[async_trait]
impl Injector for WaitingInjector {
    async fn inject(
        &self,
        tab: TabId,
        payload: InjectionPayload,
    ) -> audit_relay::Result<serde_json::Value> {
        match payload {
            InjectionPayload::EngineLibrary => Ok(serde_json::Value::Null),
            InjectionPayload::Invoker(_) => {
                let coordinator = self.coordinator.get().expect("coordinator registered");
                for _ in 0..500 {
                    let phase = coordinator.phase(tab).await;
                    if phase == AuditPhase::AwaitingResult {
                        *self.observed.lock().unwrap() = Some(phase);
                        break;
                    }
                    sleep(Duration::from_millis(1)).await;
                }
                Ok(success_payload())
            }
        }
    }
}

#[tokio::test]
async fn test_invoker_call_pending_during_awaiting_result() {
    let bus = MessageBus::default();
    let injector = Arc::new(WaitingInjector {
        coordinator: OnceLock::new(),
        observed: Mutex::new(None),
    });
    let coordinator = Coordinator::new(
        injector.clone(),
        bus.clone(),
        AuditConfiguration::wcag_aa(),
    );
    injector
        .coordinator
        .set(coordinator.clone())
        .unwrap_or_else(|_| panic!("coordinator already registered"));

    let mut subscription = bus.subscribe();
    coordinator.start(AuditRequest::new(TabId(10))).await;

    let (_, payload) = next_complete(&mut subscription).await;
    assert!(payload.is_success());
    assert_eq!(
        *injector.observed.lock().unwrap(),
        Some(AuditPhase::AwaitingResult)
    );
}

#[tokio::test]
async fn test_serve_loop_answers_bus_start_requests() {
    let bus = MessageBus::default();
    let coordinator = coordinator(ScriptedInjector::resolving(success_payload()), &bus);
    let _serve = coordinator.serve();

    // The presenter-side subscription exists before the start is sent.
    let mut subscription = bus.subscribe();
    let request = AuditRequest::new(TabId(8));
    bus.send(Message::Start { request });

    let (completed, payload) = next_complete(&mut subscription).await;
    assert_eq!(completed, request);
    assert!(payload.is_success());
}
