// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Test-Run Orchestration Integration Tests
//!
//! These tests execute full plans against the in-process simulated device:
//! session lifecycle per plan, case-level failure handling, cancellation,
//! and store-backed run recording. No external server is required.
//!
//! # Running Tests
//!
//! ```bash
//! # Run all integration tests
//! cargo test -p sigrig-runner --test orchestrator_integration
//!
//! # Run a specific test
//! cargo test -p sigrig-runner --test orchestrator_integration -- test_cancel
//! ```

use std::sync::{Arc, Once};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use sigrig_core::{CancelToken, MemoryPlanStore, PlanStore, TestCase, TestPlan, Value};
use sigrig_opcua::client::{
    BrowseChild, CallResult, DataChangeNotification, KeepAliveEvent, MonitoredItemId, ReadResult,
    SubscriptionId, WriteResult,
};
use sigrig_opcua::{
    BrowseDirection, EndpointInfo, MonitoredItemSettings, NodeId, OpcUaConfig, OpcUaResult,
    OpcUaTransport, ReferenceTypeId, SimDevice, SimTransport, SubscriptionSettings,
};
use sigrig_runner::{RunService, RunnerError, TestRunOrchestrator};

// =============================================================================
// Test Setup
// =============================================================================

const TEST_ENDPOINT: &str = "opc.tcp://localhost:4840";

static INIT: Once = Once::new();

/// Initialize test logging once per test binary.
fn init_test_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("warn,sigrig=debug")),
            )
            .with_test_writer()
            .init();
    });
}

fn test_config() -> OpcUaConfig {
    OpcUaConfig::builder()
        .endpoint(TEST_ENDPOINT)
        .retry_delay(Duration::from_millis(10))
        .build()
        .expect("Valid test configuration")
}

/// Creates an orchestrator over the default plant.
async fn plant_orchestrator() -> (
    SimDevice,
    Arc<SimTransport>,
    TestRunOrchestrator<SimTransport>,
) {
    init_test_logging();
    let device = SimDevice::with_default_plant(TEST_ENDPOINT).await;
    let transport = Arc::new(SimTransport::new(device.clone()));
    let orchestrator = TestRunOrchestrator::new(Arc::clone(&transport), test_config());
    (device, transport, orchestrator)
}

// =============================================================================
// Plan Execution
// =============================================================================

#[tokio::test]
async fn test_run_has_one_result_per_case() {
    let (_device, _transport, orchestrator) = plant_orchestrator().await;

    let plan = TestPlan::new("plant smoke test")
        .with_case(TestCase::new("process state", ["Objects/Plant/Process/State"]))
        .with_case(TestCase::new("flow reading", ["ns=2;s=Plant/Analog/Flow"]))
        .with_case(TestCase::new("valve position", ["ns=2;s=Plant/Digital/ValveOpen"]));

    let run = orchestrator
        .execute_plan(&plan, &CancelToken::new())
        .await
        .expect("Plan execution failed");

    assert_eq!(run.results.len(), plan.cases.len());
    assert!(run.all_passed());
    assert_eq!(run.plan_id, plan.id);
    assert!(run.ended_at.is_some(), "Finished run must carry an end time");

    // Results line up with the plan's cases, in plan order.
    for (result, case) in run.results.iter().zip(&plan.cases) {
        assert_eq!(result.case_id, case.id);
        assert!(result.message.is_none());
    }

    let first = &run.results[0].snapshots[0];
    assert_eq!(first.signal_name, "Objects/Plant/Process/State");
    assert_eq!(first.value, Value::String("Idle".into()));
}

#[tokio::test]
async fn test_empty_case_passes_with_no_snapshots() {
    let (_device, _transport, orchestrator) = plant_orchestrator().await;

    let plan =
        TestPlan::new("empty case").with_case(TestCase::new("no signals", Vec::<String>::new()));

    let run = orchestrator
        .execute_plan(&plan, &CancelToken::new())
        .await
        .expect("Plan execution failed");

    assert_eq!(run.results.len(), 1);
    assert!(run.results[0].passed);
    assert!(run.results[0].snapshots.is_empty());
}

#[tokio::test]
async fn test_run_snapshots_plan_version() {
    let (_device, _transport, orchestrator) = plant_orchestrator().await;

    let mut plan =
        TestPlan::new("versioned").with_case(TestCase::new("flow", ["ns=2;s=Plant/Analog/Flow"]));
    plan.version = 7;

    let run = orchestrator
        .execute_plan(&plan, &CancelToken::new())
        .await
        .expect("Plan execution failed");

    assert_eq!(run.plan_version, 7);
}

#[tokio::test]
async fn test_one_session_covers_the_whole_plan() {
    let (device, transport, orchestrator) = plant_orchestrator().await;

    let plan = TestPlan::new("session reuse")
        .with_case(TestCase::new("first", ["ns=2;s=Plant/Analog/Flow"]))
        .with_case(TestCase::new("second", ["ns=2;s=Plant/Process/State"]))
        .with_case(TestCase::new("third", ["ns=2;s=Plant/Digital/ValveOpen"]));

    orchestrator
        .execute_plan(&plan, &CancelToken::new())
        .await
        .expect("Plan execution failed");

    assert_eq!(device.connect_attempts(), 1, "Plan must reuse one session");
    assert!(
        !transport.is_connected(),
        "Session must be closed after the run"
    );
}

// =============================================================================
// Case Failure Handling
// =============================================================================

#[tokio::test]
async fn test_failing_signal_keeps_earlier_snapshots() {
    let (device, _transport, orchestrator) = plant_orchestrator().await;

    let state = SimDevice::node_id("Plant/Process/State");
    assert!(device.set_value(&state, Value::String("42".into())).await);

    let plan = TestPlan::new("partial case").with_case(TestCase::new(
        "state then missing",
        ["ns=2;s=Plant/Process/State", "ns=2;s=Plant/Missing"],
    ));

    let run = orchestrator
        .execute_plan(&plan, &CancelToken::new())
        .await
        .expect("Case failures must not abort the run");

    let result = &run.results[0];
    assert!(!result.passed);
    assert!(!run.all_passed());

    // Signals read before the failure stay recorded.
    assert_eq!(result.snapshots.len(), 1);
    assert_eq!(result.snapshots[0].signal_name, "ns=2;s=Plant/Process/State");
    assert_eq!(result.snapshots[0].value, Value::String("42".into()));

    let message = result.message.as_deref().expect("Failed case needs a message");
    assert!(
        message.starts_with("Signal ns=2;s=Plant/Missing read failed:"),
        "Unexpected message: {message}"
    );
    assert!(message.contains("BadNodeIdUnknown"));
}

#[tokio::test]
async fn test_failing_case_does_not_abort_the_plan() {
    let (_device, transport, orchestrator) = plant_orchestrator().await;

    let plan = TestPlan::new("independent cases")
        .with_case(TestCase::new("broken", ["ns=2;s=Plant/Missing"]))
        .with_case(TestCase::new("healthy", ["ns=2;s=Plant/Analog/Flow"]));

    let run = orchestrator
        .execute_plan(&plan, &CancelToken::new())
        .await
        .expect("Plan execution failed");

    assert_eq!(run.results.len(), 2);
    assert!(!run.results[0].passed);
    assert!(run.results[1].passed, "Later cases must still run");
    assert_eq!(run.results[1].snapshots.len(), 1);
    assert!(!transport.is_connected());
}

// =============================================================================
// Session Establishment
// =============================================================================

#[tokio::test]
async fn test_connect_failure_propagates_as_protocol_error() {
    init_test_logging();
    let device = SimDevice::with_default_plant(TEST_ENDPOINT).await;
    device.fail_next_connects(5);

    let transport = Arc::new(SimTransport::new(device.clone()));
    let config = OpcUaConfig::builder()
        .endpoint(TEST_ENDPOINT)
        .max_retries(2)
        .retry_delay(Duration::from_millis(10))
        .build()
        .expect("Valid test configuration");
    let orchestrator = TestRunOrchestrator::new(Arc::clone(&transport), config);

    let plan =
        TestPlan::new("unreachable").with_case(TestCase::new("flow", ["ns=2;s=Plant/Analog/Flow"]));

    let error = orchestrator
        .execute_plan(&plan, &CancelToken::new())
        .await
        .expect_err("Session establishment failure must propagate");

    assert!(matches!(error, RunnerError::Protocol(_)));
    assert_eq!(error.category(), "protocol");
    assert!(error.to_string().contains("after 2 attempts"));
    assert_eq!(device.connect_attempts(), 2);
}

// =============================================================================
// Cancellation
// =============================================================================

/// Transport wrapper that delays reads, opening a window to cancel mid-plan.
struct SlowReadTransport {
    inner: SimTransport,
}

#[async_trait]
impl OpcUaTransport for SlowReadTransport {
    async fn discover_endpoints(&self) -> OpcUaResult<Vec<EndpointInfo>> {
        self.inner.discover_endpoints().await
    }

    async fn connect(&self, endpoint: &EndpointInfo) -> OpcUaResult<()> {
        self.inner.connect(endpoint).await
    }

    async fn disconnect(&self) -> OpcUaResult<()> {
        self.inner.disconnect().await
    }

    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    fn endpoint(&self) -> &str {
        self.inner.endpoint()
    }

    async fn namespaces(&self) -> OpcUaResult<Vec<String>> {
        self.inner.namespaces().await
    }

    async fn read_value(&self, node_id: &NodeId) -> OpcUaResult<ReadResult> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.inner.read_value(node_id).await
    }

    async fn read_values(&self, node_ids: &[NodeId]) -> OpcUaResult<Vec<ReadResult>> {
        self.inner.read_values(node_ids).await
    }

    async fn write_value(&self, node_id: &NodeId, value: Value) -> OpcUaResult<WriteResult> {
        self.inner.write_value(node_id, value).await
    }

    async fn browse(
        &self,
        node_id: &NodeId,
        direction: BrowseDirection,
        reference_type: ReferenceTypeId,
        node_class_mask: u32,
    ) -> OpcUaResult<Vec<BrowseChild>> {
        self.inner
            .browse(node_id, direction, reference_type, node_class_mask)
            .await
    }

    async fn call_method(
        &self,
        object_id: &NodeId,
        method_id: &NodeId,
        input_arguments: Vec<Value>,
    ) -> OpcUaResult<CallResult> {
        self.inner
            .call_method(object_id, method_id, input_arguments)
            .await
    }

    async fn create_subscription(
        &self,
        settings: &SubscriptionSettings,
    ) -> OpcUaResult<SubscriptionId> {
        self.inner.create_subscription(settings).await
    }

    async fn delete_subscription(&self, subscription_id: SubscriptionId) -> OpcUaResult<()> {
        self.inner.delete_subscription(subscription_id).await
    }

    async fn create_monitored_items(
        &self,
        subscription_id: SubscriptionId,
        node_ids: &[NodeId],
        settings: &MonitoredItemSettings,
    ) -> OpcUaResult<Vec<MonitoredItemId>> {
        self.inner
            .create_monitored_items(subscription_id, node_ids, settings)
            .await
    }

    async fn delete_monitored_items(
        &self,
        subscription_id: SubscriptionId,
        monitored_item_ids: &[MonitoredItemId],
    ) -> OpcUaResult<()> {
        self.inner
            .delete_monitored_items(subscription_id, monitored_item_ids)
            .await
    }

    fn data_changes(&self) -> broadcast::Receiver<DataChangeNotification> {
        self.inner.data_changes()
    }

    fn keepalives(&self) -> broadcast::Receiver<KeepAliveEvent> {
        self.inner.keepalives()
    }
}

#[tokio::test]
async fn test_cancel_mid_plan_closes_the_session() {
    init_test_logging();
    let device = SimDevice::with_default_plant(TEST_ENDPOINT).await;
    let transport = Arc::new(SlowReadTransport {
        inner: SimTransport::new(device.clone()),
    });
    let orchestrator = TestRunOrchestrator::new(Arc::clone(&transport), test_config());

    let plan = TestPlan::new("cancel drill").with_case(TestCase::new(
        "slow reads",
        ["ns=2;s=Plant/Analog/Flow", "ns=2;s=Plant/Process/State"],
    ));

    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let error = orchestrator
        .execute_plan(&plan, &cancel)
        .await
        .expect_err("Cancelled run must not produce a result");

    assert!(error.is_cancelled());
    assert!(matches!(error, RunnerError::Cancelled));
    assert!(
        !transport.is_connected(),
        "Session must be closed on cancellation"
    );
    assert_eq!(device.connect_attempts(), 1);
}

#[tokio::test]
async fn test_cancelled_before_start_never_opens_a_session() {
    let (device, transport, orchestrator) = plant_orchestrator().await;

    let plan =
        TestPlan::new("never runs").with_case(TestCase::new("flow", ["ns=2;s=Plant/Analog/Flow"]));

    let cancel = CancelToken::new();
    cancel.cancel();

    let error = orchestrator
        .execute_plan(&plan, &cancel)
        .await
        .expect_err("Pre-cancelled run must abort");

    assert!(error.is_cancelled());
    assert_eq!(device.connect_attempts(), 0);
    assert!(!transport.is_connected());
}

// =============================================================================
// Run Recording
// =============================================================================

#[tokio::test]
async fn test_run_service_records_the_completed_run() {
    let (_device, _transport, orchestrator) = plant_orchestrator().await;

    let plan = TestPlan::new("recorded plan")
        .with_case(TestCase::new("flow", ["ns=2;s=Plant/Analog/Flow"]));
    let plan_id = plan.id;

    let store = Arc::new(MemoryPlanStore::new());
    store.create_plan(plan).await.expect("Failed to store plan");

    let service = RunService::new(orchestrator, store);
    let run = service
        .execute_plan_by_id(plan_id, &CancelToken::new())
        .await
        .expect("Plan execution failed");

    assert!(run.all_passed());
    assert_eq!(run.plan_id, plan_id);

    let recorded = service
        .store()
        .runs_for_plan(plan_id)
        .await
        .expect("Failed to list runs");
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].id, run.id);
    assert_eq!(recorded[0].results.len(), 1);
}

#[tokio::test]
async fn test_run_service_reports_missing_plan_as_store_error() {
    let (device, _transport, orchestrator) = plant_orchestrator().await;

    let service = RunService::new(orchestrator, Arc::new(MemoryPlanStore::new()));
    let error = service
        .execute_plan_by_id(Uuid::new_v4(), &CancelToken::new())
        .await
        .expect_err("Unknown plan must fail");

    assert!(matches!(error, RunnerError::Store(_)));
    assert_eq!(error.category(), "store");
    assert_eq!(
        device.connect_attempts(),
        0,
        "Plan lookup must precede session establishment"
    );
}
