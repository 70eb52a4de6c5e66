// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Test-plan execution over a single OPC UA session.
//!
//! [`TestRunOrchestrator`] opens exactly one session per plan, runs the
//! plan's cases sequentially against it, and closes the session on every
//! exit path before the outcome is propagated. Within a case, signals are
//! read in order and the first failure stops that case; cases stay
//! independent of each other, so a failing case never aborts the rest of
//! the plan.

use std::sync::Arc;

use tracing::{debug, info, warn};

use sigrig_core::{CancelToken, SignalSnapshot, TestCase, TestPlan, TestResult, TestRun};
use sigrig_opcua::{ConnectionManager, OpcUaConfig, OpcUaError, OpcUaTransport, ValueAccessor};

use crate::error::{RunnerError, RunnerResult};

// =============================================================================
// TestRunOrchestrator
// =============================================================================

/// Executes test plans against a device, one session per plan.
pub struct TestRunOrchestrator<T: OpcUaTransport> {
    connections: ConnectionManager<T>,
    accessor: ValueAccessor<T>,
}

impl<T: OpcUaTransport> TestRunOrchestrator<T> {
    /// Creates an orchestrator over the given transport and configuration.
    pub fn new(transport: Arc<T>, config: OpcUaConfig) -> Self {
        Self {
            accessor: ValueAccessor::new(Arc::clone(&transport)),
            connections: ConnectionManager::new(transport, config),
        }
    }

    /// Returns the connection manager backing this orchestrator.
    pub fn connections(&self) -> &ConnectionManager<T> {
        &self.connections
    }

    /// Executes every case of `plan` and returns the completed run.
    ///
    /// A single session is opened for the whole plan. A case's read failure
    /// is recorded in its [`TestResult`] and execution continues with the
    /// next case; only session establishment, cancellation, and other
    /// non-recoverable conditions abort the run. The returned run always
    /// has one result per plan case.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Cancelled`] when `cancel` fires, or
    /// [`RunnerError::Protocol`] when no session can be established. The
    /// session is closed before either is propagated.
    pub async fn execute_plan(
        &self,
        plan: &TestPlan,
        cancel: &CancelToken,
    ) -> RunnerResult<TestRun> {
        info!(
            plan = %plan.name,
            version = plan.version,
            cases = plan.cases.len(),
            "Executing test plan"
        );

        let mut run = TestRun::started(plan);
        let session = self.connections.connect(cancel).await?;

        // Capture the outcome first; the session is released on every exit
        // path before the outcome leaves this function.
        let outcome = self.run_cases(plan, cancel).await;

        if let Err(error) = session.close().await {
            warn!(error = %error, "Session close after test run failed");
        }

        run.results = outcome?;
        run.finish();

        info!(
            run = %run.id,
            passed = run.all_passed(),
            cases = run.results.len(),
            "Test plan execution finished"
        );
        Ok(run)
    }

    async fn run_cases(
        &self,
        plan: &TestPlan,
        cancel: &CancelToken,
    ) -> RunnerResult<Vec<TestResult>> {
        let mut results = Vec::with_capacity(plan.cases.len());
        for case in &plan.cases {
            results.push(self.run_case(case, cancel).await?);
        }
        Ok(results)
    }

    /// Reads a case's required signals in order, fail-fast on the first
    /// unreadable signal.
    async fn run_case(&self, case: &TestCase, cancel: &CancelToken) -> RunnerResult<TestResult> {
        debug!(
            case = %case.name,
            signals = case.required_signals.len(),
            "Running test case"
        );

        let mut snapshots = Vec::new();
        for signal in &case.required_signals {
            match self.accessor.read_by_path(signal, cancel).await {
                Ok(value) => {
                    debug!(signal = %signal, value = %value, "Signal read");
                    snapshots.push(SignalSnapshot::capture(signal, value));
                }
                Err(error @ OpcUaError::Cancelled) => return Err(error.into()),
                Err(error) => {
                    let message = format!("Signal {} read failed: {}", signal, error);
                    warn!(case = %case.name, signal = %signal, "Test case failed");
                    return Ok(TestResult::failed(case.id, message, snapshots));
                }
            }
        }

        Ok(TestResult::passed(case.id, snapshots))
    }
}

impl<T: OpcUaTransport> std::fmt::Debug for TestRunOrchestrator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestRunOrchestrator").finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
