// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Store-backed run execution.
//!
//! [`RunService`] ties a [`TestRunOrchestrator`] to a [`PlanStore`]: it
//! fetches the plan, executes it, and records the completed run before
//! handing it back to the caller.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use sigrig_core::{CancelToken, PlanStore, TestRun};
use sigrig_opcua::OpcUaTransport;

use crate::error::RunnerResult;
use crate::orchestrator::TestRunOrchestrator;

// =============================================================================
// RunService
// =============================================================================

/// Executes stored test plans and records their runs.
pub struct RunService<T: OpcUaTransport, S> {
    orchestrator: TestRunOrchestrator<T>,
    store: Arc<S>,
}

impl<T: OpcUaTransport, S> std::fmt::Debug for RunService<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunService").finish_non_exhaustive()
    }
}

impl<T: OpcUaTransport, S: PlanStore> RunService<T, S> {
    /// Creates a service over an orchestrator and a plan store.
    pub fn new(orchestrator: TestRunOrchestrator<T>, store: Arc<S>) -> Self {
        Self { orchestrator, store }
    }

    /// Returns the backing plan store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Fetches `plan_id` from the store, executes it, and records the run.
    ///
    /// The recorded run and the returned run are the same value, so callers
    /// can inspect results without a second store round trip.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Store`](crate::RunnerError::Store) when the
    /// plan does not exist or the run cannot be recorded, and the
    /// orchestrator's own errors otherwise.
    pub async fn execute_plan_by_id(
        &self,
        plan_id: Uuid,
        cancel: &CancelToken,
    ) -> RunnerResult<TestRun> {
        let plan = self.store.get_plan(plan_id).await?;
        let run = self.orchestrator.execute_plan(&plan, cancel).await?;

        self.store.insert_run(run.clone()).await?;
        info!(run = %run.id, plan = %plan.name, "Test run recorded");

        Ok(run)
    }
}
