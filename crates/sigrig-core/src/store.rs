// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Persisted-entity store for test plans and runs.
//!
//! The execution layer consumes this as a collaborator: it loads the plan to
//! execute and records the finished run. Plan updates use optimistic
//! versioning: the caller presents the version it edited, the store rejects
//! the update if someone else got there first, and every successful update
//! increments [`TestPlan::version`] by one.
//!
//! [`MemoryPlanStore`] is the reference implementation; production
//! deployments put a database behind the same trait.

use std::collections::HashMap;
use std::fmt::Debug;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{TestPlan, TestRun};

// =============================================================================
// StoreError
// =============================================================================

/// Errors from plan/run storage.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No plan with the given id.
    #[error("Test plan '{plan_id}' not found")]
    PlanNotFound {
        /// The missing plan id.
        plan_id: Uuid,
    },

    /// No run with the given id.
    #[error("Test run '{run_id}' not found")]
    RunNotFound {
        /// The missing run id.
        run_id: Uuid,
    },

    /// Optimistic concurrency check failed on plan update.
    #[error("Version conflict on plan '{plan_id}': expected {expected}, stored is {actual}")]
    VersionConflict {
        /// The plan being updated.
        plan_id: Uuid,
        /// Version the caller edited.
        expected: u32,
        /// Version currently stored.
        actual: u32,
    },

    /// A plan with the same id already exists.
    #[error("Test plan '{plan_id}' already exists")]
    DuplicatePlan {
        /// The conflicting plan id.
        plan_id: Uuid,
    },
}

impl StoreError {
    /// Creates a plan-not-found error.
    pub fn plan_not_found(plan_id: Uuid) -> Self {
        Self::PlanNotFound { plan_id }
    }

    /// Creates a run-not-found error.
    pub fn run_not_found(run_id: Uuid) -> Self {
        Self::RunNotFound { run_id }
    }

    /// Creates a version conflict error.
    pub fn version_conflict(plan_id: Uuid, expected: u32, actual: u32) -> Self {
        Self::VersionConflict {
            plan_id,
            expected,
            actual,
        }
    }
}

// =============================================================================
// PlanStore
// =============================================================================

/// Storage abstraction over test plans and runs.
#[async_trait]
pub trait PlanStore: Send + Sync + Debug {
    /// Stores a new plan.
    ///
    /// Fails with [`StoreError::DuplicatePlan`] if the id is taken.
    async fn create_plan(&self, plan: TestPlan) -> Result<(), StoreError>;

    /// Fetches a plan by id.
    async fn get_plan(&self, plan_id: Uuid) -> Result<TestPlan, StoreError>;

    /// Updates a plan with an optimistic version check.
    ///
    /// `plan.version` must equal the stored version; on success the stored
    /// copy gets `version + 1`. Returns the new version.
    async fn update_plan(&self, plan: TestPlan) -> Result<u32, StoreError>;

    /// Deletes a plan.
    async fn delete_plan(&self, plan_id: Uuid) -> Result<(), StoreError>;

    /// Records a completed run.
    async fn insert_run(&self, run: TestRun) -> Result<(), StoreError>;

    /// Fetches a run by id.
    async fn get_run(&self, run_id: Uuid) -> Result<TestRun, StoreError>;

    /// Lists runs recorded for a plan, oldest first.
    async fn runs_for_plan(&self, plan_id: Uuid) -> Result<Vec<TestRun>, StoreError>;
}

// =============================================================================
// MemoryPlanStore
// =============================================================================

/// In-memory [`PlanStore`] over read-write-locked maps.
#[derive(Debug, Default)]
pub struct MemoryPlanStore {
    plans: RwLock<HashMap<Uuid, TestPlan>>,
    runs: RwLock<Vec<TestRun>>,
}

impl MemoryPlanStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored plans.
    pub async fn plan_count(&self) -> usize {
        self.plans.read().await.len()
    }
}

#[async_trait]
impl PlanStore for MemoryPlanStore {
    async fn create_plan(&self, plan: TestPlan) -> Result<(), StoreError> {
        let mut plans = self.plans.write().await;
        if plans.contains_key(&plan.id) {
            return Err(StoreError::DuplicatePlan { plan_id: plan.id });
        }
        plans.insert(plan.id, plan);
        Ok(())
    }

    async fn get_plan(&self, plan_id: Uuid) -> Result<TestPlan, StoreError> {
        let plans = self.plans.read().await;
        plans
            .get(&plan_id)
            .cloned()
            .ok_or_else(|| StoreError::plan_not_found(plan_id))
    }

    async fn update_plan(&self, plan: TestPlan) -> Result<u32, StoreError> {
        let mut plans = self.plans.write().await;
        let stored = plans
            .get_mut(&plan.id)
            .ok_or_else(|| StoreError::plan_not_found(plan.id))?;

        if stored.version != plan.version {
            return Err(StoreError::version_conflict(
                plan.id,
                plan.version,
                stored.version,
            ));
        }

        *stored = TestPlan {
            version: plan.version + 1,
            ..plan
        };
        Ok(stored.version)
    }

    async fn delete_plan(&self, plan_id: Uuid) -> Result<(), StoreError> {
        let mut plans = self.plans.write().await;
        plans
            .remove(&plan_id)
            .map(|_| ())
            .ok_or_else(|| StoreError::plan_not_found(plan_id))
    }

    async fn insert_run(&self, run: TestRun) -> Result<(), StoreError> {
        let mut runs = self.runs.write().await;
        runs.push(run);
        Ok(())
    }

    async fn get_run(&self, run_id: Uuid) -> Result<TestRun, StoreError> {
        let runs = self.runs.read().await;
        runs.iter()
            .find(|r| r.id == run_id)
            .cloned()
            .ok_or_else(|| StoreError::run_not_found(run_id))
    }

    async fn runs_for_plan(&self, plan_id: Uuid) -> Result<Vec<TestRun>, StoreError> {
        let runs = self.runs.read().await;
        Ok(runs.iter().filter(|r| r.plan_id == plan_id).cloned().collect())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TestCase;

    fn sample_plan() -> TestPlan {
        TestPlan::new("boiler").with_case(TestCase::new("warmup", ["Plant/Process/State"]))
    }

    #[tokio::test]
    async fn test_create_and_get_plan() {
        let store = MemoryPlanStore::new();
        let plan = sample_plan();
        let id = plan.id;

        store.create_plan(plan).await.unwrap();
        let loaded = store.get_plan(id).await.unwrap();
        assert_eq!(loaded.name, "boiler");
        assert_eq!(loaded.version, 1);
    }

    #[tokio::test]
    async fn test_duplicate_create_rejected() {
        let store = MemoryPlanStore::new();
        let plan = sample_plan();

        store.create_plan(plan.clone()).await.unwrap();
        let err = store.create_plan(plan).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicatePlan { .. }));
    }

    #[tokio::test]
    async fn test_update_increments_version() {
        let store = MemoryPlanStore::new();
        let plan = sample_plan();
        let id = plan.id;
        store.create_plan(plan.clone()).await.unwrap();

        let mut edited = plan;
        edited.name = "boiler v2".to_string();
        let new_version = store.update_plan(edited).await.unwrap();
        assert_eq!(new_version, 2);

        let loaded = store.get_plan(id).await.unwrap();
        assert_eq!(loaded.name, "boiler v2");
        assert_eq!(loaded.version, 2);
    }

    #[tokio::test]
    async fn test_stale_update_conflicts_and_leaves_plan_unchanged() {
        let store = MemoryPlanStore::new();
        let plan = sample_plan();
        let id = plan.id;
        store.create_plan(plan.clone()).await.unwrap();

        // First editor wins.
        store.update_plan(plan.clone()).await.unwrap();

        // Second editor still holds version 1.
        let mut stale = plan;
        stale.name = "lost update".to_string();
        let err = store.update_plan(stale).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::VersionConflict {
                expected: 1,
                actual: 2,
                ..
            }
        ));

        let loaded = store.get_plan(id).await.unwrap();
        assert_ne!(loaded.name, "lost update");
        assert_eq!(loaded.version, 2);
    }

    #[tokio::test]
    async fn test_runs_for_plan_filters_and_orders() {
        let store = MemoryPlanStore::new();
        let plan_a = sample_plan();
        let plan_b = sample_plan();

        let run_a1 = TestRun::started(&plan_a);
        let run_b = TestRun::started(&plan_b);
        let run_a2 = TestRun::started(&plan_a);

        store.insert_run(run_a1.clone()).await.unwrap();
        store.insert_run(run_b).await.unwrap();
        store.insert_run(run_a2.clone()).await.unwrap();

        let runs = store.runs_for_plan(plan_a.id).await.unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].id, run_a1.id);
        assert_eq!(runs[1].id, run_a2.id);
    }

    #[tokio::test]
    async fn test_missing_lookups() {
        let store = MemoryPlanStore::new();
        assert!(matches!(
            store.get_plan(Uuid::new_v4()).await.unwrap_err(),
            StoreError::PlanNotFound { .. }
        ));
        assert!(matches!(
            store.get_run(Uuid::new_v4()).await.unwrap_err(),
            StoreError::RunNotFound { .. }
        ));
    }
}
