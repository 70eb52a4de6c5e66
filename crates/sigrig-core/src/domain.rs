// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Test-plan domain entities.
//!
//! A [`TestPlan`] is an ordered list of [`TestCase`]s, each naming the
//! signals it asserts on. Executing a plan produces an immutable [`TestRun`]
//! holding one [`TestResult`] per case with the [`SignalSnapshot`]s captured
//! along the way. Plans are created and edited externally; runs are created
//! by the execution layer and never mutated afterward.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::value::Value;

// =============================================================================
// TestPlan / TestCase
// =============================================================================

/// A declarative plan of test cases against device signals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestPlan {
    /// Unique plan identifier.
    pub id: Uuid,

    /// Human-readable plan name.
    pub name: String,

    /// Monotonic version, incremented by the store on every update.
    ///
    /// Runs snapshot the version they executed against, so a recorded run
    /// stays attributable to the exact plan revision it saw.
    pub version: u32,

    /// Ordered test cases.
    pub cases: Vec<TestCase>,
}

impl TestPlan {
    /// Creates a new plan at version 1 with no cases.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            version: 1,
            cases: Vec::new(),
        }
    }

    /// Appends a case, preserving plan order.
    pub fn with_case(mut self, case: TestCase) -> Self {
        self.cases.push(case);
        self
    }
}

/// One test case: an ordered list of required signals to read and record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCase {
    /// Unique case identifier.
    pub id: Uuid,

    /// Human-readable case name.
    pub name: String,

    /// Free-form description.
    #[serde(default)]
    pub description: String,

    /// Signal references, each a browse path or a literal address string.
    #[serde(default)]
    pub required_signals: Vec<String>,
}

impl TestCase {
    /// Creates a case with the given required signals.
    pub fn new(
        name: impl Into<String>,
        required_signals: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: String::new(),
            required_signals: required_signals.into_iter().map(Into::into).collect(),
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

// =============================================================================
// TestRun / TestResult / SignalSnapshot
// =============================================================================

/// The record of one plan execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestRun {
    /// Unique run identifier.
    pub id: Uuid,

    /// The executed plan.
    pub plan_id: Uuid,

    /// Plan version at execution time.
    pub plan_version: u32,

    /// Execution start time.
    pub started_at: DateTime<Utc>,

    /// Execution end time; `None` until the run completes.
    pub ended_at: Option<DateTime<Utc>>,

    /// One result per plan case, in plan order.
    pub results: Vec<TestResult>,
}

impl TestRun {
    /// Starts a run record for the given plan.
    pub fn started(plan: &TestPlan) -> Self {
        Self {
            id: Uuid::new_v4(),
            plan_id: plan.id,
            plan_version: plan.version,
            started_at: Utc::now(),
            ended_at: None,
            results: Vec::with_capacity(plan.cases.len()),
        }
    }

    /// Marks the run complete.
    pub fn finish(&mut self) {
        self.ended_at = Some(Utc::now());
    }

    /// Returns `true` when every case passed.
    pub fn all_passed(&self) -> bool {
        self.results.iter().all(|r| r.passed)
    }
}

/// The verdict for one test case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    /// Unique result identifier.
    pub id: Uuid,

    /// The case this result belongs to.
    pub case_id: Uuid,

    /// Verdict.
    pub passed: bool,

    /// Failure description; `None` on pass.
    pub message: Option<String>,

    /// When the verdict was recorded.
    pub timestamp: DateTime<Utc>,

    /// Snapshots of every signal read successfully before the first failure.
    pub snapshots: Vec<SignalSnapshot>,
}

impl TestResult {
    /// Records a passing result.
    pub fn passed(case_id: Uuid, snapshots: Vec<SignalSnapshot>) -> Self {
        Self {
            id: Uuid::new_v4(),
            case_id,
            passed: true,
            message: None,
            timestamp: Utc::now(),
            snapshots,
        }
    }

    /// Records a failing result with the snapshots gathered so far.
    pub fn failed(
        case_id: Uuid,
        message: impl Into<String>,
        snapshots: Vec<SignalSnapshot>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            case_id,
            passed: false,
            message: Some(message.into()),
            timestamp: Utc::now(),
            snapshots,
        }
    }
}

/// One observed signal value with its capture time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalSnapshot {
    /// Unique snapshot identifier.
    pub id: Uuid,

    /// The signal reference as given in the test case.
    pub signal_name: String,

    /// The observed value.
    pub value: Value,

    /// Capture time.
    pub timestamp: DateTime<Utc>,
}

impl SignalSnapshot {
    /// Captures a snapshot at the current time.
    pub fn capture(signal_name: impl Into<String>, value: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            signal_name: signal_name.into(),
            value,
            timestamp: Utc::now(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_starts_at_version_one() {
        let plan = TestPlan::new("pump station");
        assert_eq!(plan.version, 1);
        assert!(plan.cases.is_empty());
    }

    #[test]
    fn test_run_snapshots_plan_version() {
        let mut plan = TestPlan::new("pump station");
        plan.version = 7;

        let run = TestRun::started(&plan);
        assert_eq!(run.plan_id, plan.id);
        assert_eq!(run.plan_version, 7);
        assert!(run.ended_at.is_none());
    }

    #[test]
    fn test_run_finish_sets_end_time() {
        let plan = TestPlan::new("p");
        let mut run = TestRun::started(&plan);
        run.finish();
        assert!(run.ended_at.is_some());
        assert!(run.ended_at.unwrap() >= run.started_at);
    }

    #[test]
    fn test_result_constructors() {
        let case_id = Uuid::new_v4();

        let pass = TestResult::passed(case_id, vec![]);
        assert!(pass.passed);
        assert!(pass.message.is_none());

        let snap = SignalSnapshot::capture("Plant/Analog/Flow", Value::Float64(2.5));
        let fail = TestResult::failed(case_id, "Signal X read failed", vec![snap]);
        assert!(!fail.passed);
        assert_eq!(fail.message.as_deref(), Some("Signal X read failed"));
        assert_eq!(fail.snapshots.len(), 1);
        assert_eq!(fail.snapshots[0].value, Value::Float64(2.5));
    }

    #[test]
    fn test_all_passed() {
        let plan = TestPlan::new("p");
        let mut run = TestRun::started(&plan);
        run.results.push(TestResult::passed(Uuid::new_v4(), vec![]));
        assert!(run.all_passed());

        run.results
            .push(TestResult::failed(Uuid::new_v4(), "boom", vec![]));
        assert!(!run.all_passed());
    }

    #[test]
    fn test_plan_round_trips_through_json() {
        let plan = TestPlan::new("line 4").with_case(TestCase::new(
            "valve check",
            ["Plant/Digital/ValveOpen", "ns=2;s=Flow"],
        ));

        let json = serde_json::to_string(&plan).unwrap();
        let back: TestPlan = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, plan.id);
        assert_eq!(back.cases.len(), 1);
        assert_eq!(back.cases[0].required_signals.len(), 2);
    }
}
