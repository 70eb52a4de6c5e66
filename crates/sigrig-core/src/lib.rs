// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # sigrig-core
//!
//! Core abstractions and shared types for the SIGRIG signal test rig.
//!
//! This crate provides the foundational types used across all SIGRIG
//! components:
//!
//! - **Value**: Tagged value union carried by every signal read and write
//! - **Domain**: Test plans, cases, runs, results, and signal snapshots
//! - **Store**: Plan/run persistence with optimistic plan versioning
//! - **Cancel**: Cooperative cancellation token for long-running operations
//!
//! ## Example
//!
//! ```rust,ignore
//! use sigrig_core::domain::{TestCase, TestPlan};
//! use sigrig_core::store::{MemoryPlanStore, PlanStore};
//!
//! let plan = TestPlan::new("boiler smoke test")
//!     .with_case(TestCase::new("warmup", ["Plant/Process/State"]));
//!
//! let store = MemoryPlanStore::new();
//! store.create_plan(plan).await?;
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod cancel;
pub mod domain;
pub mod store;
pub mod value;

// =============================================================================
// Re-exports for convenience
// =============================================================================

pub use cancel::CancelToken;
pub use domain::{SignalSnapshot, TestCase, TestPlan, TestResult, TestRun};
pub use store::{MemoryPlanStore, PlanStore, StoreError};
pub use value::Value;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
