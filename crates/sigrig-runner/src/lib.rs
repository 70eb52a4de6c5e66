// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # sigrig-runner
//!
//! Test-plan execution layer for the SIGRIG signal test rig.
//!
//! This crate turns stored test plans into recorded test runs:
//!
//! - **Orchestrator**: Runs a plan's cases over a single OPC UA session,
//!   capturing signal snapshots and fail-fast case results
//! - **Service**: Store-backed entry point that fetches a plan, executes
//!   it, and records the completed run
//! - **Error**: Runner error type separating protocol, store, and
//!   cancellation outcomes
//!
//! ## Example
//!
//! ```rust,ignore
//! use sigrig_core::{CancelToken, MemoryPlanStore};
//! use sigrig_opcua::{OpcUaConfig, SimDevice, SimTransport};
//! use sigrig_runner::{RunService, TestRunOrchestrator};
//!
//! let device = SimDevice::with_default_plant("opc.tcp://localhost:4840").await;
//! let transport = Arc::new(SimTransport::new(device));
//! let config = OpcUaConfig::builder()
//!     .endpoint("opc.tcp://localhost:4840")
//!     .build()?;
//!
//! let orchestrator = TestRunOrchestrator::new(transport, config);
//! let service = RunService::new(orchestrator, Arc::new(MemoryPlanStore::new()));
//!
//! let run = service.execute_plan_by_id(plan_id, &CancelToken::new()).await?;
//! println!("passed: {}", run.all_passed());
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

// =============================================================================
// Modules
// =============================================================================

pub mod error;
pub mod orchestrator;
pub mod service;

// =============================================================================
// Re-exports for convenience
// =============================================================================

pub use error::{RunnerError, RunnerResult};
pub use orchestrator::TestRunOrchestrator;
pub use service::RunService;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
