// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the test-execution layer.

use sigrig_core::StoreError;
use sigrig_opcua::OpcUaError;

/// Result alias for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;

/// Top-level error type for plan execution.
///
/// Per-signal read failures never surface here; they are recorded as failed
/// test results and the plan continues. What does surface is everything the
/// plan cannot recover from: session establishment, storage, cancellation.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// Protocol-level failure below the execution layer.
    #[error("{0}")]
    Protocol(OpcUaError),

    /// Plan or run storage failure.
    #[error("{0}")]
    Store(#[from] StoreError),

    /// The run was cancelled cooperatively.
    #[error("Test run cancelled")]
    Cancelled,
}

impl From<OpcUaError> for RunnerError {
    /// Cancellation keeps its identity across layers rather than being
    /// wrapped as a protocol failure.
    fn from(error: OpcUaError) -> Self {
        match error {
            OpcUaError::Cancelled => Self::Cancelled,
            other => Self::Protocol(other),
        }
    }
}

impl RunnerError {
    /// Returns `true` for a cooperative cancellation.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns the error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Protocol(_) => "protocol",
            Self::Store(_) => "store",
            Self::Cancelled => "cancelled",
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
    fn test_cancellation_keeps_identity() {
        let err: RunnerError = OpcUaError::cancelled().into();
        assert!(err.is_cancelled());
        assert_eq!(err.to_string(), "Test run cancelled");
    }

    #[test]
    fn test_protocol_errors_pass_through() {
        let err: RunnerError = OpcUaError::not_connected().into();
        assert!(!err.is_cancelled());
        assert_eq!(err.category(), "protocol");
        assert_eq!(err.to_string(), "Not connected to OPC UA server");
    }

    #[test]
    fn test_store_errors_are_distinct() {
        let err: RunnerError = StoreError::plan_not_found(uuid::Uuid::nil()).into();
        assert_eq!(err.category(), "store");
    }
}
