// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error types for the OPC UA client runtime.
//!
//! All fallible operations in this crate return [`OpcUaResult`]. The
//! top-level [`OpcUaError`] wraps category-specific sub-errors so callers
//! can match on the failure domain (connection, session, browse, operation,
//! subscription, configuration) without losing the underlying detail.

use serde::{Deserialize, Serialize};

// =============================================================================
// Result Type
// =============================================================================

/// Result type for OPC UA operations.
pub type OpcUaResult<T> = Result<T, OpcUaError>;

// =============================================================================
// Error Severity
// =============================================================================

/// Severity classification for OPC UA errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSeverity {
    /// Expected during normal operation (e.g. cooperative cancellation).
    Info,

    /// Degraded but recoverable.
    Warning,

    /// Operation failed.
    Error,

    /// Connectivity is lost and retries are exhausted.
    Critical,
}

impl ErrorSeverity {
    /// Maps the severity to a tracing level.
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            Self::Info => tracing::Level::INFO,
            Self::Warning => tracing::Level::WARN,
            Self::Error | Self::Critical => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

// =============================================================================
// OpcUaError
// =============================================================================

/// Top-level error type for OPC UA operations.
#[derive(Debug, thiserror::Error)]
pub enum OpcUaError {
    /// Connection-related errors.
    #[error("{0}")]
    Connection(#[from] ConnectionError),

    /// Session lifecycle errors.
    #[error("{0}")]
    Session(#[from] SessionError),

    /// Address-space browsing errors.
    #[error("{0}")]
    Browse(#[from] BrowseError),

    /// Read, write, and method call errors.
    #[error("{0}")]
    Operation(#[from] OperationError),

    /// Subscription and monitored-item errors.
    #[error("{0}")]
    Subscription(#[from] SubscriptionError),

    /// Configuration validation errors.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// Operation was cancelled cooperatively.
    #[error("Operation cancelled")]
    Cancelled,
}

impl OpcUaError {
    /// Creates a connection error.
    #[inline]
    pub fn connection(err: ConnectionError) -> Self {
        Self::Connection(err)
    }

    /// Creates a session error.
    #[inline]
    pub fn session(err: SessionError) -> Self {
        Self::Session(err)
    }

    /// Creates a browse error.
    #[inline]
    pub fn browse(err: BrowseError) -> Self {
        Self::Browse(err)
    }

    /// Creates an operation error.
    #[inline]
    pub fn operation(err: OperationError) -> Self {
        Self::Operation(err)
    }

    /// Creates a subscription error.
    #[inline]
    pub fn subscription(err: SubscriptionError) -> Self {
        Self::Subscription(err)
    }

    /// Creates a configuration error.
    #[inline]
    pub fn configuration(err: ConfigurationError) -> Self {
        Self::Configuration(err)
    }

    /// Creates a cancelled error.
    #[inline]
    pub fn cancelled() -> Self {
        Self::Cancelled
    }

    /// Creates a not-connected error.
    pub fn not_connected() -> Self {
        Self::Connection(ConnectionError::NotConnected)
    }

    /// Creates an attempts-exhausted error.
    pub fn attempts_exhausted(endpoint: impl Into<String>, attempts: u32) -> Self {
        Self::Connection(ConnectionError::attempts_exhausted(endpoint, attempts))
    }

    /// Creates a no-unsecured-endpoint error.
    pub fn no_unsecured_endpoint(available: impl Into<String>) -> Self {
        Self::Connection(ConnectionError::no_unsecured_endpoint(available))
    }

    /// Creates an address-not-found error.
    pub fn address_not_found(segment: impl Into<String>, path: impl Into<String>) -> Self {
        Self::Browse(BrowseError::address_not_found(segment, path))
    }

    /// Creates a parent-not-found error.
    pub fn parent_not_found() -> Self {
        Self::Browse(BrowseError::ParentNotFound)
    }

    /// Creates a bad-status error.
    pub fn bad_status(node_id: impl Into<String>, status_code: u32) -> Self {
        Self::Operation(OperationError::bad_status(node_id, status_code))
    }

    /// Creates a read-failed error.
    pub fn read_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Operation(OperationError::read_failed(node_id, message))
    }

    /// Creates a write-failed error.
    pub fn write_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Operation(OperationError::write_failed(node_id, message))
    }

    /// Creates a call-failed error.
    pub fn call_failed(method_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Operation(OperationError::call_failed(method_id, message))
    }

    /// Returns `true` if retrying the operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(err) => err.is_retryable(),
            Self::Operation(err) => err.is_retryable(),
            Self::Session(_) => false,
            Self::Browse(_) => false,
            Self::Subscription(_) => false,
            Self::Configuration(_) => false,
            Self::Cancelled => false,
        }
    }

    /// Returns the severity of this error.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Connection(ConnectionError::AttemptsExhausted { .. }) => ErrorSeverity::Critical,
            Self::Connection(ConnectionError::Refused { .. }) => ErrorSeverity::Warning,
            Self::Connection(_) => ErrorSeverity::Error,
            Self::Session(_) => ErrorSeverity::Error,
            Self::Browse(_) => ErrorSeverity::Error,
            Self::Operation(_) => ErrorSeverity::Error,
            Self::Subscription(_) => ErrorSeverity::Error,
            Self::Configuration(_) => ErrorSeverity::Error,
            Self::Cancelled => ErrorSeverity::Info,
        }
    }

    /// Returns a stable category label for logs and metrics.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::Session(_) => "session",
            Self::Browse(_) => "browse",
            Self::Operation(_) => "operation",
            Self::Subscription(_) => "subscription",
            Self::Configuration(_) => "configuration",
            Self::Cancelled => "cancelled",
        }
    }

    /// Logs this error at the level implied by its severity.
    pub fn log(&self, context: &str) {
        match self.severity() {
            ErrorSeverity::Info => {
                tracing::info!(error = %self, category = self.category(), context, "OPC UA error");
            }
            ErrorSeverity::Warning => {
                tracing::warn!(error = %self, category = self.category(), context, "OPC UA error");
            }
            ErrorSeverity::Error | ErrorSeverity::Critical => {
                tracing::error!(error = %self, category = self.category(), context, "OPC UA error");
            }
        }
    }
}

// =============================================================================
// ConnectionError
// =============================================================================

/// Errors raised while establishing or using a server connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// The server refused the connection attempt.
    #[error("Connection refused by server at {endpoint}")]
    Refused {
        /// Endpoint that refused the connection.
        endpoint: String,
    },

    /// Every configured connection attempt failed.
    #[error("Unable to connect to OPC UA server at {endpoint} after {attempts} attempts.")]
    AttemptsExhausted {
        /// Endpoint that was retried.
        endpoint: String,
        /// Number of attempts made.
        attempts: u32,
    },

    /// Endpoint discovery succeeded but no unsecured endpoint was offered.
    #[error("Server does not support unsecured endpoint. Available: {available}")]
    NoUnsecuredEndpoint {
        /// Description of the endpoints the server offered.
        available: String,
    },

    /// No endpoint matched the requested security mode.
    #[error("No suitable endpoint found for security mode {security_mode}")]
    NoSuitableEndpoint {
        /// The requested security mode.
        security_mode: String,
    },

    /// Endpoint discovery failed.
    #[error("Endpoint discovery failed for {endpoint}: {message}")]
    DiscoveryFailed {
        /// Discovery endpoint URL.
        endpoint: String,
        /// Failure detail.
        message: String,
    },

    /// An operation was attempted without an established connection.
    #[error("Not connected to OPC UA server")]
    NotConnected,

    /// The connection was closed.
    #[error("Connection closed{}", .reason.as_ref().map(|r| format!(": {r}")).unwrap_or_default())]
    Closed {
        /// Close reason, if the server provided one.
        reason: Option<String>,
    },
}

impl ConnectionError {
    /// Creates a refused error.
    pub fn refused(endpoint: impl Into<String>) -> Self {
        Self::Refused {
            endpoint: endpoint.into(),
        }
    }

    /// Creates an attempts-exhausted error.
    pub fn attempts_exhausted(endpoint: impl Into<String>, attempts: u32) -> Self {
        Self::AttemptsExhausted {
            endpoint: endpoint.into(),
            attempts,
        }
    }

    /// Creates a no-unsecured-endpoint error.
    pub fn no_unsecured_endpoint(available: impl Into<String>) -> Self {
        Self::NoUnsecuredEndpoint {
            available: available.into(),
        }
    }

    /// Creates a no-suitable-endpoint error.
    pub fn no_suitable_endpoint(security_mode: impl Into<String>) -> Self {
        Self::NoSuitableEndpoint {
            security_mode: security_mode.into(),
        }
    }

    /// Creates a discovery-failed error.
    pub fn discovery_failed(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DiscoveryFailed {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Creates a closed error.
    pub fn closed(reason: Option<String>) -> Self {
        Self::Closed { reason }
    }

    /// Returns `true` if retrying the connection may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Refused { .. } | Self::DiscoveryFailed { .. } | Self::NotConnected
        )
    }
}

// =============================================================================
// SessionError
// =============================================================================

/// Errors raised by session lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Session creation failed.
    #[error("Session creation failed: {message}")]
    CreationFailed {
        /// Failure detail.
        message: String,
    },

    /// Closing the session failed.
    #[error("Session close failed: {message}")]
    CloseFailed {
        /// Failure detail.
        message: String,
    },
}

impl SessionError {
    /// Creates a creation-failed error.
    pub fn creation_failed(message: impl Into<String>) -> Self {
        Self::CreationFailed {
            message: message.into(),
        }
    }

    /// Creates a close-failed error.
    pub fn close_failed(message: impl Into<String>) -> Self {
        Self::CloseFailed {
            message: message.into(),
        }
    }
}

// =============================================================================
// BrowseError
// =============================================================================

/// Errors raised while browsing the server address space.
#[derive(Debug, thiserror::Error)]
pub enum BrowseError {
    /// A path segment did not match any child of the current node.
    #[error("Node '{segment}' not found in path '{path}'")]
    AddressNotFound {
        /// The segment that failed to resolve.
        segment: String,
        /// The full path being resolved.
        path: String,
    },

    /// The inverse-reference lookup for a method's owning object failed.
    #[error("Parent node not found for method node.")]
    ParentNotFound,

    /// The server rejected a browse request.
    #[error("Browse failed for node '{node_id}': {message}")]
    BrowseFailed {
        /// Node the browse started from.
        node_id: String,
        /// Failure detail.
        message: String,
    },
}

impl BrowseError {
    /// Creates an address-not-found error.
    pub fn address_not_found(segment: impl Into<String>, path: impl Into<String>) -> Self {
        Self::AddressNotFound {
            segment: segment.into(),
            path: path.into(),
        }
    }

    /// Creates a browse-failed error.
    pub fn browse_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BrowseFailed {
            node_id: node_id.into(),
            message: message.into(),
        }
    }
}

// =============================================================================
// OperationError
// =============================================================================

/// Errors raised by read, write, and method call operations.
#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    /// Read operation failed.
    #[error("Read failed for node '{node_id}': {message}")]
    ReadFailed {
        /// Node ID.
        node_id: String,
        /// Failure detail.
        message: String,
    },

    /// Write operation failed.
    #[error("Write failed for node '{node_id}': {message}")]
    WriteFailed {
        /// Node ID.
        node_id: String,
        /// Failure detail.
        message: String,
    },

    /// Method call failed.
    #[error("Call failed for method '{method_id}': {message}")]
    CallFailed {
        /// Method node ID.
        method_id: String,
        /// Failure detail.
        message: String,
    },

    /// The server returned a bad status code.
    #[error("Bad status code {status_code:#010x} ({status_name}) for node '{node_id}'")]
    BadStatus {
        /// Node ID.
        node_id: String,
        /// Raw status code.
        status_code: u32,
        /// Human-readable status name.
        status_name: String,
    },
}

impl OperationError {
    /// Creates a read-failed error.
    pub fn read_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ReadFailed {
            node_id: node_id.into(),
            message: message.into(),
        }
    }

    /// Creates a write-failed error.
    pub fn write_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::WriteFailed {
            node_id: node_id.into(),
            message: message.into(),
        }
    }

    /// Creates a call-failed error.
    pub fn call_failed(method_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CallFailed {
            method_id: method_id.into(),
            message: message.into(),
        }
    }

    /// Creates a bad-status error.
    pub fn bad_status(node_id: impl Into<String>, status_code: u32) -> Self {
        Self::BadStatus {
            node_id: node_id.into(),
            status_code,
            status_name: Self::status_code_name(status_code).to_string(),
        }
    }

    /// Returns the human-readable name for an OPC UA status code.
    pub fn status_code_name(code: u32) -> &'static str {
        match code {
            0x0000_0000 => "Good",
            0x4000_0000 => "Uncertain",
            0x8000_0000 => "Bad",
            0x8001_0000 => "BadUnexpectedError",
            0x8002_0000 => "BadInternalError",
            0x8004_0000 => "BadResourceUnavailable",
            0x8005_0000 => "BadCommunicationError",
            0x800C_0000 => "BadTimeout",
            0x800D_0000 => "BadServiceUnsupported",
            0x800E_0000 => "BadShutdown",
            0x800F_0000 => "BadServerNotConnected",
            0x8010_0000 => "BadServerHalted",
            0x8012_0000 => "BadTooManyOperations",
            0x8013_0000 => "BadTooManyMonitoredItems",
            0x8023_0000 => "BadUserAccessDenied",
            0x8029_0000 => "BadSessionIdInvalid",
            0x802A_0000 => "BadSessionClosed",
            0x802B_0000 => "BadSessionNotActivated",
            0x802C_0000 => "BadSubscriptionIdInvalid",
            0x8061_0000 => "BadNodeIdInvalid",
            0x8062_0000 => "BadNodeIdUnknown",
            0x8063_0000 => "BadAttributeIdInvalid",
            0x8068_0000 => "BadNotReadable",
            0x8069_0000 => "BadNotWritable",
            0x806A_0000 => "BadOutOfRange",
            0x806B_0000 => "BadNotSupported",
            0x806C_0000 => "BadNotFound",
            0x806F_0000 => "BadMonitoringModeInvalid",
            0x8070_0000 => "BadMonitoredItemIdInvalid",
            0x807F_0000 => "BadReferenceTypeIdInvalid",
            0x8080_0000 => "BadBrowseDirectionInvalid",
            0x80AB_0000 => "BadTypeMismatch",
            0x80AC_0000 => "BadMethodInvalid",
            0x80AD_0000 => "BadArgumentsMissing",
            0x80B0_0000 => "BadNotExecutable",
            _ => "Unknown",
        }
    }

    /// Returns `true` if retrying the operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::BadStatus { status_code, .. } => {
                matches!(
                    status_code,
                    0x800C_0000 // BadTimeout
                    | 0x8005_0000 // BadCommunicationError
                    | 0x800F_0000 // BadServerNotConnected
                )
            }
            _ => false,
        }
    }
}

// =============================================================================
// SubscriptionError
// =============================================================================

/// Errors raised by subscription and monitored-item management.
#[derive(Debug, thiserror::Error)]
pub enum SubscriptionError {
    /// Subscription creation failed.
    #[error("Subscription creation failed: {message}")]
    CreationFailed {
        /// Failure detail.
        message: String,
    },

    /// Creating a monitored item failed.
    #[error("Monitored item creation failed for node '{node_id}': {message}")]
    MonitoredItemFailed {
        /// Node that could not be monitored.
        node_id: String,
        /// Failure detail.
        message: String,
    },
}

impl SubscriptionError {
    /// Creates a creation-failed error.
    pub fn creation_failed(message: impl Into<String>) -> Self {
        Self::CreationFailed {
            message: message.into(),
        }
    }

    /// Creates a monitored-item-failed error.
    pub fn monitored_item_failed(node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MonitoredItemFailed {
            node_id: node_id.into(),
            message: message.into(),
        }
    }
}

// =============================================================================
// ConfigurationError
// =============================================================================

/// Errors raised by configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    /// Endpoint URL is invalid.
    #[error("Invalid endpoint URL '{url}': {reason}")]
    InvalidEndpoint {
        /// The rejected URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// NodeId string could not be parsed.
    #[error("Invalid node ID '{node_id}': {reason}")]
    InvalidNodeId {
        /// The rejected node ID string.
        node_id: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A configuration field failed validation.
    #[error("Invalid configuration field '{field}': {reason}")]
    InvalidField {
        /// Field name.
        field: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl ConfigurationError {
    /// Creates an invalid-endpoint error.
    pub fn invalid_endpoint(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid-node-id error.
    pub fn invalid_node_id(node_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidNodeId {
            node_id: node_id.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid-field error.
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
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
    fn test_attempts_exhausted_message() {
        let err = OpcUaError::attempts_exhausted("opc.tcp://localhost:4840", 10);
        assert_eq!(
            err.to_string(),
            "Unable to connect to OPC UA server at opc.tcp://localhost:4840 after 10 attempts."
        );
    }

    #[test]
    fn test_no_unsecured_endpoint_message() {
        let err = OpcUaError::no_unsecured_endpoint("SignAndEncrypt/Basic256Sha256");
        assert_eq!(
            err.to_string(),
            "Server does not support unsecured endpoint. Available: SignAndEncrypt/Basic256Sha256"
        );
    }

    #[test]
    fn test_address_not_found_message() {
        let err = OpcUaError::address_not_found("Flow", "Plant/Analog/Flow");
        assert_eq!(err.to_string(), "Node 'Flow' not found in path 'Plant/Analog/Flow'");
    }

    #[test]
    fn test_parent_not_found_message() {
        let err = OpcUaError::parent_not_found();
        assert_eq!(err.to_string(), "Parent node not found for method node.");
    }

    #[test]
    fn test_bad_status_names() {
        assert_eq!(OperationError::status_code_name(0x0000_0000), "Good");
        assert_eq!(OperationError::status_code_name(0x8062_0000), "BadNodeIdUnknown");
        assert_eq!(OperationError::status_code_name(0x8069_0000), "BadNotWritable");
        assert_eq!(OperationError::status_code_name(0xDEAD_BEEF), "Unknown");
    }

    #[test]
    fn test_bad_status_message_format() {
        let err = OpcUaError::bad_status("ns=2;s=Plant/Analog/Flow", 0x8069_0000);
        let msg = err.to_string();
        assert!(msg.contains("0x80690000"), "unexpected format: {msg}");
        assert!(msg.contains("BadNotWritable"));
        assert!(msg.contains("ns=2;s=Plant/Analog/Flow"));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(OpcUaError::connection(ConnectionError::refused("opc.tcp://x")).is_retryable());
        assert!(!OpcUaError::attempts_exhausted("opc.tcp://x", 3).is_retryable());
        assert!(!OpcUaError::address_not_found("A", "A/B").is_retryable());
        assert!(OpcUaError::bad_status("ns=0;i=1", 0x800C_0000).is_retryable());
        assert!(!OpcUaError::bad_status("ns=0;i=1", 0x8069_0000).is_retryable());
        assert!(!OpcUaError::cancelled().is_retryable());
    }

    #[test]
    fn test_severity_and_category() {
        assert_eq!(OpcUaError::cancelled().severity(), ErrorSeverity::Info);
        assert_eq!(
            OpcUaError::attempts_exhausted("opc.tcp://x", 5).severity(),
            ErrorSeverity::Critical
        );
        assert_eq!(OpcUaError::cancelled().category(), "cancelled");
        assert_eq!(OpcUaError::not_connected().category(), "connection");
        assert_eq!(OpcUaError::parent_not_found().category(), "browse");
    }

    #[test]
    fn test_severity_tracing_levels() {
        assert_eq!(ErrorSeverity::Info.to_tracing_level(), tracing::Level::INFO);
        assert_eq!(ErrorSeverity::Warning.to_tracing_level(), tracing::Level::WARN);
        assert_eq!(ErrorSeverity::Critical.to_tracing_level(), tracing::Level::ERROR);
    }

    #[test]
    fn test_closed_message_with_and_without_reason() {
        let with = ConnectionError::closed(Some("server shutdown".to_string()));
        assert_eq!(with.to_string(), "Connection closed: server shutdown");

        let without = ConnectionError::closed(None);
        assert_eq!(without.to_string(), "Connection closed");
    }
}
