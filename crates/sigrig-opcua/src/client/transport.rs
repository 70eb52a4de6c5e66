// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA transport abstraction layer.
//!
//! This module defines the low-level protocol operations the client runtime
//! is built on. Implementations handle the actual wire communication; the
//! rest of the crate only ever talks to [`OpcUaTransport`], which keeps the
//! runtime testable against the in-process simulator.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sigrig_core::Value;
use tokio::sync::broadcast;

use crate::error::OpcUaResult;
use crate::types::{
    BrowseDirection, EndpointInfo, MonitoredItemSettings, NodeClass, NodeId, ReferenceTypeId,
    SubscriptionSettings,
};

use super::subscription::{DataChangeNotification, MonitoredItemId, SubscriptionId};

// =============================================================================
// ReadResult
// =============================================================================

/// Result of a node read operation.
#[derive(Debug, Clone)]
pub struct ReadResult {
    /// The node ID that was read.
    pub node_id: NodeId,

    /// The value read (if successful).
    pub value: Option<Value>,

    /// Status code of the read operation.
    pub status_code: u32,

    /// Server timestamp.
    pub server_timestamp: Option<DateTime<Utc>>,

    /// Source timestamp.
    pub source_timestamp: Option<DateTime<Utc>>,
}

impl ReadResult {
    /// Creates a successful read result.
    pub fn success(node_id: NodeId, value: Value) -> Self {
        Self {
            node_id,
            value: Some(value),
            status_code: 0, // Good
            server_timestamp: Some(Utc::now()),
            source_timestamp: None,
        }
    }

    /// Creates a failed read result.
    pub fn failure(node_id: NodeId, status_code: u32) -> Self {
        Self {
            node_id,
            value: None,
            status_code,
            server_timestamp: Some(Utc::now()),
            source_timestamp: None,
        }
    }

    /// Returns `true` if the read was successful.
    #[inline]
    pub fn is_good(&self) -> bool {
        self.status_code == 0
    }

    /// Returns `true` if the status is uncertain.
    #[inline]
    pub fn is_uncertain(&self) -> bool {
        self.status_code & 0x40000000 != 0 && self.status_code & 0x80000000 == 0
    }

    /// Returns `true` if the status is bad.
    #[inline]
    pub fn is_bad(&self) -> bool {
        self.status_code & 0x80000000 != 0
    }
}

// =============================================================================
// WriteResult
// =============================================================================

/// Result of a node write operation.
#[derive(Debug, Clone)]
pub struct WriteResult {
    /// The node ID that was written.
    pub node_id: NodeId,

    /// Status code of the write operation.
    pub status_code: u32,
}

impl WriteResult {
    /// Creates a successful write result.
    pub fn success(node_id: NodeId) -> Self {
        Self {
            node_id,
            status_code: 0,
        }
    }

    /// Creates a failed write result.
    pub fn failure(node_id: NodeId, status_code: u32) -> Self {
        Self {
            node_id,
            status_code,
        }
    }

    /// Returns `true` if the write was successful.
    #[inline]
    pub fn is_good(&self) -> bool {
        self.status_code == 0
    }

    /// Returns `true` if the status is bad.
    #[inline]
    pub fn is_bad(&self) -> bool {
        self.status_code & 0x80000000 != 0
    }
}

// =============================================================================
// BrowseChild
// =============================================================================

/// A node reference returned by a browse operation.
#[derive(Debug, Clone)]
pub struct BrowseChild {
    /// The node ID of the referenced node.
    pub node_id: NodeId,

    /// Browse name.
    pub browse_name: String,

    /// Display name.
    pub display_name: String,

    /// Node class of the referenced node.
    pub node_class: NodeClass,

    /// The reference type linking the browsed node to this one.
    pub reference_type: ReferenceTypeId,
}

// =============================================================================
// CallResult
// =============================================================================

/// Result of a method call.
#[derive(Debug, Clone)]
pub struct CallResult {
    /// The method node that was called.
    pub method_id: NodeId,

    /// The object node the method was called on.
    pub object_id: NodeId,

    /// Output arguments returned by the method.
    pub output_arguments: Vec<Value>,

    /// Status code of the call.
    pub status_code: u32,
}

impl CallResult {
    /// Creates a successful call result.
    pub fn success(object_id: NodeId, method_id: NodeId, output_arguments: Vec<Value>) -> Self {
        Self {
            method_id,
            object_id,
            output_arguments,
            status_code: 0,
        }
    }

    /// Creates a failed call result.
    pub fn failure(object_id: NodeId, method_id: NodeId, status_code: u32) -> Self {
        Self {
            method_id,
            object_id,
            output_arguments: Vec::new(),
            status_code,
        }
    }

    /// Returns `true` if the call was successful.
    #[inline]
    pub fn is_good(&self) -> bool {
        self.status_code == 0
    }

    /// Returns `true` if the status is bad.
    #[inline]
    pub fn is_bad(&self) -> bool {
        self.status_code & 0x80000000 != 0
    }
}

// =============================================================================
// KeepAliveEvent
// =============================================================================

/// Session keepalive notification from the server.
#[derive(Debug, Clone)]
pub struct KeepAliveEvent {
    /// Status code reported with the keepalive.
    pub status_code: u32,

    /// When the keepalive was received.
    pub timestamp: DateTime<Utc>,
}

impl KeepAliveEvent {
    /// Creates a keepalive event with the given status.
    pub fn new(status_code: u32) -> Self {
        Self {
            status_code,
            timestamp: Utc::now(),
        }
    }

    /// Returns `true` if the keepalive reports a bad status.
    #[inline]
    pub fn is_bad(&self) -> bool {
        self.status_code & 0x80000000 != 0
    }
}

// =============================================================================
// OpcUaTransport Trait
// =============================================================================

/// Abstract transport trait for OPC UA communication.
///
/// All methods take `&self`; implementations use interior mutability so a
/// transport can be shared across the client components and background tasks.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to allow concurrent access from
/// multiple tasks.
#[async_trait]
pub trait OpcUaTransport: Send + Sync {
    // =========================================================================
    // Connection Management
    // =========================================================================

    /// Discovers the endpoints advertised by the server.
    ///
    /// This is a connectionless exchange; it does not require (or establish)
    /// a session.
    async fn discover_endpoints(&self) -> OpcUaResult<Vec<EndpointInfo>>;

    /// Establishes a session on the given endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or the
    /// session cannot be activated.
    async fn connect(&self, endpoint: &EndpointInfo) -> OpcUaResult<()>;

    /// Gracefully closes the session and the underlying connection.
    async fn disconnect(&self) -> OpcUaResult<()>;

    /// Returns `true` if the transport is currently connected.
    fn is_connected(&self) -> bool;

    /// Returns the server endpoint URL.
    fn endpoint(&self) -> &str;

    /// Returns the server namespace array.
    ///
    /// Index 0 is always the OPC UA standard namespace.
    async fn namespaces(&self) -> OpcUaResult<Vec<String>>;

    // =========================================================================
    // Attribute Operations
    // =========================================================================

    /// Reads a single node value.
    async fn read_value(&self, node_id: &NodeId) -> OpcUaResult<ReadResult>;

    /// Reads multiple node values in a single request.
    ///
    /// The result vector is positionally aligned with `node_ids`.
    async fn read_values(&self, node_ids: &[NodeId]) -> OpcUaResult<Vec<ReadResult>>;

    /// Writes a single node value.
    async fn write_value(&self, node_id: &NodeId, value: Value) -> OpcUaResult<WriteResult>;

    // =========================================================================
    // Browse Operations
    // =========================================================================

    /// Browses references of a node.
    ///
    /// # Arguments
    ///
    /// * `node_id` - The node to browse from
    /// * `direction` - Forward for children, Inverse for parents
    /// * `reference_type` - Reference type to follow (subtypes included)
    /// * `node_class_mask` - Filter by node class bits (0 = all)
    async fn browse(
        &self,
        node_id: &NodeId,
        direction: BrowseDirection,
        reference_type: ReferenceTypeId,
        node_class_mask: u32,
    ) -> OpcUaResult<Vec<BrowseChild>>;

    // =========================================================================
    // Method Operations
    // =========================================================================

    /// Calls a method on an object node.
    ///
    /// # Arguments
    ///
    /// * `object_id` - The object node owning the method
    /// * `method_id` - The method node to call
    /// * `input_arguments` - Input arguments in declaration order
    async fn call_method(
        &self,
        object_id: &NodeId,
        method_id: &NodeId,
        input_arguments: Vec<Value>,
    ) -> OpcUaResult<CallResult>;

    // =========================================================================
    // Subscription Operations
    // =========================================================================

    /// Creates a subscription for data change notifications.
    async fn create_subscription(
        &self,
        settings: &SubscriptionSettings,
    ) -> OpcUaResult<SubscriptionId>;

    /// Deletes a subscription and all of its monitored items.
    async fn delete_subscription(&self, subscription_id: SubscriptionId) -> OpcUaResult<()>;

    /// Creates monitored items on a subscription in a single batch.
    ///
    /// The result vector is positionally aligned with `node_ids`.
    async fn create_monitored_items(
        &self,
        subscription_id: SubscriptionId,
        node_ids: &[NodeId],
        settings: &MonitoredItemSettings,
    ) -> OpcUaResult<Vec<MonitoredItemId>>;

    /// Deletes monitored items from a subscription.
    async fn delete_monitored_items(
        &self,
        subscription_id: SubscriptionId,
        monitored_item_ids: &[MonitoredItemId],
    ) -> OpcUaResult<()>;

    /// Returns a receiver for data change notifications.
    ///
    /// Every call returns a fresh receiver positioned at the current tail
    /// of the notification stream.
    fn data_changes(&self) -> broadcast::Receiver<DataChangeNotification>;

    /// Returns a receiver for session keepalive events.
    fn keepalives(&self) -> broadcast::Receiver<KeepAliveEvent>;
}

impl fmt::Debug for dyn OpcUaTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpcUaTransport")
            .field("endpoint", &self.endpoint())
            .field("connected", &self.is_connected())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_result() {
        let success = ReadResult::success(NodeId::numeric(2, 1001), Value::Float64(25.5));
        assert!(success.is_good());
        assert!(!success.is_bad());

        let failure = ReadResult::failure(NodeId::numeric(2, 1001), 0x80620000);
        assert!(failure.is_bad());
        assert!(!failure.is_good());
        assert!(failure.value.is_none());
    }

    #[test]
    fn test_uncertain_is_neither_good_nor_bad() {
        let uncertain = ReadResult {
            node_id: NodeId::numeric(2, 1001),
            value: Some(Value::Float64(1.0)),
            status_code: 0x40000000,
            server_timestamp: None,
            source_timestamp: None,
        };
        assert!(uncertain.is_uncertain());
        assert!(!uncertain.is_good());
        assert!(!uncertain.is_bad());
    }

    #[test]
    fn test_write_result() {
        let success = WriteResult::success(NodeId::string(2, "Plant/Analog/Flow"));
        assert!(success.is_good());

        let failure = WriteResult::failure(NodeId::string(2, "Plant/Analog/Flow"), 0x80690000);
        assert!(failure.is_bad());
    }

    #[test]
    fn test_call_result() {
        let result = CallResult::success(
            NodeId::string(2, "Plant/Methods"),
            NodeId::string(2, "Plant/Methods/Add"),
            vec![Value::Float64(5.0)],
        );
        assert!(result.is_good());
        assert_eq!(result.output_arguments.len(), 1);

        let failed = CallResult::failure(
            NodeId::string(2, "Plant/Methods"),
            NodeId::string(2, "Plant/Methods/Add"),
            0x80AD0000,
        );
        assert!(failed.is_bad());
        assert!(failed.output_arguments.is_empty());
    }

    #[test]
    fn test_keepalive_event() {
        assert!(!KeepAliveEvent::new(0).is_bad());
        assert!(KeepAliveEvent::new(0x800F0000).is_bad());
    }
}
