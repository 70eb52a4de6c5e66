// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Typed value access.
//!
//! [`ValueAccessor`] reads and writes the Value attribute of a node, mapping
//! bad protocol statuses to errors that carry the numeric code and its
//! symbolic name. The `*_by_path` variants resolve a signal path first, so
//! callers can work with either addresses or human-readable paths.

use std::sync::Arc;

use sigrig_core::{CancelToken, Value};
use tracing::trace;

use crate::browse::AddressResolver;
use crate::error::{OpcUaError, OpcUaResult};
use crate::types::NodeId;

use super::race_cancel;
use super::transport::OpcUaTransport;

// =============================================================================
// ValueAccessor
// =============================================================================

/// Reads and writes node values over a transport.
pub struct ValueAccessor<T: OpcUaTransport> {
    transport: Arc<T>,
    resolver: AddressResolver<T>,
}

impl<T: OpcUaTransport> ValueAccessor<T> {
    /// Creates an accessor on the given transport.
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            resolver: AddressResolver::new(Arc::clone(&transport)),
            transport,
        }
    }

    /// Reads the current value of a node.
    ///
    /// # Errors
    ///
    /// Returns a protocol error carrying the status code if the device
    /// reports a bad status (e.g. BadNodeIdUnknown for a missing node).
    pub async fn read(&self, node_id: &NodeId, cancel: &CancelToken) -> OpcUaResult<Value> {
        let result = race_cancel(cancel, self.transport.read_value(node_id)).await?;

        if result.is_bad() {
            return Err(OpcUaError::bad_status(
                node_id.to_string(),
                result.status_code,
            ));
        }

        let value = result.value.unwrap_or(Value::Null);
        trace!(node_id = %node_id, value = %value, "Read value");
        Ok(value)
    }

    /// Writes a value to a node.
    ///
    /// # Errors
    ///
    /// Returns a protocol error carrying the status code if the device
    /// rejects the write (e.g. BadNotWritable for a read-only node).
    pub async fn write(
        &self,
        node_id: &NodeId,
        value: Value,
        cancel: &CancelToken,
    ) -> OpcUaResult<()> {
        let result = race_cancel(cancel, self.transport.write_value(node_id, value)).await?;

        if result.is_bad() {
            return Err(OpcUaError::bad_status(
                node_id.to_string(),
                result.status_code,
            ));
        }

        trace!(node_id = %node_id, "Wrote value");
        Ok(())
    }

    /// Resolves a signal path and reads its value.
    pub async fn read_by_path(&self, path: &str, cancel: &CancelToken) -> OpcUaResult<Value> {
        let node_id = self.resolver.resolve(path, cancel).await?;
        self.read(&node_id, cancel).await
    }

    /// Resolves a signal path and writes a value to it.
    pub async fn write_by_path(
        &self,
        path: &str,
        value: Value,
        cancel: &CancelToken,
    ) -> OpcUaResult<()> {
        let node_id = self.resolver.resolve(path, cancel).await?;
        self.write(&node_id, value, cancel).await
    }
}
