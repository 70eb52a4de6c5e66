// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Remote method invocation.
//!
//! OPC UA calls address a method by two ids: the method node itself and the
//! object node that owns it. [`MethodInvoker::call`] takes both;
//! [`MethodInvoker::call_method_only`] covers the common case where only the
//! method id is known and the owning object is found through its inverse
//! component reference.

use std::sync::Arc;

use sigrig_core::{CancelToken, Value};
use tracing::debug;

use crate::browse::Browser;
use crate::error::{OpcUaError, OpcUaResult};
use crate::types::NodeId;

use super::race_cancel;
use super::transport::OpcUaTransport;

// =============================================================================
// MethodInvoker
// =============================================================================

/// Invokes methods exposed by device objects.
pub struct MethodInvoker<T: OpcUaTransport> {
    transport: Arc<T>,
    browser: Browser<T>,
}

impl<T: OpcUaTransport> MethodInvoker<T> {
    /// Creates an invoker on the given transport.
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            browser: Browser::new(Arc::clone(&transport)),
            transport,
        }
    }

    /// Calls a method on an object.
    ///
    /// Output argument count and types are device-defined and returned
    /// as-is; this layer does not validate them.
    ///
    /// # Errors
    ///
    /// Returns a protocol error carrying the status code if the device
    /// rejects the call.
    pub async fn call(
        &self,
        object_id: &NodeId,
        method_id: &NodeId,
        input_arguments: Vec<Value>,
        cancel: &CancelToken,
    ) -> OpcUaResult<Vec<Value>> {
        let result = race_cancel(
            cancel,
            self.transport
                .call_method(object_id, method_id, input_arguments),
        )
        .await?;

        if result.is_bad() {
            return Err(OpcUaError::bad_status(
                method_id.to_string(),
                result.status_code,
            ));
        }

        debug!(
            object_id = %object_id,
            method_id = %method_id,
            outputs = result.output_arguments.len(),
            "Method call completed"
        );
        Ok(result.output_arguments)
    }

    /// Calls a method when only the method id is known.
    ///
    /// Resolves the owning object through the method's inverse component
    /// reference, then calls it.
    ///
    /// # Errors
    ///
    /// Fails with `ParentNotFound` if the method has no owning object.
    pub async fn call_method_only(
        &self,
        method_id: &NodeId,
        input_arguments: Vec<Value>,
        cancel: &CancelToken,
    ) -> OpcUaResult<Vec<Value>> {
        let object_id = self.browser.parent_of(method_id, cancel).await?;
        self.call(&object_id, method_id, input_arguments, cancel)
            .await
    }
}
