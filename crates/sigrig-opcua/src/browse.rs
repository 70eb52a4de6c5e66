// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Address-space navigation.
//!
//! [`Browser`] issues single hierarchical enumeration requests; references
//! returned by the transport already carry absolute node ids (the transport
//! translates namespace-relative references through the server's namespace
//! table). [`AddressResolver`] builds on it to turn human-readable signal
//! paths like `Objects/Plant/Analog/Flow` into node ids, with a literal
//! fast path for strings that already parse as addresses.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use sigrig_core::CancelToken;
use tracing::{debug, info, trace};

use crate::client::transport::{BrowseChild, OpcUaTransport};
use crate::client::race_cancel;
use crate::error::{OpcUaError, OpcUaResult};
use crate::types::{BrowseDirection, NodeClass, NodeId, ReferenceTypeId};

// =============================================================================
// Browser
// =============================================================================

/// Enumerates hierarchical references of address-space nodes.
pub struct Browser<T: OpcUaTransport> {
    transport: Arc<T>,
}

impl<T: OpcUaTransport> Browser<T> {
    /// Creates a browser on the given transport.
    pub fn new(transport: Arc<T>) -> Self {
        Self { transport }
    }

    /// Returns the direct children of a node.
    ///
    /// Issues one forward enumeration following hierarchical references,
    /// filtered to object, variable, and method nodes.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if the device reports a bad status for the
    /// browsed node.
    pub async fn children(
        &self,
        node_id: &NodeId,
        cancel: &CancelToken,
    ) -> OpcUaResult<Vec<BrowseChild>> {
        race_cancel(
            cancel,
            self.transport.browse(
                node_id,
                BrowseDirection::Forward,
                ReferenceTypeId::HierarchicalReferences,
                NodeClass::HIERARCHY_MASK,
            ),
        )
        .await
    }

    /// Returns the owning object of a node.
    ///
    /// Follows the inverse component reference; methods and variables are
    /// components of exactly one object in well-formed address spaces.
    ///
    /// # Errors
    ///
    /// Fails with `ParentNotFound` if no inverse component reference exists.
    pub async fn parent_of(&self, node_id: &NodeId, cancel: &CancelToken) -> OpcUaResult<NodeId> {
        let references = race_cancel(
            cancel,
            self.transport.browse(
                node_id,
                BrowseDirection::Inverse,
                ReferenceTypeId::HasComponent,
                0,
            ),
        )
        .await?;

        references
            .first()
            .map(|parent| parent.node_id.clone())
            .ok_or_else(OpcUaError::parent_not_found)
    }

    /// Recursively logs the address space reachable from `root`.
    ///
    /// Diagnostic helper for inspecting an unfamiliar device. The subtree
    /// under `root` must be acyclic.
    pub async fn log_address_space(
        &self,
        root: &NodeId,
        cancel: &CancelToken,
    ) -> OpcUaResult<()> {
        self.log_subtree(root, 0, cancel).await
    }

    fn log_subtree<'a>(
        &'a self,
        node_id: &'a NodeId,
        depth: usize,
        cancel: &'a CancelToken,
    ) -> Pin<Box<dyn Future<Output = OpcUaResult<()>> + Send + 'a>> {
        Box::pin(async move {
            let children = self.children(node_id, cancel).await?;
            for child in children {
                info!(
                    node_id = %child.node_id,
                    class = %child.node_class,
                    "{}- {}",
                    "  ".repeat(depth),
                    child.display_name
                );
                self.log_subtree(&child.node_id, depth + 1, cancel).await?;
            }
            Ok(())
        })
    }
}

// =============================================================================
// AddressResolver
// =============================================================================

/// Resolves signal paths to node ids.
pub struct AddressResolver<T: OpcUaTransport> {
    browser: Browser<T>,
}

impl<T: OpcUaTransport> AddressResolver<T> {
    /// Creates a resolver on the given transport.
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            browser: Browser::new(transport),
        }
    }

    /// Resolves a signal path to a node id.
    ///
    /// A path that already parses as a literal address (`ns=2;s=...`,
    /// `i=85`, ...) is returned unchanged without issuing any browse call.
    /// Otherwise the path is split on `/` and walked segment by segment
    /// from the Root folder, matching each segment against child display
    /// names exactly (case-sensitive).
    ///
    /// # Errors
    ///
    /// Fails with `AddressNotFound` naming the first segment that has no
    /// matching child.
    pub async fn resolve(&self, path: &str, cancel: &CancelToken) -> OpcUaResult<NodeId> {
        let path = path.trim();

        // Literal addresses pass through untouched.
        if let Ok(node_id) = path.parse::<NodeId>() {
            trace!(path, node_id = %node_id, "Path is a literal address");
            return Ok(node_id);
        }

        let mut current = NodeId::ROOT_FOLDER;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            let children = self.browser.children(&current, cancel).await?;
            let child = children
                .iter()
                .find(|child| child.display_name == segment)
                .ok_or_else(|| OpcUaError::address_not_found(segment, path))?;

            trace!(segment, node_id = %child.node_id, "Matched path segment");
            current = child.node_id.clone();
        }

        debug!(path, node_id = %current, "Resolved signal path");
        Ok(current)
    }

    /// Returns the underlying browser.
    pub fn browser(&self) -> &Browser<T> {
        &self.browser
    }
}
