// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! In-process simulated device.
//!
//! [`SimDevice`] models a small OPC UA server address space entirely in
//! memory: folders and variables linked by Organizes and HasComponent
//! references, per-variable writability, a configurable endpoint list,
//! scripted transient connect failures, and data change notifications
//! pushed on every value update. [`SimTransport`] exposes it through
//! [`OpcUaTransport`] so the whole client runtime can run against it in
//! tests and demos without a server process.
//!
//! The default address space mirrors a small plant:
//!
//! ```text
//! Root
//! └── Objects
//!     └── Plant
//!         ├── Process
//!         │   └── State        (string, "Idle")
//!         ├── Analog
//!         │   └── Flow         (float64)
//!         ├── Digital
//!         │   └── ValveOpen    (bool)
//!         └── Methods
//!             ├── Add          (a, b) -> sum
//!             └── ResetAlarms  () -> ()
//! ```
//!
//! Variables use their plant path as string node id, so
//! `ns=2;s=Plant/Analog/Flow` addresses the same node the browse walk
//! `Objects/Plant/Analog/Flow` reaches.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sigrig_core::Value;
use tokio::sync::{broadcast, RwLock};

use crate::client::subscription::{DataChangeNotification, MonitoredItemId, SubscriptionId};
use crate::client::transport::{
    BrowseChild, CallResult, KeepAliveEvent, OpcUaTransport, ReadResult, WriteResult,
};
use crate::error::{ConnectionError, OpcUaError, OpcUaResult, SubscriptionError};
use crate::types::{
    BrowseDirection, EndpointInfo, MonitoredItemSettings, NodeClass, NodeId, ReferenceTypeId,
    SecurityMode, SecurityPolicy, SubscriptionSettings,
};

const BAD_NODE_ID_UNKNOWN: u32 = 0x8062_0000;
const BAD_ATTRIBUTE_ID_INVALID: u32 = 0x8063_0000;
const BAD_NOT_WRITABLE: u32 = 0x8069_0000;
const BAD_TYPE_MISMATCH: u32 = 0x80AB_0000;
const BAD_METHOD_INVALID: u32 = 0x80AC_0000;
const BAD_ARGUMENTS_MISSING: u32 = 0x80AD_0000;
const BAD_NOT_EXECUTABLE: u32 = 0x80B0_0000;
const BAD_SUBSCRIPTION_ID_INVALID: u32 = 0x802C_0000;

/// Namespace index of simulated plant nodes.
pub const SIM_NAMESPACE: u16 = 2;

// =============================================================================
// Address space
// =============================================================================

struct SimNode {
    display_name: String,
    node_class: NodeClass,
    children: Vec<(NodeId, ReferenceTypeId)>,
    parent: Option<(NodeId, ReferenceTypeId)>,
    value: Value,
    writable: bool,
}

impl SimNode {
    fn container(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            node_class: NodeClass::Object,
            children: Vec::new(),
            parent: None,
            value: Value::Null,
            writable: false,
        }
    }

    fn variable(display_name: impl Into<String>, value: Value, writable: bool) -> Self {
        Self {
            display_name: display_name.into(),
            node_class: NodeClass::Variable,
            children: Vec::new(),
            parent: None,
            value,
            writable,
        }
    }

    fn method(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            node_class: NodeClass::Method,
            children: Vec::new(),
            parent: None,
            value: Value::Null,
            writable: false,
        }
    }
}

struct SimSubscription {
    sequence: u32,
    items: HashMap<MonitoredItemId, NodeId>,
}

struct SimState {
    endpoint: String,
    namespaces: Vec<String>,
    endpoints: RwLock<Vec<EndpointInfo>>,
    nodes: RwLock<HashMap<NodeId, SimNode>>,
    subscriptions: RwLock<HashMap<SubscriptionId, SimSubscription>>,
    connected: AtomicBool,
    fail_connects: AtomicU32,
    connect_attempts: AtomicU32,
    browse_count: AtomicU32,
    next_subscription_id: AtomicU32,
    next_item_id: AtomicU32,
    data_tx: broadcast::Sender<DataChangeNotification>,
    keepalive_tx: broadcast::Sender<KeepAliveEvent>,
}

// =============================================================================
// SimDevice
// =============================================================================

/// Handle for building and driving a simulated device.
///
/// Clones share the same device state, so a test can keep one clone for
/// scripting while the transport owns another.
#[derive(Clone)]
pub struct SimDevice {
    state: Arc<SimState>,
}

impl SimDevice {
    /// Creates an empty device advertising one unsecured endpoint.
    ///
    /// The address space starts with the standard Root, Objects, Types,
    /// and Views folders.
    pub fn new(endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        let (data_tx, _) = broadcast::channel(256);
        let (keepalive_tx, _) = broadcast::channel(16);

        let mut nodes = HashMap::new();
        let mut root = SimNode::container("Root");
        for (node_id, name) in [
            (NodeId::OBJECTS_FOLDER, "Objects"),
            (NodeId::TYPES_FOLDER, "Types"),
            (NodeId::VIEWS_FOLDER, "Views"),
        ] {
            let mut folder = SimNode::container(name);
            folder.parent = Some((NodeId::ROOT_FOLDER, ReferenceTypeId::Organizes));
            root.children
                .push((node_id.clone(), ReferenceTypeId::Organizes));
            nodes.insert(node_id, folder);
        }
        nodes.insert(NodeId::ROOT_FOLDER, root);

        Self {
            state: Arc::new(SimState {
                endpoints: RwLock::new(vec![EndpointInfo::unsecured(&endpoint)]),
                endpoint,
                namespaces: vec![
                    "http://opcfoundation.org/UA/".to_string(),
                    "urn:sigrig:sim:server".to_string(),
                    "urn:sigrig:simulator".to_string(),
                ],
                nodes: RwLock::new(nodes),
                subscriptions: RwLock::new(HashMap::new()),
                connected: AtomicBool::new(false),
                fail_connects: AtomicU32::new(0),
                connect_attempts: AtomicU32::new(0),
                browse_count: AtomicU32::new(0),
                next_subscription_id: AtomicU32::new(0),
                next_item_id: AtomicU32::new(0),
                data_tx,
                keepalive_tx,
            }),
        }
    }

    /// Creates a device with the default plant address space.
    pub async fn with_default_plant(endpoint: impl Into<String>) -> Self {
        let device = Self::new(endpoint);

        let plant = device.add_folder(&NodeId::OBJECTS_FOLDER, "Plant").await;
        let process = device.add_folder(&plant, "Process").await;
        let analog = device.add_folder(&plant, "Analog").await;
        let digital = device.add_folder(&plant, "Digital").await;
        let methods = device.add_folder(&plant, "Methods").await;

        device
            .add_variable(&process, "State", Value::String("Idle".to_string()), true)
            .await;
        device
            .add_variable(&analog, "Flow", Value::Float64(0.0), true)
            .await;
        device
            .add_variable(&digital, "ValveOpen", Value::Bool(false), true)
            .await;
        device.add_method(&methods, "Add").await;
        device.add_method(&methods, "ResetAlarms").await;

        device
    }

    /// Returns the node id the device assigns to a plant path.
    pub fn node_id(path: &str) -> NodeId {
        NodeId::string(SIM_NAMESPACE, path)
    }

    // =========================================================================
    // Address-space building
    // =========================================================================

    /// Adds a folder under `parent` via an Organizes reference.
    pub async fn add_folder(&self, parent: &NodeId, name: &str) -> NodeId {
        self.insert(
            parent,
            name,
            SimNode::container(name),
            ReferenceTypeId::Organizes,
        )
        .await
    }

    /// Adds a variable under `parent` via a HasComponent reference.
    pub async fn add_variable(
        &self,
        parent: &NodeId,
        name: &str,
        value: Value,
        writable: bool,
    ) -> NodeId {
        self.insert(
            parent,
            name,
            SimNode::variable(name, value, writable),
            ReferenceTypeId::HasComponent,
        )
        .await
    }

    /// Adds a method under `parent` via a HasComponent reference.
    ///
    /// `Add` and `ResetAlarms` have built-in behavior; any other method
    /// node exists in the address space but reports BadNotExecutable when
    /// called.
    pub async fn add_method(&self, parent: &NodeId, name: &str) -> NodeId {
        self.insert(
            parent,
            name,
            SimNode::method(name),
            ReferenceTypeId::HasComponent,
        )
        .await
    }

    async fn insert(
        &self,
        parent: &NodeId,
        name: &str,
        node: SimNode,
        reference: ReferenceTypeId,
    ) -> NodeId {
        // Child string ids extend the parent's path; children of the
        // standard folders start a fresh path.
        let node_id = match parent.as_string() {
            Some(path) => Self::node_id(&format!("{}/{}", path, name)),
            None => Self::node_id(name),
        };

        let mut nodes = self.state.nodes.write().await;
        let mut node = node;
        node.parent = Some((parent.clone(), reference));
        nodes.insert(node_id.clone(), node);
        if let Some(parent_node) = nodes.get_mut(parent) {
            parent_node.children.push((node_id.clone(), reference));
        }

        node_id
    }

    // =========================================================================
    // Scripting
    // =========================================================================

    /// Makes the next `count` connect attempts fail with a refused error.
    pub fn fail_next_connects(&self, count: u32) {
        self.state.fail_connects.store(count, Ordering::SeqCst);
    }

    /// Replaces the advertised endpoint list.
    pub async fn set_endpoints(&self, endpoints: Vec<EndpointInfo>) {
        *self.state.endpoints.write().await = endpoints;
    }

    /// Adds a secured endpoint variant to the advertised list.
    pub async fn advertise_secured_endpoint(&self, security_level: u8) {
        self.state.endpoints.write().await.push(EndpointInfo {
            url: self.state.endpoint.clone(),
            security_mode: SecurityMode::SignAndEncrypt,
            security_policy: SecurityPolicy::Basic256Sha256,
            security_level,
        });
    }

    /// Updates a variable and notifies every monitored item watching it.
    ///
    /// Returns `false` if the node does not exist. Unlike a client write,
    /// this bypasses writability and type checks; it is the device side of
    /// the simulation.
    pub async fn set_value(&self, node_id: &NodeId, value: Value) -> bool {
        {
            let mut nodes = self.state.nodes.write().await;
            let Some(node) = nodes.get_mut(node_id) else {
                return false;
            };
            node.value = value.clone();
        }

        self.notify_monitored_items(node_id, value).await;
        true
    }

    /// Emits a keepalive event with the given status code.
    pub fn emit_keepalive(&self, status_code: u32) {
        let _ = self.state.keepalive_tx.send(KeepAliveEvent::new(status_code));
    }

    // =========================================================================
    // Observation
    // =========================================================================

    /// Returns the total number of connect attempts, including failed ones.
    pub fn connect_attempts(&self) -> u32 {
        self.state.connect_attempts.load(Ordering::SeqCst)
    }

    /// Returns the number of browse requests served.
    pub fn browse_count(&self) -> u32 {
        self.state.browse_count.load(Ordering::SeqCst)
    }

    /// Returns the number of live subscriptions.
    pub async fn subscription_count(&self) -> usize {
        self.state.subscriptions.read().await.len()
    }

    /// Returns the number of monitored items across all subscriptions.
    pub async fn monitored_item_count(&self) -> usize {
        self.state
            .subscriptions
            .read()
            .await
            .values()
            .map(|sub| sub.items.len())
            .sum()
    }

    async fn notify_monitored_items(&self, node_id: &NodeId, value: Value) {
        let now = Utc::now();
        let mut subscriptions = self.state.subscriptions.write().await;
        for (subscription_id, subscription) in subscriptions.iter_mut() {
            for (item_id, item_node) in &subscription.items {
                if item_node == node_id {
                    subscription.sequence += 1;
                    let _ = self.state.data_tx.send(
                        DataChangeNotification::new(
                            *subscription_id,
                            *item_id,
                            node_id.clone(),
                            value.clone(),
                        )
                        .with_timestamps(Some(now), Some(now))
                        .with_sequence(subscription.sequence),
                    );
                }
            }
        }
    }

    fn ensure_connected(&self) -> OpcUaResult<()> {
        if self.state.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(OpcUaError::not_connected())
        }
    }
}

// =============================================================================
// SimTransport
// =============================================================================

/// [`OpcUaTransport`] implementation backed by a [`SimDevice`].
pub struct SimTransport {
    device: SimDevice,
}

impl SimTransport {
    /// Creates a transport for the given device.
    pub fn new(device: SimDevice) -> Self {
        Self { device }
    }

    /// Returns the backing device.
    pub fn device(&self) -> &SimDevice {
        &self.device
    }

    fn state(&self) -> &SimState {
        &self.device.state
    }
}

#[async_trait]
impl OpcUaTransport for SimTransport {
    async fn discover_endpoints(&self) -> OpcUaResult<Vec<EndpointInfo>> {
        Ok(self.state().endpoints.read().await.clone())
    }

    async fn connect(&self, _endpoint: &EndpointInfo) -> OpcUaResult<()> {
        let state = self.state();
        state.connect_attempts.fetch_add(1, Ordering::SeqCst);

        // Scripted transient failures burn down first.
        let remaining = state.fail_connects.load(Ordering::SeqCst);
        if remaining > 0 {
            state.fail_connects.store(remaining - 1, Ordering::SeqCst);
            return Err(OpcUaError::connection(ConnectionError::refused(
                &state.endpoint,
            )));
        }

        state.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> OpcUaResult<()> {
        let state = self.state();
        state.connected.store(false, Ordering::SeqCst);
        // Subscriptions do not survive the session.
        state.subscriptions.write().await.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state().connected.load(Ordering::SeqCst)
    }

    fn endpoint(&self) -> &str {
        &self.state().endpoint
    }

    async fn namespaces(&self) -> OpcUaResult<Vec<String>> {
        self.device.ensure_connected()?;
        Ok(self.state().namespaces.clone())
    }

    async fn read_value(&self, node_id: &NodeId) -> OpcUaResult<ReadResult> {
        self.device.ensure_connected()?;

        let nodes = self.state().nodes.read().await;
        let Some(node) = nodes.get(node_id) else {
            return Ok(ReadResult::failure(node_id.clone(), BAD_NODE_ID_UNKNOWN));
        };

        if node.node_class != NodeClass::Variable {
            return Ok(ReadResult::failure(
                node_id.clone(),
                BAD_ATTRIBUTE_ID_INVALID,
            ));
        }

        Ok(ReadResult::success(node_id.clone(), node.value.clone()))
    }

    async fn read_values(&self, node_ids: &[NodeId]) -> OpcUaResult<Vec<ReadResult>> {
        let mut results = Vec::with_capacity(node_ids.len());
        for node_id in node_ids {
            results.push(self.read_value(node_id).await?);
        }
        Ok(results)
    }

    async fn write_value(&self, node_id: &NodeId, value: Value) -> OpcUaResult<WriteResult> {
        self.device.ensure_connected()?;

        {
            let nodes = self.state().nodes.read().await;
            let Some(node) = nodes.get(node_id) else {
                return Ok(WriteResult::failure(node_id.clone(), BAD_NODE_ID_UNKNOWN));
            };

            if node.node_class != NodeClass::Variable || !node.writable {
                return Ok(WriteResult::failure(node_id.clone(), BAD_NOT_WRITABLE));
            }

            // The stored value pins the variable's type once set.
            if !node.value.is_null()
                && !value.is_null()
                && std::mem::discriminant(&node.value) != std::mem::discriminant(&value)
            {
                return Ok(WriteResult::failure(node_id.clone(), BAD_TYPE_MISMATCH));
            }
        }

        self.device.set_value(node_id, value).await;
        Ok(WriteResult::success(node_id.clone()))
    }

    async fn browse(
        &self,
        node_id: &NodeId,
        direction: BrowseDirection,
        reference_type: ReferenceTypeId,
        node_class_mask: u32,
    ) -> OpcUaResult<Vec<BrowseChild>> {
        self.device.ensure_connected()?;
        self.state().browse_count.fetch_add(1, Ordering::SeqCst);

        let nodes = self.state().nodes.read().await;
        let Some(node) = nodes.get(node_id) else {
            return Err(OpcUaError::bad_status(
                node_id.to_string(),
                BAD_NODE_ID_UNKNOWN,
            ));
        };

        let references: Vec<(NodeId, ReferenceTypeId)> = match direction {
            BrowseDirection::Forward => node.children.clone(),
            BrowseDirection::Inverse => node.parent.clone().into_iter().collect(),
        };

        let mut children = Vec::new();
        for (target_id, actual_reference) in references {
            if !reference_matches(reference_type, actual_reference) {
                continue;
            }

            let Some(target) = nodes.get(&target_id) else {
                continue;
            };

            if node_class_mask != 0 && target.node_class.mask() & node_class_mask == 0 {
                continue;
            }

            children.push(BrowseChild {
                browse_name: qualified_name(&target_id, &target.display_name),
                display_name: target.display_name.clone(),
                node_class: target.node_class,
                reference_type: actual_reference,
                node_id: target_id,
            });
        }

        Ok(children)
    }

    async fn call_method(
        &self,
        object_id: &NodeId,
        method_id: &NodeId,
        input_arguments: Vec<Value>,
    ) -> OpcUaResult<CallResult> {
        self.device.ensure_connected()?;

        let nodes = self.state().nodes.read().await;
        let Some(method) = nodes.get(method_id) else {
            return Ok(CallResult::failure(
                object_id.clone(),
                method_id.clone(),
                BAD_METHOD_INVALID,
            ));
        };

        let owner_matches = method
            .parent
            .as_ref()
            .is_some_and(|(parent, _)| parent == object_id);
        if method.node_class != NodeClass::Method || !owner_matches {
            return Ok(CallResult::failure(
                object_id.clone(),
                method_id.clone(),
                BAD_METHOD_INVALID,
            ));
        }

        match method.display_name.as_str() {
            "Add" => {
                let terms: Vec<f64> = input_arguments
                    .iter()
                    .filter_map(Value::as_f64)
                    .collect();
                if input_arguments.len() != 2 || terms.len() != 2 {
                    return Ok(CallResult::failure(
                        object_id.clone(),
                        method_id.clone(),
                        BAD_ARGUMENTS_MISSING,
                    ));
                }
                Ok(CallResult::success(
                    object_id.clone(),
                    method_id.clone(),
                    vec![Value::Float64(terms[0] + terms[1])],
                ))
            }
            "ResetAlarms" => Ok(CallResult::success(
                object_id.clone(),
                method_id.clone(),
                Vec::new(),
            )),
            _ => Ok(CallResult::failure(
                object_id.clone(),
                method_id.clone(),
                BAD_NOT_EXECUTABLE,
            )),
        }
    }

    async fn create_subscription(
        &self,
        _settings: &SubscriptionSettings,
    ) -> OpcUaResult<SubscriptionId> {
        self.device.ensure_connected()?;

        let state = self.state();
        let id = SubscriptionId(state.next_subscription_id.fetch_add(1, Ordering::SeqCst) + 1);
        state.subscriptions.write().await.insert(
            id,
            SimSubscription {
                sequence: 0,
                items: HashMap::new(),
            },
        );
        Ok(id)
    }

    async fn delete_subscription(&self, subscription_id: SubscriptionId) -> OpcUaResult<()> {
        self.device.ensure_connected()?;

        match self
            .state()
            .subscriptions
            .write()
            .await
            .remove(&subscription_id)
        {
            Some(_) => Ok(()),
            None => Err(OpcUaError::bad_status(
                subscription_id.to_string(),
                BAD_SUBSCRIPTION_ID_INVALID,
            )),
        }
    }

    async fn create_monitored_items(
        &self,
        subscription_id: SubscriptionId,
        node_ids: &[NodeId],
        _settings: &MonitoredItemSettings,
    ) -> OpcUaResult<Vec<MonitoredItemId>> {
        self.device.ensure_connected()?;

        let state = self.state();
        let nodes = state.nodes.read().await;
        for node_id in node_ids {
            if !nodes.contains_key(node_id) {
                return Err(OpcUaError::subscription(
                    SubscriptionError::monitored_item_failed(
                        node_id.to_string(),
                        "Unknown node",
                    ),
                ));
            }
        }
        drop(nodes);

        let mut subscriptions = state.subscriptions.write().await;
        let Some(subscription) = subscriptions.get_mut(&subscription_id) else {
            return Err(OpcUaError::bad_status(
                subscription_id.to_string(),
                BAD_SUBSCRIPTION_ID_INVALID,
            ));
        };

        let mut item_ids = Vec::with_capacity(node_ids.len());
        for node_id in node_ids {
            let item_id = MonitoredItemId(state.next_item_id.fetch_add(1, Ordering::SeqCst) + 1);
            subscription.items.insert(item_id, node_id.clone());
            item_ids.push(item_id);
        }
        Ok(item_ids)
    }

    async fn delete_monitored_items(
        &self,
        subscription_id: SubscriptionId,
        monitored_item_ids: &[MonitoredItemId],
    ) -> OpcUaResult<()> {
        self.device.ensure_connected()?;

        let mut subscriptions = self.state().subscriptions.write().await;
        let Some(subscription) = subscriptions.get_mut(&subscription_id) else {
            return Err(OpcUaError::bad_status(
                subscription_id.to_string(),
                BAD_SUBSCRIPTION_ID_INVALID,
            ));
        };

        for item_id in monitored_item_ids {
            subscription.items.remove(item_id);
        }
        Ok(())
    }

    fn data_changes(&self) -> broadcast::Receiver<DataChangeNotification> {
        self.state().data_tx.subscribe()
    }

    fn keepalives(&self) -> broadcast::Receiver<KeepAliveEvent> {
        self.state().keepalive_tx.subscribe()
    }
}

fn reference_matches(requested: ReferenceTypeId, actual: ReferenceTypeId) -> bool {
    // Organizes and HasComponent are both hierarchical subtypes.
    requested == ReferenceTypeId::HierarchicalReferences || requested == actual
}

fn qualified_name(node_id: &NodeId, name: &str) -> String {
    if node_id.namespace_index == 0 {
        name.to_string()
    } else {
        format!("{}:{}", node_id.namespace_index, name)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    async fn connected_plant() -> (SimDevice, SimTransport) {
        let device = SimDevice::with_default_plant("opc.tcp://localhost:4840").await;
        let transport = SimTransport::new(device.clone());
        let endpoint = EndpointInfo::unsecured("opc.tcp://localhost:4840");
        transport.connect(&endpoint).await.unwrap();
        (device, transport)
    }

    #[tokio::test]
    async fn test_requires_connection() {
        let device = SimDevice::with_default_plant("opc.tcp://localhost:4840").await;
        let transport = SimTransport::new(device);

        let result = transport
            .read_value(&SimDevice::node_id("Plant/Analog/Flow"))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_read_write_round_trip() {
        let (_device, transport) = connected_plant().await;
        let flow = SimDevice::node_id("Plant/Analog/Flow");

        let write = transport
            .write_value(&flow, Value::Float64(2.5))
            .await
            .unwrap();
        assert!(write.is_good());

        let read = transport.read_value(&flow).await.unwrap();
        assert_eq!(read.value, Some(Value::Float64(2.5)));
    }

    #[tokio::test]
    async fn test_unknown_node_reads_bad_status() {
        let (_device, transport) = connected_plant().await;

        let read = transport
            .read_value(&SimDevice::node_id("Plant/Analog/Missing"))
            .await
            .unwrap();
        assert!(read.is_bad());
        assert_eq!(read.status_code, BAD_NODE_ID_UNKNOWN);
    }

    #[tokio::test]
    async fn test_read_only_variable_rejects_write() {
        let (device, transport) = connected_plant().await;
        let parent = SimDevice::node_id("Plant/Analog");
        let total = device
            .add_variable(&parent, "FlowTotal", Value::Float64(10.0), false)
            .await;

        let write = transport.write_value(&total, Value::Float64(0.0)).await.unwrap();
        assert_eq!(write.status_code, BAD_NOT_WRITABLE);
    }

    #[tokio::test]
    async fn test_write_type_mismatch() {
        let (_device, transport) = connected_plant().await;
        let flow = SimDevice::node_id("Plant/Analog/Flow");

        let write = transport
            .write_value(&flow, Value::String("fast".to_string()))
            .await
            .unwrap();
        assert_eq!(write.status_code, BAD_TYPE_MISMATCH);
    }

    #[tokio::test]
    async fn test_browse_forward_filters_node_class() {
        let (_device, transport) = connected_plant().await;
        let analog = SimDevice::node_id("Plant/Analog");

        let all = transport
            .browse(
                &analog,
                BrowseDirection::Forward,
                ReferenceTypeId::HierarchicalReferences,
                NodeClass::HIERARCHY_MASK,
            )
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].display_name, "Flow");
        assert_eq!(all[0].node_class, NodeClass::Variable);
        assert_eq!(all[0].browse_name, "2:Flow");

        let objects_only = transport
            .browse(
                &analog,
                BrowseDirection::Forward,
                ReferenceTypeId::HierarchicalReferences,
                NodeClass::Object.mask(),
            )
            .await
            .unwrap();
        assert!(objects_only.is_empty());
    }

    #[tokio::test]
    async fn test_browse_inverse_finds_component_owner() {
        let (_device, transport) = connected_plant().await;
        let add = SimDevice::node_id("Plant/Methods/Add");

        let parents = transport
            .browse(
                &add,
                BrowseDirection::Inverse,
                ReferenceTypeId::HasComponent,
                0,
            )
            .await
            .unwrap();
        assert_eq!(parents.len(), 1);
        assert_eq!(parents[0].node_id, SimDevice::node_id("Plant/Methods"));
    }

    #[tokio::test]
    async fn test_browse_unknown_node_is_error() {
        let (_device, transport) = connected_plant().await;

        let result = transport
            .browse(
                &SimDevice::node_id("Nowhere"),
                BrowseDirection::Forward,
                ReferenceTypeId::HierarchicalReferences,
                0,
            )
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_call_add_method() {
        let (_device, transport) = connected_plant().await;

        let result = transport
            .call_method(
                &SimDevice::node_id("Plant/Methods"),
                &SimDevice::node_id("Plant/Methods/Add"),
                vec![Value::Float64(2.0), Value::Int64(3)],
            )
            .await
            .unwrap();
        assert!(result.is_good());
        assert_eq!(result.output_arguments, vec![Value::Float64(5.0)]);
    }

    #[tokio::test]
    async fn test_call_add_rejects_bad_arguments() {
        let (_device, transport) = connected_plant().await;

        let result = transport
            .call_method(
                &SimDevice::node_id("Plant/Methods"),
                &SimDevice::node_id("Plant/Methods/Add"),
                vec![Value::Float64(2.0)],
            )
            .await
            .unwrap();
        assert_eq!(result.status_code, BAD_ARGUMENTS_MISSING);
    }

    #[tokio::test]
    async fn test_call_with_wrong_owner_fails() {
        let (_device, transport) = connected_plant().await;

        let result = transport
            .call_method(
                &SimDevice::node_id("Plant/Analog"),
                &SimDevice::node_id("Plant/Methods/Add"),
                vec![Value::Float64(1.0), Value::Float64(2.0)],
            )
            .await
            .unwrap();
        assert_eq!(result.status_code, BAD_METHOD_INVALID);
    }

    #[tokio::test]
    async fn test_scripted_connect_failures() {
        let device = SimDevice::with_default_plant("opc.tcp://localhost:4840").await;
        let transport = SimTransport::new(device.clone());
        let endpoint = EndpointInfo::unsecured("opc.tcp://localhost:4840");

        device.fail_next_connects(2);
        assert!(transport.connect(&endpoint).await.is_err());
        assert!(transport.connect(&endpoint).await.is_err());
        assert!(transport.connect(&endpoint).await.is_ok());
        assert_eq!(device.connect_attempts(), 3);
    }

    #[tokio::test]
    async fn test_set_value_notifies_monitored_items() {
        let (device, transport) = connected_plant().await;
        let flow = SimDevice::node_id("Plant/Analog/Flow");

        let subscription_id = transport
            .create_subscription(&SubscriptionSettings::default())
            .await
            .unwrap();
        let item_ids = transport
            .create_monitored_items(
                subscription_id,
                std::slice::from_ref(&flow),
                &MonitoredItemSettings::default(),
            )
            .await
            .unwrap();

        let mut changes = transport.data_changes();
        device.set_value(&flow, Value::Float64(7.5)).await;

        let notification = changes.recv().await.unwrap();
        assert_eq!(notification.subscription_id, subscription_id);
        assert_eq!(notification.monitored_item_id, item_ids[0]);
        assert_eq!(notification.value, Value::Float64(7.5));
        assert_eq!(notification.sequence_number, 1);
    }

    #[tokio::test]
    async fn test_disconnect_drops_subscriptions() {
        let (device, transport) = connected_plant().await;

        transport
            .create_subscription(&SubscriptionSettings::default())
            .await
            .unwrap();
        assert_eq!(device.subscription_count().await, 1);

        transport.disconnect().await.unwrap();
        assert_eq!(device.subscription_count().await, 0);
    }
}
