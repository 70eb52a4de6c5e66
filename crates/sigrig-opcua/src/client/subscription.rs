// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Live value subscriptions.
//!
//! [`SubscriptionEngine`] turns a list of `(label, path)` signal references
//! into a server-side subscription with one monitored item per signal. Every
//! signal is read once, synchronously, during `subscribe` and delivered
//! through the listener before any change-driven notification, so callers
//! always start from a known value.
//!
//! Change delivery is decoupled from the transport: a router task fans the
//! transport's notification stream out to one latest-wins slot per monitored
//! item, and a dedicated reader task per item invokes the listener. Under a
//! burst of changes only the newest unread value survives. A panicking
//! listener is logged and contained; it never takes down delivery for other
//! items.

use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sigrig_core::{CancelToken, Value};
use tokio::sync::{broadcast, mpsc, watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::browse::AddressResolver;
use crate::error::{ConfigurationError, OpcUaError, OpcUaResult, SubscriptionError};
use crate::types::{MonitoredItemSettings, NodeId, OpcUaConfig, SubscriptionSettings};

use super::accessor::ValueAccessor;
use super::race_cancel;
use super::transport::OpcUaTransport;

// =============================================================================
// Identifiers
// =============================================================================

/// Server-assigned subscription identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub u32);

impl SubscriptionId {
    /// Returns the raw identifier value.
    #[inline]
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl From<u32> for SubscriptionId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Server-assigned monitored item identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MonitoredItemId(pub u32);

impl MonitoredItemId {
    /// Returns the raw identifier value.
    #[inline]
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl From<u32> for MonitoredItemId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for MonitoredItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mi-{}", self.0)
    }
}

// =============================================================================
// DataChangeNotification
// =============================================================================

/// A data change notification pushed by the transport.
#[derive(Debug, Clone)]
pub struct DataChangeNotification {
    /// The subscription this notification belongs to.
    pub subscription_id: SubscriptionId,

    /// The monitored item that changed.
    pub monitored_item_id: MonitoredItemId,

    /// The node that changed.
    pub node_id: NodeId,

    /// The new value.
    pub value: Value,

    /// Status code reported with the value.
    pub status_code: u32,

    /// Timestamp assigned by the data source.
    pub source_timestamp: Option<DateTime<Utc>>,

    /// Timestamp assigned by the server.
    pub server_timestamp: Option<DateTime<Utc>>,

    /// Sequence number within the subscription.
    pub sequence_number: u32,
}

impl DataChangeNotification {
    /// Creates a notification with a good status and no timestamps.
    pub fn new(
        subscription_id: SubscriptionId,
        monitored_item_id: MonitoredItemId,
        node_id: NodeId,
        value: Value,
    ) -> Self {
        Self {
            subscription_id,
            monitored_item_id,
            node_id,
            value,
            status_code: 0,
            source_timestamp: None,
            server_timestamp: None,
            sequence_number: 0,
        }
    }

    /// Sets the source and server timestamps.
    pub fn with_timestamps(
        mut self,
        source: Option<DateTime<Utc>>,
        server: Option<DateTime<Utc>>,
    ) -> Self {
        self.source_timestamp = source;
        self.server_timestamp = server;
        self
    }

    /// Sets the sequence number.
    pub fn with_sequence(mut self, sequence_number: u32) -> Self {
        self.sequence_number = sequence_number;
        self
    }

    /// Sets the status code.
    pub fn with_status(mut self, status_code: u32) -> Self {
        self.status_code = status_code;
        self
    }

    /// Returns `true` if the notification carries a good status.
    #[inline]
    pub fn is_good(&self) -> bool {
        self.status_code & 0x80000000 == 0
    }

    /// Returns `true` if the notification carries a bad status.
    #[inline]
    pub fn is_bad(&self) -> bool {
        self.status_code & 0x80000000 != 0
    }
}

// =============================================================================
// SignalUpdate
// =============================================================================

/// A value delivered to a subscription listener.
#[derive(Debug, Clone)]
pub struct SignalUpdate {
    /// Caller-supplied label for the signal.
    pub label: String,

    /// The resolved node the value came from.
    pub node_id: NodeId,

    /// The value.
    pub value: Value,

    /// Source timestamp of the change, or the read time for the initial
    /// value.
    pub timestamp: DateTime<Utc>,
}

// =============================================================================
// SignalListener
// =============================================================================

/// Receives subscription value updates.
///
/// `on_value` is invoked from dedicated delivery tasks, concurrently across
/// signals. Implementations must not assume single-threaded delivery and
/// should return quickly; a slow listener stalls only its own signal, but a
/// blocked one pins a delivery task.
///
/// Any closure `Fn(SignalUpdate) + Send + Sync` is a listener:
///
/// ```rust,ignore
/// let handle = engine
///     .subscribe(&signals, Arc::new(|update: SignalUpdate| {
///         println!("{} = {}", update.label, update.value);
///     }), &cancel)
///     .await?;
/// ```
pub trait SignalListener: Send + Sync {
    /// Called once per signal with its initial value, then for every
    /// observed change.
    fn on_value(&self, update: SignalUpdate);

    /// Called when a monitored item reports a bad status.
    fn on_error(&self, _error: &OpcUaError) {}
}

impl<F> SignalListener for F
where
    F: Fn(SignalUpdate) + Send + Sync,
{
    fn on_value(&self, update: SignalUpdate) {
        self(update)
    }
}

/// Listener that forwards updates to a bounded channel.
///
/// Useful in tests and for bridging into async consumers.
pub struct ChannelListener {
    sender: mpsc::Sender<SignalUpdate>,
}

impl ChannelListener {
    /// Creates a listener and the receiving end of its channel.
    pub fn with_channel(capacity: usize) -> (Self, mpsc::Receiver<SignalUpdate>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }
}

impl SignalListener for ChannelListener {
    fn on_value(&self, update: SignalUpdate) {
        // Best effort send, ignore errors
        let _ = self.sender.try_send(update);
    }
}

// =============================================================================
// SubscriptionHandle
// =============================================================================

/// A resolved signal inside an active subscription.
#[derive(Debug, Clone)]
pub struct ResolvedSignal {
    /// Caller-supplied label.
    pub label: String,

    /// The node the signal resolved to.
    pub node_id: NodeId,

    /// The monitored item delivering its changes.
    pub monitored_item_id: MonitoredItemId,
}

/// Handle to an active subscription, returned by
/// [`SubscriptionEngine::subscribe`].
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    id: SubscriptionId,
    signals: Vec<ResolvedSignal>,
}

impl SubscriptionHandle {
    /// Returns the subscription identifier.
    #[inline]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Returns the resolved signals in subscription order.
    pub fn signals(&self) -> &[ResolvedSignal] {
        &self.signals
    }

    /// Returns the number of monitored signals.
    pub fn signal_count(&self) -> usize {
        self.signals.len()
    }
}

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} signals)", self.id, self.signals.len())
    }
}

// =============================================================================
// SubscriptionEngine
// =============================================================================

/// Creates and manages live value subscriptions on a transport.
pub struct SubscriptionEngine<T: OpcUaTransport> {
    transport: Arc<T>,
    resolver: AddressResolver<T>,
    accessor: ValueAccessor<T>,
    settings: SubscriptionSettings,
    item_settings: MonitoredItemSettings,
    active: RwLock<HashMap<SubscriptionId, ActiveSubscription>>,
}

struct ActiveSubscription {
    handle: SubscriptionHandle,
    router: JoinHandle<()>,
    readers: Vec<JoinHandle<()>>,
}

impl Drop for ActiveSubscription {
    fn drop(&mut self) {
        // Aborting the router drops the per-item senders, which ends the
        // readers as well; the aborts below cover readers mid-callback.
        self.router.abort();
        for reader in &self.readers {
            reader.abort();
        }
    }
}

impl<T: OpcUaTransport> SubscriptionEngine<T> {
    /// Creates an engine using the subscription settings from `config`.
    pub fn new(transport: Arc<T>, config: &OpcUaConfig) -> Self {
        Self {
            resolver: AddressResolver::new(Arc::clone(&transport)),
            accessor: ValueAccessor::new(Arc::clone(&transport)),
            settings: config.subscription.clone(),
            item_settings: config.monitored_item.clone(),
            transport,
            active: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribes to a list of `(label, path)` signals.
    ///
    /// Each path is resolved, read once, and the initial value is delivered
    /// through `listener` before this method attaches any monitored item, so
    /// no change event can precede the initial value. Monitored items are
    /// committed in a single batched request.
    ///
    /// # Errors
    ///
    /// Fails if the signal list is empty, a path cannot be resolved, an
    /// initial read reports a bad status, or the server rejects the
    /// subscription. A partially created subscription is rolled back.
    pub async fn subscribe(
        &self,
        signals: &[(String, String)],
        listener: Arc<dyn SignalListener>,
        cancel: &CancelToken,
    ) -> OpcUaResult<SubscriptionHandle> {
        if signals.is_empty() {
            return Err(OpcUaError::configuration(
                ConfigurationError::invalid_field("signals", "At least one signal is required"),
            ));
        }

        // Tap the notification stream before any monitored item exists so
        // early changes are buffered rather than lost.
        let change_rx = self.transport.data_changes();

        let subscription_id =
            race_cancel(cancel, self.transport.create_subscription(&self.settings)).await?;

        debug!(
            subscription = %subscription_id,
            signals = signals.len(),
            "Creating subscription"
        );

        match self
            .activate(subscription_id, signals, &listener, change_rx, cancel)
            .await
        {
            Ok(entry) => {
                let handle = entry.handle.clone();
                self.active.write().await.insert(subscription_id, entry);
                Ok(handle)
            }
            Err(error) => {
                self.abandon(subscription_id).await;
                Err(error)
            }
        }
    }

    /// Deletes a subscription and all of its monitored items.
    ///
    /// Unsubscribing an unknown or already removed subscription is a no-op,
    /// not an error.
    pub async fn unsubscribe(
        &self,
        subscription_id: SubscriptionId,
        cancel: &CancelToken,
    ) -> OpcUaResult<()> {
        let Some(entry) = self.active.write().await.remove(&subscription_id) else {
            debug!(subscription = %subscription_id, "Unsubscribe for unknown subscription ignored");
            return Ok(());
        };

        let item_ids: Vec<MonitoredItemId> = entry
            .handle
            .signals()
            .iter()
            .map(|s| s.monitored_item_id)
            .collect();

        // Teardown is best effort; the entry is already gone so delivery
        // has stopped either way.
        if let Err(error) = race_cancel(
            cancel,
            self.transport
                .delete_monitored_items(subscription_id, &item_ids),
        )
        .await
        {
            warn!(subscription = %subscription_id, error = %error, "Failed to delete monitored items");
        }

        if let Err(error) =
            race_cancel(cancel, self.transport.delete_subscription(subscription_id)).await
        {
            warn!(subscription = %subscription_id, error = %error, "Failed to delete subscription");
        }

        debug!(subscription = %subscription_id, "Subscription removed");
        Ok(())
    }

    /// Returns `true` if the subscription is active.
    pub async fn is_active(&self, subscription_id: SubscriptionId) -> bool {
        self.active.read().await.contains_key(&subscription_id)
    }

    /// Returns the number of active subscriptions.
    pub async fn active_count(&self) -> usize {
        self.active.read().await.len()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Resolves, reads, and wires up all signals for a freshly created
    /// subscription.
    async fn activate(
        &self,
        subscription_id: SubscriptionId,
        signals: &[(String, String)],
        listener: &Arc<dyn SignalListener>,
        change_rx: broadcast::Receiver<DataChangeNotification>,
        cancel: &CancelToken,
    ) -> OpcUaResult<ActiveSubscription> {
        // Initial values first: resolve each path, read it, and deliver
        // through the listener before any monitored item exists.
        let mut labelled: Vec<(String, NodeId)> = Vec::with_capacity(signals.len());
        for (label, path) in signals {
            let node_id = self.resolver.resolve(path, cancel).await?;
            let value = self.accessor.read(&node_id, cancel).await?;

            dispatch_update(
                listener,
                SignalUpdate {
                    label: label.clone(),
                    node_id: node_id.clone(),
                    value,
                    timestamp: Utc::now(),
                },
            );

            labelled.push((label.clone(), node_id));
        }

        let node_ids: Vec<NodeId> = labelled.iter().map(|(_, node)| node.clone()).collect();
        let item_ids = race_cancel(
            cancel,
            self.transport
                .create_monitored_items(subscription_id, &node_ids, &self.item_settings),
        )
        .await?;

        if item_ids.len() != node_ids.len() {
            return Err(OpcUaError::subscription(SubscriptionError::creation_failed(
                format!(
                    "Server created {} monitored items for {} requested nodes",
                    item_ids.len(),
                    node_ids.len()
                ),
            )));
        }

        // One latest-wins slot and one reader task per item. The router
        // overwrites unread values, so a burst of changes collapses to the
        // newest one.
        let mut resolved = Vec::with_capacity(labelled.len());
        let mut slots: HashMap<MonitoredItemId, ItemSlot> = HashMap::with_capacity(labelled.len());
        let mut readers = Vec::with_capacity(labelled.len());

        for ((label, node_id), item_id) in labelled.into_iter().zip(item_ids) {
            let (tx, rx) = watch::channel::<Option<SignalUpdate>>(None);

            readers.push(tokio::spawn(read_slot(rx, Arc::clone(listener))));

            slots.insert(
                item_id,
                ItemSlot {
                    label: label.clone(),
                    node_id: node_id.clone(),
                    sender: tx,
                },
            );
            resolved.push(ResolvedSignal {
                label,
                node_id,
                monitored_item_id: item_id,
            });
        }

        let router = tokio::spawn(route_changes(
            subscription_id,
            change_rx,
            slots,
            Arc::clone(listener),
        ));

        Ok(ActiveSubscription {
            handle: SubscriptionHandle {
                id: subscription_id,
                signals: resolved,
            },
            router,
            readers,
        })
    }

    /// Rolls back a subscription that failed during setup.
    async fn abandon(&self, subscription_id: SubscriptionId) {
        if let Err(error) = self.transport.delete_subscription(subscription_id).await {
            debug!(
                subscription = %subscription_id,
                error = %error,
                "Failed to roll back partially created subscription"
            );
        }
    }
}

/// Per-item delivery slot owned by the router.
struct ItemSlot {
    label: String,
    node_id: NodeId,
    sender: watch::Sender<Option<SignalUpdate>>,
}

/// Fans the transport notification stream out to per-item slots.
async fn route_changes(
    subscription_id: SubscriptionId,
    mut change_rx: broadcast::Receiver<DataChangeNotification>,
    slots: HashMap<MonitoredItemId, ItemSlot>,
    listener: Arc<dyn SignalListener>,
) {
    loop {
        match change_rx.recv().await {
            Ok(notification) => {
                if notification.subscription_id != subscription_id {
                    continue;
                }

                let Some(slot) = slots.get(&notification.monitored_item_id) else {
                    trace!(
                        subscription = %subscription_id,
                        item = %notification.monitored_item_id,
                        "Notification for unknown monitored item"
                    );
                    continue;
                };

                if notification.is_bad() {
                    warn!(
                        signal = %slot.label,
                        node_id = %slot.node_id,
                        status_code = format_args!("{:#010x}", notification.status_code),
                        "Monitored item reported bad status"
                    );
                    listener.on_error(&OpcUaError::bad_status(
                        slot.node_id.to_string(),
                        notification.status_code,
                    ));
                    continue;
                }

                let timestamp = notification
                    .source_timestamp
                    .or(notification.server_timestamp)
                    .unwrap_or_else(Utc::now);

                // Overwrites any unread value; only the newest survives.
                let _ = slot.sender.send(Some(SignalUpdate {
                    label: slot.label.clone(),
                    node_id: slot.node_id.clone(),
                    value: notification.value,
                    timestamp,
                }));
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(
                    subscription = %subscription_id,
                    skipped,
                    "Data change stream lagged"
                );
            }
            Err(broadcast::error::RecvError::Closed) => {
                trace!(subscription = %subscription_id, "Data change stream closed");
                break;
            }
        }
    }
}

/// Drains one item slot, invoking the listener for each observed value.
async fn read_slot(
    mut rx: watch::Receiver<Option<SignalUpdate>>,
    listener: Arc<dyn SignalListener>,
) {
    while rx.changed().await.is_ok() {
        let update = rx.borrow_and_update().clone();
        if let Some(update) = update {
            dispatch_update(&listener, update);
        }
    }
}

/// Invokes the listener, containing any panic it raises.
fn dispatch_update(listener: &Arc<dyn SignalListener>, update: SignalUpdate) {
    let label = update.label.clone();
    if catch_unwind(AssertUnwindSafe(|| listener.on_value(update))).is_err() {
        warn!(signal = %label, "Subscription listener panicked; notification dropped");
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display() {
        assert_eq!(SubscriptionId(7).to_string(), "sub-7");
        assert_eq!(MonitoredItemId(12).to_string(), "mi-12");
        assert_eq!(SubscriptionId::from(3).value(), 3);
    }

    #[test]
    fn test_notification_builders() {
        let notification = DataChangeNotification::new(
            SubscriptionId(1),
            MonitoredItemId(2),
            NodeId::string(2, "Plant/Analog/Flow"),
            Value::Float64(2.5),
        )
        .with_sequence(9)
        .with_timestamps(Some(Utc::now()), None);

        assert!(notification.is_good());
        assert_eq!(notification.sequence_number, 9);
        assert!(notification.source_timestamp.is_some());

        let bad = DataChangeNotification::new(
            SubscriptionId(1),
            MonitoredItemId(2),
            NodeId::string(2, "Plant/Analog/Flow"),
            Value::Null,
        )
        .with_status(0x80620000);
        assert!(bad.is_bad());
    }

    #[test]
    fn test_closure_listener() {
        let received = std::sync::Mutex::new(Vec::new());
        let listener = |update: SignalUpdate| {
            received.lock().unwrap().push(update.value.clone());
        };

        listener.on_value(SignalUpdate {
            label: "flow".to_string(),
            node_id: NodeId::string(2, "Plant/Analog/Flow"),
            value: Value::Float64(1.0),
            timestamp: Utc::now(),
        });

        assert_eq!(received.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_channel_listener_forwards_updates() {
        let (listener, mut rx) = ChannelListener::with_channel(4);

        listener.on_value(SignalUpdate {
            label: "state".to_string(),
            node_id: NodeId::string(2, "Plant/Process/State"),
            value: Value::String("Idle".to_string()),
            timestamp: Utc::now(),
        });

        let update = rx.recv().await.unwrap();
        assert_eq!(update.label, "state");
        assert_eq!(update.value.as_str(), Some("Idle"));
    }

    #[test]
    fn test_dispatch_contains_panic() {
        let listener: Arc<dyn SignalListener> = Arc::new(|_update: SignalUpdate| {
            panic!("listener bug");
        });

        // Must not propagate
        dispatch_update(
            &listener,
            SignalUpdate {
                label: "flow".to_string(),
                node_id: NodeId::string(2, "Plant/Analog/Flow"),
                value: Value::Float64(0.0),
                timestamp: Utc::now(),
            },
        );
    }
}
