// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session lifecycle management.
//!
//! [`ConnectionManager`] owns the connect state machine:
//!
//! ```text
//! Disconnected -> Discovering -> Connecting -> Connected
//!                      ^              |
//!                      +--- retry ----+        -> Failed (attempts exhausted
//!                                                 or non-transient error)
//! ```
//!
//! Discovery and endpoint selection run on every attempt. Transient failures
//! retry with a fixed delay up to the configured attempt limit; a
//! non-transient failure (no matching endpoint, cancellation) fails
//! immediately. Concurrent connect calls serialize through a single-slot
//! gate; a caller that queues behind a successful connect receives a handle
//! to that session instead of racing its own discovery.
//!
//! A successful connect yields a [`SessionHandle`], a scoped resource whose
//! `close` releases the channel exactly once from any exit path. The
//! keepalive observer spawned with it only reports bad statuses; it never
//! reconnects on its own.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sigrig_core::CancelToken;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::error::{ConnectionError, OpcUaError, OpcUaResult, SessionError};
use crate::types::{EndpointInfo, OpcUaConfig};

use super::race_cancel;
use super::transport::OpcUaTransport;

// =============================================================================
// SessionState
// =============================================================================

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No session exists.
    #[default]
    Disconnected,

    /// Discovering server endpoints.
    Discovering,

    /// Establishing the session on a selected endpoint.
    Connecting,

    /// Session is active.
    Connected,

    /// Connect attempts exhausted or a non-transient failure occurred.
    Failed,

    /// Session was closed by its owner.
    Closed,
}

impl SessionState {
    /// Returns `true` if a session is active.
    #[inline]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns `true` if a connect attempt is in progress.
    #[inline]
    pub fn is_transitioning(&self) -> bool {
        matches!(self, Self::Discovering | Self::Connecting)
    }

    /// Returns `true` if no further activity will happen without a new
    /// connect call.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed | Self::Closed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Discovering => write!(f, "Discovering"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Failed => write!(f, "Failed"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

// =============================================================================
// SessionHandle
// =============================================================================

/// Shared state of one established session.
struct SessionCore {
    generation: u64,
    endpoint: String,
    session_name: String,
    connected_at: DateTime<Utc>,
    closed: AtomicBool,
    keepalive_task: JoinHandle<()>,
}

impl Drop for SessionCore {
    fn drop(&mut self) {
        if !*self.closed.get_mut() {
            warn!(
                endpoint = %self.endpoint,
                generation = self.generation,
                "Session dropped without close"
            );
        }
        self.keepalive_task.abort();
    }
}

/// Scoped handle to an established session.
///
/// The handle carries the session generation: a consumer that stored a
/// generation number can compare it against a freshly obtained handle to
/// detect that a reconnect happened in between.
pub struct SessionHandle<T: OpcUaTransport> {
    core: Arc<SessionCore>,
    transport: Arc<T>,
    state: Arc<RwLock<SessionState>>,
}

impl<T: OpcUaTransport> SessionHandle<T> {
    /// Returns the session generation. Increments on every successful
    /// connect, never reused.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.core.generation
    }

    /// Returns the endpoint URL this session is connected to.
    pub fn endpoint(&self) -> &str {
        &self.core.endpoint
    }

    /// Returns the session name presented to the server.
    pub fn session_name(&self) -> &str {
        &self.core.session_name
    }

    /// Returns when the session was established.
    pub fn connected_at(&self) -> DateTime<Utc> {
        self.core.connected_at
    }

    /// Returns `true` if this session has been closed.
    pub fn is_closed(&self) -> bool {
        self.core.closed.load(Ordering::SeqCst)
    }

    /// Closes the session and releases the underlying channel.
    ///
    /// The channel is released exactly once no matter how many handles to
    /// this session exist or how often `close` is called; later calls are
    /// no-ops.
    pub async fn close(&self) -> OpcUaResult<()> {
        if self.core.closed.swap(true, Ordering::SeqCst) {
            debug!(generation = self.core.generation, "Session already closed");
            return Ok(());
        }

        self.core.keepalive_task.abort();
        transition(&self.state, SessionState::Closed).await;

        match self.transport.disconnect().await {
            Ok(()) => {
                info!(
                    endpoint = %self.core.endpoint,
                    generation = self.core.generation,
                    "Session closed"
                );
                Ok(())
            }
            Err(disconnect_error) => Err(OpcUaError::session(SessionError::close_failed(
                disconnect_error.to_string(),
            ))),
        }
    }
}

impl<T: OpcUaTransport> fmt::Debug for SessionHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("generation", &self.core.generation)
            .field("endpoint", &self.core.endpoint)
            .field("closed", &self.is_closed())
            .finish()
    }
}

// =============================================================================
// ConnectionManager
// =============================================================================

/// Establishes sessions with discovery, endpoint selection, and bounded
/// retry.
pub struct ConnectionManager<T: OpcUaTransport> {
    transport: Arc<T>,
    config: OpcUaConfig,
    state: Arc<RwLock<SessionState>>,
    current: RwLock<Option<Arc<SessionCore>>>,
    connect_gate: Mutex<()>,
    generation: AtomicU64,
}

impl<T: OpcUaTransport> ConnectionManager<T> {
    /// Creates a manager for the given transport and configuration.
    pub fn new(transport: Arc<T>, config: OpcUaConfig) -> Self {
        Self {
            transport,
            config,
            state: Arc::new(RwLock::new(SessionState::Disconnected)),
            current: RwLock::new(None),
            connect_gate: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    /// Returns the current lifecycle state.
    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    /// Returns the configuration in use.
    pub fn config(&self) -> &OpcUaConfig {
        &self.config
    }

    /// Returns `true` if the transport currently holds a session.
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Connects to the configured endpoint, retrying transient failures.
    ///
    /// Only one connect attempt runs at a time; concurrent callers queue on
    /// an internal gate. A caller that acquires the gate while a session is
    /// already established receives a handle to that session.
    ///
    /// # Errors
    ///
    /// - `NoUnsecuredEndpoint` / `NoSuitableEndpoint` if the server offers
    ///   no endpoint matching the configured security, without retrying
    /// - `AttemptsExhausted` once `max_retries` transient failures occurred
    /// - `Cancelled` if the token fires at any point
    pub async fn connect(&self, cancel: &CancelToken) -> OpcUaResult<SessionHandle<T>> {
        let _gate = self.connect_gate.lock().await;

        // A queued caller observes the outcome of the connect that held the
        // gate before it instead of racing its own discovery.
        if self.transport.is_connected() {
            if let Some(core) = self.current.read().await.as_ref() {
                if !core.closed.load(Ordering::SeqCst) {
                    debug!(generation = core.generation, "Reusing established session");
                    return Ok(self.handle_for(Arc::clone(core)));
                }
            }
        }

        let max_retries = self.config.max_retries;
        let retry_delay = self.config.retry_delay;

        for attempt in 1..=max_retries {
            if cancel.is_cancelled() {
                return Err(OpcUaError::cancelled());
            }

            match self.try_connect(cancel).await {
                Ok(endpoint) => {
                    let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
                    info!(
                        endpoint = %endpoint.url,
                        attempt,
                        max_retries,
                        generation,
                        "Connected to OPC UA server"
                    );

                    transition(&self.state, SessionState::Connected).await;

                    let core = Arc::new(SessionCore {
                        generation,
                        endpoint: endpoint.url,
                        session_name: self.config.effective_session_name(),
                        connected_at: Utc::now(),
                        closed: AtomicBool::new(false),
                        keepalive_task: spawn_keepalive_observer(
                            self.transport.keepalives(),
                            generation,
                        ),
                    });
                    *self.current.write().await = Some(Arc::clone(&core));

                    return Ok(self.handle_for(core));
                }
                Err(connect_error) if connect_error.is_retryable() && attempt < max_retries => {
                    warn!(
                        attempt,
                        max_retries,
                        error = %connect_error,
                        retry_delay = ?retry_delay,
                        "Failed to connect to OPC UA server, retrying"
                    );

                    tokio::select! {
                        _ = cancel.cancelled() => return Err(OpcUaError::cancelled()),
                        _ = tokio::time::sleep(retry_delay) => {}
                    }
                }
                Err(connect_error) if connect_error.is_retryable() => {
                    warn!(
                        attempt,
                        max_retries,
                        error = %connect_error,
                        "Failed to connect to OPC UA server, attempts exhausted"
                    );
                    break;
                }
                Err(connect_error @ OpcUaError::Cancelled) => {
                    transition(&self.state, SessionState::Disconnected).await;
                    return Err(connect_error);
                }
                Err(connect_error) => {
                    transition(&self.state, SessionState::Failed).await;
                    return Err(connect_error);
                }
            }
        }

        transition(&self.state, SessionState::Failed).await;
        let exhausted = OpcUaError::attempts_exhausted(&self.config.endpoint, max_retries);
        error!(
            endpoint = %self.config.endpoint,
            attempts = max_retries,
            "Connection attempts exhausted"
        );
        Err(exhausted)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Runs one discovery and connect cycle.
    async fn try_connect(&self, cancel: &CancelToken) -> OpcUaResult<EndpointInfo> {
        transition(&self.state, SessionState::Discovering).await;
        let endpoints = race_cancel(cancel, self.transport.discover_endpoints()).await?;
        debug!(endpoints = endpoints.len(), "Discovered endpoints");

        let endpoint = select_endpoint(&self.config, &endpoints)?;

        transition(&self.state, SessionState::Connecting).await;
        race_cancel(cancel, self.transport.connect(&endpoint)).await?;

        if let Ok(namespaces) = self.transport.namespaces().await {
            debug!(namespaces = namespaces.len(), "Captured namespace array");
        }

        Ok(endpoint)
    }

    fn handle_for(&self, core: Arc<SessionCore>) -> SessionHandle<T> {
        SessionHandle {
            core,
            transport: Arc::clone(&self.transport),
            state: Arc::clone(&self.state),
        }
    }
}

/// Selects the endpoint matching the configured security requirements.
fn select_endpoint(
    config: &OpcUaConfig,
    endpoints: &[EndpointInfo],
) -> OpcUaResult<EndpointInfo> {
    if endpoints.is_empty() {
        return Err(OpcUaError::connection(ConnectionError::discovery_failed(
            &config.endpoint,
            "Server returned no endpoints",
        )));
    }

    if !config.uses_security() {
        return endpoints
            .iter()
            .find(|endpoint| endpoint.is_unsecured())
            .cloned()
            .ok_or_else(|| {
                OpcUaError::no_unsecured_endpoint(EndpointInfo::describe_all(endpoints))
            });
    }

    endpoints
        .iter()
        .filter(|endpoint| {
            endpoint.security_mode == config.security_mode
                && endpoint.security_policy == config.security_policy
        })
        .max_by_key(|endpoint| endpoint.security_level)
        .cloned()
        .ok_or_else(|| {
            OpcUaError::connection(ConnectionError::no_suitable_endpoint(
                config.security_mode.name(),
            ))
        })
}

/// Logs keepalive health. Reconnection stays with the session owner.
fn spawn_keepalive_observer(
    mut keepalives: broadcast::Receiver<super::transport::KeepAliveEvent>,
    generation: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match keepalives.recv().await {
                Ok(event) if event.is_bad() => {
                    warn!(
                        generation,
                        status_code = format_args!("{:#010x}", event.status_code),
                        "Session keepalive reported bad status"
                    );
                }
                Ok(_) => {
                    trace!(generation, "Session keepalive");
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(generation, skipped, "Keepalive stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

async fn transition(state: &RwLock<SessionState>, next: SessionState) {
    let mut guard = state.write().await;
    if *guard != next {
        trace!(from = %*guard, to = %next, "Session state changed");
        *guard = next;
    }
}

// =============================================================================
// Tests
// =============================================================================
