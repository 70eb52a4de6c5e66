// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA client runtime for the sigrig signal-testing toolkit.
//!
//! This crate provides the protocol side of sigrig: session management with
//! endpoint discovery and bounded retry, address-space browsing and path
//! resolution, attribute read/write, method invocation, and subscription-based
//! data change delivery. The whole runtime is written against the
//! [`client::OpcUaTransport`] trait, so it runs unchanged against the
//! in-process device simulator in [`sim`].
//!
//! # Features
//!
//! - Session lifecycle with endpoint discovery and bounded reconnect
//! - Browse-path resolution with a literal node-id fast path
//! - Read/Write operations on resolved nodes
//! - Method invocation with automatic owner lookup
//! - Subscription engine with per-item latest-wins delivery
//! - In-process simulated device for tests and demos
//!
//! # Error Handling
//!
//! This crate provides a comprehensive error hierarchy through the [`error`] module:
//!
//! ```text
//! OpcUaError
//! ├── Connection    - Discovery, endpoint, and retry issues
//! ├── Session       - Session lifecycle errors
//! ├── Browse        - Address-space navigation failures
//! ├── Operation     - Read, write, and method call failures
//! ├── Subscription  - Subscription and monitored-item errors
//! ├── Configuration - Invalid settings
//! └── Cancelled     - Cooperative cancellation
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use sigrig_core::CancelToken;
//! use sigrig_opcua::{ConnectionManager, OpcUaConfig, SimDevice, SimTransport, ValueAccessor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let device = SimDevice::with_default_plant("opc.tcp://localhost:4840").await;
//!     let transport = Arc::new(SimTransport::new(device));
//!
//!     let config = OpcUaConfig::builder()
//!         .endpoint("opc.tcp://localhost:4840")
//!         .build()?;
//!
//!     let manager = ConnectionManager::new(Arc::clone(&transport), config);
//!     let cancel = CancelToken::new();
//!     let session = manager.connect(&cancel).await?;
//!
//!     let accessor = ValueAccessor::new(transport);
//!     let flow = accessor
//!         .read_by_path("ns=2;s=Plant/Analog/Flow", &cancel)
//!         .await?;
//!     println!("Flow: {}", flow);
//!
//!     session.close().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod browse;
pub mod client;
pub mod error;
pub mod sim;
pub mod types;

// Re-export commonly used types
pub use error::{
    BrowseError, ConfigurationError, ConnectionError, ErrorSeverity, OpcUaError, OpcUaResult,
    OperationError, SessionError, SubscriptionError,
};

pub use types::{
    AttributeId, BrowseDirection, EndpointInfo, MonitoredItemSettings, NodeClass, NodeId,
    NodeIdentifier, OpcUaConfig, OpcUaConfigBuilder, ReferenceTypeId, SecurityMode,
    SecurityPolicy, SubscriptionSettings, UserTokenType,
};

// Re-export client types
pub use client::{
    BrowseChild, CallResult, ConnectionManager, KeepAliveEvent, MethodInvoker, OpcUaTransport,
    ReadResult, SessionHandle, SessionState, ValueAccessor, WriteResult,
};

// Re-export subscription types
pub use client::{
    ChannelListener, DataChangeNotification, MonitoredItemId, ResolvedSignal, SignalListener,
    SignalUpdate, SubscriptionEngine, SubscriptionHandle, SubscriptionId,
};

// Re-export browse types
pub use browse::{AddressResolver, Browser};

// Re-export simulator types
pub use sim::{SimDevice, SimTransport, SIM_NAMESPACE};
