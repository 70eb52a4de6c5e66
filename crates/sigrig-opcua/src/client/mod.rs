// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA client runtime.
//!
//! The runtime is layered; every component talks to the transport trait,
//! never to a concrete protocol stack:
//!
//! ```text
//! +----------------------------------------------------------------+
//! |                       SubscriptionEngine                       |
//! |      initial reads, monitored items, change-event routing      |
//! +--------------------+--------------------+----------------------+
//! |   ValueAccessor    |   MethodInvoker    |  Browser / Resolver  |
//! |    read / write    |  call, parent_of   |     path walking     |
//! +--------------------+--------------------+----------------------+
//! |                       ConnectionManager                        |
//! |   discovery, endpoint selection, bounded retry, keepalive      |
//! +----------------------------------------------------------------+
//! |                        OpcUaTransport                          |
//! |        protocol backend (in-process simulator in tests)        |
//! +----------------------------------------------------------------+
//! ```
//!
//! Sessions are explicit: [`ConnectionManager::connect`] yields a
//! [`SessionHandle`] that the caller owns and must close. Nothing in this
//! module caches a session globally.

use std::future::Future;

use sigrig_core::CancelToken;

use crate::error::{OpcUaError, OpcUaResult};

mod accessor;
mod method;
mod session;
pub mod subscription;
pub mod transport;

pub use accessor::ValueAccessor;
pub use method::MethodInvoker;
pub use session::{ConnectionManager, SessionHandle, SessionState};
pub use subscription::{
    ChannelListener, DataChangeNotification, MonitoredItemId, ResolvedSignal, SignalListener,
    SignalUpdate, SubscriptionEngine, SubscriptionHandle, SubscriptionId,
};
pub use transport::{
    BrowseChild, CallResult, KeepAliveEvent, OpcUaTransport, ReadResult, WriteResult,
};

/// Races an operation against the cancellation token.
///
/// Returns `Cancelled` if the token fires first; an already cancelled token
/// wins even when the operation is ready.
pub(crate) async fn race_cancel<T, F>(cancel: &CancelToken, operation: F) -> OpcUaResult<T>
where
    F: Future<Output = OpcUaResult<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(OpcUaError::cancelled()),
        result = operation => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_race_cancel_passes_through_result() {
        let cancel = CancelToken::new();
        let result = race_cancel(&cancel, async { Ok(42) }).await.unwrap();
        assert_eq!(result, 42);
    }

    #[tokio::test]
    async fn test_race_cancel_prefers_cancellation() {
        let cancel = CancelToken::new();
        cancel.cancel();

        let result: OpcUaResult<i32> = race_cancel(&cancel, async { Ok(42) }).await;
        assert!(matches!(result, Err(OpcUaError::Cancelled)));
    }
}
