//! Account connection lookup.
//!
//! Token acquisition and refresh are external concerns; the engine only
//! consumes a validity flag, the platform identity, and an opaque
//! credentials handle. Tokens themselves are never stored or decrypted
//! here.

use crate::error::ConnectionError;
use amber_relay_core::ConnectionId;
use amber_relay_workflow::Platform;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// The engine-visible view of a platform account connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionHandle {
    /// The connection's ID.
    pub id: ConnectionId,
    /// The platform this connection posts to.
    pub platform: Platform,
    /// Whether the stored token is currently usable.
    pub valid: bool,
    /// Opaque handle the publisher passes to the platform client.
    pub credentials_handle: String,
}

impl ConnectionHandle {
    /// Creates a valid connection handle.
    #[must_use]
    pub fn valid(id: ConnectionId, platform: Platform) -> Self {
        Self {
            id,
            platform,
            valid: true,
            credentials_handle: format!("cred_{id}"),
        }
    }

    /// Creates an expired/invalid connection handle.
    #[must_use]
    pub fn expired(id: ConnectionId, platform: Platform) -> Self {
        Self {
            valid: false,
            ..Self::valid(id, platform)
        }
    }
}

/// Trait for the external connection-lookup collaborator.
#[async_trait]
pub trait ConnectionLookup: Send + Sync {
    /// Resolves a connection ID to its current handle.
    ///
    /// # Errors
    ///
    /// Returns an error when the connection is unknown or the lookup
    /// service fails.
    async fn lookup(&self, id: ConnectionId) -> Result<ConnectionHandle, ConnectionError>;
}

/// An in-memory connection registry for tests and local development.
#[derive(Debug, Default)]
pub struct StaticConnections {
    handles: Mutex<HashMap<ConnectionId, ConnectionHandle>>,
}

impl StaticConnections {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handle.
    pub fn insert(&self, handle: ConnectionHandle) {
        self.handles.lock().unwrap().insert(handle.id, handle);
    }
}

#[async_trait]
impl ConnectionLookup for StaticConnections {
    async fn lookup(&self, id: ConnectionId) -> Result<ConnectionHandle, ConnectionError> {
        self.handles
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(ConnectionError::NotFound { id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lookup_returns_registered_handle() {
        let connections = StaticConnections::new();
        let id = ConnectionId::new();
        connections.insert(ConnectionHandle::valid(id, Platform::LinkedIn));

        let handle = connections.lookup(id).await.unwrap();
        assert!(handle.valid);
        assert_eq!(handle.platform, Platform::LinkedIn);
    }

    #[tokio::test]
    async fn lookup_unknown_connection_fails() {
        let connections = StaticConnections::new();
        let result = connections.lookup(ConnectionId::new()).await;
        assert!(matches!(result, Err(ConnectionError::NotFound { .. })));
    }

    #[test]
    fn expired_handle_is_invalid() {
        let handle = ConnectionHandle::expired(ConnectionId::new(), Platform::X);
        assert!(!handle.valid);
    }
}
