//! Request context: per-connection state threaded through request handling.
//!
//! Every open stream owns a [`SessionState`]. A POST tagged with that
//! stream's connection identifier is dispatched with a [`RequestContext`]
//! pointing at it, so `initialize` on one stream never authorizes another.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Logical MCP session state attached to one stream connection.
#[derive(Debug, Default)]
pub struct SessionState {
    initialized: AtomicBool,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the session initialized. There is no way back.
    pub fn mark_initialized(&self) {
        self.initialized.store(true, Ordering::Release);
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }
}

/// Context for a single request, carrying connection-level state.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Connection the response is routed to, if the request named one.
    pub connection_id: Option<String>,
    /// Session of that connection. `None` for stateless (direct) requests.
    pub session: Option<Arc<SessionState>>,
}

impl RequestContext {
    /// Context for a request that is not bound to any stream.
    pub fn stateless() -> Self {
        Self::default()
    }

    pub fn for_connection(connection_id: impl Into<String>, session: Arc<SessionState>) -> Self {
        Self {
            connection_id: Some(connection_id.into()),
            session: Some(session),
        }
    }
}
