//! Response delivery.
//!
//! Decides where a JSON-RPC response goes once the handler has produced it:
//! onto the stream named by the request, back in the HTTP body, or (when
//! configured) onto every open stream.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use pmcp_protocol::McpResponse;
use serde_json::json;
use tracing::{debug, warn};

use crate::connection::Frame;
use crate::registry::ConnectionRegistry;

/// What to do with a response whose request named no connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnroutedPolicy {
    /// Return it in the HTTP response body.
    #[default]
    Direct,
    /// Push it to every open stream. Falls back to direct when none are open.
    Broadcast,
}

impl UnroutedPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Broadcast => "broadcast",
        }
    }
}

impl fmt::Display for UnroutedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnroutedPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "direct" => Ok(Self::Direct),
            "broadcast" => Ok(Self::Broadcast),
            other => Err(format!("unknown unrouted policy '{other}' (expected direct or broadcast)")),
        }
    }
}

/// Outcome of a successful delivery, rendered as the POST's HTTP response.
#[derive(Debug)]
pub enum Delivery {
    /// Notification; nothing to send.
    Acknowledged,
    /// Queued on the named stream.
    Routed { connection_id: String },
    /// Queued on every open stream.
    Broadcast { recipients: usize },
    /// Returned in the HTTP body.
    Direct(McpResponse),
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Connection not found: {0}")]
    UnknownConnection(String),
    #[error("Connection closed before the response could be delivered: {0}")]
    ConnectionClosed(String),
    #[error("Failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

impl IntoResponse for Delivery {
    fn into_response(self) -> Response {
        match self {
            Delivery::Acknowledged => StatusCode::ACCEPTED.into_response(),
            Delivery::Routed { connection_id } => (
                StatusCode::ACCEPTED,
                Json(json!({
                    "success": true,
                    "status": "received",
                    "connectionId": connection_id,
                })),
            )
                .into_response(),
            Delivery::Broadcast { recipients } => (
                StatusCode::ACCEPTED,
                Json(json!({
                    "success": true,
                    "status": "broadcast",
                    "recipients": recipients,
                })),
            )
                .into_response(),
            Delivery::Direct(response) => (StatusCode::OK, Json(response)).into_response(),
        }
    }
}

impl IntoResponse for DeliveryError {
    fn into_response(self) -> Response {
        let (status, connection_id) = match &self {
            DeliveryError::UnknownConnection(id) => (StatusCode::BAD_REQUEST, Some(id.clone())),
            DeliveryError::ConnectionClosed(id) => {
                (StatusCode::INTERNAL_SERVER_ERROR, Some(id.clone()))
            }
            DeliveryError::Encode(_) => (StatusCode::INTERNAL_SERVER_ERROR, None),
        };
        (
            status,
            Json(json!({
                "error": self.to_string(),
                "connectionId": connection_id,
            })),
        )
            .into_response()
    }
}

/// Routes responses to streams according to the request's target.
#[derive(Debug, Clone)]
pub struct DeliveryRouter {
    registry: Arc<ConnectionRegistry>,
    policy: UnroutedPolicy,
}

impl DeliveryRouter {
    pub fn new(registry: Arc<ConnectionRegistry>, policy: UnroutedPolicy) -> Self {
        Self { registry, policy }
    }

    pub fn policy(&self) -> UnroutedPolicy {
        self.policy
    }

    /// Deliver `response` (or nothing, for a notification).
    pub async fn deliver(
        &self,
        response: Option<McpResponse>,
        target: Option<&str>,
    ) -> Result<Delivery, DeliveryError> {
        let Some(response) = response else {
            return Ok(Delivery::Acknowledged);
        };

        match target {
            Some(id) => self.deliver_to(id, &response).await,
            None => match self.policy {
                UnroutedPolicy::Direct => Ok(Delivery::Direct(response)),
                UnroutedPolicy::Broadcast => self.broadcast(response).await,
            },
        }
    }

    async fn deliver_to(&self, id: &str, response: &McpResponse) -> Result<Delivery, DeliveryError> {
        let conn = self
            .registry
            .get(id)
            .ok_or_else(|| DeliveryError::UnknownConnection(id.to_string()))?;
        let payload = serde_json::to_string(response)?;

        if conn.send(Frame::Rpc(payload)).await.is_err() {
            self.registry.mark_disconnected(id);
            return Err(DeliveryError::ConnectionClosed(id.to_string()));
        }
        debug!("Response routed to {id}");
        Ok(Delivery::Routed {
            connection_id: id.to_string(),
        })
    }

    async fn broadcast(&self, response: McpResponse) -> Result<Delivery, DeliveryError> {
        let connections = self.registry.all();
        if connections.is_empty() {
            debug!("No open streams, answering unrouted response directly");
            return Ok(Delivery::Direct(response));
        }

        let payload = serde_json::to_string(&response)?;
        let mut recipients = 0;
        for conn in connections {
            match conn.send(Frame::Rpc(payload.clone())).await {
                Ok(()) => recipients += 1,
                Err(e) => {
                    warn!("Broadcast skipped: {e}");
                    self.registry.mark_disconnected(&conn.id);
                }
            }
        }

        if recipients == 0 {
            return Ok(Delivery::Direct(response));
        }
        Ok(Delivery::Broadcast { recipients })
    }
}
