//! MCP Transport Layer
//!
//! Server-Sent Events transport for the MCP server. The transport handles:
//! - Stream lifecycle (open, keep-alive, close)
//! - Connection registry and per-stream session state
//! - Routing JSON-RPC responses to the stream a request named
//!
//! The transport is decoupled from the server logic via the `RequestHandler` trait.

pub mod connection;
pub mod delivery;
pub mod registry;
pub mod server;

pub use connection::{Connection, ConnectionClosed, Frame, QUEUE_CAPACITY, generate_connection_id};
pub use delivery::{Delivery, DeliveryError, DeliveryRouter, UnroutedPolicy};
pub use registry::ConnectionRegistry;
pub use server::{
    CONNECTION_ID_HEADER, KEEPALIVE_INTERVAL, RequestHandler, TransportConfig, TransportServer,
    build_router,
};
