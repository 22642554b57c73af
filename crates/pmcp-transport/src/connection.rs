//! Stream connection state.
//!
//! A [`Connection`] is the write side of one open SSE stream. Every frame
//! headed for the stream goes through its bounded queue, so the greeting,
//! keep-alive comments and routed responses never interleave mid-frame.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use axum::response::sse::Event;
use parking_lot::Mutex;
use pmcp_protocol::{RequestContext, SessionState};
use serde_json::Value;
use tokio::sync::{Notify, mpsc};

/// Frames buffered per stream before senders start waiting.
pub const QUEUE_CAPACITY: usize = 256;

/// One unit written to a stream.
#[derive(Debug, Clone)]
pub enum Frame {
    /// Server lifecycle event (`event: system`).
    System(Value),
    /// Serialized JSON-RPC response (`event: mcp`).
    Rpc(String),
    /// Keep-alive comment carrying a unix-millis timestamp.
    KeepAlive(i64),
}

impl Frame {
    pub fn into_event(self) -> Event {
        match self {
            Frame::System(value) => Event::default().event("system").data(value.to_string()),
            Frame::Rpc(payload) => Event::default().event("mcp").data(payload),
            Frame::KeepAlive(ts) => Event::default().comment(format!("keepalive {ts}")),
        }
    }
}

/// The stream's queue is gone; the client went away.
#[derive(Debug, Clone, thiserror::Error)]
#[error("connection {0} is closed")]
pub struct ConnectionClosed(pub String);

/// A live server-to-client stream.
#[derive(Debug)]
pub struct Connection {
    /// Unique connection ID (`conn_<millis>_<hex>`)
    pub id: String,
    /// When the stream was opened
    pub connected_at: Instant,
    connected: AtomicBool,
    last_activity: Mutex<Instant>,
    session: Arc<SessionState>,
    tx: mpsc::Sender<Frame>,
    close: Notify,
}

impl Connection {
    /// Create a connection and the receiving half its stream drains.
    pub fn new(id: impl Into<String>) -> (Arc<Self>, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let now = Instant::now();
        let conn = Arc::new(Self {
            id: id.into(),
            connected_at: now,
            connected: AtomicBool::new(true),
            last_activity: Mutex::new(now),
            session: Arc::new(SessionState::new()),
            tx,
            close: Notify::new(),
        });
        (conn, rx)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire) && !self.tx.is_closed()
    }

    pub fn session(&self) -> Arc<SessionState> {
        self.session.clone()
    }

    /// Request context for POSTs bound to this stream.
    pub fn context(&self) -> RequestContext {
        RequestContext::for_connection(self.id.clone(), self.session.clone())
    }

    pub fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    pub fn last_activity(&self) -> Instant {
        *self.last_activity.lock()
    }

    /// Queue a frame, waiting for room if the client is reading slowly.
    pub async fn send(&self, frame: Frame) -> Result<(), ConnectionClosed> {
        if !self.connected.load(Ordering::Acquire) {
            return Err(ConnectionClosed(self.id.clone()));
        }
        match self.tx.send(frame).await {
            Ok(()) => {
                self.touch();
                Ok(())
            }
            Err(_) => {
                self.connected.store(false, Ordering::Release);
                Err(ConnectionClosed(self.id.clone()))
            }
        }
    }

    /// Queue a frame only if there is room. `Ok(false)` means the queue was full.
    pub fn try_send(&self, frame: Frame) -> Result<bool, ConnectionClosed> {
        if !self.connected.load(Ordering::Acquire) {
            return Err(ConnectionClosed(self.id.clone()));
        }
        match self.tx.try_send(frame) {
            Ok(()) => {
                self.touch();
                Ok(true)
            }
            Err(mpsc::error::TrySendError::Full(_)) => Ok(false),
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.connected.store(false, Ordering::Release);
                Err(ConnectionClosed(self.id.clone()))
            }
        }
    }

    /// Mark the connection dead and end its stream.
    pub fn close(&self) {
        self.connected.store(false, Ordering::Release);
        self.close.notify_one();
    }

    /// Resolves once [`Connection::close`] has been called.
    pub async fn close_requested(&self) {
        self.close.notified().await;
    }

    /// Resolves once the stream's receiving half is dropped.
    pub async fn closed(&self) {
        self.tx.closed().await;
    }
}

/// `conn_<unix-millis>_<16 hex digits>`
pub fn generate_connection_id() -> String {
    format!(
        "conn_{}_{:016x}",
        chrono::Utc::now().timestamp_millis(),
        rand::random::<u64>()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_ids_are_unique_and_shaped() {
        let a = generate_connection_id();
        let b = generate_connection_id();
        assert_ne!(a, b);

        let parts: Vec<&str> = a.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "conn");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), 16);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn frames_arrive_in_queue_order() {
        let (conn, mut rx) = Connection::new("conn_1");
        conn.send(Frame::Rpc("one".into())).await.unwrap();
        conn.send(Frame::KeepAlive(5)).await.unwrap();
        conn.send(Frame::Rpc("two".into())).await.unwrap();

        assert!(matches!(rx.recv().await, Some(Frame::Rpc(p)) if p == "one"));
        assert!(matches!(rx.recv().await, Some(Frame::KeepAlive(5))));
        assert!(matches!(rx.recv().await, Some(Frame::Rpc(p)) if p == "two"));
    }

    #[tokio::test]
    async fn send_after_receiver_drop_fails_and_disconnects() {
        let (conn, rx) = Connection::new("conn_2");
        drop(rx);
        assert!(conn.send(Frame::Rpc("x".into())).await.is_err());
        assert!(!conn.is_connected());
    }

    #[tokio::test]
    async fn closed_connection_rejects_frames() {
        let (conn, _rx) = Connection::new("conn_3");
        conn.close();
        assert!(!conn.is_connected());
        assert!(conn.try_send(Frame::KeepAlive(1)).is_err());
        // the stored permit lets a later waiter observe the close
        tokio::time::timeout(std::time::Duration::from_secs(1), conn.close_requested())
            .await
            .unwrap();
    }

    #[test]
    fn try_send_reports_full_queue() {
        let (conn, _rx) = Connection::new("conn_4");
        for _ in 0..QUEUE_CAPACITY {
            assert!(conn.try_send(Frame::KeepAlive(0)).unwrap());
        }
        assert!(!conn.try_send(Frame::KeepAlive(0)).unwrap());
        assert!(conn.is_connected());
    }

    #[test]
    fn sessions_are_per_connection() {
        let (a, _ra) = Connection::new("a");
        let (b, _rb) = Connection::new("b");
        a.session().mark_initialized();
        assert!(a.context().session.unwrap().is_initialized());
        assert!(!b.context().session.unwrap().is_initialized());
        assert_eq!(a.context().connection_id.as_deref(), Some("a"));
    }
}
