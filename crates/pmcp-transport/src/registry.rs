//! Connection registry.
//!
//! Maps connection identifiers to live streams. The lock is held only for
//! map operations; callers clone the `Arc` out before awaiting anything.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::connection::Connection;

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<String, Arc<Connection>>>,
    shutting_down: AtomicBool,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, conn: Arc<Connection>) {
        let id = conn.id.clone();
        let total = {
            let mut map = self.connections.write();
            if let Some(previous) = map.insert(id.clone(), conn) {
                warn!("Connection id collision, replacing {}", previous.id);
                previous.close();
            }
            map.len()
        };
        info!("Connection registered: {id} (total: {total})");
    }

    /// Look up a connection that is still able to receive frames.
    pub fn get(&self, id: &str) -> Option<Arc<Connection>> {
        self.connections
            .read()
            .get(id)
            .filter(|c| c.is_connected())
            .cloned()
    }

    /// Remove a connection and end its stream. Safe to call more than once.
    pub fn mark_disconnected(&self, id: &str) -> bool {
        let removed = self.connections.write().remove(id);
        match removed {
            Some(conn) => {
                conn.close();
                info!(
                    "Connection closed: {id} after {:?} (remaining: {})",
                    conn.connected_at.elapsed(),
                    self.count()
                );
                true
            }
            None => {
                debug!("Connection already removed: {id}");
                false
            }
        }
    }

    /// Remove `conn` if it is still the entry under its id, and end it either way.
    ///
    /// Stream teardown uses this so an entry that replaced `conn` after an id
    /// collision survives.
    pub fn release(&self, conn: &Arc<Connection>) -> bool {
        conn.close();
        let removed = {
            let mut map = self.connections.write();
            match map.get(&conn.id) {
                Some(current) if Arc::ptr_eq(current, conn) => map.remove(&conn.id).is_some(),
                _ => false,
            }
        };
        if removed {
            info!(
                "Connection closed: {} after {:?} (remaining: {})",
                conn.id,
                conn.connected_at.elapsed(),
                self.count()
            );
        }
        removed
    }

    /// Snapshot of the live connections.
    pub fn all(&self) -> Vec<Arc<Connection>> {
        self.connections
            .read()
            .values()
            .filter(|c| c.is_connected())
            .cloned()
            .collect()
    }

    pub fn count(&self) -> usize {
        self.connections.read().len()
    }

    /// End every stream and refuse new ones. Returns how many were closed.
    pub fn close_all(&self) -> usize {
        self.shutting_down.store(true, Ordering::Release);
        let drained: Vec<Arc<Connection>> = self.connections.write().drain().map(|(_, c)| c).collect();
        for conn in &drained {
            conn.close();
        }
        if !drained.is_empty() {
            info!("Closed {} open stream(s)", drained.len());
        }
        drained.len()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_lookup() {
        let registry = ConnectionRegistry::new();
        let (conn, _rx) = Connection::new("conn_a");
        registry.register(conn);

        assert_eq!(registry.count(), 1);
        assert!(registry.get("conn_a").is_some());
        assert!(registry.get("conn_b").is_none());
    }

    #[test]
    fn mark_disconnected_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let (conn, _rx) = Connection::new("conn_a");
        registry.register(conn.clone());

        assert!(registry.mark_disconnected("conn_a"));
        assert!(!registry.mark_disconnected("conn_a"));
        assert!(registry.get("conn_a").is_none());
        assert!(!conn.is_connected());
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn release_after_collision_keeps_the_replacement() {
        let registry = ConnectionRegistry::new();
        let (old, _old_rx) = Connection::new("conn_a");
        let (new, _new_rx) = Connection::new("conn_a");
        registry.register(old.clone());
        registry.register(new.clone());
        assert!(!old.is_connected());

        assert!(!registry.release(&old));
        let current = registry.get("conn_a").unwrap();
        assert!(Arc::ptr_eq(&current, &new));

        assert!(registry.release(&new));
        assert_eq!(registry.count(), 0);
        assert!(!registry.release(&new));
    }

    #[test]
    fn dead_receivers_are_not_returned() {
        let registry = ConnectionRegistry::new();
        let (conn, rx) = Connection::new("conn_a");
        registry.register(conn);
        drop(rx);

        assert!(registry.get("conn_a").is_none());
        assert!(registry.all().is_empty());
    }

    #[test]
    fn close_all_drains_and_refuses() {
        let registry = ConnectionRegistry::new();
        let (a, _ra) = Connection::new("a");
        let (b, _rb) = Connection::new("b");
        registry.register(a.clone());
        registry.register(b.clone());

        assert_eq!(registry.close_all(), 2);
        assert_eq!(registry.count(), 0);
        assert!(!a.is_connected());
        assert!(!b.is_connected());
        assert!(registry.is_shutting_down());
    }
}
