//! Per-node record held by the cluster

use std::sync::Arc;

use crate::balancer::{Balancer, Handle};
use crate::conn::Conn;
use crate::endpoint::Info;

/// Cluster bookkeeping for one node
///
/// `handle` is `Some` exactly while the entry is registered with the balancer.
#[derive(Debug)]
pub struct Entry<T> {
    pub info: Info,
    pub conn: Option<Arc<Conn<T>>>,
    pub handle: Option<Handle>,
}

impl<T> Entry<T> {
    #[must_use]
    pub const fn new(info: Info, conn: Option<Arc<Conn<T>>>) -> Self {
        Self {
            info,
            conn,
            handle: None,
        }
    }

    /// Register with the balancer
    ///
    /// # Panics
    ///
    /// If the entry is already registered or has no connection.
    pub fn insert_into<B: Balancer<T> + ?Sized>(&mut self, balancer: &mut B) {
        assert!(
            self.handle.is_none(),
            "invariant violation: entry already registered with balancer"
        );
        let Some(conn) = self.conn.clone() else {
            panic!("invariant violation: registering entry without connection");
        };
        self.handle = Some(balancer.insert(conn, self.info));
    }

    /// Unregister from the balancer; a no-op for unregistered entries
    pub fn remove_from<B: Balancer<T> + ?Sized>(&mut self, balancer: &mut B) {
        if let Some(handle) = self.handle.take() {
            balancer.remove(handle);
        }
    }
}
