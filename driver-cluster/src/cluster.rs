//! Connection registry for a database cluster
//!
//! Owns one [`Conn`] per known node, keeps the balancer in sync with topology
//! changes and routes connection requests. A single reader/writer lock guards
//! the node map, the ready counter, the balancer, the explorer, the wait gate
//! and the closed flag. `get` and `pessimize` share the lock; every mutation
//! takes it exclusively. Network teardown always happens after the lock is
//! released.

use driver_core::config::{ClusterConfig, ConnConfig};
use futures::future::join_all;
use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::balancer::{Balancer, BalancerError};
use crate::conn::{Conn, ConnState, Dialer, Transport};
use crate::context::Context;
use crate::discovery::Repeater;
use crate::endpoint::{Endpoint, NodeId};
use crate::entry::Entry;
use crate::error::{Error, Result};
use crate::trace::ClusterTrace;
use crate::wg::{DoneOnDrop, WaitGroup};

/// Per-call options for insert, update and remove
#[derive(Debug, Clone, Default)]
pub struct Options {
    wg: Option<WaitGroup>,
    conn_config: Option<ConnConfig>,
}

impl Options {
    /// Mark `wg` done once the call has finished
    #[must_use]
    pub fn with_wg(mut self, wg: WaitGroup) -> Self {
        self.wg = Some(wg);
        self
    }

    /// Override the cluster's default connection settings (insert only)
    #[must_use]
    pub fn with_conn_config(mut self, conn_config: ConnConfig) -> Self {
        self.conn_config = Some(conn_config);
        self
    }
}

struct State<T, B> {
    index: HashMap<NodeId, Entry<T>>,
    ready: usize,
    balancer: B,
    explorer: Option<Arc<dyn Repeater>>,
    /// Released when the first connection arrives or the cluster closes
    wait: Option<CancellationToken>,
    closed: bool,
}

pub struct Cluster<T, B> {
    trace: ClusterTrace,
    dialer: Arc<dyn Dialer<T>>,
    config: ClusterConfig,
    state: RwLock<State<T, B>>,
}

impl<T, B> fmt::Debug for Cluster<T, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("Cluster")
            .field("nodes", &state.index.len())
            .field("ready", &state.ready)
            .field("closed", &state.closed)
            .finish_non_exhaustive()
    }
}

impl<T, B> Cluster<T, B>
where
    T: Transport,
    B: Balancer<T>,
{
    #[must_use]
    pub fn new(dialer: Arc<dyn Dialer<T>>, balancer: B) -> Self {
        Self {
            trace: ClusterTrace::default(),
            dialer,
            config: ClusterConfig::default(),
            state: RwLock::new(State {
                index: HashMap::new(),
                ready: 0,
                balancer,
                explorer: None,
                wait: None,
                closed: false,
            }),
        }
    }

    #[must_use]
    pub fn with_trace(mut self, trace: ClusterTrace) -> Self {
        self.trace = trace;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: ClusterConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Request an immediate rediscovery
    pub fn force(&self) {
        let explorer = self.state.read().explorer.clone();
        match explorer {
            Some(explorer) => explorer.force(),
            None => debug!("Rediscovery requested but no explorer is set"),
        }
    }

    /// Install the rediscovery trigger, meant to be called once at startup
    pub fn set_explorer(&self, explorer: Arc<dyn Repeater>) {
        let mut state = self.state.write();
        if state.closed {
            explorer.stop();
            return;
        }
        state.explorer = Some(explorer);
    }

    /// Close the cluster and every tracked connection
    ///
    /// Only the first call has an effect. Returns the first transport close
    /// error, after every connection has been closed.
    pub async fn close(&self) -> Result<()> {
        let (wait, index) = {
            let mut guard = self.state.write();
            if guard.closed {
                return Ok(());
            }
            let state = &mut *guard;
            state.closed = true;
            if let Some(explorer) = state.explorer.take() {
                explorer.stop();
            }

            let mut index = std::mem::take(&mut state.index);
            for entry in index.values_mut() {
                entry.remove_from(&mut state.balancer);
            }
            state.ready = 0;
            (state.wait.take(), index)
        };

        if let Some(wait) = wait {
            wait.cancel();
        }

        info!(nodes = index.len(), "Closing cluster");

        let conns: Vec<_> = index.into_values().filter_map(|entry| entry.conn).collect();
        let results = join_all(conns.iter().map(|conn| conn.close())).await;

        let mut first_error = None;
        for (conn, result) in conns.iter().zip(results) {
            if let Err(e) = result {
                warn!(node_id = %conn.endpoint().id, error = %e, "Failed to close connection");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Connection for the next request
    ///
    /// A node pinned through the context is returned as long as it is tracked,
    /// whatever its health. Otherwise the balancer decides. Never waits.
    pub fn get(&self, ctx: &Context) -> Result<Arc<Conn<T>>> {
        let result = {
            let state = self.state.read();
            if state.closed {
                Err(Error::ClusterClosed)
            } else {
                Self::select(&state, ctx).ok_or(Error::ClusterEmpty)
            }
        };
        self.trace_get(&result);
        result
    }

    /// Like [`get`](Self::get), but waits for a connection to be inserted
    ///
    /// `timeout` defaults to `max_get_conn_timeout` from the cluster config.
    pub async fn get_wait(
        &self,
        ctx: &Context,
        timeout: Option<Duration>,
    ) -> Result<Arc<Conn<T>>> {
        let limit = timeout.unwrap_or_else(|| self.config.max_get_conn_timeout());
        let deadline = tokio::time::Instant::now() + limit;

        loop {
            let attempt = {
                let state = self.state.upgradable_read();
                if state.closed {
                    Ok(Err(Error::ClusterClosed))
                } else if let Some(conn) = Self::select(&state, ctx) {
                    Ok(Ok(conn))
                } else {
                    // no insert can slip in between the failed select and the upgrade
                    let mut state = RwLockUpgradableReadGuard::upgrade(state);
                    Err(state.wait.get_or_insert_with(CancellationToken::new).clone())
                }
            };
            let gate = match attempt {
                Ok(result) => {
                    self.trace_get(&result);
                    return result;
                }
                Err(gate) => gate,
            };

            tokio::select! {
                () = gate.cancelled() => {}
                () = tokio::time::sleep_until(deadline) => {
                    let result = Err(Error::Timeout(format!(
                        "no connection available within {limit:?}"
                    )));
                    self.trace_get(&result);
                    return result;
                }
            }
        }
    }

    fn select(state: &State<T, B>, ctx: &Context) -> Option<Arc<Conn<T>>> {
        if let Some(node_id) = ctx.node_id() {
            if let Some(conn) = state.index.get(&node_id).and_then(|e| e.conn.clone()) {
                return Some(conn);
            }
        }
        state.balancer.next()
    }

    fn trace_get(&self, result: &Result<Arc<Conn<T>>>) {
        match result {
            Ok(conn) => self.trace.get_done(Some(conn.endpoint()), None),
            Err(e) => self.trace.get_done(None, Some(e)),
        }
    }

    /// Start tracking a node
    ///
    /// The connection is dialed lazily on first use, so a node is tracked even
    /// if it is unreachable.
    ///
    /// # Panics
    ///
    /// If the node is already tracked.
    pub fn insert(&self, endpoint: Endpoint, opts: Options) {
        let _done = DoneOnDrop::new(opts.wg);

        let conn_config = opts
            .conn_config
            .unwrap_or_else(|| self.config.conn.clone());
        let conn = Arc::new(Conn::new(endpoint.clone(), self.dialer.clone(), conn_config));

        let wait = {
            let mut guard = self.state.write();
            if guard.closed {
                return;
            }
            let state = &mut *guard;
            assert!(
                !state.index.contains_key(&endpoint.id),
                "invariant violation: can't insert already existing endpoint {endpoint}"
            );

            conn.runtime().set_state(ConnState::Online);
            let mut entry = Entry::new(endpoint.info(), Some(conn));
            entry.insert_into(&mut state.balancer);
            state.ready += 1;
            state.index.insert(endpoint.id, entry);
            state.wait.take()
        };

        if let Some(wait) = wait {
            wait.cancel();
        }

        debug!(node_id = %endpoint.id, address = %endpoint.address, "Node inserted");
        self.trace.insert_done(&endpoint);
    }

    /// Refresh a tracked node's weight and mark it online
    ///
    /// # Panics
    ///
    /// If the node is not tracked or its entry lost its connection.
    pub fn update(&self, endpoint: Endpoint, opts: Options) {
        let _done = DoneOnDrop::new(opts.wg);

        let state_after = {
            let mut guard = self.state.write();
            if guard.closed {
                return;
            }
            let state = &mut *guard;
            let Some(entry) = state.index.get_mut(&endpoint.id) else {
                panic!("invariant violation: can't update not-existing endpoint {endpoint}");
            };
            let Some(conn) = entry.conn.clone() else {
                panic!("invariant violation: cluster entry with nil conn for {endpoint}");
            };

            entry.info = endpoint.info();
            conn.runtime().set_state(ConnState::Online);
            // the handle is absent while the connection is only being tracked
            if let Some(handle) = entry.handle {
                state.balancer.update(handle, entry.info);
            }
            conn.runtime().state()
        };

        debug!(
            node_id = %endpoint.id,
            load_factor = endpoint.load_factor,
            local = endpoint.local,
            state = %state_after,
            "Node updated"
        );
        self.trace.update_done(&endpoint, state_after);
    }

    /// Stop tracking a node and close its connection
    ///
    /// # Panics
    ///
    /// If the node is not tracked.
    pub async fn remove(&self, endpoint: Endpoint, opts: Options) {
        let _done = DoneOnDrop::new(opts.wg);

        let conn = {
            let mut guard = self.state.write();
            if guard.closed {
                return;
            }
            let state = &mut *guard;
            let Some(mut entry) = state.index.remove(&endpoint.id) else {
                panic!("invariant violation: can't remove not-existing endpoint {endpoint}");
            };
            entry.remove_from(&mut state.balancer);
            state.ready -= 1;
            entry.conn
        };

        // conn may be absent when tracked after an unsuccessful dial
        let state_after = match conn {
            Some(conn) => {
                if let Err(e) = conn.close().await {
                    warn!(node_id = %endpoint.id, error = %e, "Failed to close removed connection");
                }
                conn.runtime().state()
            }
            None => ConnState::Offline,
        };

        debug!(node_id = %endpoint.id, state = %state_after, "Node removed");
        self.trace.remove_done(&endpoint, state_after);
    }

    /// Demote a node after a failure without removing it from the topology
    ///
    /// Forces a rediscovery once more than half of the tracked nodes are no
    /// longer online.
    pub fn pessimize(&self, endpoint: &Endpoint) -> Result<()> {
        let explorer = {
            let state = self.state.read();
            if state.closed {
                return Err(Error::pessimize(Error::ClusterClosed));
            }
            let entry = state
                .index
                .get(&endpoint.id)
                .ok_or_else(|| Error::pessimize(Error::UnknownEndpoint))?;
            let handle = entry
                .handle
                .ok_or_else(|| Error::pessimize(BalancerError::NilBalancerElement))?;
            if !state.balancer.contains(handle) {
                return Err(Error::pessimize(BalancerError::UnknownBalancerElement));
            }
            let Some(conn) = entry.conn.as_ref() else {
                panic!("invariant violation: cluster entry with nil conn for {endpoint}");
            };

            conn.runtime().set_state(ConnState::Banned);
            warn!(node_id = %endpoint.id, address = %endpoint.address, "Node pessimized");

            state.explorer.as_ref().and_then(|explorer| {
                let online = state
                    .index
                    .values()
                    .filter(|e| e.conn.as_ref().is_some_and(|c| c.runtime().state().is_online()))
                    .count();
                let total = state.index.len();
                // more than half of the nodes are down: the topology view is stale
                (online * 2 < total).then(|| {
                    warn!(online, total, "Most nodes unavailable, forcing rediscovery");
                    explorer.clone()
                })
            })
        };

        if let Some(explorer) = explorer {
            explorer.force();
        }
        Ok(())
    }

    /// Number of tracked nodes
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Nodes registered since creation minus nodes removed
    #[must_use]
    pub fn ready(&self) -> usize {
        self.state.read().ready
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.read().closed
    }

    #[must_use]
    pub fn contains(&self, node_id: NodeId) -> bool {
        self.state.read().index.contains_key(&node_id)
    }

    /// Tracked endpoints, sorted by node id
    #[must_use]
    pub fn endpoints(&self) -> Vec<Endpoint> {
        let mut endpoints: Vec<Endpoint> = self
            .state
            .read()
            .index
            .values()
            .filter_map(|e| e.conn.as_ref().map(|c| c.endpoint().clone()))
            .collect();
        crate::discovery::sort_endpoints(&mut endpoints);
        endpoints
    }

    /// Inspect the balancer under the shared lock
    pub fn with_balancer<R>(&self, f: impl FnOnce(&B) -> R) -> R {
        f(&self.state.read().balancer)
    }
}
