//! Instrumentation hooks fired by the cluster
//!
//! Hooks are observers only: they run after the cluster lock is released and
//! their outcome never feeds back into routing.

use std::fmt;
use std::sync::Arc;

use crate::conn::ConnState;
use crate::endpoint::Endpoint;
use crate::error::Error;

type OnGet = Arc<dyn Fn(Option<&Endpoint>, Option<&Error>) + Send + Sync>;
type OnInsert = Arc<dyn Fn(&Endpoint) + Send + Sync>;
type OnStateChange = Arc<dyn Fn(&Endpoint, ConnState) + Send + Sync>;

#[derive(Clone, Default)]
pub struct ClusterTrace {
    on_get: Option<OnGet>,
    on_insert: Option<OnInsert>,
    on_update: Option<OnStateChange>,
    on_remove: Option<OnStateChange>,
}

impl fmt::Debug for ClusterTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterTrace")
            .field("on_get", &self.on_get.is_some())
            .field("on_insert", &self.on_insert.is_some())
            .field("on_update", &self.on_update.is_some())
            .field("on_remove", &self.on_remove.is_some())
            .finish()
    }
}

impl ClusterTrace {
    /// Called with the resolved endpoint (if any) and the error (if any) of every get
    #[must_use]
    pub fn on_get(
        mut self,
        f: impl Fn(Option<&Endpoint>, Option<&Error>) + Send + Sync + 'static,
    ) -> Self {
        self.on_get = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn on_insert(mut self, f: impl Fn(&Endpoint) + Send + Sync + 'static) -> Self {
        self.on_insert = Some(Arc::new(f));
        self
    }

    /// Called with the connection state resulting from the update
    #[must_use]
    pub fn on_update(mut self, f: impl Fn(&Endpoint, ConnState) + Send + Sync + 'static) -> Self {
        self.on_update = Some(Arc::new(f));
        self
    }

    /// Called with the connection state after it was closed
    #[must_use]
    pub fn on_remove(mut self, f: impl Fn(&Endpoint, ConnState) + Send + Sync + 'static) -> Self {
        self.on_remove = Some(Arc::new(f));
        self
    }

    pub(crate) fn get_done(&self, endpoint: Option<&Endpoint>, error: Option<&Error>) {
        if let Some(f) = &self.on_get {
            f(endpoint, error);
        }
    }

    pub(crate) fn insert_done(&self, endpoint: &Endpoint) {
        if let Some(f) = &self.on_insert {
            f(endpoint);
        }
    }

    pub(crate) fn update_done(&self, endpoint: &Endpoint, state: ConnState) {
        if let Some(f) = &self.on_update {
            f(endpoint, state);
        }
    }

    pub(crate) fn remove_done(&self, endpoint: &Endpoint, state: ConnState) {
        if let Some(f) = &self.on_remove {
            f(endpoint, state);
        }
    }
}
