//! Balancer port consumed by the cluster
//!
//! The cluster never inspects a balancer's structure. It registers connections,
//! keeps their [`Info`] current and asks for the next connection to route to.
//! Any selection policy (round-robin, weighted random, locality-aware) can sit
//! behind this trait.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::conn::Conn;
use crate::endpoint::Info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BalancerError {
    #[error("nil balancer element")]
    NilBalancerElement,

    #[error("unknown balancer element")]
    UnknownBalancerElement,
}

/// Opaque registration token minted by a balancer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(u64);

impl Handle {
    /// For balancer implementations only
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handle#{}", self.0)
    }
}

/// Connection selection policy
///
/// Mutators take `&mut self` and are only reached under the cluster's
/// exclusive lock; `next` and `contains` run concurrently under the shared
/// lock.
pub trait Balancer<T>: Send + Sync {
    /// Connection to route the next request to, if any
    fn next(&self) -> Option<Arc<Conn<T>>>;

    fn insert(&mut self, conn: Arc<Conn<T>>, info: Info) -> Handle;

    fn update(&mut self, handle: Handle, info: Info);

    fn remove(&mut self, handle: Handle);

    fn contains(&self, handle: Handle) -> bool;
}

impl<T, B: Balancer<T> + ?Sized> Balancer<T> for Box<B> {
    fn next(&self) -> Option<Arc<Conn<T>>> {
        (**self).next()
    }

    fn insert(&mut self, conn: Arc<Conn<T>>, info: Info) -> Handle {
        (**self).insert(conn, info)
    }

    fn update(&mut self, handle: Handle, info: Info) {
        (**self).update(handle, info);
    }

    fn remove(&mut self, handle: Handle) {
        (**self).remove(handle);
    }

    fn contains(&self, handle: Handle) -> bool {
        (**self).contains(handle)
    }
}
