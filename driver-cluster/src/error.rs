//! Error types for cluster module

use thiserror::Error;

use crate::balancer::BalancerError;

/// Cluster error types
#[derive(Debug, Error)]
pub enum Error {
    /// Requested on a closed cluster
    #[error("cluster closed")]
    ClusterClosed,

    /// No connections left in cluster
    #[error("cluster empty")]
    ClusterEmpty,

    /// Endpoint is not tracked by the cluster
    #[error("unknown endpoint")]
    UnknownEndpoint,

    #[error(transparent)]
    Balancer(#[from] BalancerError),

    #[error("pessimize failed: {0}")]
    Pessimize(#[source] Box<Error>),

    #[error("Dial error: {0}")]
    Dial(String),

    #[error("connection closed")]
    ConnClosed,

    #[error("Timeout: {0}")]
    Timeout(String),
}

impl Error {
    pub(crate) fn pessimize(err: impl Into<Self>) -> Self {
        Self::Pessimize(Box::new(err.into()))
    }

    /// Innermost error kind, with context wrappers stripped
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::Pessimize(inner) => inner.root(),
            other => other,
        }
    }

    #[must_use]
    pub fn is_cluster_closed(&self) -> bool {
        matches!(self.root(), Self::ClusterClosed)
    }
}

/// Result type for cluster operations
pub type Result<T> = std::result::Result<T, Error>;
