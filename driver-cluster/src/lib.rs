//! Connection registry and load-balancing core of the database driver

pub mod balancer;
pub mod cluster;
pub mod conn;
pub mod context;
pub mod discovery;
pub mod endpoint;
pub mod entry;
pub mod error;
pub mod trace;
pub mod wg;

#[cfg(test)]
mod test_helpers;

pub use balancer::{Balancer, BalancerError, Handle};
pub use cluster::{Cluster, Options};
pub use conn::{Conn, ConnState, Dialer, Runtime, RuntimeStats, Transport};
pub use context::Context;
pub use discovery::{sync_endpoints, PeriodicRepeater, Repeater};
pub use endpoint::{Endpoint, Info, NodeId};
pub use error::{Error, Result};
pub use trace::ClusterTrace;
pub use wg::WaitGroup;
