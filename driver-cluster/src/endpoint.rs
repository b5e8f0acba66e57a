//! Cluster node descriptors

use std::fmt;

/// Identity of a cluster node, totally ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u32> for NodeId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Node descriptor as reported by discovery
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    pub id: NodeId,
    pub address: String,
    pub load_factor: f32,
    /// Node is in the same datacenter as the client
    pub local: bool,
}

impl Endpoint {
    #[must_use]
    pub fn new(id: u32, address: impl Into<String>) -> Self {
        Self {
            id: NodeId(id),
            address: address.into(),
            load_factor: 0.0,
            local: false,
        }
    }

    #[must_use]
    pub fn with_load_factor(mut self, load_factor: f32) -> Self {
        self.load_factor = load_factor;
        self
    }

    #[must_use]
    pub const fn with_local(mut self, local: bool) -> Self {
        self.local = local;
        self
    }

    #[must_use]
    pub const fn node_id(&self) -> NodeId {
        self.id
    }

    #[must_use]
    pub fn info(&self) -> Info {
        Info::from(self)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.address, self.id)
    }
}

/// Balancer-facing snapshot of a node's weight, replaced wholesale on update
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Info {
    pub load_factor: f32,
    pub local: bool,
}

impl From<&Endpoint> for Info {
    fn from(endpoint: &Endpoint) -> Self {
        Self {
            load_factor: endpoint.load_factor,
            local: endpoint.local,
        }
    }
}
