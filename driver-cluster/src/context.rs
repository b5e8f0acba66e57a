//! Per-request routing context

use crate::endpoint::NodeId;

/// Routing hints carried by a request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Context {
    node_id: Option<NodeId>,
}

impl Context {
    #[must_use]
    pub const fn new() -> Self {
        Self { node_id: None }
    }

    /// Pin the request to a node, e.g. for session or transaction affinity
    #[must_use]
    pub const fn with_node_id(mut self, node_id: NodeId) -> Self {
        self.node_id = Some(node_id);
        self
    }

    #[must_use]
    pub const fn node_id(&self) -> Option<NodeId> {
        self.node_id
    }
}
