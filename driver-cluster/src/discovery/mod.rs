//! Topology discovery plumbing: snapshot diffing, the rediscovery repeater and
//! snapshot application

mod diff;
mod repeater;
mod topology;

pub use diff::{compare_endpoints, diff_endpoints, diff_slice, sort_endpoints};
#[cfg(test)]
pub use repeater::MockRepeater;
pub use repeater::{PeriodicRepeater, Repeater};
pub use topology::sync_endpoints;
