//! Applying a fresh discovery snapshot to the cluster

use driver_core::config::ConnConfig;
use futures::future::join_all;
use std::sync::Arc;

use super::diff::{diff_endpoints, sort_endpoints};
use crate::balancer::Balancer;
use crate::cluster::{Cluster, Options};
use crate::conn::Transport;
use crate::endpoint::Endpoint;
use crate::wg::WaitGroup;

/// Reconcile the cluster with the `next` snapshot
///
/// `curr` is the snapshot applied last round. Every change runs as its own
/// task; the call returns once all of them are done, yielding the sorted
/// `next` snapshot to pass as `curr` next time.
pub async fn sync_endpoints<T, B>(
    cluster: &Arc<Cluster<T, B>>,
    curr: &[Endpoint],
    mut next: Vec<Endpoint>,
    conn_config: Option<ConnConfig>,
) -> Vec<Endpoint>
where
    T: Transport,
    B: Balancer<T> + 'static,
{
    let mut curr = curr.to_vec();
    sort_endpoints(&mut curr);
    sort_endpoints(&mut next);

    let mut updates = Vec::new();
    let mut inserts = Vec::new();
    let mut removals = Vec::new();
    diff_endpoints(
        &curr,
        &next,
        |_, j| updates.push(next[j].clone()),
        |_, j| inserts.push(next[j].clone()),
        |i, _| removals.push(curr[i].clone()),
    );

    tracing::debug!(
        updated = updates.len(),
        inserted = inserts.len(),
        removed = removals.len(),
        "Applying discovery snapshot"
    );

    let wg = WaitGroup::new();
    wg.add(updates.len() + inserts.len() + removals.len());

    let options = || {
        let opts = Options::default().with_wg(wg.clone());
        match conn_config.clone() {
            Some(conn_config) => opts.with_conn_config(conn_config),
            None => opts,
        }
    };

    let mut tasks = Vec::with_capacity(updates.len() + inserts.len() + removals.len());
    for endpoint in updates {
        let (cluster, opts) = (cluster.clone(), options());
        tasks.push(tokio::spawn(async move { cluster.update(endpoint, opts) }));
    }
    for endpoint in inserts {
        let (cluster, opts) = (cluster.clone(), options());
        tasks.push(tokio::spawn(async move { cluster.insert(endpoint, opts) }));
    }
    for endpoint in removals {
        let (cluster, opts) = (cluster.clone(), options());
        tasks.push(tokio::spawn(async move { cluster.remove(endpoint, opts).await }));
    }

    wg.wait().await;

    // a failed change leaves the cluster out of step with `next`
    for result in join_all(tasks).await {
        if let Err(e) = result {
            if e.is_panic() {
                std::panic::resume_unwind(e.into_panic());
            }
            tracing::error!(error = %e, "Topology change task failed");
        }
    }
    next
}
