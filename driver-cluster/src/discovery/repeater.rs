//! Periodic, forceable background task used for topology rediscovery

use driver_core::config::ClusterConfig;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Rediscovery trigger as seen by the cluster
#[cfg_attr(test, mockall::automock)]
pub trait Repeater: Send + Sync {
    /// Request an immediate run
    fn force(&self);

    /// Halt permanently
    fn stop(&self);
}

/// Runs a task every `interval` and on demand
///
/// Forced runs do not reset the schedule. A run in progress is never
/// interrupted by `force`; the forced run starts once it completes.
pub struct PeriodicRepeater {
    name: String,
    period: Duration,
    force: Arc<Notify>,
    cancel_token: CancellationToken,
    handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl PeriodicRepeater {
    /// Spawn the repeater loop onto the current tokio runtime
    ///
    /// The first run happens immediately.
    pub fn spawn<F, Fut>(name: impl Into<String>, period: Duration, task: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = name.into();
        let force = Arc::new(Notify::new());
        let cancel_token = CancellationToken::new();

        let mut timer = interval(period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let loop_name = name.clone();
        let loop_force = force.clone();
        let loop_cancel = cancel_token.clone();
        let handle = tokio::spawn(async move {
            tracing::info!(repeater = %loop_name, period = ?period, "Repeater started");
            loop {
                tokio::select! {
                    () = loop_cancel.cancelled() => {
                        tracing::info!(repeater = %loop_name, "Repeater shutting down");
                        return;
                    }
                    _ = timer.tick() => {
                        tracing::trace!(repeater = %loop_name, "Scheduled run");
                    }
                    () = loop_force.notified() => {
                        tracing::debug!(repeater = %loop_name, "Forced run");
                    }
                }
                tokio::select! {
                    () = loop_cancel.cancelled() => return,
                    () = task() => {}
                }
            }
        });

        Self {
            name,
            period,
            force,
            cancel_token,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Spawn with the rediscovery period from `config`
    pub fn from_config<F, Fut>(name: impl Into<String>, config: &ClusterConfig, task: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::spawn(name, config.discovery_interval(), task)
    }

    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Stop and wait for the loop to exit
    pub async fn shutdown(&self) {
        self.stop();
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(repeater = %self.name, error = %e, "Repeater task failed");
            }
        }
    }
}

impl Repeater for PeriodicRepeater {
    fn force(&self) {
        // a stored permit makes back-to-back forces coalesce into one run
        self.force.notify_one();
    }

    fn stop(&self) {
        self.cancel_token.cancel();
    }
}

impl Drop for PeriodicRepeater {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}
