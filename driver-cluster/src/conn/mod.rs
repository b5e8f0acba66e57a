//! Connections to cluster nodes
//!
//! A [`Conn`] is created eagerly when a node joins the cluster but dials its
//! transport lazily, on first use. Dial failures are recorded in the runtime
//! state instead of preventing the node from being tracked.

mod runtime;

pub use runtime::{ConnState, Runtime, RuntimeStats};

use async_trait::async_trait;
use driver_core::config::ConnConfig;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::endpoint::Endpoint;
use crate::error::{Error, Result};

/// Physical channel to a node, as produced by a [`Dialer`]
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn close(&self) -> Result<()>;
}

/// Opens transports to node addresses
#[async_trait]
pub trait Dialer<T>: Send + Sync + 'static {
    async fn dial(&self, address: &str, config: &ConnConfig) -> Result<T>;
}

#[async_trait]
impl<T, F, Fut> Dialer<T> for F
where
    T: Send + 'static,
    F: Fn(String, ConnConfig) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    async fn dial(&self, address: &str, config: &ConnConfig) -> Result<T> {
        (self)(address.to_string(), config.clone()).await
    }
}

/// Owned connection to a single cluster node
pub struct Conn<T> {
    endpoint: Endpoint,
    config: ConnConfig,
    dialer: Arc<dyn Dialer<T>>,
    transport: tokio::sync::Mutex<Option<Arc<T>>>,
    runtime: Runtime,
    closed: AtomicBool,
}

impl<T> fmt::Debug for Conn<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conn")
            .field("endpoint", &self.endpoint)
            .field("state", &self.runtime.state())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl<T: Transport> Conn<T> {
    #[must_use]
    pub fn new(endpoint: Endpoint, dialer: Arc<dyn Dialer<T>>, config: ConnConfig) -> Self {
        Self {
            endpoint,
            config,
            dialer,
            transport: tokio::sync::Mutex::new(None),
            runtime: Runtime::default(),
            closed: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub const fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    #[must_use]
    pub const fn config(&self) -> &ConnConfig {
        &self.config
    }

    #[must_use]
    pub const fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Get the transport, dialing it on first use
    pub async fn take(&self) -> Result<Arc<T>> {
        if self.is_closed() {
            return Err(Error::ConnClosed);
        }

        let mut transport = self.transport.lock().await;
        // close() may have won the race for the lock
        if self.is_closed() {
            return Err(Error::ConnClosed);
        }
        if let Some(transport) = transport.as_ref() {
            return Ok(transport.clone());
        }

        let dial_timeout = self.config.dial_timeout();
        let dialed = tokio::time::timeout(
            dial_timeout,
            self.dialer.dial(&self.endpoint.address, &self.config),
        )
        .await;

        match dialed {
            Ok(Ok(dialed)) => {
                let dialed = Arc::new(dialed);
                *transport = Some(dialed.clone());
                self.runtime.set_state(ConnState::Online);
                debug!(
                    node_id = %self.endpoint.id,
                    address = %self.endpoint.address,
                    "Connection established"
                );
                Ok(dialed)
            }
            Ok(Err(e)) => {
                self.runtime.set_state(ConnState::Offline);
                warn!(
                    node_id = %self.endpoint.id,
                    address = %self.endpoint.address,
                    error = %e,
                    "Dial failed"
                );
                Err(e)
            }
            Err(_) => {
                self.runtime.set_state(ConnState::Offline);
                warn!(
                    node_id = %self.endpoint.id,
                    address = %self.endpoint.address,
                    "Dial timed out"
                );
                Err(Error::Timeout(format!(
                    "dial {} exceeded {dial_timeout:?}",
                    self.endpoint
                )))
            }
        }
    }

    /// Run one operation over the transport, recording it in the runtime stats
    pub async fn invoke<R, F, Fut>(&self, op: F) -> Result<R>
    where
        F: FnOnce(Arc<T>) -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        let transport = self.take().await?;

        self.runtime.operation_started();
        let result = match self.config.operation_timeout() {
            Some(limit) => tokio::time::timeout(limit, op(transport))
                .await
                .unwrap_or_else(|_| {
                    Err(Error::Timeout(format!(
                        "operation on {} exceeded {limit:?}",
                        self.endpoint
                    )))
                }),
            None => op(transport).await,
        };

        if result.is_ok() {
            self.runtime.operation_succeeded();
        } else {
            self.runtime.operation_failed();
        }
        result
    }

    /// Close the transport; only the first call has an effect
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let transport = self.transport.lock().await.take();
        self.runtime.set_state(ConnState::Offline);

        if let Some(transport) = transport {
            debug!(node_id = %self.endpoint.id, "Closing connection");
            transport.close().await?;
        }
        Ok(())
    }
}
