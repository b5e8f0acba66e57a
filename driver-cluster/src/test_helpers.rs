//! Test doubles shared by unit tests

use async_trait::async_trait;
use driver_core::config::ConnConfig;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::balancer::{Balancer, Handle};
use crate::conn::{Conn, Dialer, Transport};
use crate::endpoint::{Endpoint, Info};
use crate::error::{Error, Result};

#[derive(Debug, Default)]
pub struct FakeTransport {
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl Transport for FakeTransport {
    async fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Dialer counting dials and transport closes across all its connections
#[derive(Debug, Default, Clone)]
pub struct FakeDialer {
    pub dials: Arc<AtomicUsize>,
    pub closes: Arc<AtomicUsize>,
}

#[async_trait]
impl Dialer<FakeTransport> for FakeDialer {
    async fn dial(&self, _address: &str, _config: &ConnConfig) -> Result<FakeTransport> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        Ok(FakeTransport {
            closes: self.closes.clone(),
        })
    }
}

pub struct FailingDialer;

#[async_trait]
impl Dialer<FakeTransport> for FailingDialer {
    async fn dial(&self, address: &str, _config: &ConnConfig) -> Result<FakeTransport> {
        Err(Error::Dial(format!("connection refused: {address}")))
    }
}

pub fn endpoint(id: u32) -> Endpoint {
    Endpoint::new(id, format!("node-{id}:2135"))
}

pub fn conn(id: u32) -> Arc<Conn<FakeTransport>> {
    Arc::new(Conn::new(
        endpoint(id),
        Arc::new(FakeDialer::default()),
        ConnConfig::default(),
    ))
}

/// Round-robin over registered connections, skipping banned and offline ones
#[derive(Default)]
pub struct RoundRobin {
    conns: BTreeMap<u64, (Arc<Conn<FakeTransport>>, Info)>,
    next_handle: u64,
    cursor: AtomicUsize,
    updates: usize,
    removals: usize,
}

impl RoundRobin {
    pub fn info(&self, handle: Handle) -> Option<Info> {
        self.conns.get(&handle.id()).map(|(_, info)| *info)
    }

    pub const fn updates(&self) -> usize {
        self.updates
    }

    pub const fn removals(&self) -> usize {
        self.removals
    }

    pub fn registered(&self) -> usize {
        self.conns.len()
    }
}

impl Balancer<FakeTransport> for RoundRobin {
    fn next(&self) -> Option<Arc<Conn<FakeTransport>>> {
        let usable: Vec<_> = self
            .conns
            .values()
            .filter(|(conn, _)| {
                let state = conn.runtime().state();
                state.is_online() || state == crate::conn::ConnState::Unknown
            })
            .collect();
        if usable.is_empty() {
            return None;
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % usable.len();
        Some(usable[index].0.clone())
    }

    fn insert(&mut self, conn: Arc<Conn<FakeTransport>>, info: Info) -> Handle {
        self.next_handle += 1;
        self.conns.insert(self.next_handle, (conn, info));
        Handle::new(self.next_handle)
    }

    fn update(&mut self, handle: Handle, info: Info) {
        if let Some(entry) = self.conns.get_mut(&handle.id()) {
            entry.1 = info;
        }
        self.updates += 1;
    }

    fn remove(&mut self, handle: Handle) {
        self.conns.remove(&handle.id());
        self.removals += 1;
    }

    fn contains(&self, handle: Handle) -> bool {
        self.conns.contains_key(&handle.id())
    }
}
