//! Runtime health state and operation counters of a connection

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Health state of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnState {
    /// Never dialed nor classified yet
    #[default]
    Unknown,
    Offline,
    /// Demoted after a failure; kept in the topology
    Banned,
    Online,
}

impl ConnState {
    #[must_use]
    pub const fn is_online(self) -> bool {
        matches!(self, Self::Online)
    }
}

impl fmt::Display for ConnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unknown => "unknown",
            Self::Offline => "offline",
            Self::Banned => "banned",
            Self::Online => "online",
        };
        f.write_str(name)
    }
}

/// Point-in-time copy of a connection's runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeStats {
    pub state: ConnState,
    pub state_changed_at: DateTime<Utc>,
    pub operations_started: u64,
    pub operations_succeeded: u64,
    pub operations_failed: u64,
}

impl RuntimeStats {
    /// Operations started but not finished yet
    #[must_use]
    pub const fn operations_in_flight(&self) -> u64 {
        self.operations_started
            .saturating_sub(self.operations_succeeded + self.operations_failed)
    }
}

#[derive(Debug)]
struct StateCell {
    state: ConnState,
    changed_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct Runtime {
    state: Mutex<StateCell>,
    operations_started: AtomicU64,
    operations_succeeded: AtomicU64,
    operations_failed: AtomicU64,
}

impl Default for Runtime {
    fn default() -> Self {
        Self {
            state: Mutex::new(StateCell {
                state: ConnState::Unknown,
                changed_at: Utc::now(),
            }),
            operations_started: AtomicU64::new(0),
            operations_succeeded: AtomicU64::new(0),
            operations_failed: AtomicU64::new(0),
        }
    }
}

impl Runtime {
    #[must_use]
    pub fn state(&self) -> ConnState {
        self.state.lock().state
    }

    /// Set the state, returning the previous one
    pub fn set_state(&self, state: ConnState) -> ConnState {
        let mut cell = self.state.lock();
        let prev = cell.state;
        if prev != state {
            cell.state = state;
            cell.changed_at = Utc::now();
        }
        prev
    }

    pub fn operation_started(&self) {
        self.operations_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn operation_succeeded(&self) {
        self.operations_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn operation_failed(&self) {
        self.operations_failed.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn stats(&self) -> RuntimeStats {
        let (state, state_changed_at) = {
            let cell = self.state.lock();
            (cell.state, cell.changed_at)
        };
        RuntimeStats {
            state,
            state_changed_at,
            operations_started: self.operations_started.load(Ordering::Relaxed),
            operations_succeeded: self.operations_succeeded.load(Ordering::Relaxed),
            operations_failed: self.operations_failed.load(Ordering::Relaxed),
        }
    }
}
