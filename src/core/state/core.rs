// src/core/state/core.rs

//! Defines the central `ServerState` struct, holding all shared relay-wide state.

use super::stats::StatsState;
use crate::config::Config;
use crate::core::dispatcher::{DeliveryPolicy, Dispatcher};
use crate::core::groups::GroupStore;
use crate::core::registry::ConnectionRegistry;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// The central struct holding all shared, relay-wide state.
///
/// It is wrapped in an `Arc` and handed to every session task and to the HTTP
/// handlers. Both stores live for the whole process; there is no teardown.
#[derive(Debug)]
pub struct ServerState {
    /// The configuration the process was started with. Immutable.
    pub config: Arc<Config>,
    /// Live connections, keyed by user identifier.
    pub registry: ConnectionRegistry,
    /// Group memberships, keyed by group identifier.
    pub groups: GroupStore,
    pub stats: StatsState,
    delivery: DeliveryPolicy,
    session_id_counter: AtomicU64,
}

impl ServerState {
    pub fn new(config: Config) -> Arc<Self> {
        let delivery = DeliveryPolicy::from(&config.delivery);
        Arc::new(Self {
            config: Arc::new(config),
            registry: ConnectionRegistry::new(),
            groups: GroupStore::new(),
            stats: StatsState::new(),
            delivery,
            session_id_counter: AtomicU64::new(0),
        })
    }

    /// Builds a dispatcher over this state's stores.
    pub fn dispatcher(&self) -> Dispatcher<'_> {
        Dispatcher::new(&self.registry, &self.groups, self.delivery)
    }

    /// Hands out a process-unique identifier for a new session.
    pub fn next_session_id(&self) -> u64 {
        self.session_id_counter.fetch_add(1, Ordering::Relaxed) + 1
    }
}
