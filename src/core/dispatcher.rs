// src/core/dispatcher.rs

//! Resolves the recipients of a message and fans the serialized form out to
//! every live connection among them.
//!
//! Fan-out works on snapshots: the group's member list is copied and each
//! recipient's connection is cloned out of the registry before any write
//! starts. No registry or group lock is held while a write is in flight, so a
//! concurrent join or disconnect can never disturb an iteration, and a slow
//! peer only delays its own delivery. Each write is bounded by the configured
//! timeout; a timeout counts as a failed delivery, like a write error.

use super::groups::GroupStore;
use super::message::{Message, RouteTarget};
use super::metrics;
use super::registry::{Connection, ConnectionRegistry};
use crate::config::DeliveryConfig;
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Who sent the message being routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin<'a> {
    /// A frame read from the websocket session of this user.
    Session(&'a str),
    /// A one-shot request; there is no sending connection.
    OneShot,
}

impl Origin<'_> {
    fn is_sender(&self, user_id: &str) -> bool {
        matches!(self, Origin::Session(sender) if *sender == user_id)
    }
}

/// Delivery settings applied to every fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryPolicy {
    /// Upper bound for a single peer write. `None` waits indefinitely.
    pub write_timeout: Option<Duration>,
    /// Whether a session receives its own messages when it is among the recipients.
    pub echo_to_sender: bool,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        DeliveryPolicy::from(&DeliveryConfig::default())
    }
}

impl From<&DeliveryConfig> for DeliveryPolicy {
    fn from(config: &DeliveryConfig) -> Self {
        Self {
            write_timeout: (config.write_timeout_ms > 0)
                .then(|| Duration::from_millis(config.write_timeout_ms)),
            echo_to_sender: config.echo_to_sender,
        }
    }
}

/// The outcome of routing one message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Recipient entries resolved from the group or the direct list, duplicates included.
    pub resolved: usize,
    /// Writes that completed successfully.
    pub delivered: usize,
    /// Writes that failed or timed out.
    pub failed: usize,
    /// Recipients with no live connection.
    pub offline: usize,
    /// Recipients skipped because they were the sender and echo is disabled.
    pub skipped_self: usize,
    /// True if the message addressed a group that was never joined.
    pub unknown_group: bool,
}

impl DeliveryReport {
    /// The number of recipients a write was attempted for.
    pub fn attempted(&self) -> usize {
        self.delivered + self.failed
    }
}

/// Stateless routing over the shared registry and group store.
///
/// A `Dispatcher` is a cheap borrow; build one per routed message with
/// `ServerState::dispatcher`.
pub struct Dispatcher<'a> {
    registry: &'a ConnectionRegistry,
    groups: &'a GroupStore,
    policy: DeliveryPolicy,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        registry: &'a ConnectionRegistry,
        groups: &'a GroupStore,
        policy: DeliveryPolicy,
    ) -> Self {
        Self {
            registry,
            groups,
            policy,
        }
    }

    /// Routes `message` by group if it names one, otherwise by its recipient list,
    /// writing `payload` to every resolved live connection.
    pub async fn route(&self, message: &Message, payload: &str, origin: Origin<'_>) -> DeliveryReport {
        match message.target() {
            RouteTarget::Group(group_id) => match self.groups.members_of(group_id) {
                Some(members) => self.fan_out(&members, payload, origin).await,
                None => {
                    debug!("Group {} does not exist; nothing delivered.", group_id);
                    DeliveryReport {
                        unknown_group: true,
                        ..Default::default()
                    }
                }
            },
            RouteTarget::Direct(user_ids) => self.fan_out(user_ids, payload, origin).await,
            RouteTarget::Nowhere => {
                debug!("Message of type '{}' has no recipients.", message.kind);
                DeliveryReport::default()
            }
        }
    }

    /// Routes `message` by its recipient list only, ignoring any group.
    pub async fn route_direct(&self, message: &Message, payload: &str) -> DeliveryReport {
        self.fan_out(&message.user_ids, payload, Origin::OneShot)
            .await
    }

    async fn fan_out(&self, recipients: &[String], payload: &str, origin: Origin<'_>) -> DeliveryReport {
        let started = Instant::now();
        let payload: Arc<str> = Arc::from(payload);
        let mut report = DeliveryReport {
            resolved: recipients.len(),
            ..Default::default()
        };

        let mut targets: Vec<Arc<Connection>> = Vec::with_capacity(recipients.len());
        for user_id in recipients {
            if !self.policy.echo_to_sender && origin.is_sender(user_id) {
                report.skipped_self += 1;
                continue;
            }
            match self.registry.lookup(user_id) {
                Some(conn) => targets.push(conn),
                None => {
                    debug!("Client {} not connected.", user_id);
                    report.offline += 1;
                }
            }
        }

        // Writes start in resolution order and run concurrently.
        let outcomes = join_all(
            targets
                .iter()
                .map(|conn| self.deliver(conn, Arc::clone(&payload))),
        )
        .await;
        for delivered in outcomes {
            if delivered {
                report.delivered += 1;
            } else {
                report.failed += 1;
            }
        }

        metrics::DELIVERIES_TOTAL
            .with_label_values(&["delivered"])
            .inc_by(report.delivered as f64);
        metrics::DELIVERIES_TOTAL
            .with_label_values(&["failed"])
            .inc_by(report.failed as f64);
        metrics::DELIVERIES_TOTAL
            .with_label_values(&["offline"])
            .inc_by(report.offline as f64);
        metrics::FANOUT_LATENCY_SECONDS.observe(started.elapsed().as_secs_f64());

        debug!(
            "Fan-out complete: resolved={} delivered={} failed={} offline={} skipped_self={}",
            report.resolved, report.delivered, report.failed, report.offline, report.skipped_self
        );
        report
    }

    /// Writes one frame to one connection. Failures are logged and reported,
    /// never propagated; the connection stays registered.
    async fn deliver(&self, conn: &Connection, payload: Arc<str>) -> bool {
        let write = conn.send_text(payload);
        let result = match self.policy.write_timeout {
            Some(limit) => match tokio::time::timeout(limit, write).await {
                Ok(result) => result,
                Err(_) => Err(super::RelayError::WriteTimeout(limit)),
            },
            None => write.await,
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    "Error sending message to client {} (session {}): {}",
                    conn.user_id, conn.session_id, e
                );
                false
            }
        }
    }
}
