// src/core/metrics.rs

//! Defines and registers Prometheus metrics for relay monitoring.
//!
//! This module uses `lazy_static` to ensure that metrics are registered only once
//! globally for the entire application lifecycle.

use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Gauge, Histogram, TextEncoder, register_counter, register_counter_vec,
    register_gauge, register_histogram,
};

lazy_static! {
    // --- Connection Gauges & Counters ---
    /// The number of websocket sessions currently registered.
    pub static ref CONNECTED_CLIENTS: Gauge =
        register_gauge!("wsrelay_connected_clients", "Number of currently registered websocket sessions.").unwrap();
    /// The total number of TCP connections accepted since startup.
    pub static ref CONNECTIONS_RECEIVED_TOTAL: Counter =
        register_counter!("wsrelay_connections_received_total", "Total number of TCP connections accepted.").unwrap();
    /// Sessions closed right after the handshake because no user_id was supplied.
    pub static ref SESSIONS_REJECTED_TOTAL: Counter =
        register_counter!("wsrelay_sessions_rejected_total", "Total number of websocket sessions rejected for a missing user_id.").unwrap();


    // --- Routing Counters ---
    /// The total number of frames read from websocket sessions.
    pub static ref FRAMES_RECEIVED_TOTAL: Counter =
        register_counter!("wsrelay_frames_received_total", "Total number of frames received from sessions.").unwrap();
    /// Frames that could not be decoded into a message and were skipped.
    pub static ref MALFORMED_FRAMES_TOTAL: Counter =
        register_counter!("wsrelay_malformed_frames_total", "Total number of malformed frames skipped.").unwrap();
    /// Per-recipient delivery outcomes, labeled by outcome.
    pub static ref DELIVERIES_TOTAL: CounterVec =
        register_counter_vec!("wsrelay_deliveries_total", "Per-recipient delivery outcomes.", &["outcome"]).unwrap();
    /// The total number of group joins.
    pub static ref GROUP_JOINS_TOTAL: Counter =
        register_counter!("wsrelay_group_joins_total", "Total number of group joins.").unwrap();
    /// The total number of one-shot send requests, labeled by response status.
    pub static ref ONESHOT_REQUESTS_TOTAL: CounterVec =
        register_counter_vec!("wsrelay_oneshot_requests_total", "Total number of one-shot send requests.", &["status"]).unwrap();


    // --- Histograms ---
    /// Time taken to fan one message out to all of its recipients.
    pub static ref FANOUT_LATENCY_SECONDS: Histogram =
        register_histogram!("wsrelay_fanout_latency_seconds", "Latency of one message fan-out in seconds.").unwrap();
}

/// Gathers all registered metrics and encodes them in the Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode_to_string(&metric_families).unwrap_or_default()
}
