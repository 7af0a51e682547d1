// src/core/state/stats.rs

//! Contains state definitions and logic for relay statistics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Holds all state and logic related to relay-wide statistics and monitoring.
#[derive(Debug)]
pub struct StatsState {
    /// The total number of websocket sessions registered since startup.
    total_sessions: AtomicU64,
    /// The total number of frames read from sessions since startup.
    total_frames: AtomicU64,
    /// The total number of one-shot send requests accepted since startup.
    total_oneshot_requests: AtomicU64,
}

impl Default for StatsState {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsState {
    /// Creates a new `StatsState` with initialized counters.
    pub fn new() -> Self {
        Self {
            total_sessions: AtomicU64::new(0),
            total_frames: AtomicU64::new(0),
            total_oneshot_requests: AtomicU64::new(0),
        }
    }

    /// Atomically increments the total number of registered sessions.
    pub fn increment_total_sessions(&self) {
        self.total_sessions.fetch_add(1, Ordering::Relaxed);
    }

    /// Gets the total number of registered sessions.
    pub fn get_total_sessions(&self) -> u64 {
        self.total_sessions.load(Ordering::Relaxed)
    }

    /// Atomically increments the total number of frames received.
    pub fn increment_total_frames(&self) {
        self.total_frames.fetch_add(1, Ordering::Relaxed);
    }

    /// Gets the total number of frames received.
    pub fn get_total_frames(&self) -> u64 {
        self.total_frames.load(Ordering::Relaxed)
    }

    /// Atomically increments the total number of one-shot requests.
    pub fn increment_total_oneshot_requests(&self) {
        self.total_oneshot_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Gets the total number of one-shot requests.
    pub fn get_total_oneshot_requests(&self) -> u64 {
        self.total_oneshot_requests.load(Ordering::Relaxed)
    }
}
