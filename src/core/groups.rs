// src/core/groups.rs

//! Group membership: an append-only list of user identifiers per group.

use dashmap::DashMap;
use tracing::debug;

/// Tracks which user identifiers have joined which group.
///
/// Membership is independent of the connection registry: a member does not
/// need a live connection. Joins are never deduplicated, so a user who joins
/// twice receives group messages twice.
#[derive(Debug, Default)]
pub struct GroupStore {
    groups: DashMap<String, Vec<String>>,
}

impl GroupStore {
    pub fn new() -> Self {
        Default::default()
    }

    /// Appends `user_id` to the group, creating the group on first join.
    pub fn join(&self, group_id: &str, user_id: &str) {
        let mut members = self.groups.entry(group_id.to_string()).or_default();
        members.push(user_id.to_string());
        debug!(
            "User {} joined group {} ({} memberships).",
            user_id,
            group_id,
            members.len()
        );
    }

    /// Returns a copy of the group's members in join order, or `None` if the
    /// group was never joined.
    pub fn members_of(&self, group_id: &str) -> Option<Vec<String>> {
        self.groups.get(group_id).map(|members| members.value().clone())
    }

    /// The number of groups created so far.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// The total number of join entries across all groups, duplicates included.
    pub fn membership_count(&self) -> usize {
        self.groups.iter().map(|entry| entry.value().len()).sum()
    }
}
