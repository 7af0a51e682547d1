// src/core/message.rs

//! The routed message payload shared by the websocket and one-shot ingress paths.

use super::errors::RelayError;
use serde::{Deserialize, Deserializer, Serialize};

/// A unit of routed content.
///
/// Missing or `null` `type`, `message` and `user_ids` fields decode as empty
/// values, so a frame carrying only routing information is still accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// The group to broadcast to. Takes precedence over `user_ids`.
    #[serde(default, alias = "group", skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub user_ids: Vec<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Where a message should go, derived from its routing fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteTarget<'a> {
    Group(&'a str),
    Direct(&'a [String]),
    /// Neither a group nor any recipients: nothing is delivered.
    Nowhere,
}

impl Message {
    pub fn parse(text: &str) -> Result<Self, RelayError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, RelayError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Re-serializes the message for delivery.
    pub fn to_json(&self) -> Result<String, RelayError> {
        serde_json::to_string(self).map_err(|e| RelayError::Internal(e.to_string()))
    }

    /// Resolves the routing mode: a non-empty group wins over a non-empty
    /// recipient list.
    pub fn target(&self) -> RouteTarget<'_> {
        match self.room.as_deref() {
            Some(room) if !room.is_empty() => RouteTarget::Group(room),
            _ if !self.user_ids.is_empty() => RouteTarget::Direct(&self.user_ids),
            _ => RouteTarget::Nowhere,
        }
    }
}
