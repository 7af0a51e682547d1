// src/core/mod.rs

//! The central module containing the routing engine and shared state of the relay.

pub mod dispatcher;
pub mod errors;
pub mod groups;
pub mod message;
pub mod metrics;
pub mod registry;
pub mod state;

pub use dispatcher::{DeliveryPolicy, DeliveryReport, Dispatcher, Origin};
pub use errors::RelayError;
pub use message::{Message, RouteTarget};
pub use registry::{Connection, ConnectionRegistry, FrameSink};
