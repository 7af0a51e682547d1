// src/connection/mod.rs

//! Manages the lifecycle of a single websocket session: registration, group
//! membership, the frame read loop, and cleanup on disconnect.

// Declare the private sub-modules of the `connection` module.
mod guard;
mod handler;
mod session;
mod sink;

// Publicly re-export the primary types from the sub-modules.
pub use guard::ConnectionGuard;
pub use handler::ConnectionHandler;
pub use session::{ConnectParams, Inbound, SessionPhase};
pub use sink::{WsSink, inbound_frames};
