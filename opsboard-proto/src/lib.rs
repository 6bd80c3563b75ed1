//! Shared protocol definitions for the opsboard notification hub.
//!
//! Holds the identifiers and enums that appear on the wire, the
//! notification taxonomy, and the frame protocol spoken over the hub's
//! WebSocket endpoint.

pub mod event;
pub mod hub;
pub mod operative;
pub mod task;
