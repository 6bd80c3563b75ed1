//! opsboard notification hub.
//!
//! Accepts WebSocket clients, tracks which rooms each one has subscribed
//! to, and pushes mission notifications to them. Also hosts the scheduled
//! deadline sweep and monthly score reset.

pub mod config;
pub mod jobs;
pub mod router;
pub mod server;
