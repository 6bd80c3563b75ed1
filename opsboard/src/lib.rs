//! opsboard core: mission lifecycle, scoring, comment log and event routing.
//!
//! Commands enter through [`lifecycle::MissionEngine`], which validates and
//! authorizes them, commits the result through the store ports in
//! [`ports`], and hands back the notifications and mail notices the change
//! produced. A [`dispatch::Dispatcher`] delivers those effects.

pub mod admin;
pub mod comments;
pub mod dispatch;
pub mod error;
pub mod lifecycle;
pub mod mail;
pub mod memory;
pub mod model;
pub mod policy;
pub mod ports;
pub mod schedule;
pub mod scoring;

pub use error::CommandError;
pub use lifecycle::MissionEngine;
