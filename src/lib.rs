//! ScreenWire: UDP receiver for length-prefixed screen frame streams
//!
//! This crate reassembles screen frames scattered across datagrams and
//! hands the decoded payloads to a consumer thread for display or capture.

pub mod server;
pub mod frame;
pub mod payload;
pub mod pixel;
pub mod error;
