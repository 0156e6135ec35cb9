//! Reconnection engine.
//!
//! # Responsibilities
//! - Resolve an ordered candidate list for a parked client
//! - Drive the cascading probe/connect state machine
//! - Run the periodic reconnection and notification ticks

pub mod cascade;
pub mod ticks;

pub use cascade::Reconnector;
pub use ticks::{run_notify_tick, run_reconnect_tick, TickDriver};
