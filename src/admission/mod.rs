//! Holding-area admission tracking.
//!
//! # Responsibilities
//! - Track per-client state while parked: fallback target, queue
//!   membership, in-flight-connecting flag, issue record, intended-target
//!   override
//! - Maintain per-instance FIFO reconnect queues

pub mod tracker;

pub use tracker::AdmissionTracker;
