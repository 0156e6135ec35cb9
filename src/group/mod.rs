//! Instance group topology and selection.
//!
//! # Responsibilities
//! - Model named, capacity-bounded sets of interchangeable instances
//! - Select the least-loaded member with anti-affinity
//! - Index instance name -> owning group

pub mod group;
pub mod registry;

pub use group::ChannelGroup;
pub use registry::GroupRegistry;
