//! Presentation-ready progress values derived from order and impact data.
//!
//! Everything here is pure: the same input always produces the same output,
//! and nothing touches the store or the network.

pub mod milestone;
pub mod stages;
pub mod status;

pub use milestone::{ImpactMetric, MilestoneProgress, MilestoneTracker};
pub use stages::{CANONICAL_STAGES, OrderProgress, Stage, StatusStageMapper};
pub use status::OrderStatus;
