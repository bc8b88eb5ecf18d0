//! Run Monitoring Module
//!
//! Tracks step timing and final step states during workflow runs.
//!
//! # Components
//!
//! - [`ExecutionTimeline`]: Step start/finish timing for reports and charts
//! - [`StepStatus`]: Final state of each step

pub mod timeline;

pub use timeline::{EventType, ExecutionTimeline, StepStatus, TimelineEvent};
