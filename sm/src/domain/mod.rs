//! Domain types for project breakdowns
//!
//! - [`Breakdown`] - the full epic/story tree for one project description
//! - [`Epic`] / [`Story`] - nodes of the tree
//! - [`Priority`] - High/Medium/Low, ordered for escalation

mod breakdown;
mod priority;

pub use breakdown::{Breakdown, Epic, Story, normalize_title};
pub use priority::Priority;
