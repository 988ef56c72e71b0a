//! Pure aggregation over matched session history.
//!
//! Neither function fails: records without a usable score or name simply
//! contribute nothing.

mod percentages;
mod stars;

pub use percentages::{ListProgress, best_by_mode, compute_percentages};
pub use stars::{StarCounts, compute_star_count, stars_for};
