#![forbid(unsafe_code)]

pub mod aggregate;
pub mod canon;
pub mod error;
pub mod matcher;
pub mod model;
pub mod time;

pub use aggregate::{ListProgress, StarCounts, compute_percentages, compute_star_count, stars_for};
pub use error::Error;
pub use time::Clock;
