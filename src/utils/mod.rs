//! Shared numeric and control helpers.

pub mod control;
pub mod stats;

pub use control::CancelToken;
pub use stats::{chi_squared_critical, mean, median, root_mean_square, student_t_critical};
