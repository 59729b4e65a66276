//! Core data structures: observations, dates and segment records.

pub mod dates;
mod observation;
mod record;

pub use dates::{from_ordinal, ordinal_from_ymd, to_ordinal};
pub use observation::{Observation, PixelSeries};
pub use record::{CoefficientMatrix, RecordStore, SegmentRecord};
