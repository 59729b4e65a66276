//! Observation screening.
//!
//! - [`MaskConfig`]: value-range and mask-band validity filters, applied to the
//!   whole series before detection starts
//! - [`Screening`]: robust statistical pre-screens applied to each training window

mod mask;
mod robust;

pub use mask::{MaskConfig, DEFAULT_MASK_VALUES};
pub use robust::{Screening, DEFAULT_RLM_CRIT, DEFAULT_TMASK_CRIT};
