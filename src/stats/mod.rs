//! Robust statistics used by the correction and diagnostic engines.
//!
//! Provides:
//! - Medians (conventional and lower-middle) and the median absolute deviation
//! - Rank transform and Spearman rank correlation with a two-sided p-value
//! - Student-t and standard normal tail probabilities
//!
//! All functions take already-filtered `f64` slices: missing wells are dropped
//! by the caller before anything reaches this module.

mod correlation;
mod distribution;
mod robust;

pub use correlation::{pearson, ranks, spearman, Correlation};
pub use distribution::{
    ln_gamma, normal_two_sided_p_value, regularized_incomplete_beta, t_two_sided_p_value,
};
pub use robust::{low_median, mad, median, scaled_mad, MAD_SCALE};
