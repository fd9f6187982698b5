//! Medians and the median absolute deviation.
//!
//! Two median conventions are offered:
//!
//! - [`median`]: the usual definition, averaging the two middle values of an
//!   even-length sample. Used for group summaries (edge/interior medians, MAD).
//! - [`low_median`]: the lower of the two middle values. Used by median polish,
//!   where every sweep must return an actual sample value so that repeated
//!   solves on the same table are reproducible bit for bit.

use std::cmp::Ordering;

/// Consistency constant making MAD estimate the standard deviation of
/// normally distributed data.
pub const MAD_SCALE: f64 = 1.4826;

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut v = values.to_vec();
    v.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    v
}

/// Median of a sample, averaging the middle pair for even lengths.
///
/// Returns `None` for an empty sample.
///
/// ```
/// use plateqc::stats::median;
///
/// assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
/// assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
/// assert_eq!(median(&[]), None);
/// ```
#[must_use]
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let v = sorted(values);
    let mid = v.len() / 2;
    if v.len() % 2 == 0 {
        Some((v[mid - 1] + v[mid]) / 2.0)
    } else {
        Some(v[mid])
    }
}

/// Median of a sample taking the lower middle value for even lengths.
///
/// ```
/// use plateqc::stats::low_median;
///
/// assert_eq!(low_median(&[4.0, 1.0, 2.0, 3.0]), Some(2.0));
/// ```
#[must_use]
pub fn low_median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let v = sorted(values);
    Some(v[(v.len() - 1) / 2])
}

/// Median absolute deviation: `median(|x - median(x)|)`, unscaled.
///
/// Returns `None` for an empty sample.
#[must_use]
pub fn mad(values: &[f64]) -> Option<f64> {
    let center = median(values)?;
    let deviations: Vec<f64> = values.iter().map(|x| (x - center).abs()).collect();
    median(&deviations)
}

/// MAD multiplied by [`MAD_SCALE`].
#[must_use]
pub fn scaled_mad(values: &[f64]) -> Option<f64> {
    mad(values).map(|m| m * MAD_SCALE)
}
