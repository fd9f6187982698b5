//! Rank correlation for trend detection.

use std::cmp::Ordering;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::distribution::t_two_sided_p_value;

/// A correlation coefficient with its two-sided significance.
///
/// Both fields are NaN when the correlation is undefined (fewer than three
/// pairs, or one of the series is constant).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Correlation {
    /// Correlation coefficient in [-1, 1].
    pub coefficient: f64,
    /// Two-sided p-value for the null hypothesis of no association.
    pub p_value: f64,
}

impl Correlation {
    /// An undefined correlation.
    pub const UNDEFINED: Self = Self {
        coefficient: f64::NAN,
        p_value: f64::NAN,
    };

    /// Whether the coefficient could be computed.
    #[must_use]
    pub fn is_defined(&self) -> bool {
        !self.coefficient.is_nan()
    }
}

/// Fractional ranks (1-based), averaging ranks across ties.
///
/// ```
/// use plateqc::stats::ranks;
///
/// assert_eq!(ranks(&[10.0, 30.0, 20.0, 20.0]), vec![1.0, 4.0, 2.5, 2.5]);
/// ```
#[must_use]
pub fn ranks(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        values[a]
            .partial_cmp(&values[b])
            .unwrap_or(Ordering::Equal)
            .then(a.cmp(&b))
    });

    let mut result = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        // positions i..=j share the average of ranks i+1..=j+1
        let average = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            result[idx] = average;
        }
        i = j + 1;
    }
    result
}

/// Pearson product-moment correlation.
///
/// Returns `None` if the slices differ in length, hold fewer than two values,
/// or either series has zero variance.
#[must_use]
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len();
    if n != y.len() || n < 2 {
        return None;
    }

    let mean_x = x.iter().sum::<f64>() / n as f64;
    let mean_y = y.iter().sum::<f64>() / n as f64;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in x.iter().zip(y) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    if sxx <= 0.0 || syy <= 0.0 {
        return None;
    }
    Some((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0))
}

/// Spearman rank correlation with a two-sided p-value.
///
/// The p-value uses the t approximation
/// `t = r * sqrt((n - 2) / (1 - r²))` with `n - 2` degrees of freedom.
///
/// ```
/// use plateqc::stats::spearman;
///
/// let c = spearman(&[1.0, 2.0, 3.0, 4.0, 5.0], &[1.0, 4.0, 9.0, 16.0, 25.0]);
/// assert!((c.coefficient - 1.0).abs() < 1e-12);
/// assert_eq!(c.p_value, 0.0);
/// ```
#[must_use]
pub fn spearman(x: &[f64], y: &[f64]) -> Correlation {
    let n = x.len();
    if n != y.len() || n < 3 {
        return Correlation::UNDEFINED;
    }

    let Some(r) = pearson(&ranks(x), &ranks(y)) else {
        return Correlation::UNDEFINED;
    };

    let df = (n - 2) as f64;
    let p_value = if (1.0 - r.abs()) <= f64::EPSILON {
        0.0
    } else {
        let t = r * (df / (1.0 - r * r)).sqrt();
        t_two_sided_p_value(t, df)
    };

    Correlation {
        coefficient: r,
        p_value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranks_without_ties() {
        assert_eq!(ranks(&[3.0, 1.0, 2.0]), vec![3.0, 1.0, 2.0]);
        assert!(ranks(&[]).is_empty());
    }

    #[test]
    fn test_ranks_all_tied() {
        assert_eq!(ranks(&[7.0, 7.0, 7.0]), vec![2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_pearson_perfect() {
        let r = pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]).unwrap();
        assert!((r - 1.0).abs() < 1e-12);
        assert!(pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]).is_none());
        assert!(pearson(&[1.0], &[1.0]).is_none());
    }

    #[test]
    fn test_spearman_monotone_decreasing() {
        let c = spearman(&[1.0, 2.0, 3.0, 4.0], &[10.0, 5.0, 1.0, -3.0]);
        assert!((c.coefficient + 1.0).abs() < 1e-12);
        assert_eq!(c.p_value, 0.0);
    }

    #[test]
    fn test_spearman_known_value() {
        // scipy.stats.spearmanr([1..8], [2,1,4,3,6,5,8,7]) = (0.9047619, 0.0020082)
        let x: Vec<f64> = (1..=8).map(f64::from).collect();
        let y = [2.0, 1.0, 4.0, 3.0, 6.0, 5.0, 8.0, 7.0];
        let c = spearman(&x, &y);
        assert!((c.coefficient - 0.904_761_9).abs() < 1e-6);
        assert!((c.p_value - 0.002_008).abs() < 1e-4, "got {}", c.p_value);
    }

    #[test]
    fn test_spearman_undefined_cases() {
        assert!(!spearman(&[1.0, 2.0], &[1.0, 2.0]).is_defined());
        assert!(!spearman(&[1.0, 2.0, 3.0], &[5.0, 5.0, 5.0]).is_defined());
        assert!(!spearman(&[1.0, 2.0, 3.0], &[1.0, 2.0]).is_defined());
    }
}
