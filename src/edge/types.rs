//! Edge-effect diagnostic types.

use std::collections::BTreeMap;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::spatial::SpatialAutocorrelation;
use crate::error::{Error, Result};
use crate::polish::PolishConfig;
use crate::stats::Correlation;

/// Severity of a detected edge effect.
///
/// Ordered: `Info < Warn < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "UPPERCASE"))]
pub enum WarningLevel {
    /// Below the WARN threshold, or not evaluable.
    Info,
    /// Between the WARN and CRITICAL thresholds.
    Warn,
    /// At or above the CRITICAL threshold.
    Critical,
}

impl WarningLevel {
    /// Classify an effect size against WARN and CRITICAL thresholds.
    ///
    /// A NaN effect size maps to [`WarningLevel::Info`]: the plate could not be
    /// evaluated, which is not evidence of an artifact. Use
    /// [`DiagnosticResult::is_indeterminate`] to tell the two cases apart.
    ///
    /// ```
    /// use plateqc::edge::WarningLevel;
    ///
    /// assert_eq!(WarningLevel::classify(0.79, 0.8, 1.5), WarningLevel::Info);
    /// assert_eq!(WarningLevel::classify(-0.81, 0.8, 1.5), WarningLevel::Warn);
    /// assert_eq!(WarningLevel::classify(1.5, 0.8, 1.5), WarningLevel::Critical);
    /// assert_eq!(WarningLevel::classify(f64::NAN, 0.8, 1.5), WarningLevel::Info);
    /// ```
    #[must_use]
    pub fn classify(effect_size: f64, warn: f64, critical: f64) -> Self {
        let magnitude = effect_size.abs();
        if magnitude.is_nan() || magnitude < warn {
            Self::Info
        } else if magnitude < critical {
            Self::Warn
        } else {
            Self::Critical
        }
    }

    /// Upper-case label used in reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for WarningLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for edge-effect detection.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DetectorConfig {
    /// |d| at or above which a plate is WARN (default: 0.8).
    pub warn_threshold: f64,
    /// |d| at or above which a plate is CRITICAL (default: 1.5).
    pub critical_threshold: f64,
    /// |Spearman rho| at or above which a row/column trend is flagged (default: 0.5).
    pub trend_threshold: f64,
    /// Corner deviation, in interior scale units, at or above which a corner is
    /// flagged (default: 2.0).
    pub corner_threshold: f64,
    /// Significance level a trend's p-value must fall below to be flagged (default: 0.05).
    pub significance_level: f64,
    /// Minimum wells per group (edge, interior) for a confident result (default: 8).
    pub min_group_wells: usize,
    /// Whether to compute Moran's I on median-polish residuals (default: true).
    pub spatial_autocorrelation: bool,
    /// Median polish settings used for the spatial autocorrelation residuals.
    pub polish: PolishConfig,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            warn_threshold: 0.8,
            critical_threshold: 1.5,
            trend_threshold: 0.5,
            corner_threshold: 2.0,
            significance_level: 0.05,
            min_group_wells: 8,
            spatial_autocorrelation: true,
            polish: PolishConfig::default(),
        }
    }
}

impl DetectorConfig {
    /// Set the WARN and CRITICAL effect-size thresholds.
    #[must_use]
    pub fn with_thresholds(mut self, warn: f64, critical: f64) -> Self {
        self.warn_threshold = warn;
        self.critical_threshold = critical;
        self
    }

    /// Set the trend correlation threshold.
    #[must_use]
    pub fn with_trend_threshold(mut self, threshold: f64) -> Self {
        self.trend_threshold = threshold;
        self
    }

    /// Set the corner deviation threshold.
    #[must_use]
    pub fn with_corner_threshold(mut self, threshold: f64) -> Self {
        self.corner_threshold = threshold;
        self
    }

    /// Set the minimum group size.
    #[must_use]
    pub fn with_min_group_wells(mut self, wells: usize) -> Self {
        self.min_group_wells = wells;
        self
    }

    /// Enable or disable the spatial autocorrelation step.
    #[must_use]
    pub fn with_spatial_autocorrelation(mut self, enabled: bool) -> Self {
        self.spatial_autocorrelation = enabled;
        self
    }

    /// Check that thresholds are finite, positive and ordered.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParams`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("warn_threshold", self.warn_threshold),
            ("critical_threshold", self.critical_threshold),
            ("trend_threshold", self.trend_threshold),
            ("corner_threshold", self.corner_threshold),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::invalid_params(format!(
                    "{name} must be a positive finite number, got {value}"
                )));
            }
        }
        if self.warn_threshold > self.critical_threshold {
            return Err(Error::invalid_params(format!(
                "warn_threshold ({}) exceeds critical_threshold ({})",
                self.warn_threshold, self.critical_threshold
            )));
        }
        if !(self.significance_level > 0.0 && self.significance_level < 1.0) {
            return Err(Error::invalid_params(format!(
                "significance_level must lie in (0, 1), got {}",
                self.significance_level
            )));
        }
        self.polish.validate()
    }
}

/// Robust edge-versus-interior effect size.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EffectSize {
    /// `(edge_median - interior_median) / interior_mad`; NaN if indeterminate.
    pub d: f64,
    /// Median of the edge wells (NaN if none).
    pub edge_median: f64,
    /// Median of the interior wells (NaN if none).
    pub interior_median: f64,
    /// Interior scale: 1.4826 × MAD of the interior wells (NaN if none).
    pub interior_mad: f64,
}

/// Spearman trends of row and column medians against their index.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RowColTrends {
    /// Row index versus row median.
    pub row: Correlation,
    /// Column index versus column median.
    pub col: Correlation,
}

/// A plate corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Corner {
    /// Row 0, column 0.
    TopLeft,
    /// Row 0, last column.
    TopRight,
    /// Last row, column 0.
    BottomLeft,
    /// Last row, last column.
    BottomRight,
}

impl Corner {
    /// All corners in a fixed order.
    pub const ALL: [Corner; 4] = [
        Corner::TopLeft,
        Corner::TopRight,
        Corner::BottomLeft,
        Corner::BottomRight,
    ];

    /// Snake-case name used in flat records.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TopLeft => "top_left",
            Self::TopRight => "top_right",
            Self::BottomLeft => "bottom_left",
            Self::BottomRight => "bottom_right",
        }
    }
}

impl fmt::Display for Corner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deviation of each corner from the interior, in interior scale units.
///
/// A value is NaN when the corner well is missing or the scale is zero.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CornerDeviations {
    /// Deviation at row 0, column 0.
    pub top_left: f64,
    /// Deviation at row 0, last column.
    pub top_right: f64,
    /// Deviation at last row, column 0.
    pub bottom_left: f64,
    /// Deviation at last row, last column.
    pub bottom_right: f64,
}

impl CornerDeviations {
    /// All deviations NaN.
    pub const UNDEFINED: Self = Self {
        top_left: f64::NAN,
        top_right: f64::NAN,
        bottom_left: f64::NAN,
        bottom_right: f64::NAN,
    };

    /// Deviation of one corner.
    #[must_use]
    pub const fn get(&self, corner: Corner) -> f64 {
        match corner {
            Corner::TopLeft => self.top_left,
            Corner::TopRight => self.top_right,
            Corner::BottomLeft => self.bottom_left,
            Corner::BottomRight => self.bottom_right,
        }
    }

    /// `(corner, deviation)` pairs in [`Corner::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (Corner, f64)> + '_ {
        Corner::ALL.into_iter().map(|c| (c, self.get(c)))
    }

    /// Largest defined deviation, or NaN if none is defined.
    #[must_use]
    pub fn max(&self) -> f64 {
        self.iter()
            .map(|(_, v)| v)
            .filter(|v| !v.is_nan())
            .fold(f64::NAN, f64::max)
    }

    /// Corners whose deviation is at least `threshold`.
    #[must_use]
    pub fn flagged(&self, threshold: f64) -> Vec<Corner> {
        self.iter()
            .filter(|(_, v)| *v >= threshold)
            .map(|(c, _)| c)
            .collect()
    }
}

/// A value in a flattened diagnostic record.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum FlatValue {
    /// Text field.
    Text(String),
    /// Finite number.
    Number(f64),
    /// Well count.
    Count(usize),
    /// Boolean flag.
    Flag(bool),
    /// Not available (NaN or not computed).
    Missing,
}

impl FlatValue {
    /// Wrap a float, mapping NaN to [`FlatValue::Missing`].
    #[must_use]
    pub fn number(value: f64) -> Self {
        if value.is_nan() {
            Self::Missing
        } else {
            Self::Number(value)
        }
    }
}

impl fmt::Display for FlatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Number(v) => write!(f, "{v}"),
            Self::Count(n) => write!(f, "{n}"),
            Self::Flag(b) => write!(f, "{b}"),
            Self::Missing => Ok(()),
        }
    }
}

/// Edge-effect diagnosis of one metric on one plate.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DiagnosticResult {
    /// Plate identifier.
    pub plate_id: String,
    /// Metric name.
    pub metric: String,
    /// Edge-versus-interior effect size and group summaries.
    pub effect: EffectSize,
    /// Row and column trends.
    pub trends: RowColTrends,
    /// Corner deviations.
    pub corners: CornerDeviations,
    /// Severity derived from the effect size.
    pub warning_level: WarningLevel,
    /// Measured edge wells used.
    pub n_edge_wells: usize,
    /// Measured interior wells used.
    pub n_interior_wells: usize,
    /// Set when either group has fewer than `min_group_wells` wells.
    pub low_confidence: bool,
    /// Row trend exceeds the trend threshold and is significant.
    pub row_trend_flagged: bool,
    /// Column trend exceeds the trend threshold and is significant.
    pub col_trend_flagged: bool,
    /// Corners at or above the corner threshold.
    pub flagged_corners: Vec<Corner>,
    /// Moran's I on median-polish residuals.
    pub spatial: SpatialAutocorrelation,
}

impl DiagnosticResult {
    /// Effect size `d` (NaN if indeterminate).
    #[must_use]
    pub fn effect_size(&self) -> f64 {
        self.effect.d
    }

    /// Whether the effect size could not be evaluated.
    ///
    /// Such results are classified [`WarningLevel::Info`] but carry no evidence
    /// either way.
    #[must_use]
    pub fn is_indeterminate(&self) -> bool {
        self.effect.d.is_nan()
    }

    /// Flatten into a field → value mapping for CSV/JSON export.
    #[must_use]
    pub fn to_flat_map(&self) -> BTreeMap<String, FlatValue> {
        let mut map = BTreeMap::new();
        let mut put = |key: &str, value: FlatValue| {
            map.insert(key.to_string(), value);
        };

        put("plate_id", FlatValue::Text(self.plate_id.clone()));
        put("metric", FlatValue::Text(self.metric.clone()));
        put("effect_size", FlatValue::number(self.effect.d));
        put("edge_median", FlatValue::number(self.effect.edge_median));
        put("interior_median", FlatValue::number(self.effect.interior_median));
        put("interior_mad", FlatValue::number(self.effect.interior_mad));
        put("row_trend_corr", FlatValue::number(self.trends.row.coefficient));
        put("row_trend_p", FlatValue::number(self.trends.row.p_value));
        put("col_trend_corr", FlatValue::number(self.trends.col.coefficient));
        put("col_trend_p", FlatValue::number(self.trends.col.p_value));
        for (corner, deviation) in self.corners.iter() {
            put(&format!("corner_{corner}"), FlatValue::number(deviation));
        }
        put("warning_level", FlatValue::Text(self.warning_level.to_string()));
        put("n_edge_wells", FlatValue::Count(self.n_edge_wells));
        put("n_interior_wells", FlatValue::Count(self.n_interior_wells));
        put("low_confidence", FlatValue::Flag(self.low_confidence));
        put("indeterminate", FlatValue::Flag(self.is_indeterminate()));
        put("row_trend_flagged", FlatValue::Flag(self.row_trend_flagged));
        put("col_trend_flagged", FlatValue::Flag(self.col_trend_flagged));
        put(
            "flagged_corners",
            FlatValue::Text(
                self.flagged_corners
                    .iter()
                    .map(|c| c.as_str())
                    .collect::<Vec<_>>()
                    .join(";"),
            ),
        );
        put(
            "morans_i",
            self.spatial.statistic().map_or(FlatValue::Missing, FlatValue::number),
        );
        put(
            "morans_i_p",
            self.spatial.p_value().map_or(FlatValue::Missing, FlatValue::number),
        );
        put("spatial_status", FlatValue::Text(self.spatial.status().to_string()));
        map
    }

    /// Flat record as a JSON object.
    #[cfg(feature = "serde")]
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.to_flat_map()
                .into_iter()
                .map(|(k, v)| {
                    let value = match v {
                        FlatValue::Text(s) => serde_json::Value::String(s),
                        FlatValue::Number(x) => serde_json::Number::from_f64(x)
                            .map_or(serde_json::Value::Null, serde_json::Value::Number),
                        FlatValue::Count(n) => serde_json::Value::from(n),
                        FlatValue::Flag(b) => serde_json::Value::Bool(b),
                        FlatValue::Missing => serde_json::Value::Null,
                    };
                    (k, value)
                })
                .collect(),
        )
    }
}
