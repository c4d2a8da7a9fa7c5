//! Certainty algebra.
//!
//! Pure conversions between the uncertainty signals found in the datasets
//! (categorical levels, credible interval ranges, standard deviations and
//! explicit bounds) and a single numeric certainty in `[0, 1]`.
//!
//! Certainties produced here stay within `[0.1, 0.9]`. The one exception is
//! [`certainty_from_ci_width`], which returns exactly `0.0` for an interval
//! spanning the whole scale. Callers must keep that value as is.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lowest certainty any signal maps to.
pub const MIN_CERTAINTY: f64 = 0.1;

/// Highest certainty any signal maps to.
pub const MAX_CERTAINTY: f64 = 0.9;

/// Certainty used when a signal is missing or unusable.
pub const DEFAULT_CERTAINTY: f64 = 0.5;

/// CIR at which certainty bottoms out.
pub const DEFAULT_MAX_CREDIBLE_CIR: f64 = 4.0;

/// Standard deviation at which certainty bottoms out.
pub const DEFAULT_MAX_EXPECTED_SD: f64 = 2.5;

/// Lower end of the damage scale.
pub const SCALE_MIN: f64 = 0.0;

/// Upper end of the damage scale.
pub const SCALE_MAX: f64 = 10.0;

/// Width at or below which an interval counts as a point estimate.
const POINT_WIDTH: f64 = 0.01;

/// Certainty of a point estimate at exactly zero.
const ZERO_POINT_CERTAINTY: f64 = 0.7;

fn clamp_certainty(c: f64) -> f64 {
    c.clamp(MIN_CERTAINTY, MAX_CERTAINTY)
}

/// Categorical certainty labels used by reports and model summaries.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertaintyLevel {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl CertaintyLevel {
    /// Dataset spelling of the level.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::VeryLow => "very_low",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::VeryHigh => "very_high",
        }
    }

    /// Numeric certainty the level stands for.
    #[must_use]
    pub const fn certainty(self) -> f64 {
        match self {
            Self::VeryLow => 0.1,
            Self::Low => 0.3,
            Self::Medium => 0.5,
            Self::High => 0.8,
            Self::VeryHigh => 0.9,
        }
    }

    /// Parses a label, ignoring case and surrounding whitespace.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "very_low" => Some(Self::VeryLow),
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "very_high" => Some(Self::VeryHigh),
            _ => None,
        }
    }

    /// Sentence describing the level for tooltips and summaries.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::VeryLow => "Very low confidence in this estimate",
            Self::Low => "Low confidence in this estimate",
            Self::Medium => "Medium confidence in this estimate",
            Self::High => "High confidence in this estimate",
            Self::VeryHigh => "Very high confidence in this estimate",
        }
    }
}

impl fmt::Display for CertaintyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CertaintyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown certainty level: {s}"))
    }
}

/// Maps a categorical label to a certainty.
///
/// Unknown or absent labels map to the medium certainty.
///
/// # Examples
///
/// ```
/// use quakeview::certainty::level_to_certainty;
///
/// assert_eq!(level_to_certainty(Some("HIGH")), 0.8);
/// assert_eq!(level_to_certainty(Some("unsure")), 0.5);
/// assert_eq!(level_to_certainty(None), 0.5);
/// ```
#[must_use]
pub fn level_to_certainty(label: Option<&str>) -> f64 {
    label
        .and_then(CertaintyLevel::parse)
        .map_or(DEFAULT_CERTAINTY, CertaintyLevel::certainty)
}

fn linear_certainty(spread: f64, max_spread: f64) -> f64 {
    if !spread.is_finite() || spread < 0.0 || !max_spread.is_finite() || max_spread <= 0.0 {
        return DEFAULT_CERTAINTY;
    }
    clamp_certainty(MAX_CERTAINTY - (spread / max_spread) * 0.8)
}

/// Certainty from a credible interval range.
///
/// Decreases linearly from 0.9 at `cir = 0` to 0.1 at `cir >= max_credible_cir`.
/// A negative or non-finite CIR, or a non-positive maximum, gives 0.5.
#[must_use]
pub fn certainty_from_cir(cir: f64, max_credible_cir: f64) -> f64 {
    linear_certainty(cir, max_credible_cir)
}

/// Certainty from a standard deviation, same linear form as [`certainty_from_cir`].
#[must_use]
pub fn certainty_from_sd(sd: f64, max_expected_sd: f64) -> f64 {
    linear_certainty(sd, max_expected_sd)
}

/// Certainty from the width of an explicit interval.
///
/// A width covering the whole scale gives exactly `0.0`. A point interval
/// gives 0.9, or 0.7 when the value itself is exactly zero.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn certainty_from_ci_width(lower: f64, upper: f64, value: f64, scale_max: f64) -> f64 {
    if !lower.is_finite() || !upper.is_finite() || !scale_max.is_finite() || scale_max <= 0.0 {
        return DEFAULT_CERTAINTY;
    }
    let width = (upper - lower).abs();
    if width >= scale_max {
        0.0
    } else if width <= POINT_WIDTH {
        if value == 0.0 {
            ZERO_POINT_CERTAINTY
        } else {
            MAX_CERTAINTY
        }
    } else {
        clamp_certainty(1.0 - width / scale_max)
    }
}

/// Inverse of the full-scale CIR mapping: 0.9 gives 0, 0.1 gives 10.
///
/// Non-finite certainties map to the medium CIR of 5.
#[must_use]
pub fn certainty_to_cir(certainty: f64) -> f64 {
    if !certainty.is_finite() {
        return 5.0;
    }
    (MAX_CERTAINTY - clamp_certainty(certainty)) * (SCALE_MAX / 0.8)
}

/// Buckets a numeric certainty into a [`CertaintyLevel`].
#[must_use]
pub fn certainty_to_level(certainty: f64) -> CertaintyLevel {
    if !certainty.is_finite() {
        return CertaintyLevel::Medium;
    }
    if certainty < 0.2 {
        CertaintyLevel::VeryLow
    } else if certainty < 0.4 {
        CertaintyLevel::Low
    } else if certainty < 0.6 {
        CertaintyLevel::Medium
    } else if certainty < 0.8 {
        CertaintyLevel::High
    } else {
        CertaintyLevel::VeryHigh
    }
}

/// Describes a numeric certainty in words.
#[must_use]
pub fn certainty_description(certainty: f64) -> &'static str {
    certainty_to_level(certainty).description()
}

/// Coarse certainty band used for reliability breakdowns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertaintyBand {
    /// Below 0.4.
    Low,
    /// From 0.4 up to 0.8.
    Medium,
    /// 0.8 and above.
    High,
}

impl CertaintyBand {
    /// Classifies a certainty. Non-finite values count as low.
    #[must_use]
    pub fn of(certainty: f64) -> Self {
        if !certainty.is_finite() || certainty < 0.4 {
            Self::Low
        } else if certainty < 0.8 {
            Self::Medium
        } else {
            Self::High
        }
    }
}

/// A closed credible interval on the damage scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    /// Lower bound.
    pub lower: f64,
    /// Upper bound.
    pub upper: f64,
}

impl Interval {
    /// A zero-width interval at `at`.
    #[must_use]
    pub const fn point(at: f64) -> Self {
        Self { lower: at, upper: at }
    }

    /// Distance between the bounds.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    /// True when `value` lies within the closed interval.
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }
}

/// How to widen a value into an interval when only a certainty is known.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IntervalHeuristic {
    /// Symmetric half-width of `(1 - certainty) * factor`.
    HalfWidth(f64),
    /// Full width taken from [`certainty_to_cir`].
    CirInverse,
}

/// Interval around `value` with full width `cir`.
///
/// Each bound is first clamped toward `value` and then into the scale. If
/// that leaves the bounds inverted (the value lies outside the scale), the
/// interval collapses onto the nearest scale boundary. A non-finite `cir`
/// gives a point interval at the clamped value.
///
/// # Examples
///
/// ```
/// use quakeview::certainty::ci_from_value_and_cir;
///
/// let ci = ci_from_value_and_cir(9.5, 2.0, 0.0, 10.0);
/// assert_eq!((ci.lower, ci.upper), (8.5, 10.0));
/// ```
#[must_use]
pub fn ci_from_value_and_cir(value: f64, cir: f64, scale_min: f64, scale_max: f64) -> Interval {
    if !value.is_finite() || !cir.is_finite() {
        let at = if value.is_finite() {
            value
        } else {
            (scale_min + scale_max) / 2.0
        };
        return Interval::point(at.max(scale_min).min(scale_max));
    }

    let half = cir.abs() / 2.0;
    let lower = (value - half).min(value).max(scale_min);
    let upper = (value + half).max(value).min(scale_max);

    if lower <= upper {
        Interval { lower, upper }
    } else if value < scale_min {
        Interval::point(scale_min)
    } else if value > scale_max {
        Interval::point(scale_max)
    } else {
        Interval::point(value)
    }
}

/// Interval around `value` derived from a certainty via `heuristic`.
#[must_use]
pub fn ci_from_value_and_certainty(
    value: f64,
    certainty: f64,
    heuristic: IntervalHeuristic,
    scale_min: f64,
    scale_max: f64,
) -> Interval {
    let certainty = if certainty.is_finite() {
        certainty
    } else {
        DEFAULT_CERTAINTY
    };
    let width = match heuristic {
        IntervalHeuristic::HalfWidth(factor) => 2.0 * (1.0 - certainty) * factor,
        IntervalHeuristic::CirInverse => certainty_to_cir(certainty),
    };
    ci_from_value_and_cir(value, width, scale_min, scale_max)
}
