//! Record normalizer.
//!
//! Turns one raw report or model summary into a [`DamageEstimate`] by
//! applying a fixed priority order over its uncertainty signals. The first
//! rule whose inputs are valid wins; rules are never blended.
//!
//! 1. Explicit interval: both bounds valid. Certainty comes from the stated
//!    certainty, else the CIR, else the SD, else the interval width.
//! 2. CIR: interval of that full width around the value.
//! 3. SD: interval of full width `2 * 1.96 * sd`.
//! 4. Stated certainty only: half-width `(1 - certainty) * 5`.
//! 5. Nothing: certainty 0.2 with half-width `(1 - 0.2) * 7`.
//!
//! In rules 2 and 3 a stated certainty replaces the derived one. All of this
//! is pure and total: malformed fields degrade, they never fail.

use serde::{Deserialize, Serialize};

use crate::certainty::{
    certainty_from_ci_width, certainty_from_cir, certainty_from_sd, ci_from_value_and_certainty,
    ci_from_value_and_cir, level_to_certainty, Interval, IntervalHeuristic,
    DEFAULT_MAX_CREDIBLE_CIR, DEFAULT_MAX_EXPECTED_SD, MAX_CERTAINTY, MIN_CERTAINTY, SCALE_MAX,
    SCALE_MIN,
};
use crate::estimate::{severity_from_value, DamageEstimate};
use crate::record::{BstsSummary, RawReport, Reading};

/// Certainty assigned when a record carries no uncertainty signal.
pub const FALLBACK_CERTAINTY: f64 = 0.2;

const STATED_HALF_WIDTH_FACTOR: f64 = 5.0;
const FALLBACK_HALF_WIDTH_FACTOR: f64 = 7.0;
const Z_95: f64 = 1.96;

/// Where a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Citizen report.
    Raw,
    /// BSTS model summary.
    Model,
}

/// Which rule produced the certainty of an estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertaintyBasis {
    /// Explicit interval bounds in the record.
    ExplicitInterval,
    /// Credible interval range.
    Cir,
    /// Standard deviation.
    Sd,
    /// Stated certainty label or number.
    Stated,
    /// No signal; the fallback certainty applies.
    Default,
    /// No record at all.
    NoData,
}

impl CertaintyBasis {
    /// True when the certainty was derived from a signal in the record.
    #[must_use]
    pub const fn is_signal(self) -> bool {
        !matches!(self, Self::Default | Self::NoData)
    }
}

/// The uncertainty-bearing fields of a record, already classified.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UncertaintySignals<'a> {
    pub value: Reading,
    pub ci_lower: Reading,
    pub ci_upper: Reading,
    pub cir: Reading,
    pub sd: Reading,
    pub certainty_level: Option<&'a str>,
    /// Numeric self-reported certainty.
    pub certainty: Reading,
}

impl UncertaintySignals<'_> {
    /// The stated certainty: the label if present, else the numeric
    /// certainty clamped into `[0.1, 0.9]`.
    #[must_use]
    pub fn stated_certainty(&self) -> Option<f64> {
        if let Some(level) = self.certainty_level {
            return Some(level_to_certainty(Some(level)));
        }
        self.certainty
            .value()
            .map(|c| c.clamp(MIN_CERTAINTY, MAX_CERTAINTY))
    }
}

/// A record the normalizer can reconcile.
pub trait Reconcilable {
    /// Origin of the record.
    const KIND: RecordKind;

    /// Classified uncertainty fields.
    fn signals(&self) -> UncertaintySignals<'_>;
}

impl Reconcilable for RawReport {
    const KIND: RecordKind = RecordKind::Raw;

    fn signals(&self) -> UncertaintySignals<'_> {
        UncertaintySignals {
            value: self.value,
            ci_lower: self.ci_lower,
            ci_upper: self.ci_upper,
            cir: self.cir,
            sd: Reading::Absent,
            certainty_level: self.certainty_level.as_deref(),
            certainty: self.certainty,
        }
    }
}

impl Reconcilable for BstsSummary {
    const KIND: RecordKind = RecordKind::Model;

    fn signals(&self) -> UncertaintySignals<'_> {
        UncertaintySignals {
            value: self.value,
            ci_lower: self.ci_lower95,
            ci_upper: self.ci_upper95,
            cir: self.cir,
            sd: self.sd,
            certainty_level: self.certainty_level.as_deref(),
            certainty: Reading::Absent,
        }
    }
}

/// Scale constants for the CIR and SD mappings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizeParams {
    /// CIR at which certainty bottoms out.
    pub max_credible_cir: f64,
    /// SD at which certainty bottoms out.
    pub max_expected_sd: f64,
}

impl Default for NormalizeParams {
    fn default() -> Self {
        Self {
            max_credible_cir: DEFAULT_MAX_CREDIBLE_CIR,
            max_expected_sd: DEFAULT_MAX_EXPECTED_SD,
        }
    }
}

/// An estimate together with the rule that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Reconciliation {
    /// The reconciled estimate.
    pub estimate: DamageEstimate,
    /// Rule that set the certainty.
    pub basis: CertaintyBasis,
    /// `None` for the no-data sentinel.
    pub kind: Option<RecordKind>,
}

impl Reconciliation {
    /// The no-data reconciliation.
    #[must_use]
    pub const fn no_data() -> Self {
        Self {
            estimate: DamageEstimate::NO_DATA,
            basis: CertaintyBasis::NoData,
            kind: None,
        }
    }
}

/// Reconciles already-classified signals.
#[must_use]
pub fn reconcile_signals(
    signals: &UncertaintySignals<'_>,
    kind: RecordKind,
    params: &NormalizeParams,
) -> Reconciliation {
    let value = signals.value.value().unwrap_or(0.0).clamp(SCALE_MIN, SCALE_MAX);
    let stated = signals.stated_certainty();
    let cir_certainty = |cir: f64| certainty_from_cir(cir, params.max_credible_cir);
    let sd_certainty = |sd: f64| certainty_from_sd(sd, params.max_expected_sd);

    let (certainty, interval, basis) = match (signals.ci_lower, signals.ci_upper) {
        (Reading::Valid(lower), Reading::Valid(upper)) => {
            let certainty = stated
                .or_else(|| signals.cir.value().map(cir_certainty))
                .or_else(|| signals.sd.value().map(sd_certainty))
                .unwrap_or_else(|| certainty_from_ci_width(lower, upper, value, SCALE_MAX));
            (certainty, Interval { lower, upper }, CertaintyBasis::ExplicitInterval)
        }
        _ => {
            if let Some(cir) = signals.cir.value() {
                let interval = ci_from_value_and_cir(value, cir, SCALE_MIN, SCALE_MAX);
                (stated.unwrap_or_else(|| cir_certainty(cir)), interval, CertaintyBasis::Cir)
            } else if let Some(sd) = signals.sd.value() {
                let interval = ci_from_value_and_cir(value, 2.0 * Z_95 * sd, SCALE_MIN, SCALE_MAX);
                (stated.unwrap_or_else(|| sd_certainty(sd)), interval, CertaintyBasis::Sd)
            } else if let Some(certainty) = stated {
                let interval = ci_from_value_and_certainty(
                    value,
                    certainty,
                    IntervalHeuristic::HalfWidth(STATED_HALF_WIDTH_FACTOR),
                    SCALE_MIN,
                    SCALE_MAX,
                );
                (certainty, interval, CertaintyBasis::Stated)
            } else {
                let interval = ci_from_value_and_certainty(
                    value,
                    FALLBACK_CERTAINTY,
                    IntervalHeuristic::HalfWidth(FALLBACK_HALF_WIDTH_FACTOR),
                    SCALE_MIN,
                    SCALE_MAX,
                );
                (FALLBACK_CERTAINTY, interval, CertaintyBasis::Default)
            }
        }
    };

    let interval = settle_interval(interval, value);
    Reconciliation {
        estimate: DamageEstimate {
            value,
            ci_lower: interval.lower,
            ci_upper: interval.upper,
            certainty: certainty.clamp(0.0, 1.0),
            severity: severity_from_value(value),
            report_count: 0,
        },
        basis,
        kind: Some(kind),
    }
}

/// Clamps both bounds into the scale and repairs inversion around `value`.
fn settle_interval(interval: Interval, value: f64) -> Interval {
    let lower = interval.lower.clamp(SCALE_MIN, SCALE_MAX);
    let upper = interval.upper.clamp(SCALE_MIN, SCALE_MAX);
    if lower <= upper {
        return Interval { lower, upper };
    }
    let mid = (lower + upper) / 2.0;
    let repaired = Interval {
        lower: value.min(mid),
        upper: value.max(mid),
    };
    if repaired.lower <= repaired.upper {
        repaired
    } else {
        Interval::point(value)
    }
}

/// Reconciles a record with the given scale constants.
#[must_use]
pub fn reconcile_with<R: Reconcilable>(record: &R, params: &NormalizeParams) -> Reconciliation {
    reconcile_signals(&record.signals(), R::KIND, params)
}

/// Reconciles a record with the default scale constants.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use quakeview::certainty::certainty_from_cir;
/// use quakeview::normalize::{reconcile, CertaintyBasis};
/// use quakeview::{BstsSummary, Category, LocationId};
///
/// let t = Utc.with_ymd_and_hms(2020, 4, 8, 8, 0, 0).unwrap();
/// let summary = BstsSummary::new(t, LocationId::from(5), Category::Buildings, 6.2)
///     .with_cir(2.0)
///     .with_sd(1.0);
///
/// let rec = reconcile(&summary);
/// assert_eq!(rec.basis, CertaintyBasis::Cir);
/// assert_eq!(rec.estimate.certainty, certainty_from_cir(2.0, 4.0));
/// ```
#[must_use]
pub fn reconcile<R: Reconcilable>(record: &R) -> Reconciliation {
    reconcile_with(record, &NormalizeParams::default())
}

/// Normalizes a record into its estimate.
#[must_use]
pub fn normalize<R: Reconcilable>(record: &R) -> DamageEstimate {
    reconcile(record).estimate
}

/// Normalizes an optional record; `None` yields the no-data sentinel.
#[must_use]
pub fn normalize_optional<R: Reconcilable>(
    record: Option<&R>,
    params: &NormalizeParams,
) -> Reconciliation {
    record.map_or_else(Reconciliation::no_data, |r| reconcile_with(r, params))
}
