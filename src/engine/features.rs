/// Feature derivation for the win-probability backend.
///
/// Turns the raw values entered on the dashboard into the 20-slot vector the
/// backend model was trained on.  Slot order is a wire contract with no
/// schema versioning: `FeatureVector::from_parts` is the only place that
/// decides it, and `FEATURE_NAMES` mirrors it for display.
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of slots the backend expects (19 real features + 1 dummy).
pub const FEATURE_COUNT: usize = 20;

/// Season the model was trained for.  The form does not expose it.
pub const SEASON_YEAR: f64 = 2025.0;

/// Assumed finishing position used as the baseline for `PositionImprovement`.
pub const BASELINE_FINISH: i64 = 5;

pub const GRID_POSITIONS: (i64, i64) = (1, 20);
pub const DRIVER_CODES: (i64, i64) = (0, 19);

/// Default fastest reference lap for the `auto` time-diff mode, in seconds.
pub const DEFAULT_REFERENCE_LAP_S: f64 = 79.0;

/// Backend feature names in slot order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "Year",
    "GridPosition",
    "LapTime",
    "BestQuali",
    "RacePace",
    "Sector1Time",
    "Sector2Time",
    "Sector3Time",
    "SectorTimeConsistency",
    "QualiAdvantage",
    "PositionImprovement",
    "RacePaceEfficiency",
    "Sector1Ratio",
    "Sector2Ratio",
    "Sector3Ratio",
    "TimeDiffFromFastest",
    "DriverEncoded",
    "AvgPrevPositions",
    "AvgPrevPoints",
    "Dummy",
];

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureError {
    #[error("{field} must be between {min} and {max} (got {value})")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },
    #[error("{field} must be greater than zero (got {value})")]
    NonPositive { field: &'static str, value: f64 },
    #[error("{field} must not be negative (got {value})")]
    Negative { field: &'static str, value: f64 },
    #[error("{field} is not a finite number")]
    NotFinite { field: &'static str },
    #[error("sector times sum to zero; sector ratios are undefined")]
    ZeroSectorTotal,
    #[error("feature vector must have exactly {expected} values (got {got})")]
    WrongLength { expected: usize, got: usize },
}

/// Values as entered by the user.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawInputs {
    pub year: f64,
    pub grid_position: i64,
    pub lap_time: f64,
    pub best_quali: f64,
    pub race_pace: f64,
    pub sector1_time: f64,
    pub sector2_time: f64,
    pub sector3_time: f64,
    pub driver_encoded: i64,
    pub avg_prev_positions: f64,
    pub avg_prev_points: f64,
    pub time_diff_from_fastest: f64,
}

impl Default for RawInputs {
    fn default() -> Self {
        Self {
            year: SEASON_YEAR,
            grid_position: 5,
            lap_time: 80.5,
            best_quali: 79.9,
            race_pace: 81.2,
            sector1_time: 25.0,
            sector2_time: 28.0,
            sector3_time: 27.5,
            driver_encoded: 10,
            avg_prev_positions: 5.0,
            avg_prev_points: 15.0,
            time_diff_from_fastest: 0.5,
        }
    }
}

impl RawInputs {
    /// Bounds checks run before any derivation.
    pub fn validate(&self) -> Result<(), FeatureError> {
        finite("Year", self.year)?;
        in_range("GridPosition", self.grid_position, GRID_POSITIONS)?;
        in_range("DriverEncoded", self.driver_encoded, DRIVER_CODES)?;
        positive("LapTime", self.lap_time)?;
        positive("BestQuali", self.best_quali)?;
        positive("RacePace", self.race_pace)?;
        positive("Sector1Time", self.sector1_time)?;
        positive("Sector2Time", self.sector2_time)?;
        positive("Sector3Time", self.sector3_time)?;
        non_negative("AvgPrevPositions", self.avg_prev_positions)?;
        non_negative("AvgPrevPoints", self.avg_prev_points)?;
        non_negative("TimeDiffFromFastest", self.time_diff_from_fastest)?;
        Ok(())
    }

    pub fn sectors(&self) -> [f64; 3] {
        [self.sector1_time, self.sector2_time, self.sector3_time]
    }
}

fn finite(field: &'static str, value: f64) -> Result<(), FeatureError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(FeatureError::NotFinite { field })
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), FeatureError> {
    finite(field, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(FeatureError::NonPositive { field, value })
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), FeatureError> {
    finite(field, value)?;
    if value >= 0.0 {
        Ok(())
    } else {
        Err(FeatureError::Negative { field, value })
    }
}

fn in_range(field: &'static str, value: i64, (min, max): (i64, i64)) -> Result<(), FeatureError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(FeatureError::OutOfRange { field, value, min, max })
    }
}

/// How `TimeDiffFromFastest` is filled in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeDiffMode {
    /// Use the value typed into the form.
    Manual,
    /// `max(0, best_quali - reference_lap_s)`.
    Auto { reference_lap_s: f64 },
}

impl TimeDiffMode {
    pub fn resolve(&self, raw: &RawInputs) -> f64 {
        match *self {
            TimeDiffMode::Manual => raw.time_diff_from_fastest,
            TimeDiffMode::Auto { reference_lap_s } => (raw.best_quali - reference_lap_s).max(0.0),
        }
    }

    pub fn is_auto(&self) -> bool {
        matches!(self, TimeDiffMode::Auto { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedFeatures {
    pub sector_time_consistency: f64,
    pub quali_advantage: f64,
    pub position_improvement: f64,
    pub race_pace_efficiency: f64,
    pub sector1_ratio: f64,
    pub sector2_ratio: f64,
    pub sector3_ratio: f64,
    pub time_diff_from_fastest: f64,
}

impl DerivedFeatures {
    /// Assumes `raw` already passed `validate`; the zero-denominator guards
    /// are kept anyway so no path can emit NaN.
    pub fn compute(raw: &RawInputs, time_diff: TimeDiffMode) -> Result<Self, FeatureError> {
        let sectors = raw.sectors();
        let total: f64 = sectors.iter().sum();
        if total <= 0.0 || !total.is_finite() {
            return Err(FeatureError::ZeroSectorTotal);
        }
        if raw.lap_time == 0.0 {
            return Err(FeatureError::NonPositive { field: "LapTime", value: raw.lap_time });
        }

        Ok(Self {
            sector_time_consistency: population_std(&sectors),
            quali_advantage: raw.best_quali - raw.lap_time,
            position_improvement: (raw.grid_position - BASELINE_FINISH) as f64,
            race_pace_efficiency: raw.race_pace / raw.lap_time,
            sector1_ratio: raw.sector1_time / total,
            sector2_ratio: raw.sector2_time / total,
            sector3_ratio: raw.sector3_time / total,
            time_diff_from_fastest: time_diff.resolve(raw),
        })
    }
}

/// Population (ddof = 0) standard deviation.
pub fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    var.sqrt()
}

/// The ordered payload sent to the backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector([f64; FEATURE_COUNT]);

impl FeatureVector {
    /// Canonical slot layout.
    pub fn from_parts(raw: &RawInputs, d: &DerivedFeatures) -> Self {
        Self([
            raw.year,
            raw.grid_position as f64,
            raw.lap_time,
            raw.best_quali,
            raw.race_pace,
            raw.sector1_time,
            raw.sector2_time,
            raw.sector3_time,
            d.sector_time_consistency,
            d.quali_advantage,
            d.position_improvement,
            d.race_pace_efficiency,
            d.sector1_ratio,
            d.sector2_ratio,
            d.sector3_ratio,
            d.time_diff_from_fastest,
            raw.driver_encoded as f64,
            raw.avg_prev_positions,
            raw.avg_prev_points,
            0.0,
        ])
    }

    /// Rebuild from an untyped slice. Wrong lengths are rejected, never
    /// padded or truncated.
    pub fn from_slice(values: &[f64]) -> Result<Self, FeatureError> {
        let arr: [f64; FEATURE_COUNT] = values.try_into().map_err(|_| FeatureError::WrongLength {
            expected: FEATURE_COUNT,
            got: values.len(),
        })?;
        let vector = Self(arr);
        vector.check_finite()?;
        Ok(vector)
    }

    fn check_finite(&self) -> Result<(), FeatureError> {
        for (name, value) in self.named() {
            finite(name, value)?;
        }
        Ok(())
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|n| *n == name)
            .map(|i| self.0[i])
    }

    pub fn named(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        FEATURE_NAMES.iter().copied().zip(self.0.iter().copied())
    }
}

/// Derivation with a configurable time-diff source.
#[derive(Debug, Clone, Copy)]
pub struct FeatureDeriver {
    pub time_diff: TimeDiffMode,
}

impl Default for FeatureDeriver {
    fn default() -> Self {
        Self { time_diff: TimeDiffMode::Manual }
    }
}

impl FeatureDeriver {
    pub fn new(time_diff: TimeDiffMode) -> Self {
        Self { time_diff }
    }

    pub fn derive(&self, raw: &RawInputs) -> Result<FeatureVector, FeatureError> {
        let raw = match self.time_diff {
            TimeDiffMode::Manual => *raw,
            // Whatever sits in the form field is ignored in auto mode.
            TimeDiffMode::Auto { .. } => RawInputs {
                time_diff_from_fastest: self.time_diff.resolve(raw),
                ..*raw
            },
        };
        raw.validate()?;
        let derived = DerivedFeatures::compute(&raw, self.time_diff)?;
        let vector = FeatureVector::from_parts(&raw, &derived);
        vector.check_finite()?;
        Ok(vector)
    }
}

/// Derive with the user-entered time diff.
pub fn derive(raw: &RawInputs) -> Result<FeatureVector, FeatureError> {
    FeatureDeriver::default().derive(raw)
}
