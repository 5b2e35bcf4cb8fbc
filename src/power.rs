//! Running power estimation
//!
//! Mechanical power from distance, time and climbing when no power meter was
//! worn. The energy cost of running on a slope comes from Minetti's
//! cost-of-grade polynomial (J·kg⁻¹·m⁻¹); mechanical output assumes a fixed
//! running efficiency, which lines the estimate up with foot-pod readings.

use serde::{Deserialize, Serialize};

use crate::models::{ActivityRecord, AthleteProfile};
use crate::units::round_dp;

/// Minetti cost-of-grade coefficients, highest power first
const MINETTI_COEFFICIENTS: [f64; 6] = [155.4, -30.4, -43.3, 46.3, 19.5, 3.6];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerConfig {
    /// Fraction of metabolic power turned into mechanical work
    pub running_efficiency: f64,
}

impl Default for PowerConfig {
    fn default() -> Self {
        PowerConfig {
            running_efficiency: 0.25,
        }
    }
}

/// Energy cost of running at `grade` (rise over run) in J/kg/m
pub fn cost_of_grade(grade: f64) -> f64 {
    MINETTI_COEFFICIENTS
        .iter()
        .fold(0.0, |acc, coefficient| acc * grade + coefficient)
}

/// Fallback power estimator
#[derive(Debug, Clone, Default)]
pub struct PowerEstimator {
    config: PowerConfig,
}

impl PowerEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: PowerConfig) -> Self {
        PowerEstimator { config }
    }

    /// Average mechanical power in watts, rounded to 1 decimal
    ///
    /// `None` when distance, duration or weight is not positive.
    pub fn power_watts(
        &self,
        distance_m: f64,
        duration_s: f64,
        elevation_gain_m: f64,
        weight_kg: f64,
    ) -> Option<f64> {
        if distance_m <= 0.0 || duration_s <= 0.0 || weight_kg <= 0.0 {
            return None;
        }

        let speed_m_s = distance_m / duration_s;
        let grade = elevation_gain_m / distance_m;
        let metabolic_power = cost_of_grade(grade) * speed_m_s * weight_kg;

        Some(round_dp(metabolic_power * self.config.running_efficiency, 1))
    }

    /// Estimate for a stored record
    pub fn estimate_for(&self, record: &ActivityRecord, weight_kg: f64) -> Option<f64> {
        self.power_watts(
            record.distance_m,
            f64::from(record.duration_s),
            record.elevation_gain_m,
            weight_kg,
        )
    }

    /// Power to report for a record
    ///
    /// A positive measurement wins. Otherwise an estimate is produced only
    /// for athletes with a configured weight; the 70 kg default is never used
    /// to invent power figures.
    pub fn resolve_avg_power(
        &self,
        record: &ActivityRecord,
        profile: &AthleteProfile,
    ) -> Option<f64> {
        if let Some(measured) = record.avg_power_w.filter(|watts| *watts > 0.0) {
            return Some(measured);
        }

        let weight_kg = profile.configured_weight()?;
        self.estimate_for(record, weight_kg)
    }
}
