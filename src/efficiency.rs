//! Running efficiency metrics
//!
//! Both metrics are road-only. On hilly road runs the grade-adjusted speed
//! replaces raw speed so a climb does not read as a loss of efficiency.

use serde::{Deserialize, Serialize};

use crate::models::{ActivityRecord, AthleteProfile};
use crate::units::round_dp;
use crate::vo2max::{ACSM_HORIZONTAL_COST, VO2_REST};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EfficiencyConfig {
    /// Gain above which grade-adjusted speed is preferred (meters)
    pub gap_elevation_threshold_m: f64,

    /// Minimum fraction of heart-rate reserve for the effort-based VO2max
    pub min_intensity: f64,
}

impl Default for EfficiencyConfig {
    fn default() -> Self {
        EfficiencyConfig {
            gap_elevation_threshold_m: 50.0,
            min_intensity: 0.50,
        }
    }
}

/// Efficiency factor and effort-based VO2max for road runs
#[derive(Debug, Clone, Default)]
pub struct EfficiencyAnalyzer {
    config: EfficiencyConfig,
}

impl EfficiencyAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EfficiencyConfig) -> Self {
        EfficiencyAnalyzer { config }
    }

    /// Speed used by both metrics, in m/min
    pub fn velocity_m_min(&self, record: &ActivityRecord) -> Option<f64> {
        let gap = record
            .usable_gap_m_s()
            .filter(|_| record.elevation_gain_m > self.config.gap_elevation_threshold_m);

        let speed_m_s = match gap {
            Some(gap) => gap,
            None if record.distance_m > 0.0 && record.duration_s > 0 => {
                record.distance_m / f64::from(record.duration_s)
            }
            None => return None,
        };

        (speed_m_s > 0.0).then_some(speed_m_s * 60.0)
    }

    /// Meters covered per heartbeat, rounded to 2 decimals
    pub fn efficiency_factor(&self, record: &ActivityRecord) -> Option<f64> {
        if !record.is_road() {
            return None;
        }
        let avg_hr = record.avg_hr.filter(|hr| *hr > 0)?;
        let velocity = self.velocity_m_min(record)?;

        Some(round_dp(velocity / f64::from(avg_hr), 2))
    }

    /// Oxygen cost of the pace divided by the fraction of heart-rate reserve
    ///
    /// Unlike the projected estimate this has no resting-cost offset, so it
    /// rewards running fast at a low heart rate. Rounded to 2 decimals.
    pub fn effective_vo2max(
        &self,
        record: &ActivityRecord,
        profile: &AthleteProfile,
    ) -> Option<f64> {
        if !record.is_road() {
            return None;
        }
        let velocity = self.velocity_m_min(record)?;
        let avg_hr = record.avg_hr.filter(|hr| *hr > 0)?;
        let intensity = profile.hrr_fraction(f64::from(avg_hr))?;

        if intensity < self.config.min_intensity {
            return None;
        }

        let vo2_cost = ACSM_HORIZONTAL_COST * velocity + VO2_REST;
        Some(round_dp(vo2_cost / intensity, 2))
    }
}
