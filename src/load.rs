//! Training load and injury-risk indicators
//!
//! Load is expressed in km-effort: kilometers plus one kilometer for every
//! 100 m climbed. The acute:chronic workload ratio (ACWR) compares the last
//! week with the weekly average of the last four.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::error::TrailRsError;
use crate::history::ActivityHistory;
use crate::models::{ActivityRecord, AthleteProfile};
use crate::units::round_dp;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadRiskConfig {
    /// Length of the acute window in days
    pub acute_days: i64,

    /// Length of the chronic window in days
    pub chronic_days: i64,

    /// Divisor turning the chronic total into a weekly average
    pub chronic_weeks: f64,

    /// Chronic weekly load must exceed this for a ratio to be meaningful
    pub min_chronic_load: f64,

    /// Ratio at or above which injury risk is flagged
    pub high_risk_ratio: f64,

    /// Ratio at or below which detraining is flagged
    pub detraining_ratio: f64,

    /// Meters of climbing worth one km-effort
    pub elevation_per_km_effort_m: f64,
}

impl Default for LoadRiskConfig {
    fn default() -> Self {
        LoadRiskConfig {
            acute_days: 7,
            chronic_days: 28,
            chronic_weeks: 4.0,
            min_chronic_load: 10.0,
            high_risk_ratio: 1.3,
            detraining_ratio: 0.6,
            elevation_per_km_effort_m: 100.0,
        }
    }
}

/// ACWR classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadStatus {
    /// Acute load spiking above the chronic base
    HighInjuryRisk,
    /// Acute load well below the chronic base
    Detraining,
    NoAlert,
}

impl fmt::Display for LoadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LoadStatus::HighInjuryRisk => "high injury risk",
            LoadStatus::Detraining => "detraining",
            LoadStatus::NoAlert => "no alert",
        };
        f.write_str(label)
    }
}

/// Acute:chronic workload ratio at a reference time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadRiskResult {
    /// Ratio rounded to 2 decimals
    pub ratio: f64,
    /// Status of the unrounded ratio
    pub status: LoadStatus,
    /// Km-effort over the acute window
    pub acute_load: f64,
    /// Average weekly km-effort over the chronic window
    pub chronic_avg_load: f64,
    pub reference_time: DateTime<Utc>,
}

impl LoadRiskResult {
    pub fn is_alert(&self) -> bool {
        self.status != LoadStatus::NoAlert
    }
}

/// Karvonen band of a week's average heart rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntensityBand {
    /// Z4/Z5
    High,
    /// Z3/Z4
    Threshold,
    /// Z2
    Aerobic,
    /// Z1
    Recovery,
    /// No heart-rate data
    Unknown,
}

impl IntensityBand {
    pub fn from_hrr_fraction(fraction: f64) -> Self {
        if fraction >= 0.85 {
            IntensityBand::High
        } else if fraction >= 0.75 {
            IntensityBand::Threshold
        } else if fraction >= 0.60 {
            IntensityBand::Aerobic
        } else {
            IntensityBand::Recovery
        }
    }

    /// Weight of the band in the weekly score
    pub fn multiplier(&self) -> f64 {
        match self {
            IntensityBand::High => 1.5,
            IntensityBand::Threshold => 1.3,
            IntensityBand::Aerobic => 1.1,
            IntensityBand::Recovery => 0.95,
            IntensityBand::Unknown => 1.0,
        }
    }
}

impl fmt::Display for IntensityBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            IntensityBand::High => "High intensity (Z4/Z5)",
            IntensityBand::Threshold => "Threshold (Z3/Z4)",
            IntensityBand::Aerobic => "Aerobic (Z2)",
            IntensityBand::Recovery => "Recovery (Z1)",
            IntensityBand::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

/// Volume and intensity of one week
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyLoadSummary {
    pub week_start: DateTime<Utc>,
    /// End of the counted period, never later than now
    pub reference_time: DateTime<Utc>,
    pub sessions: usize,
    /// Distance in km, 1 decimal
    pub distance_km: f64,
    /// Whole meters of elevation gain
    pub elevation_gain_m: u32,
    pub km_effort: f64,
    pub avg_hr: Option<f64>,
    pub intensity: IntensityBand,
    /// Km-effort weighted by intensity, 1 decimal
    pub score: f64,
}

impl WeeklyLoadSummary {
    pub fn is_active(&self) -> bool {
        self.distance_km > 0.0 || self.elevation_gain_m > 0
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoadRiskAnalyzer {
    config: LoadRiskConfig,
}

impl LoadRiskAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: LoadRiskConfig) -> Self {
        LoadRiskAnalyzer { config }
    }

    /// Load of a single activity in km-effort
    pub fn km_effort(&self, record: &ActivityRecord) -> f64 {
        record.distance_km() + record.elevation_gain_m / self.config.elevation_per_km_effort_m
    }

    /// Total km-effort over `[start, end)`
    pub fn window_load(
        &self,
        history: &ActivityHistory,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> f64 {
        history
            .within(start, end)
            .map(|record| self.km_effort(record))
            .sum()
    }

    /// ACWR at `reference_time`, `None` when the chronic base is too small
    ///
    /// For a week still in progress pass the current time, not the end of
    /// the week; see [`reference_time_for_week`].
    pub fn acwr(
        &self,
        history: &ActivityHistory,
        reference_time: DateTime<Utc>,
    ) -> Option<LoadRiskResult> {
        let acute_load = self.window_load(
            history,
            reference_time - Duration::days(self.config.acute_days),
            reference_time,
        );
        let chronic_total = self.window_load(
            history,
            reference_time - Duration::days(self.config.chronic_days),
            reference_time,
        );
        let chronic_avg_load = chronic_total / self.config.chronic_weeks;

        if chronic_avg_load <= self.config.min_chronic_load {
            debug!(chronic_avg_load, "chronic load too small for ACWR");
            return None;
        }

        let ratio = acute_load / chronic_avg_load;
        let status = if ratio >= self.config.high_risk_ratio {
            LoadStatus::HighInjuryRisk
        } else if ratio <= self.config.detraining_ratio {
            LoadStatus::Detraining
        } else {
            LoadStatus::NoAlert
        };

        debug!(acute_load, chronic_avg_load, ratio, ?status, "ACWR computed");

        Some(LoadRiskResult {
            ratio: round_dp(ratio, 2),
            status,
            acute_load: round_dp(acute_load, 1),
            chronic_avg_load: round_dp(chronic_avg_load, 1),
            reference_time,
        })
    }

    /// ACWR for the week starting at `week_start`, as seen at `now`
    pub fn acwr_for_week(
        &self,
        history: &ActivityHistory,
        week_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Option<LoadRiskResult> {
        self.acwr(history, reference_time_for_week(week_start, now))
    }

    /// Volume, intensity and score of the week starting at `week_start`
    pub fn weekly_summary(
        &self,
        history: &ActivityHistory,
        profile: &AthleteProfile,
        week_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> WeeklyLoadSummary {
        let reference_time = reference_time_for_week(week_start, now);
        let records: Vec<&ActivityRecord> = history.within(week_start, reference_time).collect();

        let distance_m: f64 = records.iter().map(|record| record.distance_m).sum();
        let gain_m: f64 = records.iter().map(|record| record.elevation_gain_m).sum();
        let distance_km = round_dp(distance_m / 1000.0, 1);
        let elevation_gain_m = gain_m.max(0.0) as u32;
        let km_effort =
            distance_km + f64::from(elevation_gain_m) / self.config.elevation_per_km_effort_m;

        let heart_rates: Vec<f64> = records
            .iter()
            .filter_map(|record| record.avg_hr.map(f64::from))
            .collect();
        let avg_hr = if heart_rates.is_empty() {
            None
        } else {
            Some(heart_rates.iter().sum::<f64>() / heart_rates.len() as f64)
        };

        let intensity = avg_hr
            .filter(|hr| *hr > 0.0)
            .and_then(|hr| profile.hrr_fraction(hr))
            .map(IntensityBand::from_hrr_fraction)
            .unwrap_or(IntensityBand::Unknown);

        WeeklyLoadSummary {
            week_start,
            reference_time,
            sessions: records.len(),
            distance_km,
            elevation_gain_m,
            km_effort,
            avg_hr,
            intensity,
            score: round_dp(km_effort * intensity.multiplier(), 1),
        }
    }
}

/// Reject a week that has not started yet at `now`
pub fn validate_week_start(
    week_start: DateTime<Utc>,
    now: DateTime<Utc>,
) -> crate::error::Result<()> {
    if week_start > now {
        return Err(TrailRsError::Validation(format!(
            "week start {} is after the reference time {}",
            week_start.format("%Y-%m-%d"),
            now.to_rfc3339()
        )));
    }
    Ok(())
}

/// Reference time for a week's load: its end once elapsed, now while in progress
pub fn reference_time_for_week(week_start: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    (week_start + Duration::days(7)).min(now)
}
