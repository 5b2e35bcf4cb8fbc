//! VO2max estimation module
//!
//! Estimates VO2max (maximal oxygen uptake, ml/kg/min) for a single run from
//! its summary values and the athlete's heart-rate profile.
//!
//! The activity's oxygen cost comes from the ACSM running equation
//! (VO2 = 0.2 × speed + 3.5, speed in m/min). Trail runs are first converted
//! to an equivalent flat distance (100 m of climbing ≈ 500 m on the flat) and
//! carry a terrain surcharge; road runs use grade-adjusted speed when the
//! provider supplies it. The cost is then projected to maximal effort with
//! the inverse Karvonen relationship:
//!
//! VO2max = (VO2_activity − 3.5) / %HRR + 3.5
//!
//! Sessions outside the model's operating range (too slow, too short, too
//! easy, missing heart rate) produce no estimate rather than a wrong one.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::models::{ActivityKind, ActivityRecord, AthleteProfile};
use crate::units::{self, round_dp};

/// Resting oxygen uptake (1 MET) in ml/kg/min
pub const VO2_REST: f64 = 3.5;

/// ACSM horizontal running cost in ml/kg/min per m/min
pub const ACSM_HORIZONTAL_COST: f64 = 0.2;

/// Energy yield of oxygen in kcal per liter
const KCAL_PER_LITER_O2: f64 = 5.0;

/// Ceiling applied below a race-index bound
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceIndexCap {
    /// Applies when the athlete's index is strictly below this value
    pub below_index: u16,
    /// Maximum VO2max allowed in ml/kg/min
    pub max_vo2max: f64,
}

/// Thresholds of the interval-session rejection rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntervalRejectionConfig {
    /// Disable the rule entirely
    pub enabled: bool,
    /// Peak minus average heart rate above which the session looks fragmented
    pub max_hr_spread_bpm: f64,
    /// Peak heart rate must exceed this fraction of the theoretical max
    pub peak_hr_fraction: f64,
    /// Estimate must fall below this fraction of the baseline
    pub baseline_drop_fraction: f64,
}

impl Default for IntervalRejectionConfig {
    fn default() -> Self {
        IntervalRejectionConfig {
            enabled: true,
            max_hr_spread_bpm: 25.0,
            peak_hr_fraction: 0.85,
            baseline_drop_fraction: 0.88,
        }
    }
}

/// VO2max estimator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vo2MaxConfig {
    /// Slowest pace still considered aerobic-indicative (s/km)
    pub max_pace_sec_per_km: f64,

    /// Minimum session duration in seconds
    pub min_duration_s: u32,

    /// Minimum fraction of heart-rate reserve
    pub min_hrr_fraction: f64,

    /// Flat meters credited per meter of elevation gain on trail
    pub trail_elevation_factor: f64,

    /// Terrain surcharge on the trail oxygen cost
    pub trail_terrain_multiplier: f64,

    /// Road speed (m/min) below which the slow-pace penalty applies
    pub slow_road_speed_m_min: f64,

    /// Multiplier applied to slow road sessions
    pub slow_road_penalty: f64,

    /// Race-index ceilings, checked in ascending `below_index` order
    pub race_index_caps: Vec<RaceIndexCap>,

    pub interval_rejection: IntervalRejectionConfig,
}

impl Default for Vo2MaxConfig {
    fn default() -> Self {
        Vo2MaxConfig {
            max_pace_sec_per_km: 570.0,
            min_duration_s: 1200,
            min_hrr_fraction: 0.60,
            trail_elevation_factor: 5.0,
            trail_terrain_multiplier: 1.05,
            slow_road_speed_m_min: 190.5,
            slow_road_penalty: 0.95,
            race_index_caps: vec![
                RaceIndexCap {
                    below_index: 500,
                    max_vo2max: 54.0,
                },
                RaceIndexCap {
                    below_index: 600,
                    max_vo2max: 60.0,
                },
            ],
            interval_rejection: IntervalRejectionConfig::default(),
        }
    }
}

/// Decides whether a session's estimate is an interval artefact
///
/// An interval session's average heart rate hides the real effort, so its
/// estimate collapses compared with the athlete's baseline. Implementations
/// are called only when a baseline exists.
pub trait IntervalPolicy: fmt::Debug + Send + Sync {
    fn rejects(
        &self,
        record: &ActivityRecord,
        profile: &AthleteProfile,
        estimate: f64,
        baseline: f64,
    ) -> bool;
}

/// Rejects sessions whose heart rate swings widely, peaks high, and whose
/// estimate drops well below the baseline (all three must hold)
#[derive(Debug, Clone, PartialEq)]
pub struct HeartRateSpreadPolicy {
    pub max_hr_spread_bpm: f64,
    pub peak_hr_fraction: f64,
    pub baseline_drop_fraction: f64,
}

impl From<&IntervalRejectionConfig> for HeartRateSpreadPolicy {
    fn from(config: &IntervalRejectionConfig) -> Self {
        HeartRateSpreadPolicy {
            max_hr_spread_bpm: config.max_hr_spread_bpm,
            peak_hr_fraction: config.peak_hr_fraction,
            baseline_drop_fraction: config.baseline_drop_fraction,
        }
    }
}

impl IntervalPolicy for HeartRateSpreadPolicy {
    fn rejects(
        &self,
        record: &ActivityRecord,
        profile: &AthleteProfile,
        estimate: f64,
        baseline: f64,
    ) -> bool {
        let (Some(peak), Some(avg), Some(theoretical_max)) = (
            record.max_hr.filter(|hr| *hr > 0),
            record.avg_hr,
            profile.theoretical_max_hr,
        ) else {
            return false;
        };

        let spread = f64::from(peak) - f64::from(avg);
        let peak_threshold = f64::from(theoretical_max) * self.peak_hr_fraction;
        let drop_threshold = baseline * self.baseline_drop_fraction;

        spread > self.max_hr_spread_bpm
            && f64::from(peak) > peak_threshold
            && estimate < drop_threshold
    }
}

/// Never rejects a session
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAllSessions;

impl IntervalPolicy for AcceptAllSessions {
    fn rejects(&self, _: &ActivityRecord, _: &AthleteProfile, _: f64, _: f64) -> bool {
        false
    }
}

/// Per-activity VO2max estimator
#[derive(Debug)]
pub struct Vo2MaxEstimator {
    config: Vo2MaxConfig,
    interval_policy: Box<dyn IntervalPolicy>,
}

impl Vo2MaxEstimator {
    /// Create estimator with default configuration
    pub fn new() -> Self {
        Self::with_config(Vo2MaxConfig::default())
    }

    /// Create estimator with custom configuration
    ///
    /// The interval policy follows `config.interval_rejection`.
    pub fn with_config(config: Vo2MaxConfig) -> Self {
        let interval_policy: Box<dyn IntervalPolicy> = if config.interval_rejection.enabled {
            Box::new(HeartRateSpreadPolicy::from(&config.interval_rejection))
        } else {
            Box::new(AcceptAllSessions)
        };

        Vo2MaxEstimator {
            config,
            interval_policy,
        }
    }

    /// Replace the interval-rejection policy
    pub fn with_interval_policy(mut self, policy: Box<dyn IntervalPolicy>) -> Self {
        self.interval_policy = policy;
        self
    }

    pub fn config(&self) -> &Vo2MaxConfig {
        &self.config
    }

    /// Estimate VO2max for one activity
    ///
    /// `baseline` is the athlete's consolidated VO2max used by the interval
    /// rule; pass `None` to skip the rule. Returns `None` whenever an input is
    /// missing or outside the model's valid range. The result is rounded to
    /// two decimals.
    pub fn estimate(
        &self,
        record: &ActivityRecord,
        profile: &AthleteProfile,
        baseline: Option<f64>,
    ) -> Option<f64> {
        let config = &self.config;

        let Some(pace) = record.pace_sec_per_km() else {
            debug!(activity = %record.id, "no distance or duration, VO2max skipped");
            return None;
        };
        if pace > config.max_pace_sec_per_km {
            debug!(activity = %record.id, pace, "pace slower than ceiling, VO2max skipped");
            return None;
        }

        let (Some(avg_hr), Some(_), Some(resting_hr)) = (
            record.avg_hr.filter(|hr| *hr > 0),
            profile.theoretical_max_hr.filter(|hr| *hr > 0),
            profile.resting_hr.filter(|hr| *hr > 0),
        ) else {
            debug!(activity = %record.id, "heart rate data missing, VO2max skipped");
            return None;
        };

        let Some(reserve) = profile.heart_rate_reserve() else {
            debug!(activity = %record.id, "heart-rate reserve not positive, VO2max skipped");
            return None;
        };

        let hrr_fraction = (f64::from(avg_hr) - f64::from(resting_hr)) / reserve;
        if hrr_fraction < config.min_hrr_fraction || record.duration_s < config.min_duration_s {
            debug!(
                activity = %record.id,
                hrr_fraction,
                duration_s = record.duration_s,
                "effort too low or session too short, VO2max skipped"
            );
            return None;
        }

        let speed = self.effective_speed_m_min(record)?;
        let vo2_activity = self.oxygen_cost(record.activity_kind, speed);

        // Inverse Karvonen projection to maximal effort
        let mut vo2max = (vo2_activity - VO2_REST) / hrr_fraction + VO2_REST;

        if record.activity_kind == ActivityKind::Road && speed < config.slow_road_speed_m_min {
            vo2max *= config.slow_road_penalty;
            debug!(activity = %record.id, speed, "slow road pace penalty applied");
        }

        vo2max = self.apply_race_index_cap(vo2max, profile.race_index);

        if let Some(baseline) = baseline.filter(|value| *value > 0.0) {
            if self
                .interval_policy
                .rejects(record, profile, vo2max, baseline)
            {
                debug!(
                    activity = %record.id,
                    vo2max,
                    baseline,
                    "session looks like intervals, VO2max discarded"
                );
                return None;
            }
        }

        debug!(activity = %record.id, vo2_activity, vo2max, "VO2max estimated");
        Some(round_dp(vo2max, 2))
    }

    /// Estimate using the profile's own consolidated value as the baseline
    pub fn estimate_against_profile(
        &self,
        record: &ActivityRecord,
        profile: &AthleteProfile,
    ) -> Option<f64> {
        self.estimate(record, profile, profile.historical_vo2max_estimate)
    }

    /// Speed fed into the metabolic equation, in m/min
    ///
    /// Trail: equivalent flat distance over time. Road: grade-adjusted speed
    /// when available, raw speed otherwise.
    pub fn effective_speed_m_min(&self, record: &ActivityRecord) -> Option<f64> {
        let duration_s = f64::from(record.duration_s);
        match record.activity_kind {
            ActivityKind::Trail => {
                let equivalent_distance = record.distance_m
                    + self.config.trail_elevation_factor * record.elevation_gain_m;
                units::speed_m_min(equivalent_distance, duration_s)
            }
            ActivityKind::Road => match record.usable_gap_m_s() {
                Some(gap) => Some(gap * 60.0),
                None => units::speed_m_min(record.distance_m, duration_s),
            },
        }
    }

    /// Oxygen cost of running at `speed_m_min` (ml/kg/min)
    // Trail races and trail training share one path; both credit climbing the
    // same way.
    pub fn oxygen_cost(&self, kind: ActivityKind, speed_m_min: f64) -> f64 {
        match kind {
            ActivityKind::Trail => {
                ACSM_HORIZONTAL_COST * speed_m_min * self.config.trail_terrain_multiplier
                    + VO2_REST
            }
            ActivityKind::Road => ACSM_HORIZONTAL_COST * speed_m_min + VO2_REST,
        }
    }

    /// Oxygen cost of the activity itself, before projection
    pub fn activity_vo2(&self, record: &ActivityRecord) -> Option<f64> {
        let speed = self.effective_speed_m_min(record)?;
        Some(self.oxygen_cost(record.activity_kind, speed))
    }

    fn apply_race_index_cap(&self, vo2max: f64, race_index: Option<u16>) -> f64 {
        let Some(index) = race_index.filter(|index| *index > 0) else {
            return vo2max;
        };

        let mut caps: Vec<&RaceIndexCap> = self.config.race_index_caps.iter().collect();
        caps.sort_by_key(|cap| cap.below_index);

        match caps.into_iter().find(|cap| index < cap.below_index) {
            Some(cap) => vo2max.min(cap.max_vo2max),
            None => vo2max,
        }
    }
}

impl Default for Vo2MaxEstimator {
    fn default() -> Self {
        Self::new()
    }
}

/// Absolute oxygen uptake in L/min for a relative VO2 value
pub fn absolute_vo2_l_min(vo2_ml_kg_min: f64, weight_kg: f64) -> f64 {
    vo2_ml_kg_min * weight_kg / 1000.0
}

/// Active energy of a session in kcal
///
/// Uses the net oxygen cost above rest and 5 kcal per liter of oxygen.
pub fn active_kcal(vo2_activity: f64, weight_kg: f64, duration_s: u32) -> f64 {
    let minutes = f64::from(duration_s) / 60.0;
    (vo2_activity - VO2_REST) * weight_kg * minutes * KCAL_PER_LITER_O2 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WorkoutKind;
    use chrono::{TimeZone, Utc};

    fn profile() -> AthleteProfile {
        AthleteProfile::new("ath", "Test Runner").with_heart_rates(50, 190)
    }

    fn road_10k() -> ActivityRecord {
        // 10 km in 45:00 (4:30/km) at 150 bpm
        ActivityRecord::new(
            "road",
            Utc.with_ymd_and_hms(2025, 4, 6, 9, 0, 0).unwrap(),
            ActivityKind::Road,
            10_000.0,
            2700,
        )
        .with_heart_rate(150, Some(172))
    }

    #[test]
    fn test_road_estimate() {
        let estimator = Vo2MaxEstimator::new();

        // speed = 222.2 m/min, VO2 = 47.94, %HRR = 0.714
        // VO2max = (47.94 - 3.5) / 0.714 + 3.5 = 65.72
        let estimate = estimator.estimate(&road_10k(), &profile(), None).unwrap();
        assert_eq!(estimate, 65.72);
    }

    #[test]
    fn test_estimate_is_deterministic() {
        let estimator = Vo2MaxEstimator::new();
        let first = estimator.estimate(&road_10k(), &profile(), Some(55.0));
        for _ in 0..10 {
            assert_eq!(estimator.estimate(&road_10k(), &profile(), Some(55.0)), first);
        }
    }

    #[test]
    fn test_pace_ceiling() {
        let estimator = Vo2MaxEstimator::new();
        let mut record = road_10k();
        // 10 km in 96 minutes = 9:36/km
        record.duration_s = 5760;
        assert_eq!(estimator.estimate(&record, &profile(), None), None);

        // Exactly 9:30/km is still accepted by the pace gate
        record.duration_s = 5700;
        record.avg_hr = Some(160);
        assert!(estimator.estimate(&record, &profile(), None).is_some());
    }

    #[test]
    fn test_missing_inputs() {
        let estimator = Vo2MaxEstimator::new();

        let mut record = road_10k();
        record.avg_hr = None;
        assert_eq!(estimator.estimate(&record, &profile(), None), None);

        let no_resting = AthleteProfile {
            resting_hr: None,
            ..profile()
        };
        assert_eq!(estimator.estimate(&road_10k(), &no_resting, None), None);

        let zero_distance = ActivityRecord {
            distance_m: 0.0,
            ..road_10k()
        };
        assert_eq!(estimator.estimate(&zero_distance, &profile(), None), None);
    }

    #[test]
    fn test_flat_heart_rate_reserve() {
        let estimator = Vo2MaxEstimator::new();
        let degenerate = AthleteProfile::new("ath", "Flat").with_heart_rates(150, 150);
        assert_eq!(estimator.estimate(&road_10k(), &degenerate, None), None);
    }

    #[test]
    fn test_validity_thresholds() {
        let estimator = Vo2MaxEstimator::new();

        // 19:59 is too short
        let mut short = road_10k();
        short.distance_m = 4500.0;
        short.duration_s = 1199;
        assert_eq!(estimator.estimate(&short, &profile(), None), None);

        // 59% HRR is too easy: 50 + 0.59 * 140 = 132.6
        let easy = road_10k().with_heart_rate(132, None);
        assert_eq!(estimator.estimate(&easy, &profile(), None), None);

        // 60% HRR is accepted: 50 + 0.60 * 140 = 134
        let threshold = road_10k().with_heart_rate(134, None);
        assert!(estimator.estimate(&threshold, &profile(), None).is_some());
    }

    #[test]
    fn test_slow_road_penalty() {
        let estimator = Vo2MaxEstimator::new();
        let mut record = road_10k();
        // 10 km in 60:00 = 166.7 m/min
        record.duration_s = 3600;

        // VO2 = 36.83, VO2max = 50.17, penalised 5% = 47.66
        let estimate = estimator.estimate(&record, &profile(), None).unwrap();
        assert_eq!(estimate, 47.66);
    }

    #[test]
    fn test_grade_adjusted_speed_used_on_road() {
        let estimator = Vo2MaxEstimator::new();
        let hilly = road_10k().with_elevation_gain(250.0).with_grade_adjusted_pace(4.0);

        assert_eq!(estimator.effective_speed_m_min(&hilly), Some(240.0));
        // VO2 = 51.5, VO2max = 48 / 0.714 + 3.5 = 70.7
        let estimate = estimator.estimate(&hilly, &profile(), None).unwrap();
        assert!((estimate - 70.7).abs() < 0.01);
    }

    #[test]
    fn test_trail_equivalent_distance() {
        let estimator = Vo2MaxEstimator::new();
        let trail = ActivityRecord::new(
            "trail",
            Utc.with_ymd_and_hms(2025, 4, 12, 8, 0, 0).unwrap(),
            ActivityKind::Trail,
            10_000.0,
            3600,
        )
        .with_elevation_gain(500.0)
        .with_heart_rate(150, Some(175));

        // (10000 + 5 * 500) / 60 = 208.3 m/min, no slow-pace penalty on trail
        assert!((estimator.effective_speed_m_min(&trail).unwrap() - 208.333).abs() < 0.001);
        // VO2 = 0.2 * 208.3 * 1.05 + 3.5 = 47.25, VO2max = 43.75 / 0.714 + 3.5 = 64.75
        let estimate = estimator.estimate(&trail, &profile(), None).unwrap();
        assert!((estimate - 64.75).abs() < 0.011);

        let race = trail.clone().with_workout_kind(WorkoutKind::Race);
        assert_eq!(
            estimator.estimate(&race, &profile(), None),
            estimator.estimate(&trail, &profile(), None)
        );
    }

    #[test]
    fn test_race_index_caps() {
        let estimator = Vo2MaxEstimator::new();

        let amateur = profile().with_race_index(450);
        assert_eq!(estimator.estimate(&road_10k(), &amateur, None), Some(54.0));

        let intermediate = profile().with_race_index(550);
        assert_eq!(estimator.estimate(&road_10k(), &intermediate, None), Some(60.0));

        let advanced = profile().with_race_index(650);
        assert_eq!(estimator.estimate(&road_10k(), &advanced, None), Some(65.72));

        // Each cap applies strictly below its index
        let at = |index: u16| estimator.estimate(&road_10k(), &profile().with_race_index(index), None);
        assert_eq!(at(499), Some(54.0));
        assert_eq!(at(500), Some(60.0));
        assert_eq!(at(599), Some(60.0));
        assert_eq!(at(600), Some(65.72));

        let unranked = profile().with_race_index(0);
        assert_eq!(estimator.estimate(&road_10k(), &unranked, None), Some(65.72));
    }

    #[test]
    fn test_interval_rejection() {
        let estimator = Vo2MaxEstimator::new();
        // Peak 185 > 0.85 * 190, spread 35 bpm
        let intervals = road_10k().with_heart_rate(150, Some(185));

        // 65.72 < 0.88 * 80 = 70.4: discarded
        assert_eq!(estimator.estimate(&intervals, &profile(), Some(80.0)), None);

        // 65.72 >= 0.88 * 60 = 52.8: kept
        assert_eq!(
            estimator.estimate(&intervals, &profile(), Some(60.0)),
            Some(65.72)
        );

        // No baseline, no rejection
        assert_eq!(estimator.estimate(&intervals, &profile(), None), Some(65.72));

        // Narrow spread keeps the session
        let steady = road_10k().with_heart_rate(150, Some(170));
        assert_eq!(
            estimator.estimate(&steady, &profile(), Some(80.0)),
            Some(65.72)
        );

        // No peak heart rate, rule cannot fire
        let no_peak = road_10k().with_heart_rate(150, None);
        assert_eq!(
            estimator.estimate(&no_peak, &profile(), Some(80.0)),
            Some(65.72)
        );
    }

    #[test]
    fn test_profile_baseline_and_policy_swap() {
        let intervals = road_10k().with_heart_rate(150, Some(185));
        let mut athlete = profile();
        athlete.historical_vo2max_estimate = Some(80.0);

        let estimator = Vo2MaxEstimator::new();
        assert_eq!(estimator.estimate_against_profile(&intervals, &athlete), None);

        let permissive = Vo2MaxEstimator::new().with_interval_policy(Box::new(AcceptAllSessions));
        assert_eq!(
            permissive.estimate_against_profile(&intervals, &athlete),
            Some(65.72)
        );

        let disabled = Vo2MaxEstimator::with_config(Vo2MaxConfig {
            interval_rejection: IntervalRejectionConfig {
                enabled: false,
                ..IntervalRejectionConfig::default()
            },
            ..Vo2MaxConfig::default()
        });
        assert_eq!(
            disabled.estimate_against_profile(&intervals, &athlete),
            Some(65.72)
        );
    }

    #[test]
    fn test_energy_helpers() {
        assert!((absolute_vo2_l_min(60.0, 70.0) - 4.2).abs() < 1e-9);

        // 45 minutes at 47.94 ml/kg/min, 70 kg
        let kcal = active_kcal(47.944, 70.0, 2700);
        assert!((kcal - 700.0).abs() < 1.0);
    }

    #[test]
    fn test_config_serialization() {
        let config = Vo2MaxConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let restored: Vo2MaxConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, config);

        let partial: Vo2MaxConfig = serde_json::from_str(r#"{"min_duration_s": 900}"#).unwrap();
        assert_eq!(partial.min_duration_s, 900);
        assert_eq!(partial.max_pace_sec_per_km, 570.0);
    }
}
