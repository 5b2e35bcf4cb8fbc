//! VO2max consolidation
//!
//! Turns noisy per-session estimates into the athlete's baseline: the mean of
//! the most recent valid estimates, once for all sessions and once for road
//! sessions only. The baseline feeds the interval-rejection rule and every
//! comparison against "usual" fitness.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use tracing::info;

use crate::history::ActivityHistory;
use crate::models::{ActivityRecord, AthleteProfile};
use crate::units::round_dp;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsolidationConfig {
    /// Most recent valid estimates considered
    pub window: usize,

    /// Fewer valid estimates than this gives no baseline
    pub min_samples: usize,
}

impl Default for ConsolidationConfig {
    fn default() -> Self {
        ConsolidationConfig {
            window: 60,
            min_samples: 3,
        }
    }
}

/// Consolidated baselines with the sample sizes behind them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedVo2max {
    /// Mean over road and trail sessions, 1 decimal
    pub combined: Option<f64>,
    /// Mean over road sessions, 1 decimal
    pub road_only: Option<f64>,
    pub combined_samples: usize,
    pub road_samples: usize,
    /// Sample standard deviation of the combined window
    pub combined_spread: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct ConsolidationEngine {
    config: ConsolidationConfig,
}

impl ConsolidationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ConsolidationConfig) -> Self {
        ConsolidationEngine { config }
    }

    /// Compute both baselines without touching the profile
    pub fn summarize(&self, history: &ActivityHistory) -> ConsolidatedVo2max {
        let combined = self.window_values(history, |_| true);
        let road = self.window_values(history, ActivityRecord::is_road);

        let combined_mean = self.mean(&combined);
        let combined_spread = combined_mean.and_then(|_| {
            let spread = combined.iter().std_dev();
            spread.is_finite().then(|| round_dp(spread, 2))
        });

        ConsolidatedVo2max {
            combined: combined_mean,
            road_only: self.mean(&road),
            combined_samples: combined.len(),
            road_samples: road.len(),
            combined_spread,
        }
    }

    /// Recompute the baselines and overwrite both profile fields
    ///
    /// Returns `(combined, road_only)`. A baseline without enough samples is
    /// written as `None`, clearing any stale value.
    pub fn consolidate(
        &self,
        history: &ActivityHistory,
        profile: &mut AthleteProfile,
    ) -> (Option<f64>, Option<f64>) {
        let summary = self.summarize(history);

        profile.historical_vo2max_estimate = summary.combined;
        profile.historical_vo2max_road = summary.road_only;

        info!(
            athlete = %profile.id,
            combined = ?summary.combined,
            road_only = ?summary.road_only,
            samples = summary.combined_samples,
            road_samples = summary.road_samples,
            "VO2max baseline consolidated"
        );

        (summary.combined, summary.road_only)
    }

    /// Latest valid estimates of the records matching `filter`, newest first
    fn window_values<F>(&self, history: &ActivityHistory, filter: F) -> Vec<f64>
    where
        F: Fn(&ActivityRecord) -> bool,
    {
        history
            .newest_first()
            .filter(|record| filter(record))
            .filter_map(|record| record.vo2max_estimate)
            .take(self.config.window)
            .collect()
    }

    fn mean(&self, values: &[f64]) -> Option<f64> {
        if values.is_empty() || values.len() < self.config.min_samples {
            return None;
        }
        let sum: f64 = values.iter().sum();
        Some(round_dp(sum / values.len() as f64, 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ActivityKind;
    use chrono::{Duration, TimeZone, Utc};

    fn history(entries: &[(ActivityKind, Option<f64>)]) -> ActivityHistory {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 7, 0, 0).unwrap();
        entries
            .iter()
            .enumerate()
            .map(|(day, (kind, vo2))| {
                let mut record = ActivityRecord::new(
                    format!("a{}", day),
                    start + Duration::days(day as i64),
                    *kind,
                    10_000.0,
                    3000,
                );
                record.vo2max_estimate = *vo2;
                record
            })
            .collect()
    }

    #[test]
    fn test_minimum_samples() {
        let engine = ConsolidationEngine::new();

        let two = history(&[
            (ActivityKind::Road, Some(50.0)),
            (ActivityKind::Road, None),
            (ActivityKind::Road, Some(52.0)),
        ]);
        assert_eq!(engine.summarize(&two).combined, None);

        let three = history(&[
            (ActivityKind::Road, Some(50.0)),
            (ActivityKind::Road, Some(52.0)),
            (ActivityKind::Trail, Some(55.3)),
        ]);
        let summary = engine.summarize(&three);
        // 157.3 / 3 = 52.43
        assert_eq!(summary.combined, Some(52.4));
        assert_eq!(summary.combined_samples, 3);
        assert_eq!(summary.road_only, None);
        assert_eq!(summary.road_samples, 2);
    }

    #[test]
    fn test_window_keeps_most_recent() {
        let mut entries = vec![(ActivityKind::Road, Some(40.0)); 10];
        entries.extend(vec![(ActivityKind::Road, Some(50.0)); 60]);

        let engine = ConsolidationEngine::new();
        let summary = engine.summarize(&history(&entries));
        assert_eq!(summary.combined, Some(50.0));
        assert_eq!(summary.combined_samples, 60);
        assert_eq!(summary.combined_spread, Some(0.0));
    }

    #[test]
    fn test_road_window_filters_before_truncating() {
        // Old road sessions remain reachable behind many recent trail ones
        let mut entries = vec![(ActivityKind::Road, Some(48.0)); 3];
        entries.extend(vec![(ActivityKind::Trail, Some(58.0)); 60]);

        let engine = ConsolidationEngine::new();
        let summary = engine.summarize(&history(&entries));
        assert_eq!(summary.combined, Some(58.0));
        assert_eq!(summary.road_only, Some(48.0));
    }

    #[test]
    fn test_consolidate_overwrites_profile() {
        let engine = ConsolidationEngine::new();
        let mut profile = AthleteProfile::new("ath", "Runner");
        profile.historical_vo2max_estimate = Some(61.0);
        profile.historical_vo2max_road = Some(60.0);

        let sparse = history(&[(ActivityKind::Road, Some(50.0))]);
        assert_eq!(engine.consolidate(&sparse, &mut profile), (None, None));
        assert_eq!(profile.historical_vo2max_estimate, None);
        assert_eq!(profile.historical_vo2max_road, None);

        let full = history(&[
            (ActivityKind::Road, Some(50.0)),
            (ActivityKind::Road, Some(51.0)),
            (ActivityKind::Road, Some(52.0)),
        ]);
        assert_eq!(
            engine.consolidate(&full, &mut profile),
            (Some(51.0), Some(51.0))
        );
        assert_eq!(profile.historical_vo2max_estimate, Some(51.0));
    }

    #[test]
    fn test_spread() {
        let engine = ConsolidationEngine::new();
        let summary = engine.summarize(&history(&[
            (ActivityKind::Road, Some(50.0)),
            (ActivityKind::Road, Some(52.0)),
            (ActivityKind::Road, Some(54.0)),
        ]));
        assert_eq!(summary.combined_spread, Some(2.0));
    }

    #[test]
    fn test_custom_window() {
        let engine = ConsolidationEngine::with_config(ConsolidationConfig {
            window: 2,
            min_samples: 2,
        });
        let summary = engine.summarize(&history(&[
            (ActivityKind::Road, Some(40.0)),
            (ActivityKind::Road, Some(50.0)),
            (ActivityKind::Road, Some(60.0)),
        ]));
        assert_eq!(summary.combined, Some(55.0));
    }
}
