//! Short-term performance trends
//!
//! Compares the newest sessions with the ones just before them. A positive
//! percentage always means "more" of the metric; for speed that means
//! faster, so a pace display runs opposite to the sign reported here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::climb::effective_vam;
use crate::history::ActivityHistory;
use crate::models::ActivityRecord;
use crate::units::round_dp;

/// Metrics tracked by the trend analyzer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendMetric {
    Vo2max,
    Vo2maxRoad,
    SelectiveVam,
    Power,
    Distance,
    AvgHeartRate,
    AvgSpeed,
}

impl TrendMetric {
    pub const ALL: [TrendMetric; 7] = [
        TrendMetric::Vo2max,
        TrendMetric::Vo2maxRoad,
        TrendMetric::SelectiveVam,
        TrendMetric::Power,
        TrendMetric::Distance,
        TrendMetric::AvgHeartRate,
        TrendMetric::AvgSpeed,
    ];

    /// Value of this metric for one record, `None` when not defined
    pub fn value(&self, record: &ActivityRecord) -> Option<f64> {
        match self {
            TrendMetric::Vo2max => record.vo2max_estimate,
            TrendMetric::Vo2maxRoad => record.vo2max_estimate.filter(|_| record.is_road()),
            TrendMetric::SelectiveVam => effective_vam(record),
            TrendMetric::Power => record.power_w(),
            TrendMetric::Distance => Some(record.distance_m),
            TrendMetric::AvgHeartRate => record.avg_hr.map(f64::from),
            TrendMetric::AvgSpeed => record.avg_speed_m_s(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TrendMetric::Vo2max => "VO2max",
            TrendMetric::Vo2maxRoad => "VO2max (road)",
            TrendMetric::SelectiveVam => "VAM",
            TrendMetric::Power => "Power",
            TrendMetric::Distance => "Distance",
            TrendMetric::AvgHeartRate => "Avg HR",
            TrendMetric::AvgSpeed => "Avg speed",
        }
    }
}

impl fmt::Display for TrendMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Warning signs derived from a trend
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TrendAlert {
    /// Average heart rate rising: possible fatigue or overreaching
    HeartRateDrift { percent: f64 },
    /// VO2max falling: possible illness or stress
    EfficiencyDrop { percent: f64 },
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrendResult {
    /// Percent change per metric, 1 decimal
    pub percentages: BTreeMap<TrendMetric, f64>,
    /// Mean heart rate of the recent sessions, whole bpm
    pub recent_avg_hr: u16,
    /// Mean heart rate of the earlier sessions, whole bpm
    pub historical_avg_hr: u16,
}

impl TrendResult {
    /// True when there was not enough history for a trend
    pub fn is_empty(&self) -> bool {
        self.percentages.is_empty()
    }

    pub fn get(&self, metric: TrendMetric) -> Option<f64> {
        self.percentages.get(&metric).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    /// Sessions considered before the cutoff
    pub window: usize,

    /// Newest sessions forming the recent side; also the minimum history
    pub recent: usize,

    /// Heart-rate increase (percent) above which a drift is flagged
    pub heart_rate_alert_percent: f64,

    /// VO2max change (percent) below which a drop is flagged
    pub vo2max_alert_percent: f64,
}

impl Default for TrendConfig {
    fn default() -> Self {
        TrendConfig {
            window: 20,
            recent: 5,
            heart_rate_alert_percent: 5.0,
            vo2max_alert_percent: -3.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TrendAnalyzer {
    config: TrendConfig,
}

impl TrendAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: TrendConfig) -> Self {
        TrendAnalyzer { config }
    }

    /// Trend of the newest sessions against the ones before them
    ///
    /// Only sessions strictly before `as_of` count. Returns an empty result
    /// when fewer than `recent` sessions exist or nothing is left for the
    /// historical side.
    pub fn trend(&self, history: &ActivityHistory, as_of: Option<DateTime<Utc>>) -> TrendResult {
        let window: Vec<&ActivityRecord> = history.before(as_of).take(self.config.window).collect();

        if window.len() < self.config.recent {
            return TrendResult::default();
        }

        let (recent, historical) = window.split_at(self.config.recent);
        if historical.is_empty() {
            return TrendResult::default();
        }

        let percentages = TrendMetric::ALL
            .iter()
            .map(|metric| {
                let change = percent_change(
                    side_average(recent, *metric),
                    side_average(historical, *metric),
                );
                (*metric, change)
            })
            .collect();

        TrendResult {
            percentages,
            recent_avg_hr: side_average(recent, TrendMetric::AvgHeartRate) as u16,
            historical_avg_hr: side_average(historical, TrendMetric::AvgHeartRate) as u16,
        }
    }

    /// Alerts raised by a trend result
    pub fn alerts(&self, result: &TrendResult) -> Vec<TrendAlert> {
        let mut alerts = Vec::new();

        if let Some(percent) = result.get(TrendMetric::AvgHeartRate) {
            if percent > self.config.heart_rate_alert_percent {
                alerts.push(TrendAlert::HeartRateDrift { percent });
            }
        }

        if let Some(percent) = result.get(TrendMetric::Vo2max) {
            if percent < self.config.vo2max_alert_percent {
                alerts.push(TrendAlert::EfficiencyDrop { percent });
            }
        }

        alerts
    }
}

/// Mean of the defined values, 0 when none is defined
fn side_average(records: &[&ActivityRecord], metric: TrendMetric) -> f64 {
    let values: Vec<f64> = records.iter().filter_map(|record| metric.value(record)).collect();
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn percent_change(recent: f64, historical: f64) -> f64 {
    if historical == 0.0 {
        return 0.0;
    }
    round_dp((recent - historical) / historical * 100.0, 1)
}
