//! Race-readiness classification
//!
//! Places an athlete in the longest race category their recent training
//! supports, from weekly volume and longest single run.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::history::ActivityHistory;
use crate::units::round_dp;

/// Race category, longest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RaceReadiness {
    UltraMarathon,
    MarathonOr30k,
    HalfMarathon,
    TenK,
    /// Recent training but below every tier
    Base,
    /// No activity in the window
    Unclassified,
}

impl RaceReadiness {
    pub const ALL: [RaceReadiness; 6] = [
        RaceReadiness::UltraMarathon,
        RaceReadiness::MarathonOr30k,
        RaceReadiness::HalfMarathon,
        RaceReadiness::TenK,
        RaceReadiness::Base,
        RaceReadiness::Unclassified,
    ];
}

impl fmt::Display for RaceReadiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RaceReadiness::UltraMarathon => "Ultra Marathon",
            RaceReadiness::MarathonOr30k => "Marathon / 30k",
            RaceReadiness::HalfMarathon => "Half Marathon",
            RaceReadiness::TenK => "10k",
            RaceReadiness::Base => "5k / Base",
            RaceReadiness::Unclassified => "Unclassified",
        };
        f.write_str(label)
    }
}

/// Both thresholds must hold for the tier to apply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessTier {
    pub category: RaceReadiness,
    pub min_weekly_km: f64,
    pub min_long_run_km: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessConfig {
    /// Days of training considered
    pub window_days: i64,

    /// Tiers checked in order; the first match wins
    pub tiers: Vec<ReadinessTier>,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        let tier = |category, min_weekly_km, min_long_run_km| ReadinessTier {
            category,
            min_weekly_km,
            min_long_run_km,
        };
        ReadinessConfig {
            window_days: 45,
            tiers: vec![
                tier(RaceReadiness::UltraMarathon, 60.0, 28.0),
                tier(RaceReadiness::MarathonOr30k, 40.0, 20.0),
                tier(RaceReadiness::HalfMarathon, 25.0, 14.0),
                tier(RaceReadiness::TenK, 15.0, 8.0),
            ],
        }
    }
}

/// Classification with the figures it was based on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessAssessment {
    pub category: RaceReadiness,
    pub sessions: usize,
    pub avg_weekly_km: f64,
    pub longest_run_km: f64,
}

#[derive(Debug, Clone, Default)]
pub struct ReadinessClassifier {
    config: ReadinessConfig,
}

impl ReadinessClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ReadinessConfig) -> Self {
        ReadinessClassifier { config }
    }

    pub fn classify(&self, history: &ActivityHistory, now: DateTime<Utc>) -> RaceReadiness {
        self.assess(history, now).category
    }

    /// Volume figures over the window and the category they support
    pub fn assess(&self, history: &ActivityHistory, now: DateTime<Utc>) -> ReadinessAssessment {
        let start = now - Duration::days(self.config.window_days);

        let (sessions, total_m, longest_m) = history.since(start, now).fold(
            (0usize, 0.0f64, 0.0f64),
            |(count, total, longest), record| {
                (count + 1, total + record.distance_m, longest.max(record.distance_m))
            },
        );

        let weeks = self.config.window_days as f64 / 7.0;
        let avg_weekly_km = if weeks > 0.0 { total_m / 1000.0 / weeks } else { 0.0 };
        let longest_run_km = longest_m / 1000.0;

        let category = if sessions == 0 {
            RaceReadiness::Unclassified
        } else {
            self.config
                .tiers
                .iter()
                .find(|tier| {
                    avg_weekly_km >= tier.min_weekly_km && longest_run_km >= tier.min_long_run_km
                })
                .map(|tier| tier.category)
                .unwrap_or(RaceReadiness::Base)
        };

        ReadinessAssessment {
            category,
            sessions,
            avg_weekly_km: round_dp(avg_weekly_km, 1),
            longest_run_km: round_dp(longest_run_km, 1),
        }
    }
}

/// Share of a team in each category, in percent with 1 decimal
///
/// Every category is present in the result; an empty team gives all zeros.
pub fn distribution(categories: &[RaceReadiness]) -> BTreeMap<RaceReadiness, f64> {
    let total = categories.len();
    RaceReadiness::ALL
        .iter()
        .map(|category| {
            let count = categories.iter().filter(|c| *c == category).count();
            let percentage = if total > 0 {
                round_dp(count as f64 / total as f64 * 100.0, 1)
            } else {
                0.0
            };
            (*category, percentage)
        })
        .collect()
}
