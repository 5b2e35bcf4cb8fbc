//! Bulk recomputation of an athlete's derived metrics
//!
//! Per-activity estimates are independent of each other and run in
//! parallel with rayon. Every record is judged against the baseline the
//! athlete had when the run started; the baseline itself is consolidated
//! once, after all records are done.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info};

use crate::climb::SelectiveClimbAnalyzer;
use crate::config::EngineConfig;
use crate::consolidation::ConsolidationEngine;
use crate::efficiency::EfficiencyAnalyzer;
use crate::history::ActivityHistory;
use crate::load::LoadRiskAnalyzer;
use crate::models::{ActivityRecord, AthleteProfile, SensorStream};
use crate::power::PowerEstimator;
use crate::readiness::ReadinessClassifier;
use crate::trend::TrendAnalyzer;
use crate::vo2max::Vo2MaxEstimator;

/// Which derived fields to rewrite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecomputeOptions {
    pub vo2max: bool,
    pub selective_vam: bool,
    pub power: bool,
}

impl Default for RecomputeOptions {
    fn default() -> Self {
        Self {
            vo2max: true,
            selective_vam: true,
            power: true,
        }
    }
}

/// What changed on a single record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordOutcome {
    /// A VO2max estimate was stored
    pub estimated: bool,
    /// The VO2max estimate was cleared
    pub rejected: bool,
    /// Selective VAM was recomputed from a stream
    pub vam_updated: bool,
    /// A fallback power estimate was stored
    pub power_estimated: bool,
}

/// Summary of a recomputation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecomputeSummary {
    pub total_records: usize,
    pub estimated: usize,
    pub rejected: usize,
    pub vam_updated: usize,
    pub power_estimated: usize,
    /// Baseline used to judge every record
    pub baseline_before: Option<f64>,
    pub combined_vo2max: Option<f64>,
    pub road_vo2max: Option<f64>,
    pub duration_ms: u128,
}

impl RecomputeSummary {
    /// Get human-readable summary
    pub fn to_string_pretty(&self) -> String {
        let show = |value: Option<f64>| {
            value
                .map(|v| format!("{:.1}", v))
                .unwrap_or_else(|| "-".to_string())
        };
        format!(
            "Recompute Summary\n  \
             Activities: {}\n  \
             VO2max estimated: {}\n  \
             VO2max rejected: {}\n  \
             Selective VAM updated: {}\n  \
             Power estimated: {}\n  \
             Baseline: {} -> {}\n  \
             Road baseline: {}\n  \
             Time: {}ms",
            self.total_records,
            self.estimated,
            self.rejected,
            self.vam_updated,
            self.power_estimated,
            show(self.baseline_before),
            show(self.combined_vo2max),
            show(self.road_vo2max),
            self.duration_ms
        )
    }
}

/// All analyzers built from one configuration
#[derive(Debug)]
pub struct PerformanceEngine {
    pub vo2max: Vo2MaxEstimator,
    pub climb: SelectiveClimbAnalyzer,
    pub efficiency: EfficiencyAnalyzer,
    pub power: PowerEstimator,
    pub consolidation: ConsolidationEngine,
    pub trend: TrendAnalyzer,
    pub load: LoadRiskAnalyzer,
    pub readiness: ReadinessClassifier,
    default_weight_kg: f64,
}

impl PerformanceEngine {
    pub fn new() -> Self {
        Self::from_config(&EngineConfig::default())
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            vo2max: Vo2MaxEstimator::with_config(config.vo2max.clone()),
            climb: SelectiveClimbAnalyzer::with_config(config.climb.clone()),
            efficiency: EfficiencyAnalyzer::with_config(config.efficiency.clone()),
            power: PowerEstimator::with_config(config.power.clone()),
            consolidation: ConsolidationEngine::with_config(config.consolidation.clone()),
            trend: TrendAnalyzer::with_config(config.trend.clone()),
            load: LoadRiskAnalyzer::with_config(config.load.clone()),
            readiness: ReadinessClassifier::with_config(config.readiness.clone()),
            default_weight_kg: config.profile.weight_kg,
        }
    }

    /// Weight used for energy figures when the profile has none
    pub fn weight_for(&self, profile: &AthleteProfile) -> f64 {
        profile.weight_or(self.default_weight_kg)
    }

    /// Rewrite the derived fields of one record
    ///
    /// Selective VAM is only touched when a stream is supplied; without one
    /// the stored value cannot be recomputed and is left as it is.
    pub fn recompute_record(
        &self,
        record: &mut ActivityRecord,
        profile: &AthleteProfile,
        baseline: Option<f64>,
        stream: Option<&SensorStream>,
        options: RecomputeOptions,
    ) -> RecordOutcome {
        let mut outcome = RecordOutcome::default();

        if options.vo2max {
            let estimate = self.vo2max.estimate(record, profile, baseline);
            outcome.estimated = estimate.is_some();
            outcome.rejected = estimate.is_none() && record.vo2max_estimate.is_some();
            record.vo2max_estimate = estimate;
        }

        if options.selective_vam {
            if let Some(stream) = stream {
                record.selective_vam = self.climb.selective_vam_for(record, Some(stream));
                outcome.vam_updated = true;
            }
        }

        if options.power {
            let measured = record.avg_power_w.filter(|watts| *watts > 0.0).is_some();
            record.estimated_power_w = if measured {
                None
            } else {
                profile
                    .configured_weight()
                    .and_then(|weight| self.power.estimate_for(record, weight))
            };
            outcome.power_estimated = record.estimated_power_w.is_some();
        }

        outcome
    }

    /// Recompute every record of one athlete, then consolidate the baseline
    pub fn recompute_athlete(
        &self,
        history: &mut ActivityHistory,
        streams: &HashMap<String, SensorStream>,
        profile: &mut AthleteProfile,
        options: RecomputeOptions,
    ) -> RecomputeSummary {
        let start = Instant::now();
        let baseline_before = profile.historical_vo2max_estimate;

        let outcomes: Vec<RecordOutcome> = {
            let snapshot: &AthleteProfile = profile;
            history
                .records_mut()
                .par_iter_mut()
                .map(|record| {
                    let stream = streams.get(&record.id);
                    self.recompute_record(record, snapshot, baseline_before, stream, options)
                })
                .collect()
        };

        debug!(athlete = %profile.id, records = outcomes.len(), "per-activity recompute done");

        let (combined_vo2max, road_vo2max) = self.consolidation.consolidate(history, profile);

        let count = |predicate: fn(&RecordOutcome) -> bool| {
            outcomes.iter().filter(|outcome| predicate(outcome)).count()
        };

        let summary = RecomputeSummary {
            total_records: outcomes.len(),
            estimated: count(|o| o.estimated),
            rejected: count(|o| o.rejected),
            vam_updated: count(|o| o.vam_updated),
            power_estimated: count(|o| o.power_estimated),
            baseline_before,
            combined_vo2max,
            road_vo2max,
            duration_ms: start.elapsed().as_millis(),
        };

        info!(
            athlete = %profile.id,
            records = summary.total_records,
            estimated = summary.estimated,
            rejected = summary.rejected,
            combined = ?summary.combined_vo2max,
            "athlete recomputed"
        );

        summary
    }
}

impl Default for PerformanceEngine {
    fn default() -> Self {
        Self::new()
    }
}
