//! Selective climbing analysis
//!
//! VAM (velocità ascensionale media, vertical meters per hour) measured only
//! over sustained steep segments of a run. Flats, descents and short ramps
//! are left out so a long mountain run is not diluted by its approach.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{ActivityRecord, SensorStream};
use crate::units::round_dp;

/// Selective VAM configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClimbConfig {
    /// A sample belongs to a climb when its grade is strictly above this (percent)
    pub min_grade_percent: f64,

    /// Minimum accumulated climbing time for a segment to count (seconds)
    pub min_segment_s: f64,

    /// Trail runs with more gain than this get a stream fetched (meters)
    pub stream_elevation_threshold_m: f64,
}

impl Default for ClimbConfig {
    fn default() -> Self {
        ClimbConfig {
            min_grade_percent: 7.0,
            min_segment_s: 600.0,
            stream_elevation_threshold_m: 150.0,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Segment {
    gain_m: f64,
    time_s: f64,
}

impl Segment {
    fn add(&mut self, other: Segment) {
        self.gain_m += other.gain_m;
        self.time_s += other.time_s;
    }
}

/// Selective VAM analyzer
#[derive(Debug, Clone, Default)]
pub struct SelectiveClimbAnalyzer {
    config: ClimbConfig,
}

impl SelectiveClimbAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ClimbConfig) -> Self {
        SelectiveClimbAnalyzer { config }
    }

    pub fn config(&self) -> &ClimbConfig {
        &self.config
    }

    /// Ascent rate in m/h over qualifying climbs, 0 when none qualifies
    ///
    /// Inside a climb only pairs with positive altitude and time deltas are
    /// accumulated. A segment is committed when it closes (grade back at or
    /// below the threshold, or the stream ends) and has accumulated at least
    /// `min_segment_s` seconds of climbing.
    pub fn selective_vam(&self, stream: &SensorStream) -> f64 {
        let samples = stream.len();
        let mut total = Segment::default();
        let mut current = Segment::default();
        let mut committed = 0usize;

        for i in 1..samples {
            if stream.grade[i] > self.config.min_grade_percent {
                let delta_h = stream.altitude[i] - stream.altitude[i - 1];
                let delta_t = stream.time[i] - stream.time[i - 1];
                if delta_h > 0.0 && delta_t > 0.0 {
                    current.gain_m += delta_h;
                    current.time_s += delta_t;
                }
            } else {
                if self.commit(&mut total, current) {
                    committed += 1;
                }
                current = Segment::default();
            }
        }

        // Run ending mid-climb
        if self.commit(&mut total, current) {
            committed += 1;
        }

        if total.time_s <= 0.0 {
            debug!(samples, "no sustained climb found");
            return 0.0;
        }

        debug!(
            samples,
            segments = committed,
            gain_m = total.gain_m,
            time_s = total.time_s,
            "selective VAM computed"
        );
        round_dp(total.gain_m / total.time_s * 3600.0, 1)
    }

    fn commit(&self, total: &mut Segment, segment: Segment) -> bool {
        if segment.time_s >= self.config.min_segment_s {
            total.add(segment);
            true
        } else {
            false
        }
    }

    /// Whether a stream should be fetched to compute selective VAM
    pub fn needs_stream(&self, record: &ActivityRecord) -> bool {
        record.is_trail() && record.elevation_gain_m > self.config.stream_elevation_threshold_m
    }

    /// Value to store on the record: only positive results are kept
    ///
    /// Without a stream the value is undefined, never zero.
    pub fn selective_vam_for(
        &self,
        record: &ActivityRecord,
        stream: Option<&SensorStream>,
    ) -> Option<f64> {
        let stream = stream?;
        let vam = self.selective_vam(stream);
        if vam > 0.0 {
            Some(vam)
        } else {
            debug!(activity = %record.id, "selective VAM not positive, not stored");
            None
        }
    }
}

/// Best available ascent rate for a record in m/h
///
/// Selective VAM when stored and positive; for trail runs without one, the
/// whole-activity ascent rate truncated to whole meters per hour.
pub fn effective_vam(record: &ActivityRecord) -> Option<f64> {
    if let Some(vam) = record.selective_vam.filter(|vam| *vam > 0.0) {
        return Some(vam);
    }

    if record.is_trail() && record.elevation_gain_m > 0.0 && record.duration_s > 0 {
        let rate = record.elevation_gain_m / f64::from(record.duration_s) * 3600.0;
        return Some(rate.trunc());
    }

    None
}
