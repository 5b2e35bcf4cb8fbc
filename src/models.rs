use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StreamError;
use crate::units;

/// Terrain category of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivityKind {
    Road,
    Trail,
}

impl ActivityKind {
    /// Map a provider sport type to a terrain category
    ///
    /// Trail runs and hikes are scored on the trail model, everything else
    /// on the road model.
    pub fn from_sport_type(sport_type: &str) -> Self {
        match sport_type {
            "TrailRun" | "Trail" | "Hike" => ActivityKind::Trail,
            _ => ActivityKind::Road,
        }
    }
}

impl Default for ActivityKind {
    fn default() -> Self {
        ActivityKind::Road
    }
}

/// Intent of a session as tagged by the athlete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkoutKind {
    Training,
    Race,
    LongRun,
    Workout,
}

impl WorkoutKind {
    /// Decode the provider's numeric workout tag (0 default, 1 race, 2 long run, 3 workout)
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => WorkoutKind::Race,
            2 => WorkoutKind::LongRun,
            3 => WorkoutKind::Workout,
            _ => WorkoutKind::Training,
        }
    }
}

impl Default for WorkoutKind {
    fn default() -> Self {
        WorkoutKind::Training
    }
}

/// One completed workout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// External activity identifier
    pub id: String,

    /// Start time of the activity
    pub timestamp: DateTime<Utc>,

    /// Distance covered in meters
    pub distance_m: f64,

    /// Moving time in seconds
    pub duration_s: u32,

    /// Total elevation gain in meters
    #[serde(default)]
    pub elevation_gain_m: f64,

    /// Average heart rate in bpm
    #[serde(default)]
    pub avg_hr: Option<u16>,

    /// Peak heart rate in bpm
    #[serde(default)]
    pub max_hr: Option<u16>,

    #[serde(default)]
    pub activity_kind: ActivityKind,

    #[serde(default)]
    pub workout_kind: WorkoutKind,

    /// Grade-adjusted speed in m/s
    #[serde(default)]
    pub grade_adjusted_pace_m_s: Option<f64>,

    /// Measured average power in watts
    #[serde(default)]
    pub avg_power_w: Option<f64>,

    /// Estimated power when no measurement exists (derived)
    #[serde(default)]
    pub estimated_power_w: Option<f64>,

    /// Per-activity VO2max estimate in ml/kg/min (derived)
    #[serde(default)]
    pub vo2max_estimate: Option<f64>,

    /// Ascent speed over sustained steep segments in m/h (derived)
    #[serde(default)]
    pub selective_vam: Option<f64>,
}

impl ActivityRecord {
    /// Create a record with only the mandatory fields set
    pub fn new(
        id: impl Into<String>,
        timestamp: DateTime<Utc>,
        activity_kind: ActivityKind,
        distance_m: f64,
        duration_s: u32,
    ) -> Self {
        ActivityRecord {
            id: id.into(),
            timestamp,
            distance_m,
            duration_s,
            elevation_gain_m: 0.0,
            avg_hr: None,
            max_hr: None,
            activity_kind,
            workout_kind: WorkoutKind::Training,
            grade_adjusted_pace_m_s: None,
            avg_power_w: None,
            estimated_power_w: None,
            vo2max_estimate: None,
            selective_vam: None,
        }
    }

    pub fn with_heart_rate(mut self, avg_hr: u16, max_hr: Option<u16>) -> Self {
        self.avg_hr = Some(avg_hr);
        self.max_hr = max_hr;
        self
    }

    pub fn with_elevation_gain(mut self, elevation_gain_m: f64) -> Self {
        self.elevation_gain_m = elevation_gain_m;
        self
    }

    pub fn with_grade_adjusted_pace(mut self, speed_m_s: f64) -> Self {
        self.grade_adjusted_pace_m_s = Some(speed_m_s);
        self
    }

    pub fn with_workout_kind(mut self, workout_kind: WorkoutKind) -> Self {
        self.workout_kind = workout_kind;
        self
    }

    pub fn with_power(mut self, avg_power_w: f64) -> Self {
        self.avg_power_w = Some(avg_power_w);
        self
    }

    pub fn is_road(&self) -> bool {
        self.activity_kind == ActivityKind::Road
    }

    pub fn is_trail(&self) -> bool {
        self.activity_kind == ActivityKind::Trail
    }

    pub fn distance_km(&self) -> f64 {
        self.distance_m / 1000.0
    }

    /// Pace in seconds per kilometer
    pub fn pace_sec_per_km(&self) -> Option<f64> {
        units::pace_sec_per_km(self.distance_m, f64::from(self.duration_s))
    }

    /// Average moving speed in m/s (zero distance gives zero speed)
    pub fn avg_speed_m_s(&self) -> Option<f64> {
        if self.duration_s > 0 {
            Some(self.distance_m / f64::from(self.duration_s))
        } else {
            None
        }
    }

    /// Grade-adjusted speed when the provider supplied a usable one
    pub fn usable_gap_m_s(&self) -> Option<f64> {
        self.grade_adjusted_pace_m_s.filter(|gap| *gap > 0.0)
    }

    /// Measured power, falling back to the stored estimate
    pub fn power_w(&self) -> Option<f64> {
        self.avg_power_w
            .filter(|watts| *watts > 0.0)
            .or(self.estimated_power_w)
    }
}

/// One athlete's physiological parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AthleteProfile {
    /// Unique athlete identifier
    pub id: String,

    /// Athlete's display name
    #[serde(default)]
    pub name: String,

    /// Weight in kilograms
    #[serde(default)]
    pub weight_kg: Option<f64>,

    /// Resting heart rate
    #[serde(default)]
    pub resting_hr: Option<u16>,

    /// Theoretical maximum heart rate
    #[serde(default)]
    pub theoretical_max_hr: Option<u16>,

    /// External race ranking (ITRA-style), only ever used as a ceiling
    #[serde(default)]
    pub race_index: Option<u16>,

    /// Consolidated VO2max over road and trail sessions
    #[serde(default)]
    pub historical_vo2max_estimate: Option<f64>,

    /// Consolidated VO2max over road sessions only
    #[serde(default)]
    pub historical_vo2max_road: Option<f64>,
}

impl AthleteProfile {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        AthleteProfile {
            id: id.into(),
            name: name.into(),
            weight_kg: None,
            resting_hr: None,
            theoretical_max_hr: None,
            race_index: None,
            historical_vo2max_estimate: None,
            historical_vo2max_road: None,
        }
    }

    pub fn with_heart_rates(mut self, resting_hr: u16, theoretical_max_hr: u16) -> Self {
        self.resting_hr = Some(resting_hr);
        self.theoretical_max_hr = Some(theoretical_max_hr);
        self
    }

    pub fn with_weight(mut self, weight_kg: f64) -> Self {
        self.weight_kg = Some(weight_kg);
        self
    }

    pub fn with_race_index(mut self, race_index: u16) -> Self {
        self.race_index = Some(race_index);
        self
    }

    /// Weight if it has been configured with a positive value
    pub fn configured_weight(&self) -> Option<f64> {
        self.weight_kg.filter(|weight| *weight > 0.0)
    }

    /// Weight used for calculations, substituting `default_kg` when unset
    pub fn weight_or(&self, default_kg: f64) -> f64 {
        self.configured_weight().unwrap_or(default_kg)
    }

    /// Heart-rate reserve (max - resting) in bpm, `None` when undefined or not positive
    pub fn heart_rate_reserve(&self) -> Option<f64> {
        let max_hr = self.theoretical_max_hr.filter(|hr| *hr > 0)?;
        let resting_hr = self.resting_hr.filter(|hr| *hr > 0)?;
        let reserve = f64::from(max_hr) - f64::from(resting_hr);
        (reserve > 0.0).then_some(reserve)
    }

    /// Karvonen fraction of heart-rate reserve used at `heart_rate`
    pub fn hrr_fraction(&self, heart_rate: f64) -> Option<f64> {
        let reserve = self.heart_rate_reserve()?;
        let resting_hr = f64::from(self.resting_hr?);
        Some((heart_rate - resting_hr) / reserve)
    }
}

/// Second-by-second companion stream of an activity
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SensorStream {
    /// Smoothed grade in percent
    pub grade: Vec<f64>,
    /// Altitude in meters
    pub altitude: Vec<f64>,
    /// Elapsed time in seconds
    pub time: Vec<f64>,
}

impl SensorStream {
    /// Build a validated stream
    pub fn new(grade: Vec<f64>, altitude: Vec<f64>, time: Vec<f64>) -> Result<Self, StreamError> {
        let stream = Self::from_parts_unchecked(grade, altitude, time);
        stream.validate()?;
        Ok(stream)
    }

    /// Build a stream without validation; analysis stops at the shortest sequence
    pub fn from_parts_unchecked(grade: Vec<f64>, altitude: Vec<f64>, time: Vec<f64>) -> Self {
        SensorStream {
            grade,
            altitude,
            time,
        }
    }

    pub fn validate(&self) -> Result<(), StreamError> {
        if self.grade.len() != self.altitude.len() || self.grade.len() != self.time.len() {
            return Err(StreamError::LengthMismatch {
                grade: self.grade.len(),
                altitude: self.altitude.len(),
                time: self.time.len(),
            });
        }

        if let Some(index) = self.time.windows(2).position(|pair| pair[1] < pair[0]) {
            return Err(StreamError::NonMonotonicTime { index: index + 1 });
        }

        Ok(())
    }

    /// Number of complete samples
    pub fn len(&self) -> usize {
        self.grade.len().min(self.altitude.len()).min(self.time.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 7, 30, 0).unwrap()
    }

    #[test]
    fn test_activity_kind_mapping() {
        assert_eq!(ActivityKind::from_sport_type("TrailRun"), ActivityKind::Trail);
        assert_eq!(ActivityKind::from_sport_type("Hike"), ActivityKind::Trail);
        assert_eq!(ActivityKind::from_sport_type("Run"), ActivityKind::Road);
        assert_eq!(ActivityKind::from_sport_type("VirtualRun"), ActivityKind::Road);
    }

    #[test]
    fn test_workout_kind_codes() {
        assert_eq!(WorkoutKind::from_code(1), WorkoutKind::Race);
        assert_eq!(WorkoutKind::from_code(3), WorkoutKind::Workout);
        assert_eq!(WorkoutKind::from_code(0), WorkoutKind::Training);
        assert_eq!(WorkoutKind::from_code(42), WorkoutKind::Training);
    }

    #[test]
    fn test_activity_derived_values() {
        let record = ActivityRecord::new("a1", sample_time(), ActivityKind::Road, 10_000.0, 2700)
            .with_heart_rate(150, Some(172));

        assert_eq!(record.distance_km(), 10.0);
        assert_eq!(record.pace_sec_per_km(), Some(270.0));
        assert!((record.avg_speed_m_s().unwrap() - 3.7037).abs() < 0.001);
        assert!(record.is_road());
    }

    #[test]
    fn test_power_prefers_measurement() {
        let mut record = ActivityRecord::new("a2", sample_time(), ActivityKind::Trail, 8000.0, 3600);
        record.estimated_power_w = Some(180.0);
        assert_eq!(record.power_w(), Some(180.0));

        let record = record.with_power(240.0);
        assert_eq!(record.power_w(), Some(240.0));
    }

    #[test]
    fn test_zero_gap_is_not_usable() {
        let record = ActivityRecord::new("a3", sample_time(), ActivityKind::Road, 5000.0, 1500)
            .with_grade_adjusted_pace(0.0);
        assert_eq!(record.usable_gap_m_s(), None);
    }

    #[test]
    fn test_heart_rate_reserve() {
        let profile = AthleteProfile::new("ath", "Test").with_heart_rates(50, 190);
        assert_eq!(profile.heart_rate_reserve(), Some(140.0));
        assert!((profile.hrr_fraction(150.0).unwrap() - 0.7142857).abs() < 1e-6);

        let flat = AthleteProfile::new("ath", "Test").with_heart_rates(60, 60);
        assert_eq!(flat.heart_rate_reserve(), None);
        assert_eq!(flat.hrr_fraction(150.0), None);
    }

    #[test]
    fn test_weight_default() {
        let profile = AthleteProfile::new("ath", "Test");
        assert_eq!(profile.weight_or(70.0), 70.0);
        assert_eq!(profile.configured_weight(), None);

        let profile = profile.with_weight(62.5);
        assert_eq!(profile.weight_or(70.0), 62.5);
    }

    #[test]
    fn test_stream_validation() {
        let ok = SensorStream::new(vec![1.0, 2.0], vec![100.0, 101.0], vec![0.0, 1.0]);
        assert!(ok.is_ok());

        let mismatch = SensorStream::new(vec![1.0, 2.0], vec![100.0], vec![0.0, 1.0]);
        assert_eq!(
            mismatch.unwrap_err(),
            StreamError::LengthMismatch {
                grade: 2,
                altitude: 1,
                time: 2
            }
        );

        let backwards = SensorStream::new(vec![1.0; 3], vec![100.0; 3], vec![0.0, 5.0, 4.0]);
        assert_eq!(
            backwards.unwrap_err(),
            StreamError::NonMonotonicTime { index: 2 }
        );
    }

    #[test]
    fn test_unchecked_stream_uses_shortest_length() {
        let stream = SensorStream::from_parts_unchecked(vec![1.0; 4], vec![1.0; 2], vec![0.0; 3]);
        assert_eq!(stream.len(), 2);
    }

    #[test]
    fn test_activity_serialization_defaults() {
        let json = r#"{
            "id": "123",
            "timestamp": "2025-03-10T07:30:00Z",
            "distance_m": 12000.0,
            "duration_s": 3600
        }"#;

        let record: ActivityRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.activity_kind, ActivityKind::Road);
        assert_eq!(record.workout_kind, WorkoutKind::Training);
        assert_eq!(record.vo2max_estimate, None);
        assert_eq!(record.elevation_gain_m, 0.0);
    }
}
