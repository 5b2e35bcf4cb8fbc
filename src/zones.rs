use serde::{Deserialize, Serialize};

use crate::models::AthleteProfile;

/// Fraction of heart-rate reserve at the aerobic threshold (top of Z2)
pub const AEROBIC_THRESHOLD_HRR: f64 = 0.72;

/// Fraction of heart-rate reserve at the anaerobic threshold (top of Z4)
pub const ANAEROBIC_THRESHOLD_HRR: f64 = 0.90;

/// Estimated heart-rate thresholds in bpm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartRateThresholds {
    /// Aerobic threshold: steady long-run effort
    pub aerobic_bpm: u16,
    /// Anaerobic threshold: 10k to half-marathon race effort
    pub anaerobic_bpm: u16,
}

/// Where a heart rate sits relative to the thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThresholdZone {
    Easy,
    Tempo,
    Hard,
}

impl HeartRateThresholds {
    pub fn zone_for(&self, heart_rate: u16) -> ThresholdZone {
        if heart_rate < self.aerobic_bpm {
            ThresholdZone::Easy
        } else if heart_rate < self.anaerobic_bpm {
            ThresholdZone::Tempo
        } else {
            ThresholdZone::Hard
        }
    }
}

/// Karvonen estimate of both thresholds, truncated to whole bpm
///
/// `None` when either heart rate is missing or the reserve is not positive.
pub fn karvonen_thresholds(profile: &AthleteProfile) -> Option<HeartRateThresholds> {
    let reserve = profile.heart_rate_reserve()?;
    let resting_hr = f64::from(profile.resting_hr?);

    let at = |fraction: f64| (resting_hr + reserve * fraction).trunc() as u16;

    Some(HeartRateThresholds {
        aerobic_bpm: at(AEROBIC_THRESHOLD_HRR),
        anaerobic_bpm: at(ANAEROBIC_THRESHOLD_HRR),
    })
}
