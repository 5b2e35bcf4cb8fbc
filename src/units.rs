//! Rounding and pace/speed conversions shared by the estimators.

use rust_decimal::prelude::*;
use rust_decimal::RoundingStrategy;

/// Round `value` to `dp` decimal places.
///
/// The exact binary value is rounded, so `50.15` (stored as `50.1499…`)
/// rounds down. True midpoints round to the nearest even digit. Non-finite
/// input is returned unchanged.
pub fn round_dp(value: f64, dp: u32) -> f64 {
    match Decimal::from_f64_retain(value) {
        Some(decimal) => decimal
            .round_dp_with_strategy(dp, RoundingStrategy::MidpointNearestEven)
            .to_f64()
            .unwrap_or(value),
        None => value,
    }
}

/// Pace in seconds per kilometer, `None` unless both inputs are positive
pub fn pace_sec_per_km(distance_m: f64, duration_s: f64) -> Option<f64> {
    if distance_m > 0.0 && duration_s > 0.0 {
        Some(duration_s / (distance_m / 1000.0))
    } else {
        None
    }
}

/// Speed in meters per minute, `None` unless both inputs are positive
pub fn speed_m_min(distance_m: f64, duration_s: f64) -> Option<f64> {
    if distance_m > 0.0 && duration_s > 0.0 {
        Some(distance_m / (duration_s / 60.0))
    } else {
        None
    }
}

/// Format a speed in m/s as a `m:ss` per-kilometer pace
pub fn format_pace(speed_m_s: f64) -> String {
    if speed_m_s <= 0.0 || !speed_m_s.is_finite() {
        return "0:00".to_string();
    }

    let minutes_per_km = 1000.0 / (speed_m_s * 60.0);
    let minutes = minutes_per_km.trunc();
    let seconds = ((minutes_per_km - minutes) * 60.0).trunc();
    format!("{}:{:02}", minutes as u32, seconds as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_dp() {
        assert_eq!(round_dp(65.72222, 2), 65.72);
        assert_eq!(round_dp(52.43333, 1), 52.4);
        assert_eq!(round_dp(0.0, 1), 0.0);
        assert!(round_dp(f64::NAN, 1).is_nan());
    }

    #[test]
    fn test_round_dp_binary_ties() {
        // Neither literal is exactly representable; both sit just below the midpoint
        assert_eq!(round_dp(50.15, 1), 50.1);
        assert_eq!(round_dp(2.675, 2), 2.67);
        assert_eq!(round_dp(-50.15, 1), -50.1);
        // Exact midpoints go to the even digit
        assert_eq!(round_dp(0.125, 2), 0.12);
        assert_eq!(round_dp(2.5, 0), 2.0);
    }

    #[test]
    fn test_pace_and_speed() {
        assert_eq!(pace_sec_per_km(10_000.0, 2700.0), Some(270.0));
        assert_eq!(pace_sec_per_km(0.0, 2700.0), None);
        assert_eq!(speed_m_min(6000.0, 1800.0), Some(200.0));
        assert_eq!(speed_m_min(6000.0, 0.0), None);
    }

    #[test]
    fn test_format_pace() {
        // 10 km in 45 minutes = 4:30/km
        assert_eq!(format_pace(10_000.0 / 2700.0), "4:30");
        assert_eq!(format_pace(0.0), "0:00");
        assert_eq!(format_pace(-1.0), "0:00");
    }
}
