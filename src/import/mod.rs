//! File collaborators: activity histories, athlete profiles and sensor
//! streams read from local files, and JSON output for recomputed data.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::error::{ImportError, TrailRsError};
use crate::history::ActivityHistory;
use crate::models::{ActivityRecord, AthleteProfile, SensorStream};

pub mod csv;
pub mod json;

/// Activities longer than this are data errors, never real runs (meters)
pub const MAX_PLAUSIBLE_DISTANCE_M: f64 = 200_000.0;

/// Trait for importing activity records from different file formats
pub trait ImportFormat {
    /// Check if this importer can handle the given file
    fn can_import(&self, file_path: &Path) -> bool;

    /// Import activity records from the file
    fn import_file(&self, file_path: &Path) -> Result<Vec<ActivityRecord>>;

    /// Get the format name for this importer
    fn get_format_name(&self) -> &'static str;
}

/// Picks the importer for a file and screens out implausible records
pub struct ImportManager {
    importers: Vec<Box<dyn ImportFormat>>,
}

impl ImportManager {
    pub fn new() -> Self {
        let importers: Vec<Box<dyn ImportFormat>> = vec![
            Box::new(json::JsonImporter::new()),
            Box::new(csv::CsvImporter::new()),
        ];

        Self { importers }
    }

    /// Import a single file, auto-detecting the format
    pub fn import_file(&self, file_path: &Path) -> Result<Vec<ActivityRecord>> {
        let importer = self
            .importers
            .iter()
            .find(|importer| importer.can_import(file_path))
            .ok_or_else(|| {
                TrailRsError::from(ImportError::UnsupportedFormat {
                    path: file_path.to_path_buf(),
                })
            })?;

        let records = importer
            .import_file(file_path)
            .with_context(|| format!("Failed to import {}", file_path.display()))?;
        let total = records.len();
        let records = filter_anomalous(records);

        info!(
            path = %file_path.display(),
            format = importer.get_format_name(),
            imported = records.len(),
            skipped = total - records.len(),
            "activities imported"
        );

        Ok(records)
    }

    /// Import a file straight into a newest-first history
    pub fn import_history(&self, file_path: &Path) -> Result<ActivityHistory> {
        Ok(ActivityHistory::new(self.import_file(file_path)?))
    }
}

impl Default for ImportManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Drop records whose distance cannot be real, logging each one
pub fn filter_anomalous(records: Vec<ActivityRecord>) -> Vec<ActivityRecord> {
    records
        .into_iter()
        .filter(|record| {
            if record.distance_m > MAX_PLAUSIBLE_DISTANCE_M {
                warn!(
                    activity = %record.id,
                    distance_km = record.distance_km(),
                    "implausible distance, activity skipped"
                );
                false
            } else {
                true
            }
        })
        .collect()
}

/// Load an athlete profile from a `.json` or `.toml` file
pub fn load_profile(path: &Path) -> Result<AthleteProfile> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read profile: {}", path.display()))?;

    let profile = match extension(path).as_deref() {
        Some("json") => serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON profile: {}", path.display()))?,
        Some("toml") => toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML profile: {}", path.display()))?,
        _ => {
            return Err(TrailRsError::from(ImportError::UnsupportedFormat {
                path: path.to_path_buf(),
            })
            .into())
        }
    };

    Ok(profile)
}

/// Load sensor streams keyed by activity id from a JSON object
///
/// Streams that fail validation are skipped with a warning; the activity
/// then simply has no selective VAM.
pub fn load_streams(path: &Path) -> Result<HashMap<String, SensorStream>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read streams: {}", path.display()))?;
    let raw: HashMap<String, SensorStream> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse streams: {}", path.display()))?;

    let streams = raw
        .into_iter()
        .filter_map(|(id, stream)| match stream.validate() {
            Ok(()) => Some((id, stream)),
            Err(err) => {
                warn!(activity = %id, error = %err, "invalid sensor stream skipped");
                None
            }
        })
        .collect();

    Ok(streams)
}

/// Write any serializable value as pretty JSON, creating parent directories
pub fn save_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let json = serde_json::to_string_pretty(value).map_err(TrailRsError::from)?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ActivityKind;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    fn record(id: &str, distance_m: f64) -> ActivityRecord {
        ActivityRecord::new(
            id,
            Utc.with_ymd_and_hms(2025, 2, 1, 9, 0, 0).unwrap(),
            ActivityKind::Road,
            distance_m,
            3600,
        )
    }

    #[test]
    fn test_filter_anomalous() {
        let kept = filter_anomalous(vec![
            record("ok", 42_195.0),
            record("bad", 18_000_000.0),
            record("edge", 200_000.0),
        ]);
        let ids: Vec<&str> = kept.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["ok", "edge"]);
    }

    #[test]
    fn test_unsupported_format() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ride.gpx");
        fs::write(&path, "<gpx/>").unwrap();

        let err = ImportManager::new().import_file(&path).unwrap_err();
        assert!(err.to_string().contains("ride.gpx"));
    }

    #[test]
    fn test_json_round_trip_through_manager() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("activities.json");
        save_json(&path, &vec![record("a", 10_000.0), record("b", 500_000.0)]).unwrap();

        let history = ImportManager::new().import_history(&path).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history.records()[0].id, "a");
    }

    #[test]
    fn test_load_profile_formats() {
        let dir = tempdir().unwrap();

        let json_path = dir.path().join("athlete.json");
        fs::write(
            &json_path,
            r#"{"id": "42", "name": "Giulia", "resting_hr": 48, "theoretical_max_hr": 188}"#,
        )
        .unwrap();
        let profile = load_profile(&json_path).unwrap();
        assert_eq!(profile.heart_rate_reserve(), Some(140.0));
        assert_eq!(profile.weight_kg, None);

        let toml_path = dir.path().join("athlete.toml");
        fs::write(&toml_path, "id = \"7\"\nweight_kg = 58.5\nrace_index = 610\n").unwrap();
        let profile = load_profile(&toml_path).unwrap();
        assert_eq!(profile.configured_weight(), Some(58.5));
        assert_eq!(profile.race_index, Some(610));

        let txt_path = dir.path().join("athlete.txt");
        fs::write(&txt_path, "id = 1").unwrap();
        assert!(load_profile(&txt_path).is_err());
    }

    #[test]
    fn test_load_streams_skips_invalid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("streams.json");
        fs::write(
            &path,
            r#"{
                "good": {"grade": [0.0, 8.0], "altitude": [100.0, 101.0], "time": [0.0, 1.0]},
                "short": {"grade": [0.0, 8.0], "altitude": [100.0], "time": [0.0, 1.0]},
                "backwards": {"grade": [0.0, 8.0], "altitude": [100.0, 101.0], "time": [5.0, 1.0]}
            }"#,
        )
        .unwrap();

        let streams = load_streams(&path).unwrap();
        assert_eq!(streams.len(), 1);
        assert!(streams.contains_key("good"));
    }
}
