use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

use crate::error::{ImportError, TrailRsError};
use crate::import::ImportFormat;
use crate::models::{ActivityKind, ActivityRecord, WorkoutKind};

/// CSV importer for activity summaries, one row per activity
///
/// Distances are meters and durations seconds. Column names are matched
/// case-insensitively against common export variations.
pub struct CsvImporter {
    column_mapping: HashMap<String, String>,
}

/// Column positions resolved from the header row
struct Columns {
    id: Option<usize>,
    timestamp: usize,
    distance: usize,
    duration: usize,
    elevation_gain: Option<usize>,
    avg_hr: Option<usize>,
    max_hr: Option<usize>,
    sport_type: Option<usize>,
    workout_type: Option<usize>,
    gap: Option<usize>,
    power: Option<usize>,
}

impl CsvImporter {
    pub fn new() -> Self {
        let mut column_mapping = HashMap::new();

        Self::add_mapping(&mut column_mapping, "id", &["id", "activity_id", "external_id"]);
        Self::add_mapping(
            &mut column_mapping,
            "timestamp",
            &["timestamp", "date", "start_date", "start_time", "start_date_local"],
        );
        Self::add_mapping(
            &mut column_mapping,
            "distance",
            &["distance", "distance_m", "dist"],
        );
        Self::add_mapping(
            &mut column_mapping,
            "duration",
            &["duration", "duration_s", "moving_time", "elapsed_time"],
        );
        Self::add_mapping(
            &mut column_mapping,
            "elevation_gain",
            &["elevation_gain", "elevation_gain_m", "total_elevation_gain", "ascent", "d+"],
        );
        Self::add_mapping(
            &mut column_mapping,
            "avg_hr",
            &["avg_hr", "average_heartrate", "heart_rate", "hr"],
        );
        Self::add_mapping(&mut column_mapping, "max_hr", &["max_hr", "max_heartrate"]);
        Self::add_mapping(
            &mut column_mapping,
            "sport_type",
            &["sport_type", "type", "sport", "activity_kind"],
        );
        Self::add_mapping(&mut column_mapping, "workout_type", &["workout_type", "workout_code"]);
        Self::add_mapping(
            &mut column_mapping,
            "gap",
            &["gap", "grade_adjusted_pace_m_s", "average_grade_adjusted_speed"],
        );
        Self::add_mapping(
            &mut column_mapping,
            "power",
            &["power", "avg_power_w", "average_watts", "watts"],
        );

        Self { column_mapping }
    }

    fn add_mapping(mapping: &mut HashMap<String, String>, standard: &str, variations: &[&str]) {
        for variation in variations {
            mapping.insert(variation.to_lowercase(), standard.to_string());
        }
    }

    fn normalize_column_name(&self, name: &str) -> String {
        let normalized = name.trim().to_lowercase().replace([' ', '-'], "_");

        self.column_mapping
            .get(&normalized)
            .cloned()
            .unwrap_or(normalized)
    }

    fn parse_datetime(date_str: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(date_str) {
            return Some(dt.with_timezone(&Utc));
        }

        let formats = [
            "%Y-%m-%d %H:%M:%S",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%d %H:%M",
            "%d/%m/%Y %H:%M:%S",
            "%d/%m/%Y %H:%M",
        ];

        for format in &formats {
            if let Ok(naive_dt) = NaiveDateTime::parse_from_str(date_str, format) {
                return Some(DateTime::from_naive_utc_and_offset(naive_dt, Utc));
            }
        }

        // Seconds since epoch
        date_str
            .parse::<i64>()
            .ok()
            .and_then(|timestamp| DateTime::from_timestamp(timestamp, 0))
    }

    fn resolve_columns(&self, headers: &StringRecord) -> Result<Columns> {
        let names: Vec<String> = headers
            .iter()
            .map(|header| self.normalize_column_name(header))
            .collect();
        let find = |name: &str| names.iter().position(|n| n == name);
        let require = |name: &str| {
            find(name).ok_or_else(|| {
                TrailRsError::from(ImportError::Parse {
                    format: "CSV".to_string(),
                    reason: format!("missing required column '{}'", name),
                })
            })
        };

        Ok(Columns {
            id: find("id"),
            timestamp: require("timestamp")?,
            distance: require("distance")?,
            duration: require("duration")?,
            elevation_gain: find("elevation_gain"),
            avg_hr: find("avg_hr"),
            max_hr: find("max_hr"),
            sport_type: find("sport_type"),
            workout_type: find("workout_type"),
            gap: find("gap"),
            power: find("power"),
        })
    }

    fn parse_row(
        columns: &Columns,
        row: &StringRecord,
        row_number: usize,
    ) -> std::result::Result<ActivityRecord, ImportError> {
        let field = |index: Option<usize>| {
            index
                .and_then(|i| row.get(i))
                .map(str::trim)
                .filter(|value| !value.is_empty())
        };
        let id = field(columns.id)
            .map(str::to_string)
            .unwrap_or_else(|| format!("row-{}", row_number));
        let invalid = |reason: String| ImportError::InvalidRecord {
            id: id.clone(),
            reason,
        };

        let timestamp = field(Some(columns.timestamp))
            .and_then(Self::parse_datetime)
            .ok_or_else(|| invalid("unreadable timestamp".to_string()))?;
        let distance_m = field(Some(columns.distance))
            .and_then(|value| value.parse::<f64>().ok())
            .filter(|value| *value >= 0.0)
            .ok_or_else(|| invalid("distance must be a non-negative number".to_string()))?;
        let duration_s = field(Some(columns.duration))
            .and_then(|value| value.parse::<f64>().ok())
            .filter(|value| *value >= 0.0 && *value <= f64::from(u32::MAX))
            .ok_or_else(|| invalid("duration must be a non-negative number".to_string()))?;

        let number = |index: Option<usize>| field(index).and_then(|value| value.parse::<f64>().ok());
        let heart_rate = |index: Option<usize>| {
            number(index)
                .filter(|hr| *hr > 0.0 && *hr < f64::from(u16::MAX))
                .map(|hr| hr.round() as u16)
        };

        let activity_kind = field(columns.sport_type)
            .map(ActivityKind::from_sport_type)
            .unwrap_or_default();
        let workout_kind = field(columns.workout_type)
            .and_then(|value| value.parse::<u8>().ok())
            .map(WorkoutKind::from_code)
            .unwrap_or_default();

        let mut record = ActivityRecord::new(
            id.clone(),
            timestamp,
            activity_kind,
            distance_m,
            duration_s.round() as u32,
        )
        .with_workout_kind(workout_kind)
        .with_elevation_gain(number(columns.elevation_gain).unwrap_or(0.0).max(0.0));

        record.avg_hr = heart_rate(columns.avg_hr);
        record.max_hr = heart_rate(columns.max_hr);
        record.grade_adjusted_pace_m_s = number(columns.gap);
        record.avg_power_w = number(columns.power);

        Ok(record)
    }
}

impl Default for CsvImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportFormat for CsvImporter {
    fn can_import(&self, file_path: &Path) -> bool {
        file_path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false)
    }

    /// Rows that cannot be read are skipped with a warning
    fn import_file(&self, file_path: &Path) -> Result<Vec<ActivityRecord>> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(Trim::All)
            .flexible(true)
            .from_path(file_path)
            .with_context(|| format!("Failed to open CSV file: {}", file_path.display()))?;

        let headers = reader.headers().with_context(|| "Failed to read CSV header")?.clone();
        let columns = self.resolve_columns(&headers)?;

        let mut records = Vec::new();
        for (index, row) in reader.records().enumerate() {
            let row_number = index + 1;
            let row = row.with_context(|| format!("Failed to read CSV row {}", row_number))?;

            match Self::parse_row(&columns, &row, row_number) {
                Ok(record) => records.push(record),
                Err(err) => warn!(row = row_number, error = %err, "CSV row skipped"),
            }
        }

        Ok(records)
    }

    fn get_format_name(&self) -> &'static str {
        "CSV"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs;
    use tempfile::tempdir;

    fn write_csv(content: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("activities.csv");
        fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_column_name_variations() {
        let importer = CsvImporter::new();
        assert_eq!(importer.normalize_column_name("Moving Time"), "duration");
        assert_eq!(importer.normalize_column_name("average_heartrate"), "avg_hr");
        assert_eq!(importer.normalize_column_name("Total-Elevation-Gain"), "elevation_gain");
        assert_eq!(importer.normalize_column_name("cadence"), "cadence");
    }

    #[test]
    fn test_parse_datetime_formats() {
        let expected = Utc.with_ymd_and_hms(2025, 4, 6, 9, 0, 0).unwrap();
        assert_eq!(CsvImporter::parse_datetime("2025-04-06T09:00:00Z"), Some(expected));
        assert_eq!(CsvImporter::parse_datetime("2025-04-06 09:00:00"), Some(expected));
        assert_eq!(CsvImporter::parse_datetime("06/04/2025 09:00"), Some(expected));
        assert_eq!(
            CsvImporter::parse_datetime(&expected.timestamp().to_string()),
            Some(expected)
        );
        assert_eq!(CsvImporter::parse_datetime("yesterday"), None);
    }

    #[test]
    fn test_import_rows() {
        let (_dir, path) = write_csv(
            "id,start_date,distance,moving_time,total_elevation_gain,average_heartrate,max_heartrate,sport_type,workout_type,average_watts\n\
             501,2025-04-06T09:00:00Z,10000,2700,20,150,172,Run,1,\n\
             502,2025-04-08T07:00:00Z,14000,5400,950,142,,TrailRun,,\n\
             503,not-a-date,8000,2400,0,,,Run,,\n\
             504,2025-04-10T18:00:00Z,6000,1900,10,,,Hike,2,230\n",
        );

        let records = CsvImporter::new().import_file(&path).unwrap();
        assert_eq!(records.len(), 3);

        assert_eq!(records[0].id, "501");
        assert_eq!(records[0].workout_kind, WorkoutKind::Race);
        assert_eq!(records[0].avg_hr, Some(150));
        assert_eq!(records[0].max_hr, Some(172));
        assert_eq!(records[0].avg_power_w, None);

        assert_eq!(records[1].activity_kind, ActivityKind::Trail);
        assert_eq!(records[1].elevation_gain_m, 950.0);
        assert_eq!(records[1].max_hr, None);

        assert_eq!(records[2].activity_kind, ActivityKind::Trail);
        assert_eq!(records[2].workout_kind, WorkoutKind::LongRun);
        assert_eq!(records[2].avg_power_w, Some(230.0));
    }

    #[test]
    fn test_missing_required_column() {
        let (_dir, path) = write_csv("id,date,distance\n1,2025-04-06T09:00:00Z,5000\n");
        let err = CsvImporter::new().import_file(&path).unwrap_err();
        assert!(err.to_string().contains("duration"));
    }

    #[test]
    fn test_generated_ids() {
        let (_dir, path) = write_csv("date,distance,duration\n2025-04-06 09:00:00,5000,1500\n");
        let records = CsvImporter::new().import_file(&path).unwrap();
        assert_eq!(records[0].id, "row-1");
        assert_eq!(records[0].activity_kind, ActivityKind::Road);
    }
}
