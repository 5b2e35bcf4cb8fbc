use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::import::ImportFormat;
use crate::models::ActivityRecord;

/// Importer for JSON arrays of activity records
pub struct JsonImporter;

impl JsonImporter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for JsonImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportFormat for JsonImporter {
    fn can_import(&self, file_path: &Path) -> bool {
        file_path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false)
    }

    fn import_file(&self, file_path: &Path) -> Result<Vec<ActivityRecord>> {
        let content = fs::read_to_string(file_path)
            .with_context(|| format!("Failed to read {}", file_path.display()))?;

        let records: Vec<ActivityRecord> = serde_json::from_str(&content)
            .with_context(|| "Activity file must be a JSON array of activity records")?;

        Ok(records)
    }

    fn get_format_name(&self) -> &'static str {
        "JSON"
    }
}
