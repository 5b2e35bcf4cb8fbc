use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::climb::ClimbConfig;
use crate::consolidation::ConsolidationConfig;
use crate::efficiency::EfficiencyConfig;
use crate::load::LoadRiskConfig;
use crate::logging::LogConfig;
use crate::power::PowerConfig;
use crate::readiness::ReadinessConfig;
use crate::trend::TrendConfig;
use crate::vo2max::Vo2MaxConfig;

/// Weight assumed for athletes who never configured one (kg)
pub const DEFAULT_WEIGHT_KG: f64 = 70.0;

/// Engine configuration: one section per analyzer
///
/// Every section falls back to its defaults, so a file only needs the values
/// it changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub vo2max: Vo2MaxConfig,
    pub climb: ClimbConfig,
    pub efficiency: EfficiencyConfig,
    pub power: PowerConfig,
    pub consolidation: ConsolidationConfig,
    pub trend: TrendConfig,
    pub load: LoadRiskConfig,
    pub readiness: ReadinessConfig,
    pub profile: ProfileDefaults,
    pub logging: LogConfig,
}

/// Values substituted for missing profile data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileDefaults {
    /// Weight used when the athlete has none configured (kg)
    pub weight_kg: f64,
}

impl Default for ProfileDefaults {
    fn default() -> Self {
        ProfileDefaults {
            weight_kg: DEFAULT_WEIGHT_KG,
        }
    }
}

impl EngineConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: EngineConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let toml_content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize configuration to TOML")?;

        fs::write(&path, toml_content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Get default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".trailrs")
            .join("config.toml")
    }

    /// Load the default file, falling back to built-in defaults
    pub fn load_or_default() -> Self {
        let config_path = Self::default_config_path();

        if !config_path.exists() {
            debug!(path = %config_path.display(), "no config file, using defaults");
            return Self::default();
        }

        match Self::load_from_file(&config_path) {
            Ok(config) => config,
            Err(err) => {
                warn!(path = %config_path.display(), error = %err, "invalid config file, using defaults");
                Self::default()
            }
        }
    }

    /// Reject values that would make an analyzer meaningless
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if self.consolidation.window == 0 {
            problems.push("consolidation.window must be at least 1".to_string());
        }
        if self.consolidation.min_samples == 0 {
            problems.push("consolidation.min_samples must be at least 1".to_string());
        }
        if self.trend.window < 2 {
            problems.push("trend.window must be at least 2".to_string());
        }
        if self.trend.recent == 0 || self.trend.recent >= self.trend.window {
            problems.push("trend.recent must be between 1 and trend.window - 1".to_string());
        }
        if self.load.acute_days <= 0 || self.load.chronic_days < self.load.acute_days {
            problems.push("load windows must satisfy 0 < acute_days <= chronic_days".to_string());
        }
        if self.load.chronic_weeks <= 0.0 || self.load.elevation_per_km_effort_m <= 0.0 {
            problems.push("load.chronic_weeks and load.elevation_per_km_effort_m must be positive".to_string());
        }
        if self.readiness.window_days <= 0 {
            problems.push("readiness.window_days must be positive".to_string());
        }
        if self.profile.weight_kg <= 0.0 {
            problems.push("profile.weight_kg must be positive".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(crate::error::TrailRsError::Configuration(problems.join("; ")).into())
        }
    }
}
