// Library interface for TrailRS modules
// The binary and the integration tests both go through this crate root

pub mod climb;
pub mod config;
pub mod consolidation;
pub mod efficiency;
pub mod error;
pub mod history;
pub mod import;
pub mod load;
pub mod logging;
pub mod models;
pub mod power;
pub mod readiness;
pub mod recompute;
pub mod trend;
pub mod units;
pub mod vo2max;
pub mod zones;

// Re-export commonly used types for convenience
pub use models::*;
pub use climb::SelectiveClimbAnalyzer;
pub use config::EngineConfig;
pub use consolidation::{ConsolidatedVo2max, ConsolidationEngine};
pub use efficiency::EfficiencyAnalyzer;
pub use history::ActivityHistory;
pub use load::{LoadRiskAnalyzer, LoadRiskResult, LoadStatus};
pub use power::PowerEstimator;
pub use readiness::{RaceReadiness, ReadinessClassifier};
pub use recompute::{PerformanceEngine, RecomputeOptions, RecomputeSummary};
pub use trend::{TrendAnalyzer, TrendMetric, TrendResult};
pub use vo2max::{IntervalPolicy, Vo2MaxEstimator};
pub use error::{TrailRsError, Result};
pub use logging::{LogConfig, LogLevel, LogFormat};
