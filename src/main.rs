use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use clap::{Parser, Subcommand};
use colored::*;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tabled::{settings::Style, Table, Tabled};
use tracing::{error, warn};

use trailrs::climb::effective_vam;
use trailrs::config::EngineConfig;
use trailrs::error::TrailRsError;
use trailrs::import::{self, ImportManager};
use trailrs::load::{validate_week_start, LoadStatus};
use trailrs::logging::init_logging;
use trailrs::recompute::{PerformanceEngine, RecomputeOptions, RecomputeSummary};
use trailrs::trend::{TrendAlert, TrendMetric};
use trailrs::units::format_pace;
use trailrs::vo2max::{absolute_vo2_l_min, active_kcal};
use trailrs::zones::karvonen_thresholds;
use trailrs::{ActivityHistory, ActivityRecord, AthleteProfile, SensorStream};

/// TrailRS - Endurance Performance Analytics CLI
///
/// Estimates VO2max, climbing speed, training load balance and race
/// readiness from activity summaries and optional sensor streams.
#[derive(Parser)]
#[command(name = "trailrs")]
#[command(author = "TrailRS Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Endurance performance analytics CLI", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recompute derived metrics and the athlete's VO2max baseline
    Estimate {
        /// Activity file (JSON or CSV)
        #[arg(short, long)]
        activities: PathBuf,

        /// Athlete profile (JSON or TOML)
        #[arg(short, long)]
        profile: PathBuf,

        /// Sensor streams keyed by activity id (JSON)
        #[arg(short, long)]
        streams: Option<PathBuf>,

        /// Write the updated profile and activities as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compare the latest sessions with the ones before them
    Trend {
        /// Activity file (JSON or CSV)
        #[arg(short, long)]
        activities: PathBuf,

        /// Only sessions before this date count (YYYY-MM-DD or RFC 3339)
        #[arg(long, value_parser = parse_time)]
        as_of: Option<DateTime<Utc>>,
    },

    /// Acute:chronic workload ratio and weekly load
    Load {
        /// Activity file (JSON or CSV)
        #[arg(short, long)]
        activities: PathBuf,

        /// Reference time (default: now)
        #[arg(long, value_parser = parse_time)]
        at: Option<DateTime<Utc>>,

        /// Report the week starting on this date instead
        #[arg(short, long, value_parser = parse_time)]
        week_start: Option<DateTime<Utc>>,

        /// Athlete profile, used for the weekly intensity band
        #[arg(short, long)]
        profile: Option<PathBuf>,
    },

    /// Race distance the recent training volume supports
    Readiness {
        /// Activity file (JSON or CSV)
        #[arg(short, long)]
        activities: PathBuf,

        /// Classification time (default: now)
        #[arg(long, value_parser = parse_time)]
        now: Option<DateTime<Utc>>,
    },
}

#[derive(Tabled)]
struct ActivityRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Km")]
    distance: String,
    #[tabled(rename = "Pace")]
    pace: String,
    #[tabled(rename = "HR")]
    heart_rate: String,
    #[tabled(rename = "VO2max")]
    vo2max: String,
    #[tabled(rename = "VAM")]
    vam: String,
    #[tabled(rename = "EF")]
    efficiency: String,
    #[tabled(rename = "eVO2")]
    effective_vo2: String,
    #[tabled(rename = "Power")]
    power: String,
    #[tabled(rename = "kcal")]
    kcal: String,
}

#[derive(Tabled)]
struct TrendRow {
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Change")]
    change: String,
}

#[derive(Serialize)]
struct EstimateReport<'a> {
    profile: &'a AthleteProfile,
    summary: &'a RecomputeSummary,
    activities: &'a [ActivityRecord],
}

fn main() {
    if let Err(err) = run() {
        let message = match err.downcast_ref::<TrailRsError>() {
            Some(trail_err) => {
                trail_err.log();
                trail_err.user_message()
            }
            None => {
                error!("{:#}", err);
                format!("{:#}", err)
            }
        };
        eprintln!("{} {}", "Error:".red().bold(), message);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::load_from_file(path)?,
        None => EngineConfig::load_or_default(),
    };
    init_logging(&config.logging.clone().with_verbosity(cli.verbose))?;

    let engine = PerformanceEngine::from_config(&config);
    let importer = ImportManager::new();

    match cli.command {
        Commands::Estimate {
            activities,
            profile,
            streams,
            output,
        } => {
            let mut history = importer.import_history(&activities)?;
            let mut profile = import::load_profile(&profile)?;
            let streams = match streams {
                Some(path) => import::load_streams(&path)?,
                None => HashMap::new(),
            };
            run_estimate(&engine, &mut history, &streams, &mut profile, output.as_deref())?;
        }

        Commands::Trend { activities, as_of } => {
            let history = importer.import_history(&activities)?;
            run_trend(&engine, &history, as_of);
        }

        Commands::Load {
            activities,
            at,
            week_start,
            profile,
        } => {
            let at = at.unwrap_or_else(Utc::now);
            if let Some(start) = week_start {
                validate_week_start(start, at)?;
            }
            let history = importer.import_history(&activities)?;
            let profile = profile.map(|path| import::load_profile(&path)).transpose()?;
            run_load(&engine, &history, profile.as_ref(), at, week_start);
        }

        Commands::Readiness { activities, now } => {
            let history = importer.import_history(&activities)?;
            let now = now.unwrap_or_else(Utc::now);
            let assessment = engine.readiness.assess(&history, now);

            println!("{}", "Race readiness".cyan().bold());
            println!("  Category: {}", assessment.category.to_string().bold());
            println!("  Sessions: {}", assessment.sessions);
            println!("  Weekly volume: {:.1} km", assessment.avg_weekly_km);
            println!("  Longest run: {:.1} km", assessment.longest_run_km);
        }
    }

    Ok(())
}

fn run_estimate(
    engine: &PerformanceEngine,
    history: &mut ActivityHistory,
    streams: &HashMap<String, SensorStream>,
    profile: &mut AthleteProfile,
    output: Option<&Path>,
) -> Result<()> {
    if profile.configured_weight().is_none() {
        let default_kg = engine.weight_for(profile);
        warn!(athlete = %profile.id, default_kg, "weight not configured, using default");
        eprintln!(
            "{}",
            format!(
                "⚠ No weight configured for {}: energy figures use {:.0} kg, power is not estimated",
                profile.id, default_kg
            )
            .yellow()
        );
    }

    for record in history.records() {
        if engine.climb.needs_stream(record) && !streams.contains_key(&record.id) {
            warn!(activity = %record.id, "no sensor stream for a hilly trail run");
        }
    }

    let summary = engine.recompute_athlete(history, streams, profile, RecomputeOptions::default());
    let profile: &AthleteProfile = profile;
    let weight_kg = engine.weight_for(profile);

    let rows: Vec<ActivityRow> = history
        .records()
        .iter()
        .map(|record| ActivityRow {
            date: record.timestamp.format("%Y-%m-%d").to_string(),
            kind: format!("{:?}", record.activity_kind),
            distance: format!("{:.1}", record.distance_km()),
            pace: record
                .avg_speed_m_s()
                .map(format_pace)
                .unwrap_or_else(|| "-".to_string()),
            heart_rate: record
                .avg_hr
                .map(|hr| hr.to_string())
                .unwrap_or_else(|| "-".to_string()),
            vo2max: show(record.vo2max_estimate, 1),
            vam: show(effective_vam(record), 0),
            efficiency: show(engine.efficiency.efficiency_factor(record), 2),
            effective_vo2: show(engine.efficiency.effective_vo2max(record, profile), 1),
            power: show(record.power_w(), 0),
            kcal: show(
                engine
                    .vo2max
                    .activity_vo2(record)
                    .map(|vo2| active_kcal(vo2, weight_kg, record.duration_s)),
                0,
            ),
        })
        .collect();

    println!("{}", Table::new(rows).with(Style::rounded()));
    println!("{}", summary.to_string_pretty());

    if let Some(vo2max) = profile.historical_vo2max_estimate {
        println!(
            "  Absolute VO2max: {:.2} L/min",
            absolute_vo2_l_min(vo2max, weight_kg)
        );
    }
    if let Some(thresholds) = karvonen_thresholds(profile) {
        println!(
            "  Thresholds: aerobic {} bpm, anaerobic {} bpm",
            thresholds.aerobic_bpm, thresholds.anaerobic_bpm
        );
    }

    if let Some(path) = output {
        let report = EstimateReport {
            profile,
            summary: &summary,
            activities: history.records(),
        };
        import::save_json(path, &report)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        println!("{}", format!("✓ Report written to {}", path.display()).green());
    }

    Ok(())
}

fn run_trend(engine: &PerformanceEngine, history: &ActivityHistory, as_of: Option<DateTime<Utc>>) {
    let result = engine.trend.trend(history, as_of);
    if result.is_empty() {
        println!("{}", "Not enough sessions for a trend".yellow());
        return;
    }

    let rows: Vec<TrendRow> = TrendMetric::ALL
        .iter()
        .filter_map(|metric| {
            result.get(*metric).map(|percent| TrendRow {
                metric: metric.to_string(),
                change: format!("{:+.1}%", percent),
            })
        })
        .collect();

    println!("{}", Table::new(rows).with(Style::rounded()));
    println!(
        "  Avg HR: {} bpm recent, {} bpm before",
        result.recent_avg_hr, result.historical_avg_hr
    );

    for alert in engine.trend.alerts(&result) {
        let message = match alert {
            TrendAlert::HeartRateDrift { percent } => {
                format!("⚠ Heart rate up {:.1}%: possible fatigue", percent)
            }
            TrendAlert::EfficiencyDrop { percent } => {
                format!("⚠ VO2max down {:.1}%: check recovery", percent.abs())
            }
        };
        println!("{}", message.yellow());
    }
}

fn run_load(
    engine: &PerformanceEngine,
    history: &ActivityHistory,
    profile: Option<&AthleteProfile>,
    at: DateTime<Utc>,
    week_start: Option<DateTime<Utc>>,
) {
    let acwr = match week_start {
        Some(start) => engine.load.acwr_for_week(history, start, at),
        None => engine.load.acwr(history, at),
    };

    println!("{}", "Training load".cyan().bold());
    match acwr {
        Some(result) => {
            let status = match result.status {
                LoadStatus::HighInjuryRisk => result.status.to_string().red().bold(),
                LoadStatus::Detraining => result.status.to_string().yellow(),
                LoadStatus::NoAlert => result.status.to_string().green(),
            };
            println!("  ACWR: {:.2} ({})", result.ratio, status);
            println!("  Acute load: {:.1} km-effort", result.acute_load);
            println!("  Chronic weekly load: {:.1} km-effort", result.chronic_avg_load);
        }
        None => println!("  {}", "Chronic base too small for a ratio".dimmed()),
    }

    if let Some(start) = week_start {
        let anonymous = AthleteProfile::new("unknown", "");
        let summary = engine
            .load
            .weekly_summary(history, profile.unwrap_or(&anonymous), start, at);
        println!(
            "  Week of {}: {} sessions, {:.1} km, {} m D+, score {:.1} ({})",
            summary.week_start.format("%Y-%m-%d"),
            summary.sessions,
            summary.distance_km,
            summary.elevation_gain_m,
            summary.score,
            summary.intensity
        );
    }
}

fn show(value: Option<f64>, decimals: usize) -> String {
    value
        .map(|v| format!("{:.*}", decimals, v))
        .unwrap_or_else(|| "-".to_string())
}

/// Parse RFC 3339 or a plain date taken as midnight UTC
fn parse_time(value: &str) -> std::result::Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| format!("expected YYYY-MM-DD or RFC 3339, got '{}'", value))
}
