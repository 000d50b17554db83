//! Burnout Sentinel CLI
//!
//! Burnout-risk scoring and ranked interventions from calendar and task data.

use burnout_sentinel::{
    analyzer::{AnalysisRequest, Analyzer},
    calendar::{
        demo_tasks, now_wall_clock, CalendarAggregator, CalendarEvent, CalendarFeed,
        CalendarProvider, CalendarSelection, DataOrigin, StaticCalendarProvider, Task,
        MAX_DAYS_AHEAD,
    },
    config::Config,
    core::BurnoutAssessment,
    logging, VERSION,
};
use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "burnout-sentinel")]
#[command(version = VERSION)]
#[command(about = "Burnout-risk scoring and ranked interventions from calendar and task data", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Use this configuration file instead of the default one
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze calendars and tasks
    Analyze {
        /// JSON input with calendars, events and tasks (demo data if omitted)
        #[arg(long, short)]
        input: Option<PathBuf>,

        /// Calendars to analyze, comma separated
        #[arg(long)]
        calendars: Option<String>,

        /// Days of events to fetch
        #[arg(long)]
        days_ahead: Option<u32>,

        /// Never call the generative service
        #[arg(long)]
        offline: bool,

        /// Print the assessment as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the calendars found in an input file
    Sources {
        #[arg(long, short)]
        input: Option<PathBuf>,
    },

    /// Serve the HTTP API
    #[cfg(feature = "server")]
    Serve {
        #[arg(long, default_value = "8787")]
        port: u16,

        /// Calendars to serve (demo data if omitted)
        #[arg(long, short)]
        input: Option<PathBuf>,

        #[arg(long)]
        offline: bool,
    },

    /// Show configuration
    Config,
}

/// Contents of an `--input` file.
///
/// `events` bypasses calendar selection entirely; otherwise events come from
/// the selected `calendars`.
#[derive(Debug, Default, Deserialize)]
struct InputFile {
    #[serde(default)]
    calendars: Vec<CalendarFeed>,
    #[serde(default)]
    events: Option<Vec<CalendarEvent>>,
    #[serde(default)]
    tasks: Vec<Task>,
}

impl InputFile {
    fn read(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Could not read {}: {e}", path.display()))?;
        serde_json::from_str(&content).map_err(|e| format!("Invalid input {}: {e}", path.display()))
    }

    fn provider(&self) -> StaticCalendarProvider {
        if self.calendars.is_empty() {
            StaticCalendarProvider::disconnected()
        } else {
            StaticCalendarProvider::from_feeds(self.calendars.clone())
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_logger(cli.verbose);

    let config = load_config(cli.config.as_deref());

    match cli.command {
        Commands::Analyze {
            input,
            calendars,
            days_ahead,
            offline,
            json,
        } => {
            cmd_analyze(&config, input, calendars, days_ahead, offline, json).await;
        }
        Commands::Sources { input } => {
            cmd_sources(input).await;
        }
        #[cfg(feature = "server")]
        Commands::Serve {
            port,
            input,
            offline,
        } => {
            cmd_serve(config, port, input, offline).await;
        }
        Commands::Config => {
            cmd_config(&config, cli.config.as_deref());
        }
    }
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {message}");
    std::process::exit(1);
}

fn load_config(path: Option<&Path>) -> Config {
    let result = match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    result.unwrap_or_else(|e| fail(e))
}

fn read_input(input: Option<PathBuf>) -> Option<InputFile> {
    input.map(|path| InputFile::read(&path).unwrap_or_else(|e| fail(e)))
}

fn current_time(config: &Config) -> NaiveDateTime {
    let zone = config.zone().unwrap_or_else(|e| fail(e));
    now_wall_clock(zone)
}

async fn cmd_analyze(
    config: &Config,
    input: Option<PathBuf>,
    calendars: Option<String>,
    days_ahead: Option<u32>,
    offline: bool,
    json: bool,
) {
    let now = current_time(config);
    let input = read_input(input);

    let (selection, days_ahead) =
        resolve_fetch(config, calendars.as_deref(), days_ahead).unwrap_or_else(|e| fail(e));

    let (request, origin) = match input {
        Some(InputFile {
            events: Some(events),
            tasks,
            ..
        }) => (AnalysisRequest::new(events, tasks), None),
        Some(file) => {
            let provider = file.provider();
            let aggregated = CalendarAggregator::new(days_ahead)
                .collect(&provider, &selection, now)
                .await;
            let tasks = if file.tasks.is_empty() && aggregated.origin == DataOrigin::Demo {
                demo_tasks(now)
            } else {
                file.tasks
            };
            for source in &aggregated.failed_sources {
                eprintln!("Warning: calendar '{source}' could not be loaded");
            }
            (
                AnalysisRequest::new(aggregated.events, tasks),
                Some(aggregated.origin),
            )
        }
        None => {
            let aggregated = CalendarAggregator::new(days_ahead)
                .collect(&StaticCalendarProvider::disconnected(), &selection, now)
                .await;
            (
                AnalysisRequest::new(aggregated.events, demo_tasks(now)),
                Some(DataOrigin::Demo),
            )
        }
    };

    let analyzer = Analyzer::from_config(config, offline).unwrap_or_else(|e| fail(e));
    let assessment = analyzer.analyze(&request, now).await;

    if json {
        match serde_json::to_string_pretty(&assessment) {
            Ok(out) => println!("{out}"),
            Err(e) => fail(e),
        }
        return;
    }

    print_report(&assessment, origin);
}

/// Calendar selection and fetch horizon from the CLI flags, falling back to
/// the configuration.
fn resolve_fetch(
    config: &Config,
    calendars: Option<&str>,
    days_ahead: Option<u32>,
) -> Result<(CalendarSelection, u32), String> {
    let selection = match calendars {
        Some(csv) => CalendarSelection::from_csv(csv).map_err(|e| format!("--calendars: {e}"))?,
        None => config.default_selection.clone(),
    };
    let days_ahead = days_ahead.unwrap_or(config.days_ahead);
    if !(1..=MAX_DAYS_AHEAD).contains(&days_ahead) {
        return Err(format!(
            "--days-ahead must be between 1 and {MAX_DAYS_AHEAD}, got {days_ahead}"
        ));
    }
    Ok((selection, days_ahead))
}

fn print_report(assessment: &BurnoutAssessment, origin: Option<DataOrigin>) {
    let score = &assessment.stress_score;
    let factors = &assessment.factors;

    println!("Burnout Sentinel v{VERSION}");
    println!("==========================");
    println!();
    if origin == Some(DataOrigin::Demo) {
        println!("(No calendar connected: showing demo data)");
        println!();
    }

    println!(
        "Stress score: {}/100 ({} risk)",
        score.total_score, score.risk_level
    );
    println!("  Calendar: {:.0}", score.calendar_factor);
    println!("  Tasks:    {:.0}", score.task_factor);
    println!("  Sleep:    {:.0}", score.sleep_factor);
    println!();

    println!("Factors:");
    println!("  Events in the next 7 days: {}", factors.events_next_7_days);
    println!("  Overdue tasks: {}", factors.overdue_tasks);
    println!("  High-priority tasks: {}", factors.high_priority_tasks);
    println!(
        "  Calendar density: {:.0}%",
        factors.calendar_density * 100.0
    );
    println!(
        "  Sleep available: {:.1}h ({})",
        factors.sleep_hours_available, factors.sleep_quality_message
    );
    println!(
        "  Average break: {:.0} min",
        factors.average_break_length
    );

    if let Some(comparison) = &assessment.historical_comparison {
        println!();
        println!("{comparison}");
    }

    println!();
    println!("Predictions:");
    for prediction in &assessment.predictions {
        println!("  - {prediction}");
    }

    println!();
    println!("Suggested interventions:");
    for (i, intervention) in assessment.interventions.iter().enumerate() {
        println!(
            "  {}. [{}] {} (impact {:.0}, effort {:.0})",
            i + 1,
            intervention.kind.as_str(),
            intervention.title,
            intervention.impact_score,
            intervention.effort_score
        );
        println!("     {}", intervention.description);
    }
    if assessment.interventions.is_empty() {
        println!("  (none)");
    }

    if !assessment.malformed_event_ids.is_empty() {
        println!();
        println!(
            "Ignored events ending before they start: {}",
            assessment.malformed_event_ids.join(", ")
        );
    }
}

async fn cmd_sources(input: Option<PathBuf>) {
    let provider = read_input(input).unwrap_or_default().provider();

    println!("Calendar Sources");
    println!("================");
    println!();

    match provider.list_sources().await {
        Ok(sources) => {
            for source in sources {
                println!(
                    "  {}{} ({})",
                    source.id,
                    if source.primary { " [primary]" } else { "" },
                    source.display_name
                );
            }
        }
        Err(e) => {
            println!("{e}. Analyses will use demo data.");
        }
    }
}

#[cfg(feature = "server")]
async fn cmd_serve(config: Config, port: u16, input: Option<PathBuf>, offline: bool) {
    use burnout_sentinel::server::{run, ServerConfig};
    use std::sync::Arc;

    let provider = read_input(input).unwrap_or_default().provider();
    let mut server_config = ServerConfig::new(port, config);
    if offline {
        server_config = server_config.offline();
    }

    let (addr, shutdown_tx) = run(server_config, Arc::new(provider))
        .await
        .unwrap_or_else(|e| fail(e));

    println!("Burnout Sentinel v{VERSION} listening on http://{addr}");
    println!("Press Ctrl+C to stop.");

    if let Err(e) = tokio::signal::ctrl_c().await {
        eprintln!("Warning: could not listen for Ctrl+C: {e}");
    }
    let _ = shutdown_tx.send(());
}

fn cmd_config(config: &Config, path: Option<&Path>) {
    println!("Configuration");
    println!("=============");
    println!();
    match path {
        Some(path) => println!("Config file: {:?}", path),
        None => println!("Config file: {:?}", Config::config_path()),
    }
    println!(
        "Generative service: {}",
        if config.generative.is_configured() {
            "configured"
        } else {
            "not configured (deterministic predictions)"
        }
    );
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(config).unwrap_or_else(|_| "Error".to_string())
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_flags_default_to_config() {
        let config = Config::default();
        let (selection, days) = resolve_fetch(&config, None, None).unwrap();
        assert_eq!(selection, config.default_selection);
        assert_eq!(days, 7);

        let (selection, days) = resolve_fetch(&config, Some("work, school"), Some(14)).unwrap();
        assert!(selection.contains("work") && selection.contains("school"));
        assert_eq!(days, 14);
    }

    #[test]
    fn test_empty_calendars_flag_is_rejected() {
        let err = resolve_fetch(&Config::default(), Some(","), None).unwrap_err();
        assert!(err.starts_with("--calendars"));
    }

    #[test]
    fn test_days_ahead_flag_is_bounded() {
        let config = Config::default();
        assert!(resolve_fetch(&config, None, Some(0)).is_err());
        assert!(resolve_fetch(&config, None, Some(u32::MAX)).is_err());
        assert!(resolve_fetch(&config, None, Some(MAX_DAYS_AHEAD)).is_ok());
    }
}
