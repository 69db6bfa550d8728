//! Pulse CLI - Command-line interface for Danmaku Pulse
//!
//! Commands:
//! - analyze: Compute the metric catalogue for one analysis run
//! - validate: Report per-record issues in an event stream
//! - doctor: Diagnose version and configuration
//! - schema: Print input/output schema information

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use danmaku_pulse::schema::{DanmuEvent, EventReader, SCHEMA_VERSION};
use danmaku_pulse::{
    AnalysisRun, ComputeError, EngineConfig, PulseProcessor, ReportEncoder, PRODUCER_NAME,
    PULSE_VERSION, REPORT_VERSION,
};

/// Pulse - Batch statistics engine for danmaku streams
#[derive(Parser)]
#[command(name = "pulse")]
#[command(version = PULSE_VERSION)]
#[command(about = "Compute audience-reaction metrics from danmaku streams", long_about = None)]
struct Cli {
    /// Enable debug logging (overrides RUST_LOG and the configured level)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the metric catalogue for one analysis run
    Analyze {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Platform of the analyzed video
        #[arg(long)]
        platform: String,

        /// Video identifier on the platform
        #[arg(long)]
        video_id: String,

        /// Analysis run identifier (positive)
        #[arg(long)]
        run_id: u64,

        /// Engine configuration file (TOML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,
    },

    /// Report per-record issues in an event stream
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose version and configuration
    Doctor {
        /// Check an engine configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print schema information
    Schema {
        /// Schema to print (input or output)
        #[arg(value_enum)]
        schema_type: SchemaType,

        /// Output as JSON schema
        #[arg(long)]
        json_schema: bool,
    },
}

impl Commands {
    /// Configuration the command runs with, if it takes one
    fn config_path(&self) -> Option<&Path> {
        match self {
            Commands::Analyze { config, .. } => config.as_deref(),
            _ => None,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one event per line)
    Ndjson,
    /// JSON array of events
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited metric rows
    Ndjson,
    /// Compact JSON report
    Json,
    /// Pretty-printed JSON report
    JsonPretty,
}

#[derive(Clone, ValueEnum)]
enum SchemaType {
    /// Input schema (danmu.event.v1)
    Input,
    /// Output schema (danmu.report.v1)
    Output,
}

fn init_tracing(verbose: bool, level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), PulseCliError> {
    let config = EngineConfig::load(cli.command.config_path())?;
    init_tracing(cli.verbose, &config.logging.level);

    match cli.command {
        Commands::Analyze {
            input,
            output,
            platform,
            video_id,
            run_id,
            config: _,
            input_format,
            output_format,
        } => {
            let run = AnalysisRun::new(platform, video_id, run_id);
            cmd_analyze(&input, &output, &run, config, input_format, output_format)
        }

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),

        Commands::Schema {
            schema_type,
            json_schema,
        } => cmd_schema(schema_type, json_schema),
    }
}

fn cmd_analyze(
    input: &Path,
    output: &Path,
    run: &AnalysisRun,
    config: EngineConfig,
    input_format: InputFormat,
    output_format: OutputFormat,
) -> Result<(), PulseCliError> {
    run.validate()?;

    let events = read_events(input, &input_format)?;
    tracing::debug!(events = events.len(), "read input");

    let processor = PulseProcessor::with_config(config)?;
    let report = processor.analyze(run, &events)?;

    let output_data = match output_format {
        OutputFormat::Ndjson => ReportEncoder::to_ndjson(&report)?,
        OutputFormat::Json => ReportEncoder::to_json(&report, false)? + "\n",
        OutputFormat::JsonPretty => ReportEncoder::to_json(&report, true)? + "\n",
    };

    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_validate(input: &Path, input_format: InputFormat, json: bool) -> Result<(), PulseCliError> {
    let events = read_events(input, &input_format)?;
    let results = EventReader::validate_events(&events);

    let report = ValidationReport {
        total_events: events.len(),
        clean_events: events.len() - results.len(),
        events_with_issues: results.len(),
        issues: results
            .iter()
            .flat_map(|r| {
                r.issues.iter().map(move |issue| ValidationIssueDetail {
                    index: r.index,
                    issue: issue.to_string(),
                })
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total events:       {}", report.total_events);
        println!("Clean events:       {}", report.clean_events);
        println!("Events with issues: {}", report.events_with_issues);

        if !report.issues.is_empty() {
            println!("\nIssues (affected events are skipped by the stages that need the data):");
            for detail in &report.issues {
                println!("  - index {}: {}", detail.index, detail.issue);
            }
        }
    }

    Ok(())
}

fn cmd_doctor(config_path: Option<&Path>, json: bool) -> Result<(), PulseCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "pulse_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Pulse version {}", PULSE_VERSION),
    });

    checks.push(DoctorCheck {
        name: "schema_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Input schema: {}, report schema: {}", SCHEMA_VERSION, REPORT_VERSION),
    });

    let config_check = match config_path {
        None => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: "No config file given, using defaults".to_string(),
        },
        Some(path) if !path.exists() => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Warning,
            message: format!("Config file does not exist: {}", path.display()),
        },
        Some(path) => match EngineConfig::from_file(path) {
            Ok(config) => DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: format!(
                    "Config valid (count widths {:?}, burst z {}, peak z {})",
                    config
                        .series
                        .count_widths
                        .iter()
                        .map(|w| w.get())
                        .collect::<Vec<_>>(),
                    config.burst.z_threshold,
                    config.peak.z_threshold
                ),
            },
            Err(e) => DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: e.to_string(),
            },
        },
    };
    checks.push(config_check);

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (pass input with -i <file>)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (ready for -i -)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: PULSE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Pulse Doctor Report");
        println!("===================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");
        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(PulseCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn cmd_schema(schema_type: SchemaType, json_schema: bool) -> Result<(), PulseCliError> {
    match schema_type {
        SchemaType::Input => {
            if json_schema {
                println!("{}", serde_json::to_string_pretty(&input_json_schema())?);
            } else {
                println!("Input Schema: {}", SCHEMA_VERSION);
                println!();
                println!("One audience message per record:");
                println!();
                println!("- platform, video_id: subject of the message (required)");
                println!("- video_ts: playback position in seconds (>= 0)");
                println!("- content: normalized message text");
                println!("- tokens: ordered tokens produced upstream");
                println!("- sentiment: positive | negative | neutral");
                println!("- sender: opaque, already anonymized sender id");
                println!("- danmu_type: display mode (scroll, top, bottom, other)");
                println!();
                println!("Records without video_ts or tokens are skipped by the stages");
                println!("that need them; they never fail a run.");
            }
        }
        SchemaType::Output => {
            if json_schema {
                println!("{}", serde_json::to_string_pretty(&output_json_schema())?);
            } else {
                println!("Output Schema: {}", REPORT_VERSION);
                println!();
                println!("- producer: {{ name, version, instance_id }}");
                println!("- generated_at, run: {{ platform, video_id, run_id }}, analysis_meta");
                println!("- time_series: [{{ metric_name, bucket_sec, points: [{{ bucket_start, value }}] }}]");
                println!("  danmu_count, sentiment_positive_ratio, sentiment_negative_ratio (10s, 60s)");
                println!("  cognitive_tokens_per_sec, cognitive_entropy, cognitive_unique_ratio (10s)");
                println!("- summaries: [{{ metric_name, value }}]");
                println!("  high_energy_segments, top_keywords, user_activity,");
                println!("  danmu_mention_network, danmu_bursty_tokens, danmu_user_segments,");
                println!("  danmu_type_distribution");
                println!();
                println!("With --output-format ndjson each line is a metric row tagged with");
                println!("kind = time_series | summary, platform, video_id and run_id.");
            }
        }
    }

    Ok(())
}

// Helper functions

fn read_events(input: &Path, format: &InputFormat) -> Result<Vec<DanmuEvent>, PulseCliError> {
    let input_data = if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    let events = match format {
        InputFormat::Ndjson => EventReader::parse_ndjson(&input_data)?,
        InputFormat::Json => EventReader::parse_array(&input_data)?,
    };
    Ok(events)
}

fn input_json_schema() -> serde_json::Value {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": SCHEMA_VERSION,
        "description": "Danmaku event anchored to the playback timeline",
        "type": "object",
        "required": ["platform", "video_id"],
        "properties": {
            "schema_version": { "type": "string", "const": SCHEMA_VERSION },
            "platform": { "type": "string" },
            "video_id": { "type": "string" },
            "video_ts": { "type": ["number", "null"], "minimum": 0 },
            "content": { "type": "string" },
            "tokens": { "type": "array", "items": { "type": "string" } },
            "sentiment": { "type": "string", "enum": ["positive", "negative", "neutral"] },
            "sender": { "type": "string" },
            "danmu_type": { "type": "string" }
        }
    })
}

fn output_json_schema() -> serde_json::Value {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": REPORT_VERSION,
        "description": "Danmaku Pulse metric report",
        "type": "object",
        "required": ["report_version", "producer", "generated_at", "run", "analysis_meta", "time_series", "summaries"],
        "properties": {
            "report_version": { "type": "string", "const": REPORT_VERSION },
            "producer": {
                "type": "object",
                "required": ["name", "version", "instance_id"],
                "properties": {
                    "name": { "type": "string" },
                    "version": { "type": "string" },
                    "instance_id": { "type": "string", "format": "uuid" }
                }
            },
            "generated_at": { "type": "string", "format": "date-time" },
            "run": {
                "type": "object",
                "required": ["platform", "video_id", "run_id"],
                "properties": {
                    "platform": { "type": "string" },
                    "video_id": { "type": "string" },
                    "run_id": { "type": "integer", "minimum": 1 }
                }
            },
            "analysis_meta": {
                "type": "object",
                "properties": {
                    "events_total": { "type": "integer" },
                    "events_analyzed": { "type": "integer" },
                    "events_without_timestamp": { "type": "integer" },
                    "events_without_tokens": { "type": "integer" }
                }
            },
            "time_series": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["metric_name", "bucket_sec", "points"],
                    "properties": {
                        "metric_name": { "type": "string" },
                        "bucket_sec": { "type": "integer", "minimum": 1 },
                        "points": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "required": ["bucket_start", "value"],
                                "properties": {
                                    "bucket_start": { "type": "integer" },
                                    "value": { "type": "number" }
                                }
                            }
                        }
                    }
                }
            },
            "summaries": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["metric_name", "value"],
                    "properties": {
                        "metric_name": { "type": "string" },
                        "value": { "type": "object" }
                    }
                }
            }
        }
    })
}

#[derive(serde::Serialize)]
struct ValidationReport {
    total_events: usize,
    clean_events: usize,
    events_with_issues: usize,
    issues: Vec<ValidationIssueDetail>,
}

#[derive(serde::Serialize)]
struct ValidationIssueDetail {
    index: usize,
    issue: String,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

// Error handling

#[derive(Debug)]
enum PulseCliError {
    Io(io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    DoctorFailed,
}

impl From<io::Error> for PulseCliError {
    fn from(e: io::Error) -> Self {
        PulseCliError::Io(e)
    }
}

impl From<ComputeError> for PulseCliError {
    fn from(e: ComputeError) -> Self {
        PulseCliError::Compute(e)
    }
}

impl From<serde_json::Error> for PulseCliError {
    fn from(e: serde_json::Error) -> Self {
        PulseCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<PulseCliError> for CliError {
    fn from(e: PulseCliError) -> Self {
        match e {
            PulseCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            PulseCliError::Compute(e) => {
                let (code, hint) = match &e {
                    ComputeError::InvalidRun(_) => (
                        "INVALID_RUN",
                        "Pass a positive --run-id and non-empty --platform/--video-id",
                    ),
                    ComputeError::InvalidConfig(_)
                    | ComputeError::ConfigParse(_)
                    | ComputeError::InvalidBucketWidth(_) => {
                        ("CONFIG_ERROR", "Run 'pulse doctor --config <file>' for details")
                    }
                    ComputeError::Io(_) => ("IO_ERROR", "Check file paths and permissions"),
                    _ => (
                        "PARSE_ERROR",
                        "Ensure input matches the danmu.event.v1 schema ('pulse schema input')",
                    ),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            PulseCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            PulseCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: None,
            },
        }
    }
}
