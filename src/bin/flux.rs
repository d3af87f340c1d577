//! Flux CLI - Command-line interface for Gesture Flux
//!
//! Commands:
//! - run: Evaluate gesture.frame.v1 records streamed on stdin (streaming mode)
//! - transform: Evaluate a file of records and write frame reports (batch mode)
//! - validate: Validate gesture.frame.v1 records
//! - doctor: Diagnose configuration and pipeline health
//! - schema: Print input/output schema information
//! - config: Print the default configuration

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::{json, Value};
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use gesture_flux::config::FluxConfig;
use gesture_flux::encoder::{ReportEncoder, ReportEnvelope, REPORT_VERSION};
use gesture_flux::pipeline::FrameAnalyzer;
use gesture_flux::schema::{FrameRecord, FrameRecordAdapter, SCHEMA_VERSION};
use gesture_flux::types::{BehaviorKind, FrameReport, LandmarkPayload, SessionKey, Signal};
use gesture_flux::{FluxError, FLUX_VERSION, PRODUCER_NAME};

/// Flux - Turn body, hand and face landmarks into debounced behavior events
#[derive(Parser)]
#[command(name = "flux")]
#[command(version = FLUX_VERSION)]
#[command(about = "Detect hand raises, sway and eye touches in landmark streams", long_about = None)]
struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate records from stdin (streaming mode); bad lines are logged and skipped
    Run {
        /// Analyzer configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Flush output after each record
        #[arg(long, default_value = "true")]
        flush: bool,
    },

    /// Evaluate records from a file (batch mode)
    Transform {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long)]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Analyzer configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Write final counters and emotion summaries per session
        #[arg(long)]
        summary: Option<PathBuf>,
    },

    /// Validate gesture.frame.v1 records
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

    /// Diagnose configuration and pipeline health
    Doctor {
        /// Check this configuration file
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

    /// Print the default configuration as JSON
    Config,
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one record per line)
    Ndjson,
    /// JSON array of records
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one report per line)
    Ndjson,
    /// JSON array of reports
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[derive(Clone, ValueEnum)]
enum SchemaType {
    /// Input schema (gesture.frame.v1)
    Input,
    /// Output schema (frame report)
    Output,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let error = json!({ "code": e.code(), "message": e.to_string(), "hint": e.hint() });
            eprintln!("{error}");
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so NDJSON on stdout stays clean
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .target(env_logger::Target::Stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), CliFailure> {
    match cli.command {
        Commands::Run {
            config,
            output_format,
            flush,
        } => cmd_run(config.as_deref(), output_format, flush),

        Commands::Transform {
            input,
            output,
            input_format,
            output_format,
            config,
            summary,
        } => cmd_transform(
            &input,
            &output,
            input_format,
            output_format,
            config.as_deref(),
            summary.as_deref(),
        ),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),

        Commands::Schema { schema_type, json_schema } => {
            let schema = match schema_type {
                SchemaType::Input => input_json_schema(),
                SchemaType::Output => output_json_schema(),
            };
            if json_schema {
                println!("{schema}");
            } else {
                print_schema_outline(&schema);
            }
            Ok(())
        }

        Commands::Config => {
            println!("{}", FluxConfig::default().to_json()?);
            Ok(())
        }
    }
}

fn load_analyzer(config: Option<&Path>) -> Result<FrameAnalyzer, CliFailure> {
    let config = match config {
        Some(path) => FluxConfig::from_file(path)?,
        None => FluxConfig::default(),
    };
    Ok(FrameAnalyzer::new(config)?)
}

fn read_input(input: &Path) -> Result<String, CliFailure> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn parse_records(data: &str, format: &InputFormat) -> Result<Vec<FrameRecord>, CliFailure> {
    Ok(match format {
        InputFormat::Ndjson => FrameRecordAdapter::parse_ndjson(data)?,
        InputFormat::Json => FrameRecordAdapter::parse_array(data)?,
    })
}

fn cmd_run(
    config: Option<&Path>,
    output_format: OutputFormat,
    flush: bool,
) -> Result<(), CliFailure> {
    let analyzer = load_analyzer(config)?;
    let encoder = ReportEncoder::new();

    if atty::is(atty::Stream::Stdin) {
        log::warn!("reading records from a terminal; pipe NDJSON into `flux run`");
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut collected: Vec<ReportEnvelope<FrameReport>> = Vec::new();
    let mut skipped = 0usize;

    for (line_num, line) in stdin.lock().lines().enumerate() {
        let line = line?;
        let report = match analyzer.evaluate_line(&line) {
            Ok(Some(report)) => report,
            Ok(None) => continue,
            Err(e) => {
                skipped += 1;
                log::warn!("line {}: skipped record: {e}", line_num + 1);
                continue;
            }
        };
        let envelope = encoder.encode_frame(&report);

        match output_format {
            OutputFormat::Ndjson => {
                writeln!(stdout, "{}", serde_json::to_string(&envelope)?)?;
                if flush {
                    stdout.flush()?;
                }
            }
            OutputFormat::Json | OutputFormat::JsonPretty => collected.push(envelope),
        }
    }

    if !collected.is_empty() {
        write!(stdout, "{}", format_output(&collected, &output_format)?)?;
    }
    stdout.flush()?;

    if skipped > 0 {
        log::warn!("{skipped} record(s) skipped");
    }
    log::info!("stream closed with {} live session(s)", analyzer.session_count());
    Ok(())
}

fn cmd_transform(
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    config: Option<&Path>,
    summary: Option<&Path>,
) -> Result<(), CliFailure> {
    let analyzer = load_analyzer(config)?;
    let encoder = ReportEncoder::new();

    let records = parse_records(&read_input(input)?, &input_format)?;
    if records.is_empty() {
        return Err(CliFailure::NoRecords);
    }

    let reports = records
        .into_iter()
        .map(|record| -> Result<_, FluxError> {
            Ok(encoder.encode_frame(&analyzer.evaluate_record(record)?))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if let Some(summary_path) = summary {
        let summaries: Vec<_> = analyzer
            .session_keys()
            .iter()
            .filter_map(|key| analyzer.summary(key))
            .map(|s| encoder.encode_summary(&s))
            .collect();
        fs::write(summary_path, serde_json::to_string_pretty(&summaries)?)?;
    }

    let output_data = format_output(&reports, &output_format)?;
    if output.to_string_lossy() == "-" {
        print!("{output_data}");
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

#[derive(Serialize)]
struct InvalidRecord {
    index: usize,
    session_key: String,
    error: String,
}

fn cmd_validate(input: &Path, input_format: InputFormat, json: bool) -> Result<(), CliFailure> {
    let records = parse_records(&read_input(input)?, &input_format)?;
    let invalid: Vec<InvalidRecord> = FrameRecordAdapter::validate_records(&records)
        .into_iter()
        .map(|r| InvalidRecord {
            index: r.index,
            session_key: r.session_key.to_string(),
            error: r.error.to_string(),
        })
        .collect();
    let valid = records.len() - invalid.len();

    if json {
        let report = json!({
            "total_records": records.len(),
            "valid_records": valid,
            "invalid_records": invalid.len(),
            "errors": invalid,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{valid}/{} records valid", records.len());
        for r in &invalid {
            println!("  #{} [{}] {}", r.index, r.session_key, r.error);
        }
    }

    match invalid.len() {
        0 => Ok(()),
        n => Err(CliFailure::ValidationFailed(n)),
    }
}

#[derive(Serialize, PartialEq)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Ok,
    Warn,
    Error,
}

#[derive(Serialize)]
struct Check {
    name: &'static str,
    status: CheckStatus,
    message: String,
}

impl Check {
    fn new(name: &'static str, status: CheckStatus, message: impl Into<String>) -> Self {
        Self {
            name,
            status,
            message: message.into(),
        }
    }
}

fn cmd_doctor(config: Option<&Path>, json: bool) -> Result<(), CliFailure> {
    let mut checks = vec![Check::new(
        "versions",
        CheckStatus::Ok,
        format!("flux {FLUX_VERSION}, input {SCHEMA_VERSION}, report {REPORT_VERSION}"),
    )];

    let loaded = match config {
        Some(path) if !path.exists() => {
            checks.push(Check::new(
                "config",
                CheckStatus::Warn,
                format!("{} not found, defaults apply", path.display()),
            ));
            Ok(FluxConfig::default())
        }
        Some(path) => FluxConfig::from_file(path),
        None => Ok(FluxConfig::default()),
    };

    match loaded.and_then(FrameAnalyzer::new) {
        Ok(analyzer) => {
            let thresholds: Vec<String> = BehaviorKind::ALL
                .iter()
                .map(|&kind| format!("{kind}={}", analyzer.config().behavior(kind).trigger_threshold))
                .collect();
            checks.push(Check::new("config", CheckStatus::Ok, thresholds.join(" ")));
            checks.push(pipeline_check(&analyzer));
        }
        Err(e) => checks.push(Check::new("config", CheckStatus::Error, e.to_string())),
    }

    if json {
        let report = json!({ "producer": PRODUCER_NAME, "version": FLUX_VERSION, "checks": checks });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for check in &checks {
            let label = match check.status {
                CheckStatus::Ok => "ok",
                CheckStatus::Warn => "warn",
                CheckStatus::Error => "FAIL",
            };
            println!("{label:>4}  {:<8} {}", check.name, check.message);
        }
    }

    if checks.iter().any(|c| c.status == CheckStatus::Error) {
        Err(CliFailure::DoctorFailed)
    } else {
        Ok(())
    }
}

/// A frame without landmarks must be declined by every detector
fn pipeline_check(analyzer: &FrameAnalyzer) -> Check {
    let report = analyzer.evaluate_frame_all(
        &SessionKey::from("doctor"),
        0.0,
        LandmarkPayload::default(),
        &BehaviorKind::ALL,
    );
    analyzer.end_session(&report.session_key);

    if report.evaluations.iter().all(|e| e.signal == Signal::Declined) {
        Check::new(
            "pipeline",
            CheckStatus::Ok,
            format!("{} detectors decline empty frames", report.evaluations.len()),
        )
    } else {
        Check::new("pipeline", CheckStatus::Error, "a detector signalled without landmarks")
    }
}

fn format_output(
    reports: &[ReportEnvelope<FrameReport>],
    format: &OutputFormat,
) -> Result<String, CliFailure> {
    let mut out = match format {
        OutputFormat::Ndjson => reports
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?
            .join("\n"),
        OutputFormat::Json => serde_json::to_string(reports)?,
        OutputFormat::JsonPretty => serde_json::to_string_pretty(reports)?,
    };
    out.push('\n');
    Ok(out)
}

/// Top-level fields of a JSON schema, one per line, required ones marked `*`
fn print_schema_outline(schema: &Value) {
    let title = schema["title"].as_str().unwrap_or_default();
    let description = schema["description"].as_str().unwrap_or_default();
    println!("{title}: {description}");

    let required: Vec<&str> = schema["required"]
        .as_array()
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    if let Some(properties) = schema["properties"].as_object() {
        for (name, property) in properties {
            let marker = if required.contains(&name.as_str()) { "*" } else { " " };
            let kind = property["type"].as_str().unwrap_or("any");
            println!("  {marker} {name}: {kind}");
        }
    }
}

fn behavior_names() -> Vec<&'static str> {
    BehaviorKind::ALL.iter().map(|k| k.as_str()).collect()
}

fn input_json_schema() -> Value {
    let point = json!({
        "type": "array",
        "items": { "type": "number" },
        "minItems": 3,
        "maxItems": 3
    });
    let landmark_set = json!({ "type": "array", "items": point });

    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": SCHEMA_VERSION,
        "description": "One video frame of landmarks for one user",
        "type": "object",
        "required": ["schema_version", "user_id", "timestamp"],
        "properties": {
            "schema_version": { "type": "string", "const": SCHEMA_VERSION },
            "room_id": { "type": "string" },
            "user_id": { "type": "string", "minLength": 1 },
            "timestamp": { "type": "number" },
            "behaviors": {
                "type": "array",
                "items": { "type": "string", "enum": behavior_names() }
            },
            "landmarks": {
                "type": "object",
                "properties": {
                    "pose": landmark_set,
                    "face": landmark_set,
                    "hands": { "type": "array", "items": landmark_set }
                }
            },
            "emotion": {
                "type": "object",
                "additionalProperties": { "type": "number" }
            }
        }
    })
}

fn output_json_schema() -> Value {
    let counters = json!({
        "type": "object",
        "properties": {
            "raw_count": { "type": "integer" },
            "event_count": { "type": "integer" }
        }
    });

    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "frame report",
        "description": format!("Gesture Flux per-frame behavior report {REPORT_VERSION}"),
        "type": "object",
        "required": ["report_version", "producer", "computed_at_utc", "session_key", "timestamp", "actions", "counters", "evaluations"],
        "properties": {
            "report_version": { "type": "string" },
            "producer": {
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "version": { "type": "string" },
                    "instance_id": { "type": "string" }
                }
            },
            "computed_at_utc": { "type": "string", "format": "date-time" },
            "session_key": { "type": "string" },
            "timestamp": { "type": "number" },
            "actions": {
                "type": "object",
                "additionalProperties": { "type": "integer", "enum": [0, 1] }
            },
            "counters": { "type": "object", "additionalProperties": counters },
            "evaluations": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "kind": { "type": "string", "enum": behavior_names() },
                        "admission": { "type": "string", "enum": ["accepted", "rejected"] },
                        "signal": { "type": "string", "enum": ["declined", "negative", "positive"] },
                        "raw_signal": { "type": "boolean" },
                        "event_fired": { "type": "boolean" },
                        "raw_count": { "type": "integer" },
                        "event_count": { "type": "integer" }
                    }
                }
            },
            "emotion": {
                "type": "object",
                "properties": {
                    "label": { "type": "string" },
                    "display": { "type": "string" },
                    "percentage": { "type": "number" }
                }
            }
        }
    })
}

/// Failure of a CLI command, printed to stderr as `{code, message, hint}`
#[derive(Debug, thiserror::Error)]
enum CliFailure {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Flux(FluxError),
    #[error("no records found in input")]
    NoRecords,
    #[error("{0} record(s) failed validation")]
    ValidationFailed(usize),
    #[error("one or more health checks failed")]
    DoctorFailed,
}

impl From<FluxError> for CliFailure {
    fn from(e: FluxError) -> Self {
        match e {
            FluxError::Io(io) => CliFailure::Io(io),
            FluxError::JsonError(json) => CliFailure::Json(json),
            other => CliFailure::Flux(other),
        }
    }
}

impl CliFailure {
    fn code(&self) -> &'static str {
        match self {
            CliFailure::Io(_) => "IO_ERROR",
            CliFailure::Json(_) => "JSON_ERROR",
            CliFailure::Flux(FluxError::InvalidConfiguration(_)) => "CONFIG_ERROR",
            CliFailure::Flux(FluxError::Validation(_)) => "VALIDATION_ERROR",
            CliFailure::Flux(_) => "PARSE_ERROR",
            CliFailure::NoRecords => "NO_RECORDS",
            CliFailure::ValidationFailed(_) => "VALIDATION_FAILED",
            CliFailure::DoctorFailed => "DOCTOR_FAILED",
        }
    }

    fn hint(&self) -> Option<String> {
        let hint = match self {
            CliFailure::Io(_) => "check file paths and permissions".to_string(),
            CliFailure::Flux(FluxError::InvalidConfiguration(_)) => {
                "`flux config` prints a valid configuration".to_string()
            }
            CliFailure::Json(_) | CliFailure::Flux(_) | CliFailure::NoRecords => {
                format!("input must be {SCHEMA_VERSION} records (`flux schema input`)")
            }
            CliFailure::ValidationFailed(_) => "fix the listed records and retry".to_string(),
            CliFailure::DoctorFailed => return None,
        };
        Some(hint)
    }
}
