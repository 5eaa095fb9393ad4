//! Proctor CLI - Command-line interface for Proctor Flux
//!
//! Commands:
//! - replay: Run a recorded detection stream through a session
//! - config: Print or validate threshold configuration
//! - doctor: Diagnose configuration and environment
//! - schema: Describe the input and report formats

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use proctor_flux::replay::{self, ReplayRecord};
use proctor_flux::types::Session;
use proctor_flux::{
    ComputeError, DeductionTable, Event, ProctorSession, ThresholdConfig, FLUX_VERSION,
    PRODUCER_NAME,
};
use tracing_subscriber::EnvFilter;

/// Proctor - signal-to-event engine for remote assessment proctoring
#[derive(Parser)]
#[command(name = "proctor")]
#[command(version = FLUX_VERSION)]
#[command(about = "Turn proctoring detections into integrity events and reports", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded detection stream and produce events plus a report
    Replay {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Candidate name recorded on the session
        #[arg(long, default_value = "candidate")]
        candidate: String,

        /// Session identifier (random when omitted)
        #[arg(long)]
        session_id: Option<String>,

        /// Threshold configuration (TOML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Deduction table (JSON object of EVENT_TYPE -> penalty)
        #[arg(long)]
        deductions: Option<PathBuf>,

        /// Write the event log here (use - for stdout)
        #[arg(long)]
        events: Option<PathBuf>,

        /// Event log format
        #[arg(long, default_value = "csv")]
        events_format: EventsFormat,

        /// Write the final report here (use - for stdout)
        #[arg(long, default_value = "-")]
        report: PathBuf,
    },

    /// Print the default configuration or validate a configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Check a threshold configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Check a deduction table file
        #[arg(long)]
        deductions: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print schema information
    Schema {
        /// Schema to print (input or report)
        #[arg(value_enum)]
        schema_type: SchemaType,

        /// Output as JSON schema
        #[arg(long)]
        json_schema: bool,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the built-in defaults
    Show {
        #[arg(long, default_value = "toml")]
        format: ConfigFormat,
    },
    /// Validate a TOML configuration file
    Validate {
        path: PathBuf,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one record per line)
    Ndjson,
    /// JSON array of records
    Json,
}

#[derive(Clone, ValueEnum)]
enum EventsFormat {
    /// timestamp,type,detail
    Csv,
    /// One JSON event per line
    Ndjson,
}

#[derive(Clone, ValueEnum)]
enum ConfigFormat {
    Toml,
    Json,
}

#[derive(Clone, ValueEnum)]
enum SchemaType {
    /// Replay input records
    Input,
    /// Final report
    Report,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "proctor_flux=info".into()),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string()));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), ProctorCliError> {
    match cli.command {
        Commands::Replay {
            input,
            input_format,
            candidate,
            session_id,
            config,
            deductions,
            events,
            events_format,
            report,
        } => cmd_replay(
            &input,
            input_format,
            &candidate,
            session_id,
            config.as_deref(),
            deductions.as_deref(),
            events.as_deref(),
            events_format,
            &report,
        ),
        Commands::Config { action } => cmd_config(action),
        Commands::Doctor {
            config,
            deductions,
            json,
        } => cmd_doctor(config.as_deref(), deductions.as_deref(), json),
        Commands::Schema {
            schema_type,
            json_schema,
        } => cmd_schema(schema_type, json_schema),
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_replay(
    input: &Path,
    input_format: InputFormat,
    candidate: &str,
    session_id: Option<String>,
    config: Option<&Path>,
    deductions: Option<&Path>,
    events_out: Option<&Path>,
    events_format: EventsFormat,
    report_out: &Path,
) -> Result<(), ProctorCliError> {
    let input_data = read_input(input)?;
    let mut records = match input_format {
        InputFormat::Ndjson => replay::parse_ndjson(&input_data)?,
        InputFormat::Json => replay::parse_array(&input_data)?,
    };
    if records.is_empty() {
        return Err(ProctorCliError::NoRecords);
    }
    records.sort_by_key(ReplayRecord::timestamp);

    let config = load_config(config)?;
    let deductions = load_deductions(deductions)?;

    let start = records[0].timestamp();
    let end = records[records.len() - 1].timestamp();
    let metadata = match session_id {
        Some(id) => Session::with_id(id, candidate.trim(), start),
        None => Session::new(candidate.trim(), start),
    };
    let mut session = ProctorSession::start_with_session(metadata, config)?;

    for record in &records {
        replay::apply(&mut session, record)?;
    }
    session.stop(end)?;

    if let Some(path) = events_out {
        let output = format_events(session.events(), &events_format, session.to_csv())?;
        write_output(path, &output)?;
    }

    let report = session.final_report(&deductions)?;
    write_output(report_out, &format!("{}\n", serde_json::to_string_pretty(&report)?))?;
    Ok(())
}

fn cmd_config(action: ConfigAction) -> Result<(), ProctorCliError> {
    match action {
        ConfigAction::Show { format } => {
            let config = ThresholdConfig::default();
            match format {
                ConfigFormat::Toml => print!("{}", config.to_toml_string()?),
                ConfigFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
            }
            Ok(())
        }
        ConfigAction::Validate { path } => {
            ThresholdConfig::from_file(&path)?;
            println!("{}: ok", path.display());
            Ok(())
        }
    }
}

fn cmd_doctor(config: Option<&Path>, deductions: Option<&Path>, json: bool) -> Result<(), ProctorCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "flux_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Proctor Flux version {}", FLUX_VERSION),
    });

    let defaults_check = match ThresholdConfig::default().validate() {
        Ok(()) => DoctorCheck {
            name: "default_config".to_string(),
            status: CheckStatus::Ok,
            message: "Built-in thresholds are valid".to_string(),
        },
        Err(e) => DoctorCheck {
            name: "default_config".to_string(),
            status: CheckStatus::Error,
            message: e.to_string(),
        },
    };
    checks.push(defaults_check);

    if let Some(path) = config {
        checks.push(file_check("config", path, |content| {
            ThresholdConfig::from_toml_str(content).map(|_| "Configuration file valid".to_string())
        }));
    }

    if let Some(path) = deductions {
        checks.push(file_check("deductions", path, |content| {
            DeductionTable::from_json(content)
                .map(|table| format!("Deduction table valid ({} event types)", table.iter().count()))
        }));
    }

    // Check stdin is available (for piping recordings)
    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (replay from stdin ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: FLUX_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Proctor Doctor Report");
        println!("=====================");
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

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(ProctorCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn file_check<F>(name: &str, path: &Path, parse: F) -> DoctorCheck
where
    F: FnOnce(&str) -> Result<String, ComputeError>,
{
    if !path.exists() {
        return DoctorCheck {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: format!("{} does not exist", path.display()),
        };
    }

    match fs::read_to_string(path) {
        Ok(content) => match parse(&content) {
            Ok(message) => DoctorCheck {
                name: name.to_string(),
                status: CheckStatus::Ok,
                message,
            },
            Err(e) => DoctorCheck {
                name: name.to_string(),
                status: CheckStatus::Error,
                message: e.to_string(),
            },
        },
        Err(e) => DoctorCheck {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: format!("Cannot read {}: {}", path.display(), e),
        },
    }
}

fn cmd_schema(schema_type: SchemaType, json_schema: bool) -> Result<(), ProctorCliError> {
    match schema_type {
        SchemaType::Input => {
            if json_schema {
                println!("{}", input_json_schema());
            } else {
                println!("Replay input: one JSON record per line (or a JSON array), tagged by \"kind\"");
                println!();
                println!("1. frame - face landmarks for one video frame");
                println!("   - timestamp, frame_width, frame_height");
                println!("   - faces: [[{{x, y}}, ...], ...] (normalized 0-1 landmark meshes)");
                println!("   - objects: optional normalized detections [{{label, score, box, source}}]");
                println!();
                println!("2. audio - one loudness reading");
                println!("   - timestamp plus rms, or bytes (u8, 128 = silence), or samples (f32)");
                println!();
                println!("3. provider_payload - raw object detector output for one poll");
                println!("   - timestamp, frame_width, frame_height");
                println!("   - outputs: [{{provider, payload | error}}]");
                println!();
                println!("Supported providers: coco_ssd, mediapipe");
            }
        }
        SchemaType::Report => {
            if json_schema {
                println!("{}", report_json_schema());
            } else {
                println!("Report: camelCase JSON object");
                println!();
                println!("  sessionId, candidateName, startTs, endTs");
                println!("  eventCounts: {{EVENT_TYPE: count}} for types that occurred");
                println!("  integrityScore: 100 minus deductions, clamped to [0, 100]");
                println!("  interviewDurationSec: rounded seconds between start and end");
            }
        }
    }
    Ok(())
}

fn read_input(input: &Path) -> Result<String, ProctorCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn write_output(path: &Path, data: &str) -> Result<(), ProctorCliError> {
    if path.to_string_lossy() == "-" {
        let mut stdout = io::stdout();
        stdout.write_all(data.as_bytes())?;
        stdout.flush()?;
    } else {
        fs::write(path, data)?;
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<ThresholdConfig, ProctorCliError> {
    match path {
        Some(path) => Ok(ThresholdConfig::from_file(path)?),
        None => Ok(ThresholdConfig::default()),
    }
}

fn load_deductions(path: Option<&Path>) -> Result<DeductionTable, ProctorCliError> {
    match path {
        Some(path) => Ok(DeductionTable::from_json(&fs::read_to_string(path)?)?),
        None => Ok(DeductionTable::default()),
    }
}

fn format_events(events: &[Event], format: &EventsFormat, csv: String) -> Result<String, ProctorCliError> {
    match format {
        EventsFormat::Csv => Ok(format!("{}\n", csv)),
        EventsFormat::Ndjson => {
            let mut lines = String::new();
            for event in events {
                lines.push_str(&serde_json::to_string(event)?);
                lines.push('\n');
            }
            Ok(lines)
        }
    }
}

fn input_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "proctor.replay_record.v1",
        "description": "Proctor Flux replay input record",
        "type": "object",
        "required": ["kind", "timestamp"],
        "properties": {
            "kind": { "type": "string", "enum": ["frame", "audio", "provider_payload"] },
            "timestamp": { "type": "string", "format": "date-time" },
            "frame_width": { "type": "number" },
            "frame_height": { "type": "number" },
            "faces": {
                "type": "array",
                "items": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "required": ["x", "y"],
                        "properties": { "x": { "type": "number" }, "y": { "type": "number" } }
                    }
                }
            },
            "objects": { "type": "array", "items": { "type": "object" } },
            "rms": { "type": "number" },
            "bytes": { "type": "array", "items": { "type": "integer", "minimum": 0, "maximum": 255 } },
            "samples": { "type": "array", "items": { "type": "number" } },
            "outputs": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["provider"],
                    "properties": {
                        "provider": { "type": "string", "enum": ["coco_ssd", "mediapipe"] },
                        "payload": {},
                        "error": { "type": "string" }
                    }
                }
            }
        }
    })
    .to_string()
}

fn report_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "proctor.report.v1",
        "description": "Proctor Flux session report",
        "type": "object",
        "required": ["sessionId", "candidateName", "startTs", "eventCounts", "integrityScore", "interviewDurationSec"],
        "properties": {
            "sessionId": { "type": "string" },
            "candidateName": { "type": "string" },
            "startTs": { "type": "string", "format": "date-time" },
            "endTs": { "type": ["string", "null"], "format": "date-time" },
            "eventCounts": { "type": "object", "additionalProperties": { "type": "integer" } },
            "integrityScore": { "type": "number", "minimum": 0, "maximum": 100 },
            "interviewDurationSec": { "type": "integer", "minimum": 0 }
        }
    })
    .to_string()
}

// Error types

#[derive(Debug)]
enum ProctorCliError {
    Io(io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    NoRecords,
    DoctorFailed,
}

impl From<io::Error> for ProctorCliError {
    fn from(e: io::Error) -> Self {
        ProctorCliError::Io(e)
    }
}

impl From<ComputeError> for ProctorCliError {
    fn from(e: ComputeError) -> Self {
        ProctorCliError::Compute(e)
    }
}

impl From<serde_json::Error> for ProctorCliError {
    fn from(e: serde_json::Error) -> Self {
        ProctorCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<ProctorCliError> for CliError {
    fn from(e: ProctorCliError) -> Self {
        match e {
            ProctorCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            ProctorCliError::Compute(e) => {
                let (code, hint) = match &e {
                    ComputeError::InvalidConfig(_) | ComputeError::TomlError(_) => {
                        ("INVALID_CONFIG", "Run 'proctor config show' for a valid example")
                    }
                    ComputeError::UnsupportedProvider(_) => {
                        ("UNSUPPORTED_PROVIDER", "Supported providers: coco_ssd, mediapipe")
                    }
                    ComputeError::SessionClosed(_) | ComputeError::SessionActive(_) => {
                        ("SESSION_STATE", "Check the order of replay records")
                    }
                    ComputeError::Delivery(_) => ("DELIVERY_FAILED", "Check the event sink and retry"),
                    _ => ("PARSE_ERROR", "Run 'proctor schema input' for the record format"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            ProctorCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            ProctorCliError::NoRecords => CliError {
                code: "NO_RECORDS".to_string(),
                message: "No records found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            ProctorCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
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
