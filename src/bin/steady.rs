//! Steady CLI - Command-line interface for Steadypoint
//!
//! Commands:
//! - replay: Stabilize a recorded landmark session (batch mode)
//! - run: Stabilize samples streamed on stdin (streaming mode)
//! - validate: Validate recorded samples against cursor.sample.v1
//! - doctor: Diagnose configuration and environment
//! - schema: Print wire format information
//! - default-config: Print or write the default configuration

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use steadypoint::schema::{self, FrameRecord, SampleRecord, FRAME_SCHEMA_VERSION, SCHEMA_VERSION};
use steadypoint::{
    replay_records, Configuration, CursorError, CursorPipeline, SettingsStore, PRODUCER_NAME,
    STEADYPOINT_VERSION,
};
use tracing::{debug, info};

/// Steady - cursor stabilization and dwell-click engine
#[derive(Parser)]
#[command(name = "steady")]
#[command(version = STEADYPOINT_VERSION)]
#[command(about = "Stabilize tracked landmark positions into cursor movement and dwell clicks", long_about = None)]
struct Cli {
    /// Log verbosity (logs go to stderr)
    #[arg(long, global = true, value_enum, default_value = "warn")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stabilize a recorded session (batch mode)
    Replay {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long)]
        output: PathBuf,

        /// Settings file (defaults are used when omitted)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Print a session report to stderr when done
        #[arg(long)]
        summary: bool,
    },

    /// Stabilize samples streamed on stdin (streaming mode)
    Run {
        /// Settings file (defaults are used when omitted)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Flush output after each frame
        #[arg(long, default_value = "true")]
        flush: bool,

        /// Print a session report to stderr on end of input
        #[arg(long)]
        summary: bool,
    },

    /// Validate recorded samples
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

    /// Diagnose configuration and environment
    Doctor {
        /// Settings file to check
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

    /// Print the default configuration, or write it to a settings file
    DefaultConfig {
        /// Settings file to write (the previous file is kept as .backup)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one sample per line)
    Ndjson,
    /// JSON array of samples
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one frame per line)
    Ndjson,
    /// JSON array of frames
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[derive(Clone, ValueEnum)]
enum SchemaType {
    /// Input schema (cursor.sample.v1)
    Input,
    /// Output schema (cursor.frame.v1)
    Output,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::from(cli.log_level))
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string()));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), SteadyCliError> {
    match cli.command {
        Commands::Replay {
            input,
            output,
            config,
            input_format,
            output_format,
            summary,
        } => cmd_replay(&input, &output, config.as_deref(), input_format, output_format, summary),

        Commands::Run { config, flush, summary } => cmd_run(config.as_deref(), flush, summary),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),

        Commands::Schema { schema_type, json_schema } => cmd_schema(schema_type, json_schema),

        Commands::DefaultConfig { output } => cmd_default_config(output.as_deref()),
    }
}

fn cmd_replay(
    input: &Path,
    output: &Path,
    config: Option<&Path>,
    input_format: InputFormat,
    output_format: OutputFormat,
    summary: bool,
) -> Result<(), SteadyCliError> {
    let config = load_config(config)?;
    let input_data = read_input(input)?;
    let records = parse_records(&input_data, &input_format)?;

    if records.is_empty() {
        return Err(SteadyCliError::NoSamples);
    }

    let (frames, report) = replay_records(&records, &config)?;
    info!(frames = frames.len(), clicks = report.stats.clicks, "replay finished");

    let output_data = format_output(&frames, &output_format)?;
    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    if summary {
        eprintln!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}

fn cmd_run(config: Option<&Path>, flush: bool, summary: bool) -> Result<(), SteadyCliError> {
    let config = load_config(config)?;
    let mut pipeline = CursorPipeline::for_config(&config);

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for (index, line) in stdin.lock().lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        let record: SampleRecord = serde_json::from_str(trimmed).map_err(|e| {
            SteadyCliError::ParseError(format!("Failed to parse sample on line {}: {}", index + 1, e))
        })?;
        let sample = record.to_sample()?;

        let output = pipeline.process(&sample, &config);
        if let Some(click) = output.click {
            debug!(kind = click.kind.as_str(), t_ms = record.t_ms, "click");
        }

        let frame = FrameRecord::from_output(record.t_ms, &output);
        writeln!(stdout, "{}", serde_json::to_string(&frame)?)?;
        if flush {
            stdout.flush()?;
        }
    }
    stdout.flush()?;

    if summary {
        eprintln!("{}", serde_json::to_string_pretty(&pipeline.report())?);
    }

    Ok(())
}

fn cmd_validate(input: &Path, input_format: InputFormat, json: bool) -> Result<(), SteadyCliError> {
    let input_data = read_input(input)?;
    let records = parse_records(&input_data, &input_format)?;

    let results = schema::validate_records(&records);

    let report = ValidationReport {
        schema_version: SCHEMA_VERSION.to_string(),
        total_samples: records.len(),
        valid_samples: records.len() - results.len(),
        invalid_samples: results.len(),
        lost_samples: records.iter().filter(|r| !r.valid).count(),
        errors: results
            .iter()
            .map(|r| ValidationErrorDetail {
                index: r.index,
                t_ms: records.get(r.index).map(|rec| rec.t_ms),
                error: r.error.to_string(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total samples:   {}", report.total_samples);
        println!("Valid samples:   {}", report.valid_samples);
        println!("Invalid samples: {}", report.invalid_samples);
        println!("Tracking lost:   {}", report.lost_samples);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - Sample {}: {}", err.index, err.error);
            }
        }
    }

    if report.invalid_samples > 0 {
        Err(SteadyCliError::ValidationFailed(report.invalid_samples))
    } else {
        Ok(())
    }
}

fn cmd_doctor(config: Option<&Path>, json: bool) -> Result<(), SteadyCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Steadypoint version {}", STEADYPOINT_VERSION),
    });

    checks.push(DoctorCheck {
        name: "schema_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Input schema: {}, output schema: {}", SCHEMA_VERSION, FRAME_SCHEMA_VERSION),
    });

    if let Some(config_path) = config {
        if config_path.exists() {
            match SettingsStore::new(config_path).load() {
                Ok(config) => checks.push(DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Ok,
                    message: format!(
                        "Settings valid (mode {}, dwell {} ms, screen {}x{})",
                        config.mode.as_str(),
                        config.dwell_duration_ms,
                        config.screen.width,
                        config.screen.height
                    ),
                }),
                Err(e) => checks.push(DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Error,
                    message: format!("Invalid settings: {}", e),
                }),
            }
        } else {
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Warning,
                message: "Settings file does not exist (defaults will be used)".to_string(),
            });
        }
    }

    // Check stdin is available (for streaming mode)
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
            message: "stdin is a pipe (streaming mode ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: STEADYPOINT_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Steady Doctor Report");
        println!("====================");
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
        Err(SteadyCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn cmd_schema(schema_type: SchemaType, json_schema: bool) -> Result<(), SteadyCliError> {
    match schema_type {
        SchemaType::Input => {
            if json_schema {
                println!("{}", get_input_json_schema());
            } else {
                println!("Input Schema: {}", SCHEMA_VERSION);
                println!();
                println!("One record per captured frame:");
                println!();
                println!("- t_ms:  Monotonic capture time in milliseconds (required, >= 0)");
                println!("- x, y:  Landmark position in source space (required when valid)");
                println!("- valid: false when the landmark was not detected (default true)");
            }
        }
        SchemaType::Output => {
            if json_schema {
                println!("{}", get_output_json_schema());
            } else {
                println!("Output Schema: {}", FRAME_SCHEMA_VERSION);
                println!();
                println!("One record per input sample:");
                println!();
                println!("- t_ms:     Timestamp copied from the input sample");
                println!("- x, y:     Stabilized cursor position in screen pixels");
                println!("- tracking: false until the first valid sample");
                println!("- phase:    idle | dwelling | cooldown");
                println!("- click:    left | right | middle | double (only on the firing frame)");
            }
        }
    }

    Ok(())
}

fn cmd_default_config(output: Option<&Path>) -> Result<(), SteadyCliError> {
    let config = Configuration::default();
    match output {
        Some(path) => {
            SettingsStore::new(path).save(&config)?;
            info!(path = %path.display(), "default settings written");
        }
        None => println!("{}", config.to_json()?),
    }
    Ok(())
}

// Helper functions

/// Explicit settings paths must exist; without one the defaults apply
fn load_config(path: Option<&Path>) -> Result<Configuration, SteadyCliError> {
    match path {
        Some(path) if !path.exists() => Err(SteadyCliError::ConfigNotFound(path.to_path_buf())),
        Some(path) => Ok(SettingsStore::new(path).load()?),
        None => Ok(Configuration::default()),
    }
}

fn read_input(input: &Path) -> Result<String, SteadyCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn parse_records(input: &str, format: &InputFormat) -> Result<Vec<SampleRecord>, SteadyCliError> {
    let records = match format {
        InputFormat::Ndjson => schema::parse_ndjson(input)?,
        InputFormat::Json => schema::parse_array(input)?,
    };
    Ok(records)
}

fn format_output(frames: &[FrameRecord], format: &OutputFormat) -> Result<String, SteadyCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut lines: Vec<String> = Vec::new();
            for frame in frames {
                lines.push(serde_json::to_string(frame)?);
            }
            Ok(lines.join("\n") + "\n")
        }
        OutputFormat::Json => Ok(serde_json::to_string(frames)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(frames)?),
    }
}

fn get_input_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": SCHEMA_VERSION,
        "description": "Recorded landmark observation",
        "type": "object",
        "required": ["t_ms"],
        "properties": {
            "t_ms": { "type": "number", "minimum": 0 },
            "x": { "type": "number" },
            "y": { "type": "number" },
            "valid": { "type": "boolean", "default": true }
        },
        "if": { "properties": { "valid": { "const": true } } },
        "then": { "required": ["x", "y"] }
    })
    .to_string()
}

fn get_output_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": FRAME_SCHEMA_VERSION,
        "description": "Stabilized cursor frame",
        "type": "object",
        "required": ["t_ms", "x", "y", "tracking", "phase"],
        "properties": {
            "t_ms": { "type": "number" },
            "x": { "type": "number", "minimum": 0 },
            "y": { "type": "number", "minimum": 0 },
            "tracking": { "type": "boolean" },
            "phase": { "type": "string", "enum": ["idle", "dwelling", "cooldown"] },
            "click": { "type": "string", "enum": ["left", "right", "middle", "double"] }
        }
    })
    .to_string()
}

// Error types

#[derive(Debug)]
enum SteadyCliError {
    Io(io::Error),
    Cursor(CursorError),
    Json(serde_json::Error),
    ConfigNotFound(PathBuf),
    NoSamples,
    ValidationFailed(usize),
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for SteadyCliError {
    fn from(e: io::Error) -> Self {
        SteadyCliError::Io(e)
    }
}

impl From<CursorError> for SteadyCliError {
    fn from(e: CursorError) -> Self {
        SteadyCliError::Cursor(e)
    }
}

impl From<serde_json::Error> for SteadyCliError {
    fn from(e: serde_json::Error) -> Self {
        SteadyCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<SteadyCliError> for CliError {
    fn from(e: SteadyCliError) -> Self {
        match e {
            SteadyCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            SteadyCliError::Cursor(CursorError::InvalidConfig(msg)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: msg,
                hint: Some("Run 'steady default-config' for a valid starting point".to_string()),
            },
            SteadyCliError::Cursor(e @ CursorError::SettingsTooLarge { .. }) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Settings files are limited to 1 MiB".to_string()),
            },
            SteadyCliError::Cursor(e) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Ensure input matches cursor.sample.v1 schema".to_string()),
            },
            SteadyCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            SteadyCliError::ConfigNotFound(path) => CliError {
                code: "CONFIG_NOT_FOUND".to_string(),
                message: format!("Settings file not found: {}", path.display()),
                hint: Some("Create one with 'steady default-config -o <path>'".to_string()),
            },
            SteadyCliError::NoSamples => CliError {
                code: "NO_SAMPLES".to_string(),
                message: "No samples found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            SteadyCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} samples failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            SteadyCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            SteadyCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Check input format".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    schema_version: String,
    total_samples: usize,
    valid_samples: usize,
    invalid_samples: usize,
    lost_samples: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    t_ms: Option<f64>,
    error: String,
}

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
