//! Affect CLI - Command-line interface for Affect Flux
//!
//! Commands:
//! - run: Drive an engine from affect.input.v1 records on stdin (streaming mode)
//! - validate: Validate input record schema
//! - text: One-shot lexical analysis of a text
//! - doctor: Diagnose configuration and environment

use clap::{Parser, Subcommand, ValueEnum};
use std::cell::RefCell;
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::rc::Rc;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use affect_flux::config::{EngineConfig, LanguageSetting};
use affect_flux::encoder::{AffectSnapshot, SnapshotEncoder};
use affect_flux::lexical::LexicalSignalExtractor;
use affect_flux::schema::{InputAdapter, InputRecord, SCHEMA_VERSION};
use affect_flux::{AffectError, FusionCombiner, FusionResult, AFFECT_VERSION, PRODUCER_NAME};

/// Affect - stable emotion labels from interaction and text signals
#[derive(Parser)]
#[command(name = "affect")]
#[command(version = AFFECT_VERSION)]
#[command(
    about = "Turn interaction and text signals into a stable emotion label",
    long_about = None
)]
struct Cli {
    /// Log filter (e.g. "info", "affect_flux=debug"); overrides RUST_LOG
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive an engine from NDJSON records on stdin
    Run {
        /// Engine configuration file (JSON, partial objects allowed)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Start behavior capture and auto-analysis at the first record
        #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
        auto_start: bool,

        /// Flush output after each snapshot
        #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
        flush: bool,
    },

    /// Validate input record schema
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

    /// Analyze a single text with the lexical extractor
    Text {
        /// Text to analyze
        text: String,

        /// Language override
        #[arg(long, default_value = "auto")]
        lang: LangArg,

        /// Engine configuration file (lexical section is used)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Check an engine configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
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
enum OutputFormat {
    /// Newline-delimited JSON (one snapshot per line)
    Ndjson,
    /// Pretty-printed JSON
    JsonPretty,
}

#[derive(Clone, Copy, ValueEnum)]
enum LangArg {
    Auto,
    Ko,
    En,
}

impl From<LangArg> for LanguageSetting {
    fn from(lang: LangArg) -> Self {
        match lang {
            LangArg::Auto => LanguageSetting::Auto,
            LangArg::Ko => LanguageSetting::Ko,
            LangArg::En => LanguageSetting::En,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let payload = serde_json::to_string(&CliError::from(e))
                .unwrap_or_else(|_| "Unknown error".to_string());
            eprintln!("{}", payload);
            ExitCode::FAILURE
        }
    }
}

/// Human-readable logs on stderr; stdout carries payloads only
fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("affect_flux=warn")),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .init();
}

fn run(cli: Cli) -> Result<(), AffectCliError> {
    match cli.command {
        Commands::Run {
            config,
            output_format,
            auto_start,
            flush,
        } => cmd_run(config.as_deref(), output_format, auto_start, flush),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Text { text, lang, config } => cmd_text(&text, lang, config.as_deref()),

        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, AffectCliError> {
    match path {
        Some(path) => Ok(EngineConfig::from_json(&fs::read_to_string(path)?)?),
        None => Ok(EngineConfig::default()),
    }
}

fn cmd_run(
    config: Option<&Path>,
    output_format: OutputFormat,
    auto_start: bool,
    flush: bool,
) -> Result<(), AffectCliError> {
    let config = load_config(config)?;
    let encoder = SnapshotEncoder::new();
    let mut engine: Option<FusionCombiner> = None;

    let published: Rc<RefCell<Vec<FusionResult>>> = Rc::new(RefCell::new(Vec::new()));

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for (line_num, line) in stdin.lock().lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        let record: InputRecord = serde_json::from_str(trimmed).map_err(|e| {
            AffectCliError::ParseError(format!("Failed to parse line {}: {}", line_num + 1, e))
        })?;
        record.validate()?;

        // The engine is built at the first record so its clock starts there
        let engine = engine.get_or_insert_with(|| {
            let mut engine = FusionCombiner::new(config.clone(), record.timestamp);
            if auto_start {
                engine.start(record.timestamp);
            }
            let sink = Rc::clone(&published);
            // Dropping the handle does not detach the callback
            let _subscription =
                engine.subscribe(move |result| sink.borrow_mut().push(result.clone()));
            engine
        });

        InputAdapter::apply(engine, &record);

        let pending: Vec<FusionResult> = published.borrow_mut().drain(..).collect();
        for result in pending {
            let snapshot = encoder.encode_result(engine, result, record.timestamp);
            write!(stdout, "{}", format_snapshot(&snapshot, &output_format)?)?;
            if flush {
                stdout.flush()?;
            }
        }
    }

    if engine.is_none() {
        return Err(AffectCliError::NoRecords);
    }

    stdout.flush()?;
    Ok(())
}

fn cmd_validate(input: &Path, input_format: InputFormat, json: bool) -> Result<(), AffectCliError> {
    let input_data = if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    let records = match input_format {
        InputFormat::Ndjson => InputAdapter::parse_ndjson(&input_data)?,
        InputFormat::Json => InputAdapter::parse_array(&input_data)?,
    };

    let failures = InputAdapter::validate_records(&records);

    let report = ValidationReport {
        total_records: records.len(),
        valid_records: records.len() - failures.len(),
        invalid_records: failures.len(),
        errors: failures
            .iter()
            .map(|f| ValidationErrorDetail {
                index: f.index,
                record_type: f.record_type.to_string(),
                error: f.error.to_string(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report ({})", SCHEMA_VERSION);
        println!("==================");
        println!("Total records:   {}", report.total_records);
        println!("Valid records:   {}", report.valid_records);
        println!("Invalid records: {}", report.invalid_records);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - {} record (index {}): {}", err.record_type, err.index, err.error);
            }
        }
    }

    if report.invalid_records > 0 {
        Err(AffectCliError::ValidationFailed(report.invalid_records))
    } else {
        Ok(())
    }
}

fn cmd_text(text: &str, lang: LangArg, config: Option<&Path>) -> Result<(), AffectCliError> {
    let mut lexical = load_config(config)?.lexical;
    lexical.language = lang.into();

    let judgment = LexicalSignalExtractor::new(lexical).analyze(text);
    println!("{}", serde_json::to_string_pretty(&judgment)?);
    Ok(())
}

fn cmd_doctor(config: Option<&Path>, json: bool) -> Result<(), AffectCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Affect Flux version {}", AFFECT_VERSION),
    });

    checks.push(DoctorCheck {
        name: "schema_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Input schema: {}", SCHEMA_VERSION),
    });

    let mut lexical = EngineConfig::default().lexical;
    if let Some(config_path) = config {
        if config_path.exists() {
            let parsed = fs::read_to_string(config_path)
                .map_err(|e| AffectError::ParseError(format!("Cannot read config file: {}", e)))
                .and_then(|content| EngineConfig::from_json(&content));
            match parsed {
                Ok(parsed) => {
                    checks.push(DoctorCheck {
                        name: "config".to_string(),
                        status: CheckStatus::Ok,
                        message: format!(
                            "Config valid (weights {:.2}/{:.2}, hysteresis {})",
                            parsed.fusion.behavior_weight,
                            parsed.fusion.text_weight,
                            if parsed.fusion.use_hysteresis { "on" } else { "off" }
                        ),
                    });
                    lexical = parsed.lexical;
                }
                Err(e) => {
                    checks.push(DoctorCheck {
                        name: "config".to_string(),
                        status: CheckStatus::Error,
                        message: e.to_string(),
                    });
                }
            }
        } else {
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Warning,
                message: "Config file does not exist".to_string(),
            });
        }
    }

    checks.push(remote_check(&lexical));

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
        version: AFFECT_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Affect Doctor Report");
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
        Err(AffectCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn remote_check(lexical: &affect_flux::config::LexicalConfig) -> DoctorCheck {
    let Some(endpoint) = &lexical.endpoint else {
        return DoctorCheck {
            name: "remote_classifier".to_string(),
            status: CheckStatus::Ok,
            message: "No endpoint configured (local analysis only)".to_string(),
        };
    };

    if !cfg!(feature = "remote") {
        return DoctorCheck {
            name: "remote_classifier".to_string(),
            status: CheckStatus::Warning,
            message: format!(
                "Endpoint {} configured but built without the `remote` feature",
                endpoint
            ),
        };
    }

    DoctorCheck {
        name: "remote_classifier".to_string(),
        status: CheckStatus::Ok,
        message: format!(
            "Endpoint {} (timeout {}ms, {})",
            endpoint,
            lexical.remote_timeout_ms,
            if lexical.api_key.is_some() { "with API key" } else { "no API key" }
        ),
    }
}

// Helper functions

fn format_snapshot(
    snapshot: &AffectSnapshot,
    format: &OutputFormat,
) -> Result<String, AffectCliError> {
    match format {
        OutputFormat::Ndjson => Ok(serde_json::to_string(snapshot)? + "\n"),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(snapshot)? + "\n"),
    }
}

// Error types

#[derive(Debug)]
enum AffectCliError {
    Io(io::Error),
    Engine(AffectError),
    Json(serde_json::Error),
    Validation(affect_flux::schema::ValidationError),
    NoRecords,
    ValidationFailed(usize),
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for AffectCliError {
    fn from(e: io::Error) -> Self {
        AffectCliError::Io(e)
    }
}

impl From<AffectError> for AffectCliError {
    fn from(e: AffectError) -> Self {
        AffectCliError::Engine(e)
    }
}

impl From<serde_json::Error> for AffectCliError {
    fn from(e: serde_json::Error) -> Self {
        AffectCliError::Json(e)
    }
}

impl From<affect_flux::schema::ValidationError> for AffectCliError {
    fn from(e: affect_flux::schema::ValidationError) -> Self {
        AffectCliError::Validation(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<AffectCliError> for CliError {
    fn from(e: AffectCliError) -> Self {
        match e {
            AffectCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            AffectCliError::Engine(e) => CliError {
                code: "ENGINE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check the configuration and input records".to_string()),
            },
            AffectCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            AffectCliError::Validation(e) => CliError {
                code: "VALIDATION_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'affect validate' for details".to_string()),
            },
            AffectCliError::NoRecords => CliError {
                code: "NO_RECORDS".to_string(),
                message: "No records found in input".to_string(),
                hint: Some("Ensure stdin carries affect.input.v1 records".to_string()),
            },
            AffectCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} records failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            AffectCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            AffectCliError::ParseError(msg) => CliError {
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
    total_records: usize,
    valid_records: usize,
    invalid_records: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    record_type: String,
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
