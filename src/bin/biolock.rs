//! Biolock CLI - Command-line interface for the Biolock engine
//!
//! Commands:
//! - replay: Decide a captured attempt from its event log
//! - enroll: Turn a recorded motion trace into an enrolled pattern file
//! - verify: Check a live motion trace against an enrolled pattern
//! - classify-touch: Report which side of a key a touch landed on
//! - doctor: Diagnose configuration and enrollment files
//! - config: Print the effective configuration as TOML

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};

use biolock::config::EngineConfig;
use biolock::enrollment::{MotionAuthenticator, MotionCheck};
use biolock::features::classify_touch;
use biolock::motion::MotionPattern;
use biolock::store::{EnrolledPattern, MemoryPatternStore};
use biolock::types::{InputEvent, TouchPoint};
use biolock::{replay_attempt, AuthError, BIOLOCK_VERSION};

/// Biolock - Behavioral-biometric lock screen engine
#[derive(Parser)]
#[command(name = "biolock")]
#[command(version = BIOLOCK_VERSION)]
#[command(about = "Capture and verify behavioral lock-screen attempts", long_about = None)]
struct Cli {
    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decide a captured attempt from its event log
    Replay {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "json")]
        output_format: OutputFormat,

        /// Engine configuration (TOML, or JSON with a .json extension)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Enrolled pattern file for motion verification
        #[arg(long)]
        enrolled: Option<PathBuf>,
    },

    /// Turn a recorded motion trace into an enrolled pattern file
    Enroll {
        /// Motion trace JSON array (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Where to write the enrolled pattern
        #[arg(short, long)]
        output: PathBuf,

        /// Engine configuration
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Check a live motion trace against an enrolled pattern
    Verify {
        /// Live motion trace JSON array (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Enrolled pattern file
        #[arg(long)]
        enrolled: PathBuf,

        /// Engine configuration
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Report which side of a key a touch landed on
    ClassifyTouch {
        /// Touch x position relative to the key
        x: f64,

        /// Touch y position relative to the key
        y: f64,

        /// Engine configuration
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Diagnose configuration and enrollment files
    Doctor {
        /// Check a configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Check an enrolled pattern file
        #[arg(long)]
        enrolled: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration as TOML
    Config {
        /// Configuration file to load and validate (defaults otherwise)
        #[arg(long)]
        config: Option<PathBuf>,
    },
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
    /// Attempt outcome as compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
    /// Export table as CSV
    Csv,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = init_logging(&cli.log_level, cli.log_json).and_then(|()| run(cli.command));
    match result {
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

fn init_logging(level: &str, json: bool) -> Result<(), BiolockCliError> {
    let level: tracing::Level = level
        .parse()
        .map_err(|_| BiolockCliError::ParseError(format!("Unknown log level '{}'", level)))?;

    let builder = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

fn run(command: Commands) -> Result<(), BiolockCliError> {
    match command {
        Commands::Replay {
            input,
            output,
            input_format,
            output_format,
            config,
            enrolled,
        } => cmd_replay(
            &input,
            &output,
            input_format,
            output_format,
            config.as_deref(),
            enrolled.as_deref(),
        ),

        Commands::Enroll {
            input,
            output,
            config,
        } => cmd_enroll(&input, &output, config.as_deref()),

        Commands::Verify {
            input,
            enrolled,
            config,
            json,
        } => cmd_verify(&input, &enrolled, config.as_deref(), json),

        Commands::ClassifyTouch { x, y, config } => cmd_classify_touch(x, y, config.as_deref()),

        Commands::Doctor {
            config,
            enrolled,
            json,
        } => cmd_doctor(config.as_deref(), enrolled.as_deref(), json),

        Commands::Config { config } => cmd_config(config.as_deref()),
    }
}

fn cmd_replay(
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    config: Option<&Path>,
    enrolled: Option<&Path>,
) -> Result<(), BiolockCliError> {
    let config = load_config(config)?;
    let input_data = read_input(input)?;

    let events = match input_format {
        InputFormat::Ndjson => parse_ndjson(&input_data)?,
        InputFormat::Json => serde_json::from_str::<Vec<InputEvent>>(&input_data)?,
    };
    if events.is_empty() {
        return Err(BiolockCliError::NoEvents);
    }
    debug!(events = events.len(), "event log loaded");

    let enrolled = enrolled.map(load_enrolled).transpose()?;
    let outcome = replay_attempt(events, &config, enrolled)?;
    info!(
        accepted = outcome.verdict.accepted,
        reason = ?outcome.verdict.reason,
        "attempt decided"
    );

    let output_data = match output_format {
        OutputFormat::Json => format!("{}\n", serde_json::to_string(&outcome)?),
        OutputFormat::JsonPretty => format!("{}\n", serde_json::to_string_pretty(&outcome)?),
        OutputFormat::Csv => outcome.export.to_csv()?,
    };
    write_output(output, &output_data)
}

fn cmd_enroll(input: &Path, output: &Path, config: Option<&Path>) -> Result<(), BiolockCliError> {
    let mut config = load_config(config)?;
    config.motion.clear_on_start = false;

    let pattern: MotionPattern = serde_json::from_str(&read_input(input)?)?;
    let mut authenticator = MotionAuthenticator::new(config.motion, MemoryPatternStore::new());
    let enrolled = authenticator.enroll(pattern)?;

    fs::write(output, serde_json::to_string_pretty(&enrolled)?)?;
    println!(
        "Enrolled pattern {} ({} samples) written to {}",
        enrolled.id,
        enrolled.pattern.len(),
        output.display()
    );
    Ok(())
}

fn cmd_verify(
    input: &Path,
    enrolled: &Path,
    config: Option<&Path>,
    json: bool,
) -> Result<(), BiolockCliError> {
    let mut config = load_config(config)?;
    config.motion.clear_on_start = false;

    let live: MotionPattern = serde_json::from_str(&read_input(input)?)?;
    let enrolled = load_enrolled(enrolled)?;

    let mut authenticator = MotionAuthenticator::new(config.motion, MemoryPatternStore::new());
    authenticator.enroll(enrolled.pattern)?;
    let check = authenticator.verify(&live);

    if json {
        println!("{}", serde_json::to_string_pretty(&check)?);
    } else {
        match &check {
            MotionCheck::Matched { report } | MotionCheck::Mismatched { report } => {
                println!(
                    "{}: {}/{} samples within tolerance ({:.0}%)",
                    if report.matched { "MATCH" } else { "NO MATCH" },
                    report.hits,
                    report.compared,
                    report.hit_rate * 100.0
                );
            }
            MotionCheck::NotEnrolled => println!("NO MATCH: nothing enrolled"),
            MotionCheck::InsufficientSamples { got, required } => {
                println!("NO MATCH: {} samples, need at least {}", got, required)
            }
        }
    }

    if check.is_match() {
        Ok(())
    } else {
        Err(BiolockCliError::NotMatched)
    }
}

fn cmd_classify_touch(x: f64, y: f64, config: Option<&Path>) -> Result<(), BiolockCliError> {
    let config = load_config(config)?;
    println!("{}", classify_touch(TouchPoint { x, y }, &config.touch));
    Ok(())
}

fn cmd_doctor(
    config: Option<&Path>,
    enrolled: Option<&Path>,
    json: bool,
) -> Result<(), BiolockCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "biolock_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Biolock version {}", BIOLOCK_VERSION),
    });

    let mut engine_config = EngineConfig::default();
    match config {
        Some(path) if !path.exists() => checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Warning,
            message: "Configuration file does not exist, using defaults".to_string(),
        }),
        Some(path) => match EngineConfig::load(path) {
            Ok(loaded) => {
                checks.push(DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Ok,
                    message: format!(
                        "Configuration valid ({}-digit code, motion {})",
                        loaded.pin.code_length,
                        if loaded.motion.enabled { "enabled" } else { "disabled" }
                    ),
                });
                engine_config = loaded;
            }
            Err(e) => checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: e.to_string(),
            }),
        },
        None => checks.push(DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: "Using built-in defaults".to_string(),
        }),
    }

    if let Some(path) = enrolled {
        let check = if !path.exists() {
            DoctorCheck {
                name: "enrolled_pattern".to_string(),
                status: CheckStatus::Warning,
                message: "Enrolled pattern file does not exist".to_string(),
            }
        } else {
            match load_enrolled(path) {
                Ok(pattern) if pattern.pattern.len() < engine_config.motion.min_samples => {
                    DoctorCheck {
                        name: "enrolled_pattern".to_string(),
                        status: CheckStatus::Error,
                        message: format!(
                            "Pattern has {} samples, fewer than the required {}",
                            pattern.pattern.len(),
                            engine_config.motion.min_samples
                        ),
                    }
                }
                Ok(pattern) => DoctorCheck {
                    name: "enrolled_pattern".to_string(),
                    status: CheckStatus::Ok,
                    message: format!(
                        "Pattern {} valid ({} samples, enrolled {})",
                        pattern.id,
                        pattern.pattern.len(),
                        pattern.enrolled_at.to_rfc3339()
                    ),
                },
                Err(e) => DoctorCheck {
                    name: "enrolled_pattern".to_string(),
                    status: CheckStatus::Error,
                    message: CliError::from(e).message,
                },
            }
        };
        checks.push(check);
    }

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
            message: "stdin is a pipe (replay input ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        version: BIOLOCK_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Biolock Doctor Report");
        println!("=====================");
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
        Err(BiolockCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn cmd_config(config: Option<&Path>) -> Result<(), BiolockCliError> {
    let config = load_config(config)?;
    print!("{}", config.to_toml_string()?);
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, BiolockCliError> {
    match path {
        Some(path) => Ok(EngineConfig::load(path)?),
        None => Ok(EngineConfig::default()),
    }
}

fn load_enrolled(path: &Path) -> Result<EnrolledPattern, BiolockCliError> {
    let json = fs::read_to_string(path)?;
    Ok(EnrolledPattern::from_json(&json)?)
}

fn read_input(path: &Path) -> Result<String, BiolockCliError> {
    if path.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

fn write_output(path: &Path, data: &str) -> Result<(), BiolockCliError> {
    if path.to_string_lossy() == "-" {
        print!("{}", data);
    } else {
        fs::write(path, data)?;
    }
    Ok(())
}

fn parse_ndjson(data: &str) -> Result<Vec<InputEvent>, BiolockCliError> {
    data.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line.trim()).map_err(|e| {
                BiolockCliError::ParseError(format!("Line {}: {}", index + 1, e))
            })
        })
        .collect()
}

// Error types

#[derive(Debug)]
enum BiolockCliError {
    Io(io::Error),
    Auth(AuthError),
    Json(serde_json::Error),
    NoEvents,
    NotMatched,
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for BiolockCliError {
    fn from(e: io::Error) -> Self {
        BiolockCliError::Io(e)
    }
}

impl From<AuthError> for BiolockCliError {
    fn from(e: AuthError) -> Self {
        BiolockCliError::Auth(e)
    }
}

impl From<serde_json::Error> for BiolockCliError {
    fn from(e: serde_json::Error) -> Self {
        BiolockCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<BiolockCliError> for CliError {
    fn from(e: BiolockCliError) -> Self {
        match e {
            BiolockCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            BiolockCliError::Auth(e) => {
                let hint = match &e {
                    AuthError::InvalidConfig(_) => "Run 'biolock config' to see a valid layout",
                    AuthError::InsufficientSamples { .. } => "Record a longer motion gesture",
                    AuthError::NonMonotonicTimestamps { .. } => "Sort motion samples by t",
                    _ => "Run 'biolock doctor' for details",
                };
                CliError {
                    code: e.code().to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            BiolockCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            BiolockCliError::NoEvents => CliError {
                code: "NO_EVENTS".to_string(),
                message: "No events found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            BiolockCliError::NotMatched => CliError {
                code: "MOTION_NOT_MATCHED".to_string(),
                message: "Live motion trace does not match the enrolled pattern".to_string(),
                hint: None,
            },
            BiolockCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            BiolockCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Check input format".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
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
