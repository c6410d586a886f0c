//! Pulse CLI - Command-line interface for Synheart Pulse
//!
//! Commands:
//! - analyze: Reconcile sources and run the full analysis
//! - quality: Score each source's data quality
//! - combine: Merge all sources into a minute-aligned comparison series
//! - zones: Print the heart-rate zone table
//! - doctor: Check configuration and environment

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::Utc;
use synheart_pulse::logging::{init_logging, LogConfig, LogFormat, LogLevel};
use synheart_pulse::quality::QualityScorer;
use synheart_pulse::types::{QualityBreakdown, Source};
use synheart_pulse::zones::{Zone, ZONES};
use synheart_pulse::{
    AnalyticsConfig, ComputeError, PulseProcessor, SourcePolicy, PRODUCER_NAME, PULSE_VERSION,
};

/// Pulse - heart-rate analytics for multi-source wearable data
#[derive(Parser)]
#[command(name = "pulse")]
#[command(author = "Synheart AI Inc")]
#[command(version = PULSE_VERSION)]
#[command(about = "Analyze heart-rate data from Fitbit, Google Fit and Apple Health", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace); RUST_LOG overrides
    #[arg(long, global = true, default_value = "warn")]
    log_level: LogLevel,

    /// Log format (pretty, json, compact)
    #[arg(long, global = true, default_value = "compact")]
    log_format: LogFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile sources and analyze the result
    Analyze {
        /// JSON object keyed by source name (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Source policy: auto, combined, or a source name
        #[arg(long, default_value = "auto")]
        policy: SourcePolicy,

        /// TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Include the detailed anomaly list
        #[arg(long)]
        details: bool,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Score each source's data quality
    Quality {
        /// JSON object keyed by source name (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Merge all sources into a minute-aligned comparison series
    Combine {
        /// JSON object keyed by source name (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Print the heart-rate zone table
    Zones {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check configuration and environment
    Doctor {
        /// Configuration file to validate
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), PulseCliError> {
    init_logging(&LogConfig {
        level: cli.log_level,
        format: cli.log_format,
    })?;

    match cli.command {
        Commands::Analyze {
            input,
            output,
            policy,
            config,
            details,
            pretty,
        } => cmd_analyze(&input, &output, policy, config.as_deref(), details, pretty),

        Commands::Quality {
            input,
            config,
            pretty,
        } => cmd_quality(&input, config.as_deref(), pretty),

        Commands::Combine {
            input,
            output,
            config,
            pretty,
        } => cmd_combine(&input, &output, config.as_deref(), pretty),

        Commands::Zones { json } => cmd_zones(json),

        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),
    }
}

fn load_processor(config: Option<&Path>) -> Result<PulseProcessor, PulseCliError> {
    let config = match config {
        Some(path) => AnalyticsConfig::load(path)?,
        None => AnalyticsConfig::default(),
    };
    Ok(PulseProcessor::new(config)?)
}

fn read_input(input: &Path) -> Result<String, PulseCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn write_output<T: Serialize>(output: &Path, value: &T, pretty: bool) -> Result<(), PulseCliError> {
    let data = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };

    if output.to_string_lossy() == "-" {
        println!("{}", data);
    } else {
        fs::write(output, data)?;
    }
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeOutput {
    producer: &'static str,
    version: &'static str,
    #[serde(flatten)]
    analysis: synheart_pulse::HeartRateAnalysis,
    #[serde(skip_serializing_if = "Option::is_none")]
    anomaly_details: Option<Vec<synheart_pulse::types::Anomaly>>,
}

fn cmd_analyze(
    input: &Path,
    output: &Path,
    policy: SourcePolicy,
    config: Option<&Path>,
    details: bool,
    pretty: bool,
) -> Result<(), PulseCliError> {
    let processor = load_processor(config)?;
    let now = Utc::now();
    let datasets = processor.load_datasets(&read_input(input)?, now)?;

    let analysis = processor.analyze(&datasets, policy, now)?;
    let anomaly_details = details.then(|| processor.anomaly_details(&analysis.samples));

    write_output(
        output,
        &AnalyzeOutput {
            producer: PRODUCER_NAME,
            version: PULSE_VERSION,
            analysis,
            anomaly_details,
        },
        pretty,
    )
}

#[derive(Serialize)]
struct SourceQuality {
    score: u32,
    samples: usize,
    breakdown: QualityBreakdown,
}

fn cmd_quality(input: &Path, config: Option<&Path>, pretty: bool) -> Result<(), PulseCliError> {
    let processor = load_processor(config)?;
    let now = Utc::now();
    let datasets = processor.load_datasets(&read_input(input)?, now)?;

    let report: BTreeMap<Source, SourceQuality> = datasets
        .iter()
        .map(|(source, samples)| {
            let breakdown = QualityScorer::breakdown(samples, now);
            (
                *source,
                SourceQuality {
                    score: breakdown.total,
                    samples: samples.len(),
                    breakdown,
                },
            )
        })
        .collect();

    write_output(Path::new("-"), &report, pretty)
}

fn cmd_combine(
    input: &Path,
    output: &Path,
    config: Option<&Path>,
    pretty: bool,
) -> Result<(), PulseCliError> {
    let processor = load_processor(config)?;
    let datasets = processor.load_datasets(&read_input(input)?, Utc::now())?;
    let merged = processor.analyze_combined(&datasets)?;
    write_output(output, &merged, pretty)
}

fn cmd_zones(json: bool) -> Result<(), PulseCliError> {
    if json {
        println!("{}", serde_json::to_string_pretty(&ZONES)?);
        return Ok(());
    }

    println!("{:<10} {:>9}  {:<11} {}", "Zone", "BPM", "Intensity", "Description");
    for Zone {
        name,
        min,
        max,
        intensity,
        description,
        ..
    } in ZONES
    {
        println!(
            "{:<10} {:>4}-{:<4}  {:<11} {}",
            name,
            min,
            max,
            intensity,
            description
        );
    }
    Ok(())
}

fn cmd_doctor(config: Option<&Path>, json: bool) -> Result<(), PulseCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "pulse_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Pulse version {}", PULSE_VERSION),
    });

    if let Some(path) = config {
        let check = match AnalyticsConfig::load(path) {
            Ok(config) => DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: format!(
                    "Config valid (display target {}, UTC offset {} min)",
                    config.downsample_target, config.utc_offset_minutes
                ),
            },
            Err(ComputeError::Io(e)) => DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Warning,
                message: format!("Cannot read config file: {}", e),
            },
            Err(e) => DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: e.to_string(),
            },
        };
        checks.push(check);
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY; pass --input <file>".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe; --input - will read it".to_string(),
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

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(PulseCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Error types

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

#[derive(Serialize)]
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
            PulseCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            PulseCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            PulseCliError::Compute(e) => compute_error(e),
        }
    }
}

fn compute_error(e: ComputeError) -> CliError {
    let (code, hint) = match &e {
        ComputeError::SourceUnavailable(_) => (
            "SOURCE_UNAVAILABLE",
            "Use --policy auto or pick a source present in the input",
        ),
        ComputeError::NoData => ("NO_DATA", "Ensure at least one source has records"),
        ComputeError::UnsupportedVendor(_) => (
            "UNSUPPORTED_VENDOR",
            "Input keys must be fitbit, googleFit, appleHealth or mock",
        ),
        ComputeError::ConfigError(_) => ("CONFIG_ERROR", "Run 'pulse doctor --config <file>' for details"),
        ComputeError::Io(_) => ("IO_ERROR", "Check file paths and permissions"),
        ComputeError::JsonError(_) => (
            "PARSE_ERROR",
            "Input must be a JSON object mapping source names to vendor payloads",
        ),
    };

    CliError {
        code: code.to_string(),
        message: e.to_string(),
        hint: Some(hint.to_string()),
    }
}

// Report types

#[derive(Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
