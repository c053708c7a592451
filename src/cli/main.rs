//! CLI entry point speaking the sidecar JSON protocol
//!
//! Three modes, mirroring the host application's expectations:
//! - `--check`: probe matting backend availability, `{"available": bool}`
//! - `--input`/`--output`: single image, one `ItemOutcome` JSON record
//! - `--batch-json`: ordered batch, one progress record per item plus a
//!   final summary record
//!
//! All JSON goes to stdout; logs go to stderr so stdout stays parseable.

use crate::{
    config::PortraitSettings,
    error::{CutoutError, Result},
    matting::{DefaultMatteFactory, MatteSource, MatteSourceFactory, UnavailableMatteSource},
    processor::PortraitProcessor,
    services::JsonLinesReporter,
    types::BatchItem,
    utils::PathGuard,
};
use clap::Parser;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Portrait background replacement sidecar
#[derive(Parser, Debug)]
#[command(name = "portrait-cutout", version, about)]
pub struct Cli {
    /// Check whether a matting backend is available and exit
    #[arg(long)]
    pub check: bool,

    /// Input image path
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Output image path
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Path to a settings JSON file
    #[arg(long = "settings-json")]
    pub settings_json: Option<PathBuf>,

    /// Path to a batch JSON file (array of {input, output})
    #[arg(long = "batch-json")]
    pub batch_json: Option<PathBuf>,

    /// Additional allowed root directory (repeatable)
    #[arg(long = "allow-dir")]
    pub allow_dirs: Vec<PathBuf>,

    /// Increase log verbosity (-v: debug, -vv: trace)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Serialize)]
struct CheckRecord {
    available: bool,
}

#[derive(Serialize)]
struct ErrorRecord {
    success: bool,
    error: String,
}

/// CLI entry point
///
/// # Errors
/// Configuration errors that prevent any JSON record from being produced
/// (bad flags, tracing init); processing failures are emitted as records.
pub fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    if cli.check {
        let available = DefaultMatteFactory.is_available();
        print_json(&CheckRecord { available })?;
        return Ok(exit_code(available));
    }

    let settings = load_settings(cli.settings_json.as_deref())?;
    let config = settings.to_pipeline_config()?;

    let mut guard = PathGuard::with_default_roots();
    for dir in &cli.allow_dirs {
        guard.allow_root(dir);
    }

    let source: Box<dyn MatteSource> = match DefaultMatteFactory.create_source() {
        Ok(source) => source,
        Err(e) => {
            // Surface per item instead of aborting before any record.
            log::warn!("{e}");
            Box::new(UnavailableMatteSource)
        },
    };

    let mut processor = PortraitProcessor::new(config, source)
        .with_path_guard(guard)
        .with_reporter(Box::new(JsonLinesReporter));

    if let Some(batch_path) = &cli.batch_json {
        return run_batch(&mut processor, batch_path);
    }

    let (Some(input), Some(output)) = (&cli.input, &cli.output) else {
        return Err(CutoutError::invalid_input(
            "--input and --output are required (or use --check / --batch-json)",
        ));
    };

    let outcome = processor.process_file(&input.display().to_string(), &output.display().to_string());
    print_json(&outcome)?;
    Ok(exit_code(outcome.success))
}

fn run_batch(processor: &mut PortraitProcessor, batch_path: &Path) -> Result<ExitCode> {
    let content = match std::fs::read_to_string(batch_path) {
        Ok(content) => content,
        Err(e) => {
            print_json(&ErrorRecord {
                success: false,
                error: format!("Batch JSON not readable: {e}"),
            })?;
            return Ok(ExitCode::FAILURE);
        },
    };

    let items: Vec<BatchItem> = match serde_json::from_str(&content) {
        Ok(items) => items,
        Err(e) => {
            print_json(&ErrorRecord {
                success: false,
                error: format!("Batch JSON malformed: {e}"),
            })?;
            return Ok(ExitCode::FAILURE);
        },
    };

    match processor.process_batch(&items) {
        Ok(summary) => {
            print_json(&summary)?;
            Ok(ExitCode::SUCCESS)
        },
        Err(e) => {
            print_json(&ErrorRecord {
                success: false,
                error: e.to_string(),
            })?;
            Ok(ExitCode::FAILURE)
        },
    }
}

/// Load the settings file; an absent file means default settings
fn load_settings(path: Option<&Path>) -> Result<PortraitSettings> {
    let Some(path) = path else {
        return Ok(PortraitSettings::default());
    };
    if !path.exists() {
        log::warn!("Settings file {} not found, using defaults", path.display());
        return Ok(PortraitSettings::default());
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| CutoutError::file_io_error("read settings file", path, &e))?;
    serde_json::from_str(&content)
        .map_err(|e| CutoutError::invalid_input(format!("Settings JSON malformed: {e}")))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let line = serde_json::to_string(value)
        .map_err(|e| CutoutError::processing(format!("Failed to serialize record: {e}")))?;
    println!("{line}");
    Ok(())
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn init_tracing(verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    // Logs go to stderr; stdout carries only JSON records.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| CutoutError::processing(format!("Failed to initialize tracing: {e}")))?;
    Ok(())
}
