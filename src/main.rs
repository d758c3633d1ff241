use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod cleanup;
mod config;
mod error;
mod rename;
mod ui;

use cleanup::batch::{clean_folder, CleanupOptions};
use cleanup::composite::BackgroundColor;
use cleanup::matte::U2NetRemover;
use config::Settings;
use error::Result;

/// Dataset prep tools for screw photos
#[derive(Parser, Debug)]
#[command(name = "screw-prep", version, about)]
struct Cli {
    /// Settings file (defaults to the per-user settings.json when present)
    #[arg(short, long, value_name = "FILE", global = true)]
    settings: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Remove photo backgrounds and composite onto a solid color
    Clean(CleanArgs),
    /// Rename every file in a folder to <prefix>_<n>.<extension>
    Rename(RenameArgs),
    /// Open the GUI smoke test window
    Window,
}

#[derive(Args, Debug)]
struct CleanArgs {
    /// Folder with the original photos
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Folder for the cleaned photos
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// U2-Net ONNX model file
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Background color: #rrggbb or r,g,b
    #[arg(short, long)]
    background: Option<BackgroundColor>,

    /// Continue past images that fail to process
    #[arg(long)]
    keep_going: bool,

    /// Skip images whose output already exists
    #[arg(long)]
    skip_existing: bool,
}

#[derive(Args, Debug)]
struct RenameArgs {
    /// Folder whose files get renamed
    #[arg(short, long)]
    folder: Option<PathBuf>,

    /// Name prefix
    #[arg(short, long)]
    prefix: Option<String>,

    /// Extension for the new names
    #[arg(short, long)]
    extension: Option<String>,

    /// Print the plan without renaming anything
    #[arg(long)]
    dry_run: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}

/// Fully resolved `clean` invocation
#[derive(Debug, Clone, PartialEq)]
struct CleanJob {
    input: PathBuf,
    output: PathBuf,
    model_path: PathBuf,
    options: CleanupOptions,
}

impl CleanArgs {
    /// Command line flags win over settings
    fn resolve(self, settings: &Settings) -> CleanJob {
        CleanJob {
            input: self.input.unwrap_or_else(|| settings.input_folder.clone()),
            output: self.output.unwrap_or_else(|| settings.output_folder.clone()),
            model_path: self.model.unwrap_or_else(|| settings.resolved_model_path()),
            options: CleanupOptions {
                background: self.background.unwrap_or(settings.background),
                keep_going: self.keep_going,
                skip_existing: self.skip_existing,
            },
        }
    }
}

/// Fully resolved `rename` invocation
#[derive(Debug, Clone, PartialEq, Eq)]
struct RenameJob {
    folder: PathBuf,
    prefix: String,
    extension: String,
    dry_run: bool,
}

impl RenameArgs {
    /// Command line flags win over settings
    fn resolve(self, settings: &Settings) -> RenameJob {
        RenameJob {
            folder: self.folder.unwrap_or_else(|| settings.rename_folder.clone()),
            prefix: self.prefix.unwrap_or_else(|| settings.rename_prefix.clone()),
            extension: self
                .extension
                .unwrap_or_else(|| settings.rename_extension.clone()),
            dry_run: self.dry_run,
        }
    }
}

fn run_clean(settings: &Settings, args: CleanArgs) -> Result<()> {
    let job = args.resolve(settings);

    let mut remover = U2NetRemover::load(&job.model_path)?;
    let report = clean_folder(&mut remover, &job.input, &job.output, job.options)?;

    println!(
        "📊 Cleanup summary: {} processed, {} skipped, {} failed",
        report.processed, report.skipped, report.failed
    );
    Ok(())
}

fn run_rename(settings: &Settings, args: RenameArgs) -> Result<()> {
    let RenameJob {
        folder,
        prefix,
        extension,
        dry_run,
    } = args.resolve(settings);

    let plan = rename::plan_renames(&folder, &prefix, &extension)?;

    if dry_run {
        for entry in &plan.entries {
            println!(
                "{} -> {}",
                entry.from.to_string_lossy(),
                entry.to.to_string_lossy()
            );
        }
        println!("📊 {} files would be renamed (dry run)", plan.len());
        return Ok(());
    }

    let moved = rename::apply_renames(&folder, &plan)?;
    println!("📊 Renamed {} of {} files", moved, plan.len());
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = match Settings::load(cli.settings.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!("❌ {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Command::Clean(args) => run_clean(&settings, args),
        Command::Rename(args) => run_rename(&settings, args),
        Command::Window => {
            return match ui::smoke::run() {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    tracing::error!("❌ GUI failed to start: {}", e);
                    ExitCode::FAILURE
                }
            };
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}
