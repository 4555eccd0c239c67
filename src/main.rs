use chrono::Local;
use clap::{Parser, Subcommand};
use log::{info, warn};
use pngpress::compress::ExternalTools;
use pngpress::process::{self, ProcessConfig, ProcessError};
use pngpress::run::{RunContext, STATS_FILENAME};
use pngpress::stats::{self, Summary};
use pngpress::tools::{self, Toolchain};
use pngpress::{config, output, scan};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Flags for the optimization run.
#[derive(clap::Args, Clone)]
struct RunArgs {
    /// Maximum parallel workers (capped at available cores)
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    jobs: Option<u64>,

    /// Skip the WebP conversion search
    #[arg(long)]
    no_webp: bool,
}

#[derive(Parser)]
#[command(name = "pngpress")]
#[command(about = "Batch PNG optimizer with exhaustive WebP conversion")]
#[command(long_about = "\
Batch PNG optimizer with exhaustive WebP conversion

Every *.png directly inside the working directory is optimized through
pngquant → optipng → zopflipng → oxipng. Results that are not smaller than
the original fall back to it. Each optimized PNG is then encoded with cwebp
over a quality × method grid and the smallest WebP is kept.

Run layout:

  ./
  ├── pngpress.toml                    # Optional settings
  ├── image.png                        # Original, never modified
  ├── backup_original_images_<ts>/     # Pristine copies
  ├── optimized_images_<ts>/           # Optimized PNGs
  ├── webp_images_<ts>/                # Smallest WebP per image
  ├── progress_logs/progress.txt       # Per-file progress (appended)
  ├── conversion_log.txt               # Run and stage details (appended)
  └── optimization_stats.csv           # One row per file and format

Run 'pngpress gen-config' to generate a documented pngpress.toml.")]
#[command(version)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Working directory holding the PNG files
    #[arg(long, default_value = ".", global = true)]
    dir: PathBuf,

    #[command(flatten)]
    run: RunArgs,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Optimize every PNG in the working directory (default)
    Run(RunArgs),
    /// Report which external tools are installed
    Check,
    /// Summarize the statistics CSV of the last run
    Report {
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print a stock pngpress.toml with all options documented
    GenConfig,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_target(false)
        .init();
    let cli = Cli::parse();

    match execute(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err}");
            let code = err
                .downcast_ref::<ProcessError>()
                .map_or(1, ProcessError::exit_code);
            ExitCode::from(u8::try_from(code).ok().filter(|&c| c != 0).unwrap_or(1))
        }
    }
}

fn execute(cli: Cli) -> Result<ExitCode, Box<dyn Error>> {
    match cli.command.unwrap_or(Command::Run(cli.run)) {
        Command::Run(args) => {
            optimize(&cli.dir, &args)?;
        }
        Command::Check => {
            let path_var = std::env::var_os("PATH").unwrap_or_default();
            let statuses = tools::check_tools(&path_var);
            output::print_tool_report(&statuses);
            if Toolchain::from_statuses(&statuses).is_err() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Report { json } => {
            let records = stats::read_records(&cli.dir.join(STATS_FILENAME))?;
            let summary = Summary::from_records(&records);
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                output::print_summary(&summary);
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// The full run. Dependencies and inputs are checked before anything is written.
fn optimize(dir: &Path, args: &RunArgs) -> Result<(), Box<dyn Error>> {
    let mut config = config::load_config(dir)?;
    if let Some(jobs) = args.jobs {
        config.processing.max_processes = Some(usize::try_from(jobs)?);
    }
    if args.no_webp {
        config.webp.enabled = false;
    }

    let toolchain = Toolchain::detect()?;
    if config.webp.enabled && toolchain.cwebp.is_none() {
        warn!("cwebp not found on PATH; WebP conversion disabled");
    }
    let inputs = scan::scan(dir)?;

    let process_config = ProcessConfig::from_config(&config, toolchain.cwebp.is_some());
    let ctx = RunContext::new(dir, Local::now());
    let backend = ExternalTools::new(toolchain);

    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_process_event(&event) {
                println!("{}", line);
            }
        }
    });
    let result = process::process(&ctx, &inputs, &process_config, &backend, Some(tx));
    // Stdout failures only lose display lines; the logs are authoritative.
    let _ = printer.join();
    let report = result?;

    info!(
        "run {} complete: {} files, {} rows, {} WebP kept",
        ctx.timestamp, report.files, report.rows, report.webp_kept
    );
    println!();
    output::print_run_artifacts(&ctx, process_config.webp_grid.is_some());
    let records = stats::read_records(&ctx.stats_csv)?;
    output::print_summary(&Summary::from_records(&records));
    Ok(())
}
