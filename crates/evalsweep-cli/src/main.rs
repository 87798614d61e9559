//! evalsweep - grid search over evaluation retrieval limits
//!
//! ## Commands
//!
//! - `run`: sweep the grid, write the ranked report, apply the best tuple
//! - `plan`: show the grid and its worst-case duration without running it
//! - `show`: print the ranking of a saved report
//! - `apply`: commit the best tuple of a saved report to the settings file

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use evalsweep_core::{
    apply_best, read_report_json, render_best_summary, render_ranking_table, ParameterTuple,
    SweepReport, SweepSpan,
};
use evalsweep_runner::{execute_sweep, ProcessExecutor, SweepConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};

#[derive(Parser, Debug)]
#[command(name = "evalsweep")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Grid search over evaluation retrieval limits", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Sweep configuration file (TOML)
    #[arg(short, long, global = true, env = "EVALSWEEP_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run every grid point, write the report and apply the best tuple
    Run {
        #[command(flatten)]
        overrides: Overrides,
    },

    /// Print the grid, its digest and worst-case duration
    Plan {
        #[command(flatten)]
        overrides: Overrides,
    },

    /// Print the ranking of a saved report
    Show {
        /// Report file written by `run`
        report: PathBuf,
    },

    /// Apply the best tuple of a saved report to the settings file
    Apply {
        /// Report file written by `run`
        report: PathBuf,

        #[command(flatten)]
        overrides: Overrides,
    },
}

/// Command-line values that take precedence over the configuration file.
#[derive(Args, Debug, Default, Clone)]
struct Overrides {
    /// Directory of the evaluation program
    #[arg(long)]
    workdir: Option<PathBuf>,

    /// Settings file rewritten before each run (relative to workdir)
    #[arg(long)]
    settings_file: Option<PathBuf>,

    /// Per-run timeout in seconds (0 disables it)
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Grid as `facts,entities,episodes` tuples separated by `;`
    #[arg(long)]
    grid: Option<String>,

    /// Glob locating result artifacts (relative to workdir)
    #[arg(long)]
    results_glob: Option<String>,

    /// Directory for the sweep report (relative to workdir)
    #[arg(long)]
    report_dir: Option<PathBuf>,

    /// Leave missing settings unchanged instead of failing the run
    #[arg(long)]
    lenient: bool,

    /// Evaluation command, given after `--`
    #[arg(last = true)]
    eval_command: Vec<String>,
}

impl Overrides {
    fn apply_to(&self, config: &mut SweepConfig) -> Result<()> {
        if let Some(workdir) = &self.workdir {
            config.workdir = workdir.clone();
        }
        if let Some(file) = &self.settings_file {
            config.settings_file = file.clone();
        }
        if let Some(secs) = self.timeout_secs {
            config.timeout_secs = secs;
        }
        if let Some(grid) = &self.grid {
            config.grid = parse_grid(grid)?;
        }
        if let Some(glob) = &self.results_glob {
            config.results_glob = glob.clone();
        }
        if let Some(dir) = &self.report_dir {
            config.report_dir = dir.clone();
        }
        if self.lenient {
            config.strict_settings = false;
        }
        if !self.eval_command.is_empty() {
            config.command = self.eval_command.clone();
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    evalsweep_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Run { overrides } => {
            let config = load_config(cli.config.as_deref(), &overrides)?;
            cmd_run(&config).await
        }
        Commands::Plan { overrides } => {
            let config = load_config(cli.config.as_deref(), &overrides)?;
            cmd_plan(&config)
        }
        Commands::Show { report } => cmd_show(&report),
        Commands::Apply { report, overrides } => {
            let config = load_config(cli.config.as_deref(), &overrides)?;
            cmd_apply(&config, &report)
        }
    }
}

/// Configuration file (or defaults) with command-line overrides applied.
fn load_config(path: Option<&Path>, overrides: &Overrides) -> Result<SweepConfig> {
    let mut config = match path {
        Some(path) => SweepConfig::load(path)?,
        None => SweepConfig::default(),
    };
    overrides.apply_to(&mut config)?;
    config.validate().context("Invalid sweep configuration")?;
    Ok(config)
}

/// Parse `25,15,5;50,5,0` into tuples.
fn parse_grid(raw: &str) -> Result<Vec<ParameterTuple>> {
    let grid = raw
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<ParameterTuple>()
                .with_context(|| format!("Invalid grid entry {:?}", s))
        })
        .collect::<Result<Vec<_>>>()?;
    if grid.is_empty() {
        anyhow::bail!("Grid {:?} contains no tuples", raw);
    }
    Ok(grid)
}

async fn cmd_run(config: &SweepConfig) -> Result<()> {
    println!("{}", "=".repeat(80));
    println!("PARAMETER GRID SEARCH - OPTIMIZING FOR HARD CATEGORY ACCURACY");
    println!("{}", "=".repeat(80));
    println!("Configurations: {}", config.grid.len());
    println!("Command: {}", config.eval_command().display());
    println!("Settings: {}", config.settings_path().display());
    println!();

    let summary = execute_sweep(config, Arc::new(ProcessExecutor))
        .await
        .context("Sweep failed")?;

    print_report(&summary.report);
    println!();
    println!("✓ Results saved to: {}", summary.report_path.display());
    println!("Duration: {}ms", summary.duration_ms);

    if let Some(error) = &summary.apply_error {
        println!("✗ Failed to apply best configuration: {}", error);
    } else if summary.applied.is_some() {
        println!(
            "\n✓ Best configuration applied to {}",
            config.settings_path().display()
        );
    }
    Ok(())
}

fn cmd_plan(config: &SweepConfig) -> Result<()> {
    println!("Grid ({} configurations):", config.grid.len());
    for (i, tuple) in config.grid.iter().enumerate() {
        println!("  {:>2}. {}", i + 1, tuple);
    }
    println!();
    println!("Grid digest: {}", config.grid_digest());
    println!("Command: {}", config.eval_command().display());
    println!("Results: {}", config.results_glob);
    match config.worst_case_secs() {
        Some(secs) => println!(
            "Worst case: {}s ({} x {}s timeout)",
            secs,
            config.grid.len(),
            config.timeout_secs
        ),
        None => println!("Worst case: unbounded (no timeout)"),
    }
    Ok(())
}

fn cmd_show(path: &Path) -> Result<()> {
    let report = read_report_json(path).context("Failed to read report")?;
    println!("Sweep: {}", report.sweep_id);
    println!("Generated: {}", report.generated_at.to_rfc3339());
    println!("Command: {}", report.command.join(" "));
    print_report(&report);
    Ok(())
}

fn cmd_apply(config: &SweepConfig, path: &Path) -> Result<()> {
    let report = read_report_json(path).context("Failed to read report")?;
    let _span = SweepSpan::enter(&report.sweep_id.to_string());
    let mut target = config.settings_target();

    info!(report = ?path, settings = ?target.path(), "Applying best configuration");
    let applied =
        apply_best(&report.ranking, &mut target).context("Failed to apply best configuration")?;
    match applied {
        Some(tuple) => println!("✓ Applied {} to {}", tuple, target.path().display()),
        None => println!("✗ Report has no successful run; settings unchanged"),
    }
    Ok(())
}

fn print_report(report: &SweepReport) {
    println!();
    println!("{}", "=".repeat(80));
    println!("OPTIMIZATION RESULTS (Sorted by Hard Category Accuracy)");
    println!("{}", "=".repeat(80));
    println!();
    print!("{}", render_ranking_table(&report.ranking));

    println!();
    println!(
        "Summary: {}/{} runs succeeded, {} failed",
        report.succeeded, report.total_runs, report.failed
    );
    for failure in &report.failures {
        println!(
            "  ✗ FACTS={}, ENTITIES={}, EPISODES={}: {} ({})",
            failure.facts,
            failure.entities,
            failure.episodes,
            failure.reason,
            failure.kind.as_str()
        );
    }

    if let Some(best) = report.best() {
        println!();
        println!("{}", "=".repeat(80));
        println!("BEST CONFIGURATION FOUND:");
        println!("{}", "=".repeat(80));
        print!("{}", render_best_summary(best));
    }
}
