//! Timetabler CLI
//!
//! - `generate`: build a week for a scope and replace its persisted rows
//! - `show`: print the persisted rows of a scope

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use timetabler::{
    generate, regenerate_scope, Catalogue, FileStore, RunError, RunSummary, Scope,
    TimetableConfig, TimetableStore,
};

#[derive(Parser)]
#[command(name = "timetabler")]
#[command(about = "Generate and persist weekly school timetables", long_about = None)]
struct Cli {
    /// Increase log detail (-v changes, -vv checks, -vvv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a timetable and replace the scope's persisted rows
    Generate {
        /// Scope to regenerate (e.g. 2024-fall)
        #[arg(short, long)]
        scope: Scope,

        /// Catalogue of subjects, classes and teachers (TOML, or JSON by extension)
        #[arg(short = 'i', long)]
        catalogue: PathBuf,

        /// Config file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory of the file store; overrides the config
        #[arg(long)]
        store_dir: Option<PathBuf>,

        /// Backtracking step limit; overrides the config
        #[arg(long)]
        backtrack_budget: Option<usize>,

        /// Run the search but persist nothing
        #[arg(long)]
        dry_run: bool,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the persisted timetable of a scope
    Show {
        #[arg(short, long)]
        scope: Scope,

        /// Config file (TOML), used for the store directory
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(long)]
        store_dir: Option<PathBuf>,

        /// Print rows as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            let code = err.downcast_ref::<RunError>().map_or(1, RunError::exit_code);
            ExitCode::from(code)
        }
    }
}

fn init_tracing(verbose: u8) {
    let fallback = match verbose {
        0 => "warn,timetabler::audit=info",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)))
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<TimetableConfig> {
    match path {
        Some(path) => TimetableConfig::from_file(path)
            .map_err(RunError::from)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(TimetableConfig::default()),
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Generate {
            scope,
            catalogue,
            config,
            store_dir,
            backtrack_budget,
            dry_run,
            json,
        } => {
            let mut config = load_config(config.as_ref())?;
            config.engine.verbosity = config.engine.verbosity.max(cli.verbose);
            if backtrack_budget.is_some() {
                config.engine.backtrack_budget = backtrack_budget;
            }
            let catalogue = Catalogue::from_file(&catalogue)
                .map_err(RunError::from)
                .with_context(|| format!("loading catalogue {}", catalogue.display()))?;

            let summary = if dry_run {
                config.period_clock().map_err(RunError::from)?;
                let outcome = generate(&catalogue, &config).map_err(RunError::from)?;
                RunSummary::new(&scope, &outcome, None)
            } else {
                let store = FileStore::new(store_dir.unwrap_or_else(|| config.store.dir.clone()));
                regenerate_scope(&store, &scope, &catalogue, &config)?
            };
            print_summary(&summary, json)
        }
        Commands::Show {
            scope,
            config,
            store_dir,
            json,
        } => {
            let config = load_config(config.as_ref())?;
            let store = FileStore::new(store_dir.unwrap_or(config.store.dir));
            let rows = store.load(&scope).map_err(RunError::from)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
                return Ok(());
            }
            if rows.is_empty() {
                println!("Scope {scope} has no persisted timetable");
                return Ok(());
            }
            for row in &rows {
                println!(
                    "{} {}-{}  {:<8} {:<10} {}",
                    row.day,
                    row.start.format("%H:%M"),
                    row.end.format("%H:%M"),
                    row.class_id,
                    row.subject,
                    row.teacher_id
                );
            }
            Ok(())
        }
    }
}

fn print_summary(summary: &RunSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    match summary.replaced_count {
        Some(replaced) => println!(
            "Scope {}: {} lessons persisted, {} replaced",
            summary.scope, summary.entry_count, replaced
        ),
        None => println!(
            "Scope {}: {} lessons placed (dry run, nothing persisted)",
            summary.scope, summary.entry_count
        ),
    }
    println!(
        "Backtracking: {} of {} steps ({} stranded after first pass)",
        summary.stats.backtrack_steps, summary.stats.backtrack_budget, summary.stats.stranded_after_pass
    );
    println!("Teacher load:");
    for (teacher, load) in &summary.teacher_load {
        println!("  {teacher:<12} {load}");
    }
    Ok(())
}
