//! Main CLI application structure

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use super::output::{Output, OutputFormat};
use super::{query, task};
use crate::storage::{Config, Project, SnapshotStore};

#[derive(Parser)]
#[command(name = "trellis")]
#[command(author, version, about = "Task hierarchy and dependency monitoring")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format (falls back to the global config default)
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Enable verbose output for debugging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new trellis project
    Init {
        /// Path to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: String,
    },

    /// Manage tasks
    #[command(subcommand)]
    Task(task::TaskCommands),

    /// Show project status overview
    Status,

    /// Show tasks ready to work on
    Ready,

    /// Show blocked tasks
    Blocked,

    /// Import a snapshot document and report what changed
    Sync {
        /// Path to the snapshot document to import
        file: PathBuf,
    },

    /// Show recorded monitoring events
    Events {
        /// Only the last N events
        #[arg(long)]
        tail: Option<usize>,
    },
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let format = match cli.format {
        Some(format) => format,
        None => Config::load_global()?.default_format,
    };
    let output = Output::new(format, cli.verbose);

    output.verbose("Trellis CLI starting");

    match cli.command {
        Commands::Init { path } => {
            output.verbose_ctx("init", &format!("Initializing project at: {}", path));
            let project = Project::init(&path)?;
            output.verbose_ctx(
                "init",
                &format!(
                    "Created .trellis directory at: {}",
                    project.trellis_dir().display()
                ),
            );
            output.success(&format!(
                "Initialized trellis project at {}",
                project.root().display()
            ));
        }

        Commands::Task(cmd) => task::run(cmd, &output)?,

        Commands::Status => {
            output.verbose("Gathering project status");
            query::status(&output)?
        }
        Commands::Ready => {
            output.verbose("Querying ready tasks");
            query::ready(&output)?
        }
        Commands::Blocked => {
            output.verbose("Querying blocked tasks");
            query::blocked(&output)?
        }

        Commands::Sync { file } => sync(&output, &file)?,

        Commands::Events { tail } => {
            output.verbose_ctx("events", &format!("tail: {:?}", tail));
            query::events(&output, tail)?
        }
    }

    output.verbose("Command completed successfully");
    Ok(())
}

/// Imports an external snapshot document as the new state and runs one
/// monitor cycle against it, so every add/update/completion/removal made
/// outside the CLI gets classified and logged
fn sync(output: &Output, file: &std::path::Path) -> Result<()> {
    let document = SnapshotStore::new(file)
        .load()?
        .with_context(|| format!("Snapshot document not found: {}", file.display()))?;

    output.verbose_ctx(
        "sync",
        &format!(
            "importing {} task(s) from {}",
            document.task_count(),
            file.display()
        ),
    );
    if !document.totals_consistent() {
        output.verbose_ctx(
            "sync",
            &format!(
                "document declares {} tasks but holds {}",
                document.metadata.total_tasks,
                document.task_count()
            ),
        );
    }

    let mut session = task::Session::open(output)?;
    session.set_store(document.into_store());
    let events = session.commit(output)?;

    if output.is_json() {
        output.data(&events);
    } else if events.is_empty() {
        output.success("Sync complete: no changes");
    } else {
        output.success(&format!("Sync complete: {} change(s)", events.len()));
        for event in &events {
            output.verbose_ctx("sync", &format!("{:?}", event.kind));
        }
    }

    Ok(())
}
