//! stackscope: inspect profiling traces from the command line.

mod commands;

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use env_logger::Env;
use stackscope_core::flamegraph::FlamegraphSort;
use stackscope_core::model::ProfileGroup;
use stackscope_core::views::RankedSort;

/// Import profiles and print their layout, rankings, and differences
#[derive(Parser, Debug)]
#[command(name = "stackscope")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Threads, durations, and sample counts of a trace
    Summary {
        file: PathBuf,
    },

    /// Lay out one profile as flamegraph rows
    Layout {
        file: PathBuf,

        /// call-order, left-heavy, or alphabetical
        #[arg(short, long, default_value = "call-order")]
        sort: FlamegraphSort,

        /// Thread to lay out instead of the active one
        #[arg(short, long)]
        thread: Option<u64>,

        /// Emit the frames as JSON
        #[arg(long)]
        json: bool,
    },

    /// Frames ranked by weight
    Rank {
        file: PathBuf,

        /// self, total, name, or count
        #[arg(short, long, default_value = "self")]
        by: RankedSort,

        /// Reverse the order
        #[arg(long)]
        ascending: bool,

        #[arg(short, long, default_value = "20")]
        limit: usize,

        #[arg(short, long)]
        thread: Option<u64>,
    },

    /// Compare frame occurrences between two traces
    Diff {
        reference: PathBuf,
        candidate: PathBuf,

        #[arg(short, long, default_value = "call-order")]
        sort: FlamegraphSort,

        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

fn load(path: &Path, sort: FlamegraphSort) -> Result<ProfileGroup> {
    let data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    commands::import(&data, sort).with_context(|| format!("importing {}", path.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(Env::new().filter_or("STACKSCOPE_LOG", log_level)).init();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::Summary { file } => {
            let group = load(&file, FlamegraphSort::CallOrder)?;
            commands::summary(&group, &mut out)?;
        }
        Commands::Layout {
            file,
            sort,
            thread,
            json,
        } => {
            let group = load(&file, sort)?;
            let profile = commands::select_profile(&group, thread)?;
            commands::layout(profile, sort, json, &mut out)?;
        }
        Commands::Rank {
            file,
            by,
            ascending,
            limit,
            thread,
        } => {
            let group = load(&file, FlamegraphSort::CallOrder)?;
            let profile = commands::select_profile(&group, thread)?;
            commands::rank(profile, by, ascending, limit, &mut out)?;
        }
        Commands::Diff {
            reference,
            candidate,
            sort,
            limit,
        } => {
            let before = load(&reference, sort)?;
            let after = load(&candidate, sort)?;
            commands::diff(
                commands::select_profile(&before, None)?,
                commands::select_profile(&after, None)?,
                sort,
                limit,
                &mut out,
            )?;
        }
    }

    out.flush()?;
    Ok(())
}
