mod error_formatter;
mod formatter;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use formatter::Formatter;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use tsd::ProgramState;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "tsd")]
#[command(about = "Check and export TSD rule programs.")]
#[command(
    long_about = "TSD declares types, actions, facts and production rules for a RETE-style runtime.\nThe CLI loads .tsd sources into one program, reports every rejected declaration and exports the accepted program as JSON."
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and validate sources, reporting every error
    ///
    /// Rejected declarations are reported but do not fail the command.
    Check {
        /// A .tsd file or a directory of .tsd files
        path: Option<PathBuf>,
        /// Directory to search when no path is given
        #[arg(short = 'd', long = "dir", default_value = ".")]
        workdir: PathBuf,
    },
    /// Print the accepted program as JSON
    Export {
        /// A .tsd file or a directory of .tsd files
        path: Option<PathBuf>,
        /// Directory to search when no path is given
        #[arg(short = 'd', long = "dir", default_value = ".")]
        workdir: PathBuf,
        /// Pretty-print the JSON
        #[arg(short, long)]
        pretty: bool,
    },
    /// Show counts of accepted declarations
    Stats {
        /// A .tsd file or a directory of .tsd files
        path: Option<PathBuf>,
        /// Directory to search when no path is given
        #[arg(short = 'd', long = "dir", default_value = ".")]
        workdir: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Check { path, workdir } => check_command(target(path, workdir)),
        Commands::Export {
            path,
            workdir,
            pretty,
        } => export_command(target(path, workdir), *pretty),
        Commands::Stats { path, workdir } => stats_command(target(path, workdir)),
    };

    if let Err(e) = result {
        if let Some(tsd_err) = e.downcast_ref::<tsd::TsdError>() {
            eprintln!("{}", error_formatter::format_error(tsd_err));
        } else {
            eprintln!("Error: {:#}", e);
        }
        std::process::exit(1);
    }
}

fn target<'a>(path: &'a Option<PathBuf>, workdir: &'a Path) -> &'a Path {
    path.as_deref().unwrap_or(workdir)
}

fn check_command(root: &Path) -> Result<()> {
    let (state, sources) = load_workspace(root)?;
    report_errors(&state, &sources);

    let stats = state.get_parsing_statistics();
    println!(
        "{} file(s): {} type(s), {} action(s), {} fact(s), {} rule(s), {} error(s)",
        stats.files_parsed, stats.types, stats.actions, stats.facts, stats.rules, stats.errors
    );
    Ok(())
}

fn export_command(root: &Path, pretty: bool) -> Result<()> {
    let (state, sources) = load_workspace(root)?;
    report_errors(&state, &sources);

    let json = state.to_normalized_program().to_json_string(pretty)?;
    println!("{}", json);
    Ok(())
}

fn stats_command(root: &Path) -> Result<()> {
    let (state, _) = load_workspace(root)?;
    let formatter = Formatter::default();
    print!("{}", formatter.format_statistics(&state.get_parsing_statistics()));
    Ok(())
}

fn report_errors(state: &ProgramState, sources: &[(String, String)]) {
    for error in state.get_errors() {
        let source = sources
            .iter()
            .find(|(name, _)| *name == error.file)
            .map(|(_, text)| text.as_str());
        eprintln!("{}", error_formatter::format_validation_error(&error, source));
    }
}

/// Collect .tsd sources under `root`, sorted by path
fn collect_sources(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        bail!("path {} does not exist", root.display());
    }
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file()
            && entry.path().extension().and_then(|s| s.to_str()) == Some("tsd")
        {
            files.push(entry.path().to_path_buf());
        }
    }
    Ok(files)
}

/// Merge every source into one program, keeping the text for error reports
fn load_workspace(root: &Path) -> Result<(ProgramState, Vec<(String, String)>)> {
    let mut state = ProgramState::new();
    let mut sources = Vec::new();

    for path in collect_sources(root)? {
        let source_id = path.to_string_lossy().to_string();
        debug!(file = %source_id, "loading source");
        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read file {}", path.display()))?;
        if content.is_empty() {
            state.parse_and_merge(&path)?;
        } else {
            state.parse_and_merge_content(&content, &source_id)?;
        }
        sources.push((source_id, content));
    }

    Ok((state, sources))
}
