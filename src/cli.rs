//! Command-line interface for dirsort.
//!
//! Parses arguments, layers them over the loaded configuration, runs the
//! [`Organizer`], and prints the result either as a summary or as JSON.

use crate::config::SortConfig;
use crate::file_organizer::TransferMode;
use crate::organizer::{Organizer, RunReport};
use crate::output::OutputFormatter;
use clap::Parser;
use indicatif::ProgressBar;
use std::path::PathBuf;

/// Sort a directory tree into category folders.
#[derive(Debug, Clone, Parser)]
#[command(name = "dirsort", version, about)]
pub struct Cli {
    /// Directory to sort.
    pub source: PathBuf,

    /// Where the category tree and the by-extension mirror are written.
    #[arg(short, long, default_value = "dist")]
    pub output: PathBuf,

    /// Configuration file; defaults to .dirsortrc.toml or
    /// ~/.config/dirsort/config.toml.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Move files into the category tree instead of copying them.
    #[arg(long = "move")]
    pub move_files: bool,

    /// Skip the by-extension mirror copy.
    #[arg(long)]
    pub no_mirror: bool,

    /// Leave emptied source directories in place.
    #[arg(long)]
    pub no_cleanup: bool,

    /// Worker threads (0 = one per CPU).
    #[arg(short = 'j', long)]
    pub threads: Option<usize>,

    /// Print the run report as JSON instead of a summary.
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Applies command-line overrides on top of `config`.
    pub fn apply(&self, config: &mut SortConfig) {
        let settings = &mut config.organizer;
        if self.move_files {
            settings.mode = TransferMode::Move;
        }
        if self.no_mirror {
            settings.mirror = false;
        }
        if self.no_cleanup {
            settings.cleanup = false;
        }
        if let Some(threads) = self.threads {
            settings.threads = threads;
        }
    }
}

/// Runs one sort as described by `cli`.
///
/// # Examples
///
/// ```no_run
/// use clap::Parser;
/// use dirsort::cli::{Cli, run_cli};
///
/// let cli = Cli::parse_from(["dirsort", "Downloads", "--output", "sorted"]);
/// if let Err(e) = run_cli(&cli) {
///     eprintln!("Error: {}", e);
/// }
/// ```
pub fn run_cli(cli: &Cli) -> Result<RunReport, String> {
    let mut config = SortConfig::load(cli.config.as_deref())
        .map_err(|e| format!("Error loading configuration: {}", e))?;
    cli.apply(&mut config);

    let organizer = Organizer::new(&config).map_err(|e| e.to_string())?;

    let progress = if cli.json {
        ProgressBar::hidden()
    } else {
        OutputFormatter::info(&format!(
            "Sorting {} into {}",
            cli.source.display(),
            cli.output.display()
        ));
        OutputFormatter::create_progress_bar(0)
    };

    let result = organizer.run_with_progress(&cli.source, &cli.output, &progress);
    progress.finish_and_clear();
    let report = result.map_err(|e| e.to_string())?;

    if cli.json {
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| format!("Error serializing report: {}", e))?;
        println!("{}", json);
    } else {
        OutputFormatter::run_summary(&report);
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["dirsort", "inbox"]);
        assert_eq!(cli.source, PathBuf::from("inbox"));
        assert_eq!(cli.output, PathBuf::from("dist"));
        assert!(!cli.move_files);
        assert!(!cli.json);
        assert_eq!(cli.threads, None);
    }

    #[test]
    fn test_overrides_apply_to_config() {
        let cli = Cli::parse_from([
            "dirsort",
            "inbox",
            "--move",
            "--no-mirror",
            "--no-cleanup",
            "-j",
            "3",
        ]);
        let mut config = SortConfig::default();
        cli.apply(&mut config);

        assert_eq!(config.organizer.mode, TransferMode::Move);
        assert!(!config.organizer.mirror);
        assert!(!config.organizer.cleanup);
        assert_eq!(config.organizer.threads, 3);
    }

    #[test]
    fn test_absent_flags_keep_config_values() {
        let cli = Cli::parse_from(["dirsort", "inbox"]);
        let mut config = SortConfig::from_toml("[organizer]\nthreads = 5\nmirror = false\n").unwrap();
        cli.apply(&mut config);

        assert_eq!(config.organizer.threads, 5);
        assert!(!config.organizer.mirror);
        assert!(config.organizer.cleanup);
    }
}
