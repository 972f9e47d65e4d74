//! Output formatting and styling module.
//!
//! All human-facing output goes through [`OutputFormatter`], so the CLI has
//! one place that decides colors, symbols, and layout.

use crate::organizer::RunReport;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;

/// Manages all CLI output with consistent styling and formatting.
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use dirsort::output::OutputFormatter;
    /// OutputFormatter::success("Sorting complete");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Creates a progress bar for the routing phase. Its length is set once
    /// the scan knows how many files there are.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use dirsort::output::OutputFormatter;
    /// let pb = OutputFormatter::create_progress_bar(0);
    /// pb.set_length(100);
    /// pb.inc(1);
    /// pb.finish_and_clear();
    /// ```
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");
        pb.set_style(style);
        pb
    }

    /// Prints a table of file counts per category label.
    pub fn summary_table(category_counts: &BTreeMap<String, usize>, total_files: usize) {
        Self::header("SUMMARY");

        let max_category_len = category_counts
            .keys()
            .map(|name| name.len())
            .max()
            .unwrap_or(0)
            .max(8); // "Category"

        println!(
            "{:<width$} | {}",
            "Category".bold(),
            "Files".bold(),
            width = max_category_len
        );
        println!("{}", "-".repeat(max_category_len + 10));

        for (category, count) in category_counts {
            println!(
                "{:<width$} | {} {}",
                category,
                count.to_string().green(),
                plural(*count),
                width = max_category_len
            );
        }

        println!("{}", "-".repeat(max_category_len + 10));
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total_files.to_string().green().bold(),
            plural(total_files),
            width = max_category_len
        );
    }

    /// Prints everything a finished run has to report.
    pub fn run_summary(report: &RunReport) {
        Self::summary_table(&report.categories, report.total_files());

        Self::header("EXTENSIONS");
        println!("  known:   {}", join_or_dash(&report.extensions));
        println!("  unknown: {}", join_or_dash(&report.unknown_extensions));

        println!();
        if report.mirrored > 0 {
            Self::info(&format!("Mirrored {} {}", report.mirrored, plural(report.mirrored)));
        }
        Self::success(&format!(
            "Placed {} {}, extracted {} {}",
            report.placed,
            plural(report.placed),
            report.extracted,
            if report.extracted == 1 { "archive" } else { "archives" }
        ));
        if !report.cleanup.removed.is_empty() {
            Self::success(&format!(
                "Removed {} empty {}",
                report.cleanup.removed.len(),
                if report.cleanup.removed.len() == 1 { "folder" } else { "folders" }
            ));
        }

        for rejected in &report.not_archives {
            Self::warning(&format!(
                "Not an archive: {} ({})",
                rejected.path.display(),
                rejected.reason
            ));
        }
        for kept in &report.cleanup.failures {
            Self::warning(&format!(
                "Cannot delete folder {}: {}",
                kept.path.display(),
                kept.reason
            ));
        }
        for failure in &report.failures {
            Self::error(&format!("{}: {}", failure.path.display(), failure.reason));
        }
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}

fn join_or_dash(items: &[String]) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join(", ")
    }
}
