//! Progress reporting for the crawler
//!
//! Provides a live spinner using indicatif and a styled header and summary.

use crate::walker::{CrawlProgress, CrawlResult};
use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner showing crawl status
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Create and start a spinner
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();

        let spinner = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
        bar.set_style(spinner);
        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Refresh the spinner message
    pub fn update(&self, progress: &CrawlProgress) {
        let msg = format!(
            "Dirs: {} | Files: {} | Recorded: {} | Cache hits: {} | Rate: {:.0}/s | Queue: {} | Errors: {}",
            format_number(progress.dirs),
            format_number(progress.files),
            format_number(progress.recorded),
            format_number(progress.cache_hits),
            progress.files_per_second(),
            progress.queue_size,
            format_number(progress.errors),
        );

        self.bar.set_message(msg);
    }

    /// Set a status message
    pub fn set_status(&self, status: &str) {
        self.bar.set_message(status.to_string());
    }

    /// Finish and clear the spinner
    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a number with thousands separators
pub fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Print a header at the start of the crawl
pub fn print_header(mountpoint: &str, mode: &str, targets: usize, threads: usize, output: &str) {
    println!();
    println!(
        "{} {}",
        style("marfs-crawler").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Mountpoint:").bold(), mountpoint);
    println!("  {} {} {}", style("Targets:").bold(), targets, mode);
    println!("  {} {}", style("Threads:").bold(), threads);
    println!("  {} {}", style("Output:").bold(), output);
    println!();
}

/// Print a summary of the crawl results
pub fn print_summary(result: &CrawlResult, output: &str, output_size: Option<u64>) {
    let duration_secs = result.duration.as_secs_f64();
    let rate = if duration_secs > 0.0 {
        result.files as f64 / duration_secs
    } else {
        0.0
    };

    let title = if result.is_clean() {
        style("Crawl Complete").green().bold()
    } else {
        style("Crawl Complete (with errors)").yellow().bold()
    };

    println!();
    println!("{}", title);
    println!("{}", style("─".repeat(50)).dim());
    println!(
        "  {} {}",
        style("Directories:").bold(),
        format_number(result.directories)
    );
    println!("  {} {}", style("Files:").bold(), format_number(result.files));
    println!(
        "  {} {}",
        style("Recorded:").bold(),
        format_number(result.objects_recorded)
    );
    println!(
        "  {} {}",
        style("Cache hits:").bold(),
        format_number(result.cache_hits)
    );
    println!(
        "  {} {:.1}s ({:.0} files/sec)",
        style("Duration:").bold(),
        duration_secs,
        rate
    );
    if result.errors > 0 {
        println!(
            "  {} {}",
            style("Errors:").red().bold(),
            format_number(result.errors)
        );
    }
    if result.skipped > 0 {
        println!(
            "  {} {}",
            style("Skipped:").yellow().bold(),
            format_number(result.skipped)
        );
    }
    match output_size {
        Some(size) => println!(
            "  {} {} ({} lines, {})",
            style("Output:").bold(),
            output,
            format_number(result.entries_written),
            format_size(size, BINARY)
        ),
        None => println!("  {} {}", style("Output:").bold(), output),
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(131072), "131,072");
        assert_eq!(format_number(1234567890), "1,234,567,890");
    }
}
