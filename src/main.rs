//! marfs-crawler - Parallel MarFS namespace crawler
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use marfs_crawler::config::{CliArgs, CrawlConfig};
use marfs_crawler::error::ConfigError;
use marfs_crawler::privilege::drop_privileges;
use marfs_crawler::progress::{print_header, print_summary, ProgressReporter};
use marfs_crawler::tree::{NamespaceTree, PosixStore};
use marfs_crawler::walker::CrawlCoordinator;
use std::fs::OpenOptions;
use std::path::Path;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            // --help and --version are reported through the error path too
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the run should count as a success
fn run(args: CliArgs) -> Result<bool> {
    setup_logging(args.log_file().map(|p| p.as_path()), args.verbose)?;

    let config = CrawlConfig::from_args(args).context("Invalid configuration")?;

    let tree_path = config
        .tree_config
        .clone()
        .ok_or(ConfigError::MissingTreeConfig)?;
    let tree = NamespaceTree::load(&tree_path).context("Failed to load namespace tree")?;
    info!(
        config = %tree_path.display(),
        mountpoint = %tree.mountpoint().display(),
        namespaces = tree.len(),
        "Loaded namespace tree"
    );
    drop_privileges().context("Failed to drop privileges")?;
    let store = PosixStore::new(tree.meta_root());

    let output = config.output_path.display().to_string();
    if config.show_progress {
        print_header(
            &tree.mountpoint().display().to_string(),
            config.targets.mode(),
            config.targets.len(),
            config.threads,
            &output,
        );
    }

    let fail_on_error = config.fail_on_error;
    let show_progress = config.show_progress;
    let output_path = config.output_path.clone();

    let coordinator = CrawlCoordinator::new(config, Arc::new(tree), Arc::new(store))
        .context("Failed to initialize crawler")?;

    let progress = show_progress.then(ProgressReporter::new);
    if let Some(ref p) = progress {
        p.set_status("Seeding targets...");
    }

    let result = coordinator.run(progress.as_ref()).context("Crawl failed")?;

    if let Some(ref p) = progress {
        p.finish_and_clear();
        let output_size = std::fs::metadata(&output_path).ok().map(|m| m.len());
        print_summary(&result, &output, output_size);
    }

    if fail_on_error && !result.is_clean() {
        error!(
            errors = result.errors,
            skipped = result.skipped,
            "Crawl was incomplete"
        );
        return Ok(false);
    }

    Ok(true)
}

fn setup_logging(log_file: Option<&Path>, verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("marfs_crawler=debug,warn")
    } else {
        EnvFilter::new("marfs_crawler=info,warn")
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| ConfigError::LogFile {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }

    Ok(())
}
