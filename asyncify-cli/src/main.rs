//! Asyncify CLI - rewrites blocking `Promise.await` calls into native `await`

#![deny(warnings)]

// Global invariants enforced:
// - Files are transformed independently; the report store is the only shared sink
// - A file is written back only when its text changed
// - Results are printed in sorted path order regardless of scheduling

mod files;

use anyhow::Context;
use asyncify_core::config::{self, ResolvedConfig};
use asyncify_core::{transform_and_record, transform_source, ReportStore, TransformOptions, Transformed};
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "asyncify")]
#[command(about = "Rewrite blocking Promise.await(...) calls into native async/await")]
#[command(version = env!("ASYNCIFY_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transform source files in place (JavaScript, TypeScript, JSX, TSX)
    Run {
        /// Source files or directories
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Transform and report without writing any file
        #[arg(long)]
        dry_run: bool,

        /// Print the transformed text of changed files to stdout
        #[arg(long)]
        print: bool,

        /// Report store location (overrides config file)
        #[arg(long)]
        report: Option<PathBuf>,

        /// Path to config file (default: auto-discover)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Number of worker threads (default: one per CPU)
        #[arg(long)]
        jobs: Option<usize>,
    },
    /// Validate or inspect configuration
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate a config file without transforming anything
    Validate {
        /// Path to config file (default: auto-discover from current directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Show the resolved configuration (merged defaults + config file)
    Show {
        /// Path to config file (default: auto-discover from current directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

/// What happened to one file
enum FileStatus {
    Unchanged,
    Changed(Transformed),
    Failed,
}

struct RunFlags {
    dry_run: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            paths,
            dry_run,
            print,
            report,
            config: config_path,
            jobs,
        } => {
            let cwd = std::env::current_dir()?;
            let mut roots = Vec::with_capacity(paths.len());
            for path in paths {
                let normalized = if path.is_relative() { cwd.join(&path) } else { path };
                if !normalized.exists() {
                    anyhow::bail!("Path does not exist: {}", normalized.display());
                }
                roots.push(normalized);
            }

            let project_root = roots
                .first()
                .and_then(|root| find_project_root(root))
                .unwrap_or_else(|| cwd.clone());
            let resolved = config::load_and_resolve(&project_root, config_path.as_deref())
                .context("failed to load configuration")?;

            if let Some(config_path) = &resolved.config_path {
                log::info!("Using config: {}", config_path.display());
            }

            // CLI flags override config file values
            let report_path = report.unwrap_or_else(|| resolved.report_path.clone());
            let report_path = if report_path.is_relative() {
                cwd.join(report_path)
            } else {
                report_path
            };

            let files = collect_files(&roots, &project_root, &resolved)?;
            if files.is_empty() {
                log::warn!("no source files found");
                return Ok(());
            }

            let options = TransformOptions::from_config(&resolved);
            let store = if dry_run {
                None
            } else {
                Some(ReportStore::open(&report_path)?)
            };

            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(jobs.unwrap_or(0))
                .build()
                .context("failed to start worker threads")?;
            let flags = RunFlags { dry_run };
            let statuses: Vec<FileStatus> = pool.install(|| {
                files
                    .par_iter()
                    .map(|path| process_file(path, &cwd, &options, store.as_ref(), &flags))
                    .collect()
            });

            if let Some(store) = store {
                store.close()?;
            }

            let mut changed = 0;
            let mut failed = 0;
            let mut rewritten = 0;
            for (path, status) in files.iter().zip(&statuses) {
                match status {
                    FileStatus::Changed(transformed) => {
                        changed += 1;
                        rewritten += transformed.rewritten_calls;
                        if print {
                            println!("// {}", display_path(path, &cwd));
                            print!("{}", transformed.code);
                        }
                    }
                    FileStatus::Failed => failed += 1,
                    FileStatus::Unchanged => {}
                }
            }

            eprintln!(
                "{} files: {} changed, {} unchanged, {} failed ({} calls rewritten)",
                files.len(),
                changed,
                files.len() - changed - failed,
                failed,
                rewritten
            );
            if !dry_run && changed > 0 {
                eprintln!("Report: {}", report_path.display());
            }

            if failed > 0 {
                std::process::exit(1);
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Validate { path } => {
                let project_root = std::env::current_dir()?;
                let resolved = config::load_and_resolve(&project_root, path.as_deref());

                match resolved {
                    Ok(config) => {
                        if let Some(ref p) = config.config_path {
                            println!("Config valid: {}", p.display());
                        } else {
                            println!("No config file found. Using defaults.");
                        }
                    }
                    Err(e) => {
                        eprintln!("Config validation failed: {:#}", e);
                        std::process::exit(1);
                    }
                }
            }
            ConfigAction::Show { path } => {
                let project_root = std::env::current_dir()?;
                let resolved = config::load_and_resolve(&project_root, path.as_deref())
                    .context("failed to load configuration")?;

                println!("Configuration:");
                if let Some(ref p) = resolved.config_path {
                    println!("  Source: {}", p.display());
                } else {
                    println!("  Source: defaults (no config file found)");
                }
                println!();
                println!("Rewrite:");
                println!("  call: {}(...)", resolved.pattern.display());
                println!("  report: {}", resolved.report_path.display());
                println!("  report_skip_only_files: {}", resolved.report_skip_only_files);
                println!();
                println!("Filters:");
                println!(
                    "  include: {}",
                    if resolved.include.is_some() {
                        "custom patterns"
                    } else {
                        "all files"
                    }
                );
                println!(
                    "  exclude: active ({} patterns)",
                    if resolved.config_path.is_some() {
                        "custom"
                    } else {
                        "default"
                    }
                );
            }
        },
    }

    Ok(())
}

/// Collect, filter and deduplicate source files across all roots
fn collect_files(roots: &[PathBuf], project_root: &Path, resolved: &ResolvedConfig) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for root in roots {
        files.extend(files::collect_source_files(root)?);
    }

    // Patterns are written relative to the project root
    files.retain(|path| {
        let relative = path.strip_prefix(project_root).unwrap_or(path);
        resolved.should_include(relative)
    });
    files.sort();
    files.dedup();

    Ok(files)
}

/// Transform one file and write it back when it changed
fn process_file(
    path: &Path,
    cwd: &Path,
    options: &TransformOptions<'_>,
    store: Option<&ReportStore>,
    flags: &RunFlags,
) -> FileStatus {
    let label = display_path(path, cwd);

    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            log::warn!("skipping {}: failed to read: {}", label, e);
            return FileStatus::Failed;
        }
    };

    let result = match store {
        Some(store) => transform_and_record(&label, &source, options, store).map(|outcome| {
            if let Some(e) = outcome.report_error {
                log::warn!("failed to record report for {}: {:#}", label, e);
            }
            outcome.transformed
        }),
        None => transform_source(&label, &source, options),
    };

    let transformed = match result {
        Ok(transformed) => transformed,
        Err(e) => {
            log::warn!("skipping file {}: {:#}", label, e);
            return FileStatus::Failed;
        }
    };

    if !transformed.changed {
        return FileStatus::Unchanged;
    }

    if !flags.dry_run {
        if let Err(e) = std::fs::write(path, &transformed.code) {
            log::warn!("failed to write {}: {}", label, e);
            return FileStatus::Failed;
        }
    }

    FileStatus::Changed(transformed)
}

/// Path as shown in logs and reports: relative to the working directory when possible
fn display_path(path: &Path, cwd: &Path) -> String {
    path.strip_prefix(cwd)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Find the nearest ancestor holding a package.json or a .git directory
fn find_project_root(start_path: &Path) -> Option<PathBuf> {
    let mut current = if start_path.is_file() {
        start_path.parent()?.to_path_buf()
    } else {
        start_path.to_path_buf()
    };

    loop {
        if current.join("package.json").exists() || current.join(".git").exists() {
            return Some(current);
        }

        current = current.parent()?.to_path_buf();
    }
}
