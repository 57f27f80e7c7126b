use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, Level};

mod config;
mod error;
mod matcher;
mod models;
mod normalize;
mod pipeline;
mod processing_log;
mod reference;
mod report;
mod source;
mod telemetry;

use config::Config;

#[derive(Parser)]
#[command(name = "skill-certificates")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Builds certificate skill text from exam grades and a skills reference", long_about = None)]
struct Cli {
    /// Enable debug diagnostics
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted diagnostics and a JSON run summary
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Match a student roster against the skills reference and write the results
    Process {
        /// Student roster CSV
        #[arg(long)]
        students: PathBuf,
        /// Skills reference CSV (flat or one column per grade)
        #[arg(long)]
        reference: PathBuf,
        /// Output CSV with the appended result column
        #[arg(long, default_value = "certificates.csv")]
        out: PathBuf,
        /// Write the processing log here instead of stdout
        #[arg(long)]
        log: Option<PathBuf>,
        /// Write a markdown run summary
        #[arg(long)]
        report: Option<PathBuf>,
        /// JSON config file
        #[arg(long, env = "SKILL_CERTIFICATES_CONFIG")]
        config: Option<PathBuf>,
        /// Only accept exact or aliased discipline names
        #[arg(long)]
        no_substring_fallback: bool,
        /// Keep every grade of a repeated discipline instead of only the highest
        #[arg(long)]
        no_best_grade_wins: bool,
        /// Text written for students with no matching skills
        #[arg(long)]
        placeholder: Option<String>,
    },
    /// Show what the skills reference resolves to
    InspectReference {
        #[arg(long)]
        reference: PathBuf,
        #[arg(long, env = "SKILL_CERTIFICATES_CONFIG")]
        config: Option<PathBuf>,
    },
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Ok(Config::load(path)?),
        None => Ok(Config::default()),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    telemetry::init_tracing(cli.json, level);

    match cli.command {
        Commands::Process {
            students,
            reference,
            out,
            log,
            report,
            config,
            no_substring_fallback,
            no_best_grade_wins,
            placeholder,
        } => {
            let mut config = load_config(config.as_deref())?;
            if no_substring_fallback {
                config.matching.substring_fallback = false;
            }
            if no_best_grade_wins {
                config.matching.best_grade_wins = false;
            }
            if let Some(placeholder) = placeholder {
                config.empty_placeholder = placeholder;
            }

            let reference_source = source::load_reference(&reference, &config.columns)
                .with_context(|| format!("failed to load reference {}", reference.display()))?;
            let student_table = source::load_students(&students, &config.columns)
                .with_context(|| format!("failed to load students {}", students.display()))?;
            info!(
                reference_rows = reference_source.rows.len(),
                students = student_table.records.len(),
                "sources loaded"
            );

            let digest = reference_source.digest.clone();
            let output = pipeline::run(reference_source, &student_table, &config);

            source::save_output(&out, &output.table)
                .with_context(|| format!("failed to write {}", out.display()))?;

            match log {
                Some(path) => {
                    std::fs::write(&path, output.log.render() + "\n")
                        .with_context(|| format!("failed to write {}", path.display()))?;
                }
                None => println!("{}", output.log.render()),
            }

            if let Some(path) = report {
                let summary = report::build_report(
                    &digest,
                    chrono::Utc::now(),
                    &output.stats,
                    &output.results,
                );
                std::fs::write(&path, summary)?;
                println!("Report written to {}.", path.display());
            }

            if cli.json {
                println!("{}", serde_json::to_string(&output.stats)?);
            } else {
                println!(
                    "Processed {} students ({} without matching skills). Results written to {}.",
                    output.stats.students,
                    output.stats.empty_results,
                    out.display()
                );
            }
        }
        Commands::InspectReference { reference, config } => {
            let config = load_config(config.as_deref())?;
            let reference_source = source::load_reference(&reference, &config.columns)
                .with_context(|| format!("failed to load reference {}", reference.display()))?;
            let shape = reference_source.shape;
            let digest = reference_source.digest.clone();
            let mut log = reference_source.log;
            let (index, index_log) = pipeline::build_index(reference_source.rows, &config);
            log.extend(index_log);

            println!("Reference {} ({:?}, sha256 {})", reference.display(), shape, digest);
            if index.is_empty() {
                println!("No usable rows found.");
            }
            for discipline in index.disciplines() {
                let grades: Vec<&str> = index
                    .grades_for(discipline)
                    .iter()
                    .map(|grade| grade.label())
                    .collect();
                println!("- {}: {}", discipline, grades.join(", "));
            }
            for line in log.lines() {
                println!("{line}");
            }
        }
    }

    Ok(())
}
