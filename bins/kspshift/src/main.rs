//! Kspshift CLI
//!
//! Migrates Android Gradle build scripts from KAPT to KSP.

use anyhow::Result;
use clap::{Parser, Subcommand};
use kspshift_cli::output::{format_count, format_duration, Status};
use kspshift_cli::progress;
use kspshift_core::config::Config;
use kspshift_core::error::exit_codes;
use kspshift_gradle::report::{MigrationReport, RunMode};
use kspshift_gradle::rules::ProcessorSupport;
use kspshift_gradle::{GradleMigrator, RuleTable};
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "kspshift")]
#[command(about = "Migrate Gradle build scripts from KAPT to KSP")]
#[command(version)]
struct Cli {
    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Rule table overriding the embedded one
    #[arg(long, global = true)]
    rules: Option<PathBuf>,

    /// Emit the report as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Increase output verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report what a migration would do, without rewriting anything
    Analyze {
        /// Build scripts or directories to scan
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Rewrite build scripts from KAPT to KSP
    Migrate {
        /// Build scripts or directories to scan
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Preview the rewrite without writing files
        #[arg(long)]
        dry_run: bool,

        /// Write the rewritten script here instead of in place (single file only)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Print the active rule table
    Rules,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        owo_colors::set_override(false);
        colored::control::set_override(false);
    }

    if cli.verbose > 0 {
        let filter = if cli.verbose > 1 {
            "kspshift_gradle=trace,kspshift_core=trace"
        } else {
            "kspshift_gradle=debug,kspshift_core=debug"
        };
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = match Config::load(cli.config.as_deref().and_then(|p| p.to_str())) {
        Ok(c) => c,
        Err(e) => {
            Status::error(&format!("{}", e));
            std::process::exit(exit_codes::CONFIG_ERROR);
        }
    };

    let rules_path = cli
        .rules
        .clone()
        .or_else(|| config.schema.rules.path.as_ref().map(PathBuf::from));
    let rules = match RuleTable::load(rules_path.as_deref()) {
        Ok(t) => t,
        Err(e) => {
            Status::error(&format!("{}", e));
            std::process::exit(exit_codes::CONFIG_ERROR);
        }
    };

    let json = cli.json || config.schema.report.format == "json";

    let exit_code = match cli.command {
        Commands::Analyze { paths } => {
            run_pipeline(&paths, rules, RunMode::Analyze, None, &config, json, cli.quiet)
        }
        Commands::Migrate { paths, dry_run, out } => {
            let mode = if dry_run { RunMode::DryRun } else { RunMode::Migrate };
            run_pipeline(&paths, rules, mode, out, &config, json, cli.quiet)
        }
        Commands::Rules => run_rules(&rules, json),
    };

    std::process::exit(exit_code);
}

fn run_pipeline(
    paths: &[PathBuf],
    rules: RuleTable,
    mode: RunMode,
    out: Option<PathBuf>,
    config: &Config,
    json: bool,
    quiet: bool,
) -> i32 {
    let started = Instant::now();

    let scripts = match GradleMigrator::collect_scripts(paths, &config.schema.scan.exclude) {
        Ok(s) => s,
        Err(e) => {
            Status::error(&format!("{}", e));
            return exit_codes::PARSE_ERROR;
        }
    };

    if scripts.is_empty() {
        Status::warning("No build scripts found");
        return exit_codes::SUCCESS;
    }

    if out.is_some() && scripts.len() > 1 {
        Status::error("--out only applies to a single build script");
        return exit_codes::CONFIG_ERROR;
    }

    let table_version = rules.table.version.clone();
    let migrator = GradleMigrator::new(rules, mode).with_output(out);

    let bar = (!quiet && !json && scripts.len() > 1)
        .then(|| progress::file_progress(scripts.len() as u64));

    let mut report = MigrationReport::new(mode, table_version);
    for script in &scripts {
        report.add(migrator.process_file(script));
        if let Some(bar) = &bar {
            bar.inc(1);
        }
    }
    if let Some(bar) = &bar {
        progress::finish_success(bar, "processed");
    }

    if json {
        match report.to_json() {
            Ok(out) => println!("{}", out),
            Err(e) => {
                Status::error(&format!("{}", e));
                return exit_codes::CONFIG_ERROR;
            }
        }
    } else if !quiet {
        report.print();
        println!(
            "Processed {} in {}",
            format_count(scripts.len(), "script", "scripts"),
            format_duration(started.elapsed())
        );
    }

    report.exit_code()
}

fn run_rules(rules: &RuleTable, json: bool) -> i32 {
    if json {
        match serde_json::to_string_pretty(rules) {
            Ok(out) => println!("{}", out),
            Err(e) => {
                Status::error(&format!("{}", e));
                return exit_codes::CONFIG_ERROR;
            }
        }
        return exit_codes::SUCCESS;
    }

    Status::header(&format!("Rule table {}", rules.table.version));

    println!();
    println!("Plugins:");
    for id in &rules.plugins.source_ids {
        println!("  {} → {}", id, rules.plugins.target_id);
    }
    println!(
        "  {} Kotlin → KSP version mapping(s)",
        rules.plugins.versions.len()
    );

    println!();
    println!("Configurations:");
    println!(
        "  {}<Variant> → {}<Variant>",
        rules.configurations.source_base, rules.configurations.target_base
    );

    println!();
    println!("Argument blocks:");
    println!(
        "  {} {{ {} {{ arg(...) }} }} → {} {{ arg(...) }}",
        rules.arguments.source_block, rules.arguments.nested_wrapper, rules.arguments.target_block
    );
    for setting in &rules.arguments.unsupported {
        println!("  {} has no equivalent", setting.name);
    }

    println!();
    println!("Processors:");
    for p in &rules.processors {
        let support = match p.support {
            ProcessorSupport::Native => "same artifact".to_string(),
            ProcessorSupport::Renamed => format!(
                "renamed to {}",
                p.replacement.as_deref().unwrap_or("<missing>")
            ),
            ProcessorSupport::Unsupported => "no KSP support".to_string(),
        };
        println!("  {} ({}): {}", p.name, p.artifact, support);
    }

    exit_codes::SUCCESS
}
