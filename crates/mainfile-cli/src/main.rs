//! Mainfile CLI - resolve files to parsers from the command line.
//!
//! The main entry point for the `mainfile` binary.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mainfile::{Matcher, RegistrySnapshot, ResolutionEngine, RuleSetConfig, DEFAULT_MAX_READ_BYTES};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "mainfile", version, about = "Assign files to parsers using declarative rule-sets")]
struct Cli {
    /// Rule-set configuration file (TOML, YAML, or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Maximum bytes of leading content a clause may read
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_READ_BYTES)]
    max_read_bytes: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve every file under a directory tree to a parser
    Resolve {
        /// Root directory to scan
        root: PathBuf,

        /// Emit the full assignment map as JSON instead of text
        #[arg(long)]
        json: bool,

        /// Also list files that matched no parser
        #[arg(long)]
        unmatched: bool,
    },
    /// List every rule-set a single file matches, in priority order
    Check {
        /// File to evaluate
        file: PathBuf,
    },
    /// Compile a configuration file and report problems
    Validate,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let snapshot = load_snapshot(&cli)?;
    tracing::debug!(rule_sets = snapshot.len(), "configuration loaded");
    let matcher = Matcher::new(cli.max_read_bytes, mainfile::DEFAULT_MAX_STRUCTURED_BYTES);

    match cli.command {
        Commands::Resolve { root, json, unmatched } => {
            let engine = ResolutionEngine::new(matcher);
            let result = engine
                .resolve_tree(&snapshot, &root)
                .with_context(|| format!("failed to scan {}", root.display()))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                for (path, parser) in result.matched() {
                    println!("{}\t{}", path.display(), parser);
                }
                if unmatched {
                    for path in result.unmatched() {
                        println!("{}\t-", path.display());
                    }
                }
                let total = result.len();
                let matched = result.matched().count();
                eprintln!("{matched}/{total} files matched");
            }
        }
        Commands::Check { file } => {
            let candidate = matcher.candidate(file.clone());
            let mut rule_sets: Vec<_> = snapshot.rule_sets().iter().enumerate().collect();
            rule_sets.sort_by_key(|(index, rs)| (rs.level(), *index));

            let mut any = false;
            for (_, rule_set) in rule_sets {
                if matcher.matches(&candidate, rule_set) {
                    let kind = if rule_set.is_alternative() { " (alternative)" } else { "" };
                    println!("{}\tlevel {}{}", rule_set.id(), rule_set.level(), kind);
                    any = true;
                }
            }
            if !any {
                eprintln!("{}: no rule-set matches", file.display());
                std::process::exit(1);
            }
        }
        Commands::Validate => {
            println!("{} rule-sets compiled", snapshot.len());
        }
    }

    Ok(())
}

fn load_snapshot(cli: &Cli) -> Result<RegistrySnapshot> {
    let path = cli
        .config
        .as_ref()
        .context("a rule-set configuration file is required (--config)")?;
    let config = RuleSetConfig::from_file(path)
        .with_context(|| format!("failed to load rule-sets from {}", path.display()))?;
    config
        .into_snapshot()
        .with_context(|| format!("invalid rule-set in {}", path.display()))
}
