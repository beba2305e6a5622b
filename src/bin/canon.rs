//! Datatype Canonicalization CLI
//!
//! Canonicalizes topic datatypes, extracts closures and explains why two
//! topics received different canonical names.

use std::path::PathBuf;

use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use familiar_datatypes::graph::dependency_order;
use familiar_datatypes::loader::{load_catalog, load_sources};
use familiar_datatypes::{
    closure_with_policy, explain_difference, CanonConfig, CanonicalBatch, CanonicalizeOptions,
    Canonicalizer, ReferenceGraph,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "datatype-canon")]
#[command(about = "Deduplicate topic datatypes under content-addressed names")]
struct Cli {
    /// Configuration file (layered over datatypes.toml and DATATYPES__* variables)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assign canonical names to every source's datatypes
    Canonicalize {
        /// Sources JSON file or directory of JSON files
        sources: PathBuf,
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Extract the sub-catalog needed to define some datatypes
    Closure {
        /// Catalog JSON file
        catalog: PathBuf,
        /// Root datatype names
        #[arg(required = true)]
        roots: Vec<String>,
        /// Print names in dependency order instead of the sub-catalog
        #[arg(long)]
        order: bool,
    },

    /// Show why two sources' root datatypes differ
    Explain {
        /// Sources JSON file or directory of JSON files
        sources: PathBuf,
        /// First source key
        left: String,
        /// Second source key
        right: String,
    },

    /// Print the effective configuration
    Config {
        /// Also write it to this file
        #[arg(long)]
        save: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct BatchReport {
    generated_at: DateTime<Utc>,
    #[serde(flatten)]
    batch: CanonicalBatch,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = CanonConfig::load_from(cli.config.as_deref()).context("loading configuration")?;
    let options = CanonicalizeOptions::from(&config);

    match cli.command {
        Commands::Canonicalize { sources, output } => {
            let sources = load_sources(&sources)
                .with_context(|| format!("loading sources from {}", sources.display()))?;
            let batch = Canonicalizer::new(options).canonicalize(&sources);

            eprintln!(
                "📦 Batch {}: {} sources, {} groups, {} canonical datatypes",
                batch.batch, batch.stats.sources, batch.stats.groups, batch.stats.definitions
            );
            for failure in &batch.failures {
                eprintln!("  ❌ {}: {}", failure.source_keys.join(", "), failure.error);
            }
            if batch.stats.unresolved_sources > 0 {
                eprintln!("  ⚠️  {} sources without a resolvable root", batch.stats.unresolved_sources);
            }

            let report = BatchReport {
                generated_at: Utc::now(),
                batch,
            };
            let json = config.output.format.to_json(&report)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    eprintln!("✅ Wrote {}", path.display());
                }
                None => println!("{}", json),
            }
            Ok(())
        }

        Commands::Closure { catalog, roots, order } => {
            let catalog = load_catalog(&catalog)
                .with_context(|| format!("loading catalog from {}", catalog.display()))?;
            let sub_catalog = closure_with_policy(&catalog, &roots, options.cycle_policy)?;

            if order {
                for name in dependency_order(&ReferenceGraph::from_catalog(&sub_catalog))? {
                    println!("{}", name);
                }
            } else {
                println!("{}", config.output.format.to_json(&sub_catalog)?);
            }
            Ok(())
        }

        Commands::Explain { sources, left, right } => {
            let sources = load_sources(&sources)?;
            let canonicalizer = Canonicalizer::new(options);
            let find = |key: &str| {
                sources
                    .iter()
                    .find(|s| s.source_key == key)
                    .ok_or_else(|| anyhow!("no source with key {}", key))
            };

            let left_key = canonicalizer
                .root_key(find(&left)?)?
                .ok_or_else(|| anyhow!("{} does not declare its root datatype", left))?;
            let right_key = canonicalizer
                .root_key(find(&right)?)?
                .ok_or_else(|| anyhow!("{} does not declare its root datatype", right))?;

            let diff = explain_difference(&left_key, &right_key);
            if diff.is_empty() {
                println!("✅ {} and {} are structurally identical ({})", left, right, left_key.short_digest());
            } else {
                println!("🔍 {} ({}) vs {} ({})", left, left_key.short_digest(), right, right_key.short_digest());
                print!("{}", diff);
            }
            Ok(())
        }

        Commands::Config { save } => {
            print!("{}", toml::to_string_pretty(&config)?);
            if let Some(path) = save {
                config.save(&path)?;
                eprintln!("✅ Saved configuration to {}", path.display());
            }
            Ok(())
        }
    }
}
