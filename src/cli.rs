///! CLI commands for hierarch

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::ContractorConfig;
use crate::contractor::run;
use crate::validate;

#[derive(Parser)]
#[command(name = "hierarch")]
#[command(about = "Contraction hierarchy preprocessor for edge-expanded road graphs", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Contract an edge-expanded graph into a query-ready hierarchy
    Contract {
        /// Artifact prefix (reads <prefix>.enw, .ebg, .ebg_nodes, .properties)
        #[arg(long)]
        prefix: PathBuf,

        /// Fraction of admissible nodes to contract
        #[arg(long, default_value = "1.0")]
        core_factor: f64,

        /// Seed the ordering from a cached <prefix>.level
        #[arg(long)]
        use_cached_priority: bool,

        /// Worker threads (0 = hardware concurrency)
        #[arg(long, default_value = "0")]
        threads: usize,

        /// Segment speed file applied while loading edges
        #[arg(long)]
        segment_speeds: Option<PathBuf>,
    },

    /// Compare hierarchy distances against a Dijkstra baseline
    Validate {
        /// Artifact prefix of a previously contracted hierarchy
        #[arg(long)]
        prefix: PathBuf,

        /// Number of random source/target pairs
        #[arg(long, default_value = "1000")]
        pairs: usize,

        /// RNG seed
        #[arg(long, default_value = "8449")]
        seed: u64,
    },
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Contract {
            prefix,
            core_factor,
            use_cached_priority,
            threads,
            segment_speeds,
        } => {
            let config = ContractorConfig::new(
                prefix,
                core_factor,
                use_cached_priority,
                threads,
                segment_speeds,
            );
            let summary = run::run(&config)?;
            println!(
                "finished preprocessing: {} nodes, {} edges, {} filter columns",
                summary.num_nodes, summary.num_edges, summary.num_filters
            );
            Ok(())
        }
        Commands::Validate {
            prefix,
            pairs,
            seed,
        } => {
            let config = ContractorConfig::new(prefix, 1.0, false, 0, None);
            let report = validate::validate_hierarchy(&config, pairs, seed)?;
            println!(
                "validation passed: {} pairs, {} reachable",
                report.pairs, report.reachable
            );
            Ok(())
        }
    }
}
