//! Clap CLI definition: root struct, subcommands, and shared argument types.
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Move-acceptance policy, mirroring `madag_core::config::AcceptancePolicy`.
#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
pub enum AcceptanceArg {
    /// Accept every legal move.
    AllMoves,
    /// Accept only moves whose score does not exceed the running best.
    BestMoves,
    /// As `best-moves`, discounted by `--alpha`/`--beta`.
    BestMovesTreebased,
    /// As `best-moves`, but the running best resets every sampled tree.
    BestMovesFixedTree,
}

/// Per-iteration tree sampler, mirroring `madag_core::config::SamplerKind`.
#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
pub enum SamplerArg {
    /// Sample any tree embedded in the DAG.
    Any,
    /// Sample only from the weight-optimal edges.
    Best,
}

/// All top-level subcommands exposed by the `madag` binary.
#[derive(Subcommand)]
pub enum Command {
    /// Run the sample -> move -> fragment -> merge optimization loop.
    Optimize {
        /// Input DAG (format inferred from extension).
        #[arg(long, value_name = "PATH")]
        input: PathBuf,
        /// Output DAG (format inferred from extension).
        #[arg(long, value_name = "PATH")]
        output: PathBuf,
        /// Reference FASTA; required iff the input format has no embedded
        /// reference sequence.
        #[arg(long = "ref-seq", value_name = "PATH")]
        ref_seq: Option<PathBuf>,
        /// Number of outer iterations.
        #[arg(long, default_value_t = 1)]
        iterations: usize,
        /// Apply per-sample sequence diffs from a VCF to the DAG's leaves
        /// before optimizing.
        #[arg(long, value_name = "PATH")]
        vcf: Option<PathBuf>,
        /// Move-acceptance policy.
        #[arg(long, value_enum, default_value_t = AcceptanceArg::BestMoves)]
        acceptance: AcceptanceArg,
        /// Coefficient applied to newly labeled nodes under
        /// `best-moves-treebased`.
        #[arg(long, default_value_t = 1)]
        alpha: i64,
        /// Flat offset applied to the discounted score under
        /// `best-moves-treebased`.
        #[arg(long, default_value_t = 0)]
        beta: i64,
        /// Per-iteration sampler.
        #[arg(long, value_enum, default_value_t = SamplerArg::Best)]
        sample: SamplerArg,
        /// Lower bound on the size of subtree a move may touch.
        #[arg(long = "subtree-min")]
        subtree_min: Option<usize>,
        /// Upper bound on the size of subtree a move may touch.
        #[arg(long = "subtree-max")]
        subtree_max: Option<usize>,
        /// RNG seed; omit for non-deterministic runs.
        #[arg(long)]
        seed: Option<u64>,
        /// Worker thread count; `0` means hardware concurrency.
        #[arg(long, default_value_t = 0)]
        threads: usize,
        /// Tab-separated per-iteration statistics file.
        #[arg(long, value_name = "PATH")]
        log: Option<PathBuf>,
    },

    /// Build an initial DAG from a tree-shaped input plus a reference.
    Build {
        /// Input tree or DAG (format inferred from extension).
        #[arg(long, value_name = "PATH")]
        input: PathBuf,
        /// Output DAG (format inferred from extension).
        #[arg(long, value_name = "PATH")]
        output: PathBuf,
        /// Reference FASTA; required iff the input format has no embedded
        /// reference sequence.
        #[arg(long = "ref-seq", value_name = "PATH")]
        ref_seq: Option<PathBuf>,
        /// Apply per-sample sequence diffs from a VCF to the DAG's leaves.
        #[arg(long, value_name = "PATH")]
        vcf: Option<PathBuf>,
    },

    /// Re-encode a DAG file between dagbin/json/protobuf.
    Convert {
        /// Input DAG (format inferred from extension).
        #[arg(long, value_name = "PATH")]
        input: PathBuf,
        /// Output DAG (format inferred from extension).
        #[arg(long, value_name = "PATH")]
        output: PathBuf,
    },

    /// Print summary statistics for a DAG file.
    Inspect {
        /// Input DAG (format inferred from extension).
        #[arg(long, value_name = "PATH")]
        input: PathBuf,
        /// Also print the compact genome of this node index.
        #[arg(long)]
        node: Option<usize>,
    },

    /// Report the parsimony score and optimal-tree count for a DAG file,
    /// without running the optimizer.
    Score {
        /// Input DAG (format inferred from extension).
        #[arg(long, value_name = "PATH")]
        input: PathBuf,
    },
}

/// Root CLI definition.
#[derive(Parser)]
#[command(name = "madag", about = "Build, merge, and optimize mutation-annotated DAGs")]
pub struct Cli {
    /// Active subcommand.
    #[command(subcommand)]
    pub command: Command,

    /// Maximum input file size in bytes.
    #[arg(long, global = true, env = "MADAG_MAX_FILE_SIZE", default_value_t = 1 << 30)]
    pub max_file_size: u64,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory as _;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }
}
