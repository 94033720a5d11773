//! Implementation of `madag optimize`.
use std::path::PathBuf;

use madag_core::config::{AcceptancePolicy, OptimizeConfig, SamplerKind};
use madag_core::formats::vcf;
use madag_core::merge::Merge;
use madag_core::optimize::{self, CancelToken};
use madag_core::spr::ParsimonyMoveScorer;

use crate::cli::{AcceptanceArg, SamplerArg};
use crate::error::CliError;
use crate::io;

#[allow(clippy::too_many_arguments)]
pub fn run(
    input: &std::path::Path,
    output: &std::path::Path,
    ref_seq: Option<&PathBuf>,
    iterations: usize,
    vcf_path: Option<&PathBuf>,
    acceptance: AcceptanceArg,
    alpha: i64,
    beta: i64,
    sample: SamplerArg,
    subtree_min: Option<usize>,
    subtree_max: Option<usize>,
    seed: Option<u64>,
    threads: usize,
    log: Option<&PathBuf>,
    max_file_size: u64,
) -> Result<(), CliError> {
    let mut dag = io::load_dag(input, max_file_size)?;

    if let Some(ref_seq_path) = ref_seq {
        let reference = io::load_reference(ref_seq_path, max_file_size)?;
        if reference.to_sequence() != dag.reference().to_sequence() {
            return Err(madag_core::MadagError::RefMismatch.into());
        }
    }

    if let Some(vcf_path) = vcf_path {
        let text = io::read_text_file(vcf_path, max_file_size)?;
        let reference = dag.reference().clone();
        let diffs = vcf::parse_diffs(&text).map_err(CliError::from)?;
        vcf::apply_to_dag(&mut dag, &diffs, &reference).map_err(CliError::from)?;
    }

    let config = OptimizeConfig {
        iterations,
        acceptance: to_acceptance_policy(acceptance, alpha, beta),
        sampler: match sample {
            SamplerArg::Any => SamplerKind::Any,
            SamplerArg::Best => SamplerKind::Best,
        },
        subtree_min,
        subtree_max,
        seed,
        threads,
        ..OptimizeConfig::default()
    };

    // A prior call elsewhere in the process may already have installed the
    // global pool; only the first caller per process wins, which is fine
    // since the CLI only ever runs one `optimize` invocation per process.
    let _ = rayon::ThreadPoolBuilder::new().num_threads(config.resolved_threads()).build_global();

    let merge = Merge::new(dag.reference().clone());
    merge.add_dag(&dag).map_err(CliError::from)?;

    let stats = optimize::run(&merge, &config, &ParsimonyMoveScorer, &CancelToken::new()).map_err(CliError::from)?;

    if let Some(log_path) = log {
        write_log(log_path, &stats)?;
    }

    let result = merge.build_result().map_err(CliError::from)?;
    io::save_dag(&result, output)?;

    crate::log::log(
        crate::log::Level::Info,
        &format!("madag optimize: {} iterations, {} nodes in final merge", stats.len(), merge.node_count()),
    );
    for s in &stats {
        crate::log::log(
            crate::log::Level::Debug,
            &format!(
                "iteration {}: parsimony={} attempted={} accepted={}",
                s.iteration, s.sampled_tree_parsimony, s.moves_attempted, s.moves_accepted
            ),
        );
    }
    Ok(())
}

fn to_acceptance_policy(arg: AcceptanceArg, alpha: i64, beta: i64) -> AcceptancePolicy {
    match arg {
        AcceptanceArg::AllMoves => AcceptancePolicy::AllMoves,
        AcceptanceArg::BestMoves => AcceptancePolicy::BestMoves,
        AcceptanceArg::BestMovesTreebased => AcceptancePolicy::BestMovesTreebased { alpha, beta },
        AcceptanceArg::BestMovesFixedTree => AcceptancePolicy::BestMovesFixedTree,
    }
}

fn write_log(path: &PathBuf, stats: &[optimize::IterationStats]) -> Result<(), CliError> {
    let mut out = String::from("iteration\tparsimony\tradii\tattempted\taccepted\tmerge_nodes\n");
    for s in stats {
        out.push_str(&format!(
            "{}\t{}\t{}\t{}\t{}\t{}\n",
            s.iteration, s.sampled_tree_parsimony, s.radii_explored, s.moves_attempted, s.moves_accepted, s.merge_node_count
        ));
    }
    std::fs::write(path, out).map_err(|e| CliError::IoError {
        source: path.display().to_string(),
        detail: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;

    #[test]
    fn to_acceptance_policy_maps_treebased_coefficients() {
        let policy = to_acceptance_policy(AcceptanceArg::BestMovesTreebased, 3, 5);
        assert_eq!(policy, AcceptancePolicy::BestMovesTreebased { alpha: 3, beta: 5 });
    }

    #[test]
    fn to_acceptance_policy_maps_all_moves() {
        assert_eq!(to_acceptance_policy(AcceptanceArg::AllMoves, 0, 0), AcceptancePolicy::AllMoves);
    }

    #[test]
    fn run_end_to_end_on_a_json_fixture() {
        let dag = madag_core::formats::json::tiny_fixture_dag();
        let dir = tempfile::tempdir().expect("create temp dir");
        let input = dir.path().join("in.json");
        let output = dir.path().join("out.dagbin");
        std::fs::write(&input, madag_core::formats::json::save(&dag).expect("serializes")).expect("write input");

        run(
            &input,
            &output,
            None,
            1,
            None,
            AcceptanceArg::AllMoves,
            1,
            0,
            SamplerArg::Best,
            None,
            None,
            Some(11),
            1,
            None,
            1 << 20,
        )
        .expect("optimize run succeeds");

        assert!(output.exists());
        let loaded = madag_core::formats::dagbin::read(&std::fs::read(&output).expect("read output")).expect("parses");
        assert!(loaded.node_count() >= dag.node_count());
    }
}
