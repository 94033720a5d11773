//! Implementation of `madag score`: reports the parsimony score and the
//! count of co-optimal trees for a DAG file, without running the optimizer.
use madag_core::weight::compute_weight_below;
use madag_core::weight::parsimony::ParsimonyScore;
use madag_core::weight::tree_count::min_weight_count;

use crate::error::CliError;
use crate::io;

pub fn run(input: &std::path::Path, max_file_size: u64) -> Result<(), CliError> {
    let dag = io::load_dag(input, max_file_size)?;

    let dp = compute_weight_below(&dag, &ParsimonyScore).map_err(CliError::from)?;
    let ua = dag.ua().map_err(CliError::from)?;
    let parsimony = dp.weight_below[ua.0];
    let count = min_weight_count(&dag, ParsimonyScore).map_err(CliError::from)?;

    println!("parsimony:    {parsimony}");
    println!("optimal_trees: {count}");
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;

    #[test]
    fn score_runs_on_the_tiny_fixture() {
        let dag = madag_core::formats::json::tiny_fixture_dag();
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("in.json");
        std::fs::write(&path, madag_core::formats::json::save(&dag).expect("serializes")).expect("write input");

        run(&path, 1 << 20).expect("score succeeds");
    }
}
