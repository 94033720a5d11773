//! Implementation of `madag inspect`: prints summary statistics for a DAG
//! file, and optionally one node's compact genome.
use crate::error::CliError;
use crate::io;

pub fn run(input: &std::path::Path, node: Option<usize>, max_file_size: u64) -> Result<(), CliError> {
    let dag = io::load_dag(input, max_file_size)?;
    let leaf_count = dag.leaves().len();

    println!("reference:   {} ({} bp)", dag.reference().name(), dag.reference().len());
    println!("nodes:       {}", dag.node_count());
    println!("edges:       {}", dag.edge_count());
    println!("leaves:      {leaf_count}");
    println!("is_tree:     {}", dag.is_tree());

    if let Some(index) = node {
        if index >= dag.node_count() {
            return Err(CliError::BadArguments {
                detail: format!("node index {index} is out of range (dag has {} nodes)", dag.node_count()),
            });
        }
        let id = madag_core::NodeId(index);
        let data = dag.node(id);
        let label = data
            .sample_id
            .as_ref()
            .map_or_else(|| "<internal>".to_owned(), |s| s.to_string());
        println!("node {index}: sample_id={label} cg={}", data.compact_genome.to_sequence(dag.reference()));
    }

    Ok(())
}
