//! Implementation of `madag build`: constructs an initial DAG from a
//! tree-shaped input plus a reference, optionally applying per-sample VCF
//! diffs before writing it out.
use std::path::PathBuf;

use madag_core::formats::vcf;

use crate::error::CliError;
use crate::io;

pub fn run(
    input: &std::path::Path,
    output: &std::path::Path,
    ref_seq: Option<&PathBuf>,
    vcf_path: Option<&PathBuf>,
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

    io::save_dag(&dag, output)?;
    crate::log::log(
        crate::log::Level::Info,
        &format!("madag build: wrote {} nodes, {} edges", dag.node_count(), dag.edge_count()),
    );
    Ok(())
}
