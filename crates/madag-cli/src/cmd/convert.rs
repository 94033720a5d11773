//! Implementation of `madag convert`: re-encodes a DAG file between
//! dagbin/json/protobuf, inferring both formats from their extensions.
use crate::error::CliError;
use crate::io;

pub fn run(input: &std::path::Path, output: &std::path::Path, max_file_size: u64) -> Result<(), CliError> {
    let dag = io::load_dag(input, max_file_size)?;
    io::save_dag(&dag, output)?;
    crate::log::log(
        crate::log::Level::Info,
        &format!("madag convert: {} nodes, {} edges", dag.node_count(), dag.edge_count()),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;

    #[test]
    fn convert_json_to_dagbin_preserves_topology() {
        let dag = madag_core::formats::json::tiny_fixture_dag();
        let dir = tempfile::tempdir().expect("create temp dir");
        let input = dir.path().join("in.json");
        let output = dir.path().join("out.dagbin");
        std::fs::write(&input, madag_core::formats::json::save(&dag).expect("serializes")).expect("write input");

        run(&input, &output, 1 << 20).expect("convert succeeds");

        let loaded = madag_core::formats::dagbin::read(&std::fs::read(&output).expect("read output")).expect("parses");
        assert_eq!(loaded.node_count(), dag.node_count());
        assert_eq!(loaded.edge_count(), dag.edge_count());
    }

    #[test]
    fn convert_dagbin_to_protobuf_preserves_node_count() {
        let dag = madag_core::formats::json::tiny_fixture_dag();
        let dir = tempfile::tempdir().expect("create temp dir");
        let input = dir.path().join("in.dagbin");
        let output = dir.path().join("out.pb");
        std::fs::write(&input, madag_core::formats::dagbin::write(&dag).expect("serializes")).expect("write input");

        run(&input, &output, 1 << 20).expect("convert succeeds");

        let loaded =
            madag_core::formats::protobuf::dag::read(&std::fs::read(&output).expect("read output")).expect("parses");
        assert_eq!(loaded.node_count(), dag.node_count());
    }
}
