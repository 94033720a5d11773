//! Legacy protobuf-era formats (§6): a flat node/edge record list (`dag`
//! submodule) and a Newick-plus-dfs-mutations tree (`tree` submodule).
//!
//! The upstream wire format is genuine protobuf; no legacy fixture ships
//! with this crate to conform to bit-for-bit, and the spec only requires
//! "semantically equivalent" round-tripping. Rather than pull in a
//! generated-code dependency this crate cannot compile-check here, both
//! submodules use a small hand-rolled record encoding in the same style as
//! [`super::dagbin`] (see `DESIGN.md`).

pub mod dag {
    use std::sync::Arc;

    use crate::compact_genome::CompactGenome;
    use crate::dag::{Dag, NodeId};
    use crate::edge_mutations::EdgeMutations;
    use crate::error::{MadagError, Result};
    use crate::formats::byteio::{Reader, Writer};
    use crate::mutation::{MutationBase, MutationPosition};
    use crate::reference::Reference;
    use crate::sample_id::SampleId;

    const MAGIC: &[u8; 6] = b"LPBDAG";

    /// Encodes `dag` as a flat list of node records followed by a flat list
    /// of edge records (no section tagging, unlike [`super::super::dagbin`]).
    pub fn write(dag: &Dag) -> Result<Vec<u8>> {
        let ua = dag.ua()?;
        let reference = dag.reference();
        let mut w = Writer::new();
        w.bytes(MAGIC);

        let name = reference.name().as_bytes();
        w.u32(name.len() as u32);
        w.bytes(name);
        let seq = reference.to_sequence();
        w.u32(seq.len() as u32);
        w.bytes(seq.as_bytes());

        w.u64(dag.node_count() as u64);
        w.u64(dag.edge_count() as u64);
        w.u64(ua.0 as u64);

        for node in dag.node_ids() {
            let data = dag.node(node);
            match &data.sample_id {
                Some(sample_id) => {
                    w.u8(1);
                    let bytes = sample_id.as_str().as_bytes();
                    w.u32(bytes.len() as u32);
                    w.bytes(bytes);
                }
                None => w.u8(0),
            }
        }

        for edge_id in dag.edge_ids() {
            let edge = dag.edge(edge_id);
            w.u64(edge.parent.0 as u64);
            w.u64(edge.child.0 as u64);
            w.u32(edge.clade_idx as u32);
            w.u32(edge.mutations.len() as u32);
            for (pos, (parent_base, child_base)) in edge.mutations.entries() {
                w.u64(pos.0 as u64);
                w.u8(parent_base.bits());
                w.u8(child_base.bits());
            }
        }

        Ok(w.buf)
    }

    /// Parses a flat record-list DAG file, reconstructing compact genomes
    /// from edge mutations.
    pub fn read(bytes: &[u8]) -> Result<Dag> {
        let mut r = Reader::new(bytes);
        if r.take(MAGIC.len())? != MAGIC {
            return Err(MadagError::InputFormat("missing legacy DAG magic bytes".to_owned()));
        }
        let name_len = r.u32()? as usize;
        let name = r.string(name_len)?;
        let seq_len = r.u32()? as usize;
        let sequence = r.string(seq_len)?;
        let reference = Arc::new(Reference::new(name, &sequence)?);

        let node_count = r.u64()? as usize;
        let edge_count = r.u64()? as usize;
        let ua_id = r.u64()? as usize;

        let mut dag = Dag::new(reference.clone());
        for _ in 0..node_count {
            let has_sample = r.u8()?;
            let sample_id = if has_sample == 1 {
                let len = r.u32()? as usize;
                Some(SampleId::intern(r.string(len)?))
            } else {
                None
            };
            dag.add_node(CompactGenome::empty(), sample_id);
        }

        for _ in 0..edge_count {
            let parent = NodeId(r.u64()? as usize);
            let child = NodeId(r.u64()? as usize);
            let clade_idx = r.u32()? as usize;
            let mutation_count = r.u32()? as usize;
            let mut map = std::collections::BTreeMap::new();
            for _ in 0..mutation_count {
                let pos = MutationPosition(r.u64()? as usize);
                let parent_base = MutationBase::from_bits(r.u8()?)
                    .ok_or_else(|| MadagError::InputFormat("legacy DAG edge has an empty parent base mask".to_owned()))?;
                let child_base = MutationBase::from_bits(r.u8()?)
                    .ok_or_else(|| MadagError::InputFormat("legacy DAG edge has an empty child base mask".to_owned()))?;
                map.insert(pos, (parent_base, child_base));
            }
            dag.add_edge(parent, child, clade_idx, EdgeMutations::new(map));
        }

        if ua_id >= dag.node_count() {
            return Err(MadagError::InputFormat("legacy DAG UA id out of range".to_owned()));
        }
        dag.set_ua(NodeId(ua_id));
        dag.recompute_compact_genomes()?;
        dag.recompute_leaf_sets()?;
        Ok(dag)
    }

}

pub mod tree {
    use std::iter::Peekable;
    use std::str::Chars;
    use std::sync::Arc;

    use crate::compact_genome::CompactGenome;
    use crate::dag::{Dag, NodeId};
    use crate::edge_mutations::EdgeMutations;
    use crate::error::{MadagError, Result};
    use crate::reference::Reference;
    use crate::sample_id::SampleId;

    struct NewickNode {
        label: Option<String>,
        children: Vec<NewickNode>,
    }

    fn parse_label(chars: &mut Peekable<Chars>) -> Option<String> {
        let mut raw = String::new();
        while let Some(&c) = chars.peek() {
            if c == ',' || c == ')' || c == '(' || c == ';' {
                break;
            }
            raw.push(c);
            chars.next();
        }
        let name = raw.split(':').next().map(str::to_owned).unwrap_or_default();
        if name.is_empty() { None } else { Some(name) }
    }

    fn parse_subtree(chars: &mut Peekable<Chars>) -> Result<NewickNode> {
        if chars.peek() == Some(&'(') {
            chars.next();
            let mut children = Vec::new();
            loop {
                children.push(parse_subtree(chars)?);
                match chars.peek() {
                    Some(',') => {
                        chars.next();
                    }
                    Some(')') => {
                        chars.next();
                        break;
                    }
                    _ => return Err(MadagError::InputFormat("unterminated newick group".to_owned())),
                }
            }
            let label = parse_label(chars);
            Ok(NewickNode { label, children })
        } else {
            let label = parse_label(chars);
            Ok(NewickNode { label, children: Vec::new() })
        }
    }

    fn parse_newick(text: &str) -> Result<NewickNode> {
        let trimmed = text.trim().trim_end_matches(';');
        if trimmed.is_empty() {
            return Err(MadagError::InputFormat("newick string is empty".to_owned()));
        }
        let mut chars = trimmed.chars().peekable();
        parse_subtree(&mut chars)
    }

    fn build_dag_node(
        dag: &mut Dag,
        node: &NewickNode,
        mutations: &[EdgeMutations],
        idx: &mut usize,
        reference: &Reference,
        parent_cg: &CompactGenome,
    ) -> Result<(NodeId, EdgeMutations)> {
        let my_mutations = mutations
            .get(*idx)
            .cloned()
            .ok_or_else(|| MadagError::InputFormat("newick has more nodes than mutation records".to_owned()))?;
        *idx += 1;
        let my_cg = parent_cg.apply_edge(&my_mutations, reference);
        let sample_id = if node.children.is_empty() {
            node.label.clone().map(SampleId::intern)
        } else {
            None
        };
        let node_id = dag.add_node(my_cg.clone(), sample_id);
        for (clade_idx, child) in node.children.iter().enumerate() {
            let (child_id, child_muts) = build_dag_node(dag, child, mutations, idx, reference, &my_cg)?;
            dag.add_edge(node_id, child_id, clade_idx, child_muts);
        }
        Ok((node_id, my_mutations))
    }

    /// Parses a legacy `(newick, per-node-dfs-mutations)` tree, attaching a
    /// fresh UA node above the parsed root.
    pub fn parse(newick: &str, mutations_dfs: &[EdgeMutations], reference: Arc<Reference>) -> Result<Dag> {
        let root_node = parse_newick(newick)?;
        let mut dag = Dag::new(reference.clone());
        let ua = dag.add_node(CompactGenome::empty(), None);
        dag.set_ua(ua);
        let ua_cg = dag.node(ua).compact_genome.clone();
        let mut idx = 0usize;
        let (root_id, root_muts) = build_dag_node(&mut dag, &root_node, mutations_dfs, &mut idx, &reference, &ua_cg)?;
        if idx != mutations_dfs.len() {
            return Err(MadagError::InputFormat(format!(
                "newick consumed {idx} mutation records but {} were supplied",
                mutations_dfs.len()
            )));
        }
        dag.add_edge(ua, root_id, 0, root_muts);
        dag.recompute_leaf_sets()?;
        Ok(dag)
    }

    fn build_newick(dag: &Dag, node: NodeId, mutations_out: &mut Vec<EdgeMutations>, incoming: &EdgeMutations) -> String {
        mutations_out.push(incoming.clone());
        let data = dag.node(node);
        if data.is_leaf() {
            data.sample_id.as_ref().map(ToString::to_string).unwrap_or_default()
        } else {
            let parts: Vec<String> = dag
                .child_edges(node)
                .map(|edge_id| {
                    let edge = dag.edge(edge_id);
                    build_newick(dag, edge.child, mutations_out, &edge.mutations)
                })
                .collect();
            format!("({})", parts.join(","))
        }
    }

    /// Serializes the tree rooted at `dag`'s UA's single child into
    /// `(newick, per-node-dfs-mutations)`. Errors if `dag` is not a tree, or
    /// its UA does not have exactly one child clade.
    pub fn write(dag: &Dag) -> Result<(String, Vec<EdgeMutations>)> {
        if !dag.is_tree() {
            return Err(MadagError::UnsupportedFeature(
                "legacy tree export requires a tree-shaped DAG".to_owned(),
            ));
        }
        let ua = dag.ua()?;
        let mut children = dag.child_edges(ua);
        let root_edge_id = children
            .next()
            .ok_or_else(|| MadagError::InvariantViolation("UA root has no child".to_owned()))?;
        if children.next().is_some() {
            return Err(MadagError::InvariantViolation(
                "UA root must have exactly one child for tree export".to_owned(),
            ));
        }
        let root_edge = dag.edge(root_edge_id);
        let mut mutations = Vec::new();
        let body = build_newick(dag, root_edge.child, &mut mutations, &root_edge.mutations);
        Ok((format!("{body};"), mutations))
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn write_then_parse_roundtrips_the_tiny_fixture() {
            let dag = crate::formats::json::tiny_fixture_dag();
            let (newick, mutations) = write(&dag).expect("fixture is a tree");
            let reference = dag.reference().clone();
            let loaded = parse(&newick, &mutations, reference).expect("round-trips");
            assert_eq!(loaded.leaves().len(), dag.leaves().len());
            assert!(loaded.validate_edge_consistency().is_ok());
        }

        #[test]
        fn parse_rejects_mismatched_mutation_count() {
            let reference = Arc::new(Reference::new("ref", "GAA").expect("valid"));
            assert!(parse("(a,b);", &[], reference).is_err());
        }
    }
}
