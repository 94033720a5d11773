//! VCF ingestion: per-sample sequence diffs applied to a DAG's leaves (§6).
use std::collections::HashMap;

use crate::compact_genome::CompactGenomeData;
use crate::dag::Dag;
use crate::error::{MadagError, Result};
use crate::mutation::{MutationBase, MutationPosition};
use crate::reference::Reference;

fn parse_base(field: &str) -> Result<MutationBase> {
    let c = field
        .chars()
        .next()
        .ok_or_else(|| MadagError::InputFormat("VCF allele field is empty".to_owned()))?;
    MutationBase::from_char(c.to_ascii_uppercase()).ok_or(MadagError::InvalidBase(c))
}

/// Parses a VCF document into one `CompactGenomeData` diff per sample
/// column, keyed by sample name. Only the called allele (first digit of
/// the `GT` subfield) is consulted; multi-allelic sites index into the
/// comma-separated `ALT` list.
pub fn parse_diffs(text: &str) -> Result<HashMap<String, CompactGenomeData>> {
    let mut sample_names: Vec<String> = Vec::new();
    let mut diffs: HashMap<String, CompactGenomeData> = HashMap::new();

    for line in text.lines() {
        if line.starts_with("##") || line.trim().is_empty() {
            continue;
        }
        if let Some(header) = line.strip_prefix("#CHROM") {
            let rest: Vec<&str> = header.split('\t').filter(|s| !s.is_empty()).collect();
            // `rest` holds POS..FORMAT plus sample columns; only the last
            // segment past FORMAT carries sample names, but the column
            // count before them is fixed at 8 (9 counting #CHROM itself).
            sample_names = rest.iter().skip(8).map(|s| (*s).to_owned()).collect();
            for name in &sample_names {
                diffs.entry(name.clone()).or_default();
            }
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 10 {
            return Err(MadagError::InputFormat(
                "VCF data row is missing sample genotype columns".to_owned(),
            ));
        }
        let pos: usize = fields[1]
            .parse()
            .map_err(|_| MadagError::InputFormat("VCF POS column is not an integer".to_owned()))?;
        let position = MutationPosition(pos);
        let ref_base = parse_base(fields[3])?;
        let alts: Vec<MutationBase> = if fields[4] == "." {
            Vec::new()
        } else {
            fields[4].split(',').map(parse_base).collect::<Result<Vec<_>>>()?
        };

        for (sample_idx, sample_field) in fields[9..].iter().enumerate() {
            let Some(name) = sample_names.get(sample_idx) else {
                continue;
            };
            let gt = sample_field.split(':').next().unwrap_or(sample_field);
            let Some(allele_idx) = gt.chars().find(|c| c.is_ascii_digit()).and_then(|c| c.to_digit(10)) else {
                continue;
            };
            if allele_idx == 0 {
                continue;
            }
            let alt = alts
                .get(allele_idx as usize - 1)
                .copied()
                .ok_or_else(|| MadagError::InputFormat("VCF genotype allele index out of range".to_owned()))?;
            if alt != ref_base {
                if let Some(diff) = diffs.get_mut(name) {
                    diff.insert(position, alt);
                }
            }
        }
    }
    Ok(diffs)
}

/// Applies per-sample diffs to the matching leaf's compact genome, then
/// recomputes every incident edge's mutations.
pub fn apply_to_dag(dag: &mut Dag, diffs: &HashMap<String, CompactGenomeData>, reference: &Reference) -> Result<()> {
    for node in dag.node_ids().collect::<Vec<_>>() {
        let Some(sample_id) = dag.node(node).sample_id.clone() else {
            continue;
        };
        let Some(diff) = diffs.get(sample_id.as_str()) else {
            continue;
        };
        if diff.is_empty() {
            continue;
        }
        let mut data = dag.node(node).compact_genome.data().clone();
        for (pos, base) in diff {
            let ref_base = reference.base_at(pos.0);
            if Some(*base) == ref_base {
                data.remove(pos);
            } else {
                data.insert(*pos, *base);
            }
        }
        dag.node_mut(node).compact_genome = crate::compact_genome::CompactGenome::intern(data);
    }
    dag.recompute_edge_mutations();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const HEADER: &str = "##fileformat=VCFv4.2\n#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tsamp1\tsamp2\n";

    #[test]
    fn parses_single_alt_genotypes_into_per_sample_diffs() {
        let text = format!("{HEADER}chr1\t2\t.\tA\tC\t.\tPASS\t.\tGT\t1\t0\n");
        let diffs = parse_diffs(&text).expect("valid VCF");
        assert_eq!(diffs["samp1"].get(&MutationPosition(2)), Some(&MutationBase::C));
        assert!(diffs["samp2"].is_empty());
    }

    #[test]
    fn multi_allelic_sites_index_into_alt_list() {
        let text = format!("{HEADER}chr1\t5\t.\tA\tC,G\t.\tPASS\t.\tGT\t2\t1\n");
        let diffs = parse_diffs(&text).expect("valid VCF");
        assert_eq!(diffs["samp1"].get(&MutationPosition(5)), Some(&MutationBase::G));
        assert_eq!(diffs["samp2"].get(&MutationPosition(5)), Some(&MutationBase::C));
    }

    #[test]
    fn apply_to_dag_updates_the_matching_leaf_and_its_incident_edge() {
        let reference = Arc::new(Reference::new("ref", "AAA").expect("valid"));
        let mut dag = Dag::new(reference.clone());
        let leaf_cg = crate::compact_genome::CompactGenome::from_sequence("AAA", &reference).expect("valid");
        let leaf = dag.add_node(leaf_cg.clone(), Some(crate::sample_id::SampleId::intern("samp1")));
        let ua = dag.add_node(crate::compact_genome::CompactGenome::empty(), None);
        dag.set_ua(ua);
        let m = dag.node(ua).compact_genome.clone().edge_mutations_to(&leaf_cg, &reference);
        dag.add_edge(ua, leaf, 0, m);

        let mut diffs: HashMap<String, CompactGenomeData> = HashMap::new();
        let mut diff = CompactGenomeData::new();
        diff.insert(MutationPosition(2), MutationBase::C);
        diffs.insert("samp1".to_owned(), diff);

        apply_to_dag(&mut dag, &diffs, &reference).expect("apply succeeds");
        assert_eq!(dag.node(leaf).compact_genome.base_at(MutationPosition(2), &reference), Some(MutationBase::C));
        assert_eq!(dag.edge(crate::dag::EdgeId(0)).mutations.len(), 1);
    }
}
