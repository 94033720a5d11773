//! The sample -> move -> fragment -> merge optimization loop (C8, §4.5).
//!
//! Grounded on the upstream's pure-MADAG random-move optimizer
//! (`original_source/include/larch/spr/random_optimize.hpp` and
//! `random_moves.hpp`): each iteration samples a parsimony-optimal tree out
//! of the merge accumulator's current result, sweeps a growing move radius,
//! evaluates a batch of random legal SPR moves per radius in parallel, and
//! serially folds every accepted move's hypothetical tree back into the
//! accumulator.
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;
use rayon::prelude::*;

use crate::compact_genome::CompactGenome;
use crate::config::{AcceptancePolicy, OptimizeConfig, SamplerKind};
use crate::dag::{Dag, NodeId};
use crate::error::Result;
use crate::lca;
use crate::merge::Merge;
use crate::spr::{self, HypotheticalTree, MoveScorer, SprMove};
use crate::weight::parsimony::ParsimonyScore;
use crate::weight::{compute_weight_below, min_weight_sample_tree, sample_tree};

/// A shared flag an external caller can raise to stop the loop between
/// iterations or between radii without leaving a half-merged accumulator.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken(Arc::new(AtomicBool::new(false)))
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-iteration statistics, enough to drive the CLI's `--log` output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IterationStats {
    pub iteration: usize,
    pub sampled_tree_parsimony: usize,
    pub radii_explored: usize,
    pub moves_attempted: usize,
    pub moves_accepted: usize,
    pub merge_node_count: usize,
}

fn tree_depth(dag: &Dag) -> usize {
    dag.leaves().into_iter().map(|leaf| lca::depth(dag, leaf)).max().unwrap_or(0)
}

fn subtree_size(dag: &Dag, root: NodeId) -> usize {
    let mut count = 0;
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        count += 1;
        for edge_id in dag.child_edges(node) {
            stack.push(dag.edge(edge_id).child);
        }
    }
    count
}

/// One accepted or rejected move attempt, carrying everything the
/// acceptance policy needs to judge it.
struct Attempt {
    hypothetical: HypotheticalTree,
    score: i64,
}

#[allow(clippy::too_many_arguments)]
fn generate_move(
    dag: &Dag,
    root: NodeId,
    nodes: &[NodeId],
    radius: usize,
    subtree_min: Option<usize>,
    subtree_max: Option<usize>,
    rng: &mut impl Rng,
    max_attempts: usize,
) -> Option<SprMove> {
    if nodes.len() < 3 {
        return None;
    }
    for _ in 0..max_attempts {
        let src = nodes[rng.gen_range(0..nodes.len())];
        if src == root {
            continue;
        }
        if subtree_min.is_some() || subtree_max.is_some() {
            let size = subtree_size(dag, src);
            if subtree_min.is_some_and(|min| size < min) || subtree_max.is_some_and(|max| size > max) {
                continue;
            }
        }
        let dst = nodes[rng.gen_range(0..nodes.len())];
        if dst == src || dst == root {
            continue;
        }
        let mv = SprMove { src, dst };
        let Ok(move_lca) = spr::legal_move(dag, &mv) else {
            continue;
        };
        if radius > 0 {
            let Ok(d_src) = lca::distance_to_ancestor(dag, src, move_lca) else {
                continue;
            };
            let Ok(d_dst) = lca::distance_to_ancestor(dag, dst, move_lca) else {
                continue;
            };
            if d_src + d_dst > radius {
                continue;
            }
        }
        return Some(mv);
    }
    None
}

#[allow(clippy::too_many_arguments)]
fn attempt_move(
    dag: &Dag,
    root: NodeId,
    nodes: &[NodeId],
    radius: usize,
    subtree_min: Option<usize>,
    subtree_max: Option<usize>,
    seed: u64,
    scorer: &dyn MoveScorer,
) -> Option<Attempt> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mv = generate_move(dag, root, nodes, radius, subtree_min, subtree_max, &mut rng, 1000)?;
    let hypothetical = spr::apply(dag, &mv).ok()?;
    let score = scorer.score(dag, &mv, &hypothetical).ok()?;
    Some(Attempt { hypothetical, score })
}

/// Discounts `score` per [`AcceptancePolicy::BestMovesTreebased`]: a move
/// that introduces a compact genome not already present in `M`'s snapshot
/// pays `-alpha` (lower is better, so the discount *helps* it survive) plus
/// a flat `beta` offset.
fn discount_score(
    acceptance: &AcceptancePolicy,
    attempt: &Attempt,
    existing_cgs: &HashSet<CompactGenome>,
) -> i64 {
    match *acceptance {
        AcceptancePolicy::BestMovesTreebased { alpha, beta } => {
            let new_cg = attempt.hypothetical.dag.node(attempt.hypothetical.new_node).compact_genome.clone();
            let newly_labeled: i64 = if existing_cgs.contains(&new_cg) { 0 } else { 1 };
            attempt.score - alpha * newly_labeled + beta
        }
        AcceptancePolicy::AllMoves | AcceptancePolicy::BestMoves | AcceptancePolicy::BestMovesFixedTree => {
            attempt.score
        }
    }
}

/// Runs `config.iterations` rounds of sample -> move -> fragment -> merge
/// against `merge`, returning per-iteration statistics. `scorer` selects the
/// move-scoring backend (§4.4); an ML backend is deliberately not offered
/// here since none is implemented.
pub fn run(
    merge: &Merge,
    config: &OptimizeConfig,
    scorer: &dyn MoveScorer,
    cancel: &CancelToken,
) -> Result<Vec<IterationStats>> {
    let mut master_rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut stats = Vec::with_capacity(config.iterations);

    for iteration in 0..config.iterations {
        if cancel.is_requested() {
            break;
        }

        let result = merge.build_result()?;
        let existing_cgs: HashSet<CompactGenome> =
            result.node_ids().map(|n| result.node(n).compact_genome.clone()).collect();

        let mut sample_rng = StdRng::seed_from_u64(master_rng.gen::<u64>());
        let sampled = match config.sampler {
            SamplerKind::Best => min_weight_sample_tree(&result, &ParsimonyScore, &mut sample_rng)?,
            SamplerKind::Any => sample_tree(&result, &ParsimonyScore, &mut sample_rng)?,
        };
        let sampled_tree_parsimony = {
            let dp = compute_weight_below(&sampled, &ParsimonyScore)?;
            dp.weight_below[sampled.ua()?.0]
        };

        let root = sampled.ua()?;
        let nodes: Vec<NodeId> = sampled.node_ids().filter(|&n| n != root).collect();
        let max_radius = (2 * tree_depth(&sampled)).max(2);

        let mut best_score: Option<i64> = None;
        let mut moves_attempted = 0usize;
        let mut moves_accepted = 0usize;
        let mut radii_explored = 0usize;

        let mut radius = 2usize;
        while radius <= max_radius {
            if cancel.is_requested() {
                break;
            }
            radii_explored += 1;
            if matches!(config.acceptance, AcceptancePolicy::BestMovesFixedTree) {
                best_score = None;
            }

            let radius_seed = master_rng.gen::<u64>();
            let attempts: Vec<Option<Attempt>> = (0..config.attempts_per_radius)
                .into_par_iter()
                .map(|i| {
                    let seed = radius_seed ^ ((radius as u64) << 32) ^ (i as u64);
                    attempt_move(&sampled, root, &nodes, radius, config.subtree_min, config.subtree_max, seed, scorer)
                })
                .collect();

            let mut accepted_this_radius = 0usize;
            let mut improved_this_radius = false;
            for attempt in attempts.into_iter().flatten() {
                moves_attempted += 1;
                let discounted = discount_score(&config.acceptance, &attempt, &existing_cgs);
                let accept = match config.acceptance {
                    AcceptancePolicy::AllMoves => true,
                    AcceptancePolicy::BestMoves
                    | AcceptancePolicy::BestMovesTreebased { .. }
                    | AcceptancePolicy::BestMovesFixedTree => best_score.is_none_or(|best| discounted <= best),
                };
                if accept {
                    merge.add_dag(&attempt.hypothetical.dag)?;
                    moves_accepted += 1;
                    accepted_this_radius += 1;
                    if best_score.is_none_or(|best| discounted < best) {
                        best_score = Some(discounted);
                        improved_this_radius = true;
                    }
                }
            }

            let radius_made_progress = match config.acceptance {
                AcceptancePolicy::AllMoves => accepted_this_radius > 0,
                AcceptancePolicy::BestMoves
                | AcceptancePolicy::BestMovesTreebased { .. }
                | AcceptancePolicy::BestMovesFixedTree => improved_this_radius,
            };
            if !radius_made_progress {
                break;
            }
            radius *= 2;
        }

        merge.add_dag(&sampled)?;

        stats.push(IterationStats {
            iteration,
            sampled_tree_parsimony,
            radii_explored,
            moves_attempted,
            moves_accepted,
            merge_node_count: merge.node_count(),
        });
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::Reference;
    use crate::sample_id::SampleId;

    fn six_leaf_tree() -> Dag {
        let reference = Arc::new(Reference::new("ref", "GAA").expect("valid sequence"));
        let mut dag = Dag::new(reference.clone());
        let leaf_seqs = ["ACC", "TAG", "GGG", "ACG", "CTT", "TCC"];
        let internal_seqs = ["TGG", "GTC", "AGT", "GAA"];
        let mut ids = Vec::new();
        for (i, seq) in leaf_seqs.iter().enumerate() {
            let cg = CompactGenome::from_sequence(seq, &reference).expect("valid sequence");
            ids.push(dag.add_node(cg, Some(SampleId::intern(format!("leaf_{}", i + 1)))));
        }
        for seq in internal_seqs {
            let cg = CompactGenome::from_sequence(seq, &reference).expect("valid sequence");
            ids.push(dag.add_node(cg, None));
        }
        let ua = dag.add_node(CompactGenome::empty(), None);
        dag.set_ua(ua);
        let n = |i: usize| ids[i - 1];
        let mut mk_edge = |parent: usize, child: usize, clade: usize| {
            let p = n(parent);
            let c = n(child);
            let m = dag.node(p).compact_genome.clone().edge_mutations_to(&dag.node(c).compact_genome.clone(), &reference);
            dag.add_edge(p, c, clade, m)
        };
        mk_edge(7, 1, 0);
        mk_edge(7, 2, 1);
        mk_edge(8, 3, 0);
        mk_edge(8, 4, 1);
        mk_edge(9, 7, 0);
        mk_edge(9, 8, 1);
        mk_edge(10, 9, 0);
        mk_edge(10, 5, 1);
        mk_edge(10, 6, 2);
        let ua_cg = dag.node(ua).compact_genome.clone();
        let n10_cg = dag.node(n(10)).compact_genome.clone();
        let ua_muts = ua_cg.edge_mutations_to(&n10_cg, &reference);
        dag.add_edge(ua, n(10), 0, ua_muts);
        dag.recompute_leaf_sets().expect("fixture has a root");
        dag
    }

    #[test]
    fn run_with_all_moves_grows_or_holds_the_merge_result() {
        let dag = six_leaf_tree();
        let reference = dag.reference().clone();
        let merge = Merge::new(reference);
        merge.add_dag(&dag).expect("initial add succeeds");
        let before = merge.node_count();

        let config = OptimizeConfig {
            iterations: 2,
            acceptance: AcceptancePolicy::AllMoves,
            seed: Some(7),
            attempts_per_radius: 4,
            ..OptimizeConfig::default()
        };
        let stats = run(&merge, &config, &crate::spr::ParsimonyMoveScorer, &CancelToken::new()).expect("loop runs");
        assert_eq!(stats.len(), 2);
        assert!(merge.node_count() >= before);
        for s in &stats {
            assert!(s.merge_node_count >= before);
        }
    }

    #[test]
    fn run_is_deterministic_for_a_fixed_seed() {
        let dag = six_leaf_tree();
        let reference = dag.reference().clone();

        let merge_a = Merge::new(reference.clone());
        merge_a.add_dag(&dag).expect("initial add succeeds");
        let merge_b = Merge::new(reference);
        merge_b.add_dag(&dag).expect("initial add succeeds");

        let config = OptimizeConfig {
            iterations: 2,
            acceptance: AcceptancePolicy::BestMoves,
            seed: Some(42),
            attempts_per_radius: 4,
            ..OptimizeConfig::default()
        };
        let stats_a = run(&merge_a, &config, &crate::spr::ParsimonyMoveScorer, &CancelToken::new()).expect("loop runs");
        let stats_b = run(&merge_b, &config, &crate::spr::ParsimonyMoveScorer, &CancelToken::new()).expect("loop runs");
        assert_eq!(stats_a, stats_b);
        assert_eq!(merge_a.node_count(), merge_b.node_count());
    }

    #[test]
    fn cancel_token_stops_before_any_iteration_runs() {
        let dag = six_leaf_tree();
        let reference = dag.reference().clone();
        let merge = Merge::new(reference);
        merge.add_dag(&dag).expect("initial add succeeds");

        let config = OptimizeConfig {
            iterations: 5,
            ..OptimizeConfig::default()
        };
        let cancel = CancelToken::new();
        cancel.request();
        let stats = run(&merge, &config, &crate::spr::ParsimonyMoveScorer, &cancel).expect("loop runs");
        assert!(stats.is_empty());
    }

    #[test]
    fn treebased_acceptance_runs_without_error() {
        let dag = six_leaf_tree();
        let reference = dag.reference().clone();
        let merge = Merge::new(reference);
        merge.add_dag(&dag).expect("initial add succeeds");

        let config = OptimizeConfig {
            iterations: 1,
            acceptance: AcceptancePolicy::BestMovesTreebased { alpha: 1, beta: 0 },
            seed: Some(3),
            attempts_per_radius: 4,
            ..OptimizeConfig::default()
        };
        let stats = run(&merge, &config, &crate::spr::ParsimonyMoveScorer, &CancelToken::new()).expect("loop runs");
        assert_eq!(stats.len(), 1);
    }
}
