//! A whole-engine exercise: a small cell-division model.
//!
//! Tissue contains cells, cells contain chromosomes, chromosomes contain
//! genes. Division genes vote for `divide`, apoptosis genes vote for `die`;
//! chromosomes and genes carry a zero filter, so only cells (and the tissue,
//! which both operators ignore) ever act. The run is seeded, so the test is
//! reproducible.

use std::rc::Rc;

use canopy::export::export_json_dump;
use canopy::{Cx, Engine, MemoryStore, WeightVec, labels, props};

const TISSUE: &str = "Tissue";
const CELL: &str = "Cell";
const CHROMOSOME: &str = "Chromosome";
const DIV_GENE: &str = "DivGene";
const APOPT_GENE: &str = "ApoptGene";

const N_CELLS: usize = 10;

fn build_tissue(cx: &mut Cx<'_, MemoryStore>) -> canopy::Result<()> {
    let zero_filter = WeightVec::from([0.0, 0.0]).into_value();

    let tissue = cx.create_node(&[labels::ROOT, TISSUE], Default::default())?;

    for _ in 0..N_CELLS {
        let cell = cx.create_node(&[CELL], Default::default())?;
        cx.set_property(cell, props::VOTE_POLICY, "cellVote")?;
        cx.link(tissue, cell)?;

        for (gene_label, vote) in [(DIV_GENE, [1.0, 0.0]), (APOPT_GENE, [0.0, 1.0])] {
            let chromosome = cx.create_node(&[CHROMOSOME], Default::default())?;
            cx.set_property(chromosome, props::FILTER, zero_filter.clone())?;
            cx.link(cell, chromosome)?;

            let gene = cx.create_node(&[gene_label], Default::default())?;
            cx.set_property(gene, props::FILTER, zero_filter.clone())?;
            cx.set_property(gene, props::VOTE, WeightVec::from(vote).into_value())?;
            cx.link(chromosome, gene)?;
        }
    }
    Ok(())
}

fn build_engine(seed: u64) -> Engine<MemoryStore> {
    Engine::<MemoryStore>::builder(MemoryStore::new())
        .operator("divide", |cx, node, _results| {
            if cx.has_label(node, CELL)? {
                cx.deep_clone(node)?;
            }
            Ok(None)
        })
        .operator("die", |cx, node, _results| {
            if cx.has_label(node, CELL)? {
                cx.set_inactive(node)?;
            }
            Ok(None)
        })
        // Pass-through today; the interception point for population caps.
        .vote_policy("cellVote", |cx, node, child_votes| {
            let mut vote = cx.vote(node)?;
            for child_vote in &child_votes {
                vote.accumulate(child_vote)?;
            }
            Ok(vote)
        })
        .rng_seed(seed)
        .topology(build_tissue)
        .build()
        .unwrap()
}

#[test]
fn test_population_runs_and_stays_consistent() {
    let mut engine = build_engine(1234);

    let outcome = engine.run_batched(30, 10).unwrap();
    assert_eq!(outcome.iterations, 30);

    let census = engine
        .with_cx(|cx| {
            let active_cells = cx.active_nodes_with_label(CELL)?;
            let all_cells = cx.nodes_with_label(CELL)?;

            // Dead cells carry their extinction stamp
            for cell in &all_cells {
                if !cx.is_active(*cell)? {
                    let at = cx
                        .property(*cell, props::INACTIVE_AT)?
                        .and_then(|v| v.as_int())
                        .expect("inactive cells are stamped");
                    assert!((0..30).contains(&at));
                }
            }

            // Active cells are exactly the tissue's active children
            let tissue = cx.nodes_with_label(TISSUE)?[0];
            let mut active_children = Vec::new();
            for child in cx.children(tissue)? {
                if cx.is_active(child)? {
                    active_children.push(child);
                }
            }
            assert_eq!(active_children.len(), active_cells.len());

            // Every cell, cloned or original, kept a well-formed substructure
            for cell in &all_cells {
                assert_eq!(cx.filter(*cell)?.len(), 2);
                assert_eq!(cx.vote(*cell)?.len(), 2);
                let chromosomes = cx.children_with_label(*cell, CHROMOSOME)?;
                assert_eq!(chromosomes.len(), 2);
                for chromosome in chromosomes {
                    assert_eq!(cx.filter(chromosome)?, WeightVec::from([0.0, 0.0]));
                    assert_eq!(cx.children(chromosome)?.len(), 1);
                }
            }
            Ok(all_cells.len())
        })
        .unwrap();

    assert!(census >= N_CELLS, "divisions never shrink the census");
}

#[test]
fn test_monitor_observes_the_population() {
    let counts = Rc::new(std::cell::RefCell::new(Vec::<(u64, usize)>::new()));
    let counts_in_monitor = Rc::clone(&counts);

    let mut engine = Engine::<MemoryStore>::builder(MemoryStore::new())
        .operator("divide", |cx, node, _results| {
            if cx.has_label(node, CELL)? {
                cx.deep_clone(node)?;
            }
            Ok(None)
        })
        .operator("die", |cx, node, _results| {
            if cx.has_label(node, CELL)? {
                cx.set_inactive(node)?;
            }
            Ok(None)
        })
        .vote_policy("cellVote", |cx, node, child_votes| {
            let mut vote = cx.vote(node)?;
            for child_vote in &child_votes {
                vote.accumulate(child_vote)?;
            }
            Ok(vote)
        })
        .rng_seed(7)
        .monitor_every(5)
        .monitor(move |iteration, cx| {
            let alive = cx.active_nodes_with_label(CELL)?.len();
            counts_in_monitor.borrow_mut().push((iteration, alive));
            Ok(false)
        })
        .topology(build_tissue)
        .build()
        .unwrap();

    engine.run(20).unwrap();

    let counts = counts.borrow();
    let iterations: Vec<u64> = counts.iter().map(|(i, _)| *i).collect();
    assert_eq!(iterations, vec![0, 5, 10, 15, 20]);
    assert_eq!(counts[0].1, N_CELLS, "pre-run census sees the bootstrap tissue");
}

#[test]
fn test_seeded_runs_are_reproducible() {
    let census = |seed: u64| -> (usize, usize) {
        let mut engine = build_engine(seed);
        engine.run(15).unwrap();
        engine
            .with_cx(|cx| {
                Ok((
                    cx.nodes_with_label(CELL)?.len(),
                    cx.active_nodes_with_label(CELL)?.len(),
                ))
            })
            .unwrap()
    };

    assert_eq!(census(42), census(42));
}

#[test]
fn test_dump_after_a_run_parses() {
    let mut engine = build_engine(5);
    engine.run(10).unwrap();

    let mut buf = Vec::new();
    export_json_dump(engine.store(), &mut buf).unwrap();

    let dump: canopy::export::TreeDump = serde_json::from_slice(&buf).unwrap();
    assert_eq!(dump.node_count as usize, dump.nodes.len());
    assert!(dump.nodes.iter().any(|n| n.has_label(TISSUE)));
    assert!(dump.relationship_count > 0);
}
