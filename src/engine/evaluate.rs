//! The recursive evaluator: one depth-first pass over one node's subtree.
//!
//! Filters compose multiplicatively on the way down and are fixed before a
//! node's own vote is known — a node's vote weights its own operator draw,
//! never its children's. Votes compose additively on the way up through each
//! node's aggregation policy. The product of combined filter and aggregated
//! vote drives a roulette-wheel draw over the operator registry.

use rand::Rng;
use rand::rngs::StdRng;
use tracing::debug;

use crate::model::{NodeId, WeightVec, props};
use crate::storage::TreeStore;
use crate::{Error, Result};
use super::registry::{Operator, PolicyMap, default_policy};
use super::Cx;

/// What one node's evaluation hands to its parent: the operator's result
/// value (if one ran and returned one) and the aggregated vote vector.
#[derive(Debug)]
pub struct Evaluation<R> {
    pub value: Option<R>,
    pub vote: WeightVec,
}

/// Evaluate one node. `None` means the node contributed nothing: it was
/// deleted, inactive, or deleted itself during its own operator.
pub(crate) fn evaluate<S: TreeStore, R>(
    cx: &mut Cx<'_, S>,
    ops: &[Operator<S, R>],
    policies: &PolicyMap<S>,
    id: NodeId,
    parent_filter: &WeightVec,
) -> Result<Option<Evaluation<R>>> {
    // A not-found lookup is the canonical "deleted" signal; inactive nodes
    // are skipped wholesale, subtree included.
    let Some(node) = cx.node(id)? else {
        return Ok(None);
    };
    if !node.is_active() {
        return Ok(None);
    }

    let combined_filter = parent_filter.hadamard(&cx.filter_of(&node)?)?;

    // Children are snapshotted before recursion; each is re-checked at its
    // own entry, so a sibling deleting it mid-pass is skipped, not followed.
    let child_ids = cx.children(id)?;
    let mut child_votes = Vec::with_capacity(child_ids.len());
    let mut child_values = Vec::with_capacity(child_ids.len());
    for child in child_ids {
        if !cx.is_live(child)? {
            continue;
        }
        if let Some(eval) = evaluate(cx, ops, policies, child, &combined_filter)? {
            child_votes.push(eval.vote);
            if let Some(value) = eval.value {
                child_values.push(value);
            }
        }
    }

    let vote = match node.get(props::VOTE_POLICY) {
        Some(value) => {
            let name = value
                .as_str()
                .ok_or_else(|| Error::UnknownPolicy(value.to_string()))?;
            let policy = policies
                .get(name)
                .ok_or_else(|| Error::UnknownPolicy(name.to_string()))?;
            policy(cx, id, child_votes)?
        }
        None => default_policy(cx, id, child_votes)?,
    };
    if vote.len() != ops.len() {
        return Err(Error::WeightLength { expected: ops.len(), got: vote.len() });
    }

    // Local to this node; children already got combined_filter.
    let selection_weights = combined_filter.hadamard(&vote)?;

    let mut value = None;
    match select_operator(cx.rng, &selection_weights)? {
        None => {
            debug!(node = %id, "no operator to perform");
        }
        Some(index) => {
            let op = &ops[index];
            debug!(node = %id, operator = %op.name, "performing operator");
            match (op.apply)(cx, id, child_values) {
                Ok(v) => value = v,
                // The node (or something it depended on) vanished under the
                // operator — mid-pass self/sibling deletion is tolerated and
                // the node simply contributes nothing.
                Err(Error::NotFound(what)) => {
                    debug!(node = %id, what = %what, "operator hit a deleted entity");
                    return Ok(None);
                }
                Err(e) => return Err(e),
            }
        }
    }

    // The operator may have deleted the node itself.
    if !cx.is_live(id)? {
        return Ok(None);
    }

    Ok(Some(Evaluation { value, vote }))
}

/// Roulette-wheel draw over the operator weights. Zero total weight means no
/// operator is eligible. With a nonzero total the draw must land on some
/// index; running off the end is an engine bug, not a no-op.
pub(crate) fn select_operator(rng: &mut StdRng, weights: &WeightVec) -> Result<Option<usize>> {
    let total = weights.sum();
    if total == 0.0 {
        return Ok(None);
    }
    let mut limit = rng.gen_range(0.0..total);
    for (index, weight) in weights.iter().enumerate() {
        limit -= weight;
        if limit < 0.0 {
            return Ok(Some(index));
        }
    }
    Err(Error::Invariant(format!(
        "operator selection overran the weight table (total {total})"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_zero_total_selects_nothing() {
        let mut rng = StdRng::seed_from_u64(7);
        let weights = WeightVec::from([0.0, 0.0, 0.0]);
        assert!(select_operator(&mut rng, &weights).unwrap().is_none());
    }

    #[test]
    fn test_single_nonzero_weight_is_certain() {
        let mut rng = StdRng::seed_from_u64(7);
        let weights = WeightVec::from([0.0, 3.5, 0.0]);
        for _ in 0..100 {
            assert_eq!(select_operator(&mut rng, &weights).unwrap(), Some(1));
        }
    }

    #[test]
    fn test_draw_always_lands() {
        let mut rng = StdRng::seed_from_u64(42);
        let weights = WeightVec::from([0.1, 0.0, 2.0, 0.7]);
        for _ in 0..10_000 {
            let picked = select_operator(&mut rng, &weights).unwrap().unwrap();
            assert!(picked < 4);
            assert_ne!(picked, 1, "zero-weight operator must never be drawn");
        }
    }

    #[test]
    fn test_draw_tracks_weight_mass() {
        let mut rng = StdRng::seed_from_u64(1);
        let weights = WeightVec::from([1.0, 9.0]);
        let mut counts = [0u32; 2];
        for _ in 0..10_000 {
            counts[select_operator(&mut rng, &weights).unwrap().unwrap()] += 1;
        }
        // ~10% / ~90% split; generous bounds keep this stable across seeds.
        assert!(counts[0] > 500 && counts[0] < 2000, "counts: {counts:?}");
    }
}
