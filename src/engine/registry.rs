//! Operator and vote-policy registration.
//!
//! Both registries are built by explicit calls on the engine builder —
//! an ordered operator list and a named policy map. Nothing is discovered
//! by introspection; what you register is exactly what runs.

use hashbrown::HashMap;

use crate::model::{NodeId, WeightVec};
use crate::storage::TreeStore;
use crate::Result;
use super::Cx;

/// The callable body of an operator. Receives the context, the node under
/// evaluation, and the result values collected from the node's children this
/// pass. May mutate the tree arbitrarily; the returned value (if any) is
/// propagated to the parent's operator.
pub(crate) type OperatorFn<S, R> =
    Box<dyn Fn(&mut Cx<'_, S>, NodeId, Vec<R>) -> Result<Option<R>>>;

/// A named, indexed operator. Index order is registration order and defines
/// the meaning of each filter/vote slot.
pub struct Operator<S: TreeStore, R> {
    pub(crate) name: String,
    pub(crate) apply: OperatorFn<S, R>,
}

impl<S: TreeStore, R> Operator<S, R> {
    pub(crate) fn new(
        name: impl Into<String>,
        apply: impl Fn(&mut Cx<'_, S>, NodeId, Vec<R>) -> Result<Option<R>> + 'static,
    ) -> Self {
        Self { name: name.into(), apply: Box::new(apply) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// The callable body of a vote-aggregation policy: combines the node's own
/// stored vote with the vote vectors returned by its children.
pub(crate) type PolicyFn<S> =
    Box<dyn Fn(&mut Cx<'_, S>, NodeId, Vec<WeightVec>) -> Result<WeightVec>>;

/// Named vote-aggregation policies. A node opts in by naming one in its
/// `vote_policy` property; everything else gets [`default_policy`].
pub struct PolicyMap<S: TreeStore> {
    policies: HashMap<String, PolicyFn<S>>,
}

impl<S: TreeStore> PolicyMap<S> {
    pub(crate) fn new() -> Self {
        Self { policies: HashMap::new() }
    }

    pub(crate) fn insert(&mut self, name: impl Into<String>, policy: PolicyFn<S>) {
        self.policies.insert(name.into(), policy);
    }

    pub(crate) fn get(&self, name: &str) -> Option<&PolicyFn<S>> {
        self.policies.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.policies.contains_key(name)
    }
}

/// The default vote-aggregation policy: the node's own stored vote plus the
/// elementwise sum of its children's votes.
pub(crate) fn default_policy<S: TreeStore>(
    cx: &mut Cx<'_, S>,
    id: NodeId,
    child_votes: Vec<WeightVec>,
) -> Result<WeightVec> {
    let mut vote = cx.vote(id)?;
    for child_vote in &child_votes {
        vote.accumulate(child_vote)?;
    }
    Ok(vote)
}
