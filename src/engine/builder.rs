//! Engine construction from a simulation configuration.
//!
//! Operators and vote policies are registered by explicit calls, in order.
//! `build()` bootstraps the initial topology, fills default votes, and
//! validates the configuration; every failure there is fatal.

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::model::{NodeId, WeightVec, labels, props};
use crate::storage::TreeStore;
use crate::tx::TxMode;
use crate::{Error, Result};
use super::registry::{Operator, PolicyMap};
use super::run::{Engine, MonitorFn};
use super::topology::TopologySpec;
use super::Cx;

type BootstrapFn<S> = Box<dyn FnOnce(&mut Cx<'_, S>) -> Result<()>>;

/// Builder for [`Engine`]. Created via [`Engine::builder`].
pub struct EngineBuilder<S: TreeStore, R = ()> {
    store: S,
    ops: Vec<Operator<S, R>>,
    policies: PolicyMap<S>,
    root_filter: Option<WeightVec>,
    monitor: Option<MonitorFn<S>>,
    monitor_every: u64,
    rng_seed: Option<u64>,
    topology_specs: Vec<TopologySpec>,
    topology_fns: Vec<BootstrapFn<S>>,
}

impl<S: TreeStore, R> EngineBuilder<S, R> {
    pub(crate) fn new(store: S) -> Self {
        Self {
            store,
            ops: Vec::new(),
            policies: PolicyMap::new(),
            root_filter: None,
            monitor: None,
            monitor_every: 1,
            rng_seed: None,
            topology_specs: Vec::new(),
            topology_fns: Vec::new(),
        }
    }

    /// Register the next operator. Registration order is selection order:
    /// the n-th registered operator owns the n-th filter/vote slot.
    pub fn operator(
        mut self,
        name: impl Into<String>,
        apply: impl Fn(&mut Cx<'_, S>, NodeId, Vec<R>) -> Result<Option<R>> + 'static,
    ) -> Self {
        self.ops.push(Operator::new(name, apply));
        self
    }

    /// Register a named vote-aggregation policy. Nodes opt in by naming it
    /// in their `vote_policy` property.
    pub fn vote_policy(
        mut self,
        name: impl Into<String>,
        policy: impl Fn(&mut Cx<'_, S>, NodeId, Vec<WeightVec>) -> Result<WeightVec> + 'static,
    ) -> Self {
        self.policies.insert(name, Box::new(policy));
        self
    }

    /// Filter applied at every root. Defaults to all-ones.
    pub fn root_filter(mut self, filter: impl Into<WeightVec>) -> Self {
        self.root_filter = Some(filter.into());
        self
    }

    /// Observe (and optionally stop) the run. Called once before iteration 0
    /// and then at the configured cadence; returning `Ok(true)` stops the run.
    pub fn monitor(
        mut self,
        monitor: impl FnMut(u64, &mut Cx<'_, S>) -> Result<bool> + 'static,
    ) -> Self {
        self.monitor = Some(Box::new(monitor));
        self
    }

    /// Monitor cadence in iterations. Defaults to every iteration; 0 means
    /// the same.
    pub fn monitor_every(mut self, iterations: u64) -> Self {
        self.monitor_every = iterations.max(1);
        self
    }

    /// Seed the engine's random source for reproducible runs.
    pub fn rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    /// Declarative initial topology; applied before any imperative callback.
    pub fn topology_spec(mut self, spec: TopologySpec) -> Self {
        self.topology_specs.push(spec);
        self
    }

    /// Imperative initial-topology callback, run at build time.
    pub fn topology(
        mut self,
        build: impl FnOnce(&mut Cx<'_, S>) -> Result<()> + 'static,
    ) -> Self {
        self.topology_fns.push(Box::new(build));
        self
    }

    /// Bootstrap the topology and validate the configuration. Any failure
    /// here is fatal and rolls back whatever the bootstrap created.
    pub fn build(self) -> Result<Engine<S, R>> {
        let Self {
            store,
            ops,
            policies,
            root_filter,
            monitor,
            monitor_every,
            rng_seed,
            topology_specs,
            topology_fns,
        } = self;

        if ops.is_empty() {
            return Err(Error::Config("no operators registered".into()));
        }
        let n = ops.len();

        let root_filter = root_filter.unwrap_or_else(|| WeightVec::ones(n));
        if root_filter.len() != n {
            return Err(Error::Config(format!(
                "root filter has {} weights for {} operators",
                root_filter.len(),
                n
            )));
        }

        let mut rng = match rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut tx = store.begin_tx(TxMode::ReadWrite)?;
        match bootstrap(&store, &mut tx, &mut rng, n, &topology_specs, topology_fns) {
            Ok(()) => store.commit_tx(tx)?,
            Err(e) => {
                store.rollback_tx(tx)?;
                return Err(e);
            }
        }

        Ok(Engine {
            store,
            ops,
            policies,
            root_filter,
            monitor,
            monitor_every,
            rng,
            iteration: 0,
        })
    }
}

/// Build the initial topology, fill default votes, and check the
/// configuration invariants the evaluator will rely on.
fn bootstrap<S: TreeStore>(
    store: &S,
    tx: &mut S::Tx,
    rng: &mut StdRng,
    operator_count: usize,
    specs: &[TopologySpec],
    fns: Vec<BootstrapFn<S>>,
) -> Result<()> {
    let mut cx = Cx { store, tx, rng, iteration: 0, operator_count };

    for spec in specs {
        spec.apply(&mut cx)?;
    }
    for build in fns {
        build(&mut cx)?;
    }

    // Every node gets an explicit baseline vote, as zeros unless set.
    for node in cx.store.all_nodes(cx.tx)? {
        if node.get(props::VOTE).is_none() {
            cx.store.set_node_property(
                cx.tx,
                node.id,
                props::VOTE,
                WeightVec::zeros(operator_count).into_value(),
            )?;
        }
    }

    // Malformed weight vectors are a configuration error, not a runtime one.
    for node in cx.store.all_nodes(cx.tx)? {
        cx.filter_of(&node)
            .map_err(|e| Error::Config(format!("node {}: invalid filter: {e}", node.id)))?;
        cx.vote_of(&node)
            .map_err(|e| Error::Config(format!("node {}: invalid vote: {e}", node.id)))?;
    }

    if cx.store.nodes_by_label(cx.tx, labels::ROOT)?.is_empty() {
        return Err(Error::Config("no Root nodes found".into()));
    }

    Ok(())
}
