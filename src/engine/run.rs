//! The iteration scheduler and the `Engine` handle.
//!
//! Iterations are consumed in batches, one unit of work per batch, committed
//! at batch end. A failed batch is rolled back wholesale and aborts the run;
//! there is no retry. The monitor observes the run at a configurable cadence
//! and may stop it early.

use rand::rngs::StdRng;
use tracing::debug;

use crate::model::{NodeId, WeightVec, labels};
use crate::storage::TreeStore;
use crate::tx::TxMode;
use crate::{Error, Result};
use super::builder::EngineBuilder;
use super::evaluate::evaluate;
use super::registry::{Operator, PolicyMap};
use super::Cx;

/// Monitor callback: `(iteration, context) -> stop?`. Invoked once before
/// iteration 0 and then whenever the counter hits the configured cadence.
pub(crate) type MonitorFn<S> = Box<dyn FnMut(u64, &mut Cx<'_, S>) -> Result<bool>>;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    /// Iterations actually completed.
    pub iterations: u64,
    /// True if the monitor requested termination before `max_iterations`.
    pub stopped_early: bool,
}

/// The computation engine: a store, an ordered operator registry, named vote
/// policies, and one shared random source. Built via [`Engine::builder`].
///
/// `R` is the result type operators may return and have propagated to their
/// parent's operator; `()` when unused.
pub struct Engine<S: TreeStore, R = ()> {
    pub(crate) store: S,
    pub(crate) ops: Vec<Operator<S, R>>,
    pub(crate) policies: PolicyMap<S>,
    pub(crate) root_filter: WeightVec,
    pub(crate) monitor: Option<MonitorFn<S>>,
    pub(crate) monitor_every: u64,
    pub(crate) rng: StdRng,
    pub(crate) iteration: u64,
}

impl<S: TreeStore, R> Engine<S, R> {
    /// Start configuring an engine over the given store.
    pub fn builder(store: S) -> EngineBuilder<S, R> {
        EngineBuilder::new(store)
    }

    /// Run with the default batch size of 100 iterations per unit of work.
    pub fn run(&mut self, max_iterations: u64) -> Result<RunOutcome> {
        self.run_batched(max_iterations, 100)
    }

    /// Run up to `max_iterations`, committing every `batch_size` iterations.
    pub fn run_batched(&mut self, max_iterations: u64, batch_size: u64) -> Result<RunOutcome> {
        if batch_size == 0 {
            return Err(Error::Config("batch size must be nonzero".into()));
        }

        let Self { store, ops, policies, root_filter, monitor, monitor_every, rng, iteration } =
            self;
        let store: &S = store;
        let ops: &[Operator<S, R>] = ops;
        let policies: &PolicyMap<S> = policies;
        let root_filter: &WeightVec = root_filter;
        *iteration = 0;

        // Monitor once before any iteration, in its own unit of work.
        let mut stopped = false;
        if let Some(m) = monitor.as_mut() {
            let mut tx = store.begin_tx(TxMode::ReadWrite)?;
            let mut cx = Cx {
                store,
                tx: &mut tx,
                rng: &mut *rng,
                iteration: 0,
                operator_count: ops.len(),
            };
            stopped = m(0, &mut cx)?;
            store.commit_tx(tx)?;
        }

        let mut remaining = max_iterations;
        while remaining > 0 && !stopped {
            let batch = batch_size.min(remaining);
            remaining -= batch;

            let mut tx = store.begin_tx(TxMode::ReadWrite)?;
            match run_batch(
                store, &mut tx, ops, policies, root_filter, monitor, *monitor_every,
                &mut *rng, iteration, batch,
            ) {
                Ok(stop) => {
                    store.commit_tx(tx)?;
                    stopped = stop;
                }
                Err(e) => {
                    store.rollback_tx(tx)?;
                    return Err(e);
                }
            }
            debug!(iteration = *iteration, "batch committed");
        }

        Ok(RunOutcome { iterations: *iteration, stopped_early: stopped })
    }

    /// Run a closure with a context in its own unit of work — committed on
    /// success, rolled back on error. The way to inspect or adjust the tree
    /// between runs.
    pub fn with_cx<T>(&mut self, f: impl FnOnce(&mut Cx<'_, S>) -> Result<T>) -> Result<T> {
        let Self { store, ops, rng, iteration, .. } = self;
        let store: &S = store;
        let mut tx = store.begin_tx(TxMode::ReadWrite)?;
        let mut cx = Cx {
            store,
            tx: &mut tx,
            rng: &mut *rng,
            iteration: *iteration,
            operator_count: ops.len(),
        };
        match f(&mut cx) {
            Ok(value) => {
                store.commit_tx(tx)?;
                Ok(value)
            }
            Err(e) => {
                store.rollback_tx(tx)?;
                Err(e)
            }
        }
    }

    /// Access the underlying store (for advanced use).
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Tear down the engine and hand back the store.
    pub fn into_store(self) -> S {
        self.store
    }

    /// Iterations completed in the current/last run.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn operator_count(&self) -> usize {
        self.ops.len()
    }

    /// Registered operator names, in registry order.
    pub fn operator_names(&self) -> Vec<&str> {
        self.ops.iter().map(|op| op.name()).collect()
    }
}

/// One batch: `batch` iterations against a single unit of work.
/// Returns whether the monitor requested early termination.
#[allow(clippy::too_many_arguments)]
fn run_batch<S: TreeStore, R>(
    store: &S,
    tx: &mut S::Tx,
    ops: &[Operator<S, R>],
    policies: &PolicyMap<S>,
    root_filter: &WeightVec,
    monitor: &mut Option<MonitorFn<S>>,
    monitor_every: u64,
    rng: &mut StdRng,
    iteration: &mut u64,
    batch: u64,
) -> Result<bool> {
    for _ in 0..batch {
        let roots: Vec<NodeId> = store
            .nodes_by_label(tx, labels::ROOT)?
            .into_iter()
            .map(|n| n.id)
            .collect();
        for root in roots {
            let mut cx = Cx {
                store,
                tx: &mut *tx,
                rng: &mut *rng,
                iteration: *iteration,
                operator_count: ops.len(),
            };
            evaluate(&mut cx, ops, policies, root, root_filter)?;
        }

        *iteration += 1;
        if *iteration % monitor_every == 0 {
            if let Some(m) = monitor.as_mut() {
                let mut cx = Cx {
                    store,
                    tx: &mut *tx,
                    rng: &mut *rng,
                    iteration: *iteration,
                    operator_count: ops.len(),
                };
                if m(*iteration, &mut cx)? {
                    return Ok(true);
                }
            }
        }
    }
    Ok(false)
}
