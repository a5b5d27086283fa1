//! # The Computation Engine
//!
//! One iteration = one recursive pass per root: filters flow down, votes
//! flow up, and each node draws one operator from the registry, weighted by
//! `effective_filter ⊙ aggregated_vote`. The scheduler batches iterations
//! into units of work and drives the monitor.
//!
//! | Piece | Module | Role |
//! |-------|--------|------|
//! | `Cx` | `cx` | explicit context handle passed to all simulation code |
//! | `Operator`, `PolicyMap` | `registry` | ordered operators, named vote policies |
//! | `evaluate` | `evaluate` | the recursive pass |
//! | `Engine` | `run` | scheduler, batching, monitor |
//! | `EngineBuilder` | `builder` | configuration and bootstrap |
//! | `TopologySpec` | `topology` | declarative initial trees |

pub mod cx;
pub mod registry;
pub mod evaluate;
pub mod topology;
pub mod builder;
pub mod run;

pub use cx::Cx;
pub use evaluate::Evaluation;
pub use registry::Operator;
pub use run::{Engine, RunOutcome};
pub use builder::EngineBuilder;
pub use topology::{TopologySpec, NodeSpec, EdgeSpec};
