//! # canopy — Stochastic Tree Computation Engine
//!
//! An engine for iterative, stochastic computations over a rooted, mutable
//! tree of labeled entities. Each iteration walks the tree once: eligibility
//! *filters* compose multiplicatively on the way down, preference *votes*
//! aggregate additively on the way up, and every node picks one of the
//! registered operators by a weighted random draw and lets it mutate the tree
//! in place (clone a subtree, extinguish a node, rewrite properties, rewire
//! containment edges).
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `TreeStore` is the contract between the engine and storage
//! 2. **Clean DTOs**: `Node`, `Relationship`, `Value` cross all boundaries
//! 3. **Explicit context**: operators, policies, and monitors receive a `Cx`
//!    handle — no global engine singleton
//! 4. **Single-threaded by contract**: one pass owns the whole tree; the only
//!    nondeterminism is the engine's random source
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use canopy::{Engine, MemoryStore, WeightVec, labels, props};
//!
//! # fn example() -> canopy::Result<()> {
//! let mut engine = Engine::<MemoryStore>::builder(MemoryStore::new())
//!     .operator("grow", |cx, node, _results| {
//!         cx.shallow_clone(node)?;
//!         Ok(None)
//!     })
//!     .operator("die", |cx, node, _results| {
//!         cx.set_inactive(node)?;
//!         Ok(None)
//!     })
//!     .topology(|cx| {
//!         let root = cx.create_node(&[labels::ROOT], Default::default())?;
//!         cx.set_property(root, props::VOTE, WeightVec::ones(2).into_value())?;
//!         Ok(())
//!     })
//!     .monitor(|iteration, cx| {
//!         println!("{iteration}: {} nodes", cx.node_count()?);
//!         Ok(false)
//!     })
//!     .build()?;
//!
//! engine.run(100)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Storage
//!
//! | Store | Module | Description |
//! |-------|--------|-------------|
//! | `MemoryStore` | `storage::memory` | In-memory tree for testing/embedding |
//!
//! Any type implementing [`TreeStore`] can back the engine.

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod storage;
pub mod tx;
pub mod engine;
pub mod export;

// ============================================================================
// Re-exports: Model (the DTOs)
// ============================================================================

pub use model::{
    Node, Relationship, Value, PropertyMap, WeightVec,
    NodeId, RelId, Direction,
};
pub use model::{labels, props, rels};

// ============================================================================
// Re-exports: Storage
// ============================================================================

pub use storage::{TreeStore, MemoryStore};

// ============================================================================
// Re-exports: Transactions
// ============================================================================

pub use tx::{Transaction, TxMode, TxId};

// ============================================================================
// Re-exports: Engine
// ============================================================================

pub use engine::{
    Engine, EngineBuilder, Cx, Evaluation, RunOutcome,
    TopologySpec, NodeSpec, EdgeSpec,
};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Construction-time failure: no operators, no roots, bad root filter, …
    #[error("Configuration error: {0}")]
    Config(String),

    /// A fatal engine bug, e.g. the weighted draw running off the operator
    /// table. The run must abort rather than continue silently.
    #[error("Invariant violation: {0}")]
    Invariant(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Transaction error: {0}")]
    Tx(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// A node named a vote policy that was never registered.
    #[error("Unknown vote policy: {0}")]
    UnknownPolicy(String),

    /// A stored filter or vote does not match the operator count.
    #[error("Weight vector length mismatch: expected {expected}, got {got}")]
    WeightLength { expected: usize, got: usize },

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
