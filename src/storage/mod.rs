//! # Tree Store Trait
//!
//! This is THE contract between the engine and any storage layer.
//! Every operation the engine needs from persistent or embedded graph
//! storage is defined here; the engine never touches a store any other way.
//!
//! The trait is synchronous: evaluation is one single-threaded, depth-first
//! pass with no suspension points, and the contract mirrors that.
//!
//! ## Implementations
//!
//! | Store | Module | Description |
//! |-------|--------|-------------|
//! | `MemoryStore` | `memory` | In-memory tree for testing/embedding |

pub mod memory;

use crate::model::*;
use crate::tx::{Transaction, TxMode};
use crate::Result;

pub use memory::MemoryStore;

/// The universal storage contract.
///
/// A missing node on lookup is the canonical "deleted" signal: `get_node`
/// returns `None`, and mutators return `Error::NotFound`. The evaluator
/// relies on this — there is no separate tombstone flag.
pub trait TreeStore: 'static {
    /// The transaction type for this store.
    type Tx: Transaction;

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Begin a new unit of work.
    fn begin_tx(&self, mode: TxMode) -> Result<Self::Tx>;

    /// Commit a unit of work, making its mutations durable.
    fn commit_tx(&self, tx: Self::Tx) -> Result<()>;

    /// Roll back a unit of work, discarding its mutations.
    fn rollback_tx(&self, tx: Self::Tx) -> Result<()>;

    // ========================================================================
    // Node CRUD
    // ========================================================================

    /// Create a node with the given labels and properties.
    fn create_node(
        &self,
        tx: &mut Self::Tx,
        labels: &[&str],
        props: PropertyMap,
    ) -> Result<NodeId>;

    /// Get a node by ID. Returns None if not found.
    fn get_node(&self, tx: &Self::Tx, id: NodeId) -> Result<Option<Node>>;

    /// Delete a node. Returns true if it existed.
    /// Fails if the node still has relationships.
    fn delete_node(&self, tx: &mut Self::Tx, id: NodeId) -> Result<bool>;

    /// Set a property on a node (upsert).
    fn set_node_property(
        &self,
        tx: &mut Self::Tx,
        id: NodeId,
        key: &str,
        val: Value,
    ) -> Result<()>;

    /// Remove a property from a node.
    fn remove_node_property(&self, tx: &mut Self::Tx, id: NodeId, key: &str) -> Result<()>;

    /// Add a label to a node.
    fn add_label(&self, tx: &mut Self::Tx, id: NodeId, label: &str) -> Result<()>;

    /// Remove a label from a node.
    fn remove_label(&self, tx: &mut Self::Tx, id: NodeId, label: &str) -> Result<()>;

    /// Delete a node and all its relationships in one operation.
    ///
    /// Default: get all relationships, delete each, then delete the node.
    fn detach_delete_node(&self, tx: &mut Self::Tx, id: NodeId) -> Result<bool> {
        let rels = self.get_relationships(tx, id, Direction::Both, None)?;
        for rel in &rels {
            self.delete_relationship(tx, rel.id)?;
        }
        self.delete_node(tx, id)
    }

    // ========================================================================
    // Relationship CRUD
    // ========================================================================

    /// Create a relationship between two nodes.
    fn create_relationship(
        &self,
        tx: &mut Self::Tx,
        src: NodeId,
        dst: NodeId,
        rel_type: &str,
        props: PropertyMap,
    ) -> Result<RelId>;

    /// Get a relationship by ID.
    fn get_relationship(&self, tx: &Self::Tx, id: RelId) -> Result<Option<Relationship>>;

    /// Delete a relationship. Returns true if it existed.
    fn delete_relationship(&self, tx: &mut Self::Tx, id: RelId) -> Result<bool>;

    // ========================================================================
    // Traversal
    // ========================================================================

    /// Get all relationships of a node, optionally filtered by direction and type.
    fn get_relationships(
        &self,
        tx: &Self::Tx,
        node: NodeId,
        dir: Direction,
        rel_type: Option<&str>,
    ) -> Result<Vec<Relationship>>;

    // ========================================================================
    // Schema introspection
    // ========================================================================

    /// Total number of nodes.
    fn node_count(&self, tx: &Self::Tx) -> Result<u64>;

    /// Total number of relationships.
    fn relationship_count(&self, tx: &Self::Tx) -> Result<u64>;

    /// All distinct labels in the tree.
    fn labels(&self, tx: &Self::Tx) -> Result<Vec<String>>;

    /// All distinct relationship types in the tree.
    fn relationship_types(&self, tx: &Self::Tx) -> Result<Vec<String>>;

    // ========================================================================
    // Scan
    // ========================================================================

    /// Return all nodes (no label filter).
    fn all_nodes(&self, tx: &Self::Tx) -> Result<Vec<Node>>;

    /// Find all nodes with a given label.
    fn nodes_by_label(&self, tx: &Self::Tx, label: &str) -> Result<Vec<Node>>;

    /// Find all relationships of a given type.
    ///
    /// Default: scans all nodes and collects outgoing relationships of that type.
    fn relationships_by_type(&self, tx: &Self::Tx, rel_type: &str) -> Result<Vec<Relationship>> {
        let mut result = Vec::new();
        let nodes = self.all_nodes(tx)?;
        for node in &nodes {
            let rels = self.get_relationships(tx, node.id, Direction::Outgoing, Some(rel_type))?;
            result.extend(rels);
        }
        Ok(result)
    }

    // ========================================================================
    // Batch operations
    // ========================================================================

    /// Batch create nodes. Optimizable for columnar stores.
    ///
    /// Default falls back to sequential `create_node` calls.
    fn create_nodes_batch(
        &self,
        tx: &mut Self::Tx,
        nodes: Vec<(Vec<String>, PropertyMap)>,
    ) -> Result<Vec<NodeId>> {
        let mut ids = Vec::with_capacity(nodes.len());
        for (labels, props) in nodes {
            let label_refs: Vec<&str> = labels.iter().map(|s| s.as_str()).collect();
            ids.push(self.create_node(tx, &label_refs, props)?);
        }
        Ok(ids)
    }

    /// Batch create relationships.
    ///
    /// Default falls back to sequential `create_relationship` calls.
    fn create_relationships_batch(
        &self,
        tx: &mut Self::Tx,
        rels: Vec<(NodeId, NodeId, String, PropertyMap)>,
    ) -> Result<Vec<RelId>> {
        let mut ids = Vec::with_capacity(rels.len());
        for (src, dst, rel_type, props) in rels {
            ids.push(self.create_relationship(tx, src, dst, &rel_type, props)?);
        }
        Ok(ids)
    }
}
