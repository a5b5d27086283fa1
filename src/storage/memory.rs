//! In-memory tree store.
//!
//! This is the reference implementation of `TreeStore`.
//! It uses hashbrown maps protected by RwLock.
//!
//! ## Limitations
//!
//! - **No real transactions**: `commit_tx()` and `rollback_tx()` are no-ops.
//!   Writes are applied immediately. Rollback does NOT undo mutations.
//! - **Single-writer only**: Per-collection locks mean multi-step mutations
//!   are NOT atomic. Safe for single-threaded or read-heavy use only.
//!
//! Use this store for:
//! - Testing simulations and the engine itself
//! - Embedding canopy in applications that don't need persistence
//! - Validating a model before running against a persistent store

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use hashbrown::HashMap;
use parking_lot::RwLock;

use crate::model::*;
use crate::tx::{Transaction, TxMode, TxId};
use crate::{Error, Result};
use super::TreeStore;

// ============================================================================
// MemoryStore
// ============================================================================

/// In-memory property tree storage.
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    nodes: RwLock<HashMap<NodeId, Node>>,
    relationships: RwLock<HashMap<RelId, Relationship>>,
    /// node_id → list of relationship IDs
    adjacency: RwLock<HashMap<NodeId, Vec<RelId>>>,
    /// label → list of node IDs (poor man's label index)
    label_index: RwLock<HashMap<String, Vec<NodeId>>>,
    next_node_id: AtomicU64,
    next_rel_id: AtomicU64,
    next_tx_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                nodes: RwLock::new(HashMap::new()),
                relationships: RwLock::new(HashMap::new()),
                adjacency: RwLock::new(HashMap::new()),
                label_index: RwLock::new(HashMap::new()),
                next_node_id: AtomicU64::new(1),
                next_rel_id: AtomicU64::new(1),
                next_tx_id: AtomicU64::new(1),
            }),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// MemoryTx
// ============================================================================

/// In-memory transaction (currently just a marker — no real MVCC).
pub struct MemoryTx {
    id: TxId,
    mode: TxMode,
}

impl Transaction for MemoryTx {
    fn mode(&self) -> TxMode { self.mode }
    fn id(&self) -> TxId { self.id }
}

// ============================================================================
// TreeStore impl
// ============================================================================

impl TreeStore for MemoryStore {
    type Tx = MemoryTx;

    fn begin_tx(&self, mode: TxMode) -> Result<MemoryTx> {
        let id = TxId(self.inner.next_tx_id.fetch_add(1, Ordering::Relaxed));
        Ok(MemoryTx { id, mode })
    }

    /// No-op: memory store applies writes immediately, not on commit.
    fn commit_tx(&self, _tx: MemoryTx) -> Result<()> { Ok(()) }

    /// WARNING: No-op. Memory store has no write-ahead log.
    /// Mutations applied during this transaction are NOT reverted.
    fn rollback_tx(&self, _tx: MemoryTx) -> Result<()> { Ok(()) }

    // ========================================================================
    // Node CRUD
    // ========================================================================

    fn create_node(
        &self,
        _tx: &mut MemoryTx,
        labels: &[&str],
        props: PropertyMap,
    ) -> Result<NodeId> {
        let id = NodeId(self.inner.next_node_id.fetch_add(1, Ordering::Relaxed));
        let node = Node {
            id,
            labels: labels.iter().map(|l| l.to_string()).collect(),
            properties: props,
        };

        // Update label index
        {
            let mut idx = self.inner.label_index.write();
            for label in &node.labels {
                idx.entry(label.clone()).or_default().push(id);
            }
        }

        self.inner.nodes.write().insert(id, node);
        self.inner.adjacency.write().insert(id, Vec::new());

        Ok(id)
    }

    fn get_node(&self, _tx: &MemoryTx, id: NodeId) -> Result<Option<Node>> {
        Ok(self.inner.nodes.read().get(&id).cloned())
    }

    fn delete_node(&self, _tx: &mut MemoryTx, id: NodeId) -> Result<bool> {
        // Can't delete a still-connected node; detach first.
        {
            let adj = self.inner.adjacency.read();
            if let Some(rels) = adj.get(&id) {
                if !rels.is_empty() {
                    return Err(Error::ConstraintViolation(
                        format!("Cannot delete node {id} with {} relationships. Delete relationships first.", rels.len())
                    ));
                }
            }
        }

        let removed = self.inner.nodes.write().remove(&id);
        self.inner.adjacency.write().remove(&id);

        if let Some(node) = &removed {
            let mut idx = self.inner.label_index.write();
            for label in &node.labels {
                if let Some(ids) = idx.get_mut(label) {
                    ids.retain(|nid| *nid != id);
                }
            }
        }

        Ok(removed.is_some())
    }

    fn set_node_property(
        &self,
        _tx: &mut MemoryTx,
        id: NodeId,
        key: &str,
        val: Value,
    ) -> Result<()> {
        let mut nodes = self.inner.nodes.write();
        let node = nodes.get_mut(&id).ok_or_else(|| Error::NotFound(format!("Node {id}")))?;
        node.properties.insert(key.to_string(), val);
        Ok(())
    }

    fn remove_node_property(&self, _tx: &mut MemoryTx, id: NodeId, key: &str) -> Result<()> {
        let mut nodes = self.inner.nodes.write();
        let node = nodes.get_mut(&id).ok_or_else(|| Error::NotFound(format!("Node {id}")))?;
        node.properties.remove(key);
        Ok(())
    }

    fn add_label(&self, _tx: &mut MemoryTx, id: NodeId, label: &str) -> Result<()> {
        let mut nodes = self.inner.nodes.write();
        let node = nodes.get_mut(&id).ok_or_else(|| Error::NotFound(format!("Node {id}")))?;
        if !node.labels.iter().any(|l| l == label) {
            node.labels.push(label.to_string());
            drop(nodes);
            self.inner.label_index.write().entry(label.to_string()).or_default().push(id);
        }
        Ok(())
    }

    fn remove_label(&self, _tx: &mut MemoryTx, id: NodeId, label: &str) -> Result<()> {
        let mut nodes = self.inner.nodes.write();
        let node = nodes.get_mut(&id).ok_or_else(|| Error::NotFound(format!("Node {id}")))?;
        node.labels.retain(|l| l != label);
        drop(nodes);
        let mut idx = self.inner.label_index.write();
        if let Some(ids) = idx.get_mut(label) {
            ids.retain(|nid| *nid != id);
        }
        Ok(())
    }

    // ========================================================================
    // Relationship CRUD
    // ========================================================================

    fn create_relationship(
        &self,
        _tx: &mut MemoryTx,
        src: NodeId,
        dst: NodeId,
        rel_type: &str,
        props: PropertyMap,
    ) -> Result<RelId> {
        // Verify both nodes exist
        {
            let nodes = self.inner.nodes.read();
            if !nodes.contains_key(&src) {
                return Err(Error::NotFound(format!("Source node {src}")));
            }
            if !nodes.contains_key(&dst) {
                return Err(Error::NotFound(format!("Target node {dst}")));
            }
        }

        let id = RelId(self.inner.next_rel_id.fetch_add(1, Ordering::Relaxed));
        let rel = Relationship {
            id,
            src,
            dst,
            rel_type: rel_type.to_string(),
            properties: props,
        };

        self.inner.relationships.write().insert(id, rel);

        // Update adjacency for both endpoints
        let mut adj = self.inner.adjacency.write();
        adj.entry(src).or_default().push(id);
        if src != dst {
            adj.entry(dst).or_default().push(id);
        }

        Ok(id)
    }

    fn get_relationship(&self, _tx: &MemoryTx, id: RelId) -> Result<Option<Relationship>> {
        Ok(self.inner.relationships.read().get(&id).cloned())
    }

    fn delete_relationship(&self, _tx: &mut MemoryTx, id: RelId) -> Result<bool> {
        let removed = self.inner.relationships.write().remove(&id);
        if let Some(rel) = &removed {
            let mut adj = self.inner.adjacency.write();
            if let Some(rels) = adj.get_mut(&rel.src) {
                rels.retain(|rid| *rid != id);
            }
            if rel.src != rel.dst {
                if let Some(rels) = adj.get_mut(&rel.dst) {
                    rels.retain(|rid| *rid != id);
                }
            }
        }
        Ok(removed.is_some())
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    fn get_relationships(
        &self,
        _tx: &MemoryTx,
        node: NodeId,
        dir: Direction,
        rel_type: Option<&str>,
    ) -> Result<Vec<Relationship>> {
        let adj = self.inner.adjacency.read();
        let rels = self.inner.relationships.read();

        let rel_ids = adj.get(&node).cloned().unwrap_or_default();
        let mut result = Vec::new();

        for rid in rel_ids {
            if let Some(rel) = rels.get(&rid) {
                // Direction filter
                let matches_dir = match dir {
                    Direction::Outgoing => rel.src == node,
                    Direction::Incoming => rel.dst == node,
                    Direction::Both => true,
                };
                // Type filter
                let matches_type = rel_type.map_or(true, |t| rel.rel_type == t);

                if matches_dir && matches_type {
                    result.push(rel.clone());
                }
            }
        }

        Ok(result)
    }

    // ========================================================================
    // Schema introspection
    // ========================================================================

    fn node_count(&self, _tx: &MemoryTx) -> Result<u64> {
        Ok(self.inner.nodes.read().len() as u64)
    }

    fn relationship_count(&self, _tx: &MemoryTx) -> Result<u64> {
        Ok(self.inner.relationships.read().len() as u64)
    }

    fn labels(&self, _tx: &MemoryTx) -> Result<Vec<String>> {
        Ok(self.inner.label_index.read()
            .iter()
            .filter(|(_, ids)| !ids.is_empty())
            .map(|(label, _)| label.clone())
            .collect())
    }

    fn relationship_types(&self, _tx: &MemoryTx) -> Result<Vec<String>> {
        let rels = self.inner.relationships.read();
        let mut types: Vec<String> = rels.values().map(|r| r.rel_type.clone()).collect();
        types.sort();
        types.dedup();
        Ok(types)
    }

    // ========================================================================
    // Scan
    // ========================================================================

    fn all_nodes(&self, _tx: &MemoryTx) -> Result<Vec<Node>> {
        Ok(self.inner.nodes.read().values().cloned().collect())
    }

    fn nodes_by_label(&self, _tx: &MemoryTx, label: &str) -> Result<Vec<Node>> {
        let idx = self.inner.label_index.read();
        let nodes = self.inner.nodes.read();

        let ids = idx.get(label).cloned().unwrap_or_default();
        Ok(ids.iter().filter_map(|id| nodes.get(id).cloned()).collect())
    }
}

// ============================================================================
// Tests
// ============================================================================
