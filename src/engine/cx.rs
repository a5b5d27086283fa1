//! The engine context handle.
//!
//! Everything a simulation touches at runtime — operators, vote policies,
//! monitors, topology builders — receives a `&mut Cx`. The handle wraps the
//! store, the current unit of work, the shared random source, and the
//! iteration counter. All graph operations are methods parameterized by
//! `NodeId`; there is no per-node wrapper object and no global engine
//! singleton.

use rand::rngs::StdRng;

use crate::model::*;
use crate::storage::TreeStore;
use crate::{Error, Result};

/// Context handle for one unit of work against the tree.
pub struct Cx<'run, S: TreeStore> {
    pub(crate) store: &'run S,
    pub(crate) tx: &'run mut S::Tx,
    pub(crate) rng: &'run mut StdRng,
    pub(crate) iteration: u64,
    pub(crate) operator_count: usize,
}

impl<'run, S: TreeStore> Cx<'run, S> {
    // ========================================================================
    // Engine state
    // ========================================================================

    /// Number of iterations completed so far in the current run.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Number of registered operators; the length of every filter and vote.
    pub fn operator_count(&self) -> usize {
        self.operator_count
    }

    /// The engine's shared random source.
    pub fn rng(&mut self) -> &mut StdRng {
        self.rng
    }

    // ========================================================================
    // Creation and wiring
    // ========================================================================

    pub fn create_node(&mut self, labels: &[&str], props: PropertyMap) -> Result<NodeId> {
        self.store.create_node(self.tx, labels, props)
    }

    /// Create a containment edge parent → child.
    pub fn link(&mut self, parent: NodeId, child: NodeId) -> Result<RelId> {
        self.store
            .create_relationship(self.tx, parent, child, rels::CONTAINS, PropertyMap::new())
    }

    /// Remove every containment edge parent → child. Errors if none exists.
    pub fn unlink(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        let edges = self
            .store
            .get_relationships(self.tx, parent, Direction::Outgoing, Some(rels::CONTAINS))?;
        let mut removed = false;
        for edge in edges.iter().filter(|r| r.dst == child) {
            removed |= self.store.delete_relationship(self.tx, edge.id)?;
        }
        if removed {
            Ok(())
        } else {
            Err(Error::NotFound(format!("containment edge {parent} -> {child}")))
        }
    }

    // ========================================================================
    // Liveness and activity
    // ========================================================================

    /// The authoritative "does this node still exist" check.
    pub fn is_live(&self, id: NodeId) -> Result<bool> {
        Ok(self.store.get_node(self.tx, id)?.is_some())
    }

    /// Fetch a snapshot of a node. `None` means deleted.
    pub fn node(&self, id: NodeId) -> Result<Option<Node>> {
        self.store.get_node(self.tx, id)
    }

    fn require_node(&self, id: NodeId) -> Result<Node> {
        self.store
            .get_node(self.tx, id)?
            .ok_or_else(|| Error::NotFound(format!("Node {id}")))
    }

    /// A deleted node counts as not active.
    pub fn is_active(&self, id: NodeId) -> Result<bool> {
        Ok(self.node(id)?.map(|n| n.is_active()).unwrap_or(false))
    }

    /// Extinguish a node: terminal and non-reversible. The node stays in
    /// storage but is skipped by evaluation and active-only queries. Stamps
    /// the current iteration into `inactive_at`.
    pub fn set_inactive(&mut self, id: NodeId) -> Result<()> {
        self.store
            .set_node_property(self.tx, id, props::INACTIVE_AT, Value::from(self.iteration))?;
        self.store.add_label(self.tx, id, labels::INACTIVE)
    }

    // ========================================================================
    // Labels and properties
    // ========================================================================

    pub fn has_label(&self, id: NodeId, label: &str) -> Result<bool> {
        Ok(self.require_node(id)?.has_label(label))
    }

    pub fn add_label(&mut self, id: NodeId, label: &str) -> Result<()> {
        self.store.add_label(self.tx, id, label)
    }

    pub fn remove_label(&mut self, id: NodeId, label: &str) -> Result<()> {
        self.store.remove_label(self.tx, id, label)
    }

    pub fn property(&self, id: NodeId, key: &str) -> Result<Option<Value>> {
        Ok(self.require_node(id)?.properties.get(key).cloned())
    }

    pub fn set_property(&mut self, id: NodeId, key: &str, value: impl Into<Value>) -> Result<()> {
        self.store.set_node_property(self.tx, id, key, value.into())
    }

    pub fn remove_property(&mut self, id: NodeId, key: &str) -> Result<()> {
        self.store.remove_node_property(self.tx, id, key)
    }

    // ========================================================================
    // Filters, votes, policies
    // ========================================================================

    /// The node's stored filter, or all-ones if absent.
    pub fn filter(&self, id: NodeId) -> Result<WeightVec> {
        let node = self.require_node(id)?;
        self.filter_of(&node)
    }

    /// The node's stored vote, or all-zeros if absent.
    pub fn vote(&self, id: NodeId) -> Result<WeightVec> {
        let node = self.require_node(id)?;
        self.vote_of(&node)
    }

    pub(crate) fn filter_of(&self, node: &Node) -> Result<WeightVec> {
        match node.get(props::FILTER) {
            Some(v) => WeightVec::from_value(v, self.operator_count),
            None => Ok(WeightVec::ones(self.operator_count)),
        }
    }

    pub(crate) fn vote_of(&self, node: &Node) -> Result<WeightVec> {
        match node.get(props::VOTE) {
            Some(v) => WeightVec::from_value(v, self.operator_count),
            None => Ok(WeightVec::zeros(self.operator_count)),
        }
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    /// Children by outgoing containment edges, in storage order.
    pub fn children(&self, id: NodeId) -> Result<Vec<NodeId>> {
        Ok(self
            .store
            .get_relationships(self.tx, id, Direction::Outgoing, Some(rels::CONTAINS))?
            .into_iter()
            .map(|r| r.dst)
            .collect())
    }

    pub fn children_with_label(&self, id: NodeId, label: &str) -> Result<Vec<NodeId>> {
        let mut out = Vec::new();
        for child in self.children(id)? {
            if let Some(node) = self.node(child)? {
                if node.has_label(label) {
                    out.push(child);
                }
            }
        }
        Ok(out)
    }

    /// Parents by incoming containment edges.
    pub fn parents(&self, id: NodeId) -> Result<Vec<NodeId>> {
        Ok(self
            .store
            .get_relationships(self.tx, id, Direction::Incoming, Some(rels::CONTAINS))?
            .into_iter()
            .map(|r| r.src)
            .collect())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn nodes_with_label(&self, label: &str) -> Result<Vec<NodeId>> {
        Ok(self
            .store
            .nodes_by_label(self.tx, label)?
            .into_iter()
            .map(|n| n.id)
            .collect())
    }

    pub fn active_nodes_with_label(&self, label: &str) -> Result<Vec<NodeId>> {
        Ok(self
            .store
            .nodes_by_label(self.tx, label)?
            .into_iter()
            .filter(|n| n.is_active())
            .map(|n| n.id)
            .collect())
    }

    pub fn node_count(&self) -> Result<u64> {
        self.store.node_count(self.tx)
    }

    // ========================================================================
    // Deletion
    // ========================================================================

    /// Detach-delete: remove every edge touching the node, then the node.
    pub fn delete(&mut self, id: NodeId) -> Result<()> {
        self.store.detach_delete_node(self.tx, id)?;
        Ok(())
    }

    /// Delete a whole subtree, children first. Shared descendants already
    /// removed through another parent are tolerated.
    pub fn recursive_delete(&mut self, id: NodeId) -> Result<()> {
        if !self.is_live(id)? {
            return Ok(());
        }
        for child in self.children(id)? {
            self.recursive_delete(child)?;
        }
        if self.is_live(id)? {
            self.delete(id)?;
        }
        Ok(())
    }

    // ========================================================================
    // Cloning
    // ========================================================================

    /// Copy labels and properties into a fresh, unwired node.
    /// The snapshot is taken at call time, not a live view.
    fn clone_node_data(&mut self, id: NodeId) -> Result<NodeId> {
        let source = self.require_node(id)?;
        let label_refs: Vec<&str> = source.labels.iter().map(|s| s.as_str()).collect();
        self.store.create_node(self.tx, &label_refs, source.properties)
    }

    /// Clone a node and re-parent the clone under every current parent of
    /// the source: the clone becomes a sibling of the source, it does not
    /// replace it.
    pub fn shallow_clone(&mut self, id: NodeId) -> Result<NodeId> {
        let parents = self.parents(id)?;
        let clone = self.clone_node_data(id)?;
        for parent in parents {
            self.link(parent, clone)?;
        }
        Ok(clone)
    }

    /// Clone a node and its entire subtree. The top-level clone is attached
    /// under the source's parents; every descendant clone is attached only
    /// under its cloned parent. The original subtree is left untouched.
    pub fn deep_clone(&mut self, id: NodeId) -> Result<NodeId> {
        let clone = self.shallow_clone(id)?;
        for child in self.children(id)? {
            let child_clone = self.clone_subtree(child)?;
            self.link(clone, child_clone)?;
        }
        Ok(clone)
    }

    fn clone_subtree(&mut self, id: NodeId) -> Result<NodeId> {
        let clone = self.clone_node_data(id)?;
        for child in self.children(id)? {
            let child_clone = self.clone_subtree(child)?;
            self.link(clone, child_clone)?;
        }
        Ok(clone)
    }

    // ========================================================================
    // Debugging
    // ========================================================================

    /// `(id) -> [child, child, …]`
    pub fn pretty_print(&self, id: NodeId) -> Result<String> {
        let children = self.children(id)?;
        let inner: Vec<String> = children.iter().map(|c| c.to_string()).collect();
        Ok(format!("({id}) -> [{}]", inner.join(",")))
    }

    /// Like [`pretty_print`](Self::pretty_print), but recursing into children.
    pub fn deep_pretty_print(&self, id: NodeId) -> Result<String> {
        let children = self.children(id)?;
        let mut inner = Vec::with_capacity(children.len());
        for child in children {
            inner.push(self.deep_pretty_print(child)?);
        }
        Ok(format!("({id}) -> [{}]", inner.join(",")))
    }
}
