//! JSON dump export — serialize the whole tree as one document.
//!
//! Produces a self-contained JSON dump of every node and containment edge so
//! a run's resulting dataset can be archived, diffed, or post-processed by
//! external tooling.
//!
//! ```text
//! canopy engine → export_json_dump() → {"nodes": [...], "relationships": [...]}
//!   → jq / analysis notebooks / re-import elsewhere
//! ```

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::model::*;
use crate::storage::TreeStore;
use crate::tx::TxMode;
use crate::Result;

/// A serialized snapshot of the tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeDump {
    pub node_count: u64,
    pub relationship_count: u64,
    pub nodes: Vec<Node>,
    pub relationships: Vec<Relationship>,
}

/// Export the tree as a JSON dump.
///
/// Nodes and relationships are ordered by id so dumps of the same tree are
/// byte-identical.
pub fn export_json_dump<S: TreeStore>(store: &S, writer: &mut dyn Write) -> Result<()> {
    let tx = store.begin_tx(TxMode::ReadOnly)?;

    let mut nodes = store.all_nodes(&tx)?;
    nodes.sort_by_key(|n| n.id.0);

    let mut relationships = Vec::new();
    for node in &nodes {
        relationships.extend(store.get_relationships(&tx, node.id, Direction::Outgoing, None)?);
    }
    relationships.sort_by_key(|r| r.id.0);

    let dump = TreeDump {
        node_count: nodes.len() as u64,
        relationship_count: relationships.len() as u64,
        nodes,
        relationships,
    };

    serde_json::to_writer_pretty(&mut *writer, &dump)?;
    store.commit_tx(tx)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_dump_roundtrip() {
        let store = MemoryStore::new();
        let mut tx = store.begin_tx(TxMode::ReadWrite).unwrap();

        let root = store.create_node(&mut tx, &[labels::ROOT, "Tissue"], PropertyMap::new()).unwrap();
        let mut cell_props = PropertyMap::new();
        cell_props.insert(props::VOTE.into(), WeightVec::from([1.0, 0.0]).into_value());
        let cell = store.create_node(&mut tx, &["Cell"], cell_props).unwrap();
        store.create_relationship(&mut tx, root, cell, rels::CONTAINS, PropertyMap::new()).unwrap();
        store.commit_tx(tx).unwrap();

        let mut buf = Vec::new();
        export_json_dump(&store, &mut buf).unwrap();

        let dump: TreeDump = serde_json::from_slice(&buf).unwrap();
        assert_eq!(dump.node_count, 2);
        assert_eq!(dump.relationship_count, 1);
        assert_eq!(dump.relationships[0].src, root);
        assert_eq!(dump.relationships[0].dst, cell);
        assert!(dump.nodes.iter().any(|n| n.has_label("Cell")));
    }

    #[test]
    fn test_dump_is_stable() {
        let store = MemoryStore::new();
        let mut tx = store.begin_tx(TxMode::ReadWrite).unwrap();
        let a = store.create_node(&mut tx, &[labels::ROOT], PropertyMap::new()).unwrap();
        let b = store.create_node(&mut tx, &["Cell"], PropertyMap::new()).unwrap();
        store.create_relationship(&mut tx, a, b, rels::CONTAINS, PropertyMap::new()).unwrap();
        store.commit_tx(tx).unwrap();

        let mut first = Vec::new();
        export_json_dump(&store, &mut first).unwrap();
        let mut second = Vec::new();
        export_json_dump(&store, &mut second).unwrap();
        assert_eq!(first, second);
    }
}
