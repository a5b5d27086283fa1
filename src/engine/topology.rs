//! Declarative initial topology.
//!
//! A `TopologySpec` is the data-driven way to bootstrap a tree: keyed node
//! specs plus parent→child edge pairs, deserializable from JSON. Imperative
//! bootstrap callbacks against [`Cx`](super::Cx) cover everything a spec
//! can't express; the builder applies specs first, callbacks second.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::model::{NodeId, PropertyMap, Value};
use crate::storage::TreeStore;
use crate::{Error, Result};
use super::Cx;

/// A declarative initial tree: nodes keyed by caller-chosen handles, and
/// containment edges between those handles.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopologySpec {
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub edges: Vec<EdgeSpec>,
}

/// One node in a [`TopologySpec`]. The key only exists inside the spec; it
/// is not stored on the node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    pub key: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub properties: PropertyMap,
}

/// One containment edge in a [`TopologySpec`], parent key → child key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeSpec {
    pub parent: String,
    pub child: String,
}

impl TopologySpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(mut self, spec: NodeSpec) -> Self {
        self.nodes.push(spec);
        self
    }

    pub fn edge(mut self, parent: impl Into<String>, child: impl Into<String>) -> Self {
        self.edges.push(EdgeSpec { parent: parent.into(), child: child.into() });
        self
    }

    /// Materialize the spec through the store's batch-create methods.
    /// Returns the key → id mapping for follow-up wiring.
    pub(crate) fn apply<S: TreeStore>(&self, cx: &mut Cx<'_, S>) -> Result<HashMap<String, NodeId>> {
        let batch: Vec<(Vec<String>, PropertyMap)> = self
            .nodes
            .iter()
            .map(|spec| (spec.labels.clone(), spec.properties.clone()))
            .collect();
        let ids = cx.store.create_nodes_batch(cx.tx, batch)?;

        let mut by_key: HashMap<String, NodeId> = HashMap::with_capacity(ids.len());
        for (spec, id) in self.nodes.iter().zip(ids) {
            if by_key.insert(spec.key.clone(), id).is_some() {
                return Err(Error::Config(format!("duplicate topology key '{}'", spec.key)));
            }
        }

        let mut edges = Vec::with_capacity(self.edges.len());
        for edge in &self.edges {
            let parent = *by_key.get(&edge.parent).ok_or_else(|| {
                Error::Config(format!("topology edge references unknown key '{}'", edge.parent))
            })?;
            let child = *by_key.get(&edge.child).ok_or_else(|| {
                Error::Config(format!("topology edge references unknown key '{}'", edge.child))
            })?;
            edges.push((parent, child, crate::model::rels::CONTAINS.to_string(), PropertyMap::new()));
        }
        cx.store.create_relationships_batch(cx.tx, edges)?;

        Ok(by_key)
    }
}

impl NodeSpec {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into(), labels: Vec::new(), properties: PropertyMap::new() }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_from_json() {
        let json = r#"{
            "nodes": [
                {"key": "t", "labels": ["Tissue", "Root"]},
                {"key": "c", "labels": ["Cell"],
                 "properties": {"vote": {"type": "List", "value": [
                     {"type": "Float", "value": 1.0},
                     {"type": "Float", "value": 0.0}
                 ]}}}
            ],
            "edges": [{"parent": "t", "child": "c"}]
        }"#;
        let spec: TopologySpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.nodes.len(), 2);
        assert_eq!(spec.edges.len(), 1);
        assert_eq!(spec.nodes[0].labels, vec!["Tissue", "Root"]);
        assert!(spec.nodes[1].properties.contains_key("vote"));
    }

    #[test]
    fn test_builder_style() {
        let spec = TopologySpec::new()
            .node(NodeSpec::new("root").with_label("Root"))
            .node(NodeSpec::new("leaf").with_property("kind", "stem"))
            .edge("root", "leaf");
        assert_eq!(spec.nodes.len(), 2);
        assert_eq!(spec.edges[0].parent, "root");
    }
}
